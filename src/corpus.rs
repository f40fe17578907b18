//! Corpus loader: walks a directory and extracts one [`Document`] per file.
//!
//! Files are matched against `corpus.include_globs` / `corpus.exclude_globs`
//! (relative to the root). PDFs are extracted with `pdf-extract`; every
//! other file is read as UTF-8 (lossy). Documents are sorted by relative
//! path. Files that cannot be read or extracted are skipped with a warning.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use walkdir::WalkDir;

use docent_core::models::Document;

use crate::config::CorpusConfig;

pub fn load_corpus(config: &CorpusConfig) -> Result<Vec<Document>> {
    let root = &config.root;
    if !root.exists() {
        bail!("Corpus root does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.include_globs)?;

    let mut default_excludes = vec!["**/.git/**".to_string(), "**/speech_files/**".to_string()];
    default_excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut documents = Vec::new();
    let mut skipped = 0usize;

    let walker = WalkDir::new(root).follow_links(config.follow_symlinks);
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable corpus entry");
                skipped += 1;
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) {
            continue;
        }
        if !include_set.is_match(&rel_str) {
            continue;
        }

        match extract_file(path) {
            Ok(text) => documents.push(Document::new(rel_str, text)),
            Err(e) => {
                tracing::warn!(file = %rel_str, error = %e, "skipping corpus file");
                skipped += 1;
            }
        }
    }

    documents.sort_by(|a, b| a.id.cmp(&b.id));

    tracing::info!(
        root = %root.display(),
        documents = documents.len(),
        skipped,
        "corpus loaded"
    );

    Ok(documents)
}

/// Extract the text of one file based on its extension.
pub fn extract_file(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    let is_pdf = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);

    if is_pdf {
        // pdf-extract panics on some malformed files.
        return match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(&bytes)) {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(anyhow::anyhow!("PDF extraction failed: {}", e)),
            Err(_) => Err(anyhow::anyhow!("PDF extraction failed: malformed document")),
        };
    }

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
