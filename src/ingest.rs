//! Ingestion: corpus loading followed by chunking.
//!
//! Produces the chunk list an [`crate::index::EmbeddingIndex`] is built from.

use anyhow::{Context, Result};

use docent_core::chunk::split_all;
use docent_core::models::Chunk;

use crate::config::Config;
use crate::corpus::load_corpus;

/// Counts reported after an ingest run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub documents: usize,
    pub empty_documents: usize,
    pub chunks: usize,
}

/// Load the corpus and split every document into chunks.
pub fn ingest(config: &Config) -> Result<(Vec<Chunk>, IngestStats)> {
    let documents = load_corpus(&config.corpus)?;

    let chunks = split_all(
        &documents,
        config.chunking.max_chars,
        config.chunking.overlap_chars,
    )
    .context("Failed to chunk corpus")?;

    let stats = IngestStats {
        documents: documents.len(),
        empty_documents: documents.iter().filter(|d| d.text.is_empty()).count(),
        chunks: chunks.len(),
    };

    tracing::info!(
        documents = stats.documents,
        empty = stats.empty_documents,
        chunks = stats.chunks,
        max_chars = config.chunking.max_chars,
        overlap_chars = config.chunking.overlap_chars,
        "ingest complete"
    );

    Ok((chunks, stats))
}
