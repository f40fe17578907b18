//! Overlapping, separator-aware text chunker.
//!
//! Splits document text into [`Chunk`]s of at most `max_size` characters,
//! where each chunk repeats exactly `overlap` characters from the end of
//! the one before it. Overlap keeps sentences that straddle a boundary
//! retrievable from either side.
//!
//! # Algorithm
//!
//! 1. If the remaining text fits in `max_size`, emit it and stop.
//! 2. Otherwise look at the window `[start, start + max_size]` and place the
//!    chunk end at the last paragraph break (`\n\n`) inside it, else the last
//!    sentence break (`. `, `! `, `? `, `\n`), else the last whitespace, else
//!    the raw character limit. A boundary only counts if it lies beyond
//!    `start + overlap`, so every step makes progress.
//! 3. Emit `[start, end)` and continue from `end - overlap`.
//!
//! Text is never trimmed: each chunk is exactly the document slice that
//! starts at its `offset`. Lengths are counted in `char`s, so multi-byte
//! text is never cut inside a code point.
//!
//! # Example
//!
//! ```rust
//! use docent_core::chunk::split;
//! use docent_core::models::Document;
//!
//! let doc = Document::new("bank.txt", "Bank account opening requires ID and address proof.");
//! let chunks = split(&doc, 500, 200).unwrap();
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].id, "bank.txt#0");
//! ```

use sha2::{Digest, Sha256};

use crate::error::RagError;
use crate::models::{Chunk, Document};

/// Separator levels from coarsest to finest. Each entry lists the strings
/// after which a chunk may end.
const SEPARATOR_LEVELS: &[&[&str]] = &[&["\n\n"], &[". ", "! ", "? ", "\n"], &[" ", "\t"]];

/// Check chunking parameters before any document is touched.
pub fn validate_params(max_size: usize, overlap: usize) -> Result<(), RagError> {
    if max_size == 0 {
        return Err(RagError::InvalidConfig(
            "chunk max_size must be > 0".to_string(),
        ));
    }
    if overlap >= max_size {
        return Err(RagError::InvalidConfig(format!(
            "chunk overlap ({}) must be smaller than max_size ({})",
            overlap, max_size
        )));
    }
    Ok(())
}

/// Split one document into overlapping chunks.
///
/// # Guarantees
///
/// - Every chunk has at most `max_size` characters.
/// - Consecutive chunks share exactly `overlap` characters.
/// - Identical input and parameters give an identical chunk sequence.
/// - An empty document yields no chunks.
///
/// # Errors
///
/// [`RagError::InvalidConfig`] when `max_size == 0` or `overlap >= max_size`.
pub fn split(document: &Document, max_size: usize, overlap: usize) -> Result<Vec<Chunk>, RagError> {
    validate_params(max_size, overlap)?;

    let text = document.text.as_str();
    // Byte position of every char, plus the end of the string.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let total = bounds.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < total {
        let end = if total - start <= max_size {
            total
        } else {
            choose_end(text, &bounds, start, max_size, overlap)
        };

        let piece = &text[bounds[start]..bounds[end]];
        chunks.push(make_chunk(&document.id, chunks.len(), start, piece));

        if end == total {
            break;
        }
        start = end - overlap;
    }

    Ok(chunks)
}

/// Split every document with the same parameters, in document order.
pub fn split_all(
    documents: &[Document],
    max_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>, RagError> {
    validate_params(max_size, overlap)?;
    let mut all = Vec::new();
    for doc in documents {
        all.extend(split(doc, max_size, overlap)?);
    }
    Ok(all)
}

/// Pick the end (exclusive, in chars) of the chunk starting at `start`.
fn choose_end(
    text: &str,
    bounds: &[usize],
    start: usize,
    max_size: usize,
    overlap: usize,
) -> usize {
    let limit = start + max_size;
    let floor = start + overlap;
    let window = &text[bounds[start]..bounds[limit]];
    let window_base = bounds[start];

    for separators in SEPARATOR_LEVELS {
        let best = separators
            .iter()
            .filter_map(|sep| {
                window
                    .rmatch_indices(sep)
                    .map(|(pos, s)| window_base + pos + s.len())
                    .map(|byte_end| char_pos(bounds, byte_end))
                    .find(|&end| end > floor && end <= limit)
            })
            .max();
        if let Some(end) = best {
            return end;
        }
    }

    limit
}

/// Convert a byte offset that lies on a char boundary to a char position.
fn char_pos(bounds: &[usize], byte: usize) -> usize {
    bounds.partition_point(|&b| b < byte)
}

/// Create a single [`Chunk`] with a deterministic id and SHA-256 content hash.
fn make_chunk(document_id: &str, index: usize, offset: usize, text: &str) -> Chunk {
    let hash = hex::encode(Sha256::digest(text.as_bytes()));

    Chunk {
        id: format!("{}#{}", document_id, index),
        document_id: document_id.to_string(),
        index,
        offset,
        text: text.to_string(),
        hash,
    }
}
