//! Core data models for the retrieval pipeline.
//!
//! A [`Document`] is the full text of one corpus file; the chunker turns it
//! into [`Chunk`]s, and the index hands back [`ScoredChunk`]s for queries.

use serde::Serialize;

/// Full raw text extracted from one corpus file. Immutable once ingested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    /// Corpus-relative path of the source file.
    pub id: String,
    pub text: String,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// A bounded contiguous span of a document used as the retrieval unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// `<document id>#<index>`; stable across runs.
    pub id: String,
    pub document_id: String,
    /// Position of this chunk within its document, contiguous from 0.
    pub index: usize,
    /// Character offset of the first character within the document text.
    pub offset: usize,
    pub text: String,
    /// SHA-256 of `text`, hex encoded.
    pub hash: String,
}

impl Chunk {
    /// Length of the chunk in characters (Unicode scalar values).
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// A chunk returned from a similarity query together with its score.
///
/// Higher scores are always more similar, for every metric.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}
