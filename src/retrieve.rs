//! Retrieval of context chunks for a user utterance.

use std::sync::Arc;

use docent_core::error::RagError;
use docent_core::models::ScoredChunk;

use crate::index::EmbeddingIndex;

/// Chunks retrieved for one utterance, highest similarity first.
#[derive(Debug, Clone, Default)]
pub struct Retrieved {
    pub chunks: Vec<ScoredChunk>,
}

impl Retrieved {
    /// Chunk texts joined by a blank line, in rank order.
    pub fn context(&self) -> String {
        self.chunks
            .iter()
            .map(|s| s.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

#[derive(Clone)]
pub struct Retriever {
    index: Arc<EmbeddingIndex>,
    top_k: usize,
}

impl Retriever {
    pub fn new(index: Arc<EmbeddingIndex>, top_k: usize) -> Self {
        Self { index, top_k }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub async fn retrieve(&self, user_text: &str) -> Result<Retrieved, RagError> {
        let chunks = self
            .index
            .query(user_text, self.top_k)
            .await
            .map_err(|e| match e {
                RagError::Retrieval(_) => e,
                other => RagError::Retrieval(other.to_string()),
            })?;

        tracing::debug!(
            hits = chunks.len(),
            top_score = chunks.first().map(|c| c.score),
            "retrieved context"
        );

        Ok(Retrieved { chunks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docent_core::models::Chunk;

    fn scored(text: &str, score: f32) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                id: format!("d#{}", text),
                document_id: "d".to_string(),
                index: 0,
                offset: 0,
                text: text.to_string(),
                hash: String::new(),
            },
            score,
        }
    }

    #[test]
    fn test_context_joins_in_rank_order() {
        let r = Retrieved {
            chunks: vec![scored("first", 0.9), scored("second", 0.5)],
        };
        assert_eq!(r.context(), "first\n\nsecond");
    }

    #[test]
    fn test_empty_context() {
        assert_eq!(Retrieved::default().context(), "");
        assert!(Retrieved::default().is_empty());
    }
}
