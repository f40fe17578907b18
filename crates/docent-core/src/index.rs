//! Exact nearest-neighbor index over chunk embeddings.
//!
//! The index is built once from a chunk list and is read-only afterwards,
//! so a single instance can be shared across threads (`Arc<Index>`) and
//! queried concurrently without locking.
//!
//! # Scoring
//!
//! | Metric | Score | Range |
//! |--------|-------|-------|
//! | [`Metric::Cosine`] | cosine similarity | `[-1, 1]` |
//! | [`Metric::L2`] | negated Euclidean distance | `(-inf, 0]` |
//!
//! Higher is more similar for both. Results are ordered by score
//! (descending); equal scores keep chunk insertion order.

use serde::{Deserialize, Serialize};

use crate::embedding::{cosine_similarity, l2_distance, Embedder};
use crate::error::RagError;
use crate::models::{Chunk, ScoredChunk};

/// Similarity metric used to rank chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Cosine,
    L2,
}

impl Metric {
    fn score(self, query: &[f32], vector: &[f32]) -> f32 {
        match self {
            Metric::Cosine => cosine_similarity(query, vector),
            Metric::L2 => -l2_distance(query, vector),
        }
    }
}

impl std::str::FromStr for Metric {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cosine" => Ok(Metric::Cosine),
            "l2" => Ok(Metric::L2),
            other => Err(RagError::InvalidConfig(format!(
                "unknown similarity metric '{}'; use cosine or l2",
                other
            ))),
        }
    }
}

fn rank(score: f32) -> f32 {
    if score.is_nan() {
        f32::NEG_INFINITY
    } else {
        score
    }
}

/// A built, immutable set of (chunk, vector) pairs.
#[derive(Debug)]
pub struct Index {
    entries: Vec<(Chunk, Vec<f32>)>,
    dims: usize,
    metric: Metric,
    model: String,
}

impl Index {
    /// Embed `chunks` in batches of `batch_size` and build the index.
    ///
    /// # Errors
    ///
    /// - [`RagError::EmptyCorpus`] if `chunks` is empty.
    /// - [`RagError::Embedding`] if the embedder fails, returns the wrong
    ///   number of vectors, or returns a vector of a different dimensionality.
    pub async fn build(
        chunks: Vec<Chunk>,
        embedder: &dyn Embedder,
        metric: Metric,
        batch_size: usize,
    ) -> Result<Index, RagError> {
        if chunks.is_empty() {
            return Err(RagError::EmptyCorpus);
        }
        let batch_size = batch_size.max(1);
        let dims = embedder.dims();

        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embedded = embedder.embed(&texts).await?;
            if embedded.len() != texts.len() {
                return Err(RagError::Embedding(format!(
                    "embedder returned {} vectors for {} texts",
                    embedded.len(),
                    texts.len()
                )));
            }
            vectors.extend(embedded);
        }

        if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
            return Err(RagError::Embedding(format!(
                "dimensionality mismatch: expected {}, got {}",
                dims,
                bad.len()
            )));
        }

        tracing::debug!(
            chunks = chunks.len(),
            dims,
            model = embedder.model_name(),
            "index built"
        );

        Ok(Index {
            entries: chunks.into_iter().zip(vectors).collect(),
            dims,
            metric,
            model: embedder.model_name().to_string(),
        })
    }

    /// Return at most `k` chunks ranked by similarity to `query_vec`.
    pub fn search(&self, query_vec: &[f32], k: usize) -> Vec<ScoredChunk> {
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, (_, v))| (i, self.metric.score(query_vec, v)))
            .collect();

        // Stable sort keeps insertion order for equal scores. NaN ranks last.
        scored.sort_by(|a, b| rank(b.1).total_cmp(&rank(a.1)));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(i, score)| ScoredChunk {
                chunk: self.entries[i].0.clone(),
                score,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Chunks in insertion order.
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.entries.iter().map(|(c, _)| c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::embedding::HashingEmbedder;

    /// Embedder that returns fixed vectors keyed by text.
    struct TableEmbedder {
        dims: usize,
        table: Vec<(&'static str, Vec<f32>)>,
    }

    #[async_trait]
    impl Embedder for TableEmbedder {
        fn model_name(&self) -> &str {
            "table"
        }
        fn dims(&self) -> usize {
            self.dims
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
            Ok(texts
                .iter()
                .map(|t| {
                    self.table
                        .iter()
                        .find(|(k, _)| *k == t.as_str())
                        .map(|(_, v)| v.clone())
                        .unwrap_or_else(|| vec![0.0; self.dims])
                })
                .collect())
        }
    }

    fn chunk(id: &str, text: &str) -> Chunk {
        Chunk {
            id: id.to_string(),
            document_id: "d".to_string(),
            index: 0,
            offset: 0,
            text: text.to_string(),
            hash: String::new(),
        }
    }

    fn table() -> TableEmbedder {
        TableEmbedder {
            dims: 2,
            table: vec![
                ("east", vec![1.0, 0.0]),
                ("north", vec![0.0, 1.0]),
                ("northeast", vec![0.7, 0.7]),
                ("east again", vec![2.0, 0.0]),
            ],
        }
    }

    #[tokio::test]
    async fn test_empty_corpus() {
        let e = HashingEmbedder::new(8).unwrap();
        let err = Index::build(vec![], &e, Metric::Cosine, 16).await.unwrap_err();
        assert_eq!(err, RagError::EmptyCorpus);
    }

    #[tokio::test]
    async fn test_results_ordered_and_bounded() {
        let chunks = vec![
            chunk("a", "north"),
            chunk("b", "east"),
            chunk("c", "northeast"),
        ];
        let index = Index::build(chunks, &table(), Metric::Cosine, 2).await.unwrap();
        assert_eq!(index.len(), 3);

        let hits = index.search(&[1.0, 0.0], 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.id, "b");
        assert_eq!(hits[1].chunk.id, "c");
        assert!(hits[0].score >= hits[1].score);

        let all = index.search(&[1.0, 0.0], 10);
        assert_eq!(all.len(), 3);
        for pair in all.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[tokio::test]
    async fn test_ties_keep_insertion_order() {
        let chunks = vec![
            chunk("first", "east"),
            chunk("second", "east again"),
            chunk("third", "north"),
        ];
        let index = Index::build(chunks, &table(), Metric::Cosine, 8).await.unwrap();
        let hits = index.search(&[1.0, 0.0], 3);
        // "east" and "east again" both have cosine 1.0
        assert_eq!(hits[0].chunk.id, "first");
        assert_eq!(hits[1].chunk.id, "second");
    }

    #[tokio::test]
    async fn test_non_finite_vectors_rank_last() {
        let embedder = TableEmbedder {
            dims: 2,
            table: vec![
                ("east", vec![1.0, 0.0]),
                ("broken", vec![f32::NAN, 0.0]),
                ("huge", vec![f32::INFINITY, f32::INFINITY]),
                ("north", vec![0.0, 1.0]),
            ],
        };
        let chunks = vec![
            chunk("broken", "broken"),
            chunk("east", "east"),
            chunk("huge", "huge"),
            chunk("north", "north"),
        ];
        let index = Index::build(chunks, &embedder, Metric::Cosine, 8).await.unwrap();
        let hits = index.search(&[1.0, 0.0], 4);
        assert_eq!(hits.len(), 4);
        assert_eq!(hits[0].chunk.id, "east");
        assert_eq!(hits[1].chunk.id, "north");
        assert!(hits[2].score.is_nan() && hits[3].score.is_nan());
        // NaN entries keep insertion order among themselves.
        assert_eq!(hits[2].chunk.id, "broken");
        assert_eq!(hits[3].chunk.id, "huge");
    }

    #[tokio::test]
    async fn test_l2_metric_prefers_nearest() {
        let chunks = vec![chunk("far", "east again"), chunk("near", "east")];
        let index = Index::build(chunks, &table(), Metric::L2, 8).await.unwrap();
        let hits = index.search(&[1.0, 0.0], 2);
        assert_eq!(hits[0].chunk.id, "near");
        assert!((hits[0].score - 0.0).abs() < 1e-6);
        assert!((hits[1].score + 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_fails_build() {
        let bad = TableEmbedder {
            dims: 3,
            table: vec![("east", vec![1.0, 0.0])],
        };
        let err = Index::build(vec![chunk("a", "east")], &bad, Metric::Cosine, 4)
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Embedding(_)));
    }

    #[tokio::test]
    async fn test_zero_k_returns_nothing() {
        let index = Index::build(vec![chunk("a", "east")], &table(), Metric::Cosine, 4)
            .await
            .unwrap();
        assert!(index.search(&[1.0, 0.0], 0).is_empty());
    }

    #[test]
    fn test_metric_from_str() {
        assert_eq!("cosine".parse::<Metric>().unwrap(), Metric::Cosine);
        assert_eq!("l2".parse::<Metric>().unwrap(), Metric::L2);
        assert!("dot".parse::<Metric>().is_err());
    }
}
