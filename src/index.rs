//! Build-once embedding index handle.
//!
//! [`EmbeddingIndex`] owns the embedder and a [`OnceCell`] holding the
//! built [`Index`]. The first call to [`EmbeddingIndex::get_or_build`]
//! runs the loader and embeds the corpus; concurrent callers wait for that
//! single build and later callers get the cached index. Queries never
//! mutate the index and may run from many tasks at once.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;

use docent_core::embedding::Embedder;
use docent_core::error::RagError;
use docent_core::index::{Index, Metric};
use docent_core::models::{Chunk, ScoredChunk};

pub struct EmbeddingIndex {
    embedder: Arc<dyn Embedder>,
    metric: Metric,
    batch_size: usize,
    cell: OnceCell<Arc<Index>>,
}

impl EmbeddingIndex {
    pub fn new(embedder: Arc<dyn Embedder>, metric: Metric, batch_size: usize) -> Self {
        Self {
            embedder,
            metric,
            batch_size,
            cell: OnceCell::new(),
        }
    }

    /// Return the index, building it from `loader`'s chunks on first use.
    ///
    /// A failed build leaves the handle unbuilt; the next call retries.
    pub async fn get_or_build<F, Fut>(&self, loader: F) -> Result<Arc<Index>, RagError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Chunk>, RagError>>,
    {
        let index = self
            .cell
            .get_or_try_init(|| async {
                let chunks = loader().await?;
                tracing::info!(
                    chunks = chunks.len(),
                    model = self.embedder.model_name(),
                    "building embedding index"
                );
                let index = Index::build(
                    chunks,
                    self.embedder.as_ref(),
                    self.metric,
                    self.batch_size,
                )
                .await?;
                Ok::<_, RagError>(Arc::new(index))
            })
            .await?;
        Ok(Arc::clone(index))
    }

    /// Build from an already-chunked corpus.
    pub async fn build(&self, chunks: Vec<Chunk>) -> Result<Arc<Index>, RagError> {
        self.get_or_build(|| async move { Ok(chunks) }).await
    }

    /// The built index, if any.
    pub fn get(&self) -> Option<Arc<Index>> {
        self.cell.get().cloned()
    }

    pub fn is_built(&self) -> bool {
        self.cell.initialized()
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Embed `text` and return the `k` most similar chunks.
    ///
    /// Fails with [`RagError::Retrieval`] if the index has not been built
    /// or the query cannot be embedded.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<ScoredChunk>, RagError> {
        let index = self
            .cell
            .get()
            .ok_or_else(|| RagError::Retrieval("index has not been built".to_string()))?;

        let vectors = self
            .embedder
            .embed(&[text.to_string()])
            .await
            .map_err(|e| RagError::Retrieval(format!("query embedding failed: {}", e)))?;
        let query_vec = vectors
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Retrieval("empty embedding response".to_string()))?;

        if query_vec.len() != index.dims() {
            return Err(RagError::Retrieval(format!(
                "query dimensionality {} does not match index {}",
                query_vec.len(),
                index.dims()
            )));
        }

        Ok(index.search(&query_vec, k))
    }
}
