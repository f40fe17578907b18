//! Embedding providers.
//!
//! Implementations of [`docent_core::embedding::Embedder`]:
//! - **[`DisabledEmbedder`]**: returns errors; used when embeddings are not configured.
//! - **[`OpenAIEmbedder`]**: calls `POST {base_url}/embeddings` with retry and backoff.
//! - **[`HashingEmbedder`]**: offline feature hashing, re-exported from the core crate.
//!
//! # Provider Selection
//!
//! Use [`create_embedder`] to instantiate the provider named by
//! `embedding.provider`:
//!
//! ```rust,no_run
//! # use docent::config::Config;
//! # use docent::embedding::create_embedder;
//! let config = Config::minimal(); // provider = "hashing"
//! let embedder = create_embedder(&config).unwrap();
//! assert_eq!(embedder.model_name(), "hashing");
//! ```

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;

use docent_core::embedding::Embedder;
pub use docent_core::embedding::HashingEmbedder;
use docent_core::error::RagError;

use crate::config::Config;
use crate::http::ApiClient;

/// Default dimensionality of the hashing embedder.
pub const DEFAULT_HASHING_DIMS: usize = 256;

// ============ Disabled Provider ============

/// An embedder that always fails.
///
/// Used when `embedding.provider = "disabled"`. Building an index with it
/// fails at startup with [`RagError::Embedding`].
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        Err(RagError::Embedding(
            "embedding provider is disabled".to_string(),
        ))
    }
}

// ============ OpenAI Provider ============

/// Embedder backed by the OpenAI embeddings API.
pub struct OpenAIEmbedder {
    client: ApiClient,
    model: String,
    dims: usize,
}

impl OpenAIEmbedder {
    pub fn new(client: ApiClient, model: impl Into<String>, dims: usize) -> Self {
        Self {
            client,
            model: model.into(),
            dims,
        }
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post_json("embeddings", &body)
            .await
            .map_err(|e| RagError::Embedding(e.message))?;

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RagError::Embedding(format!("invalid response body: {}", e)))?;

        parse_openai_response(&json).map_err(|e| RagError::Embedding(e.to_string()))
    }
}

/// Parse the embeddings API response JSON.
///
/// Extracts the `data[].embedding` arrays and returns them ordered by
/// each item's `index` field (input order).
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid embeddings response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());

    for (position, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow::anyhow!("Invalid embeddings response: missing embedding"))?;

        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();

        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        indexed.push((index, vec));
    }

    indexed.sort_by_key(|(i, _)| *i);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

/// Create the [`Embedder`] named by `embedding.provider`.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledEmbedder`] |
/// | `"hashing"` | [`HashingEmbedder`] |
/// | `"openai"` | [`OpenAIEmbedder`] |
///
/// # Errors
///
/// Returns an error for unknown provider names or if the OpenAI provider
/// cannot be initialized (missing config or API key).
pub fn create_embedder(config: &Config) -> Result<Arc<dyn Embedder>> {
    let emb = &config.embedding;
    match emb.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledEmbedder)),
        "hashing" => {
            let dims = emb.dims.unwrap_or(DEFAULT_HASHING_DIMS);
            Ok(Arc::new(HashingEmbedder::new(dims)?))
        }
        "openai" => {
            let model = emb
                .model
                .clone()
                .ok_or_else(|| anyhow::anyhow!("embedding.model required for OpenAI provider"))?;
            let dims = emb
                .dims
                .ok_or_else(|| anyhow::anyhow!("embedding.dims required for OpenAI provider"))?;
            let client = ApiClient::from_config(&config.api)?;
            Ok(Arc::new(OpenAIEmbedder::new(client, model, dims)))
        }
        other => bail!("Unknown embedding provider: {}", other),
    }
}
