//! Shared HTTP client for the OpenAI-compatible services.
//!
//! Every remote call (embeddings, chat completions, speech) goes through
//! [`ApiClient::post_json`], which applies the retry policy:
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: base, 2×base, 4×base, ... (capped at 2^5 × base)

use anyhow::{bail, Result};
use serde::Serialize;
use std::time::Duration;

use crate::config::ApiConfig;

/// A failed request after the retry policy gave up.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    /// HTTP status of the final response, if one was received.
    pub status: Option<u16>,
    pub message: String,
}

/// Authenticated client bound to one API base URL.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    max_retries: u32,
    backoff_base: Duration,
}

impl ApiClient {
    /// Build a client from `[api]`, reading the key from `key_env`.
    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        let api_key = match std::env::var(&config.key_env) {
            Ok(key) if !key.trim().is_empty() => key,
            _ => bail!("{} environment variable not set", config.key_env),
        };
        Self::new(
            &config.base_url,
            api_key,
            config.max_retries,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn new(
        base_url: &str,
        api_key: String,
        max_retries: u32,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            max_retries,
            backoff_base: Duration::from_secs(1),
        })
    }

    /// Override the first backoff delay.
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST `body` as JSON to `{base_url}/{path}` and return the first
    /// successful response.
    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, ApiError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.backoff_base * (1u32 << (attempt - 1).min(5));
                tracing::debug!(%url, attempt, ?delay, "retrying request");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    let err = ApiError {
                        status: Some(status.as_u16()),
                        message: format!("API error {}: {}", status, body_text),
                    };

                    if status.as_u16() == 429 || status.is_server_error() {
                        tracing::warn!(%url, status = status.as_u16(), "transient API error");
                        last_err = Some(err);
                        continue;
                    }

                    return Err(err);
                }
                Err(e) => {
                    tracing::warn!(%url, error = %e, "request failed");
                    last_err = Some(ApiError {
                        status: None,
                        message: e.to_string(),
                    });
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| ApiError {
            status: None,
            message: "request failed after retries".to_string(),
        }))
    }
}
