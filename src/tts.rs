//! Text-to-speech client.
//!
//! [`SpeechSynthesizer`] writes one audio file per request. The
//! [`crate::speech_cache::SpeechCache`] decides where and whether to call it.

use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;
use tokio::io::AsyncWriteExt;

use docent_core::error::RagError;

use crate::http::ApiClient;
use crate::presets::{Voice, VoiceModel};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeechRequest {
    pub model: VoiceModel,
    pub voice: Voice,
    pub input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    pub response_format: &'static str,
}

impl SpeechRequest {
    pub fn new(input: &str, model: VoiceModel, voice: Voice, instructions: &str) -> Self {
        Self {
            model,
            voice,
            input: input.to_string(),
            instructions: (!instructions.is_empty()).then(|| instructions.to_string()),
            response_format: "mp3",
        }
    }
}

/// A speech service that renders text into an audio file.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Write the synthesized audio for `request` to `dest`.
    async fn synthesize(&self, request: &SpeechRequest, dest: &Path) -> Result<(), RagError>;
}

/// OpenAI-compatible `POST {base_url}/audio/speech` client.
pub struct OpenAISpeech {
    client: ApiClient,
}

impl OpenAISpeech {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAISpeech {
    async fn synthesize(&self, request: &SpeechRequest, dest: &Path) -> Result<(), RagError> {
        let mut response = self
            .client
            .post_json("audio/speech", request)
            .await
            .map_err(|e| RagError::Synthesis(e.message))?;

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| RagError::Synthesis(format!("{}: {}", dest.display(), e)))?;

        let mut written = 0usize;
        while let Some(bytes) = response
            .chunk()
            .await
            .map_err(|e| RagError::Synthesis(format!("audio stream failed: {}", e)))?
        {
            written += bytes.len();
            file.write_all(&bytes)
                .await
                .map_err(|e| RagError::Synthesis(e.to_string()))?;
        }
        file.flush()
            .await
            .map_err(|e| RagError::Synthesis(e.to_string()))?;

        tracing::debug!(path = %dest.display(), bytes = written, "speech written");
        Ok(())
    }
}
