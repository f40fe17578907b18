//! Wiring from [`Config`] to the running pipeline.
//!
//! [`App`] owns the shared, build-once [`EmbeddingIndex`] and hands out
//! retrievers, orchestrators, and sessions configured from one file.
//! Remote services are injected, so tests can substitute fakes for the
//! language-model and speech endpoints.

use anyhow::Result;
use std::sync::Arc;

use docent_core::embedding::Embedder;
use docent_core::error::RagError;
use docent_core::index::Index;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::http::ApiClient;
use crate::index::EmbeddingIndex;
use crate::ingest::ingest;
use crate::llm::{ChatCompletion, OpenAIChat};
use crate::orchestrator::{ConversationOrchestrator, PromptTemplates};
use crate::playback::{AudioPlayer, CommandPlayer};
use crate::retrieve::Retriever;
use crate::session::{SessionConfig, SessionState};
use crate::speech_cache::SpeechCache;
use crate::tts::{OpenAISpeech, SpeechSynthesizer};

pub struct App {
    config: Config,
    index: Arc<EmbeddingIndex>,
}

impl App {
    pub fn new(config: Config, embedder: Arc<dyn Embedder>) -> Self {
        let index = Arc::new(EmbeddingIndex::new(
            embedder,
            config.retrieval.metric,
            config.embedding.batch_size,
        ));
        Self { config, index }
    }

    /// Build an app with the embedder named in the configuration.
    pub fn from_config(config: Config) -> Result<Self> {
        let embedder = create_embedder(&config)?;
        Ok(Self::new(config, embedder))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn index(&self) -> &Arc<EmbeddingIndex> {
        &self.index
    }

    /// Ingest the corpus and build the index, once.
    pub async fn load_index(&self) -> Result<Arc<Index>, RagError> {
        let config = self.config.clone();
        self.index
            .get_or_build(|| async move {
                let (chunks, _stats) = tokio::task::spawn_blocking(move || ingest(&config))
                    .await
                    .map_err(|e| RagError::InvalidConfig(format!("ingest task failed: {}", e)))?
                    .map_err(|e| RagError::InvalidConfig(format!("{:#}", e)))?;
                Ok(chunks)
            })
            .await
    }

    pub fn retriever(&self) -> Retriever {
        Retriever::new(Arc::clone(&self.index), self.config.retrieval.top_k)
    }

    pub fn speech_cache(&self, synthesizer: Arc<dyn SpeechSynthesizer>) -> Arc<SpeechCache> {
        Arc::new(SpeechCache::new(self.config.speech.dir.clone(), synthesizer))
    }

    pub fn orchestrator(
        &self,
        llm: Arc<dyn ChatCompletion>,
        speech: Option<Arc<SpeechCache>>,
    ) -> ConversationOrchestrator {
        ConversationOrchestrator::new(self.retriever(), llm, speech)
            .with_policy(self.config.retrieval.on_error)
            .with_templates(PromptTemplates::from_config(&self.config.chat))
    }

    /// Chat and speech clients for the configured API.
    ///
    /// The speech client is `None` when `speech.enabled = false`.
    pub fn remote_services(
        &self,
    ) -> Result<(Arc<dyn ChatCompletion>, Option<Arc<dyn SpeechSynthesizer>>)> {
        let client = ApiClient::from_config(&self.config.api)?;
        let llm: Arc<dyn ChatCompletion> = Arc::new(OpenAIChat::new(client.clone()));
        let speech: Option<Arc<dyn SpeechSynthesizer>> = if self.config.speech.enabled {
            Some(Arc::new(OpenAISpeech::new(client)))
        } else {
            None
        };
        Ok((llm, speech))
    }

    pub fn player(&self) -> Option<Arc<dyn AudioPlayer>> {
        if !self.config.playback.enabled {
            return None;
        }
        Some(Arc::new(CommandPlayer::from_config(&self.config.playback)))
    }

    pub fn new_session(&self) -> SessionState {
        SessionState::new(SessionConfig::from_config(&self.config))
    }
}
