//! TOML configuration.
//!
//! Every section and field has a default, so an empty file is a valid
//! configuration. See `config/docent.example.toml` for a full example.
//!
//! ```toml
//! [corpus]
//! root = "./pdfs"
//!
//! [chunking]
//! max_chars = 500
//! overlap_chars = 200
//!
//! [embedding]
//! provider = "openai"
//! model = "text-embedding-3-small"
//! dims = 1536
//!
//! [chat]
//! model = "gpt-4.1-nano"
//! temperature = 0.7
//!
//! [speech]
//! voice = "alloy"
//! persona = "friendly"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use docent_core::chunk::validate_params;
use docent_core::index::Metric;

use crate::presets::{ChatModel, Persona, Temperature, Voice, VoiceModel};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    #[serde(default = "default_corpus_root")]
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            root: default_corpus_root(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

fn default_corpus_root() -> PathBuf {
    PathBuf::from("./pdfs")
}

fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.txt".to_string(),
        "**/*.md".to_string(),
        "**/*.pdf".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    500
}
fn default_overlap_chars() -> usize {
    200
}

/// What a turn does when retrieval fails.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalPolicy {
    /// Generate without retrieved context and report the error.
    #[default]
    Degrade,
    /// Stop the turn; record an assistant turn without content.
    Abort,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub metric: Metric,
    #[serde(default)]
    pub on_error: RetrievalPolicy,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            metric: Metric::default(),
            on_error: RetrievalPolicy::default(),
        }
    }
}

fn default_top_k() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
        }
    }
}

fn default_provider() -> String {
    "hashing".to_string()
}
fn default_batch_size() -> usize {
    64
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

/// Remote service settings shared by the embedding, chat, and speech clients.
#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Environment variable holding the bearer token.
    #[serde(default = "default_key_env")]
    pub key_env: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            key_env: default_key_env(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default)]
    pub model: ChatModel,
    #[serde(default)]
    pub temperature: Temperature,
    /// Persona system message; `{instructions}` is replaced by the active
    /// instruction string.
    #[serde(default = "default_persona_template")]
    pub persona_template: String,
    /// Trailing system message; `{context}` is replaced by retrieved text.
    #[serde(default = "default_context_template")]
    pub context_template: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: ChatModel::default(),
            temperature: Temperature::default(),
            persona_template: default_persona_template(),
            context_template: default_context_template(),
        }
    }
}

fn default_persona_template() -> String {
    "You are an AI assistant who speaks with {instructions}. Keep this tone and style in every reply."
        .to_string()
}
fn default_context_template() -> String {
    "The following relevant information was found in the documents: {context}".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SpeechConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_speech_dir")]
    pub dir: PathBuf,
    #[serde(default)]
    pub voice_model: VoiceModel,
    #[serde(default)]
    pub voice: Voice,
    /// Preset persona. Mutually exclusive with `instructions`.
    #[serde(default)]
    pub persona: Option<Persona>,
    /// Free-text persona instructions.
    #[serde(default)]
    pub instructions: Option<String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: default_speech_dir(),
            voice_model: VoiceModel::default(),
            voice: Voice::default(),
            persona: None,
            instructions: None,
        }
    }
}

impl SpeechConfig {
    /// The instruction string selected by `persona` or `instructions`.
    pub fn resolved_instructions(&self) -> String {
        match (&self.instructions, self.persona) {
            (Some(text), _) => text.trim().to_string(),
            (None, Some(preset)) => preset.instructions().to_string(),
            (None, None) => String::new(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_speech_dir() -> PathBuf {
    PathBuf::from("speech_files")
}

#[derive(Debug, Deserialize, Clone)]
pub struct PlaybackConfig {
    #[serde(default)]
    pub enabled: bool,
    /// External player; receives the audio path as its last argument.
    #[serde(default = "default_player")]
    pub command: String,
    #[serde(default = "default_player_args")]
    pub args: Vec<String>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            command: default_player(),
            args: default_player_args(),
        }
    }
}

fn default_player() -> String {
    "mpg123".to_string()
}
fn default_player_args() -> Vec<String> {
    vec!["-q".to_string()]
}

impl Config {
    /// Configuration with every default and the offline embedder.
    pub fn minimal() -> Self {
        Self::default()
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        validate_params(self.chunking.max_chars, self.chunking.overlap_chars)?;

        if self.retrieval.top_k == 0 {
            bail!("retrieval.top_k must be >= 1");
        }

        if self.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be >= 1");
        }

        match self.embedding.provider.as_str() {
            "disabled" | "openai" | "hashing" => {}
            other => bail!(
                "Unknown embedding provider: '{}'. Must be disabled, openai, or hashing.",
                other
            ),
        }

        if self.embedding.dims == Some(0) {
            bail!("embedding.dims must be > 0");
        }
        if self.embedding.provider == "openai" {
            if self.embedding.dims.is_none() {
                bail!("embedding.dims must be set when provider is 'openai'");
            }
            if self.embedding.model.is_none() {
                bail!("embedding.model must be set when provider is 'openai'");
            }
        }

        if self.speech.persona.is_some() && self.speech.instructions.is_some() {
            bail!("speech.persona and speech.instructions are mutually exclusive");
        }

        if !self.chat.persona_template.contains("{instructions}") {
            bail!("chat.persona_template must contain '{{instructions}}'");
        }
        if !self.chat.context_template.contains("{context}") {
            bail!("chat.context_template must contain '{{context}}'");
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}
