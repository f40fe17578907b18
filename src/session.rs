//! Conversation session: an append-only list of turns plus the active
//! model and voice configuration.
//!
//! Turns are never removed or edited. The only amendment allowed is
//! attaching a speech artifact to a turn that has none.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use docent_core::error::RagError;

use crate::config::Config;
use crate::presets::{ChatModel, Temperature, Voice, VoiceModel};
use crate::speech_cache::SpeechArtifact;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationTurn {
    /// 0-based position in the session.
    pub position: usize,
    pub role: Role,
    /// `None` for an assistant turn whose generation failed.
    pub content: Option<String>,
    pub speech: Option<SpeechArtifact>,
}

/// Active configuration for the next turn.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub model: ChatModel,
    pub temperature: Temperature,
    pub voice_model: VoiceModel,
    pub voice: Voice,
    /// Persona instruction; empty means no persona.
    pub instructions: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            model: ChatModel::default(),
            temperature: Temperature::default(),
            voice_model: VoiceModel::default(),
            voice: Voice::default(),
            instructions: String::new(),
        }
    }
}

impl SessionConfig {
    /// Trim the persona instruction so every consumer sees the same value.
    fn normalized(mut self) -> Self {
        self.instructions = self.instructions.trim().to_string();
        self
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.chat.model,
            temperature: config.chat.temperature,
            voice_model: config.speech.voice_model,
            voice: config.speech.voice,
            instructions: config.speech.resolved_instructions(),
        }
    }
}

#[derive(Debug)]
pub struct SessionState {
    id: Uuid,
    created_at: DateTime<Utc>,
    turns: Vec<ConversationTurn>,
    config: SessionConfig,
}

impl SessionState {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            turns: Vec::new(),
            config: config.normalized(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Replace the configuration used by subsequent turns.
    pub fn set_config(&mut self, config: SessionConfig) {
        self.config = config.normalized();
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn turn(&self, position: usize) -> Option<&ConversationTurn> {
        self.turns.get(position)
    }

    /// Append a turn and return its position.
    pub fn append(&mut self, role: Role, content: Option<String>) -> usize {
        let position = self.turns.len();
        self.turns.push(ConversationTurn {
            position,
            role,
            content,
            speech: None,
        });
        position
    }

    /// Attach `artifact` to the turn at `position`, once.
    pub fn attach_speech(
        &mut self,
        position: usize,
        artifact: SpeechArtifact,
    ) -> Result<(), RagError> {
        let turn = self.turns.get_mut(position).ok_or_else(|| {
            RagError::Synthesis(format!("no turn at position {}", position))
        })?;
        if turn.speech.is_some() {
            return Err(RagError::Synthesis(format!(
                "turn {} already has speech attached",
                position
            )));
        }
        turn.speech = Some(artifact);
        Ok(())
    }
}
