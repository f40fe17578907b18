//! Per-turn state machine with validated transitions.
//!
//! Pending -> Retrieving -> Generating -> SpeechPending -> Complete
//! Retrieving | Generating | SpeechPending -> Errored

use serde::Serialize;
use std::fmt;

use docent_core::error::RagError;

/// Pipeline stage at which a turn failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Retrieval,
    Generation,
    Synthesis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum TurnState {
    Pending,
    Retrieving,
    Generating,
    SpeechPending,
    Complete,
    Errored { stage: Stage },
}

impl TurnState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnState::Complete | TurnState::Errored { .. })
    }

    /// True when the turn ended with assistant text, with or without speech.
    pub fn has_reply(&self) -> bool {
        matches!(
            self,
            TurnState::Complete
                | TurnState::Errored {
                    stage: Stage::Synthesis
                }
        )
    }
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnState::Pending => f.write_str("pending"),
            TurnState::Retrieving => f.write_str("retrieving"),
            TurnState::Generating => f.write_str("generating"),
            TurnState::SpeechPending => f.write_str("speech_pending"),
            TurnState::Complete => f.write_str("complete"),
            TurnState::Errored { stage } => write!(f, "errored({:?})", stage),
        }
    }
}

/// Validate that a turn state transition is allowed.
///
/// Valid transitions:
/// - Pending -> Retrieving
/// - Retrieving -> Generating
/// - Generating -> SpeechPending
/// - SpeechPending -> Complete
/// - Retrieving -> Errored(Retrieval)
/// - Generating -> Errored(Generation)
/// - SpeechPending -> Errored(Synthesis)
pub fn validate_transition(from: TurnState, to: TurnState) -> Result<(), RagError> {
    use TurnState::*;

    let valid = matches!(
        (from, to),
        (Pending, Retrieving)
            | (Retrieving, Generating)
            | (Generating, SpeechPending)
            | (SpeechPending, Complete)
            | (Retrieving, Errored { stage: Stage::Retrieval })
            | (Generating, Errored { stage: Stage::Generation })
            | (SpeechPending, Errored { stage: Stage::Synthesis })
    );

    if valid {
        Ok(())
    } else {
        Err(RagError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

/// Current state of one turn; every move is validated and logged.
#[derive(Debug)]
pub struct TurnTracker {
    state: TurnState,
}

impl Default for TurnTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnTracker {
    pub fn new() -> Self {
        Self {
            state: TurnState::Pending,
        }
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn advance(&mut self, to: TurnState) -> Result<(), RagError> {
        validate_transition(self.state, to)?;
        tracing::debug!(from = %self.state, to = %to, "turn transition");
        self.state = to;
        Ok(())
    }

    /// Move to `Errored` at the stage matching the current state.
    pub fn fail(&mut self) -> Result<(), RagError> {
        let stage = match self.state {
            TurnState::Retrieving => Stage::Retrieval,
            TurnState::Generating => Stage::Generation,
            TurnState::SpeechPending => Stage::Synthesis,
            other => {
                return Err(RagError::InvalidTransition {
                    from: other.to_string(),
                    to: "errored".to_string(),
                })
            }
        };
        self.advance(TurnState::Errored { stage })
    }
}
