//! Static enumerations for the per-session configuration surface.
//!
//! Chat models, voice models, voices, and persona presets are closed sets.
//! Free-form strings from config files or CLI flags are parsed into these
//! types at the boundary; the pipeline only ever sees resolved values.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use docent_core::error::RagError;

/// Generates `as_str`, `ALL`, `Display`, and `FromStr` for a value enum.
macro_rules! value_enum {
    ($name:ident, $what:literal, { $($variant:ident => $value:literal, $label:literal;)+ }) => {
        impl $name {
            /// Every variant, in presentation order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Value sent to the remote service.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $value),+
                }
            }

            /// Human-readable label for listings.
            pub fn label(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = RagError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($value => Ok($name::$variant),)+
                    other => Err(RagError::InvalidConfig(format!(
                        "unknown {} '{}'; expected one of: {}",
                        $what,
                        other,
                        $name::ALL
                            .iter()
                            .map(|v| v.as_str())
                            .collect::<Vec<_>>()
                            .join(", ")
                    ))),
                }
            }
        }
    };
}

/// Language model used for replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChatModel {
    #[default]
    #[serde(rename = "gpt-4.1-nano")]
    Gpt41Nano,
    #[serde(rename = "gpt-3.5-turbo")]
    Gpt35Turbo,
    #[serde(rename = "gpt-4")]
    Gpt4,
    #[serde(rename = "gpt-4-turbo-preview")]
    Gpt4Turbo,
}

value_enum!(ChatModel, "chat model", {
    Gpt41Nano => "gpt-4.1-nano", "GPT-4.1 Nano";
    Gpt35Turbo => "gpt-3.5-turbo", "GPT-3.5 Turbo";
    Gpt4 => "gpt-4", "GPT-4";
    Gpt4Turbo => "gpt-4-turbo-preview", "GPT-4 Turbo";
});

/// Text-to-speech model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VoiceModel {
    #[default]
    #[serde(rename = "tts-1")]
    Tts1,
    #[serde(rename = "tts-1-hd")]
    Tts1Hd,
}

value_enum!(VoiceModel, "voice model", {
    Tts1 => "tts-1", "TTS-1";
    Tts1Hd => "tts-1-hd", "TTS-1 HD";
});

/// Named synthesis voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Voice {
    #[default]
    Alloy,
    Echo,
    Fable,
    Onyx,
    Nova,
    Shimmer,
}

value_enum!(Voice, "voice", {
    Alloy => "alloy", "Alloy";
    Echo => "echo", "Echo";
    Fable => "fable", "Fable";
    Onyx => "onyx", "Onyx";
    Nova => "nova", "Nova";
    Shimmer => "shimmer", "Shimmer";
});

/// Preset persona instructions. `Default` means no persona.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    #[default]
    Default,
    Cocky,
    Friendly,
    Serious,
    Playful,
    Sad,
    Gangster,
    Drunk,
}

value_enum!(Persona, "persona", {
    Default => "default", "Default";
    Cocky => "cocky", "Cocky";
    Friendly => "friendly", "Friendly";
    Serious => "serious", "Serious";
    Playful => "playful", "Playful";
    Sad => "sad", "Sad";
    Gangster => "gangster", "Gangster";
    Drunk => "drunk", "Drunk";
});

impl Persona {
    /// Instruction string this preset stands for (empty for `Default`).
    pub fn instructions(&self) -> &'static str {
        match self {
            Persona::Default => "",
            Persona::Cocky => "a cocky voice",
            Persona::Friendly => "a friendly and warm voice",
            Persona::Serious => "a serious and authoritative voice",
            Persona::Playful => "a fun and lively voice",
            Persona::Sad => "a sad and emotional voice",
            Persona::Gangster => "a gangster-like way of talking",
            Persona::Drunk => "a drunken voice",
        }
    }
}

/// Sampling temperature, validated to `0.0..=2.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f32", into = "f32")]
pub struct Temperature(f32);

impl Temperature {
    pub const MIN: f32 = 0.0;
    pub const MAX: f32 = 2.0;

    pub fn new(value: f32) -> Result<Self, RagError> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(RagError::InvalidConfig(format!(
                "temperature must be in [{}, {}], got {}",
                Self::MIN,
                Self::MAX,
                value
            )))
        }
    }

    pub fn value(&self) -> f32 {
        self.0
    }
}

impl Default for Temperature {
    fn default() -> Self {
        Self(0.7)
    }
}

impl TryFrom<f32> for Temperature {
    type Error = RagError;

    fn try_from(value: f32) -> Result<Self, Self::Error> {
        Temperature::new(value)
    }
}

impl From<Temperature> for f32 {
    fn from(t: Temperature) -> f32 {
        t.0
    }
}
