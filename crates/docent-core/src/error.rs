//! Error taxonomy shared by every stage of the pipeline.
//!
//! Each variant maps to one failure class of a conversational turn, so
//! callers can tell a bad chunking configuration apart from a model
//! refusal or a failed speech synthesis without parsing messages.
//!
//! | Variant | Fatal? | Raised by |
//! |---------|--------|-----------|
//! | [`InvalidConfig`](RagError::InvalidConfig) | yes, before ingestion | chunker, config validation |
//! | [`EmptyCorpus`](RagError::EmptyCorpus) | yes, at startup | index build |
//! | [`Embedding`](RagError::Embedding) | yes, at startup | index build |
//! | [`Retrieval`](RagError::Retrieval) | no | retriever |
//! | [`Generation`](RagError::Generation) | no | language-model client |
//! | [`Synthesis`](RagError::Synthesis) | no | speech cache |
//! | [`InvalidTransition`](RagError::InvalidTransition) | no | turn state machine |

/// Errors produced by the retrieval, generation, and narration pipeline.
///
/// Payloads are plain strings so the error stays `Clone` and can be
/// recorded on a turn outcome as well as returned to the caller.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RagError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("corpus is empty: no chunks to index")]
    EmptyCorpus,

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("retrieval failed: {0}")]
    Retrieval(String),

    #[error("generation failed{}: {message}", status_suffix(.status))]
    Generation {
        /// HTTP status returned by the model service, if any.
        status: Option<u16>,
        message: String,
    },

    #[error("speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("invalid turn transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default()
}

impl RagError {
    /// True when the model service rejected the request as malformed (HTTP 400).
    pub fn is_bad_request(&self) -> bool {
        matches!(self, RagError::Generation { status: Some(400), .. })
    }

    /// True for failures that leave the process unable to serve any turn.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RagError::InvalidConfig(_) | RagError::EmptyCorpus | RagError::Embedding(_)
        )
    }
}
