//! Chat-completion client.
//!
//! [`ChatCompletion`] is the seam the orchestrator talks to; [`OpenAIChat`]
//! implements it against `POST {base_url}/chat/completions`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use docent_core::error::RagError;

use crate::http::ApiClient;
use crate::session::Role;

/// One message of a chat-completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub temperature: f32,
    pub messages: Vec<ChatMessage>,
}

/// A language-model service producing one reply per request.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Return the reply text, or [`RagError::Generation`].
    async fn complete(&self, request: &ChatRequest) -> Result<String, RagError>;
}

/// OpenAI-compatible chat-completions client.
pub struct OpenAIChat {
    client: ApiClient,
}

impl OpenAIChat {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[async_trait]
impl ChatCompletion for OpenAIChat {
    async fn complete(&self, request: &ChatRequest) -> Result<String, RagError> {
        let response = self
            .client
            .post_json("chat/completions", request)
            .await
            .map_err(|e| RagError::Generation {
                status: e.status,
                message: e.message,
            })?;

        let body: CompletionResponse =
            response
                .json()
                .await
                .map_err(|e| RagError::Generation {
                    status: None,
                    message: format!("invalid response body: {}", e),
                })?;

        parse_reply(body)
    }
}

fn parse_reply(body: CompletionResponse) -> Result<String, RagError> {
    body.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| RagError::Generation {
            status: None,
            message: "response contained no reply".to_string(),
        })
}
