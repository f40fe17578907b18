//! Conversation orchestrator: one user utterance in, one assistant turn out.
//!
//! A turn runs strictly in sequence:
//!
//! 1. append the user turn
//! 2. retrieve context for the utterance
//! 3. build messages: persona system message (if any), every turn with
//!    content in order, trailing system message with the context
//! 4. call the language model with the session's model and temperature
//! 5. append the assistant turn and attach its synthesized speech
//!
//! Failures never remove turns. A generation failure appends an assistant
//! turn without content; a synthesis failure keeps the text-only turn.

use std::sync::Arc;
use std::time::Instant;

use docent_core::error::RagError;

use crate::config::{ChatConfig, RetrievalPolicy};
use crate::llm::{ChatCompletion, ChatMessage, ChatRequest};
use crate::retrieve::{Retrieved, Retriever};
use crate::session::{ConversationTurn, Role, SessionState};
use crate::speech_cache::{SpeechArtifact, SpeechCache};
use crate::turn::{TurnState, TurnTracker};

/// System message templates.
#[derive(Debug, Clone)]
pub struct PromptTemplates {
    /// Must contain `{instructions}`.
    pub persona: String,
    /// Must contain `{context}`.
    pub context: String,
}

impl PromptTemplates {
    pub fn from_config(chat: &ChatConfig) -> Self {
        Self {
            persona: chat.persona_template.clone(),
            context: chat.context_template.clone(),
        }
    }

    pub fn persona_message(&self, instructions: &str) -> String {
        self.persona.replace("{instructions}", instructions)
    }

    pub fn context_message(&self, context: &str) -> String {
        self.context.replace("{context}", context)
    }
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self::from_config(&ChatConfig::default())
    }
}

/// Result of one call to [`ConversationOrchestrator::respond`].
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// The assistant turn appended by this call.
    pub turn: ConversationTurn,
    /// Terminal state of the turn.
    pub state: TurnState,
    /// Every error raised during the turn, in order.
    pub errors: Vec<RagError>,
    /// Context the reply was grounded on.
    pub retrieved: Retrieved,
}

impl TurnOutcome {
    pub fn is_complete(&self) -> bool {
        self.state == TurnState::Complete
    }

    /// The reply turn, or the error that prevented a reply.
    ///
    /// A synthesis failure still yields `Ok`: the turn has text.
    pub fn into_result(self) -> Result<ConversationTurn, RagError> {
        if self.state.has_reply() {
            return Ok(self.turn);
        }
        Err(self.errors.into_iter().last().unwrap_or_else(|| {
            RagError::Generation {
                status: None,
                message: "turn ended without a reply".to_string(),
            }
        }))
    }
}

/// Build the outbound message list for the next model call.
pub fn build_messages(
    session: &SessionState,
    context: &str,
    templates: &PromptTemplates,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(session.len() + 2);

    let instructions = session.config().instructions.as_str();
    if !instructions.is_empty() {
        messages.push(ChatMessage::system(templates.persona_message(instructions)));
    }

    for turn in session.turns() {
        if let Some(content) = &turn.content {
            messages.push(ChatMessage {
                role: turn.role,
                content: content.clone(),
            });
        }
    }

    messages.push(ChatMessage::system(templates.context_message(context)));
    messages
}

pub struct ConversationOrchestrator {
    retriever: Retriever,
    llm: Arc<dyn ChatCompletion>,
    speech: Option<Arc<SpeechCache>>,
    policy: RetrievalPolicy,
    templates: PromptTemplates,
}

impl ConversationOrchestrator {
    pub fn new(
        retriever: Retriever,
        llm: Arc<dyn ChatCompletion>,
        speech: Option<Arc<SpeechCache>>,
    ) -> Self {
        Self {
            retriever,
            llm,
            speech,
            policy: RetrievalPolicy::default(),
            templates: PromptTemplates::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetrievalPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_templates(mut self, templates: PromptTemplates) -> Self {
        self.templates = templates;
        self
    }

    pub fn templates(&self) -> &PromptTemplates {
        &self.templates
    }

    /// Run one conversational turn for `user_text`.
    pub async fn respond(&self, session: &mut SessionState, user_text: &str) -> TurnOutcome {
        let started = Instant::now();
        let mut tracker = TurnTracker::new();
        let mut errors = Vec::new();

        session.append(Role::User, Some(user_text.to_string()));

        step(&mut tracker, TurnState::Retrieving, &mut errors);
        let retrieved = match self.retriever.retrieve(user_text).await {
            Ok(retrieved) => retrieved,
            Err(e) => {
                tracing::warn!(error = %e, policy = ?self.policy, "retrieval failed");
                errors.push(e);
                match self.policy {
                    RetrievalPolicy::Degrade => Retrieved::default(),
                    RetrievalPolicy::Abort => {
                        fail(&mut tracker, &mut errors);
                        let retrieved = Retrieved::default();
                        return self.finish(session, None, tracker, errors, retrieved, started);
                    }
                }
            }
        };

        step(&mut tracker, TurnState::Generating, &mut errors);
        let request = ChatRequest {
            model: session.config().model.as_str().to_string(),
            temperature: session.config().temperature.value(),
            messages: build_messages(session, &retrieved.context(), &self.templates),
        };

        let reply = match self.llm.complete(&request).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    bad_request = e.is_bad_request(),
                    "generation failed"
                );
                errors.push(e);
                fail(&mut tracker, &mut errors);
                return self.finish(session, None, tracker, errors, retrieved, started);
            }
        };

        step(&mut tracker, TurnState::SpeechPending, &mut errors);
        let position = session.append(Role::Assistant, Some(reply.clone()));

        match self.speak(session, &reply).await {
            Ok(Some(artifact)) => {
                if let Err(e) = session.attach_speech(position, artifact) {
                    errors.push(e);
                }
                step(&mut tracker, TurnState::Complete, &mut errors);
            }
            Ok(None) => step(&mut tracker, TurnState::Complete, &mut errors),
            Err(e) => {
                tracing::warn!(error = %e, "speech synthesis failed; keeping text-only turn");
                errors.push(e);
                fail(&mut tracker, &mut errors);
            }
        }

        self.outcome(session, position, tracker, errors, retrieved, started)
    }

    /// Synthesize speech for an earlier assistant turn that has none.
    ///
    /// Returns the existing artifact if the turn already has one.
    pub async fn narrate(
        &self,
        session: &mut SessionState,
        position: usize,
    ) -> Result<SpeechArtifact, RagError> {
        let turn = session
            .turn(position)
            .ok_or_else(|| RagError::Synthesis(format!("no turn at position {}", position)))?;

        if turn.role != Role::Assistant {
            return Err(RagError::Synthesis(format!(
                "turn {} is not an assistant reply",
                position
            )));
        }
        if let Some(existing) = &turn.speech {
            return Ok(existing.clone());
        }
        let text = turn
            .content
            .clone()
            .ok_or_else(|| RagError::Synthesis(format!("turn {} has no content", position)))?;

        let artifact = self
            .speak(session, &text)
            .await?
            .ok_or_else(|| RagError::Synthesis("speech is disabled".to_string()))?;
        session.attach_speech(position, artifact.clone())?;
        Ok(artifact)
    }

    async fn speak(
        &self,
        session: &SessionState,
        text: &str,
    ) -> Result<Option<SpeechArtifact>, RagError> {
        let Some(cache) = &self.speech else {
            return Ok(None);
        };
        let cfg = session.config();
        cache
            .synthesize(text, cfg.voice_model, cfg.voice, &cfg.instructions)
            .await
            .map(Some)
    }

    fn finish(
        &self,
        session: &mut SessionState,
        content: Option<String>,
        tracker: TurnTracker,
        errors: Vec<RagError>,
        retrieved: Retrieved,
        started: Instant,
    ) -> TurnOutcome {
        let position = session.append(Role::Assistant, content);
        self.outcome(session, position, tracker, errors, retrieved, started)
    }

    fn outcome(
        &self,
        session: &SessionState,
        position: usize,
        tracker: TurnTracker,
        errors: Vec<RagError>,
        retrieved: Retrieved,
        started: Instant,
    ) -> TurnOutcome {
        let state = tracker.state();
        tracing::info!(
            session = %session.id(),
            position,
            %state,
            errors = errors.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "turn finished"
        );

        let turn = match session.turn(position) {
            Some(turn) => turn.clone(),
            None => ConversationTurn {
                position,
                role: Role::Assistant,
                content: None,
                speech: None,
            },
        };

        TurnOutcome {
            turn,
            state,
            errors,
            retrieved,
        }
    }
}

fn step(tracker: &mut TurnTracker, to: TurnState, errors: &mut Vec<RagError>) {
    if let Err(e) = tracker.advance(to) {
        errors.push(e);
    }
}

fn fail(tracker: &mut TurnTracker, errors: &mut Vec<RagError>) {
    if let Err(e) = tracker.fail() {
        errors.push(e);
    }
}
