//! In-process fakes for the remote services.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use docent::app::App;
use docent::config::Config;
use docent::llm::{ChatCompletion, ChatRequest};
use docent::tts::{SpeechRequest, SpeechSynthesizer};
use docent::RagError;

/// Chat model that replays scripted results and records every request.
#[derive(Default)]
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<Result<String, RagError>>>,
    pub requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedLlm {
    pub fn new(replies: Vec<Result<String, RagError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> ChatRequest {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl ChatCompletion for ScriptedLlm {
    async fn complete(&self, request: &ChatRequest) -> Result<String, RagError> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("ok".to_string()))
    }
}

/// Speech service that writes the input text as the "audio".
pub struct RecordingSynth {
    pub calls: AtomicUsize,
    pub delay: Duration,
    pub fail: bool,
}

impl RecordingSynth {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
            fail: false,
        })
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            delay,
            fail: false,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
            fail: true,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechSynthesizer for RecordingSynth {
    async fn synthesize(&self, request: &SpeechRequest, dest: &Path) -> Result<(), RagError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(RagError::Synthesis("speech service unavailable".to_string()));
        }
        tokio::fs::write(dest, request.input.as_bytes())
            .await
            .map_err(|e| RagError::Synthesis(e.to_string()))
    }
}

/// An app over `documents` in a fresh corpus directory, offline embedder.
pub fn app_with_corpus(root: &Path, documents: &[(&str, &str)]) -> App {
    app_with(root, documents, |_| {})
}

pub fn app_with(root: &Path, documents: &[(&str, &str)], tweak: impl FnOnce(&mut Config)) -> App {
    let corpus = root.join("corpus");
    std::fs::create_dir_all(&corpus).unwrap();
    for (name, text) in documents {
        std::fs::write(corpus.join(name), text).unwrap();
    }

    let mut config = Config::minimal();
    config.corpus.root = corpus;
    config.speech.dir = root.join("speech_files");
    tweak(&mut config);
    config.validate().unwrap();
    App::from_config(config).unwrap()
}

pub const BANK_DOC: &str = "Bank account opening requires ID and address proof.";
