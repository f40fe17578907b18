//! # Docent
//!
//! Answers questions from a private document corpus and narrates the
//! replies as speech.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌───────────┐
//! │  Corpus  │──▶│ Chunk+Embed  │──▶│   Index   │
//! │ txt/pdf  │   │ (docent-core)│   │ (in-mem)  │
//! └──────────┘   └──────────────┘   └─────┬─────┘
//!                                         │ retrieve
//!   user text ──▶ ┌──────────────┐ ◀──────┘
//!                 │ Orchestrator │──▶ chat model
//!                 └──────┬───────┘
//!                        ▼
//!                 ┌──────────────┐   ┌──────────┐
//!                 │ Speech cache │──▶│ playback │
//!                 └──────────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docent index                          # ingest and embed ./pdfs
//! docent search "account opening"       # nearest chunks
//! docent ask "How do I open an account?" --persona friendly
//! docent chat --voice nova              # interactive, 'exit' to quit
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`presets`] | Chat models, voices, personas, temperature |
//! | [`corpus`] | Directory walk and text extraction |
//! | [`ingest`] | Corpus loading and chunking |
//! | [`embedding`] | Embedding providers |
//! | [`index`] | Build-once embedding index |
//! | [`retrieve`] | Context retrieval |
//! | [`llm`] | Chat-completion client |
//! | [`tts`] | Speech-synthesis client |
//! | [`speech_cache`] | Content-addressed speech artifacts |
//! | [`session`] | Conversation turns and session settings |
//! | [`turn`] | Per-turn state machine |
//! | [`orchestrator`] | One conversational turn end to end |
//! | [`playback`] | Cancellable audio playback |
//! | [`app`] | Wiring from configuration |

pub mod app;
pub mod commands;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod http;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod logging;
pub mod orchestrator;
pub mod playback;
pub mod presets;
pub mod retrieve;
pub mod session;
pub mod speech_cache;
pub mod tts;
pub mod turn;

pub use docent_core::error::RagError;
