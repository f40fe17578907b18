//! Implementations of the `docent` subcommands.
//!
//! Each `run_*` function prints human-readable output to stdout and
//! returns `anyhow::Result` so `main` can report failures uniformly.

use anyhow::{bail, Result};
use clap::Args;
use std::collections::BTreeSet;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use docent_core::error::RagError;

use crate::app::App;
use crate::llm::ChatCompletion;
use crate::orchestrator::{ConversationOrchestrator, TurnOutcome};
use crate::playback::{spawn_playback, PlaybackHandle, PlaybackOutcome};
use crate::presets::{ChatModel, Persona, Temperature, Voice, VoiceModel};
use crate::session::{Role, SessionConfig, SessionState};
use crate::speech_cache::SpeechCache;
use crate::tts::SpeechSynthesizer;

/// Per-invocation overrides of the configured session settings.
#[derive(Args, Debug, Clone, Default)]
pub struct SessionOverrides {
    /// Chat model (gpt-4.1-nano, gpt-3.5-turbo, gpt-4, gpt-4-turbo-preview).
    #[arg(long)]
    pub model: Option<ChatModel>,

    /// Sampling temperature, 0.0 to 2.0.
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Speech model (tts-1, tts-1-hd).
    #[arg(long)]
    pub voice_model: Option<VoiceModel>,

    /// Voice (alloy, echo, fable, onyx, nova, shimmer).
    #[arg(long)]
    pub voice: Option<Voice>,

    /// Persona preset; see `docent presets`.
    #[arg(long, conflicts_with = "instructions")]
    pub persona: Option<Persona>,

    /// Free-text persona instructions.
    #[arg(long)]
    pub instructions: Option<String>,
}

impl SessionOverrides {
    pub fn apply(&self, config: &mut SessionConfig) -> Result<()> {
        if self.persona.is_some() && self.instructions.is_some() {
            bail!("--persona and --instructions are mutually exclusive");
        }
        if let Some(model) = self.model {
            config.model = model;
        }
        if let Some(t) = self.temperature {
            config.temperature = Temperature::new(t)?;
        }
        if let Some(vm) = self.voice_model {
            config.voice_model = vm;
        }
        if let Some(v) = self.voice {
            config.voice = v;
        }
        if let Some(p) = self.persona {
            config.instructions = p.instructions().to_string();
        }
        if let Some(text) = &self.instructions {
            config.instructions = text.trim().to_string();
        }
        Ok(())
    }
}

pub async fn run_index(app: &App) -> Result<()> {
    let index = app.load_index().await?;
    let documents: BTreeSet<&str> = index.chunks().map(|c| c.document_id.as_str()).collect();

    println!(
        "Indexed {} chunks from {} documents (model: {}, dims: {}, metric: {:?})",
        index.len(),
        documents.len(),
        index.model(),
        index.dims(),
        index.metric()
    );
    Ok(())
}

pub async fn run_search(app: &App, query: &str, limit: Option<usize>) -> Result<()> {
    if query.trim().is_empty() {
        bail!("Search query must not be empty");
    }
    app.load_index().await?;

    let k = limit.unwrap_or(app.config().retrieval.top_k);
    let results = app.index().query(query, k).await?;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        println!("{}. [{:.3}] {}", i + 1, result.score, result.chunk.id);
        println!("    offset: {}", result.chunk.offset);
        println!(
            "    excerpt: \"{}\"",
            excerpt(&result.chunk.text, 160).replace('\n', " ").trim()
        );
        println!();
    }
    Ok(())
}

/// Answer one question and exit.
pub async fn run_ask(
    app: &App,
    question: &str,
    overrides: &SessionOverrides,
    no_speech: bool,
    play: bool,
) -> Result<()> {
    let (llm, synthesizer) = app.remote_services()?;
    let synthesizer = if no_speech { None } else { synthesizer };
    let (orchestrator, mut session) = prepare(app, llm, synthesizer, overrides).await?;

    let outcome = orchestrator.respond(&mut session, question).await;
    print_outcome(&outcome);

    if !outcome.state.has_reply() {
        bail!("No reply was generated");
    }

    if play {
        if let (Some(player), Some(artifact)) = (app.player(), outcome.turn.speech) {
            let path = artifact.path;
            report_playback(spawn_playback(player, path).wait().await);
        }
    }
    Ok(())
}

/// Interactive conversation loop on stdin.
///
/// Type `exit` to quit. Lines starting with `/` are commands; see
/// [`CHAT_HELP`].
pub async fn run_chat(app: &App, overrides: &SessionOverrides, no_speech: bool) -> Result<()> {
    let (llm, synthesizer) = app.remote_services()?;
    let synthesizer = if no_speech { None } else { synthesizer };
    let (orchestrator, mut session) = prepare(app, llm, synthesizer, overrides).await?;
    let player = app.player();
    let mut playing: Option<PlaybackHandle> = None;

    println!("Session {} (type 'exit' to quit, '/help' for commands)", session.id());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("exit") {
            break;
        }

        if let Some(handle) = playing.take() {
            if !handle.is_finished() {
                handle.cancel();
            }
        }

        if let Some(command) = line.strip_prefix('/') {
            match chat_command(command, &orchestrator, &mut session).await {
                Ok(Some(path)) => {
                    playing = player.as_ref().map(|p| spawn_playback(Arc::clone(p), path));
                }
                Ok(None) => {}
                Err(e) => eprintln!("Error: {:#}", e),
            }
            continue;
        }

        let outcome = orchestrator.respond(&mut session, line).await;
        print_outcome(&outcome);

        if let (Some(p), Some(artifact)) = (&player, &outcome.turn.speech) {
            playing = Some(spawn_playback(Arc::clone(p), artifact.path.clone()));
        }
    }

    if let Some(handle) = playing {
        handle.cancel();
        handle.wait().await;
    }
    println!("Goodbye.");
    Ok(())
}

pub const CHAT_HELP: &str = "\
/again                 replay the last reply (synthesizing it if needed)
/persona <name>        switch persona preset
/instructions <text>   set free-text persona instructions
/voice <name>          switch voice
/model <name>          switch chat model
/temperature <value>   set sampling temperature
/help                  show this help
exit                   quit";

/// Handle one `/command`; returns an audio path to play, if any.
async fn chat_command(
    command: &str,
    orchestrator: &ConversationOrchestrator,
    session: &mut SessionState,
) -> Result<Option<std::path::PathBuf>> {
    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };

    let mut config = session.config().clone();
    match name {
        "again" => {
            let position = session
                .turns()
                .iter()
                .rev()
                .find(|t| t.role == Role::Assistant && t.content.is_some())
                .map(|t| t.position)
                .ok_or_else(|| anyhow::anyhow!("No reply to replay yet"))?;
            let artifact = orchestrator.narrate(session, position).await?;
            println!("(speech: {})", artifact.path.display());
            return Ok(Some(artifact.path));
        }
        "persona" => config.instructions = arg.parse::<Persona>()?.instructions().to_string(),
        "instructions" => config.instructions = arg.to_string(),
        "voice" => config.voice = arg.parse()?,
        "model" => config.model = arg.parse()?,
        "temperature" => config.temperature = Temperature::new(arg.parse()?)?,
        "help" => {
            println!("{}", CHAT_HELP);
            return Ok(None);
        }
        other => bail!("Unknown command '/{}'; try /help", other),
    }

    session.set_config(config);
    println!("(settings updated)");
    Ok(None)
}

/// Synthesize `text` directly through the speech cache.
pub async fn run_speak(
    app: &App,
    text: &str,
    overrides: &SessionOverrides,
    play: bool,
) -> Result<()> {
    let (_, synthesizer) = app.remote_services()?;
    let synthesizer =
        synthesizer.ok_or_else(|| anyhow::anyhow!("Speech is disabled (speech.enabled = false)"))?;

    let mut config = SessionConfig::from_config(app.config());
    overrides.apply(&mut config)?;

    let cache = app.speech_cache(synthesizer);
    let artifact = cache
        .synthesize(text, config.voice_model, config.voice, &config.instructions)
        .await?;

    println!("{}", artifact.path.display());
    println!("    key: {}", artifact.key);
    println!("    created: {}", artifact.created_at.format("%Y-%m-%d %H:%M:%S"));

    if play {
        if let Some(player) = app.player() {
            report_playback(spawn_playback(player, artifact.path).wait().await);
        }
    }
    Ok(())
}

/// List every selectable value.
pub fn run_presets() {
    println!("Chat models:");
    for m in ChatModel::ALL {
        println!("  {:<22} {}", m.as_str(), m.label());
    }
    println!("\nVoice models:");
    for m in VoiceModel::ALL {
        println!("  {:<22} {}", m.as_str(), m.label());
    }
    println!("\nVoices:");
    for v in Voice::ALL {
        println!("  {:<22} {}", v.as_str(), v.label());
    }
    println!("\nPersonas:");
    for p in Persona::ALL {
        let instructions = match p.instructions() {
            "" => "(none)",
            text => text,
        };
        println!("  {:<22} {}", p.as_str(), instructions);
    }
    println!(
        "\nTemperature: {} to {} (default {})",
        Temperature::MIN,
        Temperature::MAX,
        Temperature::default().value()
    );
}

async fn prepare(
    app: &App,
    llm: Arc<dyn ChatCompletion>,
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    overrides: &SessionOverrides,
) -> Result<(ConversationOrchestrator, SessionState)> {
    app.load_index().await?;

    let speech: Option<Arc<SpeechCache>> = synthesizer.map(|s| app.speech_cache(s));
    let orchestrator = app.orchestrator(llm, speech);

    let mut session = app.new_session();
    let mut config = session.config().clone();
    overrides.apply(&mut config)?;
    session.set_config(config);

    Ok((orchestrator, session))
}

fn print_outcome(outcome: &TurnOutcome) {
    for error in &outcome.errors {
        match error {
            e if e.is_bad_request() => {
                eprintln!("The model rejected the request as invalid: {}", e)
            }
            RagError::Synthesis(_) => eprintln!("Warning: {} (reply kept as text)", error),
            RagError::Retrieval(_) => eprintln!("Warning: {}", error),
            _ => eprintln!("Error: {}", error),
        }
    }

    if let Some(reply) = &outcome.turn.content {
        println!("{}", reply);
    }
    if let Some(artifact) = &outcome.turn.speech {
        println!("(speech: {})", artifact.path.display());
    }
}

fn report_playback(outcome: PlaybackOutcome) {
    if let PlaybackOutcome::Failed(reason) = outcome {
        eprintln!("Playback failed: {}", reason);
    }
}

fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}
