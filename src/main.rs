//! # Docent CLI (`docent`)
//!
//! ## Usage
//!
//! ```bash
//! docent --config ./config/docent.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docent index` | Ingest the corpus and build the embedding index |
//! | `docent search "<query>"` | Show the chunks nearest to a query |
//! | `docent ask "<question>"` | Answer one question, with speech |
//! | `docent chat` | Interactive conversation loop |
//! | `docent speak "<text>"` | Synthesize text through the speech cache |
//! | `docent presets` | List models, voices, and personas |
//!
//! The corpus is re-indexed on every run; nothing is persisted except
//! speech files.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use docent::app::App;
use docent::commands::{self, SessionOverrides};
use docent::config::{self, Config};
use docent::logging;

/// Docent: ask questions about your documents and hear the answers.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/docent.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "docent",
    about = "Docent: ask questions about your documents and hear the answers",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/docent.toml`. If the default file does not
    /// exist, built-in defaults are used.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// Enable debug logging (overridden by `RUST_LOG`).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

const DEFAULT_CONFIG: &str = "./config/docent.toml";

#[derive(Subcommand)]
enum Commands {
    /// Ingest the corpus and build the embedding index.
    ///
    /// Reports chunk and document counts. Useful for checking the corpus
    /// and chunking settings before asking questions.
    Index,

    /// Show the corpus chunks most similar to a query.
    Search {
        query: String,

        /// Number of results (defaults to `retrieval.top_k`).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Answer one question from the corpus.
    Ask {
        question: String,

        #[command(flatten)]
        overrides: SessionOverrides,

        /// Skip speech synthesis.
        #[arg(long)]
        no_speech: bool,

        /// Play the reply with the configured player.
        #[arg(long)]
        play: bool,
    },

    /// Start an interactive conversation. Type `exit` to quit.
    Chat {
        #[command(flatten)]
        overrides: SessionOverrides,

        /// Skip speech synthesis.
        #[arg(long)]
        no_speech: bool,
    },

    /// Synthesize text through the speech cache and print the file path.
    Speak {
        text: String,

        #[command(flatten)]
        overrides: SessionOverrides,

        /// Play the file with the configured player.
        #[arg(long)]
        play: bool,
    },

    /// List chat models, voice models, voices, and personas.
    Presets,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    logging::init(cli.verbose);

    // Commands that don't require config
    let command = match cli.command {
        Commands::Presets => {
            commands::run_presets();
            return Ok(());
        }
        command => command,
    };

    let cfg = if cli.config == PathBuf::from(DEFAULT_CONFIG) && !cli.config.exists() {
        tracing::info!("no config file found; using defaults");
        Config::minimal()
    } else {
        config::load_config(&cli.config)?
    };

    let app = App::from_config(cfg)?;

    match command {
        Commands::Index => commands::run_index(&app).await?,
        Commands::Search { query, limit } => commands::run_search(&app, &query, limit).await?,
        Commands::Ask {
            question,
            overrides,
            no_speech,
            play,
        } => commands::run_ask(&app, &question, &overrides, no_speech, play).await?,
        Commands::Chat {
            overrides,
            no_speech,
        } => commands::run_chat(&app, &overrides, no_speech).await?,
        Commands::Speak {
            text,
            overrides,
            play,
        } => commands::run_speak(&app, &text, &overrides, play).await?,
        Commands::Presets => {}
    }

    Ok(())
}
