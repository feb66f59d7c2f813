//! # WikiForge CLI (`wiki`)
//!
//! The `wiki` binary is the primary interface for WikiForge. It provides
//! commands for database initialization, initial population, on-demand
//! article generation, derived-metric maintenance, and starting the HTTP
//! API server.
//!
//! ## Usage
//!
//! ```bash
//! wiki --config ./config/wiki.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `wiki init` | Create the SQLite database and run schema migrations |
//! | `wiki populate` | Seed starter articles and generate everything pending |
//! | `wiki generate <title>` | Run the generation pipeline for one article |
//! | `wiki update-word-counts` | Recompute word counts from stored content |
//! | `wiki update-relevance-scores` | Recompute relevance scores |
//! | `wiki stats` | Print database statistics |
//! | `wiki serve` | Start the HTTP API server |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! wiki init --config ./config/wiki.toml
//!
//! # Seed and generate the starter article set
//! wiki populate --config ./config/wiki.toml
//!
//! # Generate one article on demand
//! wiki generate "Binary Search Trees" --config ./config/wiki.toml
//!
//! # Serve the read API
//! wiki serve --config ./config/wiki.toml
//! ```

mod config;
mod db;
mod error;
mod generator;
mod maintenance;
mod matcher;
mod migrate;
mod models;
mod populate;
mod prompt;
mod provider;
mod response;
mod server;
mod slug;
mod stats;
mod store;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// WikiForge CLI — an LLM-backed article generation pipeline for
/// interview-prep wiki content.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/wiki.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "wiki",
    about = "WikiForge — LLM-backed article generation for an interview-prep wiki",
    version,
    long_about = "WikiForge maintains a SQLite database of interview preparation articles. \
    Articles start as metadata stubs and are filled by a two-stage LLM pipeline (research, \
    then writing); each generated article links to related articles, creating new stubs as \
    needed. Content is served to the frontend via a JSON HTTP API with generate-on-read."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/wiki.toml`. Database, provider, and server
    /// settings are read from this file.
    #[arg(long, global = true, default_value = "./config/wiki.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables
    /// (articles, article_relationships). This command is idempotent —
    /// running it multiple times is safe.
    Init,

    /// Seed the starter article set and generate everything pending.
    ///
    /// Phase 1 inserts the curated stub articles; phase 2 walks every
    /// pending article through the generation pipeline, including stubs
    /// created along the way. Individual generation failures are logged
    /// and skipped.
    Populate {
        /// Run even if the database already contains articles.
        /// Existing titles are never duplicated.
        #[arg(long)]
        force: bool,
    },

    /// Run the generation pipeline for one article by title.
    ///
    /// The article stub must already exist (seeded by `populate` or
    /// created as a related-article suggestion).
    Generate {
        /// Exact article title.
        title: String,
    },

    /// Recompute word counts from stored article content.
    UpdateWordCounts,

    /// Recompute relevance scores for all articles.
    UpdateRelevanceScores,

    /// Print database statistics.
    Stats,

    /// Start the HTTP API server.
    ///
    /// Binds to the address configured in `[server].bind` and serves
    /// article content as JSON, generating articles on first read in the
    /// background.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Populate { force } => {
            populate::run_populate(&cfg, force).await?;
        }
        Commands::Generate { title } => {
            generator::run_generate(&cfg, &title).await?;
        }
        Commands::UpdateWordCounts => {
            maintenance::run_update_word_counts(&cfg).await?;
        }
        Commands::UpdateRelevanceScores => {
            maintenance::run_update_relevance_scores(&cfg).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
