use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use bookrag::Result;
use bookrag::commands::{build_index, reset, search, show_config, stats, topic};
use bookrag::config::Config;

#[derive(Parser)]
#[command(name = "bookrag")]
#[command(about = "Semantic search and navigation over a structured markdown book")]
#[command(version)]
struct Cli {
    /// Directory holding the index, metadata, and config.toml
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk, embed, and index the corpus, rebuilding all metadata
    Build {
        /// Corpus root, overriding the configured location
        #[arg(long)]
        corpus: Option<PathBuf>,
    },
    /// Semantic search over indexed passages
    Search {
        /// Natural-language query
        query: String,
        /// Maximum number of results
        #[arg(long, default_value_t = 5)]
        top_k: usize,
        /// Restrict results to one module id
        #[arg(long)]
        module: Option<String>,
    },
    /// Find chapters by topic keyword
    Topic {
        /// Keyword to match against indexed topics (case-insensitive)
        keyword: String,
    },
    /// Show index and book statistics
    Stats,
    /// Remove all indexed content
    Reset,
    /// Show the effective configuration
    Config,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let base_dir = match cli.data_dir {
        Some(dir) => dir,
        None => dirs::data_dir()
            .context("Could not determine the platform data directory")?
            .join("bookrag"),
    };
    let config = Config::load(&base_dir)?;

    match cli.command {
        Commands::Build { corpus } => build_index(config, corpus)?,
        Commands::Search {
            query,
            top_k,
            module,
        } => search(config, &query, top_k, module)?,
        Commands::Topic { keyword } => topic(config, &keyword)?,
        Commands::Stats => stats(config)?,
        Commands::Reset => reset(config)?,
        Commands::Config => show_config(config)?,
    }

    Ok(())
}
