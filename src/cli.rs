// SPDX-License-Identifier: MIT OR Apache-2.0

//! CLI argument parsing using clap

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use tsearch::config::EmbeddingProviderType;

/// tsearch - Semantic search over interview transcripts
///
/// Embeds transcripts in resumable batches and ranks them by cosine
/// similarity to a free-text query, with metadata filters.
#[derive(Parser, Debug)]
#[command(name = "tsearch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Compact JSON output (no pretty formatting)
    #[arg(long, global = true)]
    pub compact: bool,

    /// Data directory holding transcripts.json and the embedding files
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for results
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Embedding provider selectable on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliProvider {
    /// Voyage AI HTTP API
    Voyage,
    /// External command speaking JSON over stdin/stdout
    Command,
    /// Deterministic offline feature hashing
    Hashing,
}

impl From<CliProvider> for EmbeddingProviderType {
    fn from(provider: CliProvider) -> Self {
        match provider {
            CliProvider::Voyage => EmbeddingProviderType::Voyage,
            CliProvider::Command => EmbeddingProviderType::Command,
            CliProvider::Hashing => EmbeddingProviderType::Hashing,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Embed transcripts into the vector store
    Embed {
        /// Only embed the first N transcripts (by ID)
        #[arg(long)]
        limit: Option<usize>,

        /// Continue from an existing checkpoint
        #[arg(long)]
        resume: bool,

        /// Embedding model (overrides config)
        #[arg(long)]
        model: Option<String>,

        /// Transcripts per provider request (overrides config)
        #[arg(long)]
        batch_size: Option<usize>,

        /// Embedding provider (overrides config)
        #[arg(long, value_enum)]
        provider: Option<CliProvider>,
    },

    /// Rank transcripts by similarity to a query
    #[command(alias = "s")]
    Search {
        /// Free-text query
        query: String,

        /// Maximum number of results
        #[arg(short = 'm', long = "limit")]
        limit: Option<usize>,

        /// Skip this many ranked results
        #[arg(long, default_value_t = 0)]
        offset: usize,

        /// Only transcripts from this split
        #[arg(long)]
        split: Option<String>,

        /// Only transcripts with this sentiment (case-insensitive)
        #[arg(long)]
        sentiment: Option<String>,

        /// Only transcripts whose industry contains this text (case-insensitive)
        #[arg(long)]
        industry: Option<String>,

        /// Do not read or write the query embedding cache
        #[arg(long)]
        no_cache: bool,
    },

    /// List transcripts
    #[command(alias = "ls")]
    List {
        /// Only transcripts from this split
        #[arg(long)]
        split: Option<String>,
    },

    /// Show one transcript
    Show {
        /// Transcript ID
        id: String,
    },

    /// Summarize transcript metadata
    Summary {
        /// Only transcripts from this split
        #[arg(long)]
        split: Option<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
