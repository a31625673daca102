// SPDX-License-Identifier: MIT OR Apache-2.0

//! tsearch - Interview transcript semantic search tool
//!
//! Embeds interview transcripts in resumable, checkpointed batches and ranks
//! them by cosine similarity to free-text queries.

mod cli;
mod commands;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Commands};
use commands::CommandContext;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Initialize tracing with TSEARCH_LOG env var (e.g., TSEARCH_LOG=debug tsearch search "query")
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_env("TSEARCH_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let mut ctx = CommandContext::new(cli.data_dir, cli.format, cli.compact);

    match cli.command {
        Commands::Embed {
            limit,
            resume,
            model,
            batch_size,
            provider,
        } => {
            commands::embed::run(&mut ctx, limit, resume, model, batch_size, provider)?;
        }
        Commands::Search {
            query,
            limit,
            offset,
            split,
            sentiment,
            industry,
            no_cache,
        } => {
            commands::search::run(
                &ctx,
                commands::search::SearchArgs {
                    query,
                    limit,
                    offset,
                    split,
                    sentiment,
                    industry,
                    no_cache,
                },
            )?;
        }
        Commands::List { split } => {
            commands::transcripts::list(&ctx, split.as_deref())?;
        }
        Commands::Show { id } => {
            commands::transcripts::show(&ctx, &id)?;
        }
        Commands::Summary { split } => {
            commands::summary::run(&ctx, split.as_deref())?;
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "tsearch", &mut std::io::stdout());
        }
    }

    Ok(())
}
