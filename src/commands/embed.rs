// SPDX-License-Identifier: MIT OR Apache-2.0

//! Build the vector store from transcripts

use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use super::CommandContext;
use crate::cli::CliProvider;
use tsearch::embedding::{create_provider, BuildOptions, EmbeddingBuilder};
use tsearch::output::print_json;
use tsearch::records::TranscriptRecord;
use tsearch::Error;

/// Embed result for JSON output
#[derive(Debug, Serialize)]
struct EmbedResult {
    model: String,
    dimension: usize,
    count: usize,
    path: String,
}

/// Run the embed command
pub fn run(
    ctx: &mut CommandContext,
    limit: Option<usize>,
    resume: bool,
    model: Option<String>,
    batch_size: Option<usize>,
    provider: Option<CliProvider>,
) -> Result<()> {
    if let Some(model) = model {
        ctx.config.embeddings.model = Some(model);
    }
    if let Some(batch_size) = batch_size {
        ctx.config.embeddings.batch_size = Some(batch_size);
    }
    if let Some(provider) = provider {
        ctx.config.embeddings.provider = Some(provider.into());
    }

    let catalog = ctx.load_catalog()?;
    let records: Vec<TranscriptRecord> = catalog
        .iter_file_order()
        .take(limit.unwrap_or(usize::MAX))
        .cloned()
        .collect();

    let mut provider = create_provider(ctx.config.embeddings())
        .context("Failed to create embedding provider")?;
    let options = BuildOptions::from_config(ctx.config.embeddings()).with_resume(resume);

    let pb = ProgressBar::new(records.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{bar:40.cyan/blue}] {pos}/{len} transcripts | batch {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##."),
    );
    let pb_batches = pb.clone();

    let result = EmbeddingBuilder::new(provider.as_mut(), options, &ctx.paths)
        .on_batch(move |progress| {
            pb_batches.set_length(progress.pending as u64);
            pb_batches.set_position(progress.embedded as u64);
            pb_batches.set_message(format!("{}/{}", progress.batch, progress.batches));
        })
        .build(&records);
    pb.finish_and_clear();

    let store = match result {
        Ok(store) => store,
        Err(err @ Error::Interrupted { .. }) => {
            return Err(anyhow::Error::new(err)
                .context("Embedding interrupted; rerun with --resume to continue"));
        }
        Err(err @ Error::Provider(_)) if ctx.paths.checkpoint.exists() => {
            return Err(anyhow::Error::new(err).context(format!(
                "Embedding stopped; progress is saved in {} (rerun with --resume)",
                ctx.paths.checkpoint.display()
            )));
        }
        Err(err) => return Err(anyhow::Error::new(err).context("Embedding failed")),
    };

    let result = EmbedResult {
        model: store.model().to_string(),
        dimension: store.dimension(),
        count: store.len(),
        path: ctx.paths.embeddings.display().to_string(),
    };

    if ctx.is_json() {
        print_json(&result, ctx.compact)?;
    } else {
        println!(
            "{} Embedded {} transcripts with {} (dimension {}) -> {}",
            "✓".green(),
            result.count.to_string().bold(),
            result.model.cyan(),
            result.dimension,
            result.path
        );
    }

    Ok(())
}
