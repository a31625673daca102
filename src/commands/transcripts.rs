// SPDX-License-Identifier: MIT OR Apache-2.0

//! List and show transcripts

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use super::CommandContext;
use tsearch::output::{colorize_dim, colorize_heading, colorize_id, print_json, use_colors};
use tsearch::records::TranscriptSummary;

/// Listing for JSON output
#[derive(Debug, Serialize)]
struct TranscriptList {
    transcripts: Vec<TranscriptSummary>,
    total: usize,
}

/// Run the list command
pub fn list(ctx: &CommandContext, split: Option<&str>) -> Result<()> {
    let catalog = ctx.load_catalog()?;
    let transcripts = catalog.list(split);

    if ctx.is_json() {
        let total = transcripts.len();
        return print_json(&TranscriptList { transcripts, total }, ctx.compact);
    }

    let use_color = use_colors();
    if transcripts.is_empty() {
        println!("{} No transcripts found", "✗".red());
        return Ok(());
    }

    for summary in &transcripts {
        let labels: Vec<&str> = [&summary.job_title, &summary.industry, &summary.sentiment]
            .into_iter()
            .filter_map(|v| v.as_deref())
            .collect();
        println!(
            "{} [{}] {} messages {}",
            colorize_id(&summary.transcript_id, use_color),
            summary.split,
            summary.message_count,
            colorize_dim(&labels.join(" · "), use_color)
        );
    }
    println!("\n{} transcripts", transcripts.len());
    Ok(())
}

/// Run the show command
pub fn show(ctx: &CommandContext, id: &str) -> Result<()> {
    let catalog = ctx.load_catalog()?;
    let record = catalog.get(id)?;

    if ctx.is_json() {
        return print_json(record, ctx.compact);
    }

    let use_color = use_colors();
    println!(
        "\n{} [{}]",
        colorize_id(&record.transcript_id, use_color),
        record.split
    );
    let fields = [
        ("Job title", record.job_title()),
        ("Experience", record.experience_level()),
        ("Industry", record.industry()),
        ("Sentiment", record.sentiment()),
    ];
    for (label, value) in fields {
        if let Some(value) = value {
            println!("  {}: {}", colorize_heading(label, use_color), value);
        }
    }
    let tools = record.tools();
    if !tools.is_empty() {
        println!("  {}: {}", colorize_heading("Tools", use_color), tools.join(", "));
    }
    println!();

    for message in &record.messages {
        println!("{}: {}", colorize_heading(message.role.label(), use_color), message.content);
    }
    Ok(())
}
