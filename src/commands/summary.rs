// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metadata frequency summary

use anyhow::Result;

use super::CommandContext;
use tsearch::output::{colorize_dim, colorize_heading, print_json, use_colors};
use tsearch::summary::{summarize, FieldSummary};

/// Buckets shown per field in text output
const TEXT_TOP_N: usize = 10;

/// Run the summary command
pub fn run(ctx: &CommandContext, split: Option<&str>) -> Result<()> {
    let catalog = ctx.load_catalog()?;
    let summary = summarize(catalog.iter(), split);

    if ctx.is_json() {
        return print_json(&summary, ctx.compact);
    }

    let use_color = use_colors();
    println!("{} transcripts", summary.total);
    for (split, count) in &summary.splits {
        println!("  {:<24} {}", split, count);
    }

    let fields = [
        ("Sentiment", &summary.sentiment),
        ("Experience level", &summary.experience_level),
        ("Industry", &summary.industry),
        ("Job category", &summary.job_category),
        ("AI tools", &summary.tools),
        ("Use cases", &summary.use_cases),
        ("Pain points", &summary.pain_points),
    ];
    for (label, field) in fields {
        print_field(label, field, use_color);
    }
    Ok(())
}

fn print_field(label: &str, field: &FieldSummary, use_color: bool) {
    println!("\n{}", colorize_heading(label, use_color));
    for bucket in field.counts.iter().take(TEXT_TOP_N) {
        println!("  {:<32} {}", bucket.value, bucket.count);
    }
    if field.counts.len() > TEXT_TOP_N {
        let more = format!("  ... {} more", field.counts.len() - TEXT_TOP_N);
        println!("{}", colorize_dim(&more, use_color));
    }
    if field.unknown > 0 {
        println!(
            "{}",
            colorize_dim(&format!("  {:<32} {}", "unknown", field.unknown), use_color)
        );
    }
}
