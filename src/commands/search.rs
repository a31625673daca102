// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic search over embedded transcripts

use anyhow::{Context, Result};
use colored::Colorize;

use super::CommandContext;
use tsearch::cache::QueryCache;
use tsearch::embedding::{create_provider, QueryEmbedder};
use tsearch::filters::MetadataFilter;
use tsearch::output::{
    colorize_dim, colorize_id, colorize_label, colorize_score, print_json, use_colors,
};
use tsearch::service::{
    SearchContext, SearchRequest, SearchResponse, SearchResults, SearchService, SearchUnavailable,
    SEARCH_UNAVAILABLE,
};
use tsearch::Error;

/// Search filters and paging from the command line
pub struct SearchArgs {
    pub query: String,
    pub limit: Option<usize>,
    pub offset: usize,
    pub split: Option<String>,
    pub sentiment: Option<String>,
    pub industry: Option<String>,
    pub no_cache: bool,
}

/// Run the search command
pub fn run(ctx: &CommandContext, args: SearchArgs) -> Result<()> {
    let context = SearchContext::load(&ctx.paths).context("Failed to load search data")?;
    let service = SearchService::new(context).with_max_limit(ctx.config.search().max_limit());

    let request = SearchRequest::new(args.query)
        .with_page(
            args.offset,
            args.limit.unwrap_or_else(|| ctx.config.search().default_limit()),
        )
        .with_filter(MetadataFilter::new(args.split, args.sentiment, args.industry));

    let mut provider = match create_provider(ctx.config.embeddings()) {
        Ok(provider) => provider,
        Err(Error::Provider(err)) => {
            let response = SearchResponse::Unavailable(SearchUnavailable {
                error: SEARCH_UNAVAILABLE.to_string(),
                detail: err.to_string(),
            });
            return render(ctx, &response);
        }
        Err(err) => return Err(err).context("Failed to create embedding provider"),
    };

    let cache = (ctx.config.cache().enabled() && !args.no_cache)
        .then(|| QueryCache::new(&ctx.paths.cache_dir, ctx.config.cache().ttl_ms()));
    let mut embedder = QueryEmbedder::new(provider.as_mut()).with_cache(cache);

    let response = service
        .search(&request, &mut embedder)
        .context("Search failed")?;
    render(ctx, &response)
}

fn render(ctx: &CommandContext, response: &SearchResponse) -> Result<()> {
    if ctx.is_json() {
        return print_json(response, ctx.compact);
    }

    match response {
        SearchResponse::Unavailable(unavailable) => {
            println!("{} Search unavailable: {}", "✗".red(), unavailable.detail);
        }
        SearchResponse::Results(results) => print_results(results),
    }
    Ok(())
}

fn print_results(results: &SearchResults) {
    let use_color = use_colors();

    if results.results.is_empty() {
        println!(
            "{} No transcripts found for: {}",
            "✗".red(),
            results.query.yellow()
        );
        return;
    }

    println!(
        "\n{} {} of {} transcripts for: {}\n",
        "🔍".cyan(),
        results.results.len(),
        results.total,
        results.query.yellow()
    );

    for (rank, hit) in results.results.iter().enumerate() {
        let labels: Vec<&str> = [&hit.job_title, &hit.industry, &hit.sentiment]
            .into_iter()
            .filter_map(|v| v.as_deref())
            .collect();

        println!(
            "{:>3}. {} {} [{}] {}",
            results.offset + rank + 1,
            colorize_id(&hit.id, use_color),
            colorize_score(hit.score, use_color),
            hit.split,
            colorize_label(&labels.join(" · "), use_color)
        );
        if !hit.snippet.is_empty() {
            println!("     {}", colorize_dim(&hit.snippet, use_color));
        }
    }
    println!();
}
