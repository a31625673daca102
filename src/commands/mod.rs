// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command implementations for the tsearch CLI

pub mod embed;
pub mod search;
pub mod summary;
pub mod transcripts;

use anyhow::{Context as _, Result};
use std::path::PathBuf;

use crate::cli::OutputFormat;
use tsearch::config::Config;
use tsearch::paths::DataPaths;
use tsearch::records::TranscriptCatalog;

/// Settings shared by every command
pub struct CommandContext {
    pub config: Config,
    pub paths: DataPaths,
    pub format: OutputFormat,
    pub compact: bool,
}

impl CommandContext {
    pub fn new(data_dir: Option<PathBuf>, format: OutputFormat, compact: bool) -> Self {
        let config = Config::load();
        let paths = config.data.paths(data_dir.as_deref());
        tracing::debug!(root = %paths.root.display(), "resolved data directory");
        Self {
            config,
            paths,
            format,
            compact,
        }
    }

    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    pub fn load_catalog(&self) -> Result<TranscriptCatalog> {
        TranscriptCatalog::load(&self.paths.transcripts).with_context(|| {
            format!(
                "Failed to load transcripts from {}",
                self.paths.transcripts.display()
            )
        })
    }
}
