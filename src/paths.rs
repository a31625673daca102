// SPDX-License-Identifier: MIT OR Apache-2.0

//! Locations of the flat data files used by the pipeline.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::errors::{Error, Result};

/// Default name of the data directory.
pub const DATA_DIR: &str = "data";

pub const TRANSCRIPTS_FILE: &str = "transcripts.json";
pub const EMBEDDINGS_FILE: &str = "embeddings.json";
pub const CHECKPOINT_FILE: &str = "embeddings_checkpoint.json";
pub const CACHE_DIR: &str = "cache";

/// Resolved file locations for one data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    /// The data directory itself
    pub root: PathBuf,
    /// Transcript records (`{"transcripts": [...]}`)
    pub transcripts: PathBuf,
    /// Final vector store snapshot
    pub embeddings: PathBuf,
    /// In-progress build checkpoint
    pub checkpoint: PathBuf,
    /// Query embedding cache directory
    pub cache_dir: PathBuf,
}

impl DataPaths {
    /// Default layout under `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            transcripts: root.join(TRANSCRIPTS_FILE),
            embeddings: root.join(EMBEDDINGS_FILE),
            checkpoint: root.join(CHECKPOINT_FILE),
            cache_dir: root.join(CACHE_DIR),
            root,
        }
    }

    pub fn with_transcripts(mut self, path: impl Into<PathBuf>) -> Self {
        self.transcripts = path.into();
        self
    }

    pub fn with_embeddings(mut self, path: impl Into<PathBuf>) -> Self {
        self.embeddings = path.into();
        self
    }

    pub fn with_checkpoint(mut self, path: impl Into<PathBuf>) -> Self {
        self.checkpoint = path.into();
        self
    }
}

/// Path of the sibling temp file used for atomic writes of `path`.
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Writes `bytes` to `path` so readers see either the old or the new content.
///
/// The data goes to a sibling temp file, is synced, then renamed over `path`.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| Error::io(format!("failed to create {}", parent.display()), e))?;
    }

    let tmp = temp_path_for(path);
    let mut file = File::create(&tmp)
        .map_err(|e| Error::io(format!("failed to create {}", tmp.display()), e))?;
    file.write_all(bytes)
        .and_then(|_| file.sync_all())
        .map_err(|e| Error::io(format!("failed to write {}", tmp.display()), e))?;
    drop(file);

    fs::rename(&tmp, path).map_err(|e| {
        Error::io(
            format!("failed to move {} into place", tmp.display()),
            e,
        )
    })
}
