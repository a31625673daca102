// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable partial progress of an embedding build.
//!
//! A checkpoint only ever holds embeddings from fully committed batches. On
//! disk it is `{"processed_ids", "embeddings", "model", "dimension"}`; the
//! processed ID list is derived from the embeddings map when written and
//! checked against it when read, so the two can never disagree.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::embedding::store::VectorStore;
use crate::errors::{Error, Result};
use crate::paths::write_atomic;

/// Embeddings accumulated so far by one build.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildCheckpoint {
    model: String,
    dimension: usize,
    embeddings: BTreeMap<String, Vec<f32>>,
}

#[derive(Serialize)]
struct CheckpointRef<'a> {
    processed_ids: Vec<&'a str>,
    embeddings: &'a BTreeMap<String, Vec<f32>>,
    model: &'a str,
    dimension: usize,
}

#[derive(Deserialize)]
struct CheckpointFileContents {
    #[serde(default)]
    processed_ids: Vec<String>,
    #[serde(default)]
    embeddings: BTreeMap<String, Vec<f32>>,
    model: String,
    dimension: usize,
}

impl BuildCheckpoint {
    pub fn new(model: impl Into<String>, dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(Error::data("embedding dimension must be greater than 0"));
        }
        Ok(Self {
            model: model.into(),
            dimension,
            embeddings: BTreeMap::new(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }

    pub fn is_processed(&self, id: &str) -> bool {
        self.embeddings.contains_key(id)
    }

    /// IDs whose embeddings are committed. Always the key set of the embeddings.
    pub fn processed_ids(&self) -> impl Iterator<Item = &str> {
        self.embeddings.keys().map(String::as_str)
    }

    /// Adds one batch of embeddings.
    ///
    /// The whole batch is checked before anything is merged, so a rejected
    /// batch leaves the checkpoint untouched.
    pub fn merge_batch(&mut self, ids: &[String], vectors: Vec<Vec<f32>>) -> Result<()> {
        if ids.len() != vectors.len() {
            return Err(Error::data(format!(
                "batch has {} ids but {} vectors",
                ids.len(),
                vectors.len()
            )));
        }
        if let Some((id, vector)) = ids
            .iter()
            .zip(&vectors)
            .find(|(_, v)| v.len() != self.dimension)
        {
            return Err(Error::data(format!(
                "embedding for '{}' has length {}, expected {} (did the provider model change?)",
                id,
                vector.len(),
                self.dimension
            )));
        }

        for (id, vector) in ids.iter().zip(vectors) {
            self.embeddings.insert(id.clone(), vector);
        }
        Ok(())
    }

    /// Turns the accumulated embeddings into the final store.
    pub fn into_store(self) -> Result<VectorStore> {
        VectorStore::new(self.model, self.dimension, self.embeddings)
    }

    fn from_contents(contents: CheckpointFileContents) -> Result<Self> {
        let listed: BTreeSet<&str> = contents.processed_ids.iter().map(String::as_str).collect();
        let stored: BTreeSet<&str> = contents.embeddings.keys().map(String::as_str).collect();
        if listed != stored {
            return Err(Error::data(
                "checkpoint processed_ids do not match its embeddings",
            ));
        }

        let mut checkpoint = Self::new(contents.model, contents.dimension)?;
        let (ids, vectors): (Vec<String>, Vec<Vec<f32>>) = contents.embeddings.into_iter().unzip();
        checkpoint.merge_batch(&ids, vectors)?;
        Ok(checkpoint)
    }
}

/// Location of the checkpoint file on disk.
#[derive(Debug, Clone)]
pub struct CheckpointFile {
    path: PathBuf,
}

impl CheckpointFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Loads the checkpoint, or `None` when no build is in progress.
    pub fn load(&self) -> Result<Option<BuildCheckpoint>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)
            .map_err(|e| Error::io(format!("failed to read {}", self.path.display()), e))?;
        let contents: CheckpointFileContents = serde_json::from_str(&content)
            .map_err(|e| Error::json(format!("failed to parse {}", self.path.display()), e))?;
        BuildCheckpoint::from_contents(contents).map(Some)
    }

    /// Persists the checkpoint atomically.
    pub fn save(&self, checkpoint: &BuildCheckpoint) -> Result<()> {
        let contents = CheckpointRef {
            processed_ids: checkpoint.processed_ids().collect(),
            embeddings: &checkpoint.embeddings,
            model: &checkpoint.model,
            dimension: checkpoint.dimension,
        };
        let json = serde_json::to_vec(&contents)
            .map_err(|e| Error::json("failed to serialize checkpoint", e))?;
        write_atomic(&self.path, &json)
    }

    /// Deletes the checkpoint. Deleting a missing checkpoint is a no-op.
    pub fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io(
                format!("failed to remove {}", self.path.display()),
                e,
            )),
        }
    }
}
