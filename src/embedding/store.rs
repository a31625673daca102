// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vector store snapshot.
//!
//! A store maps transcript IDs to vectors produced by one named model. Every
//! vector has the store's dimension; this is checked when the store is built
//! and when a snapshot is loaded, so a loaded store can be trusted as-is.
//! Snapshots are flat JSON files:
//! `{"model", "dimension", "count", "embeddings": {id: [f32]}}`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::errors::{Error, Result};
use crate::paths::write_atomic;

/// Immutable mapping from transcript ID to embedding vector.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorStore {
    model: String,
    dimension: usize,
    embeddings: BTreeMap<String, Vec<f32>>,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    model: &'a str,
    dimension: usize,
    count: usize,
    embeddings: &'a BTreeMap<String, Vec<f32>>,
}

#[derive(Deserialize)]
struct Snapshot {
    model: String,
    dimension: usize,
    #[serde(default)]
    count: Option<usize>,
    embeddings: BTreeMap<String, Vec<f32>>,
}

impl VectorStore {
    /// Builds a store, rejecting a zero dimension or any vector of another length.
    pub fn new(
        model: impl Into<String>,
        dimension: usize,
        embeddings: BTreeMap<String, Vec<f32>>,
    ) -> Result<Self> {
        let model = model.into();
        if model.trim().is_empty() {
            return Err(Error::data("vector store model name is empty"));
        }
        if dimension == 0 {
            return Err(Error::data("vector store dimension must be greater than 0"));
        }
        if let Some((id, vector)) = embeddings.iter().find(|(_, v)| v.len() != dimension) {
            return Err(Error::data(format!(
                "embedding for '{}' has length {}, expected {}",
                id,
                vector.len(),
                dimension
            )));
        }

        Ok(Self {
            model,
            dimension,
            embeddings,
        })
    }

    /// Loads and validates a snapshot file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::io(format!("failed to read {}", path.display()), e))?;
        let snapshot: Snapshot = serde_json::from_str(&content)
            .map_err(|e| Error::json(format!("failed to parse {}", path.display()), e))?;

        if let Some(count) = snapshot.count {
            if count != snapshot.embeddings.len() {
                return Err(Error::data(format!(
                    "snapshot {} declares {} embeddings but contains {}",
                    path.display(),
                    count,
                    snapshot.embeddings.len()
                )));
            }
        }

        let store = Self::new(snapshot.model, snapshot.dimension, snapshot.embeddings)?;
        tracing::info!(
            model = %store.model,
            dimension = store.dimension,
            count = store.len(),
            "loaded vector store"
        );
        Ok(store)
    }

    /// Writes the snapshot atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        let snapshot = SnapshotRef {
            model: &self.model,
            dimension: self.dimension,
            count: self.embeddings.len(),
            embeddings: &self.embeddings,
        };
        let json = serde_json::to_vec(&snapshot)
            .map_err(|e| Error::json("failed to serialize vector store", e))?;
        write_atomic(path, &json)
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

    pub fn contains(&self, id: &str) -> bool {
        self.embeddings.contains_key(id)
    }

    /// Looks up one vector; a missing ID is [`Error::NotFound`].
    pub fn get(&self, id: &str) -> Result<&[f32]> {
        self.embeddings
            .get(id)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::NotFound(format!("embedding for '{}'", id)))
    }

    /// Iterates `(id, vector)` pairs in ID order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f32])> {
        self.embeddings
            .iter()
            .map(|(id, v)| (id.as_str(), v.as_slice()))
    }

    pub fn embeddings(&self) -> &BTreeMap<String, Vec<f32>> {
        &self.embeddings
    }
}
