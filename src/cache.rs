// SPDX-License-Identifier: MIT OR Apache-2.0

//! On-disk cache for query embeddings.
//!
//! Embedding the same query twice costs a provider round trip, so query
//! vectors are cached under `<data>/cache/<hash>.json`, keyed by provider,
//! model, input mode and text. Unreadable or expired entries count as misses.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::embedding::InputType;
use crate::errors::{Error, Result};
use crate::paths::write_atomic;

/// Cache key components for generating cache hash
#[derive(Debug, Clone, Serialize)]
pub struct CacheKey<'a> {
    pub provider: &'a str,
    pub model: &'a str,
    pub input_type: InputType,
    pub text: &'a str,
}

impl CacheKey<'_> {
    /// Generate a cache hash from the key
    pub fn hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.provider.as_bytes());
        hasher.update(&[0]);
        hasher.update(self.model.as_bytes());
        hasher.update(&[0]);
        hasher.update(self.input_type.as_str().as_bytes());
        hasher.update(&[0]);
        hasher.update(self.text.as_bytes());
        hasher.finalize().to_hex()[..32].to_string()
    }
}

/// Cached query vector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub vector: Vec<f32>,
    /// Unix epoch milliseconds
    pub created_at: u64,
    pub key_hash: String,
    pub model: String,
}

impl CacheEntry {
    pub fn new(vector: Vec<f32>, key: &CacheKey<'_>) -> Self {
        Self {
            vector,
            created_at: now_ms(),
            key_hash: key.hash(),
            model: key.model.to_string(),
        }
    }

    pub fn is_valid(&self, ttl_ms: u64) -> bool {
        self.age_ms() < ttl_ms
    }

    pub fn age_ms(&self) -> u64 {
        now_ms().saturating_sub(self.created_at)
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Query embedding cache manager
#[derive(Debug, Clone)]
pub struct QueryCache {
    cache_dir: PathBuf,
    ttl_ms: u64,
}

impl QueryCache {
    /// Default cache TTL (7 days)
    pub const DEFAULT_TTL_MS: u64 = 7 * 24 * 60 * 60 * 1000;

    pub fn new(cache_dir: impl Into<PathBuf>, ttl_ms: u64) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ttl_ms,
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn cache_path(&self, key: &CacheKey<'_>) -> PathBuf {
        self.cache_dir.join(format!("{}.json", key.hash()))
    }

    /// Returns the cached vector, or `None` on a miss.
    pub fn get(&self, key: &CacheKey<'_>) -> Option<Vec<f32>> {
        let path = self.cache_path(key);
        if !path.exists() {
            return None;
        }

        let entry: CacheEntry = match fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|content| serde_json::from_str(&content).map_err(|e| e.to_string()))
        {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "ignoring unreadable cache entry");
                return None;
            }
        };

        if !entry.is_valid(self.ttl_ms) {
            let _ = fs::remove_file(&path);
            return None;
        }
        if entry.key_hash != key.hash() || entry.model != key.model {
            return None;
        }

        tracing::debug!(age_ms = entry.age_ms(), "query embedding cache hit");
        Some(entry.vector)
    }

    /// Stores a vector in the cache
    pub fn put(&self, key: &CacheKey<'_>, vector: &[f32]) -> Result<()> {
        let entry = CacheEntry::new(vector.to_vec(), key);
        let json = serde_json::to_vec(&entry)
            .map_err(|e| Error::json("failed to serialize cache entry", e))?;
        write_atomic(&self.cache_path(key), &json)
    }
}
