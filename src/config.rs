// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration file support for tsearch
//!
//! Loads configuration from .tsearchrc.toml in the working directory or ~/.config/tsearch/config.toml

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::paths::{DataPaths, DATA_DIR};

/// Embedding provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderType {
    /// Voyage AI HTTP API
    #[default]
    Voyage,
    /// External command speaking JSON over stdin/stdout
    Command,
    /// Deterministic offline feature hashing
    Hashing,
}

impl std::str::FromStr for EmbeddingProviderType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "voyage" => Ok(EmbeddingProviderType::Voyage),
            "command" => Ok(EmbeddingProviderType::Command),
            "hashing" | "offline" => Ok(EmbeddingProviderType::Hashing),
            _ => Err(format!("Unknown embedding provider: {}", s)),
        }
    }
}

/// Data file locations
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Data directory (defaults to "data")
    pub dir: Option<PathBuf>,
    /// Override for the transcripts file
    pub transcripts: Option<PathBuf>,
    /// Override for the embeddings snapshot
    pub embeddings: Option<PathBuf>,
    /// Override for the build checkpoint
    pub checkpoint: Option<PathBuf>,
}

impl DataConfig {
    /// Get data directory (defaults to "data")
    pub fn dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| PathBuf::from(DATA_DIR))
    }

    /// Resolve all data paths, letting `dir_override` replace the configured directory
    pub fn paths(&self, dir_override: Option<&Path>) -> DataPaths {
        let dir = dir_override
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.dir());
        let mut paths = DataPaths::new(dir);
        if let Some(p) = &self.transcripts {
            paths = paths.with_transcripts(p);
        }
        if let Some(p) = &self.embeddings {
            paths = paths.with_embeddings(p);
        }
        if let Some(p) = &self.checkpoint {
            paths = paths.with_checkpoint(p);
        }
        paths
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider type (voyage, command, hashing)
    pub provider: Option<EmbeddingProviderType>,
    /// Model identifier for the embedding provider
    pub model: Option<String>,
    /// Number of transcripts per provider request
    pub batch_size: Option<usize>,
    /// Attempts per batch when the provider rate limits
    pub max_retries: Option<usize>,
    /// Seconds to wait after a rate limit
    pub retry_delay_secs: Option<u64>,
    /// Milliseconds to pause between batches
    pub batch_delay_ms: Option<u64>,
    /// Base URL of the Voyage API
    pub base_url: Option<String>,
    /// Environment variable holding the API key
    pub api_key_env: Option<String>,
    /// HTTP timeout in seconds
    pub timeout_secs: Option<u64>,
    /// Command to execute for command provider
    pub command: Option<String>,
    /// Vector dimension for the hashing provider
    pub dimension: Option<usize>,
}

impl EmbeddingConfig {
    /// Get provider type (defaults to Voyage)
    pub fn provider(&self) -> EmbeddingProviderType {
        self.provider.unwrap_or_default()
    }

    /// Get model identifier (defaults to "voyage-3", or "hashing-<dimension>"
    /// for the hashing provider)
    pub fn model(&self) -> String {
        match (&self.model, self.provider()) {
            (Some(model), _) => model.clone(),
            (None, EmbeddingProviderType::Hashing) => format!("hashing-{}", self.dimension()),
            (None, _) => "voyage-3".to_string(),
        }
    }

    /// Get batch size (defaults to 64)
    pub fn batch_size(&self) -> usize {
        self.batch_size.unwrap_or(64)
    }

    /// Get max retries (defaults to 5)
    pub fn max_retries(&self) -> usize {
        self.max_retries.unwrap_or(5)
    }

    /// Get rate limit back-off (defaults to 25s)
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs.unwrap_or(25))
    }

    /// Get delay between batches (defaults to 1s)
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms.unwrap_or(1000))
    }

    /// Get Voyage base URL
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or("https://api.voyageai.com/v1")
    }

    /// Get API key environment variable (defaults to VOYAGE_API_KEY)
    pub fn api_key_env(&self) -> &str {
        self.api_key_env.as_deref().unwrap_or("VOYAGE_API_KEY")
    }

    /// Get HTTP timeout (defaults to 60s)
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(60))
    }

    /// Get command (defaults to "embedder")
    pub fn command(&self) -> &str {
        self.command.as_deref().unwrap_or("embedder")
    }

    /// Get hashing dimension (defaults to 256)
    pub fn dimension(&self) -> usize {
        self.dimension.unwrap_or(256)
    }
}

/// Search configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Page size when the request does not give one
    pub default_limit: Option<usize>,
    /// Upper bound on the page size
    pub max_limit: Option<usize>,
}

impl SearchConfig {
    /// Get default limit (defaults to 20)
    pub fn default_limit(&self) -> usize {
        self.default_limit.unwrap_or(20)
    }

    /// Get max limit (defaults to 100)
    pub fn max_limit(&self) -> usize {
        self.max_limit.unwrap_or(100).max(1)
    }
}

/// Query embedding cache configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether caching is enabled
    pub enabled: Option<bool>,
    /// Cache TTL in milliseconds
    pub ttl_ms: Option<u64>,
}

impl CacheConfig {
    /// Get enabled (defaults to true)
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    /// Get TTL in milliseconds (defaults to 7 days)
    pub fn ttl_ms(&self) -> u64 {
        self.ttl_ms.unwrap_or(7 * 24 * 60 * 60 * 1000)
    }
}

/// Configuration loaded from .tsearchrc.toml or ~/.config/tsearch/config.toml
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data file configuration
    #[serde(default)]
    pub data: DataConfig,

    /// Embedding configuration
    #[serde(default)]
    pub embeddings: EmbeddingConfig,

    /// Search configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Config {
    /// Load configuration from files
    ///
    /// Precedence (highest to lowest):
    /// 1. .tsearchrc.toml in current directory
    /// 2. ~/.config/tsearch/config.toml
    pub fn load() -> Self {
        Self::load_for_dir(Path::new("."))
    }

    /// Load configuration, looking for .tsearchrc.toml in `dir` first
    pub fn load_for_dir(dir: &Path) -> Self {
        if let Some(config) = Self::load_from_path(&dir.join(".tsearchrc.toml")) {
            return config;
        }

        if let Some(home) = dirs::home_dir() {
            let config_path = home.join(".config").join("tsearch").join("config.toml");
            if let Some(config) = Self::load_from_path(&config_path) {
                return config;
            }
        }

        Self::default()
    }

    fn load_from_path(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        match toml::from_str(&content) {
            Ok(config) => {
                tracing::debug!(path = %path.display(), "loaded config");
                Some(config)
            }
            Err(e) => {
                eprintln!("Warning: Failed to parse {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Get the embedding configuration
    pub fn embeddings(&self) -> &EmbeddingConfig {
        &self.embeddings
    }

    /// Get the search configuration
    pub fn search(&self) -> &SearchConfig {
        &self.search
    }

    /// Get the cache configuration
    pub fn cache(&self) -> &CacheConfig {
        &self.cache
    }
}
