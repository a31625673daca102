// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types shared by the embedding builder, the search engine and the CLI.

use thiserror::Error;

/// Result alias used across the library.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by an embedding provider.
///
/// Only [`ProviderError::RateLimited`] is retryable, and only by the batch
/// builder. Query embedding never retries.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("rate limited by embedding provider: {0}")]
    RateLimited(String),

    #[error("embedding request failed: {0}")]
    Request(String),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::RateLimited(_))
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or inconsistent input data.
    #[error("data error: {0}")]
    Data(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("dimension mismatch: store has dimension {expected}, query vector has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("not found: {0}")]
    NotFound(String),

    /// The build was cancelled between batches; the last committed checkpoint is on disk.
    #[error("build interrupted after {committed} embeddings were checkpointed")]
    Interrupted { committed: usize },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    pub fn data(message: impl Into<String>) -> Self {
        Error::Data(message.into())
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io {
            context: context.into(),
            source,
        }
    }

    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Error::Json {
            context: context.into(),
            source,
        }
    }

    /// Whether the error should be shown to a client as "not found" rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
