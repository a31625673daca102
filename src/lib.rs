// SPDX-License-Identifier: MIT OR Apache-2.0

//! tsearch - Interview transcript embedding and semantic search library
//!
//! Shared modules for the tsearch CLI tool: the resumable embedding builder,
//! the vector store, metadata filtering and cosine-similarity search.

pub mod cache;
pub mod config;
pub mod embedding;
pub mod errors;
pub mod filters;
pub mod output;
pub mod paths;
pub mod records;
pub mod search;
pub mod service;
pub mod snippet;
pub mod summary;

pub use errors::{Error, ProviderError, Result};
