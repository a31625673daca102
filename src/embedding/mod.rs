// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transcript embeddings: providers, the resumable batch builder and the
//! persisted vector store.

pub mod builder;
pub mod checkpoint;
pub mod compose;
pub mod provider;
pub mod query;
pub mod store;
pub mod voyage;

pub use builder::{BatchProgress, BuildOptions, BuildState, EmbeddingBuilder};
pub use checkpoint::{BuildCheckpoint, CheckpointFile};
pub use compose::compose_embedding_text;
pub use provider::{
    create_provider, CommandProvider, EmbeddingProvider, HashingProvider, InputType,
};
pub use query::{embed_query, QueryEmbedder};
pub use store::VectorStore;
pub use voyage::VoyageProvider;
