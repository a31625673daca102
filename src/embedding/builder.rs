// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resumable batch embedding builder.
//!
//! Records are embedded in fixed-size batches, strictly one after another.
//! After every successful batch the accumulated embeddings are written to the
//! checkpoint file before the next batch starts, so the checkpoint on disk
//! always reflects fully committed batches only. When all batches are done the
//! vector store snapshot is written and the checkpoint is deleted.
//!
//! The build is a small state machine:
//!
//! ```text
//! Idle --first batch--> InProgress(checkpoint) --batch--> InProgress(checkpoint)
//!                       InProgress(checkpoint) --finish--> Completed(store)
//! ```

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::embedding::checkpoint::{BuildCheckpoint, CheckpointFile};
use crate::embedding::compose::compose_embedding_text;
use crate::embedding::provider::{EmbeddingProvider, InputType};
use crate::embedding::store::VectorStore;
use crate::errors::{Error, ProviderError, Result};
use crate::paths::DataPaths;
use crate::records::TranscriptRecord;

/// Default number of transcripts per provider request.
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Default number of attempts per batch when rate limited.
pub const DEFAULT_MAX_RETRIES: usize = 5;

/// Default back-off after a rate limit.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(25);

/// Default pause between batches.
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_secs(1);

/// Options for one build run.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Model the provider must serve; recorded in the store.
    pub model: String,
    /// Transcripts per provider request.
    pub batch_size: usize,
    /// Continue from an existing checkpoint.
    pub resume: bool,
    /// Attempts per batch when the provider rate limits.
    pub max_retries: usize,
    /// Wait after a rate limit before retrying the same batch.
    pub retry_delay: Duration,
    /// Wait between consecutive batches.
    pub batch_delay: Duration,
}

impl BuildOptions {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            resume: false,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            batch_delay: DEFAULT_BATCH_DELAY,
        }
    }

    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self {
            model: config.model(),
            batch_size: config.batch_size(),
            resume: false,
            max_retries: config.max_retries(),
            retry_delay: config.retry_delay(),
            batch_delay: config.batch_delay(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets both the rate-limit back-off and the pause between batches.
    pub fn with_delays(mut self, retry_delay: Duration, batch_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self.batch_delay = batch_delay;
        self
    }
}

/// Progress reported after each committed batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    /// 1-based index of the batch just committed
    pub batch: usize,
    /// Batches in this run
    pub batches: usize,
    /// Embeddings committed in this run so far
    pub embedded: usize,
    /// Embeddings to produce in this run
    pub pending: usize,
    /// Embeddings in the checkpoint, including resumed ones
    pub committed: usize,
}

/// Where a build stands.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildState {
    /// Nothing committed yet.
    Idle,
    /// At least one batch committed; mirrors the checkpoint on disk.
    InProgress(BuildCheckpoint),
    /// Snapshot written and checkpoint removed.
    Completed(VectorStore),
}

impl BuildState {
    /// Embeddings committed so far.
    pub fn committed(&self) -> usize {
        match self {
            BuildState::Idle => 0,
            BuildState::InProgress(checkpoint) => checkpoint.len(),
            BuildState::Completed(store) => store.len(),
        }
    }

    fn is_processed(&self, id: &str) -> bool {
        match self {
            BuildState::Idle => false,
            BuildState::InProgress(checkpoint) => checkpoint.is_processed(id),
            BuildState::Completed(store) => store.contains(id),
        }
    }
}

type ProgressCallback<'a> = Box<dyn FnMut(&BatchProgress) + 'a>;

/// Drives an [`EmbeddingProvider`] over transcript records.
pub struct EmbeddingBuilder<'a> {
    provider: &'a mut dyn EmbeddingProvider,
    options: BuildOptions,
    checkpoint: CheckpointFile,
    output: PathBuf,
    state: BuildState,
    cancel: Option<Arc<AtomicBool>>,
    on_batch: Option<ProgressCallback<'a>>,
}

impl<'a> EmbeddingBuilder<'a> {
    pub fn new(
        provider: &'a mut dyn EmbeddingProvider,
        options: BuildOptions,
        paths: &DataPaths,
    ) -> Self {
        Self {
            provider,
            options,
            checkpoint: CheckpointFile::new(&paths.checkpoint),
            output: paths.embeddings.clone(),
            state: BuildState::Idle,
            cancel: None,
            on_batch: None,
        }
    }

    /// Stops the build before the next batch once `flag` is set.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Calls `callback` after every committed batch.
    pub fn on_batch(mut self, callback: impl FnMut(&BatchProgress) + 'a) -> Self {
        self.on_batch = Some(Box::new(callback));
        self
    }

    pub fn state(&self) -> &BuildState {
        &self.state
    }

    /// Embeds `records` and writes the vector store snapshot.
    pub fn build(&mut self, records: &[TranscriptRecord]) -> Result<VectorStore> {
        self.validate_options()?;
        let documents = compose_documents(records)?;

        self.state = BuildState::Idle;
        if self.options.resume {
            if let Some(checkpoint) = self.checkpoint.load()? {
                if checkpoint.model() != self.options.model {
                    return Err(Error::data(format!(
                        "checkpoint was built with model '{}', not '{}'; rerun without resume",
                        checkpoint.model(),
                        self.options.model
                    )));
                }
                self.state = BuildState::InProgress(checkpoint);
            }
        }

        let pending: Vec<(String, String)> = documents
            .into_iter()
            .filter(|(id, _)| !self.state.is_processed(id))
            .collect();

        tracing::info!(
            model = %self.options.model,
            total = records.len(),
            already_processed = self.state.committed(),
            pending = pending.len(),
            "starting embedding build"
        );

        if pending.is_empty() && self.state == BuildState::Idle {
            return Err(Error::data("nothing to embed: no transcripts and no checkpoint"));
        }

        let batches = pending.len().div_ceil(self.options.batch_size);
        let mut embedded = 0;

        for (index, batch) in pending.chunks(self.options.batch_size).enumerate() {
            if self.is_cancelled() {
                tracing::warn!(committed = self.state.committed(), "embedding build interrupted");
                return Err(Error::Interrupted {
                    committed: self.state.committed(),
                });
            }

            let (ids, texts): (Vec<String>, Vec<String>) = batch.iter().cloned().unzip();
            let vectors = self.embed_batch(&texts, index + 1)?;
            self.commit_batch(&ids, vectors)?;

            embedded += ids.len();
            let progress = BatchProgress {
                batch: index + 1,
                batches,
                embedded,
                pending: pending.len(),
                committed: self.state.committed(),
            };
            tracing::info!(
                batch = progress.batch,
                batches,
                committed = progress.committed,
                "checkpoint saved"
            );
            if let Some(callback) = self.on_batch.as_mut() {
                callback(&progress);
            }

            if index + 1 < batches && !self.options.batch_delay.is_zero() {
                thread::sleep(self.options.batch_delay);
            }
        }

        self.finish()
    }

    fn validate_options(&self) -> Result<()> {
        if self.options.batch_size == 0 {
            return Err(Error::data("batch size must be greater than 0"));
        }
        if self.provider.model_id() != self.options.model {
            return Err(Error::data(format!(
                "provider serves model '{}' but the build requested '{}'",
                self.provider.model_id(),
                self.options.model
            )));
        }
        Ok(())
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map_or(false, |flag| flag.load(Ordering::SeqCst))
    }

    /// Requests embeddings for one batch, retrying only on rate limits.
    fn embed_batch(&mut self, texts: &[String], batch: usize) -> Result<Vec<Vec<f32>>> {
        let attempts = self.options.max_retries.max(1);
        let mut attempt = 1;
        loop {
            match self.provider.embed_texts(texts, InputType::Document) {
                Ok(vectors) => {
                    if vectors.len() != texts.len() {
                        return Err(ProviderError::InvalidResponse(format!(
                            "provider returned {} embeddings for {} inputs",
                            vectors.len(),
                            texts.len()
                        ))
                        .into());
                    }
                    return Ok(vectors);
                }
                Err(err) if err.is_retryable() && attempt < attempts => {
                    tracing::warn!(
                        batch,
                        attempt,
                        attempts,
                        delay_secs = self.options.retry_delay.as_secs_f64(),
                        "rate limited, retrying batch"
                    );
                    thread::sleep(self.options.retry_delay);
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Merges a batch and persists the checkpoint before moving on.
    fn commit_batch(&mut self, ids: &[String], vectors: Vec<Vec<f32>>) -> Result<()> {
        let mut checkpoint = match &self.state {
            BuildState::InProgress(checkpoint) => checkpoint.clone(),
            _ => {
                let dimension = vectors.first().map(Vec::len).unwrap_or(0);
                tracing::info!(dimension, "embedding dimension fixed by first batch");
                BuildCheckpoint::new(self.options.model.clone(), dimension)?
            }
        };
        checkpoint.merge_batch(ids, vectors)?;
        self.checkpoint.save(&checkpoint)?;
        self.state = BuildState::InProgress(checkpoint);
        Ok(())
    }

    fn finish(&mut self) -> Result<VectorStore> {
        let checkpoint = match std::mem::replace(&mut self.state, BuildState::Idle) {
            BuildState::InProgress(checkpoint) => checkpoint,
            other => {
                self.state = other;
                return Err(Error::data("no committed embeddings to finalize"));
            }
        };

        let store = checkpoint.clone().into_store()?;
        if let Err(err) = store.save(&self.output) {
            self.state = BuildState::InProgress(checkpoint);
            return Err(err);
        }
        self.checkpoint.remove()?;

        tracing::info!(
            count = store.len(),
            dimension = store.dimension(),
            path = %self.output.display(),
            "saved vector store"
        );
        self.state = BuildState::Completed(store.clone());
        Ok(store)
    }
}

/// Composes every record's text up front so malformed input fails before any provider call.
fn compose_documents(records: &[TranscriptRecord]) -> Result<Vec<(String, String)>> {
    let mut seen = HashSet::with_capacity(records.len());
    records
        .iter()
        .map(|record| {
            if record.transcript_id.trim().is_empty() {
                return Err(Error::data("transcript record with empty transcript_id"));
            }
            if !seen.insert(record.transcript_id.as_str()) {
                return Err(Error::data(format!(
                    "duplicate transcript_id '{}'",
                    record.transcript_id
                )));
            }
            Ok((record.transcript_id.clone(), compose_embedding_text(record)?))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::provider::HashingProvider;
    use crate::records::{Message, Role};
    use std::collections::HashMap;
    use tempfile::tempdir;

    /// Wraps the hashing provider with scripted failures keyed by call number (1-based).
    struct ScriptedProvider {
        inner: HashingProvider,
        failures: HashMap<usize, ProviderError>,
        calls: Vec<Vec<String>>,
        always_rate_limit_from: Option<usize>,
    }

    impl ScriptedProvider {
        fn new(model: &str) -> Self {
            Self {
                inner: HashingProvider::new(model, 16),
                failures: HashMap::new(),
                calls: Vec::new(),
                always_rate_limit_from: None,
            }
        }

        fn fail_on(mut self, call: usize, err: ProviderError) -> Self {
            self.failures.insert(call, err);
            self
        }

        fn successful_texts(&self) -> usize {
            self.calls.iter().map(Vec::len).sum()
        }
    }

    impl EmbeddingProvider for ScriptedProvider {
        fn model_id(&self) -> &str {
            self.inner.model_id()
        }

        fn embed_texts(
            &mut self,
            texts: &[String],
            input_type: InputType,
        ) -> std::result::Result<Vec<Vec<f32>>, ProviderError> {
            assert_eq!(input_type, InputType::Document);
            let call = self.calls.len() + 1;
            if let Some(err) = self.failures.remove(&call) {
                self.calls.push(Vec::new());
                return Err(err);
            }
            if self.always_rate_limit_from.map_or(false, |from| call >= from) {
                self.calls.push(Vec::new());
                return Err(ProviderError::RateLimited("429".into()));
            }
            self.calls.push(texts.to_vec());
            self.inner.embed_texts(texts, input_type)
        }
    }

    fn records(n: usize) -> Vec<TranscriptRecord> {
        (1..=n)
            .map(|i| TranscriptRecord {
                transcript_id: format!("t{}", i),
                split: "workforce".into(),
                messages: vec![Message {
                    role: Role::User,
                    content: format!("interview number {} about tool {}", i, i * 7),
                }],
                ..Default::default()
            })
            .collect()
    }

    fn options(batch_size: usize) -> BuildOptions {
        BuildOptions::new("test-model")
            .with_batch_size(batch_size)
            .with_delays(Duration::ZERO, Duration::ZERO)
    }

    #[test]
    fn test_rate_limit_once_then_success_embeds_each_record_once() {
        let dir = tempdir().unwrap();
        let paths = DataPaths::new(dir.path());
        let mut provider = ScriptedProvider::new("test-model")
            .fail_on(2, ProviderError::RateLimited("429".into()));

        let store = EmbeddingBuilder::new(&mut provider, options(2), &paths)
            .build(&records(5))
            .unwrap();

        assert_eq!(store.len(), 5);
        // batch 1, batch 2 (rate limited), batch 2 retry, batch 3
        assert_eq!(provider.calls.len(), 4);
        assert_eq!(provider.successful_texts(), 5);
        let mut embedded: Vec<&String> = provider.calls.iter().flatten().collect();
        embedded.sort();
        embedded.dedup();
        assert_eq!(embedded.len(), 5);

        assert!(paths.embeddings.exists());
        assert!(!paths.checkpoint.exists());
        assert_eq!(VectorStore::load(&paths.embeddings).unwrap(), store);
    }

    #[test]
    fn test_retry_exhaustion_keeps_last_checkpoint() {
        let dir = tempdir().unwrap();
        let paths = DataPaths::new(dir.path());
        let mut provider = ScriptedProvider::new("test-model");
        provider.always_rate_limit_from = Some(2);

        let err = EmbeddingBuilder::new(&mut provider, options(2).with_max_retries(3), &paths)
            .build(&records(5))
            .unwrap_err();

        assert!(matches!(err, Error::Provider(ProviderError::RateLimited(_))));
        assert_eq!(provider.calls.len(), 1 + 3);

        let checkpoint = CheckpointFile::new(&paths.checkpoint).load().unwrap().unwrap();
        assert_eq!(checkpoint.processed_ids().collect::<Vec<_>>(), vec!["t1", "t2"]);
        assert!(!paths.embeddings.exists());
    }

    #[test]
    fn test_non_retryable_error_is_fatal_immediately() {
        let dir = tempdir().unwrap();
        let paths = DataPaths::new(dir.path());
        let mut provider = ScriptedProvider::new("test-model")
            .fail_on(1, ProviderError::Request("401 unauthorized".into()));

        let mut builder = EmbeddingBuilder::new(&mut provider, options(2), &paths);
        let err = builder.build(&records(3)).unwrap_err();
        assert!(matches!(err, Error::Provider(ProviderError::Request(_))));
        assert_eq!(builder.state(), &BuildState::Idle);
        drop(builder);

        assert_eq!(provider.calls.len(), 1);
        assert!(!paths.checkpoint.exists());
    }

    #[test]
    fn test_resume_matches_uninterrupted_run() {
        let inputs = records(5);

        let full_dir = tempdir().unwrap();
        let full_paths = DataPaths::new(full_dir.path());
        let mut provider = ScriptedProvider::new("test-model");
        let uninterrupted = EmbeddingBuilder::new(&mut provider, options(2), &full_paths)
            .build(&inputs)
            .unwrap();

        let dir = tempdir().unwrap();
        let paths = DataPaths::new(dir.path());
        let mut failing = ScriptedProvider::new("test-model")
            .fail_on(3, ProviderError::Request("connection reset".into()));
        let err = EmbeddingBuilder::new(&mut failing, options(2), &paths)
            .build(&inputs)
            .unwrap_err();
        assert!(matches!(err, Error::Provider(_)));
        let partial = CheckpointFile::new(&paths.checkpoint).load().unwrap().unwrap();
        assert_eq!(partial.len(), 4);

        let mut resumed_provider = ScriptedProvider::new("test-model");
        let resumed = EmbeddingBuilder::new(&mut resumed_provider, options(2).with_resume(true), &paths)
            .build(&inputs)
            .unwrap();

        assert_eq!(resumed_provider.successful_texts(), 1);
        assert_eq!(resumed, uninterrupted);
        assert!(!paths.checkpoint.exists());
    }

    #[test]
    fn test_without_resume_checkpoint_is_ignored() {
        let dir = tempdir().unwrap();
        let paths = DataPaths::new(dir.path());
        let mut stale = BuildCheckpoint::new("test-model", 16).unwrap();
        stale.merge_batch(&["t1".to_string()], vec![vec![0.0; 16]]).unwrap();
        CheckpointFile::new(&paths.checkpoint).save(&stale).unwrap();

        let mut provider = ScriptedProvider::new("test-model");
        let store = EmbeddingBuilder::new(&mut provider, options(10), &paths)
            .build(&records(2))
            .unwrap();
        assert_eq!(provider.successful_texts(), 2);
        assert_ne!(store.get("t1").unwrap(), vec![0.0; 16].as_slice());
    }

    #[test]
    fn test_resume_rejects_checkpoint_from_other_model() {
        let dir = tempdir().unwrap();
        let paths = DataPaths::new(dir.path());
        let mut other = BuildCheckpoint::new("other-model", 16).unwrap();
        other.merge_batch(&["t1".to_string()], vec![vec![1.0; 16]]).unwrap();
        CheckpointFile::new(&paths.checkpoint).save(&other).unwrap();

        let mut provider = ScriptedProvider::new("test-model");
        let err = EmbeddingBuilder::new(&mut provider, options(2).with_resume(true), &paths)
            .build(&records(2))
            .unwrap_err();
        assert!(matches!(err, Error::Data(_)));
        assert!(provider.calls.is_empty());
    }

    #[test]
    fn test_dimension_change_mid_run_is_data_error() {
        struct Shrinking {
            calls: usize,
        }
        impl EmbeddingProvider for Shrinking {
            fn model_id(&self) -> &str {
                "test-model"
            }
            fn embed_texts(
                &mut self,
                texts: &[String],
                _input_type: InputType,
            ) -> std::result::Result<Vec<Vec<f32>>, ProviderError> {
                self.calls += 1;
                let dim = if self.calls == 1 { 3 } else { 2 };
                Ok(texts.iter().map(|_| vec![1.0; dim]).collect())
            }
        }

        let dir = tempdir().unwrap();
        let paths = DataPaths::new(dir.path());
        let mut provider = Shrinking { calls: 0 };
        let err = EmbeddingBuilder::new(&mut provider, options(2), &paths)
            .build(&records(4))
            .unwrap_err();
        assert!(matches!(err, Error::Data(_)));

        let checkpoint = CheckpointFile::new(&paths.checkpoint).load().unwrap().unwrap();
        assert_eq!(checkpoint.dimension(), 3);
        assert_eq!(checkpoint.len(), 2);
    }

    #[test]
    fn test_cancel_between_batches() {
        let dir = tempdir().unwrap();
        let paths = DataPaths::new(dir.path());
        let flag = Arc::new(AtomicBool::new(false));
        let trip = flag.clone();
        let mut provider = ScriptedProvider::new("test-model");

        let err = EmbeddingBuilder::new(&mut provider, options(2), &paths)
            .with_cancel_flag(flag)
            .on_batch(move |progress| {
                if progress.batch == 1 {
                    trip.store(true, Ordering::SeqCst);
                }
            })
            .build(&records(5))
            .unwrap_err();

        assert!(matches!(err, Error::Interrupted { committed: 2 }));
        let checkpoint = CheckpointFile::new(&paths.checkpoint).load().unwrap().unwrap();
        assert_eq!(checkpoint.len(), 2);
    }

    #[test]
    fn test_progress_reports_every_batch() {
        let dir = tempdir().unwrap();
        let paths = DataPaths::new(dir.path());
        let mut provider = ScriptedProvider::new("test-model");
        let mut seen = Vec::new();

        EmbeddingBuilder::new(&mut provider, options(2), &paths)
            .on_batch(|progress| seen.push(*progress))
            .build(&records(5))
            .unwrap();

        assert_eq!(seen.len(), 3);
        assert_eq!(seen[2].batch, 3);
        assert_eq!(seen[2].batches, 3);
        assert_eq!(seen[2].embedded, 5);
        assert_eq!(seen[2].committed, 5);
    }

    #[test]
    fn test_malformed_record_fails_before_any_call() {
        let dir = tempdir().unwrap();
        let paths = DataPaths::new(dir.path());
        let mut inputs = records(3);
        inputs[2].messages.clear();
        let mut provider = ScriptedProvider::new("test-model");

        let err = EmbeddingBuilder::new(&mut provider, options(2), &paths)
            .build(&inputs)
            .unwrap_err();
        assert!(matches!(err, Error::Data(_)));
        assert!(provider.calls.is_empty());
    }

    #[test]
    fn test_nothing_to_embed() {
        let dir = tempdir().unwrap();
        let paths = DataPaths::new(dir.path());
        let mut provider = ScriptedProvider::new("test-model");
        let err = EmbeddingBuilder::new(&mut provider, options(2), &paths)
            .build(&[])
            .unwrap_err();
        assert!(matches!(err, Error::Data(_)));
    }

    #[test]
    fn test_resume_with_everything_processed_finalizes() {
        let dir = tempdir().unwrap();
        let paths = DataPaths::new(dir.path());
        let mut checkpoint = BuildCheckpoint::new("test-model", 16).unwrap();
        checkpoint
            .merge_batch(&["t1".to_string()], vec![vec![0.25; 16]])
            .unwrap();
        CheckpointFile::new(&paths.checkpoint).save(&checkpoint).unwrap();

        let mut provider = ScriptedProvider::new("test-model");
        let mut builder = EmbeddingBuilder::new(&mut provider, options(2).with_resume(true), &paths);
        let store = builder.build(&records(1)).unwrap();
        assert!(matches!(builder.state(), BuildState::Completed(_)));
        drop(builder);

        assert!(provider.calls.is_empty());
        assert_eq!(store.get("t1").unwrap(), vec![0.25; 16].as_slice());
        assert!(!paths.checkpoint.exists());
    }

    #[test]
    fn test_rejects_bad_options() {
        let dir = tempdir().unwrap();
        let paths = DataPaths::new(dir.path());
        let mut provider = ScriptedProvider::new("test-model");
        let err = EmbeddingBuilder::new(&mut provider, options(0), &paths)
            .build(&records(1))
            .unwrap_err();
        assert!(matches!(err, Error::Data(_)));

        let err = EmbeddingBuilder::new(&mut provider, BuildOptions::new("voyage-3"), &paths)
            .build(&records(1))
            .unwrap_err();
        assert!(matches!(err, Error::Data(_)));
    }
}
