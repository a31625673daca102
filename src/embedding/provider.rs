// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding provider interface and implementations.
//!
//! Providers turn batches of text into vectors. The batch builder calls them in
//! [`InputType::Document`] mode and the query adapter in [`InputType::Query`]
//! mode; asymmetric models encode the two differently.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::Write;
use std::process::{Command, Stdio};

use crate::config::{EmbeddingConfig, EmbeddingProviderType};
use crate::embedding::voyage::VoyageProvider;
use crate::errors::{Error, ProviderError, Result};

/// Exit status (`EX_TEMPFAIL`) a command provider uses to signal a rate limit.
pub const COMMAND_RATE_LIMIT_STATUS: i32 = 75;

/// Model names served by [`HashingProvider`] start with this prefix.
pub const HASHING_MODEL_PREFIX: &str = "hashing";

/// Which side of an asymmetric embedding model a text belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    /// Texts stored in the vector store
    Document,
    /// Free-text search queries
    Query,
}

impl InputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputType::Document => "document",
            InputType::Query => "query",
        }
    }
}

impl std::fmt::Display for InputType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for embedding providers.
pub trait EmbeddingProvider: Send {
    /// Returns the model identifier.
    fn model_id(&self) -> &str;

    /// Short name of the provider family, e.g. `voyage`.
    fn provider_kind(&self) -> &str {
        "custom"
    }

    /// Generates one embedding per text, in input order.
    fn embed_texts(
        &mut self,
        texts: &[String],
        input_type: InputType,
    ) -> std::result::Result<Vec<Vec<f32>>, ProviderError>;

    /// Generates an embedding for a single text.
    fn embed_one(
        &mut self,
        text: &str,
        input_type: InputType,
    ) -> std::result::Result<Vec<f32>, ProviderError> {
        let mut result = self.embed_texts(&[text.to_string()], input_type)?;
        result
            .pop()
            .ok_or_else(|| ProviderError::InvalidResponse("no embedding returned".into()))
    }
}

/// Builds the provider selected by the configuration.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    let model = config.model();
    let provider: Box<dyn EmbeddingProvider> = match config.provider() {
        EmbeddingProviderType::Voyage => {
            let key_env = config.api_key_env();
            let api_key = std::env::var(key_env).map_err(|_| {
                Error::Provider(ProviderError::Request(format!(
                    "{} is not set; export it or choose another provider",
                    key_env
                )))
            })?;
            Box::new(VoyageProvider::new(
                &api_key,
                config.base_url(),
                model,
                config.timeout(),
            )?)
        }
        EmbeddingProviderType::Command => {
            Box::new(CommandProvider::new(config.command().to_string(), model))
        }
        EmbeddingProviderType::Hashing => {
            if !model.starts_with(HASHING_MODEL_PREFIX) {
                return Err(Error::data(format!(
                    "the hashing provider cannot serve model '{}'; use a name starting with '{}'",
                    model, HASHING_MODEL_PREFIX
                )));
            }
            Box::new(HashingProvider::new(model, config.dimension()))
        }
    };
    tracing::debug!(provider = ?config.provider(), model = provider.model_id(), "created embedding provider");
    Ok(provider)
}

/// Command provider that shells out to an external process.
///
/// The command receives `{"model", "input_type", "texts"}` on stdin and prints
/// either a JSON array of vectors or an object with an `embeddings` field.
pub struct CommandProvider {
    command: String,
    model: String,
}

impl CommandProvider {
    pub fn new(command: String, model: String) -> Self {
        Self { command, model }
    }

    fn run_command(
        &self,
        texts: &[String],
        input_type: InputType,
    ) -> std::result::Result<Vec<Vec<f32>>, ProviderError> {
        let payload = serde_json::json!({
            "model": self.model,
            "input_type": input_type,
            "texts": texts,
        });

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                ProviderError::Request(format!(
                    "failed to spawn embedding command '{}': {}",
                    self.command, e
                ))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(payload.to_string().as_bytes())
                .map_err(|e| ProviderError::Request(format!("failed to write payload: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| ProviderError::Request(format!("failed to read command output: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if output.status.code() == Some(COMMAND_RATE_LIMIT_STATUS) {
                return Err(ProviderError::RateLimited(stderr));
            }
            return Err(ProviderError::Request(format!(
                "embedding command failed (status {}): {}",
                output.status, stderr
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let parsed: Value = serde_json::from_str(stdout.trim()).map_err(|e| {
            ProviderError::InvalidResponse(format!("command output is not JSON: {}", e))
        })?;
        parse_vectors(parsed)
    }
}

impl EmbeddingProvider for CommandProvider {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn provider_kind(&self) -> &str {
        "command"
    }

    fn embed_texts(
        &mut self,
        texts: &[String],
        input_type: InputType,
    ) -> std::result::Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.run_command(texts, input_type)
    }
}

fn parse_vectors(parsed: Value) -> std::result::Result<Vec<Vec<f32>>, ProviderError> {
    let invalid = |msg: &str| ProviderError::InvalidResponse(msg.to_string());

    let embeddings_value = match parsed {
        Value::Array(arr) => Value::Array(arr),
        Value::Object(mut obj) => obj
            .remove("embeddings")
            .or_else(|| obj.remove("vectors"))
            .ok_or_else(|| invalid("output missing 'embeddings' field"))?,
        _ => return Err(invalid("output must be a JSON array or object")),
    };

    embeddings_value
        .as_array()
        .ok_or_else(|| invalid("embeddings must be a JSON array"))?
        .iter()
        .map(|row| -> std::result::Result<Vec<f32>, ProviderError> {
            row.as_array()
                .ok_or_else(|| invalid("embedding row must be an array"))?
                .iter()
                .map(|value| {
                    value
                        .as_f64()
                        .map(|v| v as f32)
                        .ok_or_else(|| invalid("embedding value must be a number"))
                })
                .collect()
        })
        .collect()
}

/// Deterministic offline provider based on feature hashing.
///
/// Each lowercase token is hashed with blake3 into a signed bucket and the
/// result is L2-normalized, so texts sharing words score higher. Query and
/// document modes produce the same vectors.
pub struct HashingProvider {
    model: String,
    dimension: usize,
}

impl HashingProvider {
    pub fn new(model: impl Into<String>, dimension: usize) -> Self {
        Self {
            model: model.into(),
            dimension: dimension.max(1),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = blake3::hash(token.to_lowercase().as_bytes());
            let bytes = hash.as_bytes();
            let mut index_bytes = [0u8; 8];
            index_bytes.copy_from_slice(&bytes[..8]);
            let index = (u64::from_le_bytes(index_bytes) % self.dimension as u64) as usize;
            let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[index] += sign;
        }
        l2_normalize(&mut vector);
        vector
    }
}

impl EmbeddingProvider for HashingProvider {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn provider_kind(&self) -> &str {
        HASHING_MODEL_PREFIX
    }

    fn embed_texts(
        &mut self,
        texts: &[String],
        _input_type: InputType,
    ) -> std::result::Result<Vec<Vec<f32>>, ProviderError> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }
}

fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vector.iter_mut() {
        *value /= norm;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::cosine_similarity;

    #[test]
    fn test_hashing_provider() {
        let mut provider = HashingProvider::new("hashing", 64);
        assert_eq!(provider.model_id(), "hashing");

        let result = provider
            .embed_texts(
                &["spreadsheets and budgets".to_string(), "".to_string()],
                InputType::Document,
            )
            .unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].len(), 64);
        let norm: f32 = result[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        assert!(result[1].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_hashing_provider_is_deterministic_across_modes() {
        let mut provider = HashingProvider::new("hashing", 128);
        let doc = provider.embed_one("Nurse using ChatGPT", InputType::Document).unwrap();
        let query = provider.embed_one("nurse using chatgpt", InputType::Query).unwrap();
        assert_eq!(doc, query);
    }

    #[test]
    fn test_hashing_provider_shared_words_score_higher() {
        let mut provider = HashingProvider::new("hashing", 256);
        let a = provider.embed_one("code review with copilot", InputType::Document).unwrap();
        let b = provider.embed_one("copilot code review", InputType::Query).unwrap();
        let c = provider.embed_one("watercolor painting", InputType::Query).unwrap();
        assert!(cosine_similarity(&a, &b) > cosine_similarity(&a, &c));
    }

    #[test]
    fn test_hashing_provider_names_its_own_model() {
        let config = EmbeddingConfig {
            provider: Some(EmbeddingProviderType::Hashing),
            dimension: Some(32),
            ..Default::default()
        };
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.model_id(), "hashing-32");
        assert_eq!(provider.provider_kind(), "hashing");

        let config = EmbeddingConfig {
            model: Some("voyage-3".into()),
            ..config
        };
        assert!(matches!(create_provider(&config), Err(Error::Data(_))));
    }

    #[test]
    fn test_empty_embed() {
        let mut provider = HashingProvider::new("hashing", 8);
        let result = provider.embed_texts(&[], InputType::Document).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_parse_vectors() {
        let vectors = parse_vectors(serde_json::json!([[1.0, 2.0], [3.0, 4.0]])).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 2.0], vec![3.0, 4.0]]);

        let vectors = parse_vectors(serde_json::json!({"embeddings": [[0.5]]})).unwrap();
        assert_eq!(vectors, vec![vec![0.5]]);

        assert!(parse_vectors(serde_json::json!({"data": []})).is_err());
        assert!(parse_vectors(serde_json::json!([["x"]])).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_command_provider_round_trip() {
        let mut provider = CommandProvider::new(
            r#"cat > /dev/null; echo '{"embeddings": [[1, 0], [0, 1]]}'"#.to_string(),
            "cmd-model".to_string(),
        );
        let vectors = provider
            .embed_texts(&["a".to_string(), "b".to_string()], InputType::Document)
            .unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[cfg(unix)]
    #[test]
    fn test_command_provider_rate_limit_status() {
        let mut provider = CommandProvider::new(
            "cat > /dev/null; echo 'slow down' >&2; exit 75".to_string(),
            "cmd-model".to_string(),
        );
        let err = provider
            .embed_texts(&["a".to_string()], InputType::Document)
            .unwrap_err();
        assert!(err.is_retryable());

        let mut provider =
            CommandProvider::new("cat > /dev/null; exit 1".to_string(), "cmd-model".to_string());
        let err = provider
            .embed_texts(&["a".to_string()], InputType::Document)
            .unwrap_err();
        assert!(!err.is_retryable());
    }
}
