// SPDX-License-Identifier: MIT OR Apache-2.0

//! Voyage AI embedding client.
//!
//! The client makes exactly one request per call. Rate limits come back as
//! [`ProviderError::RateLimited`] so the caller decides whether to retry.

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::embedding::provider::{EmbeddingProvider, InputType};
use crate::errors::{Error, ProviderError, Result};

/// Blocking embeddings client for the Voyage `/embeddings` endpoint.
pub struct VoyageProvider {
    client: Client,
    endpoint: String,
    model: String,
}

impl VoyageProvider {
    pub fn new(api_key: &str, base_url: &str, model: String, timeout: Duration) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(ProviderError::Request("missing Voyage API key".into()).into());
        }
        if model.trim().is_empty() {
            return Err(Error::data("missing embedding model name"));
        }

        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
            .map_err(|_| ProviderError::Request("invalid Voyage API key".into()))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ProviderError::Request(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl EmbeddingProvider for VoyageProvider {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn provider_kind(&self) -> &str {
        "voyage"
    }

    fn embed_texts(
        &mut self,
        texts: &[String],
        input_type: InputType,
    ) -> std::result::Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            input: texts,
            model: &self.model,
            input_type,
        };
        tracing::debug!(count = texts.len(), %input_type, model = %self.model, "voyage embeddings request");

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(classify_status(status, body));
        }

        let parsed: EmbeddingResponse = resp.json().map_err(|e| {
            ProviderError::InvalidResponse(format!("failed to parse Voyage response: {}", e))
        })?;
        into_ordered_vectors(parsed, texts.len())
    }
}

fn classify_status(status: StatusCode, body: String) -> ProviderError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        ProviderError::RateLimited(body)
    } else {
        ProviderError::Request(format!("Voyage request failed ({}): {}", status, body))
    }
}

fn into_ordered_vectors(
    mut parsed: EmbeddingResponse,
    expected: usize,
) -> std::result::Result<Vec<Vec<f32>>, ProviderError> {
    parsed.data.sort_by_key(|entry| entry.index);
    if parsed.data.len() != expected {
        return Err(ProviderError::InvalidResponse(format!(
            "Voyage returned {} embeddings for {} inputs",
            parsed.data.len(),
            expected
        )));
    }
    Ok(parsed.data.into_iter().map(|entry| entry.embedding).collect())
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
    input_type: InputType,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}
