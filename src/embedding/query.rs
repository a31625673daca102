// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query-side embedding.
//!
//! Queries are embedded in query mode with a single attempt; a rate limit here
//! is reported to the caller instead of retried.

use crate::cache::{CacheKey, QueryCache};
use crate::embedding::provider::{EmbeddingProvider, InputType};
use crate::errors::{Error, Result};

/// Embeds free-text queries with one provider, optionally through a cache.
pub struct QueryEmbedder<'a> {
    provider: &'a mut dyn EmbeddingProvider,
    cache: Option<QueryCache>,
}

impl<'a> QueryEmbedder<'a> {
    pub fn new(provider: &'a mut dyn EmbeddingProvider) -> Self {
        Self {
            provider,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: Option<QueryCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Embeds `text` with `model`; the provider must serve that model.
    pub fn embed_query(&mut self, text: &str, model: &str) -> Result<Vec<f32>> {
        embed_query_with(&mut *self.provider, self.cache.as_ref(), text, model)
    }
}

/// Embeds one query without a cache.
pub fn embed_query(provider: &mut dyn EmbeddingProvider, text: &str, model: &str) -> Result<Vec<f32>> {
    embed_query_with(provider, None, text, model)
}

fn embed_query_with(
    provider: &mut dyn EmbeddingProvider,
    cache: Option<&QueryCache>,
    text: &str,
    model: &str,
) -> Result<Vec<f32>> {
    let text = text.trim();
    if text.is_empty() {
        return Err(Error::data("query text is empty"));
    }
    if provider.model_id() != model {
        return Err(Error::data(format!(
            "provider serves model '{}' but the vector store was built with '{}'",
            provider.model_id(),
            model
        )));
    }

    let provider_kind = provider.provider_kind().to_string();
    let key = CacheKey {
        provider: &provider_kind,
        model,
        input_type: InputType::Query,
        text,
    };
    if let Some(vector) = cache.and_then(|c| c.get(&key)) {
        return Ok(vector);
    }

    let vector = provider.embed_one(text, InputType::Query)?;
    if vector.is_empty() {
        return Err(Error::data("provider returned an empty query embedding"));
    }

    if let Some(cache) = cache {
        if let Err(err) = cache.put(&key, &vector) {
            tracing::warn!(error = %err, "failed to cache query embedding");
        }
    }
    Ok(vector)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ProviderError;
    use tempfile::tempdir;

    struct CountingProvider {
        calls: usize,
        modes: Vec<InputType>,
        rate_limited: bool,
    }

    impl CountingProvider {
        fn new() -> Self {
            Self {
                calls: 0,
                modes: Vec::new(),
                rate_limited: false,
            }
        }
    }

    impl EmbeddingProvider for CountingProvider {
        fn model_id(&self) -> &str {
            "voyage-3"
        }

        fn embed_texts(
            &mut self,
            texts: &[String],
            input_type: InputType,
        ) -> std::result::Result<Vec<Vec<f32>>, ProviderError> {
            self.calls += 1;
            self.modes.push(input_type);
            if self.rate_limited {
                return Err(ProviderError::RateLimited("429".into()));
            }
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }
    }

    #[test]
    fn test_uses_query_mode() {
        let mut provider = CountingProvider::new();
        let vector = embed_query(&mut provider, "  prompts  ", "voyage-3").unwrap();
        assert_eq!(vector, vec![7.0, 1.0]);
        assert_eq!(provider.modes, vec![InputType::Query]);
    }

    #[test]
    fn test_rate_limit_is_not_retried() {
        let mut provider = CountingProvider::new();
        provider.rate_limited = true;
        let err = embed_query(&mut provider, "anything", "voyage-3").unwrap_err();
        assert!(matches!(err, Error::Provider(ProviderError::RateLimited(_))));
        assert_eq!(provider.calls, 1);
    }

    #[test]
    fn test_rejects_empty_query_and_model_mismatch() {
        let mut provider = CountingProvider::new();
        assert!(matches!(
            embed_query(&mut provider, "   ", "voyage-3"),
            Err(Error::Data(_))
        ));
        assert!(matches!(
            embed_query(&mut provider, "hello", "voyage-3-lite"),
            Err(Error::Data(_))
        ));
        assert_eq!(provider.calls, 0);
    }

    #[test]
    fn test_hashing_store_refuses_voyage_queries() {
        use crate::config::{EmbeddingConfig, EmbeddingProviderType};
        use crate::embedding::create_provider;

        let config = EmbeddingConfig {
            provider: Some(EmbeddingProviderType::Hashing),
            ..Default::default()
        };
        let store_model = create_provider(&config).unwrap().model_id().to_string();
        assert_eq!(store_model, "hashing-256");

        let mut voyage = CountingProvider::new();
        let err = embed_query(&mut voyage, "hello", &store_model).unwrap_err();
        assert!(matches!(err, Error::Data(_)));
        assert_eq!(voyage.calls, 0);
    }

    #[test]
    fn test_cache_avoids_second_call() {
        let dir = tempdir().unwrap();
        let mut provider = CountingProvider::new();
        let cache = QueryCache::new(dir.path(), QueryCache::DEFAULT_TTL_MS);

        let mut embedder = QueryEmbedder::new(&mut provider).with_cache(Some(cache));
        let first = embedder.embed_query("hello", "voyage-3").unwrap();
        let second = embedder.embed_query("hello", "voyage-3").unwrap();
        drop(embedder);

        assert_eq!(first, second);
        assert_eq!(provider.calls, 1);
    }
}
