// SPDX-License-Identifier: MIT OR Apache-2.0

//! Search service: filter, embed, rank, and shape the response.
//!
//! The service holds the catalog and the vector store together in one
//! [`SearchContext`]. Each request works on a snapshot of that context, and a
//! reload replaces the whole context at once, so a request never sees a
//! catalog from one load paired with a store from another.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

use crate::embedding::{QueryEmbedder, VectorStore};
use crate::errors::{Error, Result};
use crate::filters::MetadataFilter;
use crate::paths::DataPaths;
use crate::records::TranscriptCatalog;
use crate::search::search;
use crate::snippet::make_snippet;

/// Results per page when the request does not say.
pub const DEFAULT_LIMIT: usize = 20;

/// Upper bound on results per page.
pub const MAX_LIMIT: usize = 100;

/// Error code of an unavailable response.
pub const SEARCH_UNAVAILABLE: &str = "search_unavailable";

/// Catalog and vector store loaded together.
#[derive(Debug, Clone, Default)]
pub struct SearchContext {
    catalog: Arc<TranscriptCatalog>,
    store: Option<Arc<VectorStore>>,
    store_error: Option<String>,
}

impl SearchContext {
    pub fn new(catalog: TranscriptCatalog, store: Option<VectorStore>) -> Self {
        Self {
            catalog: Arc::new(catalog),
            store: store.map(Arc::new),
            store_error: None,
        }
    }

    /// A context whose vector store could not be loaded.
    pub fn without_store(catalog: TranscriptCatalog, detail: impl Into<String>) -> Self {
        Self {
            store_error: Some(detail.into()),
            ..Self::new(catalog, None)
        }
    }

    /// Loads the transcripts and, when a snapshot exists, the vector store.
    ///
    /// A snapshot that fails to load leaves the context without a store; the
    /// failure is kept and reported by searches.
    pub fn load(paths: &DataPaths) -> Result<Self> {
        let catalog = TranscriptCatalog::load(&paths.transcripts)?;
        if !paths.embeddings.exists() {
            tracing::warn!(path = %paths.embeddings.display(), "no vector store snapshot found");
            return Ok(Self::new(catalog, None));
        }
        match VectorStore::load(&paths.embeddings) {
            Ok(store) => Ok(Self::new(catalog, Some(store))),
            Err(err) => {
                tracing::warn!(path = %paths.embeddings.display(), error = %err, "failed to load vector store");
                Ok(Self::without_store(
                    catalog,
                    format!(
                        "failed to load vector store {}: {}",
                        paths.embeddings.display(),
                        err
                    ),
                ))
            }
        }
    }

    pub fn catalog(&self) -> &TranscriptCatalog {
        &self.catalog
    }

    pub fn store(&self) -> Option<&VectorStore> {
        self.store.as_deref()
    }

    /// Why the store is missing, when loading it failed.
    pub fn store_error(&self) -> Option<&str> {
        self.store_error.as_deref()
    }
}

/// A search request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub split: Option<String>,
    #[serde(default)]
    pub sentiment: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: DEFAULT_LIMIT,
            offset: 0,
            split: None,
            sentiment: None,
            industry: None,
        }
    }

    pub fn with_page(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = limit;
        self
    }

    pub fn with_filter(mut self, filter: MetadataFilter) -> Self {
        self.split = filter.split;
        self.sentiment = filter.sentiment;
        self.industry = filter.industry;
        self
    }

    pub fn filter(&self) -> MetadataFilter {
        MetadataFilter::new(
            self.split.clone(),
            self.sentiment.clone(),
            self.industry.clone(),
        )
    }
}

/// One result row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: String,
    /// Cosine similarity rounded to 4 decimals
    pub score: f64,
    pub split: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<String>,
    pub snippet: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResults {
    pub query: String,
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchUnavailable {
    pub error: String,
    pub detail: String,
}

/// Either a page of results or an explanation of why search is unavailable.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SearchResponse {
    Results(SearchResults),
    Unavailable(SearchUnavailable),
}

impl SearchResponse {
    fn unavailable(detail: impl Into<String>) -> Self {
        SearchResponse::Unavailable(SearchUnavailable {
            error: SEARCH_UNAVAILABLE.to_string(),
            detail: detail.into(),
        })
    }

    pub fn is_available(&self) -> bool {
        matches!(self, SearchResponse::Results(_))
    }
}

/// Serves search requests against a swappable [`SearchContext`].
#[derive(Debug)]
pub struct SearchService {
    context: RwLock<Arc<SearchContext>>,
    max_limit: usize,
}

impl SearchService {
    pub fn new(context: SearchContext) -> Self {
        Self {
            context: RwLock::new(Arc::new(context)),
            max_limit: MAX_LIMIT,
        }
    }

    pub fn with_max_limit(mut self, max_limit: usize) -> Self {
        self.max_limit = max_limit.max(1);
        self
    }

    /// Current context; stays valid even if another thread swaps it.
    pub fn snapshot(&self) -> Arc<SearchContext> {
        let guard = self.context.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Replaces the context and returns the previous one.
    pub fn swap(&self, context: SearchContext) -> Arc<SearchContext> {
        let mut guard = self.context.write().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *guard, Arc::new(context))
    }

    /// Runs one search.
    ///
    /// A missing or unloadable store, or a provider failure while embedding the query, yields
    /// [`SearchResponse::Unavailable`]. A query vector whose length differs
    /// from the store dimension is an error.
    pub fn search(
        &self,
        request: &SearchRequest,
        embedder: &mut QueryEmbedder<'_>,
    ) -> Result<SearchResponse> {
        let context = self.snapshot();
        let Some(store) = context.store() else {
            let detail = context
                .store_error()
                .unwrap_or("no vector store loaded; run `tsearch embed` first");
            return Ok(SearchResponse::unavailable(detail));
        };

        let vector = match embedder.embed_query(&request.query, store.model()) {
            Ok(vector) => vector,
            Err(Error::Provider(err)) => {
                tracing::warn!(error = %err, "query embedding failed");
                return Ok(SearchResponse::unavailable(err.to_string()));
            }
            Err(err) => return Err(err),
        };

        let filter = request.filter();
        let candidates = filter.filter(context.catalog().iter());
        tracing::debug!(candidates = candidates.len(), ?filter, "applied metadata filter");

        let limit = request.limit.clamp(1, self.max_limit);
        let page = search(&vector, &candidates, store, request.offset, limit)?;

        let results = page
            .hits
            .into_iter()
            .map(|hit| -> Result<SearchHit> {
                let record = context.catalog().get(&hit.id)?;
                Ok(SearchHit {
                    score: round_score(hit.score),
                    split: record.split.clone(),
                    job_title: record.job_title().map(str::to_string),
                    industry: record.industry().map(str::to_string),
                    sentiment: record.sentiment().map(str::to_string),
                    snippet: make_snippet(&record.messages),
                    id: hit.id,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(SearchResponse::Results(SearchResults {
            query: request.query.clone(),
            total: page.total,
            offset: request.offset,
            limit,
            results,
        }))
    }
}

fn round_score(score: f32) -> f64 {
    (f64::from(score) * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{EmbeddingProvider, InputType};
    use crate::errors::ProviderError;
    use crate::records::{Message, Role, TranscriptRecord};
    use std::collections::BTreeMap;

    /// Returns the same vector for every query.
    struct FixedProvider {
        vector: Vec<f32>,
        fail: bool,
    }

    impl EmbeddingProvider for FixedProvider {
        fn model_id(&self) -> &str {
            "m"
        }

        fn embed_texts(
            &mut self,
            texts: &[String],
            _input_type: InputType,
        ) -> std::result::Result<Vec<Vec<f32>>, ProviderError> {
            if self.fail {
                return Err(ProviderError::RateLimited("429".into()));
            }
            Ok(texts.iter().map(|_| self.vector.clone()).collect())
        }
    }

    fn record(id: &str, split: &str, sentiment: &str) -> TranscriptRecord {
        TranscriptRecord {
            transcript_id: id.into(),
            split: split.into(),
            sentiment: Some(sentiment.into()),
            job_title: Some("UNKNOWN".into()),
            messages: vec![Message {
                role: Role::User,
                content: format!("transcript {}", id),
            }],
            ..Default::default()
        }
    }

    fn context() -> SearchContext {
        let catalog = TranscriptCatalog::from_records(vec![
            record("a", "workforce", "positive"),
            record("b", "creatives", "negative"),
            record("c", "workforce", "positive"),
        ])
        .unwrap();
        let embeddings: BTreeMap<String, Vec<f32>> = [
            ("a", vec![1.0, 0.0]),
            ("b", vec![0.0, 1.0]),
            ("c", vec![1.0, 1.0]),
        ]
        .into_iter()
        .map(|(id, v)| (id.to_string(), v))
        .collect();
        let store = VectorStore::new("m", 2, embeddings).unwrap();
        SearchContext::new(catalog, Some(store))
    }

    fn run(service: &SearchService, request: &SearchRequest, vector: Vec<f32>) -> Result<SearchResponse> {
        let mut provider = FixedProvider {
            vector,
            fail: false,
        };
        let mut embedder = QueryEmbedder::new(&mut provider);
        service.search(request, &mut embedder)
    }

    fn results(response: SearchResponse) -> SearchResults {
        match response {
            SearchResponse::Results(results) => results,
            SearchResponse::Unavailable(u) => panic!("unexpected unavailable: {}", u.detail),
        }
    }

    #[test]
    fn test_ranked_page_with_metadata() {
        let service = SearchService::new(context());
        let request = SearchRequest::new("prompts").with_page(0, 2);
        let page = results(run(&service, &request, vec![1.0, 0.0]).unwrap());

        assert_eq!(page.total, 3);
        assert_eq!(page.limit, 2);
        let ids: Vec<&str> = page.results.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(page.results[0].score, 1.0);
        assert_eq!(page.results[1].score, 0.7071);
        assert_eq!(page.results[0].sentiment.as_deref(), Some("positive"));
        assert_eq!(page.results[0].job_title, None);
        assert_eq!(page.results[0].snippet, "transcript a");
    }

    #[test]
    fn test_filters_apply_before_ranking() {
        let service = SearchService::new(context());
        let request = SearchRequest::new("q").with_filter(MetadataFilter::new(
            None,
            Some("NEGATIVE".into()),
            None,
        ));
        let page = results(run(&service, &request, vec![1.0, 0.0]).unwrap());
        assert_eq!(page.total, 1);
        assert_eq!(page.results[0].id, "b");
        assert_eq!(page.results[0].score, 0.0);
    }

    #[test]
    fn test_limit_is_clamped() {
        let service = SearchService::new(context());
        let page = results(run(&service, &SearchRequest::new("q").with_page(0, 0), vec![1.0, 0.0]).unwrap());
        assert_eq!(page.limit, 1);
        assert_eq!(page.results.len(), 1);

        let page = results(run(&service, &SearchRequest::new("q").with_page(0, 500), vec![1.0, 0.0]).unwrap());
        assert_eq!(page.limit, MAX_LIMIT);
        assert_eq!(page.results.len(), 3);
    }

    #[test]
    fn test_unavailable_without_store() {
        let catalog = context().catalog().clone();
        let service = SearchService::new(SearchContext::new(catalog, None));
        let response = run(&service, &SearchRequest::new("q"), vec![1.0, 0.0]).unwrap();
        assert!(!response.is_available());

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["error"], SEARCH_UNAVAILABLE);
    }

    #[test]
    fn test_unloadable_store_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(dir.path());
        std::fs::write(
            &paths.transcripts,
            r#"{"transcripts": [{"transcript_id": "a", "split": "workforce"}]}"#,
        )
        .unwrap();
        std::fs::write(
            &paths.embeddings,
            r#"{"model":"m","dimension":3,"count":1,"embeddings":{"a":[1.0,0.0]}}"#,
        )
        .unwrap();

        let context = SearchContext::load(&paths).unwrap();
        assert!(context.store().is_none());
        assert!(context.store_error().is_some());
        assert_eq!(context.catalog().len(), 1);

        let service = SearchService::new(context);
        let response = run(&service, &SearchRequest::new("q"), vec![1.0, 0.0]).unwrap();
        match response {
            SearchResponse::Unavailable(u) => {
                assert_eq!(u.error, SEARCH_UNAVAILABLE);
                assert!(u.detail.contains("failed to load vector store"));
            }
            SearchResponse::Results(_) => panic!("expected unavailable"),
        }
    }

    #[test]
    fn test_unavailable_when_query_cannot_be_embedded() {
        let service = SearchService::new(context());
        let mut provider = FixedProvider {
            vector: vec![1.0, 0.0],
            fail: true,
        };
        let mut embedder = QueryEmbedder::new(&mut provider);
        let response = service.search(&SearchRequest::new("q"), &mut embedder).unwrap();
        assert!(!response.is_available());
    }

    #[test]
    fn test_dimension_mismatch_is_an_error() {
        let service = SearchService::new(context());
        let err = run(&service, &SearchRequest::new("q"), vec![1.0, 0.0, 0.0]).unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_swap_replaces_catalog_and_store_together() {
        let service = SearchService::new(context());
        let before = service.snapshot();

        let catalog = TranscriptCatalog::from_records(vec![record("z", "workforce", "mixed")]).unwrap();
        let mut embeddings = BTreeMap::new();
        embeddings.insert("z".to_string(), vec![0.0, 0.0, 1.0]);
        let store = VectorStore::new("m", 3, embeddings).unwrap();
        let previous = service.swap(SearchContext::new(catalog, Some(store)));

        assert!(Arc::ptr_eq(&before, &previous));
        assert_eq!(before.store().map(VectorStore::dimension), Some(2));

        let page = results(run(&service, &SearchRequest::new("q"), vec![0.0, 0.0, 1.0]).unwrap());
        assert_eq!(page.total, 1);
        assert_eq!(page.results[0].id, "z");
    }

    #[test]
    fn test_response_shape() {
        let service = SearchService::new(context());
        let response = run(&service, &SearchRequest::new("q").with_page(1, 1), vec![1.0, 0.0]).unwrap();
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["query"], "q");
        assert_eq!(json["total"], 3);
        assert_eq!(json["offset"], 1);
        assert_eq!(json["limit"], 1);
        assert_eq!(json["results"][0]["id"], "c");
        assert_eq!(json["results"][0]["split"], "workforce");
        assert!(json["results"][0].get("job_title").is_none());
    }

    #[test]
    fn test_request_defaults() {
        let request: SearchRequest = serde_json::from_str(r#"{"query": "writing"}"#).unwrap();
        assert_eq!(request, SearchRequest::new("writing"));
    }
}
