//! Query facades: the public surface named in spec §6 — `vector_query`,
//! `text_query`, `pattern_query`, `reload`, `metrics` — composed from the
//! coordinator (reload/vector/text) and the separately-adapted
//! `PatternMatcher` (structural search has no reload lifecycle of its own).

use std::sync::Arc;

use codegraph_storage::ChunkReader;
use tokio_util::sync::CancellationToken;

use crate::coordinator::SearcherCoordinator;
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::fulltext_index::{ExactSearchOptions, ExactSearchResult};
use crate::metrics::MetricsSnapshot;
use crate::pattern::{PatternMatcher, PatternRequest, PatternResponse};
use crate::vector_index::{SearchOptions, SearchResult};

pub struct SearchFacade<R: ChunkReader, E: EmbeddingProvider> {
    coordinator: Arc<SearcherCoordinator<R, E>>,
    pattern_matcher: Option<Arc<dyn PatternMatcher>>,
}

impl<R: ChunkReader, E: EmbeddingProvider> SearchFacade<R, E> {
    pub fn new(coordinator: Arc<SearcherCoordinator<R, E>>, pattern_matcher: Option<Arc<dyn PatternMatcher>>) -> Self {
        Self {
            coordinator,
            pattern_matcher,
        }
    }

    pub async fn vector_query(&self, query_text: &str, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        self.coordinator.vector_query(query_text, options).await
    }

    pub fn text_query(&self, query_string: &str, options: &ExactSearchOptions) -> Result<Vec<ExactSearchResult>> {
        self.coordinator.text_query(query_string, options)
    }

    pub async fn pattern_query(&self, request: &PatternRequest) -> Result<PatternResponse> {
        match &self.pattern_matcher {
            Some(matcher) => matcher.search(request).await,
            None => Err(crate::error::SearchError::validation(
                "structural pattern search is not configured for this deployment",
            )),
        }
    }

    pub async fn reload(&self, cancel: &CancellationToken) -> Result<()> {
        self.coordinator.reload(cancel).await
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.coordinator.metrics()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk_manager::ChunkManager;
    use crate::embedding::DeterministicEmbeddingProvider;
    use crate::fulltext_index::FullTextIndex;
    use crate::vector_index::VectorIndex;
    use async_trait::async_trait;
    use codegraph_storage::{ContextChunk, Result as StoreResult};

    struct EmptyReader;

    #[async_trait]
    impl ChunkReader for EmptyReader {
        async fn all_chunks(&self) -> StoreResult<Vec<ContextChunk>> {
            Ok(vec![])
        }
        async fn file_content(&self, _path: &str) -> StoreResult<Option<String>> {
            Ok(None)
        }
    }

    fn facade() -> SearchFacade<EmptyReader, DeterministicEmbeddingProvider> {
        let manager = Arc::new(ChunkManager::new(Arc::new(EmptyReader)));
        let vector_index = Arc::new(VectorIndex::default());
        let fulltext_index = Arc::new(FullTextIndex::new().unwrap());
        let embedder = Arc::new(DeterministicEmbeddingProvider::new(8));
        let coordinator = Arc::new(SearcherCoordinator::new(manager, vector_index, fulltext_index, embedder));
        SearchFacade::new(coordinator, None)
    }

    #[tokio::test]
    async fn test_pattern_query_without_matcher_is_validation_error() {
        let facade = facade();
        let request = PatternRequest {
            pattern: "$FUNC(...)".to_string(),
            language: "go".to_string(),
            file_globs: vec![],
            strictness: crate::pattern::Strictness::default(),
            context_lines: 2,
            limit: 15,
            project_root: std::env::temp_dir(),
        };
        let result = facade.pattern_query(&request).await;
        assert!(matches!(result, Err(crate::error::SearchError::Validation(_))));
    }

    #[tokio::test]
    async fn test_reload_and_metrics_roundtrip() {
        let facade = facade();
        let token = CancellationToken::new();
        facade.reload(&token).await.unwrap();
        assert_eq!(facade.metrics().total_reloads, 1);
    }

    struct StubMatcher;

    #[async_trait]
    impl PatternMatcher for StubMatcher {
        async fn search(&self, _request: &PatternRequest) -> Result<PatternResponse> {
            Ok(PatternResponse::default())
        }
    }

    #[tokio::test]
    async fn test_pattern_query_delegates_to_matcher() {
        let manager = Arc::new(ChunkManager::new(Arc::new(EmptyReader)));
        let vector_index = Arc::new(VectorIndex::default());
        let fulltext_index = Arc::new(FullTextIndex::new().unwrap());
        let embedder = Arc::new(DeterministicEmbeddingProvider::new(8));
        let coordinator = Arc::new(SearcherCoordinator::new(manager, vector_index, fulltext_index, embedder));
        let facade = SearchFacade::new(coordinator, Some(Arc::new(StubMatcher) as Arc<dyn PatternMatcher>));

        let request = PatternRequest {
            pattern: "$FUNC(...)".to_string(),
            language: "go".to_string(),
            file_globs: vec![],
            strictness: crate::pattern::Strictness::default(),
            context_lines: 2,
            limit: 15,
            project_root: std::env::temp_dir(),
        };
        let response = facade.pattern_query(&request).await.unwrap();
        assert!(response.matches.is_empty());
    }
}
