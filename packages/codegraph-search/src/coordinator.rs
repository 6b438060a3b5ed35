//! `SearcherCoordinator`: the crux. Serializes reloads, fans deltas out to
//! both indexes in parallel (`tokio::spawn` + `join_all`, the same pattern
//! the teacher's `PipelineOrchestrator::run_dag` used for parallel stage
//! phases), publishes atomically, and records metrics — maintaining eventual
//! consistency when one backend's `apply_delta` fails and the other
//! succeeds.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use codegraph_storage::ChunkReader;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::chunk_manager::ChunkManager;
use crate::embedding::{EmbeddingMode, EmbeddingProvider};
use crate::error::{Result, SearchError};
use crate::fulltext_index::{ExactSearchOptions, ExactSearchResult, FullTextIndex};
use crate::metrics::{MetricsSnapshot, ReloadMetrics};
use crate::vector_index::{SearchOptions, SearchResult, VectorIndex};

pub struct SearcherCoordinator<R: ChunkReader, E: EmbeddingProvider> {
    chunk_manager: Arc<ChunkManager<R>>,
    vector_index: Arc<VectorIndex>,
    fulltext_index: Arc<FullTextIndex>,
    embedding_provider: Arc<E>,
    metrics: Arc<ReloadMetrics>,
    /// Serializes reload *execution* only; never taken by a query path.
    reload_lock: AsyncMutex<()>,
}

impl<R: ChunkReader, E: EmbeddingProvider> SearcherCoordinator<R, E> {
    pub fn new(
        chunk_manager: Arc<ChunkManager<R>>,
        vector_index: Arc<VectorIndex>,
        fulltext_index: Arc<FullTextIndex>,
        embedding_provider: Arc<E>,
    ) -> Self {
        Self {
            chunk_manager,
            vector_index,
            fulltext_index,
            embedding_provider,
            metrics: Arc::new(ReloadMetrics::new()),
            reload_lock: AsyncMutex::new(()),
        }
    }

    /// Runs one reload cycle: load -> diff -> parallel apply -> publish ->
    /// record. Only one reload runs at a time; a second caller waits here,
    /// never inside a query path.
    pub async fn reload(&self, cancel: &CancellationToken) -> Result<()> {
        let _guard = self.reload_lock.lock().await;
        let t0 = Instant::now();

        let new_set = match self.chunk_manager.load(cancel).await {
            Ok(set) => set,
            Err(err) => {
                self.metrics.record(t0.elapsed(), Some(err.to_string()), self.current_chunk_count());
                return Err(err);
            }
        };

        let delta = self.chunk_manager.diff(&new_set);

        let vector_index = self.vector_index.clone();
        let fulltext_index = self.fulltext_index.clone();
        let vector_delta = delta.clone();
        let fulltext_delta = delta.clone();

        let vector_task = tokio::spawn(async move { vector_index.apply_delta(&vector_delta).await });
        let fulltext_task = tokio::spawn(async move { fulltext_index.apply_delta(&fulltext_delta).await });

        let (vector_result, fulltext_result) = tokio::join!(vector_task, fulltext_task);

        let vector_result = vector_result.unwrap_or_else(|e| Err(SearchError::backend(format!("vector apply_delta task panicked: {e}"))));
        let fulltext_result = fulltext_result.unwrap_or_else(|e| Err(SearchError::backend(format!("fulltext apply_delta task panicked: {e}"))));

        if let Err(err) = vector_result {
            warn!("reload: vector index apply_delta failed: {err}");
            self.metrics.record(t0.elapsed(), Some(err.to_string()), self.current_chunk_count());
            return Err(err);
        }
        if let Err(err) = fulltext_result {
            warn!("reload: fulltext index apply_delta failed: {err}");
            self.metrics.record(t0.elapsed(), Some(err.to_string()), self.current_chunk_count());
            return Err(err);
        }

        let new_len = new_set.len();
        self.chunk_manager.publish(new_set, Utc::now());
        self.metrics.record(t0.elapsed(), None, new_len);
        info!("reload complete: {} chunks published", new_len);

        Ok(())
    }

    fn current_chunk_count(&self) -> usize {
        self.chunk_manager.current().len()
    }

    /// Thin wrapper: embeds the query text, then delegates to the vector
    /// backend. Does not take the reload lock.
    pub async fn vector_query(&self, query_text: &str, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        if query_text.trim().is_empty() {
            return Err(SearchError::validation("query text must not be empty"));
        }
        let embeddings = self
            .embedding_provider
            .embed(&[query_text.to_string()], EmbeddingMode::Query)
            .await?;
        let embedding = embeddings
            .into_iter()
            .next()
            .ok_or_else(|| SearchError::provider("embedding provider returned no vectors"))?;
        self.vector_index.query(&embedding, options)
    }

    /// Thin wrapper over the full-text backend. Does not take the reload lock.
    pub fn text_query(&self, query_string: &str, options: &ExactSearchOptions) -> Result<Vec<ExactSearchResult>> {
        self.fulltext_index.query(query_string, options)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::Delta;
    use crate::embedding::DeterministicEmbeddingProvider;
    use async_trait::async_trait;
    use codegraph_storage::{ChunkType, ContextChunk, Result as StoreResult};
    use std::sync::Mutex as StdMutex;

    struct FakeReader {
        chunks: StdMutex<Vec<ContextChunk>>,
    }

    #[async_trait]
    impl ChunkReader for FakeReader {
        async fn all_chunks(&self) -> StoreResult<Vec<ContextChunk>> {
            Ok(self.chunks.lock().unwrap().clone())
        }
        async fn file_content(&self, _path: &str) -> StoreResult<Option<String>> {
            Ok(None)
        }
    }

    fn make_coordinator(
        initial: Vec<ContextChunk>,
    ) -> (SearcherCoordinator<FakeReader, DeterministicEmbeddingProvider>, Arc<FakeReader>) {
        let reader = Arc::new(FakeReader { chunks: StdMutex::new(initial) });
        let manager = Arc::new(ChunkManager::new(reader.clone()));
        let vector_index = Arc::new(VectorIndex::default());
        let fulltext_index = Arc::new(FullTextIndex::new().unwrap());
        let embedder = Arc::new(DeterministicEmbeddingProvider::new(8));
        (
            SearcherCoordinator::new(manager, vector_index, fulltext_index, embedder),
            reader,
        )
    }

    fn chunk_with_file(id: &str, file_path: &str, text: &str) -> ContextChunk {
        let mut c = ContextChunk::new(id, text, vec![0.1; 8], ChunkType::Symbols);
        c.metadata.insert("file_path".to_string(), file_path.to_string());
        c
    }

    #[tokio::test]
    async fn test_cold_load_reload_then_metrics() {
        let (coordinator, _reader) = make_coordinator(vec![]);
        let token = CancellationToken::new();
        coordinator.reload(&token).await.unwrap();

        let snap = coordinator.metrics();
        assert_eq!(snap.total_reloads, 1);
        assert_eq!(snap.current_chunk_count, 0);

        let results = coordinator
            .vector_query("anything", &SearchOptions::default())
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_reload_then_text_query_with_highlight() {
        let (coordinator, _reader) = make_coordinator(vec![chunk_with_file(
            "c1",
            "auth.go",
            "an error occurred during login",
        )]);
        let token = CancellationToken::new();
        coordinator.reload(&token).await.unwrap();

        let results = coordinator
            .text_query("\"error occurred\"", &ExactSearchOptions::default())
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].file_path, "auth.go");
        assert!(results[0].highlights[0].contains("<mark>"));
    }

    #[tokio::test]
    async fn test_incremental_delta_updates_metrics_and_removes_deleted() {
        let (coordinator, reader) = make_coordinator(vec![
            chunk_with_file("c1", "a.go", "alpha"),
            chunk_with_file("c2", "b.go", "beta"),
        ]);
        let token = CancellationToken::new();
        coordinator.reload(&token).await.unwrap();
        assert_eq!(coordinator.metrics().current_chunk_count, 2);

        let mut c1_v2 = chunk_with_file("c1", "a.go", "alpha updated");
        c1_v2.updated_at = Utc::now() + chrono::Duration::seconds(5);
        let c3 = chunk_with_file("c3", "c.go", "gamma");
        *reader.chunks.lock().unwrap() = vec![c1_v2, c3];

        coordinator.reload(&token).await.unwrap();
        let snap = coordinator.metrics();
        assert_eq!(snap.total_reloads, 2);
        assert_eq!(snap.current_chunk_count, 2);

        let results = coordinator.text_query("beta", &ExactSearchOptions::default()).unwrap();
        assert!(results.is_empty(), "c2's file must no longer be indexed");
    }

    #[tokio::test]
    async fn test_second_reload_begins_idle_after_failure() {
        // A cancelled reload fails, but does not poison subsequent reloads.
        let (coordinator, _reader) = make_coordinator(vec![chunk_with_file("c1", "a.go", "alpha")]);
        let cancelled = CancellationToken::new();
        cancelled.cancel();
        let err = coordinator.reload(&cancelled).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(coordinator.metrics().failed_reloads, 1);

        let fresh = CancellationToken::new();
        coordinator.reload(&fresh).await.unwrap();
        let snap = coordinator.metrics();
        assert_eq!(snap.total_reloads, 2);
        assert_eq!(snap.successful_reloads, 1);
        assert_eq!(snap.failed_reloads, 1);
    }

    #[tokio::test]
    async fn test_empty_query_text_is_validation_error() {
        let (coordinator, _reader) = make_coordinator(vec![]);
        let result = coordinator.vector_query("   ", &SearchOptions::default()).await;
        assert!(matches!(result, Err(SearchError::Validation(_))));
    }
}
