//! `ChunkManager`: loads chunk sets from the store, retains the current
//! published snapshot, and computes deltas against a reference timestamp.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use codegraph_storage::ChunkReader;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use crate::chunk::{ChunkSet, Delta};
use crate::error::{Result, SearchError};

struct ManagerState {
    current: ChunkSet,
    last_reload_time: DateTime<Utc>,
}

/// `last_reload_time` starts at the Unix epoch so the very first `diff`
/// treats every chunk as new regardless of when it was created.
fn zero_instant() -> DateTime<Utc> {
    DateTime::from_timestamp(0, 0).expect("epoch is a valid timestamp")
}

pub struct ChunkManager<R: ChunkReader> {
    store: Arc<R>,
    state: RwLock<ManagerState>,
}

impl<R: ChunkReader> ChunkManager<R> {
    pub fn new(store: Arc<R>) -> Self {
        Self {
            store,
            state: RwLock::new(ManagerState {
                current: ChunkSet::empty(),
                last_reload_time: zero_instant(),
            }),
        }
    }

    /// Reads all chunks from the store. Does not mutate manager state —
    /// the caller (the coordinator) decides whether to publish.
    pub async fn load(&self, cancel: &CancellationToken) -> Result<ChunkSet> {
        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }

        let chunks = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SearchError::Cancelled),
            result = self.store.all_chunks() => result?,
        };

        Ok(ChunkSet::from_chunks(chunks))
    }

    /// The published snapshot. Empty before the first `publish`.
    pub fn current(&self) -> ChunkSet {
        self.state.read().current.clone()
    }

    /// Atomically replaces `current` and `last_reload_time`. Readers holding
    /// the previous snapshot are unaffected — `ChunkSet` is a cheap-to-clone
    /// value backed by `Arc`s.
    pub fn publish(&self, new_set: ChunkSet, reload_time: DateTime<Utc>) {
        let mut state = self.state.write();
        state.current = new_set;
        state.last_reload_time = reload_time;
    }

    /// Captures `(old, T_ref)` under a read lock, releases it, then computes
    /// the delta. `diff` is safe to call repeatedly without a publish
    /// between calls: it is a pure function of `(old, T_ref, new_set)`.
    pub fn diff(&self, new_set: &ChunkSet) -> Delta {
        let (old, t_ref) = {
            let state = self.state.read();
            (state.current.clone(), state.last_reload_time)
        };

        if old.is_empty() {
            return Delta {
                added: new_set.all().to_vec(),
                updated: Vec::new(),
                deleted_ids: Vec::new(),
            };
        }

        let mut added = Vec::new();
        let mut updated = Vec::new();

        for chunk in new_set.all() {
            match old.get_by_id(&chunk.id) {
                None => added.push(chunk.clone()),
                Some(_) if chunk.updated_at > t_ref => updated.push(chunk.clone()),
                Some(_) => {}
            }
        }

        let deleted_ids: Vec<String> = old
            .ids()
            .filter(|id| new_set.get_by_id(id).is_none())
            .map(str::to_string)
            .collect();

        Delta {
            added,
            updated,
            deleted_ids,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    fn chunk(id: &str, updated_at: DateTime<Utc>) -> ContextChunk {
        let mut c = ContextChunk::new(id, "text", vec![0.1], ChunkType::Symbols);
        c.created_at = updated_at;
        c.updated_at = updated_at;
        c
    }

    #[tokio::test]
    async fn test_cold_load_then_diff_is_all_added() {
        let reader = Arc::new(FakeReader {
            chunks: StdMutex::new(vec![chunk("c1", Utc::now())]),
        });
        let manager = ChunkManager::new(reader);
        let token = CancellationToken::new();

        let loaded = manager.load(&token).await.unwrap();
        assert_eq!(loaded.len(), 1);

        let delta = manager.diff(&loaded);
        assert_eq!(delta.added.len(), 1);
        assert!(delta.updated.is_empty());
        assert!(delta.deleted_ids.is_empty());
    }

    #[tokio::test]
    async fn test_publish_then_current_matches() {
        let reader = Arc::new(FakeReader {
            chunks: StdMutex::new(vec![chunk("c1", Utc::now())]),
        });
        let manager = ChunkManager::new(reader);
        let token = CancellationToken::new();

        let loaded = manager.load(&token).await.unwrap();
        let t = Utc::now();
        manager.publish(loaded.clone(), t);

        assert_eq!(manager.current().len(), 1);
    }

    #[tokio::test]
    async fn test_diff_detects_added_updated_deleted() {
        let t1 = Utc::now();
        let reader = Arc::new(FakeReader {
            chunks: StdMutex::new(vec![chunk("c1", t1), chunk("c2", t1)]),
        });
        let manager = ChunkManager::new(reader.clone());
        let token = CancellationToken::new();

        let first = manager.load(&token).await.unwrap();
        manager.publish(first, t1);

        let t2 = t1 + chrono::Duration::seconds(5);
        let c1_v2 = chunk("c1", t2);
        let c3 = chunk("c3", t2);
        *reader.chunks.lock().unwrap() = vec![c1_v2, c3];

        let second = manager.load(&token).await.unwrap();
        let delta = manager.diff(&second);

        assert_eq!(delta.added.iter().map(|c| c.id.clone()).collect::<Vec<_>>(), vec!["c3"]);
        assert_eq!(delta.updated.iter().map(|c| c.id.clone()).collect::<Vec<_>>(), vec!["c1"]);
        assert_eq!(delta.deleted_ids, vec!["c2".to_string()]);
    }

    #[tokio::test]
    async fn test_same_updated_at_is_not_reindexed() {
        let t1 = Utc::now();
        let reader = Arc::new(FakeReader {
            chunks: StdMutex::new(vec![chunk("c1", t1)]),
        });
        let manager = ChunkManager::new(reader.clone());
        let token = CancellationToken::new();

        let first = manager.load(&token).await.unwrap();
        manager.publish(first, t1 + chrono::Duration::seconds(1));

        let second = manager.load(&token).await.unwrap();
        let delta = manager.diff(&second);
        assert!(delta.added.is_empty());
        assert!(delta.updated.is_empty());
    }

    #[tokio::test]
    async fn test_diff_determinism_without_publish_between_calls() {
        let reader = Arc::new(FakeReader {
            chunks: StdMutex::new(vec![chunk("c1", Utc::now())]),
        });
        let manager = ChunkManager::new(reader);
        let token = CancellationToken::new();

        let loaded = manager.load(&token).await.unwrap();
        let d1 = manager.diff(&loaded);
        let d2 = manager.diff(&loaded);
        assert_eq!(d1.added.len(), d2.added.len());
        assert_eq!(
            d1.added.iter().map(|c| &c.id).collect::<Vec<_>>(),
            d2.added.iter().map(|c| &c.id).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_cancelled_load_returns_cancelled_error() {
        let reader = Arc::new(FakeReader {
            chunks: StdMutex::new(vec![]),
        });
        let manager = ChunkManager::new(reader);
        let token = CancellationToken::new();
        token.cancel();

        let result = manager.load(&token).await;
        assert!(matches!(result, Err(SearchError::Cancelled)));
    }
}
