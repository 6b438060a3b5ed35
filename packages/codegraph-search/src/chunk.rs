//! `ChunkSet`: an immutable snapshot of all chunks, indexed by id and by file.

use std::collections::HashMap;
use std::sync::Arc;

use codegraph_storage::ContextChunk;

/// Immutable collection of chunks with O(1) lookups by id and by file.
///
/// Construction is the only way to populate a `ChunkSet`; there is no
/// mutator. Replacement (a fresh `ChunkSet` published by the `ChunkManager`)
/// is the only update mechanism, matching the "replacement, not mutation"
/// invariant chunk consumers rely on.
#[derive(Debug, Clone, Default)]
pub struct ChunkSet {
    chunks: Arc<Vec<ContextChunk>>,
    by_id: Arc<HashMap<String, usize>>,
    by_file: Arc<HashMap<String, Vec<usize>>>,
}

impl ChunkSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a `ChunkSet` from chunks in insertion order. Later duplicate ids
    /// overwrite the `by_id` index entry but both copies remain in `all()` —
    /// the store is expected not to emit duplicate ids; this is defense, not
    /// a contract the caller should rely on.
    pub fn from_chunks(chunks: Vec<ContextChunk>) -> Self {
        let mut by_id = HashMap::with_capacity(chunks.len());
        let mut by_file: HashMap<String, Vec<usize>> = HashMap::new();

        for (idx, chunk) in chunks.iter().enumerate() {
            by_id.insert(chunk.id.clone(), idx);
            if let Some(path) = chunk.file_path() {
                by_file.entry(path.to_string()).or_default().push(idx);
            }
        }

        Self {
            chunks: Arc::new(chunks),
            by_id: Arc::new(by_id),
            by_file: Arc::new(by_file),
        }
    }

    pub fn get_by_id(&self, id: &str) -> Option<&ContextChunk> {
        self.by_id.get(id).map(|&idx| &self.chunks[idx])
    }

    pub fn get_by_file(&self, path: &str) -> Vec<&ContextChunk> {
        self.by_file
            .get(path)
            .map(|indices| indices.iter().map(|&idx| &self.chunks[idx]).collect())
            .unwrap_or_default()
    }

    pub fn all(&self) -> &[ContextChunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.by_id.keys().map(String::as_str)
    }
}

/// `(added, updated, deleted_ids)` derived from two `ChunkSet`s and a
/// reference timestamp. See `ChunkManager::diff`.
#[derive(Debug, Clone, Default)]
pub struct Delta {
    pub added: Vec<ContextChunk>,
    pub updated: Vec<ContextChunk>,
    pub deleted_ids: Vec<String>,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.deleted_ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use codegraph_storage::ChunkType;

    fn chunk(id: &str, file_path: &str) -> ContextChunk {
        let mut c = ContextChunk::new(id, "text", vec![0.1, 0.2], ChunkType::Symbols);
        c.metadata.insert("file_path".to_string(), file_path.to_string());
        c
    }

    #[test]
    fn test_empty_chunk_set_tolerates_all_lookups() {
        let set = ChunkSet::empty();
        assert_eq!(set.len(), 0);
        assert!(set.get_by_id("missing").is_none());
        assert!(set.get_by_file("missing.py").is_empty());
        assert!(set.all().is_empty());
    }

    #[test]
    fn test_by_id_covers_every_chunk() {
        let set = ChunkSet::from_chunks(vec![chunk("c1", "a.py"), chunk("c2", "b.py")]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.get_by_id("c1").unwrap().id, "c1");
        assert_eq!(set.get_by_id("c2").unwrap().id, "c2");
        assert!(set.get_by_id("c3").is_none());
    }

    #[test]
    fn test_by_file_groups_chunks() {
        let set = ChunkSet::from_chunks(vec![chunk("c1", "a.py"), chunk("c2", "a.py"), chunk("c3", "b.py")]);
        let a_chunks = set.get_by_file("a.py");
        assert_eq!(a_chunks.len(), 2);
        for c in &a_chunks {
            assert_eq!(c.metadata.get("file_path").unwrap(), "a.py");
        }
        assert_eq!(set.get_by_file("b.py").len(), 1);
        assert!(set.get_by_file("c.py").is_empty());
    }

    #[test]
    fn test_chunk_without_file_path_excluded_from_by_file() {
        let mut c = chunk("c1", "a.py");
        c.metadata.remove("file_path");
        let set = ChunkSet::from_chunks(vec![c]);
        assert_eq!(set.len(), 1);
        assert!(set.get_by_file("a.py").is_empty());
    }

    #[test]
    fn test_delta_is_empty() {
        assert!(Delta::default().is_empty());
        let mut delta = Delta::default();
        delta.deleted_ids.push("c1".to_string());
        assert!(!delta.is_empty());
    }

    #[test]
    fn test_monotonicity_invariant_holds_for_constructed_chunks() {
        let c = chunk("c1", "a.py");
        assert!(c.updated_at >= c.created_at);
        assert!(c.created_at <= Utc::now());
    }
}
