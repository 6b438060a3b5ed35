//! Domain layer for the chunk store (RFC-101)
//!
//! # Core Principles (RFC-100)
//!
//! 1. **Read-only contract**: the store owns ingestion, chunking and embedding;
//!    this crate only exposes a read path plus raw file content for full-text use.
//! 2. **Chunk identity**: `id` is a stable string, globally unique within a project.
//! 3. **Monotonic timestamps**: `updated_at >= created_at`, and `updated_at` strictly
//!    increases whenever a chunk's content or embedding changes. Consumers diff
//!    against `updated_at` to detect change, so this is load-bearing, not cosmetic.
//!
//! # Domain Models
//!
//! - `ContextChunk`: the unit of indexed content.
//! - `ChunkType`: the closed (with escape hatch) classification of a chunk.
//!
//! # Port Trait
//!
//! - `ChunkReader`: read-only storage abstraction consumed by the core.
//!
//! # Examples
//!
//! ```rust,ignore
//! use codegraph_storage::domain::{ChunkReader, ContextChunk};
//!
//! async fn example(reader: impl ChunkReader) -> Result<()> {
//!     let chunks = reader.all_chunks().await?;
//!     let content = reader.file_content("src/auth.py").await?;
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::Result;

// ═══════════════════════════════════════════════════════════════════════════
// Domain Models
// ═══════════════════════════════════════════════════════════════════════════

/// Closed classification of a chunk's content, with an escape hatch for
/// values the store emits that this version of the core doesn't recognize.
///
/// Unrecognized values still round-trip through serde (as a plain string);
/// they simply never match a `chunk_types` filter branch that names a known
/// variant. Serialized as its `as_str()` form, not as a tagged enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkType {
    Symbols,
    Definitions,
    Data,
    Documentation,
    Other(String),
}

impl ChunkType {
    pub fn as_str(&self) -> &str {
        match self {
            ChunkType::Symbols => "symbols",
            ChunkType::Definitions => "definitions",
            ChunkType::Data => "data",
            ChunkType::Documentation => "documentation",
            ChunkType::Other(s) => s.as_str(),
        }
    }
}

impl From<&str> for ChunkType {
    fn from(s: &str) -> Self {
        match s {
            "symbols" => ChunkType::Symbols,
            "definitions" => ChunkType::Definitions,
            "data" => ChunkType::Data,
            "documentation" => ChunkType::Documentation,
            other => ChunkType::Other(other.to_string()),
        }
    }
}

impl Serialize for ChunkType {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ChunkType {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(ChunkType::from(s.as_str()))
    }
}

/// The unit of indexed content.
///
/// `metadata` only carries string values: that's a deliberate restriction,
/// not an oversight, since only string-valued entries participate in
/// filtering (see `VectorIndex`/`FullTextIndex` filter semantics).
///
/// # Examples
///
/// ```rust
/// use codegraph_storage::domain::{ChunkType, ContextChunk};
///
/// let chunk = ContextChunk::new(
///     "chunk_001",
///     "def login():\n    pass",
///     vec![0.1, 0.2, 0.3],
///     ChunkType::Definitions,
/// );
/// assert_eq!(chunk.id, "chunk_001");
/// assert!(chunk.updated_at >= chunk.created_at);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextChunk {
    /// Stable id, globally unique within a project.
    pub id: String,
    /// The searchable body.
    pub text: String,
    /// Short human label.
    #[serde(default)]
    pub title: Option<String>,
    /// Closed classification (with escape hatch).
    pub chunk_type: ChunkType,
    /// Fixed-length embedding vector; length = configured dimensionality.
    pub embedding: Vec<f32>,
    /// Ordered, derived (not authoritative) tag sequence.
    #[serde(default)]
    pub tags: Vec<String>,
    /// String-to-string metadata (file path, line range, language, etc).
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContextChunk {
    pub fn new(
        id: impl Into<String>,
        text: impl Into<String>,
        embedding: Vec<f32>,
        chunk_type: ChunkType,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            text: text.into(),
            title: None,
            chunk_type,
            embedding,
            tags: Vec::new(),
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// The `file_path` metadata entry, if present.
    pub fn file_path(&self) -> Option<&str> {
        self.metadata.get("file_path").map(String::as_str)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Port Trait: ChunkReader
// ═══════════════════════════════════════════════════════════════════════════

/// Read-only chunk store abstraction (RFC-101).
///
/// The store owns ingestion, chunking, and embedding; this trait is the only
/// thing the core depends on. It is intentionally narrow: two methods.
///
/// # Implementations
///
/// - `SqliteChunkReader` (RFC-102): SQLite-backed reference implementation.
#[async_trait]
pub trait ChunkReader: Send + Sync {
    /// Stream-read every chunk currently in the store.
    async fn all_chunks(&self) -> Result<Vec<ContextChunk>>;

    /// Raw file content for full-text use. `Ok(None)` when the path is
    /// unknown to the store (not an error).
    async fn file_content(&self, path: &str) -> Result<Option<String>>;
}

// ═══════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════
