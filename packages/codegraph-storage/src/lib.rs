//! ChunkReader - RFC-100: read-only chunk storage contract
//!
//! ## Core Principles
//!
//! 1. **Read-only contract**: the store owns ingestion, chunking and embedding;
//!    this crate exposes a read path plus raw file content.
//! 2. **Chunk identity**: `id` is stable and globally unique within a project.
//! 3. **Monotonic timestamps**: `updated_at` strictly increases whenever a
//!    chunk's content or embedding changes; consumers diff against it.
//!
//! ## Status
//!
//! - RFC-100: core principles defined, storage separated from the search core
//! - RFC-101: API design (`ChunkReader`, `ContextChunk`)
//! - RFC-102: SQLite adapter implementation
//! - RFC-103: alternative adapters (future)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use codegraph_storage::{ChunkReader, SqliteChunkReader};
//!
//! let reader = SqliteChunkReader::open("project.db")?;
//! let chunks = reader.all_chunks().await?;
//! ```

pub mod domain;
pub mod error;

#[cfg(feature = "sqlite")]
pub mod infrastructure;

pub use error::{Result, StorageError};

pub use domain::{ChunkReader, ChunkType, ContextChunk};

#[cfg(feature = "sqlite")]
pub use infrastructure::SqliteChunkReader;
