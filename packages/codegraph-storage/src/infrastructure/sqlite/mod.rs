//! SQLite adapter for the chunk store (RFC-102)
//!
//! Schema:
//! - `chunks(id, text, title, chunk_type, embedding, tags, metadata, created_at, updated_at)`
//!   with `embedding` stored as a little-endian f32 blob and `tags`/`metadata`
//!   as JSON text.
//! - `files(path, content)` backing `file_content` for full-text queries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

use crate::domain::{ChunkReader, ChunkType, ContextChunk};
use crate::error::StorageError;
use crate::Result;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS chunks (
    id TEXT PRIMARY KEY,
    text TEXT NOT NULL,
    title TEXT,
    chunk_type TEXT NOT NULL,
    embedding BLOB NOT NULL,
    tags TEXT NOT NULL,
    metadata TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS files (
    path TEXT PRIMARY KEY,
    content TEXT NOT NULL
);
";

fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes(chunk.try_into().expect("chunks_exact(4) yields 4 bytes")))
        .collect()
}

fn row_to_chunk(row: &rusqlite::Row) -> rusqlite::Result<ContextChunk> {
    let chunk_type_str: String = row.get("chunk_type")?;
    let tags_json: String = row.get("tags")?;
    let metadata_json: String = row.get("metadata")?;
    let embedding_blob: Vec<u8> = row.get("embedding")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(ContextChunk {
        id: row.get("id")?,
        text: row.get("text")?,
        title: row.get("title")?,
        chunk_type: ChunkType::from(chunk_type_str.as_str()),
        embedding: blob_to_embedding(&embedding_blob),
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        metadata: serde_json::from_str(&metadata_json).unwrap_or_default(),
        created_at: created_at
            .parse::<DateTime<Utc>>()
            .unwrap_or_else(|_| Utc::now()),
        updated_at: updated_at
            .parse::<DateTime<Utc>>()
            .unwrap_or_else(|_| Utc::now()),
    })
}

/// SQLite-backed reference implementation of `ChunkReader`.
///
/// `rusqlite::Connection` is `!Send` across await points in the usual sense
/// (it's fine to move, not to share without synchronization), so access is
/// serialized behind a tokio mutex rather than farmed out with
/// `spawn_blocking` per call — reads here are expected to be infrequent
/// (once per reload) and large (the whole chunk set), so a single
/// held lock for the duration of the scan is the simpler correct choice.
pub struct SqliteChunkReader {
    conn: Arc<AsyncMutex<Connection>>,
}

impl SqliteChunkReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(AsyncMutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(AsyncMutex::new(conn)),
        })
    }

    /// Insert or replace a chunk. Exposed for tests and ingestion tooling;
    /// the core only ever calls the read side of this trait.
    pub async fn upsert_chunk(&self, chunk: &ContextChunk) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO chunks (id, text, title, chunk_type, embedding, tags, metadata, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(id) DO UPDATE SET
                text = excluded.text,
                title = excluded.title,
                chunk_type = excluded.chunk_type,
                embedding = excluded.embedding,
                tags = excluded.tags,
                metadata = excluded.metadata,
                updated_at = excluded.updated_at",
            params![
                chunk.id,
                chunk.text,
                chunk.title,
                chunk.chunk_type.as_str(),
                embedding_to_blob(&chunk.embedding),
                serde_json::to_string(&chunk.tags)?,
                serde_json::to_string(&chunk.metadata)?,
                chunk.created_at.to_rfc3339(),
                chunk.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub async fn upsert_file(&self, path: &str, content: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO files (path, content) VALUES (?1, ?2)
             ON CONFLICT(path) DO UPDATE SET content = excluded.content",
            params![path, content],
        )?;
        Ok(())
    }

    pub async fn delete_chunk(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM chunks WHERE id = ?1", params![id])?;
        Ok(())
    }
}

#[async_trait]
impl ChunkReader for SqliteChunkReader {
    async fn all_chunks(&self) -> Result<Vec<ContextChunk>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, text, title, chunk_type, embedding, tags, metadata, created_at, updated_at
             FROM chunks ORDER BY rowid",
        )?;
        let rows = stmt.query_map([], row_to_chunk)?;
        let mut chunks = Vec::new();
        for row in rows {
            chunks.push(row.map_err(StorageError::from)?);
        }
        Ok(chunks)
    }

    async fn file_content(&self, path: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare("SELECT content FROM files WHERE path = ?1")?;
        let mut rows = stmt.query(params![path])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }
}
