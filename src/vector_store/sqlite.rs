//! SQLite-based vector store implementation.
//!
//! Uses SQLite with cosine similarity computed in Rust for simplicity. Each
//! collection lives in its own table of the same database file.

use super::{parse_date, rank, ChunkRecord, IndexedSource, RetrievedChunk, VectorStore};
use crate::error::{FinqueryError, Result};
use crate::sql::check_identifier;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// SQLite-based vector store bound to one table.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
    table: String,
}

impl SqliteVectorStore {
    /// Open (or create) a SQLite vector store at `path` using `table`.
    #[instrument(skip_all, fields(table = %table))]
    pub fn new(path: &Path, table: &str) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        let store = Self::with_connection(conn, table)?;
        info!("Initialized SQLite vector store at {:?}", path);
        Ok(store)
    }

    /// Create an in-memory SQLite vector store (useful for testing).
    pub fn in_memory(table: &str) -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, table)
    }

    fn with_connection(conn: Connection, table: &str) -> Result<Self> {
        check_identifier(table)?;

        conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id TEXT PRIMARY KEY,
                source_url TEXT NOT NULL,
                title TEXT NOT NULL,
                published_at TEXT,
                chunk_index INTEGER NOT NULL,
                content TEXT NOT NULL,
                embedding BLOB NOT NULL,
                indexed_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_{table}_source_url ON {table}(source_url);
            "#,
            table = table
        ))?;

        Ok(Self {
            conn: Mutex::new(conn),
            table: table.to_string(),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| FinqueryError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    fn load_all(&self) -> Result<Vec<ChunkRecord>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT id, source_url, title, published_at, chunk_index,
                   content, embedding, indexed_at
            FROM {}
            "#,
            self.table
        ))?;

        let rows = stmt.query_map([], |row| {
            let id_str: String = row.get(0)?;
            let published_str: Option<String> = row.get(3)?;
            let embedding_bytes: Vec<u8> = row.get(6)?;
            let indexed_at_str: String = row.get(7)?;

            Ok(ChunkRecord {
                id: uuid::Uuid::parse_str(&id_str).unwrap_or_default(),
                source_url: row.get(1)?,
                title: row.get(2)?,
                published_at: published_str.as_deref().and_then(parse_date),
                chunk_index: row.get(4)?,
                content: row.get(5)?,
                embedding: Self::bytes_to_embedding(&embedding_bytes),
                indexed_at: DateTime::parse_from_rfc3339(&indexed_at_str)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
            })
        })?;

        let records: Vec<ChunkRecord> = rows.filter_map(|r| r.ok()).collect();
        Ok(records)
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    #[instrument(skip(self, chunks), fields(table = %self.table, count = chunks.len()))]
    async fn upsert_batch(&self, chunks: &[ChunkRecord]) -> Result<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        {
            let mut stmt = tx.prepare(&format!(
                r#"
                INSERT OR REPLACE INTO {}
                (id, source_url, title, published_at, chunk_index, content, embedding, indexed_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                self.table
            ))?;

            for chunk in chunks {
                stmt.execute(params![
                    chunk.id.to_string(),
                    chunk.source_url,
                    chunk.title,
                    chunk.published_at.map(|d| d.to_string()),
                    chunk.chunk_index,
                    chunk.content,
                    Self::embedding_to_bytes(&chunk.embedding),
                    chunk.indexed_at.to_rfc3339(),
                ])?;
            }
        }

        tx.commit()?;
        info!("Batch upserted {} chunks", chunks.len());
        Ok(chunks.len())
    }

    #[instrument(skip(self, query_embedding), fields(table = %self.table))]
    async fn search(
        &self,
        query_embedding: &[f32],
        similarity_threshold: f32,
        match_count: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        let records = self.load_all()?;
        let results = rank(
            records.iter(),
            query_embedding,
            similarity_threshold,
            match_count,
        );

        debug!("Found {} matching chunks", results.len());
        Ok(results)
    }

    #[instrument(skip(self), fields(table = %self.table))]
    async fn source_chunk_ids(&self, source_url: &str) -> Result<Vec<Uuid>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT id FROM {} WHERE source_url = ?1",
            self.table
        ))?;
        let ids: Vec<String> = stmt
            .query_map(params![source_url], |row| row.get(0))?
            .collect::<std::result::Result<_, _>>()?;

        ids.iter()
            .map(|id| {
                Uuid::parse_str(id).map_err(|e| {
                    FinqueryError::VectorStore(format!("Invalid chunk id {}: {}", id, e))
                })
            })
            .collect()
    }

    #[instrument(skip(self, ids), fields(table = %self.table, count = ids.len()))]
    async fn delete_chunks(&self, ids: &[Uuid]) -> Result<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        let mut deleted = 0;
        {
            let mut stmt = tx.prepare(&format!("DELETE FROM {} WHERE id = ?1", self.table))?;
            for id in ids {
                deleted += stmt.execute(params![id.to_string()])?;
            }
        }

        tx.commit()?;
        debug!("Deleted {} chunks", deleted);
        Ok(deleted)
    }

    #[instrument(skip(self), fields(table = %self.table))]
    async fn list_sources(&self) -> Result<Vec<IndexedSource>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT source_url, MAX(title), MAX(published_at), COUNT(*) AS chunk_count
            FROM {}
            GROUP BY source_url
            ORDER BY MAX(published_at) DESC, source_url
            "#,
            self.table
        ))?;

        let sources = stmt.query_map([], |row| {
            let published_str: Option<String> = row.get(2)?;
            Ok(IndexedSource {
                source_url: row.get(0)?,
                title: row.get(1)?,
                published_at: published_str.as_deref().and_then(parse_date),
                chunk_count: row.get(3)?,
            })
        })?;

        let result: Vec<IndexedSource> = sources.filter_map(|s| s.ok()).collect();
        Ok(result)
    }

    async fn document_count(&self) -> Result<usize> {
        let conn = self.lock()?;

        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", self.table),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
