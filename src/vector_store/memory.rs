//! In-memory vector store implementation.
//!
//! Useful for testing and small datasets.

use super::{rank, ChunkRecord, IndexedSource, RetrievedChunk, VectorStore};
use crate::error::{FinqueryError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

/// In-memory vector store.
pub struct MemoryVectorStore {
    chunks: RwLock<HashMap<Uuid, ChunkRecord>>,
}

impl MemoryVectorStore {
    /// Create a new in-memory vector store.
    pub fn new() -> Self {
        Self {
            chunks: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<Uuid, ChunkRecord>>> {
        self.chunks
            .read()
            .map_err(|e| FinqueryError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<Uuid, ChunkRecord>>> {
        self.chunks
            .write()
            .map_err(|e| FinqueryError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }
}

impl Default for MemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert_batch(&self, chunks: &[ChunkRecord]) -> Result<usize> {
        let mut store = self.write()?;
        for chunk in chunks {
            store.insert(chunk.id, chunk.clone());
        }
        Ok(chunks.len())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        similarity_threshold: f32,
        match_count: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        let store = self.read()?;
        Ok(rank(
            store.values(),
            query_embedding,
            similarity_threshold,
            match_count,
        ))
    }

    async fn source_chunk_ids(&self, source_url: &str) -> Result<Vec<Uuid>> {
        let store = self.read()?;
        Ok(store
            .values()
            .filter(|chunk| chunk.source_url == source_url)
            .map(|chunk| chunk.id)
            .collect())
    }

    async fn delete_chunks(&self, ids: &[Uuid]) -> Result<usize> {
        let mut store = self.write()?;
        Ok(ids.iter().filter(|id| store.remove(*id).is_some()).count())
    }

    async fn list_sources(&self) -> Result<Vec<IndexedSource>> {
        let store = self.read()?;

        let mut sources: HashMap<String, IndexedSource> = HashMap::new();
        for chunk in store.values() {
            let entry = sources
                .entry(chunk.source_url.clone())
                .or_insert_with(|| IndexedSource {
                    source_url: chunk.source_url.clone(),
                    title: chunk.title.clone(),
                    published_at: chunk.published_at,
                    chunk_count: 0,
                });
            entry.chunk_count += 1;
        }

        let mut sources: Vec<IndexedSource> = sources.into_values().collect();
        sources.sort_by(|a, b| {
            b.published_at
                .cmp(&a.published_at)
                .then_with(|| a.source_url.cmp(&b.source_url))
        });
        Ok(sources)
    }

    async fn document_count(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }
}
