//! Ingestion: load documents, split, embed and index them into a collection.

mod loader;
mod splitter;

pub use loader::{load_file, load_path, SourceDocument, SUPPORTED_EXTENSIONS};
pub use splitter::{clean_text, TextSplitter};

use crate::config::CollectionSettings;
use crate::embedding::Embedder;
use crate::error::{FinqueryError, Result};
use crate::vector_store::{ChunkRecord, Collection, VectorStore};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Rows per insert request.
pub const UPSERT_BATCH_SIZE: usize = 20;

/// Result of indexing one document.
#[derive(Debug, Clone)]
pub struct IngestResult {
    pub source_url: String,
    pub title: String,
    pub chunks_indexed: usize,
    /// Chunks that belonged to an earlier version of this source.
    pub chunks_replaced: usize,
}

/// Indexes documents into one collection.
pub struct Ingestor {
    collection: Collection,
    splitter: TextSplitter,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    embed_batch_size: usize,
}

impl Ingestor {
    pub fn new(
        collection: Collection,
        settings: &CollectionSettings,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
    ) -> Result<Self> {
        if embedder.dimensions() != settings.dimensions as usize {
            return Err(FinqueryError::Config(format!(
                "{} stores {}-dimensional embeddings but the embedder produces {}",
                collection,
                settings.dimensions,
                embedder.dimensions()
            )));
        }

        Ok(Self {
            collection,
            splitter: TextSplitter::new(settings.chunk_size, settings.chunk_overlap)?,
            embedder,
            store,
            embed_batch_size: UPSERT_BATCH_SIZE,
        })
    }

    /// Number of texts sent per embedding request.
    pub fn with_embed_batch_size(mut self, size: usize) -> Self {
        self.embed_batch_size = size.max(1);
        self
    }

    pub fn collection(&self) -> Collection {
        self.collection
    }

    /// Split, embed and index a document, replacing earlier chunks of the same source.
    #[instrument(skip(self, document), fields(collection = %self.collection, source = %document.source_url))]
    pub async fn ingest(&self, document: &SourceDocument) -> Result<IngestResult> {
        let texts = self.splitter.split_text(&clean_text(&document.content));
        if texts.is_empty() {
            return Ok(IngestResult {
                source_url: document.source_url.clone(),
                title: document.title.clone(),
                chunks_indexed: 0,
                chunks_replaced: 0,
            });
        }

        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.embed_batch_size) {
            embeddings.extend(self.embedder.embed_batch(batch).await?);
        }
        if embeddings.len() != texts.len() {
            return Err(FinqueryError::Ingest(format!(
                "Got {} embeddings for {} chunks",
                embeddings.len(),
                texts.len()
            )));
        }

        let records: Vec<ChunkRecord> = texts
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(i, (content, embedding))| {
                ChunkRecord::new(
                    document.source_url.clone(),
                    document.title.clone(),
                    document.published_at,
                    i as i32,
                    content,
                    embedding,
                )
            })
            .collect();

        // Old chunks stay searchable until every new batch is in.
        let stale = self.store.source_chunk_ids(&document.source_url).await?;

        let mut indexed = 0;
        for batch in records.chunks(UPSERT_BATCH_SIZE) {
            match self.store.upsert_batch(batch).await {
                Ok(n) => indexed += n,
                Err(e) => {
                    warn!(
                        "Inserted {} of {} chunks from {} before failing; previous version kept",
                        indexed,
                        records.len(),
                        document.source_url
                    );
                    return Err(e);
                }
            }
        }

        let replaced = self.store.delete_chunks(&stale).await?;

        info!("Indexed {} chunks from {}", indexed, document.source_url);
        Ok(IngestResult {
            source_url: document.source_url.clone(),
            title: document.title.clone(),
            chunks_indexed: indexed,
            chunks_replaced: replaced,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::MemoryVectorStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct LengthEmbedder {
        batches: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for LengthEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(vec![text.len() as f32, 1.0, 0.0])
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.batches.fetch_add(1, Ordering::SeqCst);
            let mut out = Vec::new();
            for t in texts {
                out.push(self.embed(t).await?);
            }
            Ok(out)
        }

        fn dimensions(&self) -> usize {
            3
        }
    }

    fn settings() -> CollectionSettings {
        CollectionSettings {
            dimensions: 3,
            chunk_size: 40,
            chunk_overlap: 8,
            ..CollectionSettings::press_releases()
        }
    }

    fn document(content: &str) -> SourceDocument {
        SourceDocument {
            source_url: "https://ir.example.com/pr/7".to_string(),
            title: "Q4 results".to_string(),
            published_at: None,
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn test_reingest_replaces_previous_chunks() {
        let store = Arc::new(MemoryVectorStore::new());
        let embedder = Arc::new(LengthEmbedder {
            batches: AtomicUsize::new(0),
        });
        let ingestor = Ingestor::new(Collection::PressReleases, &settings(), embedder.clone(), store.clone())
            .unwrap()
            .with_embed_batch_size(2);

        let text = "Prologis reported strong fourth quarter earnings. Occupancy stayed high. \
                    The board declared a quarterly dividend.";
        let first = ingestor.ingest(&document(text)).await.unwrap();
        assert!(first.chunks_indexed > 1);
        assert_eq!(first.chunks_replaced, 0);
        assert_eq!(store.document_count().await.unwrap(), first.chunks_indexed);
        assert_eq!(
            embedder.batches.load(Ordering::SeqCst),
            first.chunks_indexed.div_ceil(2)
        );

        let second = ingestor.ingest(&document(text)).await.unwrap();
        assert_eq!(second.chunks_replaced, first.chunks_indexed);
        assert_eq!(store.document_count().await.unwrap(), second.chunks_indexed);
    }

    /// Accepts a fixed number of insert calls, then fails.
    struct FlakyStore {
        inner: MemoryVectorStore,
        inserts_left: AtomicUsize,
    }

    #[async_trait]
    impl VectorStore for FlakyStore {
        async fn upsert_batch(&self, chunks: &[ChunkRecord]) -> Result<usize> {
            if self.inserts_left.load(Ordering::SeqCst) == 0 {
                return Err(FinqueryError::VectorStore("insert failed with 503".to_string()));
            }
            self.inserts_left.fetch_sub(1, Ordering::SeqCst);
            self.inner.upsert_batch(chunks).await
        }

        async fn search(
            &self,
            query_embedding: &[f32],
            similarity_threshold: f32,
            match_count: usize,
        ) -> Result<Vec<crate::vector_store::RetrievedChunk>> {
            self.inner.search(query_embedding, similarity_threshold, match_count).await
        }

        async fn source_chunk_ids(&self, source_url: &str) -> Result<Vec<uuid::Uuid>> {
            self.inner.source_chunk_ids(source_url).await
        }

        async fn delete_chunks(&self, ids: &[uuid::Uuid]) -> Result<usize> {
            self.inner.delete_chunks(ids).await
        }

        async fn list_sources(&self) -> Result<Vec<crate::vector_store::IndexedSource>> {
            self.inner.list_sources().await
        }

        async fn document_count(&self) -> Result<usize> {
            self.inner.document_count().await
        }
    }

    #[tokio::test]
    async fn test_failed_reingest_keeps_previous_chunks() {
        let store = Arc::new(FlakyStore {
            inner: MemoryVectorStore::new(),
            inserts_left: AtomicUsize::new(1),
        });
        let embedder = Arc::new(LengthEmbedder {
            batches: AtomicUsize::new(0),
        });
        let ingestor = Ingestor::new(Collection::PressReleases, &settings(), embedder, store.clone()).unwrap();

        let first = ingestor.ingest(&document("Occupancy stayed high.")).await.unwrap();
        assert_eq!(first.chunks_indexed, 1);
        let before = store.source_chunk_ids("https://ir.example.com/pr/7").await.unwrap();

        let err = ingestor.ingest(&document("Revised release text.")).await;
        assert!(matches!(err, Err(FinqueryError::VectorStore(_))));
        assert_eq!(
            store.source_chunk_ids("https://ir.example.com/pr/7").await.unwrap(),
            before
        );
    }

    #[tokio::test]
    async fn test_empty_document_indexes_nothing() {
        let store = Arc::new(MemoryVectorStore::new());
        let embedder = Arc::new(LengthEmbedder {
            batches: AtomicUsize::new(0),
        });
        let ingestor = Ingestor::new(Collection::PressReleases, &settings(), embedder, store).unwrap();
        let result = ingestor.ingest(&document("\0  ")).await.unwrap();
        assert_eq!(result.chunks_indexed, 0);
    }

    #[test]
    fn test_width_mismatch_is_refused() {
        let embedder = Arc::new(LengthEmbedder {
            batches: AtomicUsize::new(0),
        });
        let result = Ingestor::new(
            Collection::SecReports,
            &CollectionSettings::sec_reports(),
            embedder,
            Arc::new(MemoryVectorStore::new()),
        );
        assert!(result.is_err());
    }
}
