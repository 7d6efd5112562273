//! Vector store abstraction for finquery.
//!
//! Provides a trait-based interface over the chunk collections: the hosted
//! similarity-search procedures, a local SQLite file, and an in-memory store.

mod memory;
mod sqlite;
mod supabase;

pub use memory::MemoryVectorStore;
pub use sqlite::SqliteVectorStore;
pub use supabase::SupabaseVectorStore;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// A vector collection the assistant can search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    /// Company press releases (768-d embeddings).
    PressReleases,
    /// SEC filings such as 10-K and 10-Q reports (1536-d embeddings).
    SecReports,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::PressReleases => "press_releases",
            Collection::SecReports => "sec_reports",
        }
    }
}

impl std::str::FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "press_releases" | "press" | "pr" => Ok(Collection::PressReleases),
            "sec_reports" | "sec" | "filings" => Ok(Collection::SecReports),
            _ => Err(format!("Unknown collection: {}", s)),
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A chunk returned by a similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// Text content of the chunk.
    pub content: String,
    /// Similarity to the query (higher is better).
    #[serde(default)]
    pub similarity: f32,
    /// Where the chunk came from (URL or file name).
    #[serde(default, alias = "source_file")]
    pub source_url: String,
    /// Publication date of the source, when known.
    #[serde(default, deserialize_with = "lenient_date")]
    pub published_at: Option<NaiveDate>,
    /// Title of the source document.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
}

impl RetrievedChunk {
    /// One-line description of where this chunk came from.
    pub fn citation(&self) -> String {
        let mut parts = Vec::new();
        if !self.source_url.is_empty() {
            parts.push(self.source_url.clone());
        }
        if let Some(date) = self.published_at {
            parts.push(date.to_string());
        }

        match (self.title.is_empty(), parts.is_empty()) {
            (true, true) => "unknown source".to_string(),
            (true, false) => parts.join(", "),
            (false, true) => self.title.clone(),
            (false, false) => format!("{} ({})", self.title, parts.join(", ")),
        }
    }
}

/// Accepts `YYYY-MM-DD` as well as full timestamps; anything else becomes `None`.
fn lenient_date<'de, D>(deserializer: D) -> std::result::Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| parse_date(&s)))
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parse the date portion of a date or timestamp string.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let head = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// A chunk written into a collection during ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Unique chunk ID.
    pub id: Uuid,
    /// Source URL or file name.
    pub source_url: String,
    /// Source document title.
    pub title: String,
    /// Publication date of the source.
    pub published_at: Option<NaiveDate>,
    /// Position of this chunk inside its source.
    pub chunk_index: i32,
    /// Text content of this chunk.
    pub content: String,
    /// Embedding vector.
    pub embedding: Vec<f32>,
    /// When this chunk was indexed.
    pub indexed_at: DateTime<Utc>,
}

impl ChunkRecord {
    /// Create a new chunk record.
    pub fn new(
        source_url: String,
        title: String,
        published_at: Option<NaiveDate>,
        chunk_index: i32,
        content: String,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_url,
            title,
            published_at,
            chunk_index,
            content,
            embedding,
            indexed_at: Utc::now(),
        }
    }

    /// View this record as a search hit with the given similarity.
    pub fn to_retrieved(&self, similarity: f32) -> RetrievedChunk {
        RetrievedChunk {
            content: self.content.clone(),
            similarity,
            source_url: self.source_url.clone(),
            published_at: self.published_at,
            title: self.title.clone(),
        }
    }
}

/// Summary information about an indexed source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedSource {
    pub source_url: String,
    pub title: String,
    pub published_at: Option<NaiveDate>,
    pub chunk_count: u32,
}

/// Trait for vector store implementations. Each instance is bound to one collection.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Bulk insert chunks.
    async fn upsert_batch(&self, chunks: &[ChunkRecord]) -> Result<usize>;

    /// Run the similarity search: best matches first, at most `match_count`,
    /// none below `similarity_threshold`.
    async fn search(
        &self,
        query_embedding: &[f32],
        similarity_threshold: f32,
        match_count: usize,
    ) -> Result<Vec<RetrievedChunk>>;

    /// IDs of the chunks currently stored for a source.
    async fn source_chunk_ids(&self, source_url: &str) -> Result<Vec<Uuid>>;

    /// Delete chunks by ID. Unknown IDs are ignored.
    async fn delete_chunks(&self, ids: &[Uuid]) -> Result<usize>;

    /// List indexed sources with chunk counts.
    async fn list_sources(&self) -> Result<Vec<IndexedSource>>;

    /// Get total chunk count.
    async fn document_count(&self) -> Result<usize>;
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Score records against a query and keep the best `match_count` above the threshold.
fn rank<'a>(
    records: impl Iterator<Item = &'a ChunkRecord>,
    query_embedding: &[f32],
    similarity_threshold: f32,
    match_count: usize,
) -> Vec<RetrievedChunk> {
    let mut results: Vec<RetrievedChunk> = records
        .map(|r| r.to_retrieved(cosine_similarity(query_embedding, &r.embedding)))
        .filter(|r| r.similarity >= similarity_threshold)
        .collect();

    results.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    results.truncate(match_count);
    results
}
