//! Supabase (PostgREST) vector store.
//!
//! Similarity search runs inside the database through a stored procedure
//! (`POST /rest/v1/rpc/{function}`); ingestion writes rows into the
//! collection table.

use super::{ChunkRecord, IndexedSource, RetrievedChunk, VectorStore};
use crate::error::{FinqueryError, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_RANGE, RANGE};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, instrument};
use url::Url;
use uuid::Uuid;

const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Rows requested per page when reading a table.
const PAGE_SIZE: usize = 1000;

/// IDs per delete request, keeping the `in.(...)` filter well under URL limits.
const DELETE_BATCH_SIZE: usize = 100;

/// Vector store backed by a Supabase project.
pub struct SupabaseVectorStore {
    http: reqwest::Client,
    base: Url,
    rpc_function: String,
    table: String,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    query_embedding: &'a [f32],
    similarity_threshold: f32,
    match_count: usize,
}

#[derive(Serialize)]
struct InsertRow<'a> {
    id: String,
    source_url: &'a str,
    title: &'a str,
    published_at: Option<String>,
    chunk_index: i32,
    content: &'a str,
    embedding: &'a [f32],
}

#[derive(Deserialize)]
struct IdRow {
    id: Uuid,
}

#[derive(Deserialize)]
struct SourceRow {
    source_url: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    published_at: Option<String>,
}

impl SupabaseVectorStore {
    /// Create a store for one collection of a Supabase project.
    pub fn new(project_url: &str, api_key: &str, rpc_function: &str, table: &str) -> Result<Self> {
        let mut base = Url::parse(project_url)
            .map_err(|e| FinqueryError::Config(format!("Invalid Supabase URL: {}", e)))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(api_key)
            .map_err(|e| FinqueryError::Config(format!("Invalid Supabase key: {}", e)))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|e| FinqueryError::Config(format!("Invalid Supabase key: {}", e)))?;
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .default_headers(headers)
            .build()
            .map_err(|e| FinqueryError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base,
            rpc_function: rpc_function.to_string(),
            table: table.to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| FinqueryError::Config(format!("Invalid endpoint {}: {}", path, e)))
    }

    fn table_url(&self) -> Result<Url> {
        self.endpoint(&format!("rest/v1/{}", self.table))
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FinqueryError::VectorStore(format!(
                "{} failed with {}: {}",
                what, status, body
            )));
        }
        Ok(response)
    }

    /// Read every matching row of the table, one `Range` page at a time.
    ///
    /// The server may cap a page below `PAGE_SIZE`, so paging follows the
    /// exact total from `Content-Range` rather than the page length.
    async fn fetch_all<T: DeserializeOwned>(&self, filters: &[(&str, &str)], what: &str) -> Result<Vec<T>> {
        let mut url = self.table_url()?;
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in filters {
                query.append_pair(key, value);
            }
        }

        let mut rows: Vec<T> = Vec::new();
        loop {
            let start = rows.len();
            let request = self
                .http
                .get(url.clone())
                .header("Prefer", "count=exact")
                .header("Range-Unit", "items")
                .header(RANGE, format!("{}-{}", start, start + PAGE_SIZE - 1));
            let response = self.send(request, what).await?;

            let total = content_range_total(&response);
            let page: Vec<T> = response.json().await?;
            let received = page.len();
            rows.extend(page);

            match total {
                Some(total) if received > 0 && rows.len() < total => continue,
                None if received == PAGE_SIZE => continue,
                _ => break,
            }
        }

        debug!("{} read {} rows from {}", what, rows.len(), self.table);
        Ok(rows)
    }
}

/// Total row count from a `Content-Range` header such as "0-0/1234" or "*/0".
fn content_range_total(response: &Response) -> Option<usize> {
    response
        .headers()
        .get(CONTENT_RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.rsplit('/').next())
        .and_then(|v| v.parse::<usize>().ok())
}

#[async_trait]
impl VectorStore for SupabaseVectorStore {
    #[instrument(skip(self, chunks), fields(table = %self.table, count = chunks.len()))]
    async fn upsert_batch(&self, chunks: &[ChunkRecord]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let rows: Vec<InsertRow<'_>> = chunks
            .iter()
            .map(|c| InsertRow {
                id: c.id.to_string(),
                source_url: &c.source_url,
                title: &c.title,
                published_at: c.published_at.map(|d| d.to_string()),
                chunk_index: c.chunk_index,
                content: &c.content,
                embedding: &c.embedding,
            })
            .collect();

        let request = self
            .http
            .post(self.table_url()?)
            .header("Prefer", "return=minimal")
            .json(&rows);
        self.send(request, "Insert").await?;

        info!("Inserted {} chunks into {}", chunks.len(), self.table);
        Ok(chunks.len())
    }

    #[instrument(skip(self, query_embedding), fields(rpc = %self.rpc_function))]
    async fn search(
        &self,
        query_embedding: &[f32],
        similarity_threshold: f32,
        match_count: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        let body = SearchRequest {
            query_embedding,
            similarity_threshold,
            match_count,
        };

        let url = self.endpoint(&format!("rest/v1/rpc/{}", self.rpc_function))?;
        let response = self
            .send(self.http.post(url).json(&body), &self.rpc_function)
            .await?;

        let chunks: Vec<RetrievedChunk> = response.json().await?;
        debug!("{} returned {} chunks", self.rpc_function, chunks.len());
        Ok(chunks)
    }

    #[instrument(skip(self), fields(table = %self.table))]
    async fn source_chunk_ids(&self, source_url: &str) -> Result<Vec<Uuid>> {
        let filter = format!("eq.\"{}\"", source_url);
        let rows: Vec<IdRow> = self
            .fetch_all(
                &[("select", "id"), ("source_url", filter.as_str()), ("order", "id")],
                "Chunk lookup",
            )
            .await?;
        Ok(rows.into_iter().map(|row| row.id).collect())
    }

    #[instrument(skip(self, ids), fields(table = %self.table, count = ids.len()))]
    async fn delete_chunks(&self, ids: &[Uuid]) -> Result<usize> {
        let mut deleted = 0;
        for batch in ids.chunks(DELETE_BATCH_SIZE) {
            let list: Vec<String> = batch.iter().map(|id| id.to_string()).collect();
            let mut url = self.table_url()?;
            url.query_pairs_mut()
                .append_pair("id", &format!("in.({})", list.join(",")))
                .append_pair("select", "id");

            let response = self
                .send(
                    self.http
                        .delete(url)
                        .header("Prefer", "return=representation"),
                    "Delete",
                )
                .await?;

            let rows: Vec<serde_json::Value> = response.json().await?;
            deleted += rows.len();
        }

        debug!("Deleted {} chunks", deleted);
        Ok(deleted)
    }

    #[instrument(skip(self), fields(table = %self.table))]
    async fn list_sources(&self) -> Result<Vec<IndexedSource>> {
        let rows: Vec<SourceRow> = self
            .fetch_all(
                &[("select", "source_url,title,published_at"), ("order", "id")],
                "List",
            )
            .await?;

        let mut sources: HashMap<String, IndexedSource> = HashMap::new();
        for row in rows {
            let entry = sources
                .entry(row.source_url.clone())
                .or_insert_with(|| IndexedSource {
                    source_url: row.source_url.clone(),
                    title: row.title.clone().unwrap_or_default(),
                    published_at: row.published_at.as_deref().and_then(super::parse_date),
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
        let mut url = self.table_url()?;
        url.query_pairs_mut().append_pair("select", "id");

        let request = self
            .http
            .get(url)
            .header("Prefer", "count=exact")
            .header(RANGE, "0-0");
        let response = self.send(request, "Count").await?;

        content_range_total(&response).ok_or_else(|| {
            FinqueryError::VectorStore("Count response had no Content-Range".to_string())
        })
    }
}
