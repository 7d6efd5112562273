//! Gemini `embedContent` REST embeddings.
//!
//! Talks to the Generative Language API directly so the request can carry a
//! task type and an explicit output dimensionality.

use super::Embedder;
use crate::config::{CollectionSettings, EmbeddingSettings};
use crate::error::{FinqueryError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

/// Maximum number of texts per `batchEmbedContents` call.
const MAX_BATCH: usize = 100;

const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Gemini-based embedder bound to one model and width.
pub struct GeminiEmbedder {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    dimensions: usize,
    task_type: Option<String>,
}

impl GeminiEmbedder {
    /// Create an embedder for a model (with or without the `models/` prefix).
    pub fn new(
        api_base: &str,
        api_key: &str,
        model: &str,
        dimensions: usize,
        task_type: Option<String>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| FinqueryError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.trim_start_matches("models/").to_string(),
            dimensions,
            task_type,
        })
    }

    /// Create the embedder a collection was indexed with.
    pub fn for_collection(
        settings: &EmbeddingSettings,
        collection: &CollectionSettings,
        api_key: &str,
    ) -> Result<Self> {
        Self::new(
            &settings.api_base,
            api_key,
            &collection.embedding_model,
            collection.dimensions as usize,
            collection.task_type.clone(),
        )
    }

    fn model_path(&self) -> String {
        format!("models/{}", self.model)
    }

    fn request_for<'a>(&'a self, text: &'a str) -> EmbedContentRequest<'a> {
        EmbedContentRequest {
            model: self.model_path(),
            content: Content {
                parts: vec![Part { text }],
            },
            task_type: self.task_type.as_deref(),
            output_dimensionality: Some(self.dimensions as u32),
        }
    }

    fn check_width(&self, values: Vec<f32>) -> Result<Vec<f32>> {
        if values.len() != self.dimensions {
            return Err(FinqueryError::Embedding(format!(
                "{} returned {} values, expected {}",
                self.model,
                values.len(),
                self.dimensions
            )));
        }
        Ok(values)
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(&self, method: &str, body: &B) -> Result<R> {
        let url = format!("{}/{}:{}", self.api_base, self.model_path(), method);

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(FinqueryError::Embedding(format!(
                "{} returned {}: {}",
                method, status, text
            )));
        }

        Ok(response.json::<R>().await?)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: String,
    content: Content<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    task_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<u32>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct BatchEmbedContentsRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Deserialize)]
struct BatchEmbedContentsResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    #[instrument(skip(self, text), fields(model = %self.model))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let response: EmbedContentResponse = self.post("embedContent", &self.request_for(text)).await?;
        self.check_width(response.embedding.values)
    }

    #[instrument(skip(self, texts), fields(model = %self.model, count = texts.len()))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(MAX_BATCH) {
            let request = BatchEmbedContentsRequest {
                requests: chunk.iter().map(|t| self.request_for(t)).collect(),
            };

            let response: BatchEmbedContentsResponse =
                self.post("batchEmbedContents", &request).await?;

            if response.embeddings.len() != chunk.len() {
                return Err(FinqueryError::Embedding(format!(
                    "Requested {} embeddings, received {}",
                    chunk.len(),
                    response.embeddings.len()
                )));
            }

            for embedding in response.embeddings {
                all_embeddings.push(self.check_width(embedding.values)?);
            }
        }

        debug!("Generated {} embeddings", all_embeddings.len());
        Ok(all_embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
