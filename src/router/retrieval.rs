//! Vector retrieval for one collection.

use super::{AnswerOutcome, AnswerSynthesizer};
use crate::config::CollectionSettings;
use crate::embedding::Embedder;
use crate::error::{FinqueryError, Result};
use crate::vector_store::{Collection, RetrievedChunk, VectorStore};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Outcome of answering from a collection.
#[derive(Debug, Clone)]
pub struct VectorAnswer {
    pub text: String,
    pub outcome: AnswerOutcome,
    pub source_info: String,
    pub sources: Vec<RetrievedChunk>,
}

/// Embeds a question, searches one collection and answers from the hits.
pub struct VectorRetriever {
    collection: Collection,
    settings: CollectionSettings,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    synthesizer: AnswerSynthesizer,
}

impl VectorRetriever {
    /// Create a retriever. The embedder must produce vectors of the width the
    /// collection was indexed with.
    pub fn new(
        collection: Collection,
        settings: CollectionSettings,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        synthesizer: AnswerSynthesizer,
    ) -> Result<Self> {
        if embedder.dimensions() != settings.dimensions as usize {
            return Err(FinqueryError::Config(format!(
                "{} expects {}-dimensional embeddings but the embedder produces {}",
                collection,
                settings.dimensions,
                embedder.dimensions()
            )));
        }

        Ok(Self {
            collection,
            settings,
            embedder,
            store,
            synthesizer,
        })
    }

    pub fn collection(&self) -> Collection {
        self.collection
    }

    pub fn settings(&self) -> &CollectionSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Label shown next to an answer, e.g. "Press Releases (3 articles)".
    pub fn source_label(&self, count: usize) -> String {
        format!("{} ({} {})", self.settings.label, count, self.settings.unit)
    }

    /// Embed `question` and return the best matches.
    #[instrument(skip(self), fields(collection = %self.collection))]
    pub async fn search(&self, question: &str, k: Option<usize>) -> Result<Vec<RetrievedChunk>> {
        let match_count = k.unwrap_or(self.settings.match_count);
        let embedding = self.embedder.embed(question).await?;

        let chunks = self
            .store
            .search(&embedding, self.settings.similarity_threshold, match_count)
            .await?;

        debug!("Retrieved {} chunks", chunks.len());
        Ok(chunks)
    }

    /// Answer `question` from this collection. Failures become fixed messages.
    #[instrument(skip(self), fields(collection = %self.collection))]
    pub async fn answer(&self, question: &str, k: Option<usize>) -> VectorAnswer {
        let chunks = match self.search(question, k).await {
            Ok(chunks) => chunks,
            Err(e) => {
                warn!("Search in {} failed: {}", self.collection, e);
                return VectorAnswer {
                    text: format!("Sorry, I couldn't search {} right now.", self.settings.label),
                    outcome: AnswerOutcome::UpstreamError,
                    source_info: self.source_label(0),
                    sources: Vec::new(),
                };
            }
        };

        if chunks.is_empty() {
            info!("No chunks above threshold in {}", self.collection);
            return VectorAnswer {
                text: self.settings.empty_message.clone(),
                outcome: AnswerOutcome::NoResults,
                source_info: self.source_label(0),
                sources: Vec::new(),
            };
        }

        let source_info = self.source_label(chunks.len());
        let context = build_context(&chunks);
        let text = self
            .synthesizer
            .synthesize(question, &context, &source_info)
            .await;

        VectorAnswer {
            text,
            outcome: AnswerOutcome::Answered,
            source_info,
            sources: chunks,
        }
    }
}

/// Context block for the answer prompt: a header line per chunk, then its text.
pub fn build_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| format!("[{}] {}\n{}", i + 1, chunk.citation(), chunk.content.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}
