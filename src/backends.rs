//! Builds every external client from settings and wires them together.
//!
//! Nothing here is global: each command builds its own [`Backends`], and
//! tests assemble one from fakes with [`Backends::with_components`].

use crate::config::{EmbeddingProvider, Prompts, Settings, VectorStoreProvider};
use crate::embedding::{Embedder, GeminiEmbedder, OpenAIEmbedder};
use crate::error::Result;
use crate::llm::{LanguageModel, OpenAiChatModel};
use crate::router::{Assistant, AnswerSynthesizer, KeywordClassifier, VectorRetriever};
use crate::sql::{SqlAgent, SqlStore, SqliteStore};
use crate::vector_store::{Collection, SqliteVectorStore, SupabaseVectorStore, VectorStore};
use std::sync::Arc;
use tracing::info;

/// Embedder and store for one collection.
#[derive(Clone)]
pub struct CollectionBackend {
    pub embedder: Arc<dyn Embedder>,
    pub store: Arc<dyn VectorStore>,
}

impl CollectionBackend {
    /// Build the embedder and store configured for `collection`.
    pub fn from_settings(settings: &Settings, collection: Collection) -> Result<Self> {
        Ok(Self {
            embedder: create_embedder(settings, collection)?,
            store: open_vector_store(settings, collection)?,
        })
    }
}

/// Create the embedder a collection was indexed with.
pub fn create_embedder(settings: &Settings, collection: Collection) -> Result<Arc<dyn Embedder>> {
    let api_key = Settings::credential(&settings.embedding.api_key_env)?;
    let coll = settings.collections.get(collection);

    let embedder: Arc<dyn Embedder> = match settings.embedding.provider {
        EmbeddingProvider::Gemini => Arc::new(GeminiEmbedder::for_collection(
            &settings.embedding,
            coll,
            &api_key,
        )?),
        EmbeddingProvider::OpenAI => Arc::new(OpenAIEmbedder::with_config(
            &settings.embedding.api_base,
            &api_key,
            &coll.embedding_model,
            coll.dimensions as usize,
        )?),
    };
    Ok(embedder)
}

/// Open the vector store holding `collection`.
pub fn open_vector_store(settings: &Settings, collection: Collection) -> Result<Arc<dyn VectorStore>> {
    let coll = settings.collections.get(collection);

    let store: Arc<dyn VectorStore> = match settings.vector_store.provider {
        VectorStoreProvider::Supabase => {
            let url = Settings::credential(&settings.vector_store.supabase_url_env)?;
            let key = Settings::credential(&settings.vector_store.supabase_key_env)?;
            Arc::new(SupabaseVectorStore::new(&url, &key, &coll.rpc_function, &coll.table)?)
        }
        VectorStoreProvider::Sqlite => Arc::new(SqliteVectorStore::new(
            &settings.vector_sqlite_path(),
            &coll.table,
        )?),
    };
    Ok(store)
}

/// Load prompt templates with the configured overrides and variables.
pub fn load_prompts(settings: &Settings) -> Result<Prompts> {
    Prompts::load(
        settings.prompts.custom_dir.as_deref(),
        Some(&settings.prompts.variables),
    )
}

/// Create the chat model used for SQL generation and answers.
pub fn create_llm(settings: &Settings) -> Result<Arc<dyn LanguageModel>> {
    let api_key = Settings::credential(&settings.llm.api_key_env)?;
    info!("Using {} at {}", settings.llm.model, settings.llm.api_base);
    Ok(Arc::new(OpenAiChatModel::new(&settings.llm, &api_key)?))
}

/// Build a text-to-SQL agent without touching the vector collections.
pub fn structured_agent(settings: &Settings) -> Result<SqlAgent> {
    let prompts = Arc::new(load_prompts(settings)?);
    let llm = create_llm(settings)?;
    let store: Arc<dyn SqlStore> = Arc::new(SqliteStore::new(&settings.structured_sqlite_path())?);
    let synthesizer = AnswerSynthesizer::new(llm.clone(), prompts.clone());
    SqlAgent::new(llm, store, prompts, synthesizer, &settings.structured)
}

/// All clients needed to answer questions.
pub struct Backends {
    settings: Settings,
    prompts: Arc<Prompts>,
    llm: Arc<dyn LanguageModel>,
    sql_store: Arc<dyn SqlStore>,
    press_releases: CollectionBackend,
    sec_reports: CollectionBackend,
}

impl Backends {
    /// Build real clients from settings and environment credentials.
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let prompts = load_prompts(&settings)?;
        let llm = create_llm(&settings)?;

        let sql_store: Arc<dyn SqlStore> =
            Arc::new(SqliteStore::new(&settings.structured_sqlite_path())?);

        let press_releases = CollectionBackend::from_settings(&settings, Collection::PressReleases)?;
        let sec_reports = CollectionBackend::from_settings(&settings, Collection::SecReports)?;

        Ok(Self {
            settings,
            prompts: Arc::new(prompts),
            llm,
            sql_store,
            press_releases,
            sec_reports,
        })
    }

    /// Assemble from explicit components.
    pub fn with_components(
        settings: Settings,
        prompts: Prompts,
        llm: Arc<dyn LanguageModel>,
        sql_store: Arc<dyn SqlStore>,
        press_releases: CollectionBackend,
        sec_reports: CollectionBackend,
    ) -> Self {
        Self {
            settings,
            prompts: Arc::new(prompts),
            llm,
            sql_store,
            press_releases,
            sec_reports,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn llm(&self) -> Arc<dyn LanguageModel> {
        self.llm.clone()
    }

    pub fn sql_store(&self) -> Arc<dyn SqlStore> {
        self.sql_store.clone()
    }

    pub fn collection(&self, collection: Collection) -> &CollectionBackend {
        match collection {
            Collection::PressReleases => &self.press_releases,
            Collection::SecReports => &self.sec_reports,
        }
    }

    /// Wire up the routing assistant.
    pub fn assistant(&self) -> Result<Assistant> {
        let synthesizer = AnswerSynthesizer::new(self.llm.clone(), self.prompts.clone());

        let structured = SqlAgent::new(
            self.llm.clone(),
            self.sql_store.clone(),
            self.prompts.clone(),
            synthesizer.clone(),
            &self.settings.structured,
        )?;

        let retriever = |collection: Collection| {
            let backend = self.collection(collection);
            VectorRetriever::new(
                collection,
                self.settings.collections.get(collection).clone(),
                backend.embedder.clone(),
                backend.store.clone(),
                synthesizer.clone(),
            )
        };

        Ok(Assistant::new(
            KeywordClassifier::new(&self.settings.routing),
            structured,
            retriever(Collection::PressReleases)?,
            retriever(Collection::SecReports)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FinqueryError;

    #[test]
    fn test_missing_llm_key_is_config_error() {
        let mut settings = Settings::default();
        settings.llm.api_key_env = "FINQUERY_TEST_UNSET_LLM_KEY".to_string();

        match create_llm(&settings) {
            Err(FinqueryError::Config(msg)) => assert!(msg.contains("FINQUERY_TEST_UNSET_LLM_KEY")),
            Err(other) => panic!("expected config error, got {}", other),
            Ok(_) => panic!("expected config error"),
        }
    }

    #[tokio::test]
    async fn test_sqlite_provider_opens_one_table_per_collection() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.vector_store.provider = VectorStoreProvider::Sqlite;
        settings.vector_store.sqlite_path = dir.path().join("vectors.db").display().to_string();

        let press = open_vector_store(&settings, Collection::PressReleases).unwrap();
        let sec = open_vector_store(&settings, Collection::SecReports).unwrap();
        assert_eq!(press.document_count().await.unwrap(), 0);
        assert_eq!(sec.document_count().await.unwrap(), 0);
    }
}
