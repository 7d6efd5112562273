//! Configuration settings for finquery.

use crate::error::{FinqueryError, Result};
use crate::vector_store::Collection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Schema handed to the LLM when the structured store is the default
/// properties/financials database.
pub const DEFAULT_STRUCTURED_SCHEMA: &str = r#"Table properties(
  id INTEGER,
  property_id INTEGER,
  property_name TEXT,
  property_address TEXT,
  metro_area TEXT,
  square_foot NUMERIC,
  property_type TEXT
)

Table financials(
  id INTEGER,
  property_id INTEGER,
  year INTEGER,
  revenue NUMERIC,
  net_income NUMERIC
)

properties.property_id joins financials.property_id."#;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub llm: LlmSettings,
    pub embedding: EmbeddingSettings,
    pub collections: CollectionsSettings,
    pub vector_store: VectorStoreSettings,
    pub structured: StructuredSettings,
    pub routing: RoutingSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level without `-v` (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.finquery".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

/// Chat completion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Base URL of an OpenAI-compatible chat completions API.
    pub api_base: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Model used for SQL generation and answer synthesis.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// HTTP timeout for LLM requests.
    pub timeout_seconds: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_base: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            api_key_env: "GOOGLE_API_KEY".to_string(),
            model: "gemini-1.5-flash".to_string(),
            temperature: 0.1,
            timeout_seconds: 300,
        }
    }
}

/// Embedding provider type.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Gemini `embedContent` REST API (supports task types).
    #[default]
    Gemini,
    /// OpenAI-compatible embeddings endpoint.
    OpenAI,
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" | "google" => Ok(EmbeddingProvider::Gemini),
            "openai" => Ok(EmbeddingProvider::OpenAI),
            _ => Err(format!("Unknown embedding provider: {}", s)),
        }
    }
}

impl std::fmt::Display for EmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmbeddingProvider::Gemini => write!(f, "gemini"),
            EmbeddingProvider::OpenAI => write!(f, "openai"),
        }
    }
}

/// Embedding API settings shared by both collections.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding provider (gemini, openai).
    pub provider: EmbeddingProvider,
    /// Base URL of the embedding API.
    pub api_base: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Number of texts per embedding request during ingestion.
    pub batch_size: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Gemini,
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key_env: "GOOGLE_API_KEY".to_string(),
            batch_size: 20,
        }
    }
}

/// Settings for one vector collection.
///
/// The two collections use different embedding models and widths, so a
/// collection section has to be given in full when overridden.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionSettings {
    /// Human-readable label used in answers ("Press Releases").
    pub label: String,
    /// Noun for a single retrieved item ("articles", "documents").
    pub unit: String,
    /// Embedding model for this collection.
    pub embedding_model: String,
    /// Embedding width stored in this collection.
    pub dimensions: u32,
    /// Optional embedding task type (e.g. RETRIEVAL_DOCUMENT).
    pub task_type: Option<String>,
    /// Name of the similarity-search stored procedure.
    pub rpc_function: String,
    /// Table that holds the chunks.
    pub table: String,
    /// Number of chunks requested from the similarity search.
    pub match_count: usize,
    /// Minimum similarity for a chunk to be returned.
    pub similarity_threshold: f32,
    /// Answer returned when the search comes back empty.
    pub empty_message: String,
    /// Splitter chunk size in characters (ingestion).
    pub chunk_size: usize,
    /// Splitter overlap in characters (ingestion).
    pub chunk_overlap: usize,
}

impl CollectionSettings {
    /// Defaults for the press-release collection (768-d embeddings).
    pub fn press_releases() -> Self {
        Self {
            label: "Press Releases".to_string(),
            unit: "articles".to_string(),
            embedding_model: "text-embedding-004".to_string(),
            dimensions: 768,
            task_type: Some("RETRIEVAL_DOCUMENT".to_string()),
            rpc_function: "search_all_press_releases".to_string(),
            table: "press_releases".to_string(),
            match_count: 20,
            similarity_threshold: 0.02,
            empty_message: "No relevant press releases found.".to_string(),
            chunk_size: 400,
            chunk_overlap: 80,
        }
    }

    /// Defaults for the SEC filing collection (1536-d embeddings).
    pub fn sec_reports() -> Self {
        Self {
            label: "SEC Reports".to_string(),
            unit: "documents".to_string(),
            embedding_model: "gemini-embedding-001".to_string(),
            dimensions: 1536,
            task_type: Some("RETRIEVAL_DOCUMENT".to_string()),
            rpc_function: "vector_search".to_string(),
            table: "sec_reports".to_string(),
            match_count: 10,
            similarity_threshold: 0.02,
            empty_message: "No relevant SEC reports found.".to_string(),
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Both vector collections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionsSettings {
    #[serde(default = "CollectionSettings::press_releases")]
    pub press_releases: CollectionSettings,
    #[serde(default = "CollectionSettings::sec_reports")]
    pub sec_reports: CollectionSettings,
}

impl Default for CollectionsSettings {
    fn default() -> Self {
        Self {
            press_releases: CollectionSettings::press_releases(),
            sec_reports: CollectionSettings::sec_reports(),
        }
    }
}

impl CollectionsSettings {
    /// Settings for the given collection.
    pub fn get(&self, collection: Collection) -> &CollectionSettings {
        match collection {
            Collection::PressReleases => &self.press_releases,
            Collection::SecReports => &self.sec_reports,
        }
    }
}

/// Vector store provider type.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum VectorStoreProvider {
    /// Supabase/PostgREST stored procedures (pgvector).
    #[default]
    Supabase,
    /// Local SQLite file with similarity computed in process.
    Sqlite,
}

impl std::str::FromStr for VectorStoreProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "supabase" | "postgrest" => Ok(VectorStoreProvider::Supabase),
            "sqlite" => Ok(VectorStoreProvider::Sqlite),
            _ => Err(format!("Unknown vector store provider: {}", s)),
        }
    }
}

impl std::fmt::Display for VectorStoreProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VectorStoreProvider::Supabase => write!(f, "supabase"),
            VectorStoreProvider::Sqlite => write!(f, "sqlite"),
        }
    }
}

/// Vector store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreSettings {
    /// Vector store provider (supabase, sqlite).
    pub provider: VectorStoreProvider,
    /// Environment variable holding the Supabase project URL.
    pub supabase_url_env: String,
    /// Environment variable holding the Supabase API key.
    pub supabase_key_env: String,
    /// Path to SQLite database (for sqlite provider).
    pub sqlite_path: String,
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            provider: VectorStoreProvider::Supabase,
            supabase_url_env: "SUPABASE_URL".to_string(),
            supabase_key_env: "SUPABASE_KEY".to_string(),
            sqlite_path: "~/.finquery/vectors.db".to_string(),
        }
    }
}

/// Structured (text-to-SQL) store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuredSettings {
    /// Path to the SQLite database holding the relational tables.
    pub sqlite_path: String,
    /// Tables a generated query is allowed to read.
    pub tables: Vec<String>,
    /// Schema description for the LLM. Empty means introspect `tables`.
    pub schema: String,
    /// Ask the LLM for `{"sql": ...}` JSON instead of raw SQL.
    pub json_mode: bool,
    /// Maximum rows handed to the summarizer.
    pub max_rows: usize,
}

impl Default for StructuredSettings {
    fn default() -> Self {
        Self {
            sqlite_path: "~/.finquery/structured.db".to_string(),
            tables: vec!["properties".to_string(), "financials".to_string()],
            schema: DEFAULT_STRUCTURED_SCHEMA.to_string(),
            json_mode: false,
            max_rows: 200,
        }
    }
}

/// Keyword lists for the intent classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingSettings {
    pub press_keywords: Vec<String>,
    pub sec_keywords: Vec<String>,
    pub structured_keywords: Vec<String>,
}

impl Default for RoutingSettings {
    fn default() -> Self {
        fn words(list: &[&str]) -> Vec<String> {
            list.iter().map(|w| w.to_string()).collect()
        }

        Self {
            press_keywords: words(&[
                "dividend",
                "earnings",
                "quarter",
                "announcement",
                "press",
                "news",
                "declared",
            ]),
            sec_keywords: words(&[
                "filing",
                "sec",
                "annual",
                "report",
                "10-k",
                "10-q",
                "compliance",
                "risk",
            ]),
            structured_keywords: words(&[
                "revenue",
                "profit",
                "assets",
                "properties",
                "property",
                "financial",
                "income",
                "square",
                "metro",
                "address",
            ]),
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: HashMap<String, String>,
}

impl Default for PromptSettings {
    fn default() -> Self {
        let mut variables = HashMap::new();
        variables.insert("company".to_string(), "Prologis".to_string());
        Self {
            custom_dir: None,
            variables,
        }
    }
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| FinqueryError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("finquery")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded path of the local vector database.
    pub fn vector_sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.vector_store.sqlite_path)
    }

    /// Get the expanded path of the structured database.
    pub fn structured_sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.structured.sqlite_path)
    }

    /// Read a required credential from the environment.
    pub fn credential(var: &str) -> Result<String> {
        match std::env::var(var) {
            Ok(value) if !value.trim().is_empty() => Ok(value),
            Ok(_) => Err(FinqueryError::Config(format!("{} is empty", var))),
            Err(_) => Err(FinqueryError::Config(format!("{} is not set", var))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_collections_have_distinct_widths() {
        let settings = Settings::default();
        assert_eq!(settings.collections.press_releases.dimensions, 768);
        assert_eq!(settings.collections.sec_reports.dimensions, 1536);
        assert_eq!(
            settings.collections.get(Collection::SecReports).rpc_function,
            "vector_search"
        );
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let toml_str = r#"
[llm]
model = "gemini-2.0-flash"

[structured]
tables = ["uploaded_table"]
schema = ""
"#;
        let settings: Settings = toml::from_str(toml_str).unwrap();
        assert_eq!(settings.llm.model, "gemini-2.0-flash");
        assert!((settings.llm.temperature - 0.1).abs() < f32::EPSILON);
        assert_eq!(settings.structured.tables, vec!["uploaded_table".to_string()]);
        assert!(settings.structured.schema.is_empty());
        assert_eq!(settings.collections.press_releases.match_count, 20);
        assert_eq!(settings.routing.press_keywords.len(), 7);
    }

    #[test]
    fn test_save_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut settings = Settings::default();
        settings.vector_store.provider = VectorStoreProvider::Sqlite;
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.vector_store.provider, VectorStoreProvider::Sqlite);
        assert_eq!(loaded.collections.sec_reports.chunk_size, 1000);
    }

    #[test]
    fn test_provider_parsing() {
        assert_eq!("Google".parse::<EmbeddingProvider>().unwrap(), EmbeddingProvider::Gemini);
        assert_eq!("sqlite".parse::<VectorStoreProvider>().unwrap(), VectorStoreProvider::Sqlite);
        assert!("pinecone".parse::<VectorStoreProvider>().is_err());
    }

    #[test]
    fn test_missing_credential_is_config_error() {
        let err = Settings::credential("FINQUERY_TEST_SURELY_UNSET_VAR").unwrap_err();
        assert!(matches!(err, FinqueryError::Config(_)));
    }
}
