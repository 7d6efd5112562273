//! Error types for finquery.

use crate::sql::SqlRejection;
use thiserror::Error;

/// Library-level error type for finquery operations.
#[derive(Error, Debug)]
pub enum FinqueryError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Malformed LLM output: {0}")]
    MalformedOutput(String),

    #[error("SQL rejected: {0}")]
    SqlRejected(#[from] SqlRejection),

    #[error("SQL execution failed: {0}")]
    Sql(String),

    #[error("Ingestion error: {0}")]
    Ingest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for finquery operations.
pub type Result<T> = std::result::Result<T, FinqueryError>;
