//! Pre-flight checks before expensive operations.
//!
//! Validates that credentials and local databases are available
//! before starting operations that would otherwise fail midway.

use crate::config::{Settings, VectorStoreProvider};
use crate::error::{FinqueryError, Result};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Answering needs the LLM, the embedder and the vector store.
    Ask,
    /// Searching or ingesting needs the embedder and the vector store.
    Retrieve,
    /// Listing sources needs only the vector store.
    List,
    /// Text-to-SQL needs the LLM and the structured database.
    Sql,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Ask => {
            check_llm(settings)?;
            check_embedding(settings)?;
            check_vector_store(settings)?;
            check_structured_db(settings)?;
        }
        Operation::Retrieve => {
            check_embedding(settings)?;
            check_vector_store(settings)?;
        }
        Operation::List => check_vector_store(settings)?,
        Operation::Sql => {
            check_llm(settings)?;
            check_structured_db(settings)?;
        }
    }
    Ok(())
}

fn check_llm(settings: &Settings) -> Result<()> {
    check_env(&settings.llm.api_key_env)
}

fn check_embedding(settings: &Settings) -> Result<()> {
    check_env(&settings.embedding.api_key_env)
}

fn check_vector_store(settings: &Settings) -> Result<()> {
    if settings.vector_store.provider == VectorStoreProvider::Supabase {
        check_env(&settings.vector_store.supabase_url_env)?;
        check_env(&settings.vector_store.supabase_key_env)?;
    }
    Ok(())
}

fn check_structured_db(settings: &Settings) -> Result<()> {
    let path = settings.structured_sqlite_path();
    if path.exists() {
        Ok(())
    } else {
        Err(FinqueryError::Config(format!(
            "Structured database not found at {}. Import data with: finquery import <file.csv> --table <name>",
            path.display()
        )))
    }
}

/// Check that an environment variable holds a non-empty value.
fn check_env(var: &str) -> Result<()> {
    Settings::credential(var)
        .map(|_| ())
        .map_err(|e| FinqueryError::Config(format!("{}. Set it with: export {}='...'", e, var)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_with_sqlite_provider_has_no_requirements() {
        let mut settings = Settings::default();
        settings.vector_store.provider = VectorStoreProvider::Sqlite;
        assert!(check(Operation::List, &settings).is_ok());
    }

    #[test]
    fn test_missing_credential_is_reported_by_name() {
        let mut settings = Settings::default();
        settings.vector_store.supabase_url_env = "FINQUERY_TEST_UNSET_SUPABASE_URL".to_string();

        let err = check(Operation::List, &settings).unwrap_err().to_string();
        assert!(err.contains("FINQUERY_TEST_UNSET_SUPABASE_URL"));
    }

    #[test]
    fn test_missing_structured_database() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.llm.api_key_env = "PATH".to_string();
        settings.structured.sqlite_path = dir.path().join("absent.db").display().to_string();

        assert!(matches!(
            check(Operation::Sql, &settings),
            Err(FinqueryError::Config(_))
        ));
    }
}
