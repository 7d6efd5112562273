//! Text-to-SQL over the relational store.
//!
//! Generated SQL passes through [`SqlValidator`] before it can reach a
//! [`SqlStore`]: the store only accepts a [`ValidatedSql`], which nothing
//! outside this module can construct.

mod agent;
mod import;
mod store;
mod validate;

pub use agent::{SqlAgent, StructuredAnswer};
pub use import::{import_csv, ImportSummary};
pub use store::{describe_tables, SqlStore, SqliteStore};
pub use validate::{clean_sql, validate_sql, SqlValidator};

use crate::error::{FinqueryError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Why a generated query was refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SqlRejection {
    #[error("the generated query is empty")]
    Empty,

    #[error("the generator reported an error instead of a query")]
    GenerationFailed,

    #[error("queries must start with SELECT or WITH, got {0:?}")]
    DisallowedVerb(String),

    #[error("the query has no FROM clause")]
    MissingFrom,

    #[error("the query contains the forbidden keyword {0:?}")]
    ForbiddenKeyword(String),

    #[error("only a single statement is allowed")]
    MultipleStatements,

    #[error("the query does not reference any of: {0}")]
    UnknownTable(String),

    #[error("the query reads {0:?}, which is not an allowed table")]
    UnlistedTable(String),
}

/// SQL that passed the read-only allowlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidatedSql(String);

impl ValidatedSql {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for ValidatedSql {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rows returned by a query, in column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Rows as column -> value objects.
    pub fn records(&self) -> Vec<Map<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect::<Map<String, Value>>()
            })
            .collect()
    }

    /// One JSON object per line, at most `max_rows` lines.
    pub fn to_text(&self, max_rows: usize) -> String {
        let mut lines: Vec<String> = self
            .rows
            .iter()
            .take(max_rows)
            .map(|row| {
                let fields: Vec<String> = self
                    .columns
                    .iter()
                    .zip(row.iter())
                    .map(|(col, value)| format!("{}: {}", Value::String(col.clone()), value))
                    .collect();
                format!("{{{}}}", fields.join(", "))
            })
            .collect();

        if self.rows.len() > max_rows {
            lines.push(format!("... {} more rows", self.rows.len() - max_rows));
        }
        lines.join("\n")
    }
}

/// Check that a name is a plain SQL identifier (letters, digits, underscore).
pub fn check_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(FinqueryError::InvalidInput(format!(
            "'{}' is not a valid table name",
            name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_check_identifier() {
        assert!(check_identifier("uploaded_table").is_ok());
        assert!(check_identifier("_t1").is_ok());
        assert!(check_identifier("1t").is_err());
        assert!(check_identifier("").is_err());
        assert!(check_identifier("a b").is_err());
        assert!(check_identifier("t;drop").is_err());
    }

    #[test]
    fn test_rows_keep_column_order() {
        let result = QueryResult {
            columns: vec!["year".into(), "revenue".into()],
            rows: vec![vec![json!(2023), json!(1250000.5)], vec![json!(2022), Value::Null]],
        };

        assert_eq!(
            result.to_text(10),
            "{\"year\": 2023, \"revenue\": 1250000.5}\n{\"year\": 2022, \"revenue\": null}"
        );
        assert_eq!(result.records()[0]["revenue"], json!(1250000.5));
    }

    #[test]
    fn test_row_text_is_capped() {
        let result = QueryResult {
            columns: vec!["n".into()],
            rows: (0..5).map(|i| vec![json!(i)]).collect(),
        };
        let text = result.to_text(2);
        assert_eq!(text.lines().count(), 3);
        assert!(text.ends_with("... 3 more rows"));
    }
}
