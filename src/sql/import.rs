//! CSV import into the structured store.

use super::check_identifier;
use crate::error::{FinqueryError, Result};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::io::Read;
use tracing::{info, instrument};

/// Number of rows returned as a preview after an import.
const PREVIEW_ROWS: usize = 10;

/// Result of importing a CSV file.
#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub table: String,
    /// Column names with their inferred SQLite types.
    pub columns: Vec<(String, String)>,
    pub rows_imported: usize,
    /// First rows of the imported data as column -> value objects.
    pub preview: Vec<Map<String, Value>>,
}

impl ImportSummary {
    /// Column names joined with ", ".
    pub fn schema(&self) -> String {
        self.columns
            .iter()
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    fn sql_name(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }

    /// Narrowest type that holds every non-empty value.
    fn infer<'a>(values: impl Iterator<Item = &'a str>) -> Self {
        let mut inferred = ColumnType::Integer;
        let mut seen = false;

        for value in values.map(str::trim).filter(|v| !v.is_empty()) {
            seen = true;
            if inferred == ColumnType::Integer && value.parse::<i64>().is_err() {
                inferred = ColumnType::Real;
            }
            if inferred == ColumnType::Real && value.parse::<f64>().is_err() {
                return ColumnType::Text;
            }
        }

        if seen {
            inferred
        } else {
            ColumnType::Text
        }
    }

    fn convert(&self, raw: &str) -> SqlValue {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return SqlValue::Null;
        }
        match self {
            ColumnType::Integer => trimmed
                .parse::<i64>()
                .map(SqlValue::Integer)
                .unwrap_or(SqlValue::Null),
            ColumnType::Real => trimmed
                .parse::<f64>()
                .map(SqlValue::Real)
                .unwrap_or(SqlValue::Null),
            ColumnType::Text => SqlValue::Text(raw.to_string()),
        }
    }
}

fn to_json(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(i) => Value::from(*i),
        SqlValue::Real(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        SqlValue::Text(s) => Value::String(s.clone()),
        SqlValue::Blob(b) => Value::String(format!("<{} bytes>", b.len())),
    }
}

/// Normalize a CSV header: trim, spaces to underscores, lowercase.
pub(crate) fn normalize_header(raw: &str, position: usize) -> String {
    let name = raw.trim().replace(' ', "_").to_lowercase();
    if name.is_empty() {
        format!("column_{}", position + 1)
    } else {
        name
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Load CSV data into `table`, dropping any table of the same name first.
#[instrument(skip(conn, reader))]
pub fn import_csv<R: Read>(conn: &mut Connection, reader: R, table: &str) -> Result<ImportSummary> {
    check_identifier(table)?;

    let mut csv_reader = csv::Reader::from_reader(reader);
    let headers: Vec<String> = csv_reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| normalize_header(h, i))
        .collect();

    let mut seen = HashSet::new();
    for header in &headers {
        if !seen.insert(header.as_str()) {
            return Err(FinqueryError::InvalidInput(format!(
                "Duplicate column after normalization: {}",
                header
            )));
        }
    }

    let records: Vec<csv::StringRecord> = csv_reader.records().collect::<std::result::Result<_, _>>()?;

    let types: Vec<ColumnType> = (0..headers.len())
        .map(|i| ColumnType::infer(records.iter().map(|r| r.get(i).unwrap_or(""))))
        .collect();

    let column_defs: Vec<String> = headers
        .iter()
        .zip(&types)
        .map(|(name, ty)| format!("{} {}", quote(name), ty.sql_name()))
        .collect();

    let tx = conn.transaction()?;
    tx.execute_batch(&format!(
        "DROP TABLE IF EXISTS {table}; CREATE TABLE {table} ({});",
        column_defs.join(", "),
        table = table
    ))?;

    let mut preview = Vec::new();
    {
        let placeholders: Vec<String> = (1..=headers.len()).map(|i| format!("?{}", i)).collect();
        let mut stmt = tx.prepare(&format!(
            "INSERT INTO {} VALUES ({})",
            table,
            placeholders.join(", ")
        ))?;

        for record in &records {
            let values: Vec<SqlValue> = types
                .iter()
                .enumerate()
                .map(|(i, ty)| ty.convert(record.get(i).unwrap_or("")))
                .collect();

            if preview.len() < PREVIEW_ROWS {
                preview.push(
                    headers
                        .iter()
                        .cloned()
                        .zip(values.iter().map(to_json))
                        .collect::<Map<String, Value>>(),
                );
            }

            stmt.execute(params_from_iter(values.iter()))?;
        }
    }
    tx.commit()?;

    info!("Imported {} rows into {}", records.len(), table);

    Ok(ImportSummary {
        table: table.to_string(),
        columns: headers
            .into_iter()
            .zip(types.iter().map(|t| t.sql_name().to_string()))
            .collect(),
        rows_imported: records.len(),
        preview,
    })
}
