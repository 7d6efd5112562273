//! Relational store that executes validated queries.

use super::{check_identifier, import, ImportSummary, QueryResult, ValidatedSql};
use crate::error::{FinqueryError, Result};
use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde_json::{Number, Value};
use std::io::Read;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

/// Trait for stores that can run read-only queries.
#[async_trait]
pub trait SqlStore: Send + Sync {
    /// Execute a validated query and return every row.
    async fn query(&self, sql: &ValidatedSql) -> Result<QueryResult>;

    /// Column names of a table, in declaration order.
    async fn table_columns(&self, table: &str) -> Result<Vec<String>>;

    /// Number of rows in a table.
    async fn row_count(&self, table: &str) -> Result<usize>;
}

/// Describe tables for the SQL prompt, one line per table.
pub async fn describe_tables(store: &dyn SqlStore, tables: &[String]) -> Result<String> {
    let mut lines = Vec::with_capacity(tables.len());
    for table in tables {
        let columns = store.table_columns(table).await?;
        lines.push(format!("Table name: {}, Columns: {}", table, columns.join(", ")));
    }
    Ok(lines.join("\n"))
}

/// SQLite-backed relational store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        info!("Opened structured database at {:?}", path);
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory database (useful for testing).
    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| FinqueryError::Sql(format!("Failed to acquire lock: {}", e)))
    }

    /// Run trusted setup statements (schema creation, fixtures).
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.lock()?.execute_batch(sql)?;
        Ok(())
    }

    /// Load a CSV file into `table`, replacing any previous contents.
    pub fn import_csv<R: Read>(&self, reader: R, table: &str) -> Result<ImportSummary> {
        let mut conn = self.lock()?;
        import::import_csv(&mut conn, reader, table)
    }

    fn to_json(value: ValueRef<'_>) -> Value {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::from(i),
            ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
            ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Blob(bytes) => Value::String(format!("<{} bytes>", bytes.len())),
        }
    }
}

#[async_trait]
impl SqlStore for SqliteStore {
    #[instrument(skip(self, sql), fields(sql = %sql))]
    async fn query(&self, sql: &ValidatedSql) -> Result<QueryResult> {
        let conn = self.lock()?;
        let sql_error = |e: rusqlite::Error| FinqueryError::Sql(e.to_string());

        let mut stmt = conn.prepare(sql.as_str()).map_err(sql_error)?;
        if !stmt.readonly() {
            return Err(FinqueryError::Sql(
                "refusing to run a statement that modifies the database".to_string(),
            ));
        }

        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let width = columns.len();

        let mut rows = stmt.query([]).map_err(sql_error)?;
        let mut result_rows = Vec::new();
        while let Some(row) = rows.next().map_err(sql_error)? {
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                values.push(Self::to_json(row.get_ref(i).map_err(sql_error)?));
            }
            result_rows.push(values);
        }

        debug!("Query returned {} rows", result_rows.len());
        Ok(QueryResult {
            columns,
            rows: result_rows,
        })
    }

    async fn table_columns(&self, table: &str) -> Result<Vec<String>> {
        check_identifier(table)?;
        let conn = self.lock()?;

        let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
        let columns: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .filter_map(|c| c.ok())
            .collect();

        if columns.is_empty() {
            return Err(FinqueryError::Sql(format!("no such table: {}", table)));
        }
        Ok(columns)
    }

    async fn row_count(&self, table: &str) -> Result<usize> {
        check_identifier(table)?;
        let conn = self.lock()?;

        let count: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
            .map_err(|e| FinqueryError::Sql(e.to_string()))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::SqlValidator;
    use serde_json::json;

    fn fixture() -> SqliteStore {
        let store = SqliteStore::in_memory().unwrap();
        store
            .execute_batch(
                r#"
                CREATE TABLE properties (property_id INTEGER, property_name TEXT, metro_area TEXT);
                CREATE TABLE financials (property_id INTEGER, year INTEGER, revenue REAL);
                INSERT INTO properties VALUES (1, 'Alpha Park', 'Dallas'), (2, 'Beta Yard', 'Reno');
                INSERT INTO financials VALUES (1, 2023, 1500.5), (2, 2023, NULL);
                "#,
            )
            .unwrap();
        store
    }

    fn tables() -> Vec<String> {
        vec!["properties".to_string(), "financials".to_string()]
    }

    #[tokio::test]
    async fn test_query_returns_typed_values() {
        let store = fixture();
        let sql = SqlValidator::new(&tables())
            .unwrap()
            .validate("SELECT p.property_name, f.revenue FROM properties p JOIN financials f ON p.property_id = f.property_id ORDER BY p.property_id")
            .unwrap();

        let result = store.query(&sql).await.unwrap();
        assert_eq!(result.columns, vec!["property_name", "revenue"]);
        assert_eq!(result.rows[0], vec![json!("Alpha Park"), json!(1500.5)]);
        assert_eq!(result.rows[1], vec![json!("Beta Yard"), Value::Null]);
    }

    #[tokio::test]
    async fn test_database_errors_carry_message() {
        let store = fixture();
        let sql = SqlValidator::new(&tables())
            .unwrap()
            .validate("SELECT missing_column FROM properties")
            .unwrap();

        let err = store.query(&sql).await.unwrap_err();
        match err {
            FinqueryError::Sql(message) => assert!(message.contains("missing_column")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_describe_tables_uses_introspection() {
        let store = fixture();
        let schema = describe_tables(&store, &tables()).await.unwrap();
        assert_eq!(
            schema,
            "Table name: properties, Columns: property_id, property_name, metro_area\n\
             Table name: financials, Columns: property_id, year, revenue"
        );

        assert!(store.table_columns("nope").await.is_err());
        assert_eq!(store.row_count("properties").await.unwrap(), 2);
    }
}
