//! Text-to-SQL question answering.

use super::{describe_tables, QueryResult, SqlStore, SqlValidator, ValidatedSql};
use crate::config::{Prompts, StructuredSettings};
use crate::error::{FinqueryError, Result};
use crate::llm::LanguageModel;
use crate::router::{AnswerOutcome, AnswerSynthesizer};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

const INVALID_QUERY: &str = "Sorry, I couldn't generate a valid SQL query for your question.";
const NO_ROWS: &str = "No matching results were found in the database.";
const GENERATION_FAILURE: &str =
    "Sorry, I couldn't process your query about financial/property data.";

/// Outcome of answering a question with SQL.
#[derive(Debug, Clone, Serialize)]
pub struct StructuredAnswer {
    pub text: String,
    pub outcome: AnswerOutcome,
    /// The query that was executed, when one passed validation.
    pub sql: Option<String>,
    pub row_count: usize,
}

impl StructuredAnswer {
    fn new(text: impl Into<String>, outcome: AnswerOutcome, sql: Option<&ValidatedSql>) -> Self {
        Self {
            text: text.into(),
            outcome,
            sql: sql.map(|s| s.to_string()),
            row_count: 0,
        }
    }
}

/// Generates, validates and runs SQL for a question.
pub struct SqlAgent {
    llm: Arc<dyn LanguageModel>,
    store: Arc<dyn SqlStore>,
    validator: SqlValidator,
    prompts: Arc<Prompts>,
    synthesizer: AnswerSynthesizer,
    schema: Option<String>,
    json_mode: bool,
    max_rows: usize,
}

impl SqlAgent {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        store: Arc<dyn SqlStore>,
        prompts: Arc<Prompts>,
        synthesizer: AnswerSynthesizer,
        settings: &StructuredSettings,
    ) -> Result<Self> {
        let schema = Some(settings.schema.trim().to_string()).filter(|s| !s.is_empty());

        Ok(Self {
            llm,
            store,
            validator: SqlValidator::new(&settings.tables)?,
            prompts,
            synthesizer,
            schema,
            json_mode: settings.json_mode,
            max_rows: settings.max_rows.max(1),
        })
    }

    pub fn store(&self) -> &Arc<dyn SqlStore> {
        &self.store
    }

    pub fn tables(&self) -> &[String] {
        self.validator.tables()
    }

    /// Schema text for the prompt: the configured description, or the
    /// introspected columns of the allowed tables.
    pub async fn schema_description(&self) -> Result<String> {
        match &self.schema {
            Some(schema) => Ok(schema.clone()),
            None => describe_tables(self.store.as_ref(), self.validator.tables()).await,
        }
    }

    /// Ask the LLM for SQL and validate it.
    #[instrument(skip(self, schema))]
    pub async fn generate_sql(&self, question: &str, schema: &str) -> Result<ValidatedSql> {
        let mut vars = HashMap::new();
        vars.insert("schema".to_string(), schema.to_string());
        vars.insert("tables".to_string(), self.validator.tables().join(", "));
        vars.insert("question".to_string(), question.to_string());

        let raw = if self.json_mode {
            let template = format!("{}{}", self.prompts.sql.generate, self.prompts.sql.json_suffix);
            let prompt = self.prompts.render_with_custom(&template, &vars);
            let value = self.llm.complete_json(&prompt).await?;
            value
                .get("sql")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .ok_or_else(|| {
                    FinqueryError::MalformedOutput("JSON response has no \"sql\" string".to_string())
                })?
        } else {
            let prompt = self.prompts.render_with_custom(&self.prompts.sql.generate, &vars);
            self.llm.complete(&prompt).await?
        };

        debug!("Generated SQL: {}", raw);
        Ok(self.validator.validate(&raw)?)
    }

    /// Generate SQL for `question`, run it and return the raw rows.
    #[instrument(skip(self))]
    pub async fn generate_and_run(&self, question: &str) -> Result<(ValidatedSql, QueryResult)> {
        let schema = self.schema_description().await?;
        let sql = self.generate_sql(question, &schema).await?;
        let rows = self.store.query(&sql).await?;
        Ok((sql, rows))
    }

    /// Answer `question` from the relational store. Failures become fixed messages.
    #[instrument(skip(self))]
    pub async fn answer(&self, question: &str) -> StructuredAnswer {
        let schema = match self.schema_description().await {
            Ok(schema) => schema,
            Err(e) => {
                warn!("Schema introspection failed: {}", e);
                return StructuredAnswer::new(database_error(&e), AnswerOutcome::DatabaseError, None);
            }
        };

        let sql = match self.generate_sql(question, &schema).await {
            Ok(sql) => sql,
            Err(e @ (FinqueryError::SqlRejected(_) | FinqueryError::MalformedOutput(_))) => {
                warn!("Rejected generated SQL: {}", e);
                return StructuredAnswer::new(INVALID_QUERY, AnswerOutcome::InvalidQuery, None);
            }
            Err(e) => {
                warn!("SQL generation failed: {}", e);
                return StructuredAnswer::new(GENERATION_FAILURE, AnswerOutcome::UpstreamError, None);
            }
        };

        info!("Running {}", sql);
        let rows = match self.store.query(&sql).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Query failed: {}", e);
                return StructuredAnswer::new(
                    database_error(&e),
                    AnswerOutcome::DatabaseError,
                    Some(&sql),
                );
            }
        };

        if rows.is_empty() {
            return StructuredAnswer::new(NO_ROWS, AnswerOutcome::NoResults, Some(&sql));
        }

        let text = self
            .synthesizer
            .summarize_rows(question, &rows.to_text(self.max_rows))
            .await;

        StructuredAnswer {
            row_count: rows.len(),
            ..StructuredAnswer::new(text, AnswerOutcome::Answered, Some(&sql))
        }
    }
}

fn database_error(error: &FinqueryError) -> String {
    let message = match error {
        FinqueryError::Sql(message) => message.clone(),
        other => other.to_string(),
    };
    format!("Database error occurred: {}", message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::SqliteStore;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::Mutex;

    /// Replies with queued responses; the last one repeats.
    struct ScriptedModel {
        replies: Mutex<Vec<Result<String>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let mut replies = self.replies.lock().unwrap();
            if replies.len() > 1 {
                replies.remove(0)
            } else {
                match &replies[0] {
                    Ok(text) => Ok(text.clone()),
                    Err(e) => Err(FinqueryError::Llm(e.to_string())),
                }
            }
        }
    }

    fn store() -> Arc<SqliteStore> {
        let store = SqliteStore::in_memory().unwrap();
        store
            .execute_batch(
                r#"
                CREATE TABLE properties (property_id INTEGER, property_name TEXT);
                CREATE TABLE financials (property_id INTEGER, year INTEGER, revenue REAL);
                INSERT INTO properties VALUES (1, 'X'), (2, 'Y');
                INSERT INTO financials VALUES (1, 2023, 1500.0), (2, 2023, 700.0);
                "#,
            )
            .unwrap();
        Arc::new(store)
    }

    fn agent(model: Arc<ScriptedModel>, settings: StructuredSettings) -> SqlAgent {
        let prompts = Arc::new(Prompts::default());
        let synthesizer = AnswerSynthesizer::new(model.clone(), prompts.clone());
        SqlAgent::new(model, store(), prompts, synthesizer, &settings).unwrap()
    }

    #[tokio::test]
    async fn test_answer_runs_query_and_summarizes() {
        let model = ScriptedModel::new(vec![
            Ok("```sql\nSELECT f.revenue FROM financials f JOIN properties p ON p.property_id = f.property_id WHERE p.property_name = 'X' AND f.year = 2023;\n```".to_string()),
            Ok("Property X earned $1,500 in 2023.".to_string()),
        ]);
        let agent = agent(model.clone(), StructuredSettings::default());

        let answer = agent.answer("total revenue for property X in 2023").await;
        assert_eq!(answer.outcome, AnswerOutcome::Answered);
        assert_eq!(answer.row_count, 1);
        assert_eq!(answer.text, "Property X earned $1,500 in 2023.");

        let prompts = model.prompts.lock().unwrap();
        assert!(prompts[0].contains("Table properties("));
        assert!(prompts[1].contains("{\"revenue\": 1500.0}"));
    }

    #[tokio::test]
    async fn test_rejected_sql_is_never_executed() {
        let model = ScriptedModel::new(vec![Ok("DROP TABLE properties".to_string())]);
        let agent = agent(model, StructuredSettings::default());

        let answer = agent.answer("delete everything").await;
        assert_eq!(answer.outcome, AnswerOutcome::InvalidQuery);
        assert_eq!(answer.text, INVALID_QUERY);
        assert_eq!(agent.store().row_count("properties").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_empty_rows_and_database_errors() {
        let model = ScriptedModel::new(vec![Ok(
            "SELECT * FROM financials WHERE year = 1999".to_string()
        )]);
        let answer = agent(model, StructuredSettings::default()).answer("revenue in 1999").await;
        assert_eq!(answer.outcome, AnswerOutcome::NoResults);
        assert_eq!(answer.text, NO_ROWS);

        let model = ScriptedModel::new(vec![Ok("SELECT nope FROM financials".to_string())]);
        let answer = agent(model, StructuredSettings::default()).answer("revenue?").await;
        assert_eq!(answer.outcome, AnswerOutcome::DatabaseError);
        assert!(answer.text.starts_with("Database error occurred: "));
        assert!(answer.text.contains("nope"));
    }

    #[tokio::test]
    async fn test_llm_failure_is_upstream_error() {
        let model = ScriptedModel::new(vec![Err(FinqueryError::Llm("timeout".to_string()))]);
        let answer = agent(model, StructuredSettings::default()).answer("revenue?").await;
        assert_eq!(answer.outcome, AnswerOutcome::UpstreamError);
        assert_eq!(answer.text, GENERATION_FAILURE);
    }

    #[tokio::test]
    async fn test_json_mode_and_introspected_schema() {
        let settings = StructuredSettings {
            schema: String::new(),
            json_mode: true,
            ..StructuredSettings::default()
        };

        let model = ScriptedModel::new(vec![Ok(
            r#"{"sql": "SELECT property_name FROM properties ORDER BY property_id"}"#.to_string(),
        )]);
        let (sql, rows) = agent(model.clone(), settings.clone())
            .generate_and_run("list properties")
            .await
            .unwrap();
        assert_eq!(sql.as_str(), "SELECT property_name FROM properties ORDER BY property_id");
        assert_eq!(rows.rows[0][0], Value::String("X".to_string()));

        let prompt = model.prompts.lock().unwrap()[0].clone();
        assert!(prompt.contains("Table name: properties, Columns: property_id, property_name"));
        assert!(prompt.contains("{\"sql\":"));

        let model = ScriptedModel::new(vec![Ok("SELECT * FROM properties".to_string())]);
        let err = agent(model, settings).generate_and_run("list").await.unwrap_err();
        assert!(matches!(err, FinqueryError::MalformedOutput(_)));
    }
}
