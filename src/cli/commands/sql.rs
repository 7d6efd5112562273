//! SQL command implementation.

use crate::backends::structured_agent;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;

/// Rows printed to the terminal.
const MAX_DISPLAY_ROWS: usize = 50;

/// Run the sql command.
pub async fn run_sql(question: &str, dry_run: bool, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Sql, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'finquery doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let agent = structured_agent(&settings)?;

    let spinner = Output::spinner("Generating SQL...");
    let result = if dry_run {
        match agent.schema_description().await {
            Ok(schema) => agent.generate_sql(question, &schema).await.map(|sql| (sql, None)),
            Err(e) => Err(e),
        }
    } else {
        agent
            .generate_and_run(question)
            .await
            .map(|(sql, rows)| (sql, Some(rows)))
    };
    spinner.finish_and_clear();

    let (sql, rows) = match result {
        Ok(generated) => generated,
        Err(e) => {
            Output::error(&format!("{}", e));
            return Err(e.into());
        }
    };

    Output::kv("SQL", sql.as_str());

    if let Some(rows) = rows {
        println!();
        if rows.is_empty() {
            Output::warning("Query returned no rows.");
        } else {
            Output::rows(&rows, MAX_DISPLAY_ROWS);
            println!();
            Output::kv("Rows", &rows.len().to_string());
        }
    }

    Ok(())
}
