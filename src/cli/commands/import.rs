//! Import command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::sql::SqliteStore;
use anyhow::{Context, Result};
use std::fs::File;
use std::path::Path;

/// Run the import command.
pub fn run_import(file: &str, table: &str, settings: &Settings) -> Result<()> {
    let path = Path::new(file);
    let reader = File::open(path).with_context(|| format!("Cannot open {}", path.display()))?;

    let store = SqliteStore::new(&settings.structured_sqlite_path())?;

    let spinner = Output::spinner(&format!("Importing {} into {}...", path.display(), table));
    let result = store.import_csv(reader, table);
    spinner.finish_and_clear();

    let summary = match result {
        Ok(summary) => summary,
        Err(e) => {
            Output::error(&format!("Import failed: {}", e));
            return Err(e.into());
        }
    };

    Output::success(&format!(
        "Imported {} rows into '{}'",
        summary.rows_imported, summary.table
    ));

    Output::header("Schema");
    for (name, sql_type) in &summary.columns {
        Output::kv(name, sql_type);
    }

    if !summary.preview.is_empty() {
        Output::header(&format!("Preview ({} rows)", summary.preview.len()));
        for row in &summary.preview {
            Output::list_item(&serde_json::to_string(row)?);
        }
    }

    if !settings.structured.tables.iter().any(|t| t == &summary.table) {
        println!();
        Output::info(&format!(
            "Add \"{}\" to structured.tables in the config to query it.",
            summary.table
        ));
    }

    Ok(())
}
