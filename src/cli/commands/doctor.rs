//! Doctor command - verify credentials, databases and configuration.

use crate::cli::Output;
use crate::config::{Settings, VectorStoreProvider};
use crate::sql::{SqlStore, SqliteStore};
use console::style;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub async fn run_doctor(settings: &Settings) -> anyhow::Result<()> {
    Output::header("finquery Doctor");
    println!();
    println!("Checking credentials, databases and configuration...\n");

    let mut checks = Vec::new();

    println!("{}", style("Credentials").bold());
    let mut vars = vec![settings.llm.api_key_env.clone()];
    if settings.embedding.api_key_env != settings.llm.api_key_env {
        vars.push(settings.embedding.api_key_env.clone());
    }
    if settings.vector_store.provider == VectorStoreProvider::Supabase {
        vars.push(settings.vector_store.supabase_url_env.clone());
        vars.push(settings.vector_store.supabase_key_env.clone());
    }
    for var in &vars {
        let check = check_env(var, std::env::var(var).ok().as_deref());
        check.print();
        checks.push(check);
    }

    println!();

    println!("{}", style("Databases").bold());
    let db_checks = check_databases(settings).await;
    for check in &db_checks {
        check.print();
    }
    checks.extend(db_checks);

    println!();

    println!("{}", style("Configuration").bold());
    let config_check = check_config_file();
    config_check.print();
    checks.push(config_check);
    Output::kv("LLM", &format!("{} ({})", settings.llm.model, settings.llm.api_base));
    Output::kv("Embeddings", &settings.embedding.provider.to_string());
    Output::kv("Vector store", &settings.vector_store.provider.to_string());

    println!();

    // Summary
    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before using finquery.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! finquery is ready to use.");
    }

    Ok(())
}

/// Check a credential variable, masking its value.
fn check_env(name: &str, value: Option<&str>) -> CheckResult {
    let hint = format!("Set with: export {}='...'", name);
    match value.map(str::trim) {
        Some(v) if v.is_empty() => CheckResult::error(name, "empty", &hint),
        Some(v) if v.len() > 12 && v.is_ascii() => {
            let masked = format!("{}...{}", &v[..4], &v[v.len() - 4..]);
            CheckResult::ok(name, &format!("configured ({})", masked))
        }
        Some(_) => CheckResult::ok(name, "configured"),
        None => CheckResult::error(name, "not set", &hint),
    }
}

/// Check the structured database and its allowed tables.
async fn check_databases(settings: &Settings) -> Vec<CheckResult> {
    let mut results = Vec::new();

    let db_path = settings.structured_sqlite_path();
    if !db_path.exists() {
        results.push(CheckResult::error(
            "Structured database",
            &format!("{} (not found)", db_path.display()),
            "Create it with: finquery import <file.csv> --table <name>",
        ));
    } else {
        match SqliteStore::new(&db_path) {
            Ok(store) => {
                results.push(CheckResult::ok(
                    "Structured database",
                    &db_path.display().to_string(),
                ));
                for table in &settings.structured.tables {
                    results.push(match store.row_count(table).await {
                        Ok(rows) => CheckResult::ok(&format!("Table {}", table), &format!("{} rows", rows)),
                        Err(e) => CheckResult::warning(
                            &format!("Table {}", table),
                            &e.to_string(),
                            "Import it, or remove it from structured.tables",
                        ),
                    });
                }
            }
            Err(e) => results.push(CheckResult::error(
                "Structured database",
                &e.to_string(),
                "Check the structured.sqlite_path setting",
            )),
        }
    }

    if settings.vector_store.provider == VectorStoreProvider::Sqlite {
        let vector_path = settings.vector_sqlite_path();
        if vector_path.exists() {
            results.push(CheckResult::ok("Vector database", &vector_path.display().to_string()));
        } else {
            results.push(CheckResult::warning(
                "Vector database",
                &format!("{} (not created yet)", vector_path.display()),
                "Index documents with: finquery ingest <path> -C <collection>",
            ));
        }
    }

    results
}

/// Check if config file exists.
fn check_config_file() -> CheckResult {
    let config_path = Settings::default_config_path();
    if config_path.exists() {
        CheckResult::ok("Config file", &format!("{}", config_path.display()))
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: finquery config edit",
        )
    }
}
