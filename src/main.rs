//! finquery CLI entry point.

use anyhow::Result;
use clap::Parser;
use finquery::cli::{commands, Cli, Commands};
use finquery::config::Settings;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_path = cli.config.as_ref().map(PathBuf::from);
    let settings = Settings::load_from(config_path.as_ref())?;

    // Initialize logging
    let log_level = match cli.verbose {
        0 => settings.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("finquery={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    std::fs::create_dir_all(settings.data_dir())?;

    // Execute command
    match &cli.command {
        Commands::Doctor => {
            commands::run_doctor(&settings).await?;
        }

        Commands::Ask { question, route, json } => {
            commands::run_ask(question, *route, *json, settings).await?;
        }

        Commands::Chat => {
            commands::run_chat(settings).await?;
        }

        Commands::Search {
            query,
            collection,
            limit,
        } => {
            commands::run_search(query, *collection, *limit, settings).await?;
        }

        Commands::Sql { question, dry_run } => {
            commands::run_sql(question, *dry_run, settings).await?;
        }

        Commands::Import { file, table } => {
            commands::run_import(file, table, &settings)?;
        }

        Commands::Ingest { path, collection } => {
            commands::run_ingest(path, *collection, settings).await?;
        }

        Commands::List { collection } => {
            commands::run_list(*collection, settings).await?;
        }

        Commands::Serve { host, port } => {
            commands::run_serve(host, *port, settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(action, config_path, settings)?;
        }
    }

    Ok(())
}
