//! List command implementation.

use crate::backends::open_vector_store;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::vector_store::Collection;
use anyhow::Result;
use console::style;

/// Run the list command.
pub async fn run_list(collection: Collection, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::List, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let store = open_vector_store(&settings, collection)?;
    let label = &settings.collections.get(collection).label;

    match store.list_sources().await {
        Ok(sources) => {
            if sources.is_empty() {
                Output::info(&format!(
                    "No {} indexed yet. Use 'finquery ingest <path> -C {}' to add content.",
                    label, collection
                ));
            } else {
                Output::header(&format!("{} ({})", label, sources.len()));
                println!();

                for source in &sources {
                    let date = source
                        .published_at
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| "undated".to_string());
                    let title = if source.title.is_empty() {
                        &source.source_url
                    } else {
                        &source.title
                    };
                    println!(
                        "  {} {} ({}, {}, {} chunks)",
                        style("*").cyan(),
                        Output::title_style().apply_to(title),
                        Output::dim_style().apply_to(&source.source_url),
                        date,
                        source.chunk_count
                    );
                }

                let total_chunks: u32 = sources.iter().map(|s| s.chunk_count).sum();
                println!();
                Output::kv("Total sources", &sources.len().to_string());
                Output::kv("Total chunks", &total_chunks.to_string());
            }
        }
        Err(e) => {
            Output::error(&format!("Failed to list {}: {}", label, e));
            return Err(e.into());
        }
    }

    Ok(())
}
