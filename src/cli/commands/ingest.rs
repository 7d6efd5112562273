//! Ingest command implementation.

use crate::backends::CollectionBackend;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::ingest::{load_path, Ingestor};
use crate::vector_store::Collection;
use anyhow::Result;
use std::path::Path;

/// Run the ingest command.
pub async fn run_ingest(path: &str, collection: Collection, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Retrieve, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'finquery doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let documents = load_path(Path::new(path))?;
    if documents.is_empty() {
        Output::warning(&format!("No documents with content found in {}", path));
        return Ok(());
    }

    let backend = CollectionBackend::from_settings(&settings, collection)?;
    let ingestor = Ingestor::new(
        collection,
        settings.collections.get(collection),
        backend.embedder,
        backend.store,
    )?
    .with_embed_batch_size(settings.embedding.batch_size);

    let pb = Output::progress_bar(documents.len() as u64, "Indexing...");
    let mut indexed = 0;
    let mut replaced = 0;
    let mut failed = 0;

    for document in &documents {
        pb.set_message(document.source_url.clone());
        match ingestor.ingest(document).await {
            Ok(result) => {
                indexed += result.chunks_indexed;
                replaced += result.chunks_replaced;
            }
            Err(e) => {
                failed += 1;
                pb.suspend(|| {
                    Output::warning(&format!("Failed to index {}: {}", document.source_url, e))
                });
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    Output::success(&format!(
        "Indexed {} chunks from {} documents into {}",
        indexed,
        documents.len() - failed,
        collection
    ));
    if replaced > 0 {
        Output::kv("Replaced chunks", &replaced.to_string());
    }
    if failed > 0 {
        Output::warning(&format!("{} documents failed", failed));
    }

    Ok(())
}
