//! Search command implementation.

use crate::backends::CollectionBackend;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::vector_store::Collection;
use anyhow::Result;

/// Run the search command.
pub async fn run_search(
    query: &str,
    collection: Collection,
    limit: Option<usize>,
    settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Retrieve, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'finquery doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let backend = CollectionBackend::from_settings(&settings, collection)?;
    let coll = settings.collections.get(collection);

    let spinner = Output::spinner(&format!("Searching {}...", coll.label));
    let results = async {
        let embedding = backend.embedder.embed(query).await?;
        backend
            .store
            .search(
                &embedding,
                coll.similarity_threshold,
                limit.unwrap_or(coll.match_count),
            )
            .await
    }
    .await;
    spinner.finish_and_clear();

    match results {
        Ok(chunks) => {
            if chunks.is_empty() {
                Output::warning(&coll.empty_message);
            } else {
                Output::success(&format!(
                    "Found {} {} in {}",
                    chunks.len(),
                    coll.unit,
                    coll.label
                ));

                for (i, chunk) in chunks.iter().enumerate() {
                    Output::chunk(i + 1, chunk);
                }
            }
        }
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
