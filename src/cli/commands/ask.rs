//! Ask command implementation.

use crate::backends::Backends;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::router::RouteLabel;
use anyhow::Result;

/// Run the ask command.
pub async fn run_ask(
    question: &str,
    route: Option<RouteLabel>,
    json: bool,
    settings: Settings,
) -> Result<()> {
    // Pre-flight checks
    if let Err(e) = preflight::check(Operation::Ask, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'finquery doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let backends = Backends::from_settings(settings)?;
    let assistant = backends.assistant()?;

    let spinner = Output::spinner("Thinking...");
    let result = match route {
        Some(route) => assistant.ask_with_route(question, route).await,
        None => assistant.ask(question).await,
    };
    spinner.finish_and_clear();

    let answer = match result {
        Ok(answer) => answer,
        Err(e) => {
            Output::error(&format!("Failed to answer: {}", e));
            return Err(e.into());
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
        return Ok(());
    }

    Output::answer(&answer);

    if !answer.sources.is_empty() {
        Output::header("Sources");
        for (i, chunk) in answer.sources.iter().enumerate() {
            Output::chunk(i + 1, chunk);
        }
    }

    Ok(())
}
