//! Interactive chat command.

use crate::backends::Backends;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::session::{ChatSession, Role};
use console::style;
use std::io::{self, BufRead, Write};

/// Run the interactive chat command.
pub async fn run_chat(settings: Settings) -> anyhow::Result<()> {
    // Pre-flight checks
    if let Err(e) = preflight::check(Operation::Ask, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'finquery doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let company = settings.prompts.variables.get("company").cloned();
    let backends = Backends::from_settings(settings)?;
    let assistant = backends.assistant()?;
    let mut session = ChatSession::new();

    let title = match company {
        Some(company) => format!("Financial Assistant: {}", company),
        None => "Financial Assistant".to_string(),
    };
    println!("\n{}", style(title).bold().cyan());
    println!(
        "{}\n",
        style("Ask about press releases, SEC filings or property financials. Type 'history' to review, 'clear' to reset, 'exit' to quit.").dim()
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{} ", style("You:").green().bold());
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }

        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            Output::info("Goodbye!");
            break;
        }

        if input.eq_ignore_ascii_case("clear") {
            session.clear();
            Output::info("Conversation history cleared.");
            continue;
        }

        if input.eq_ignore_ascii_case("history") {
            print_history(&session);
            continue;
        }

        session.record_user(input);

        let spinner = Output::spinner("Thinking...");
        let result = assistant.ask(input).await;
        spinner.finish_and_clear();

        match result {
            Ok(answer) => {
                println!("\n{} {}", style("Assistant:").cyan().bold(), answer.text);
                println!("{}\n", style(format!("Source: {}", answer.source_info)).dim());
                session.record_assistant(&answer);
            }
            Err(e) => {
                Output::error(&format!("Error: {}", e));
            }
        }
    }

    Ok(())
}

fn print_history(session: &ChatSession) {
    if session.is_empty() {
        Output::info("No messages yet.");
        return;
    }

    Output::header(&format!("History ({} messages)", session.len()));
    for turn in session.turns() {
        let time = turn.at.format("%H:%M:%S").to_string();
        match turn.role {
            Role::User => println!(
                "{} {} {}",
                style(time).dim(),
                style("You:").green().bold(),
                turn.content
            ),
            Role::Assistant => {
                println!(
                    "{} {} {}",
                    style(time).dim(),
                    style("Assistant:").cyan().bold(),
                    turn.content
                );
                if let Some(source) = &turn.source {
                    println!("         {}", style(source).dim());
                }
            }
        }
    }
    println!();
}
