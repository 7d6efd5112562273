//! CLI output formatting utilities.

use crate::router::{Answer, AnswerOutcome};
use crate::sql::QueryResult;
use crate::vector_store::RetrievedChunk;
use console::{style, Style};
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a list item.
    pub fn list_item(msg: &str) {
        println!("  {} {}", style("*").cyan(), msg);
    }

    /// Print an answer followed by where it came from.
    pub fn answer(answer: &Answer) {
        let text = match answer.outcome {
            AnswerOutcome::Answered => style(answer.text.as_str()),
            AnswerOutcome::NoResults => style(answer.text.as_str()).yellow(),
            _ => style(answer.text.as_str()).red(),
        };
        println!("\n{}\n", text);
        println!(
            "{} {} {}",
            style("Source:").dim(),
            answer.source_info,
            style(format!("[{}]", answer.route)).dim()
        );
        if let Some(sql) = &answer.sql {
            println!("{} {}", style("SQL:").dim(), style(sql).cyan());
        }
    }

    /// Print one retrieved chunk.
    pub fn chunk(rank: usize, chunk: &RetrievedChunk) {
        println!(
            "\n{} {} (similarity: {:.2})",
            style(format!("[{}]", rank)).green(),
            style(chunk.citation()).bold(),
            chunk.similarity
        );
        println!("   {}", content_preview(&chunk.content, 200));
    }

    /// Print query rows as a simple aligned table.
    pub fn rows(result: &QueryResult, max_rows: usize) {
        if result.columns.is_empty() {
            return;
        }

        let cells: Vec<Vec<String>> = result
            .rows
            .iter()
            .take(max_rows)
            .map(|row| row.iter().map(cell_text).collect())
            .collect();

        let widths: Vec<usize> = result
            .columns
            .iter()
            .enumerate()
            .map(|(i, name)| {
                cells
                    .iter()
                    .filter_map(|row| row.get(i))
                    .map(|c| c.chars().count())
                    .chain(std::iter::once(name.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let header: Vec<String> = result
            .columns
            .iter()
            .zip(&widths)
            .map(|(name, w)| format!("{:<w$}", name, w = *w))
            .collect();
        println!("  {}", style(header.join("  ")).bold());

        for row in &cells {
            let line: Vec<String> = row
                .iter()
                .zip(&widths)
                .map(|(cell, w)| format!("{:<w$}", cell, w = *w))
                .collect();
            println!("  {}", line.join("  "));
        }

        if result.len() > max_rows {
            println!("  {}", style(format!("... {} more rows", result.len() - max_rows)).dim());
        }
    }

    /// Create a progress bar.
    pub fn progress_bar(len: u64, msg: &str) -> ProgressBar {
        let pb = ProgressBar::new(len);
        if let Ok(bar_style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(bar_style.progress_chars("#>-"));
        }
        pb.set_message(msg.to_string());
        pb
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(spinner_style);
        }
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }

    /// Style for titles.
    pub fn title_style() -> Style {
        Style::new().bold()
    }

    /// Style for dim text.
    pub fn dim_style() -> Style {
        Style::new().dim()
    }
}

fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "NULL".to_string(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Truncate content with ellipsis.
fn content_preview(content: &str, max_chars: usize) -> String {
    let content = content.replace('\n', " ");
    if content.chars().count() <= max_chars {
        content
    } else {
        let head: String = content.chars().take(max_chars).collect();
        format!("{}...", head)
    }
}
