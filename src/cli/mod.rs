//! CLI module for finquery.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use crate::router::RouteLabel;
use crate::vector_store::Collection;
use clap::{Parser, Subcommand};

/// finquery - Financial Question Router
///
/// Answers questions about a company's finances from press releases, SEC
/// filings, or a relational database, picking the source for each question.
#[derive(Parser, Debug)]
#[command(name = "finquery")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check credentials, databases and configuration
    Doctor,

    /// Ask a single question
    Ask {
        /// The question to ask
        question: String,

        /// Skip classification and use this route
        /// (press_releases, sec_reports, structured_data)
        #[arg(short, long)]
        route: Option<RouteLabel>,

        /// Print the answer as JSON
        #[arg(long)]
        json: bool,
    },

    /// Start an interactive chat session
    Chat,

    /// Search a collection without generating an answer
    Search {
        /// Search query
        query: String,

        /// Collection to search (press_releases, sec_reports)
        #[arg(short = 'C', long, default_value = "press_releases")]
        collection: Collection,

        /// Maximum number of results (defaults to the collection's match count)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Generate and run SQL for a question, printing the rows
    Sql {
        /// The question to translate into SQL
        question: String,

        /// Only print the generated SQL
        #[arg(long)]
        dry_run: bool,
    },

    /// Import a CSV file into the structured database
    Import {
        /// CSV file to import
        file: String,

        /// Target table (replaced if it exists)
        #[arg(short, long, default_value = "uploaded_table")]
        table: String,
    },

    /// Split, embed and index documents into a collection
    Ingest {
        /// File or directory (.json, .jsonl, .txt, .md)
        path: String,

        /// Target collection (press_releases, sec_reports)
        #[arg(short = 'C', long)]
        collection: Collection,
    },

    /// List indexed sources of a collection
    List {
        /// Collection to list (press_releases, sec_reports)
        #[arg(short = 'C', long, default_value = "press_releases")]
        collection: Collection,
    },

    /// Start HTTP API server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ask_with_route() {
        let cli = Cli::try_parse_from([
            "finquery",
            "ask",
            "What dividend was declared?",
            "--route",
            "sec_reports",
        ])
        .unwrap();

        match cli.command {
            Commands::Ask { question, route, json } => {
                assert_eq!(question, "What dividend was declared?");
                assert_eq!(route, Some(RouteLabel::SecReports));
                assert!(!json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_ingest_requires_collection() {
        assert!(Cli::try_parse_from(["finquery", "ingest", "docs/"]).is_err());

        let cli = Cli::try_parse_from(["finquery", "-vv", "ingest", "docs/", "-C", "sec"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(
            cli.command,
            Commands::Ingest { collection: Collection::SecReports, .. }
        ));
    }

    #[test]
    fn test_unknown_route_is_rejected() {
        assert!(Cli::try_parse_from(["finquery", "ask", "q", "--route", "weather"]).is_err());
    }
}
