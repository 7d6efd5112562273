//! finquery - Financial Question Router
//!
//! A CLI and HTTP API that answers questions about a company's finances from
//! three sources: press releases, SEC filings, and a relational database of
//! properties and their yearly financials.
//!
//! # Overview
//!
//! Each question is classified by keyword and sent to exactly one backend:
//! - `press_releases` and `sec_reports` embed the question, run a similarity
//!   search over their collection and let an LLM answer from the hits
//! - `structured_data` asks the LLM for a read-only SQL query, validates it,
//!   runs it and summarizes the rows
//!
//! # Architecture
//!
//! - `config` - Settings and prompt templates
//! - `llm` - Chat completion abstraction
//! - `embedding` - Embedding generation (Gemini, OpenAI-compatible)
//! - `vector_store` - Chunk collections (Supabase RPC, SQLite, in-memory)
//! - `sql` - Validation, execution and CSV import for the relational store
//! - `router` - Classification, retrieval and answer synthesis
//! - `ingest` - Loading, splitting and indexing documents
//! - `session` - Chat history
//! - `backends` - Builds every client from settings
//!
//! # Example
//!
//! ```rust,no_run
//! use finquery::backends::Backends;
//! use finquery::config::Settings;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let assistant = Backends::from_settings(settings)?.assistant()?;
//!
//!     let answer = assistant.ask("What dividend was declared last quarter?").await?;
//!     println!("{} ({})", answer.text, answer.source_info);
//!
//!     Ok(())
//! }
//! ```

pub mod backends;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod llm;
pub mod router;
pub mod session;
pub mod sql;
pub mod vector_store;

pub use error::{FinqueryError, Result};
