//! CLI command implementations.

mod ask;
mod chat;
mod config;
mod doctor;
mod import;
mod ingest;
mod list;
mod search;
mod serve;
mod sql;

pub use ask::run_ask;
pub use chat::run_chat;
pub use config::run_config;
pub use doctor::run_doctor;
pub use import::run_import;
pub use ingest::run_ingest;
pub use list::run_list;
pub use search::run_search;
pub use serve::{router, run_serve, AppState};
pub use sql::run_sql;
