//! Configuration module for finquery.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{AnswerPrompts, Prompts, SqlPrompts};
pub use settings::{
    CollectionSettings, CollectionsSettings, EmbeddingProvider, EmbeddingSettings,
    GeneralSettings, LlmSettings, PromptSettings, RoutingSettings, Settings,
    StructuredSettings, VectorStoreProvider, VectorStoreSettings, DEFAULT_STRUCTURED_SCHEMA,
};
