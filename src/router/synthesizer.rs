//! Final answer generation.

use crate::config::Prompts;
use crate::llm::LanguageModel;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{instrument, warn};

/// Returned whenever the answer LLM call fails.
pub const SYNTHESIS_FAILURE: &str = "Sorry, I encountered an error generating the answer.";

/// Turns retrieved context or query rows into a plain-English answer.
#[derive(Clone)]
pub struct AnswerSynthesizer {
    llm: Arc<dyn LanguageModel>,
    prompts: Arc<Prompts>,
}

impl AnswerSynthesizer {
    pub fn new(llm: Arc<dyn LanguageModel>, prompts: Arc<Prompts>) -> Self {
        Self { llm, prompts }
    }

    /// Answer `question` from `context`. Never fails; errors become a fixed message.
    #[instrument(skip(self, context), fields(source = %source_label))]
    pub async fn synthesize(&self, question: &str, context: &str, source_label: &str) -> String {
        let mut vars = HashMap::new();
        vars.insert("question".to_string(), question.to_string());
        vars.insert("context".to_string(), context.to_string());
        vars.insert("source".to_string(), source_label.to_string());

        let prompt = self
            .prompts
            .render_with_custom(&self.prompts.answer.synthesize, &vars);
        self.complete(&prompt).await
    }

    /// Summarize query rows for `question`. Same contract as [`Self::synthesize`].
    #[instrument(skip(self, rows_text))]
    pub async fn summarize_rows(&self, question: &str, rows_text: &str) -> String {
        let mut vars = HashMap::new();
        vars.insert("question".to_string(), question.to_string());
        vars.insert("rows".to_string(), rows_text.to_string());

        let prompt = self.prompts.render_with_custom(&self.prompts.sql.summarize, &vars);
        self.complete(&prompt).await
    }

    async fn complete(&self, prompt: &str) -> String {
        match self.llm.complete(prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Answer generation failed: {}", e);
                SYNTHESIS_FAILURE.to_string()
            }
        }
    }
}
