//! Chat-completion abstraction used for SQL generation and answer synthesis.

mod openai;

pub use openai::{create_client, OpenAiChatModel};

use crate::error::{FinqueryError, Result};
use async_trait::async_trait;
use serde_json::Value;

/// Trait for LLM completion backends.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Complete a single prompt and return the generated text.
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Complete a prompt and parse the response as a JSON object.
    ///
    /// Backends that support a JSON response format should override this.
    async fn complete_json(&self, prompt: &str) -> Result<Value> {
        let raw = self.complete(prompt).await?;
        parse_json_response(&raw)
    }
}

/// Parse an LLM response that is supposed to hold a JSON object.
pub fn parse_json_response(response: &str) -> Result<Value> {
    let json_start = response.find('{');
    let json_end = response.rfind('}');

    let json_str = match (json_start, json_end) {
        (Some(start), Some(end)) if end > start => &response[start..=end],
        _ => response,
    };

    serde_json::from_str(json_str).map_err(|e| {
        let preview: String = response.chars().take(200).collect();
        FinqueryError::MalformedOutput(format!(
            "expected a JSON object ({}). Response was: {}",
            e, preview
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_inside_fences() {
        let raw = "```json\n{\"sql\": \"SELECT 1 FROM t\"}\n```";
        let value = parse_json_response(raw).unwrap();
        assert_eq!(value["sql"], "SELECT 1 FROM t");
    }

    #[test]
    fn test_parse_json_rejects_prose() {
        let err = parse_json_response("I cannot answer that.").unwrap_err();
        assert!(matches!(err, FinqueryError::MalformedOutput(_)));
    }
}
