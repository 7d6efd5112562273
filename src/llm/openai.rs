//! OpenAI-compatible chat client (Gemini exposes the same API).

use super::{parse_json_response, LanguageModel};
use crate::config::LlmSettings;
use crate::error::{FinqueryError, Result};
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs, ResponseFormat,
};
use async_openai::Client;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

/// Create a client for an OpenAI-compatible API with the given timeout.
pub fn create_client(api_base: &str, api_key: &str, timeout: Duration) -> Result<Client<OpenAIConfig>> {
    let http_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| FinqueryError::Config(format!("Failed to create HTTP client: {}", e)))?;

    let config = OpenAIConfig::new()
        .with_api_base(api_base.trim_end_matches('/'))
        .with_api_key(api_key);

    Ok(Client::with_config(config).with_http_client(http_client))
}

/// Chat model reached through an OpenAI-compatible endpoint.
pub struct OpenAiChatModel {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl OpenAiChatModel {
    /// Create a chat model from settings and an API key.
    pub fn new(settings: &LlmSettings, api_key: &str) -> Result<Self> {
        Ok(Self {
            client: create_client(
                &settings.api_base,
                api_key,
                Duration::from_secs(settings.timeout_seconds),
            )?,
            model: settings.model.clone(),
            temperature: settings.temperature,
        })
    }

    /// Model name used for requests.
    pub fn model(&self) -> &str {
        &self.model
    }

    async fn request(&self, prompt: &str, json: bool) -> Result<String> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|e| FinqueryError::Llm(e.to_string()))?
                .into(),
        ];

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature);
        if json {
            builder.response_format(ResponseFormat::JsonObject);
        }
        let request = builder
            .build()
            .map_err(|e| FinqueryError::Llm(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| FinqueryError::Llm(format!("Chat API error: {}", e)))?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| FinqueryError::Llm("Empty response from LLM".to_string()))?
            .trim()
            .to_string();

        debug!("LLM returned {} characters", content.len());
        Ok(content)
    }
}

#[async_trait]
impl LanguageModel for OpenAiChatModel {
    #[instrument(skip(self, prompt), fields(model = %self.model))]
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.request(prompt, false).await
    }

    #[instrument(skip(self, prompt), fields(model = %self.model))]
    async fn complete_json(&self, prompt: &str) -> Result<Value> {
        let raw = self.request(prompt, true).await?;
        parse_json_response(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_model_creation() {
        let settings = LlmSettings::default();
        let model = OpenAiChatModel::new(&settings, "test-key").unwrap();
        assert_eq!(model.model(), "gemini-1.5-flash");
    }
}
