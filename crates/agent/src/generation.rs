//! Thin wrapper binding an LLM client to the configured generation settings.

use insight_core::{AppConfig, AppResult};
use insight_llm::{LlmClient, LlmRequest};
use std::sync::Arc;

#[derive(Clone)]
pub struct Generator {
    client: Arc<dyn LlmClient>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl Generator {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            temperature: 0.3,
            max_tokens: 2048,
        }
    }

    pub fn from_config(client: Arc<dyn LlmClient>, config: &AppConfig) -> Self {
        Self {
            client,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_output_tokens,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.client.provider_name()
    }

    /// Complete `prompt` and return the trimmed text.
    pub async fn generate(&self, prompt: String) -> AppResult<String> {
        let request = LlmRequest::new(prompt, self.model.clone())
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);

        let response = self.client.complete(&request).await?;
        tracing::debug!(
            model = %response.model,
            completion_tokens = response.usage.completion_tokens,
            "Generation finished"
        );

        Ok(response.content.trim().to_string())
    }
}
