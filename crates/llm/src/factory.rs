//! LLM provider factory.
//!
//! Builds the generation capability from the configured provider name.
//! The resulting handle is passed explicitly into the orchestrator; there is
//! no process-wide client.

use crate::client::LlmClient;
use crate::providers::{GeminiClient, OllamaClient};
use std::sync::Arc;
use std::time::Duration;

/// Create an LLM client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier ("ollama", "gemini")
/// * `endpoint` - Optional custom endpoint URL
/// * `api_key` - Optional API key (required by Gemini)
/// * `timeout` - Per-request timeout for the provider's HTTP calls
///
/// # Errors
/// Returns an error message if the provider is unknown or a required
/// secret is missing.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    api_key: Option<&str>,
    timeout: Duration,
) -> Result<Arc<dyn LlmClient>, String> {
    match provider.to_lowercase().as_str() {
        "ollama" => {
            let base_url = endpoint.unwrap_or("http://localhost:11434");
            Ok(Arc::new(
                OllamaClient::with_base_url(base_url).with_timeout(timeout),
            ))
        }
        "gemini" | "google" => {
            let api_key = api_key.ok_or_else(|| "Gemini provider requires API key".to_string())?;
            let client = match endpoint {
                Some(base_url) => GeminiClient::with_base_url(base_url, api_key),
                None => GeminiClient::new(api_key),
            };
            Ok(Arc::new(client.with_timeout(timeout)))
        }
        _ => Err(format!("Unknown provider: {}", provider)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::DEFAULT_REQUEST_TIMEOUT;

    #[test]
    fn test_create_ollama_client() {
        let client = create_client("ollama", None, None, DEFAULT_REQUEST_TIMEOUT).unwrap();
        assert_eq!(client.provider_name(), "ollama");
    }

    #[test]
    fn test_create_ollama_with_custom_endpoint() {
        let client = create_client("ollama", Some("http://localhost:8080"), None, DEFAULT_REQUEST_TIMEOUT);
        assert!(client.is_ok());
    }

    #[test]
    fn test_create_gemini_client() {
        let client = create_client("Gemini", None, Some("key"), DEFAULT_REQUEST_TIMEOUT).unwrap();
        assert_eq!(client.provider_name(), "gemini");
    }

    #[test]
    fn test_gemini_requires_api_key() {
        match create_client("gemini", None, None, DEFAULT_REQUEST_TIMEOUT) {
            Err(err) => assert!(err.contains("Gemini provider requires API key")),
            Ok(_) => panic!("Expected error for Gemini without API key"),
        }
    }

    #[test]
    fn test_unknown_provider() {
        match create_client("unknown", None, None, DEFAULT_REQUEST_TIMEOUT) {
            Err(err) => assert!(err.contains("Unknown provider")),
            Ok(_) => panic!("Expected error for unknown provider"),
        }
    }

    #[test]
    fn test_create_client_with_short_timeout() {
        let timeout = Duration::from_millis(1500);
        let ollama = create_client("ollama", None, None, timeout).unwrap();
        assert_eq!(ollama.provider_name(), "ollama");
        let gemini = create_client("gemini", None, Some("key"), timeout).unwrap();
        assert_eq!(gemini.provider_name(), "gemini");
    }
}
