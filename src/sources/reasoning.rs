//! Natural-language reasoning collaborator.
//!
//! The production implementation talks to the Ollama chat API in
//! non-streaming mode and asks for JSON-formatted output.

use crate::error::SourceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// One generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Ask the model to ground its answer in live search results.
    pub grounding: bool,
}

/// Free-form text generation, expected to return JSON-shaped text.
#[async_trait]
pub trait ReasoningModel: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, SourceError>;
}

/// Settings for [`OllamaReasoner`].
#[derive(Debug, Clone)]
pub struct OllamaSettings {
    pub ollama_url: String,
    pub model_name: String,
    pub timeout_seconds: u64,
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            ollama_url: "http://localhost:11434".to_string(),
            model_name: "llama3.2:latest".to_string(),
            timeout_seconds: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Ollama chat API request.
#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    format: &'static str,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

/// Ollama chat API response.
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,
}

/// Reasoning model served by a local or remote Ollama instance.
pub struct OllamaReasoner {
    settings: OllamaSettings,
    http_client: reqwest::Client,
}

impl OllamaReasoner {
    pub fn new(settings: OllamaSettings) -> Result<Self, SourceError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .map_err(|e| SourceError::unavailable("ollama", e))?;

        Ok(Self {
            settings,
            http_client,
        })
    }
}

#[async_trait]
impl ReasoningModel for OllamaReasoner {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, SourceError> {
        let url = format!("{}/api/chat", self.settings.ollama_url.trim_end_matches('/'));

        // Ollama has no search grounding; the system prompt carries the intent.
        if request.grounding {
            debug!("Grounding requested; relying on model knowledge");
        }

        let body = OllamaChatRequest {
            model: &self.settings.model_name,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: request.system.clone(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: request.prompt.clone(),
                },
            ],
            stream: false,
            format: "json",
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };

        let response = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SourceError::unavailable(
                        "ollama",
                        format!("request timed out after {}s", self.settings.timeout_seconds),
                    )
                } else if e.is_connect() {
                    SourceError::unavailable(
                        "ollama",
                        format!("cannot connect to Ollama at {}", self.settings.ollama_url),
                    )
                } else {
                    SourceError::unavailable("ollama", e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::unavailable(
                "ollama",
                format!("Ollama API error {}: {}", status, body),
            ));
        }

        let chat_response: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| SourceError::malformed("ollama", e))?;

        Ok(chat_response.message.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_default() {
        let settings = OllamaSettings::default();
        assert_eq!(settings.ollama_url, "http://localhost:11434");
        assert_eq!(settings.timeout_seconds, 120);
    }

    #[test]
    fn test_chat_request_shape() {
        let body = OllamaChatRequest {
            model: "m",
            messages: vec![],
            stream: false,
            format: "json",
            options: OllamaOptions {
                temperature: 0.2,
                num_predict: 400,
            },
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["format"], "json");
        assert_eq!(value["options"]["num_predict"], 400);
        assert_eq!(value["stream"], false);
    }
}
