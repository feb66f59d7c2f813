//! LLM completion provider abstraction and implementations.
//!
//! Defines the [`CompletionClient`] trait and two concrete clients:
//! - **[`OpenAiClient`]** — chat-completions dialect, used for the
//!   research stage.
//! - **[`AnthropicClient`]** — messages dialect, used for the writer
//!   stage.
//!
//! Both are "complete this prompt, give me text" black boxes; everything
//! beyond the prompt contract is opaque to the pipeline.
//!
//! # Retry Strategy
//!
//! Transport-level retries with exponential backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! Protocol-level retries (malformed completions) belong to the
//! orchestrator, not here.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::config::ProviderConfig;
use crate::error::{PipelineError, PipelineResult};

const SYSTEM_PROMPT: &str =
    "You are a technical writer researching content for programming interview preparation articles.";

const OPENAI_DEFAULT_BASE: &str = "https://api.openai.com";
const ANTHROPIC_DEFAULT_BASE: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// A prompt-completion provider.
///
/// The pipeline holds two of these, injected explicitly at construction:
/// one for research, one for article writing. Tests substitute scripted
/// implementations.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Returns the model identifier (e.g. `"claude-3-5-sonnet-latest"`).
    fn model_name(&self) -> &str;

    /// Send the prompt and return the raw text completion.
    async fn complete(&self, prompt: &str) -> PipelineResult<String>;
}

impl std::fmt::Debug for dyn CompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionClient")
            .field("model", &self.model_name())
            .finish()
    }
}

/// Build the client described by a provider config entry.
///
/// # Errors
///
/// Fails with [`PipelineError::Provider`] if the configured API key
/// environment variable is unset or the kind is unknown.
pub fn create_client(config: &ProviderConfig) -> PipelineResult<Box<dyn CompletionClient>> {
    let api_key = std::env::var(&config.api_key_env)
        .map_err(|_| PipelineError::Provider(format!("{} not set", config.api_key_env)))?;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| PipelineError::Provider(e.to_string()))?;

    match config.kind.as_str() {
        "openai" => Ok(Box::new(OpenAiClient {
            http,
            api_key,
            model: config.model.clone(),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| OPENAI_DEFAULT_BASE.to_string()),
            max_retries: config.max_retries,
        })),
        "anthropic" => Ok(Box::new(AnthropicClient {
            http,
            api_key,
            model: config.model.clone(),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| ANTHROPIC_DEFAULT_BASE.to_string()),
            max_retries: config.max_retries,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })),
        other => Err(PipelineError::Provider(format!(
            "unknown provider kind: {}",
            other
        ))),
    }
}

/// Send a request with retry/backoff and return the parsed JSON body.
///
/// `build` constructs a fresh request for each attempt.
async fn send_with_retry(
    max_retries: u32,
    build: impl Fn() -> reqwest::RequestBuilder,
) -> PipelineResult<Value> {
    let mut last_err: Option<PipelineError> = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            // Exponential backoff: 1s, 2s, 4s, 8s, ...
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        match build().send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return response
                        .json::<Value>()
                        .await
                        .map_err(|e| PipelineError::Provider(e.to_string()));
                }

                let body_text = response.text().await.unwrap_or_default();

                // Rate limited or server error — retry
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(PipelineError::Provider(format!(
                        "API error {}: {}",
                        status, body_text
                    )));
                    continue;
                }

                // Client error (not 429) — don't retry
                return Err(PipelineError::Provider(format!(
                    "API error {}: {}",
                    status, body_text
                )));
            }
            Err(e) => {
                last_err = Some(PipelineError::Provider(e.to_string()));
                continue;
            }
        }
    }

    Err(last_err
        .unwrap_or_else(|| PipelineError::Provider("completion failed after retries".to_string())))
}

// ============ OpenAI (chat completions) ============

/// Completion client for OpenAI-style `POST /v1/chat/completions`.
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    max_retries: u32,
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> PipelineResult<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt },
            ],
        });

        let url = format!("{}/v1/chat/completions", self.base_url);
        let json = send_with_retry(self.max_retries, || {
            self.http
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&body)
        })
        .await?;

        extract_openai_text(&json)
    }
}

fn extract_openai_text(json: &Value) -> PipelineResult<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            PipelineError::Provider("invalid chat-completions response: missing choices[0].message.content".to_string())
        })
}

// ============ Anthropic (messages) ============

/// Completion client for Anthropic-style `POST /v1/messages`.
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    max_retries: u32,
    max_tokens: u32,
    temperature: f64,
}

#[async_trait]
impl CompletionClient for AnthropicClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> PipelineResult<String> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "messages": [
                { "role": "user", "content": prompt },
            ],
        });

        let url = format!("{}/v1/messages", self.base_url);
        let json = send_with_retry(self.max_retries, || {
            self.http
                .post(&url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("Content-Type", "application/json")
                .json(&body)
        })
        .await?;

        extract_anthropic_text(&json)
    }
}

fn extract_anthropic_text(json: &Value) -> PipelineResult<String> {
    json.pointer("/content/0/text")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            PipelineError::Provider("invalid messages response: missing content[0].text".to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_openai_text() {
        let json = serde_json::json!({
            "choices": [ { "message": { "role": "assistant", "content": "hello" } } ]
        });
        assert_eq!(extract_openai_text(&json).unwrap(), "hello");

        let empty = serde_json::json!({ "choices": [] });
        assert!(matches!(
            extract_openai_text(&empty),
            Err(PipelineError::Provider(_))
        ));
    }

    #[test]
    fn test_extract_anthropic_text() {
        let json = serde_json::json!({
            "content": [ { "type": "text", "text": "hello" } ]
        });
        assert_eq!(extract_anthropic_text(&json).unwrap(), "hello");

        let wrong = serde_json::json!({ "content": [ { "type": "text" } ] });
        assert!(matches!(
            extract_anthropic_text(&wrong),
            Err(PipelineError::Provider(_))
        ));
    }

    #[test]
    fn test_create_client_requires_api_key_env() {
        let config = ProviderConfig {
            kind: "openai".to_string(),
            model: "o1-preview".to_string(),
            api_key_env: "WIKIFORGE_TEST_KEY_THAT_IS_NOT_SET".to_string(),
            base_url: None,
            timeout_secs: 5,
            max_retries: 0,
            max_tokens: 1024,
            temperature: 0.7,
        };
        let err = create_client(&config).unwrap_err();
        assert!(err.to_string().contains("WIKIFORGE_TEST_KEY_THAT_IS_NOT_SET"));
    }
}
