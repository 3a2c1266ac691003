//! Client for the OpenAI-compatible model runtime behind the AI assistant.
//!
//! All completion calls go through the [`ChatCompletion`] trait so the
//! assistant service can be exercised against a scripted model in tests.
//! [`OpenAiClient`] posts to `{base_url}/chat/completions` and retries on
//! 429 and 5xx responses with exponential backoff.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::{AI_INITIAL_BACKOFF, AiConfig};
use crate::domain::ai_chat::AiRole;
use crate::error::AppError;

/// Sampling temperature sent with every request.
pub const TEMPERATURE: f32 = 0.7;

/// Nucleus sampling bound sent with every request.
pub const TOP_P: f32 = 0.9;

/// Errors raised by the model client.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// Transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status from the runtime.
    #[error("API error (status {status}): {message}")]
    Api {
        /// HTTP status.
        status: u16,
        /// Error body or message.
        message: String,
    },

    /// Still failing after the configured number of attempts.
    #[error("model runtime unavailable after {attempts} attempts")]
    Exhausted {
        /// Attempts made.
        attempts: u32,
    },

    /// The response carried no choices.
    #[error("model returned no choices")]
    NoChoices,
}

impl From<LlmError> for AppError {
    fn from(err: LlmError) -> Self {
        Self::Upstream(err.to_string())
    }
}

/// One turn of a completion prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    /// Author of the turn.
    pub role: AiRole,
    /// Text.
    pub content: String,
}

impl PromptMessage {
    /// Builds a turn.
    #[must_use]
    pub fn new(role: AiRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// A chat completion backend.
#[async_trait]
pub trait ChatCompletion: Send + Sync + std::fmt::Debug {
    /// Returns the assistant text for `messages`. An empty string is a
    /// valid reply.
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String, LlmError>;
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    temperature: f32,
    top_p: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// [`ChatCompletion`] over an OpenAI-compatible HTTP API.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    max_attempts: u32,
    backoff: Duration,
}

impl OpenAiClient {
    /// Builds a client from the assistant configuration.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Http`] if the HTTP client cannot be built.
    pub fn new(config: &AiConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            max_attempts: config.max_retries.max(1),
            backoff: AI_INITIAL_BACKOFF,
        })
    }

    /// Overrides the first retry delay (doubled on every further attempt).
    #[must_use]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff
            .saturating_mul(1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX))
    }
}

#[async_trait]
impl ChatCompletion for OpenAiClient {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String, LlmError> {
        let body = CompletionRequest {
            model: &self.model,
            messages,
            temperature: TEMPERATURE,
            top_p: TOP_P,
            stream: false,
        };

        let mut last_error: Option<LlmError> = None;
        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                let delay = self.delay_for(attempt);
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "model call failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }

            let mut request = self.client.post(&self.endpoint).json(&body);
            if let Some(key) = &self.api_key {
                request = request.bearer_auth(key);
            }

            let response = match request.send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();
            if status.as_u16() == 429 || status.is_server_error() {
                let message = response.text().await.unwrap_or_default();
                tracing::warn!(status = status.as_u16(), "model runtime returned retryable status");
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message,
                });
                continue;
            }
            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let parsed: CompletionResponse = response.json().await?;
            let reply = parsed
                .choices
                .into_iter()
                .next()
                .ok_or(LlmError::NoChoices)?
                .message
                .content
                .unwrap_or_default();
            tracing::debug!(chars = reply.len(), "model call succeeded");
            return Ok(reply);
        }

        Err(last_error.unwrap_or(LlmError::Exhausted {
            attempts: self.max_attempts,
        }))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn config(base_url: &str) -> AiConfig {
        AiConfig {
            base_url: base_url.to_string(),
            model: "m".into(),
            api_key: None,
            timeout_secs: 5,
            max_retries: 3,
        }
    }

    #[test]
    fn endpoint_ignores_trailing_slash() {
        let Ok(client) = OpenAiClient::new(&config("http://localhost:11434/v1/")) else {
            panic!("client should build");
        };
        assert_eq!(client.endpoint, "http://localhost:11434/v1/chat/completions");
    }

    #[test]
    fn backoff_doubles() {
        let Ok(client) = OpenAiClient::new(&config("http://x")) else {
            panic!("client should build");
        };
        let client = client.with_backoff(Duration::from_millis(100));
        assert_eq!(client.delay_for(1), Duration::from_millis(100));
        assert_eq!(client.delay_for(2), Duration::from_millis(200));
        assert_eq!(client.delay_for(3), Duration::from_millis(400));
    }

    #[test]
    fn prompt_roles_serialize_lowercase() {
        let msg = PromptMessage::new(AiRole::Assistant, "hi");
        let Ok(json) = serde_json::to_value(&msg) else {
            panic!("serialize failed");
        };
        assert_eq!(json.get("role").and_then(|v| v.as_str()), Some("assistant"));
    }
}
