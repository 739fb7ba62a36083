//! Transport to the text-generation capability.
//!
//! The provider is treated as unreliable: calls get a bounded retry with
//! exponential backoff, and whatever comes back is parsed at a strict
//! boundary before anyone else sees it.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::AppConfig;

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 500;

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("provider returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("malformed completion payload: {0}")]
    MalformedPayload(String),
    #[error("provider response carried no completion")]
    EmptyCompletion,
}

impl LlmError {
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Api { status, .. } => is_retryable_status(*status),
            LlmError::Network(_) => true,
            LlmError::MalformedPayload(_) | LlmError::EmptyCompletion => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionRequest {
    /// Itinerary-shaped output: some creative freedom, lots of room.
    pub fn creative(prompt: String) -> Self {
        Self {
            prompt,
            temperature: 0.7,
            max_tokens: 4000,
        }
    }

    /// Extraction-shaped output: keep the model on a short leash.
    pub fn precise(prompt: String) -> Self {
        Self {
            prompt,
            temperature: 0.1,
            max_tokens: 1000,
        }
    }
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError>;
}

/// Groq chat-completions client (OpenAI-compatible wire format).
pub struct GroqClient {
    http: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GroqClient {
    pub fn from_config(config: &AppConfig) -> Result<Self, LlmError> {
        if config.llm_api_key.trim().is_empty() {
            warn!("GROQ_API_KEY is not set; completion calls will be rejected by the provider");
        }
        let http = Client::builder()
            .timeout(Duration::from_millis(config.llm_timeout_ms))
            .build()?;
        Ok(Self {
            http,
            api_key: config.llm_api_key.clone(),
            model: config.llm_model.clone(),
            base_url: config.llm_base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl CompletionClient for GroqClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": request.prompt }],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        let mut last_error = None;
        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let backoff = INITIAL_BACKOFF_MS * 2u64.pow(attempt - 1);
                warn!(attempt, backoff_ms = backoff, "retrying completion call");
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }

            let response = match self
                .http
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await
            {
                Ok(response) => response,
                Err(err) => {
                    debug!(attempt, error = %err, "completion call failed to send");
                    last_error = Some(LlmError::Network(err));
                    continue;
                }
            };

            let status = response.status().as_u16();
            if !response.status().is_success() {
                let message = response.text().await.unwrap_or_default();
                let error = LlmError::Api { status, message };
                if error.is_retryable() && attempt < MAX_RETRIES {
                    last_error = Some(error);
                    continue;
                }
                return Err(error);
            }

            let parsed: ChatResponse = response
                .json()
                .await
                .map_err(|err| LlmError::MalformedPayload(err.to_string()))?;
            return parsed
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .filter(|content| !content.trim().is_empty())
                .ok_or(LlmError::EmptyCompletion);
        }

        Err(last_error.unwrap_or(LlmError::EmptyCompletion))
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Parse a JSON value out of a completion, tolerating markdown code fences
/// and prose around the payload. Anything else is a malformed payload.
pub fn parse_json_payload<T: DeserializeOwned>(raw: &str) -> Result<T, LlmError> {
    let candidate = strip_code_fences(raw);
    match serde_json::from_str(candidate) {
        Ok(value) => Ok(value),
        Err(first_err) => {
            if let (Some(start), Some(end)) = (candidate.find('{'), candidate.rfind('}')) {
                if start < end {
                    if let Ok(value) = serde_json::from_str(&candidate[start..=end]) {
                        return Ok(value);
                    }
                }
            }
            Err(LlmError::MalformedPayload(first_err.to_string()))
        }
    }
}

fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    match rest.strip_suffix("```") {
        Some(inner) => inner.trim(),
        None => rest.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Payload {
        answer: u32,
    }

    #[test]
    fn plain_json_parses() {
        let parsed: Payload = parse_json_payload(r#"{"answer": 7}"#).unwrap();
        assert_eq!(parsed, Payload { answer: 7 });
    }

    #[test]
    fn fenced_json_parses() {
        let raw = "```json\n{\"answer\": 7}\n```";
        let parsed: Payload = parse_json_payload(raw).unwrap();
        assert_eq!(parsed, Payload { answer: 7 });
    }

    #[test]
    fn json_wrapped_in_prose_parses() {
        let raw = "Here is the result you asked for: {\"answer\": 7} Enjoy!";
        let parsed: Payload = parse_json_payload(raw).unwrap();
        assert_eq!(parsed, Payload { answer: 7 });
    }

    #[test]
    fn garbage_is_a_malformed_payload() {
        let result: Result<Payload, _> = parse_json_payload("no json here");
        assert!(matches!(result, Err(LlmError::MalformedPayload(_))));
    }

    #[test]
    fn retryability_classification() {
        assert!(LlmError::Api {
            status: 503,
            message: String::new()
        }
        .is_retryable());
        assert!(!LlmError::Api {
            status: 400,
            message: String::new()
        }
        .is_retryable());
        assert!(!LlmError::EmptyCompletion.is_retryable());
        assert!(!LlmError::MalformedPayload("bad".into()).is_retryable());
    }
}
