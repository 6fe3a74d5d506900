//! OpenAI-compatible chat completions backend
//!
//! POSTs `{model, messages, max_tokens}` to `{base_url}/chat/completions`
//! with bearer auth. Works with OpenAI, Gemini's OpenAI-compatible
//! endpoint, and local servers such as llama.cpp or Ollama.
//!
//! ureq is blocking, so requests run on the blocking pool.

use super::AiProcessor;
use crate::config::AiConfig;
use crate::error::AiError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest error body echoed back to the user
const MAX_ERROR_CHARS: usize = 200;

/// OpenAI-compatible API processor
#[derive(Clone)]
pub struct OpenAiProcessor {
    /// Full chat completions URL
    endpoint: String,
    model: String,
    api_key: Option<String>,
    system_prompt: String,
    max_tokens: u32,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl OpenAiProcessor {
    /// Create a new processor from configuration
    pub fn new(config: &AiConfig) -> Self {
        Self {
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            api_key: config.resolve_api_key(),
            system_prompt: config.system_prompt.clone(),
            max_tokens: config.max_tokens,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn build_request<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if !self.system_prompt.trim().is_empty() {
            messages.push(ChatMessage {
                role: "system",
                content: &self.system_prompt,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        ChatRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
        }
    }

    /// Call the chat completions API (blocking)
    fn call_api(&self, prompt: &str) -> Result<String, AiError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            AiError::NotConfigured("no API key (set HOTPROMPT_API_KEY or ai.api_key_env)".to_string())
        })?;

        let client = ureq::AgentBuilder::new().timeout(self.timeout).build();

        tracing::debug!(
            "Calling {} (model {}, {} chars)",
            self.endpoint,
            self.model,
            prompt.chars().count()
        );

        let response = client
            .post(&self.endpoint)
            .set("Authorization", &format!("Bearer {}", api_key))
            .set("Content-Type", "application/json")
            .send_json(self.build_request(prompt))
            .map_err(|e| match e {
                ureq::Error::Transport(t) => transport_error(&t.to_string(), self.timeout),
                ureq::Error::Status(status, response) => {
                    let body = response.into_string().unwrap_or_default();
                    status_error(status, &body)
                }
            })?;

        let body = response
            .into_string()
            .map_err(|e| AiError::Network(e.to_string()))?;

        parse_response(&body)
    }
}

/// Map a ureq transport failure
fn transport_error(message: &str, timeout: Duration) -> AiError {
    let lower = message.to_lowercase();
    if lower.contains("timed out") || lower.contains("timeout") {
        AiError::Timeout(timeout.as_secs())
    } else {
        AiError::Network(message.to_string())
    }
}

/// Map a non-2xx response
fn status_error(status: u16, body: &str) -> AiError {
    match status {
        401 | 403 => AiError::Auth(status),
        429 => AiError::RateLimited,
        _ => AiError::Api {
            status,
            message: error_message(body),
        },
    }
}

/// Pull `error.message` out of an error body, falling back to the raw text.
/// Gemini wraps the envelope in a one-element array.
fn error_message(body: &str) -> String {
    let parsed = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .or_else(|_| {
            serde_json::from_str::<Vec<ErrorEnvelope>>(body).map(|mut v| {
                v.pop()
                    .map(|e| e.error.message)
                    .unwrap_or_default()
            })
        })
        .unwrap_or_else(|_| body.trim().to_string());

    crate::notification::truncate(&parsed, MAX_ERROR_CHARS)
}

fn parse_response(body: &str) -> Result<String, AiError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| AiError::Parse(format!("Failed to parse API response: {}", e)))?;

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| AiError::Parse("response has no choices".to_string()))?;

    let content = choice.message.content.unwrap_or_default();
    Ok(content.trim().to_string())
}

#[async_trait::async_trait]
impl AiProcessor for OpenAiProcessor {
    async fn process(&self, prompt: &str) -> Result<String, AiError> {
        // Fail before spawning anything when unconfigured
        if self.api_key.is_none() {
            return Err(AiError::NotConfigured(
                "no API key (set HOTPROMPT_API_KEY or ai.api_key_env)".to_string(),
            ));
        }

        let this = self.clone();
        let prompt = prompt.to_string();

        tokio::task::spawn_blocking(move || this.call_api(&prompt))
            .await
            .map_err(|e| AiError::Internal(e.to_string()))?
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}
