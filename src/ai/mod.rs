//! AI text processing
//!
//! The dispatcher only sees the [`AiProcessor`] trait. Two backends ship:
//! - openai: OpenAI-compatible chat completions over HTTP (Gemini's
//!   OpenAI-compatible endpoint by default)
//! - command: pipes the prompt through an external command, e.g. a local
//!   `ollama run` invocation

pub mod command;
pub mod openai;

use crate::config::{AiBackend, AiConfig};
use crate::error::AiError;
use std::sync::Arc;

/// Trait for AI backends
#[async_trait::async_trait]
pub trait AiProcessor: Send + Sync {
    /// Send a prompt and return the response text
    async fn process(&self, prompt: &str) -> Result<String, AiError>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Factory function to create the configured AI processor
///
/// A missing API key is not an error here: the daemon still runs and each
/// cycle reports `NotConfigured` to the user.
pub fn create_processor(config: &AiConfig) -> Result<Arc<dyn AiProcessor>, AiError> {
    match config.backend {
        AiBackend::OpenAi => {
            let processor = openai::OpenAiProcessor::new(config);
            if !processor.has_api_key() {
                tracing::warn!(
                    "No API key found. Set {} or HOTPROMPT_API_KEY, or ai.api_key in the config file",
                    config.api_key_env
                );
            }
            Ok(Arc::new(processor))
        }
        AiBackend::Command => {
            let command = config
                .command
                .as_deref()
                .filter(|c| !c.trim().is_empty())
                .ok_or_else(|| {
                    AiError::NotConfigured(
                        "ai.backend = \"command\" requires ai.command".to_string(),
                    )
                })?;
            Ok(Arc::new(command::CommandProcessor::new(
                command,
                config.timeout_secs,
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_openai_without_key() {
        let config = AiConfig {
            api_key: None,
            api_key_env: "HOTPROMPT_TEST_UNSET_KEY_VAR".to_string(),
            ..Default::default()
        };
        let processor = create_processor(&config).unwrap();
        assert_eq!(processor.name(), "openai");
    }

    #[test]
    fn test_create_command_requires_command() {
        let config = AiConfig {
            backend: AiBackend::Command,
            command: None,
            ..Default::default()
        };
        assert!(matches!(
            create_processor(&config),
            Err(AiError::NotConfigured(_))
        ));

        let config = AiConfig {
            backend: AiBackend::Command,
            command: Some("cat".to_string()),
            ..Default::default()
        };
        assert_eq!(create_processor(&config).unwrap().name(), "command");
    }
}
