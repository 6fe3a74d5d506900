//! External command backend
//!
//! Pipes the prompt through a shell command and uses its stdout as the
//! response. Commonly used with local LLMs (Ollama, llama.cpp).
//!
//! # Example Configuration
//!
//! ```toml
//! [ai]
//! backend = "command"
//! command = "ollama run llama3.2:1b"
//! timeout_secs = 30
//! ```

use super::AiProcessor;
use crate::error::AiError;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

/// Processor that runs an external command on the prompt
pub struct CommandProcessor {
    command: String,
    timeout: Duration,
}

impl CommandProcessor {
    pub fn new(command: &str, timeout_secs: u64) -> Self {
        Self {
            command: command.to_string(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    #[cfg(test)]
    fn with_timeout(command: &str, timeout: Duration) -> Self {
        Self {
            command: command.to_string(),
            timeout,
        }
    }

    fn shell(&self) -> Command {
        if cfg!(windows) {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", &self.command]);
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.args(["-c", &self.command]);
            cmd
        }
    }
}

#[async_trait::async_trait]
impl AiProcessor for CommandProcessor {
    async fn process(&self, prompt: &str) -> Result<String, AiError> {
        // Spawn command via shell for proper parsing of complex commands
        let mut child = self
            .shell()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AiError::Command(format!("failed to spawn command: {}", e)))?;

        // Feed stdin alongside reading stdout so a streaming filter (cat, sed)
        // never blocks on a full pipe
        let writer = child.stdin.take().map(|mut stdin| {
            let prompt = prompt.to_owned();
            tokio::spawn(async move {
                // A command that ignores stdin may close it early; that's fine
                if let Err(e) = stdin.write_all(prompt.as_bytes()).await {
                    tracing::debug!("Command closed stdin early: {}", e);
                }
            })
        });

        let waited = timeout(self.timeout, child.wait_with_output()).await;
        if let Some(writer) = writer {
            writer.abort();
        }
        let output = waited
            .map_err(|_| AiError::Timeout(self.timeout.as_secs()))?
            .map_err(|e| AiError::Command(format!("failed to wait for command: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            return Err(AiError::Command(if stderr.is_empty() {
                format!("command exited with code {:?}", output.status.code())
            } else {
                format!("command exited with code {:?}: {}", output.status.code(), stderr)
            }));
        }

        let response = String::from_utf8(output.stdout)
            .map_err(|e| AiError::Command(format!("output is not valid UTF-8: {}", e)))?;
        let response = response.trim();

        if response.is_empty() {
            return Err(AiError::Command("command produced no output".to_string()));
        }

        tracing::debug!(
            "Command processed ({} -> {} chars)",
            prompt.len(),
            response.len()
        );

        Ok(response.to_string())
    }

    fn name(&self) -> &'static str {
        "command"
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn processor(command: &str) -> CommandProcessor {
        CommandProcessor::new(command, 5)
    }

    #[tokio::test]
    async fn test_simple_passthrough() {
        let result = processor("cat").process("hello world").await;
        assert_eq!(result.unwrap(), "hello world");
    }

    #[tokio::test]
    async fn test_sed_transformation() {
        let result = processor("sed 's/foo/bar/g'").process("foo bar foo").await;
        assert_eq!(result.unwrap(), "bar bar bar");
    }

    #[tokio::test]
    async fn test_timeout() {
        let processor = CommandProcessor::with_timeout("sleep 10", Duration::from_millis(100));
        let result = processor.process("original text").await;
        assert!(matches!(result, Err(AiError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_command_failure() {
        let result = processor("echo oops >&2; exit 3").process("text").await;
        match result {
            Err(AiError::Command(msg)) => {
                assert!(msg.contains("Some(3)"));
                assert!(msg.contains("oops"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_output_is_error() {
        let result = processor("cat > /dev/null").process("text").await;
        assert!(matches!(result, Err(AiError::Command(_))));
    }

    #[tokio::test]
    async fn test_command_not_found() {
        let result = processor("nonexistent_command_xyz_12345").process("text").await;
        assert!(matches!(result, Err(AiError::Command(_))));
    }

    #[tokio::test]
    async fn test_large_prompt_through_streaming_filter() {
        // Larger than a pipe buffer: stdin and stdout must be serviced together
        let prompt = "x".repeat(300 * 1024);
        let result = processor("cat").process(&prompt).await;
        assert_eq!(result.unwrap().len(), prompt.len());
    }

    #[tokio::test]
    async fn test_unicode_and_trimming() {
        let result = processor("cat; echo").process("Hello 世界! 🎉").await;
        assert_eq!(result.unwrap(), "Hello 世界! 🎉");
    }

    #[tokio::test]
    async fn test_complex_shell_command() {
        let result = processor("echo 'prefix:' && cat").process("test input").await;
        assert_eq!(result.unwrap(), "prefix:\ntest input");
    }
}
