//! System clipboard access
//!
//! Reads and writes go through an ordered chain of backends:
//! 1. native - arboard, talks to the platform clipboard directly
//! 2. CLI tools - wl-clipboard, xclip, xsel, pbcopy/pbpaste, powershell
//!
//! Every attempt is bounded by `clipboard.timeout_ms`. A backend that is
//! missing, fails, or times out hands over to the next one.

pub mod command;
pub mod native;

use crate::config::ClipboardConfig;
use crate::error::ClipboardError;
use std::future::Future;
use std::time::Duration;

/// Trait for clipboard backend implementations
#[async_trait::async_trait]
pub trait ClipboardBackend: Send + Sync {
    /// Read the clipboard as text
    async fn read(&self) -> Result<String, ClipboardError>;

    /// Replace the clipboard content
    async fn write(&self, text: &str) -> Result<(), ClipboardError>;

    /// Check if this backend can be used here
    async fn is_available(&self) -> bool;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Clipboard access through a fallback chain of backends
pub struct ClipboardPort {
    backends: Vec<Box<dyn ClipboardBackend>>,
    timeout: Duration,
}

impl ClipboardPort {
    pub fn new(backends: Vec<Box<dyn ClipboardBackend>>, timeout: Duration) -> Self {
        Self { backends, timeout }
    }

    /// Build the chain named in the config, or the platform default
    pub fn from_config(config: &ClipboardConfig) -> Result<Self, ClipboardError> {
        let names: Vec<String> = if config.backends.is_empty() {
            default_backend_names()
                .iter()
                .map(|s| s.to_string())
                .collect()
        } else {
            config.backends.clone()
        };

        let backends = names
            .iter()
            .map(|name| create_backend(name))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::new(
            backends,
            Duration::from_millis(config.timeout_ms),
        ))
    }

    /// Names of the configured backends, in order
    pub fn backend_names(&self) -> Vec<&'static str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    /// Read the clipboard, returning an empty string when every backend fails
    pub async fn read(&self) -> String {
        match self.try_read().await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("{}; treating clipboard as empty", e);
                String::new()
            }
        }
    }

    /// Read the clipboard, reporting failure when every backend fails
    pub async fn try_read(&self) -> Result<String, ClipboardError> {
        for backend in &self.backends {
            if !backend.is_available().await {
                tracing::debug!("{} not available, trying next", backend.name());
                continue;
            }

            match self.bounded(backend.name(), backend.read()).await {
                Ok(text) => {
                    tracing::trace!("Read {} chars via {}", text.chars().count(), backend.name());
                    return Ok(text);
                }
                Err(e) => {
                    tracing::debug!("Clipboard read via {} failed: {}", backend.name(), e);
                }
            }
        }

        Err(ClipboardError::AllBackendsFailed)
    }

    /// Write to the clipboard through the first backend that succeeds
    pub async fn write(&self, text: &str) -> Result<(), ClipboardError> {
        for backend in &self.backends {
            if !backend.is_available().await {
                tracing::debug!("{} not available, trying next", backend.name());
                continue;
            }

            match self.bounded(backend.name(), backend.write(text)).await {
                Ok(()) => {
                    tracing::debug!("Clipboard written via {}", backend.name());
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("Clipboard write failed: {}, trying next", e);
                }
            }
        }

        Err(ClipboardError::AllBackendsFailed)
    }

    /// Run one backend call under the per-attempt timeout
    async fn bounded<T>(
        &self,
        backend: &str,
        call: impl Future<Output = Result<T, ClipboardError>>,
    ) -> Result<T, ClipboardError> {
        tokio::time::timeout(self.timeout, call)
            .await
            .unwrap_or_else(|_| {
                Err(ClipboardError::Timeout {
                    backend: backend.to_string(),
                    timeout_ms: self.timeout.as_millis() as u64,
                })
            })
    }
}

/// Create a clipboard backend by name
pub fn create_backend(name: &str) -> Result<Box<dyn ClipboardBackend>, ClipboardError> {
    let backend: Box<dyn ClipboardBackend> = match name.trim().to_lowercase().as_str() {
        "native" | "arboard" => Box::new(native::NativeClipboard::new()),
        "wl-clipboard" | "wl-copy" | "wayland" => Box::new(command::CommandClipboard::wl_clipboard()),
        "xclip" => Box::new(command::CommandClipboard::xclip()),
        "xsel" => Box::new(command::CommandClipboard::xsel()),
        "pbcopy" | "pbpaste" => Box::new(command::CommandClipboard::pbcopy()),
        "powershell" => Box::new(command::CommandClipboard::powershell()),
        other => return Err(ClipboardError::UnknownBackend(other.to_string())),
    };
    Ok(backend)
}

/// Platform default backend chain
pub fn default_backend_names() -> &'static [&'static str] {
    if cfg!(target_os = "macos") {
        &["native", "pbcopy"]
    } else if cfg!(target_os = "windows") {
        &["native", "powershell"]
    } else {
        &["native", "wl-clipboard", "xclip", "xsel"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Scripted backend for exercising the chain
    struct Scripted {
        name: &'static str,
        available: bool,
        read_result: Option<String>,
        delay: Duration,
        writes: Arc<Mutex<Vec<String>>>,
        reads: Arc<AtomicUsize>,
    }

    impl Scripted {
        fn new(name: &'static str, read_result: Option<&str>) -> Self {
            Self {
                name,
                available: true,
                read_result: read_result.map(str::to_string),
                delay: Duration::ZERO,
                writes: Arc::new(Mutex::new(Vec::new())),
                reads: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait::async_trait]
    impl ClipboardBackend for Scripted {
        async fn read(&self) -> Result<String, ClipboardError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.read_result.clone().ok_or(ClipboardError::Backend {
                backend: self.name.to_string(),
                message: "scripted failure".to_string(),
            })
        }

        async fn write(&self, text: &str) -> Result<(), ClipboardError> {
            tokio::time::sleep(self.delay).await;
            if self.read_result.is_none() {
                return Err(ClipboardError::Backend {
                    backend: self.name.to_string(),
                    message: "scripted failure".to_string(),
                });
            }
            self.writes.lock().unwrap().push(text.to_string());
            Ok(())
        }

        async fn is_available(&self) -> bool {
            self.available
        }

        fn name(&self) -> &'static str {
            self.name
        }
    }

    fn chain(backends: Vec<Scripted>) -> ClipboardPort {
        ClipboardPort::new(
            backends
                .into_iter()
                .map(|b| Box::new(b) as Box<dyn ClipboardBackend>)
                .collect(),
            Duration::from_millis(50),
        )
    }

    #[tokio::test]
    async fn test_read_first_success_wins() {
        let first = Scripted::new("first", None);
        let second = Scripted::new("second", Some("from second"));
        let third = Scripted::new("third", Some("from third"));
        let third_reads = third.reads.clone();

        let port = chain(vec![first, second, third]);
        assert_eq!(port.read().await, "from second");
        assert_eq!(third_reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_read_all_fail_is_empty() {
        let port = chain(vec![Scripted::new("a", None), Scripted::new("b", None)]);
        assert_eq!(port.read().await, "");
        assert!(matches!(
            port.try_read().await,
            Err(ClipboardError::AllBackendsFailed)
        ));
    }

    #[tokio::test]
    async fn test_read_timeout_falls_through() {
        let mut slow = Scripted::new("slow", Some("too late"));
        slow.delay = Duration::from_millis(500);
        let fast = Scripted::new("fast", Some("on time"));

        let port = chain(vec![slow, fast]);
        assert_eq!(port.read().await, "on time");
    }

    #[tokio::test]
    async fn test_slow_call_reports_timeout() {
        let port = chain(Vec::new());
        let result = port
            .bounded("slow", async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                Ok::<_, ClipboardError>(())
            })
            .await;

        match result {
            Err(ClipboardError::Timeout { backend, timeout_ms }) => {
                assert_eq!(backend, "slow");
                assert_eq!(timeout_ms, 50);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unavailable_backend_skipped() {
        let mut missing = Scripted::new("missing", Some("never"));
        missing.available = false;
        let missing_reads = missing.reads.clone();

        let port = chain(vec![missing, Scripted::new("present", Some("hello"))]);
        assert_eq!(port.read().await, "hello");
        assert_eq!(missing_reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_write_fallback_and_failure() {
        let broken = Scripted::new("broken", None);
        let working = Scripted::new("working", Some(""));
        let writes = working.writes.clone();

        let port = chain(vec![broken, working]);
        port.write("answer").await.unwrap();
        assert_eq!(writes.lock().unwrap().as_slice(), ["answer".to_string()]);

        let port = chain(vec![Scripted::new("broken", None)]);
        assert!(matches!(
            port.write("answer").await,
            Err(ClipboardError::AllBackendsFailed)
        ));
    }

    #[test]
    fn test_create_backend_names() {
        assert_eq!(create_backend("native").unwrap().name(), "native");
        assert_eq!(create_backend("XClip").unwrap().name(), "xclip");
        assert_eq!(create_backend("wl-clipboard").unwrap().name(), "wl-clipboard");
        assert!(matches!(
            create_backend("carrier-pigeon"),
            Err(ClipboardError::UnknownBackend(_))
        ));
    }

    #[test]
    fn test_from_config_default_chain() {
        let config = ClipboardConfig::default();
        let port = ClipboardPort::from_config(&config).unwrap();
        assert_eq!(port.backend_names().first(), Some(&"native"));
        assert_eq!(port.backend_names().len(), default_backend_names().len());

        let config = ClipboardConfig {
            backends: vec!["xsel".to_string()],
            ..Default::default()
        };
        let port = ClipboardPort::from_config(&config).unwrap();
        assert_eq!(port.backend_names(), vec!["xsel"]);
    }
}
