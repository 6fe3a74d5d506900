//! Native clipboard access using arboard
//!
//! arboard calls block, so they run on the blocking pool. One handle is
//! kept alive for the life of the backend: on X11 the clipboard content
//! belongs to the process that set it, and dropping the last handle would
//! drop a response we just copied.

use super::ClipboardBackend;
use crate::error::ClipboardError;
use std::sync::{Arc, Mutex};

/// arboard-backed clipboard
pub struct NativeClipboard {
    handle: Arc<Mutex<Option<arboard::Clipboard>>>,
}

impl NativeClipboard {
    pub fn new() -> Self {
        Self {
            handle: Arc::new(Mutex::new(None)),
        }
    }

    /// Run `f` against the shared handle on the blocking pool
    async fn with_handle<T, F>(&self, f: F) -> Result<T, ClipboardError>
    where
        T: Send + 'static,
        F: FnOnce(&mut arboard::Clipboard) -> Result<T, arboard::Error> + Send + 'static,
    {
        let handle = self.handle.clone();

        tokio::task::spawn_blocking(move || {
            let mut guard = handle.lock().map_err(|_| backend_error("clipboard lock poisoned"))?;

            if guard.is_none() {
                *guard = Some(arboard::Clipboard::new().map_err(|e| backend_error(&e.to_string()))?);
            }

            let clipboard = guard
                .as_mut()
                .ok_or_else(|| backend_error("clipboard handle missing"))?;

            f(clipboard).map_err(|e| {
                // Start fresh next time in case the handle went bad
                *guard = None;
                backend_error(&e.to_string())
            })
        })
        .await
        .map_err(|e| backend_error(&e.to_string()))?
    }
}

impl Default for NativeClipboard {
    fn default() -> Self {
        Self::new()
    }
}

fn backend_error(message: &str) -> ClipboardError {
    ClipboardError::Backend {
        backend: "native".to_string(),
        message: message.to_string(),
    }
}

#[async_trait::async_trait]
impl ClipboardBackend for NativeClipboard {
    async fn read(&self) -> Result<String, ClipboardError> {
        self.with_handle(|clipboard| match clipboard.get_text() {
            Ok(text) => Ok(text),
            // Empty clipboard or non-text content
            Err(arboard::Error::ContentNotAvailable) => Ok(String::new()),
            Err(e) => Err(e),
        })
        .await
    }

    async fn write(&self, text: &str) -> Result<(), ClipboardError> {
        let text = text.to_string();
        self.with_handle(move |clipboard| clipboard.set_text(text))
            .await
    }

    async fn is_available(&self) -> bool {
        if cfg!(all(unix, not(target_os = "macos"))) {
            // arboard needs a display server on Linux/BSD
            std::env::var_os("DISPLAY").is_some() || std::env::var_os("WAYLAND_DISPLAY").is_some()
        } else {
            true
        }
    }

    fn name(&self) -> &'static str {
        "native"
    }
}
