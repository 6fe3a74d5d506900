//! Error types for hotprompt
//!
//! Uses thiserror for ergonomic error definitions with clear messages
//! that guide users toward fixing common issues.

use thiserror::Error;

/// Top-level error type for the hotprompt application
#[derive(Error, Debug)]
pub enum HotpromptError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Hotkey error: {0}")]
    Hotkey(#[from] HotkeyError),

    #[error("Clipboard error: {0}")]
    Clipboard(#[from] ClipboardError),

    #[error("AI error: {0}")]
    Ai(#[from] AiError),

    #[error("Another hotprompt daemon is already running (lock: {0})")]
    AlreadyRunning(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to global hotkey registration
#[derive(Error, Debug)]
pub enum HotkeyError {
    #[error("Permission denied for global hotkeys: {0}\n  Linux: sudo usermod -aG input $USER, then log out and back in.\n  macOS: grant Accessibility access in System Settings > Privacy & Security.")]
    PermissionDenied(String),

    #[error("Unknown key name: '{0}'")]
    UnknownKey(String),

    #[error("Invalid key combination '{0}': {1}")]
    InvalidCombo(String, String),

    #[error("No hotkey bindings configured")]
    NoBindings,

    #[error("No keyboard device found in /dev/input/")]
    NoKeyboard,

    #[error("Hotkey backend '{0}' is not supported on this platform")]
    NotSupported(String),

    #[error("Hotkey listener failed: {0}")]
    Listener(String),
}

/// Errors related to clipboard access
#[derive(Error, Debug)]
pub enum ClipboardError {
    #[error("{0} not found in PATH")]
    BackendUnavailable(String),

    #[error("{backend} timed out after {timeout_ms}ms")]
    Timeout { backend: String, timeout_ms: u64 },

    #[error("{backend} failed: {message}")]
    Backend { backend: String, message: String },

    #[error("Unknown clipboard backend: '{0}'")]
    UnknownBackend(String),

    #[error("All clipboard backends failed. Install wl-clipboard, xclip or xsel.")]
    AllBackendsFailed,
}

/// Errors related to synthesizing the copy keystroke
#[derive(Error, Debug)]
pub enum KeySimError {
    #[error("enigo error: {0}")]
    Enigo(String),

    #[error("ydotool not found in PATH. Install via your package manager.")]
    YdotoolNotFound,

    #[error("ydotool daemon not running.\n  Start with: systemctl --user start ydotool")]
    YdotoolNotRunning,

    #[error("ydotool failed: {0}")]
    YdotoolFailed(String),

    #[error("All key simulators failed")]
    AllMethodsFailed,
}

/// Errors returned by an AI processor
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AiError {
    #[error("AI backend not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Authentication failed (HTTP {0}). Check your API key.")]
    Auth(u16),

    #[error("Rate limited by the AI service. Try again later.")]
    RateLimited,

    #[error("Network error: {0}")]
    Network(String),

    #[error("AI service returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected response: {0}")]
    Parse(String),

    #[error("Command failed: {0}")]
    Command(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using HotpromptError
pub type Result<T> = std::result::Result<T, HotpromptError>;
