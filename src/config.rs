//! Configuration loading and types for hotprompt
//!
//! Configuration is loaded in layers:
//! 1. Built-in defaults
//! 2. Config file (~/.config/hotprompt/config.toml)
//! 3. Environment variables (HOTPROMPT_*, plus the provider key variable)
//! 4. CLI arguments (highest priority)

use crate::error::HotpromptError;
use crate::hotkey::HotkeyAction;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default configuration file content
pub const DEFAULT_CONFIG: &str = r#"# hotprompt configuration
#
# Location: ~/.config/hotprompt/config.toml
# All settings can be overridden via CLI flags

# State file for external integrations (status bars, scripts)
# Use "auto" for $XDG_RUNTIME_DIR/hotprompt/state, a custom path,
# or "disabled" to turn off.
state_file = "auto"

# Append-only activity log. "auto" writes to the data directory,
# "disabled" keeps logging on stderr only.
log_file = "auto"

[hotkey]
# Enable built-in global hotkey detection
enabled = true

# Exit with an error instead of running without hotkeys when the OS
# refuses access to the keyboard
required = false

# Listener backend: "auto", "evdev" (Linux, works on Wayland) or "rdev"
backend = "auto"

# Key combination -> action
# Actions: "primary_capture" (copy the selection, then ask)
#          "secondary_assist" (ask about the current clipboard)
[hotkey.bindings]
"Ctrl+F9" = "primary_capture"
"Ctrl+Shift+A" = "secondary_assist"

[capture]
# Wait after the synthetic copy before re-reading the clipboard
settle_delay_ms = 300

# Wait before the synthetic copy so the hotkey modifiers are released
pre_copy_delay_ms = 100

# Modifier for the copy chord: "auto" (Cmd on macOS, Ctrl elsewhere), "ctrl", "meta"
copy_modifier = "auto"

# Key simulator: "auto" (enigo, then ydotool), "enigo", "ydotool"
simulator = "auto"

# Show a notification when a hotkey press is dropped because a request is running
notify_when_busy = true

[clipboard]
# Per-backend timeout
timeout_ms = 1000

# Backend order. Empty uses the platform default.
# Available: native, wl-clipboard, xclip, xsel, pbcopy, powershell
backends = []

[ai]
# "openai" (any OpenAI-compatible endpoint) or "command"
backend = "openai"
base_url = "https://generativelanguage.googleapis.com/v1beta/openai"
model = "gemini-1.5-flash"

# Environment variable holding the API key (HOTPROMPT_API_KEY always wins)
api_key_env = "GEMINI_API_KEY"

max_tokens = 150
timeout_secs = 30
system_prompt = "You are a helpful AI assistant. Provide clear, concise responses."
primary_prompt = "Please explain or help with: {text}"
secondary_prompt = "Quick analysis: {text}"

# Used when backend = "command": receives the prompt on stdin
# command = "ollama run llama3.2"

[output]
# Show the response as a desktop notification
notification = true
notification_max_chars = 200

# Print the full response to stdout
print_response = true

# Put the response on the clipboard
copy_response = false
"#;

/// Hotkey listener backend
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum HotkeyBackend {
    /// evdev on Linux, rdev elsewhere
    #[default]
    Auto,
    /// Kernel-level input devices (Linux only)
    Evdev,
    /// rdev global listener (macOS, Windows, X11)
    Rdev,
}

/// Modifier used for the synthetic copy chord
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CopyModifier {
    /// Cmd on macOS, Ctrl elsewhere
    #[default]
    Auto,
    Ctrl,
    Meta,
}

impl CopyModifier {
    /// Resolve `Auto` for the current platform
    pub fn resolve(self) -> CopyModifier {
        match self {
            CopyModifier::Auto if cfg!(target_os = "macos") => CopyModifier::Meta,
            CopyModifier::Auto => CopyModifier::Ctrl,
            other => other,
        }
    }
}

/// Key simulator selection
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SimulatorKind {
    /// enigo first, ydotool as fallback
    #[default]
    Auto,
    Enigo,
    Ydotool,
}

/// AI processor backend
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AiBackend {
    /// OpenAI-compatible chat completions endpoint
    #[default]
    OpenAi,
    /// External command reading the prompt on stdin
    Command,
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Optional path to state file for external integrations
    /// The daemon writes the current capture state ("idle", "capturing",
    /// "working", ...) to this file whenever it changes.
    #[serde(default)]
    pub state_file: Option<String>,

    /// Optional append-only activity log ("auto", a path, or "disabled")
    #[serde(default)]
    pub log_file: Option<String>,

    #[serde(default)]
    pub hotkey: HotkeyConfig,

    #[serde(default)]
    pub capture: CaptureConfig,

    #[serde(default)]
    pub clipboard: ClipboardConfig,

    #[serde(default)]
    pub ai: AiConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Global hotkey configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HotkeyConfig {
    /// Enable built-in hotkey detection (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Treat a hotkey registration failure as fatal
    #[serde(default)]
    pub required: bool,

    /// Listener backend
    #[serde(default)]
    pub backend: HotkeyBackend,

    /// Key combination string -> action
    /// Examples: "Ctrl+F9", "<ctrl>+<shift>+a"
    #[serde(default = "default_bindings")]
    pub bindings: BTreeMap<String, HotkeyAction>,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            required: false,
            backend: HotkeyBackend::default(),
            bindings: default_bindings(),
        }
    }
}

fn default_bindings() -> BTreeMap<String, HotkeyAction> {
    let mut bindings = BTreeMap::new();
    bindings.insert("Ctrl+F9".to_string(), HotkeyAction::PrimaryCapture);
    bindings.insert("Ctrl+Shift+A".to_string(), HotkeyAction::SecondaryAssist);
    bindings
}

/// Capture cycle timing and key simulation
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CaptureConfig {
    /// Wait after the synthetic copy before re-reading the clipboard (ms)
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,

    /// Wait before the synthetic copy so hotkey modifiers are released (ms)
    #[serde(default = "default_pre_copy_delay")]
    pub pre_copy_delay_ms: u64,

    /// Modifier used for the copy chord
    #[serde(default)]
    pub copy_modifier: CopyModifier,

    /// Which key simulator to use
    #[serde(default)]
    pub simulator: SimulatorKind,

    /// Notify when a trigger is dropped because a request is in flight
    #[serde(default = "default_true")]
    pub notify_when_busy: bool,
}

fn default_settle_delay() -> u64 {
    300
}

fn default_pre_copy_delay() -> u64 {
    100
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay(),
            pre_copy_delay_ms: default_pre_copy_delay(),
            copy_modifier: CopyModifier::default(),
            simulator: SimulatorKind::default(),
            notify_when_busy: true,
        }
    }
}

/// Clipboard backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClipboardConfig {
    /// Timeout for each backend attempt (ms)
    #[serde(default = "default_clipboard_timeout")]
    pub timeout_ms: u64,

    /// Backend names in the order they are tried; empty uses the platform default
    #[serde(default)]
    pub backends: Vec<String>,
}

fn default_clipboard_timeout() -> u64 {
    1000
}

impl Default for ClipboardConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_clipboard_timeout(),
            backends: Vec::new(),
        }
    }
}

/// AI processor configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AiConfig {
    #[serde(default)]
    pub backend: AiBackend,

    /// Base URL of the OpenAI-compatible API (without /chat/completions)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// API key stored in the config file (prefer the environment)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable consulted for the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Request timeout in seconds
    #[serde(default = "default_ai_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Prompt template for the primary capture action ({text} is replaced)
    #[serde(default = "default_primary_prompt")]
    pub primary_prompt: String,

    /// Prompt template for the secondary assist action ({text} is replaced)
    #[serde(default = "default_secondary_prompt")]
    pub secondary_prompt: String,

    /// Shell command for backend = "command"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta/openai".to_string()
}

fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_max_tokens() -> u32 {
    150
}

fn default_ai_timeout() -> u64 {
    30
}

fn default_system_prompt() -> String {
    "You are a helpful AI assistant. Provide clear, concise responses.".to_string()
}

fn default_primary_prompt() -> String {
    "Please explain or help with: {text}".to_string()
}

fn default_secondary_prompt() -> String {
    "Quick analysis: {text}".to_string()
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            backend: AiBackend::default(),
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            api_key_env: default_api_key_env(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_ai_timeout(),
            system_prompt: default_system_prompt(),
            primary_prompt: default_primary_prompt(),
            secondary_prompt: default_secondary_prompt(),
            command: None,
        }
    }
}

impl AiConfig {
    /// API key from the config file or the configured environment variable.
    /// Empty values count as missing.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| {
                std::env::var(&self.api_key_env)
                    .ok()
                    .filter(|k| !k.trim().is_empty())
            })
    }

    /// Build the prompt sent for a given action
    pub fn render_prompt(&self, action: HotkeyAction, text: &str) -> String {
        let template = match action {
            HotkeyAction::PrimaryCapture => &self.primary_prompt,
            HotkeyAction::SecondaryAssist => &self.secondary_prompt,
        };

        if template.contains("{text}") {
            template.replace("{text}", text)
        } else if template.trim().is_empty() {
            text.to_string()
        } else {
            format!("{} {}", template.trim_end(), text)
        }
    }
}

/// Response presentation configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Show the response as a desktop notification
    #[serde(default = "default_true")]
    pub notification: bool,

    /// Truncate notification bodies to this many characters
    #[serde(default = "default_notification_max_chars")]
    pub notification_max_chars: usize,

    /// Print the full response to stdout
    #[serde(default = "default_true")]
    pub print_response: bool,

    /// Copy the response to the clipboard
    #[serde(default)]
    pub copy_response: bool,
}

fn default_notification_max_chars() -> usize {
    200
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            notification: true,
            notification_max_chars: default_notification_max_chars(),
            print_response: true,
            copy_response: false,
        }
    }
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hotkey: HotkeyConfig::default(),
            capture: CaptureConfig::default(),
            clipboard: ClipboardConfig::default(),
            ai: AiConfig::default(),
            output: OutputConfig::default(),
            state_file: Some("auto".to_string()),
            log_file: Some("auto".to_string()),
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "hotprompt")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get the runtime directory for ephemeral files (state, lock)
    pub fn runtime_dir() -> PathBuf {
        // Use XDG_RUNTIME_DIR if available, otherwise fall back to the temp dir
        std::env::var("XDG_RUNTIME_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir())
            .join("hotprompt")
    }

    /// Get the data directory path (activity log)
    pub fn data_dir() -> PathBuf {
        directories::ProjectDirs::from("", "", "hotprompt")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Resolve the state file path from config
    /// Returns None if state_file is not configured or explicitly disabled
    pub fn resolve_state_file(&self) -> Option<PathBuf> {
        resolve_optional_path(self.state_file.as_deref(), || {
            Self::runtime_dir().join("state")
        })
    }

    /// Resolve the activity log path from config
    pub fn resolve_log_file(&self) -> Option<PathBuf> {
        resolve_optional_path(self.log_file.as_deref(), || {
            Self::data_dir().join("hotprompt.log")
        })
    }

    /// Reject settings that can never work
    pub fn validate(&self) -> Result<(), HotpromptError> {
        if self.hotkey.enabled && self.hotkey.bindings.is_empty() {
            return Err(HotpromptError::Config(
                "hotkey.enabled is true but hotkey.bindings is empty".into(),
            ));
        }
        if self.clipboard.timeout_ms == 0 {
            return Err(HotpromptError::Config(
                "clipboard.timeout_ms must be greater than 0".into(),
            ));
        }
        if self.ai.timeout_secs == 0 {
            return Err(HotpromptError::Config(
                "ai.timeout_secs must be greater than 0".into(),
            ));
        }
        if self.capture.settle_delay_ms > 5000 {
            return Err(HotpromptError::Config(format!(
                "capture.settle_delay_ms = {} is too long (max 5000)",
                self.capture.settle_delay_ms
            )));
        }
        if self.ai.max_tokens == 0 {
            return Err(HotpromptError::Config(
                "ai.max_tokens must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

fn resolve_optional_path(value: Option<&str>, auto: impl FnOnce() -> PathBuf) -> Option<PathBuf> {
    value.and_then(|path| match path.to_lowercase().as_str() {
        "disabled" | "none" | "off" | "false" | "" => None,
        "auto" => Some(auto()),
        _ => Some(PathBuf::from(path)),
    })
}

/// Load configuration from file, with defaults for missing values
pub fn load_config(path: Option<&Path>) -> Result<Config, HotpromptError> {
    // Start with defaults
    let mut config = Config::default();

    // Determine config file path
    let config_path = path.map(PathBuf::from).or_else(Config::default_path);

    // Load from file if it exists
    if let Some(ref path) = config_path {
        if path.exists() {
            tracing::debug!("Loading config from {:?}", path);
            let contents = std::fs::read_to_string(path)
                .map_err(|e| HotpromptError::Config(format!("Failed to read config: {}", e)))?;

            config = toml::from_str(&contents)
                .map_err(|e| HotpromptError::Config(format!("Invalid config: {}", e)))?;
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
        }
    }

    apply_env_overrides(&mut config);
    config.validate()?;

    Ok(config)
}

/// Override config values from HOTPROMPT_* environment variables
fn apply_env_overrides(config: &mut Config) {
    if let Ok(key) = std::env::var("HOTPROMPT_API_KEY") {
        if !key.trim().is_empty() {
            config.ai.api_key = Some(key);
        }
    }
    if let Ok(model) = std::env::var("HOTPROMPT_MODEL") {
        config.ai.model = model;
    }
    if let Ok(url) = std::env::var("HOTPROMPT_BASE_URL") {
        config.ai.base_url = url;
    }
    if let Ok(ms) = std::env::var("HOTPROMPT_SETTLE_MS") {
        match ms.parse() {
            Ok(ms) => config.capture.settle_delay_ms = ms,
            Err(_) => tracing::warn!("Ignoring invalid HOTPROMPT_SETTLE_MS: {:?}", ms),
        }
    }
}

/// Write the commented default config unless a file already exists
pub fn write_default_config(path: &Path) -> Result<bool, HotpromptError> {
    if path.exists() {
        return Ok(false);
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| HotpromptError::Config(format!("Failed to create config dir: {}", e)))?;
    }

    std::fs::write(path, DEFAULT_CONFIG)
        .map_err(|e| HotpromptError::Config(format!("Failed to write config: {}", e)))?;

    Ok(true)
}
