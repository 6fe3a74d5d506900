//! State machine for the capture cycle
//!
//! Idle → Capturing → Simulating → Resolving → Dispatching → Working → Idle
//!
//! SecondaryAssist skips Simulating. An empty selection returns to Idle
//! from Dispatching without reaching Working.

use std::path::{Path, PathBuf};

/// Capture cycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureState {
    /// Waiting for a hotkey
    #[default]
    Idle,
    /// Snapshotting the clipboard
    Capturing,
    /// Sending the synthetic copy chord and waiting for it to settle
    Simulating,
    /// Re-reading the clipboard and choosing the text
    Resolving,
    /// Validating text and building the prompt
    Dispatching,
    /// Waiting on the AI processor
    Working,
}

impl CaptureState {
    /// Lowercase name written to the state file
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureState::Idle => "idle",
            CaptureState::Capturing => "capturing",
            CaptureState::Simulating => "simulating",
            CaptureState::Resolving => "resolving",
            CaptureState::Dispatching => "dispatching",
            CaptureState::Working => "working",
        }
    }

    /// Parse a state file value
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "idle" => Some(CaptureState::Idle),
            "capturing" => Some(CaptureState::Capturing),
            "simulating" => Some(CaptureState::Simulating),
            "resolving" => Some(CaptureState::Resolving),
            "dispatching" => Some(CaptureState::Dispatching),
            "working" => Some(CaptureState::Working),
            _ => None,
        }
    }
}

impl std::fmt::Display for CaptureState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureState::Idle => write!(f, "Idle"),
            CaptureState::Capturing => write!(f, "Capturing clipboard"),
            CaptureState::Simulating => write!(f, "Simulating copy"),
            CaptureState::Resolving => write!(f, "Resolving text"),
            CaptureState::Dispatching => write!(f, "Dispatching"),
            CaptureState::Working => write!(f, "Waiting for AI response"),
        }
    }
}

/// State file for external integrations (e.g., Waybar)
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the state, creating the parent directory if needed
    pub fn write(&self, state: CaptureState) {
        if let Some(parent) = self.path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!("Failed to create state file directory: {}", e);
                return;
            }
        }

        if let Err(e) = std::fs::write(&self.path, state.as_str()) {
            tracing::warn!("Failed to write state file: {}", e);
        } else {
            tracing::trace!("State file updated: {}", state.as_str());
        }
    }

    /// Read the state last written by a daemon
    pub fn read(&self) -> Option<CaptureState> {
        std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|s| CaptureState::parse(&s))
    }

    /// Remove state file on shutdown
    pub fn cleanup(&self) {
        if self.path.exists() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                tracing::warn!("Failed to remove state file: {}", e);
            }
        }
    }
}
