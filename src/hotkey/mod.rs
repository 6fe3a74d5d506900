//! Hotkey detection module
//!
//! On Linux, provides kernel-level key event detection using evdev.
//! This approach works on all Wayland compositors because it
//! operates at the Linux input subsystem level.
//!
//! On macOS, Windows and X11 sessions without input-group access, the
//! rdev backend hooks key events through the display server instead.
//!
//! Linux (evdev): Requires the user to be in the 'input' group.
//! macOS (rdev): Requires Accessibility permission.

pub mod combo;
#[cfg(target_os = "linux")]
pub mod evdev_listener;
pub mod rdev_listener;

use crate::config::{HotkeyBackend, HotkeyConfig};
use crate::error::HotkeyError;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

pub use combo::{parse_bindings, parse_combo, Binding, KeyCombo, Modifier};

/// What a hotkey asks the daemon to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HotkeyAction {
    /// Capture the current selection and run the primary prompt
    PrimaryCapture,
    /// Send the existing clipboard content with the secondary prompt
    SecondaryAssist,
}

impl std::fmt::Display for HotkeyAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HotkeyAction::PrimaryCapture => write!(f, "primary_capture"),
            HotkeyAction::SecondaryAssist => write!(f, "secondary_assist"),
        }
    }
}

/// Events emitted by the hotkey listener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyEvent {
    /// A bound combination was pressed
    Triggered(HotkeyAction),
}

/// Trait for hotkey detection implementations
#[async_trait::async_trait]
pub trait HotkeyListener: Send + Sync {
    /// Start listening for hotkey events
    /// Returns a channel receiver for events
    async fn start(&mut self) -> Result<mpsc::Receiver<HotkeyEvent>, HotkeyError>;

    /// Stop listening and clean up
    async fn stop(&mut self) -> Result<(), HotkeyError>;

    /// Backend name for logs
    fn name(&self) -> &'static str;
}

/// Factory function to create the appropriate hotkey listener
///
/// `auto` picks evdev on Linux and rdev everywhere else.
pub fn create_listener(config: &HotkeyConfig) -> Result<Box<dyn HotkeyListener>, HotkeyError> {
    let bindings = parse_bindings(&config.bindings)?;

    for binding in &bindings {
        tracing::debug!("Binding {} -> {}", binding.combo, binding.action);
    }

    match config.backend {
        HotkeyBackend::Auto => create_default(&bindings),
        HotkeyBackend::Evdev => create_evdev(&bindings),
        HotkeyBackend::Rdev => Ok(Box::new(rdev_listener::RdevListener::new(&bindings)?)),
    }
}

#[cfg(target_os = "linux")]
fn create_default(bindings: &[Binding]) -> Result<Box<dyn HotkeyListener>, HotkeyError> {
    create_evdev(bindings)
}

#[cfg(not(target_os = "linux"))]
fn create_default(bindings: &[Binding]) -> Result<Box<dyn HotkeyListener>, HotkeyError> {
    Ok(Box::new(rdev_listener::RdevListener::new(bindings)?))
}

#[cfg(target_os = "linux")]
fn create_evdev(bindings: &[Binding]) -> Result<Box<dyn HotkeyListener>, HotkeyError> {
    Ok(Box::new(evdev_listener::EvdevListener::new(bindings)?))
}

#[cfg(not(target_os = "linux"))]
fn create_evdev(_bindings: &[Binding]) -> Result<Box<dyn HotkeyListener>, HotkeyError> {
    Err(HotkeyError::NotSupported("evdev".to_string()))
}
