//! Synthetic copy keystroke
//!
//! Fallback chain for `capture.simulator = "auto"`:
//! 1. enigo (native) - platform input APIs (X11/XTest, macOS CGEvent, Windows SendInput)
//! 2. ydotool - uinput, works on Wayland compositors, requires daemon

pub mod native;
pub mod ydotool;

use crate::config::{CaptureConfig, CopyModifier, SimulatorKind};
use crate::error::KeySimError;

/// Trait for copy-chord implementations
#[async_trait::async_trait]
pub trait KeySimulator: Send + Sync {
    /// Press and release the platform copy chord (Ctrl+C / Cmd+C)
    async fn simulate_copy_shortcut(&self) -> Result<(), KeySimError>;

    /// Check if this simulator can be used here
    async fn is_available(&self) -> bool {
        true
    }

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Tries each simulator in order until one succeeds
pub struct SimulatorChain {
    simulators: Vec<Box<dyn KeySimulator>>,
}

impl SimulatorChain {
    pub fn new(simulators: Vec<Box<dyn KeySimulator>>) -> Self {
        Self { simulators }
    }

    pub fn from_config(config: &CaptureConfig) -> Self {
        let modifier = config.copy_modifier.resolve();
        let mut simulators: Vec<Box<dyn KeySimulator>> = Vec::new();

        match config.simulator {
            SimulatorKind::Auto => {
                simulators.push(Box::new(native::EnigoSimulator::new(modifier)));
                if cfg!(target_os = "linux") {
                    simulators.push(Box::new(ydotool::YdotoolSimulator::new(modifier)));
                }
            }
            SimulatorKind::Enigo => {
                simulators.push(Box::new(native::EnigoSimulator::new(modifier)));
            }
            SimulatorKind::Ydotool => {
                simulators.push(Box::new(ydotool::YdotoolSimulator::new(modifier)));
            }
        }

        tracing::debug!(
            "Copy chord: {:?}+C via {:?}",
            modifier,
            simulators.iter().map(|s| s.name()).collect::<Vec<_>>()
        );

        Self::new(simulators)
    }
}

#[async_trait::async_trait]
impl KeySimulator for SimulatorChain {
    async fn simulate_copy_shortcut(&self) -> Result<(), KeySimError> {
        for simulator in &self.simulators {
            if !simulator.is_available().await {
                tracing::debug!("{} not available, trying next", simulator.name());
                continue;
            }

            match simulator.simulate_copy_shortcut().await {
                Ok(()) => {
                    tracing::debug!("Copy chord sent via {}", simulator.name());
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("{} failed: {}, trying next", simulator.name(), e);
                }
            }
        }

        Err(KeySimError::AllMethodsFailed)
    }

    fn name(&self) -> &'static str {
        "chain"
    }
}

/// Name of the modifier for messages
pub fn modifier_label(modifier: CopyModifier) -> &'static str {
    match modifier.resolve() {
        CopyModifier::Meta if cfg!(target_os = "macos") => "Cmd",
        CopyModifier::Meta => "Super",
        _ => "Ctrl",
    }
}
