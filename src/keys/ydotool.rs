//! ydotool-based copy chord
//!
//! Uses ydotool to emit raw evdev key codes through uinput. This works on
//! all Wayland compositors, where XTest-based injection does not.
//!
//! Requires:
//! - ydotool installed
//! - ydotoold daemon running (systemctl --user start ydotool)
//! - User in 'input' group

use super::KeySimulator;
use crate::config::CopyModifier;
use crate::error::KeySimError;
use std::process::Stdio;
use tokio::process::Command;

/// Linux input event codes
const KEY_LEFTCTRL: u16 = 29;
const KEY_LEFTMETA: u16 = 125;
const KEY_C: u16 = 46;

/// ydotool-based copy chord
pub struct YdotoolSimulator {
    modifier: CopyModifier,
}

impl YdotoolSimulator {
    pub fn new(modifier: CopyModifier) -> Self {
        Self {
            modifier: modifier.resolve(),
        }
    }

    /// `code:1` presses, `code:0` releases
    fn key_args(&self) -> Vec<String> {
        let modifier = match self.modifier {
            CopyModifier::Meta => KEY_LEFTMETA,
            _ => KEY_LEFTCTRL,
        };

        vec![
            format!("{}:1", modifier),
            format!("{}:1", KEY_C),
            format!("{}:0", KEY_C),
            format!("{}:0", modifier),
        ]
    }
}

#[async_trait::async_trait]
impl KeySimulator for YdotoolSimulator {
    async fn simulate_copy_shortcut(&self) -> Result<(), KeySimError> {
        let output = Command::new("ydotool")
            .arg("key")
            .args(self.key_args())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    KeySimError::YdotoolNotFound
                } else {
                    KeySimError::YdotoolFailed(e.to_string())
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);

            if stderr.contains("socket") || stderr.contains("connect") || stderr.contains("daemon")
            {
                return Err(KeySimError::YdotoolNotRunning);
            }

            return Err(KeySimError::YdotoolFailed(stderr.trim().to_string()));
        }

        Ok(())
    }

    async fn is_available(&self) -> bool {
        which::which("ydotool").is_ok()
    }

    fn name(&self) -> &'static str {
        "ydotool"
    }
}
