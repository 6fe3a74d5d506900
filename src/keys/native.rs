//! enigo-based copy chord
//!
//! A fresh `Enigo` is created per call on the blocking pool; the handle is
//! not `Send` on every platform.

use super::KeySimulator;
use crate::config::CopyModifier;
use crate::error::KeySimError;
use enigo::{Direction, Enigo, Key, Keyboard, Settings};

/// Sends the copy chord through enigo
pub struct EnigoSimulator {
    modifier: CopyModifier,
}

impl EnigoSimulator {
    pub fn new(modifier: CopyModifier) -> Self {
        Self {
            modifier: modifier.resolve(),
        }
    }
}

fn modifier_key(modifier: CopyModifier) -> Key {
    match modifier.resolve() {
        CopyModifier::Meta => Key::Meta,
        _ => Key::Control,
    }
}

fn press_copy(modifier: Key) -> Result<(), KeySimError> {
    let mut enigo = Enigo::new(&Settings::default())
        .map_err(|e| KeySimError::Enigo(format!("Failed to initialize Enigo: {}", e)))?;

    enigo
        .key(modifier, Direction::Press)
        .map_err(|e| KeySimError::Enigo(format!("Failed to press modifier: {}", e)))?;

    let click = enigo.key(Key::Unicode('c'), Direction::Click);

    // Always release the modifier, even if the click failed
    let release = enigo.key(modifier, Direction::Release);

    click.map_err(|e| KeySimError::Enigo(format!("Failed to click key: {}", e)))?;
    release.map_err(|e| KeySimError::Enigo(format!("Failed to release modifier: {}", e)))?;

    Ok(())
}

#[async_trait::async_trait]
impl KeySimulator for EnigoSimulator {
    async fn simulate_copy_shortcut(&self) -> Result<(), KeySimError> {
        let modifier = modifier_key(self.modifier);

        tokio::task::spawn_blocking(move || press_copy(modifier))
            .await
            .map_err(|e| KeySimError::Enigo(e.to_string()))?
    }

    fn name(&self) -> &'static str {
        "enigo"
    }
}
