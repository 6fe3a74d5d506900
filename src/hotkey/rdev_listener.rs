//! Global hotkey support using rdev
//!
//! Hooks keyboard events through the display server (CGEventTap on macOS,
//! XRecord on X11, low-level hooks on Windows). On macOS this requires
//! Accessibility permission to be granted to the terminal/app.
//!
//! rdev's `listen()` blocks forever and has no stop handle, so it runs on a
//! dedicated thread and stop only flips a flag that makes the callback inert.

use super::combo::{Binding, ComboMatcher, Modifier};
use super::{HotkeyAction, HotkeyEvent, HotkeyListener};
use crate::error::HotkeyError;
use rdev::{listen, Event, EventType, Key, ListenError};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// How long to wait for `listen()` to fail before assuming it is running
const STARTUP_GRACE: Duration = Duration::from_millis(250);

/// rdev-based hotkey listener
pub struct RdevListener {
    bindings: Vec<(BTreeSet<Modifier>, Key, HotkeyAction)>,
    running: Arc<AtomicBool>,
    thread_handle: Option<std::thread::JoinHandle<()>>,
}

impl RdevListener {
    /// Create a new rdev hotkey listener
    pub fn new(bindings: &[Binding]) -> Result<Self, HotkeyError> {
        let bindings = bindings
            .iter()
            .map(|b| {
                let key = parse_key_name(&b.combo.key)
                    .ok_or_else(|| HotkeyError::UnknownKey(b.combo.key.clone()))?;
                Ok((b.combo.modifiers.clone(), key, b.action))
            })
            .collect::<Result<Vec<_>, HotkeyError>>()?;

        Ok(Self {
            bindings,
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        })
    }
}

#[async_trait::async_trait]
impl HotkeyListener for RdevListener {
    async fn start(&mut self) -> Result<mpsc::Receiver<HotkeyEvent>, HotkeyError> {
        let (tx, rx) = mpsc::channel(32);
        let (err_tx, err_rx) = std::sync::mpsc::channel::<HotkeyError>();

        let mut matcher = ComboMatcher::new(self.bindings.clone());
        let running = self.running.clone();
        running.store(true, Ordering::SeqCst);

        let thread_handle = std::thread::spawn(move || {
            let running_cb = running.clone();

            let callback = move |event: Event| {
                if !running_cb.load(Ordering::SeqCst) {
                    return;
                }

                match event.event_type {
                    EventType::KeyPress(key) => {
                        if let Some((modifier, right)) = modifier_of(key) {
                            matcher.modifier(modifier, right, true);
                        } else if let Some(action) = matcher.key_down(key) {
                            tracing::debug!("Hotkey {:?} -> {}", key, action);
                            let _ = tx.blocking_send(HotkeyEvent::Triggered(action));
                        }
                    }
                    EventType::KeyRelease(key) => {
                        if let Some((modifier, right)) = modifier_of(key) {
                            matcher.modifier(modifier, right, false);
                        } else {
                            matcher.key_up(key);
                        }
                    }
                    _ => {}
                }
            };

            // This blocks until an error occurs or the process is terminated
            if let Err(e) = listen(callback) {
                tracing::debug!("rdev listen error: {:?}", e);
                running.store(false, Ordering::SeqCst);
                let _ = err_tx.send(map_listen_error(e));
            }
        });

        self.thread_handle = Some(thread_handle);

        let startup = tokio::task::spawn_blocking(move || err_rx.recv_timeout(STARTUP_GRACE))
            .await
            .map_err(|e| HotkeyError::Listener(e.to_string()))?;

        match startup {
            Ok(err) => Err(err),
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
                tracing::info!("Listening for hotkeys via rdev");
                Ok(rx)
            }
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => Err(HotkeyError::Listener(
                "rdev listener exited immediately".to_string(),
            )),
        }
    }

    async fn stop(&mut self) -> Result<(), HotkeyError> {
        self.running.store(false, Ordering::SeqCst);
        // The thread stays parked in listen() until the process exits
        self.thread_handle.take();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "rdev"
    }
}

fn map_listen_error(e: ListenError) -> HotkeyError {
    match e {
        // macOS refuses the event tap without Accessibility permission
        ListenError::EventTapError => HotkeyError::PermissionDenied(
            "could not create event tap (Accessibility permission missing?)".to_string(),
        ),
        ListenError::MissingDisplayError => {
            HotkeyError::Listener("no X11 display available".to_string())
        }
        other => HotkeyError::Listener(format!("{:?}", other)),
    }
}

fn modifier_of(key: Key) -> Option<(Modifier, bool)> {
    match key {
        Key::ControlLeft => Some((Modifier::Ctrl, false)),
        Key::ControlRight => Some((Modifier::Ctrl, true)),
        Key::ShiftLeft => Some((Modifier::Shift, false)),
        Key::ShiftRight => Some((Modifier::Shift, true)),
        Key::Alt => Some((Modifier::Alt, false)),
        Key::AltGr => Some((Modifier::Alt, true)),
        Key::MetaLeft => Some((Modifier::Meta, false)),
        Key::MetaRight => Some((Modifier::Meta, true)),
        _ => None,
    }
}

/// Map a normalized key name (see `combo::parse_combo`) to an rdev Key
fn parse_key_name(name: &str) -> Option<Key> {
    match name {
        // Function keys
        "F1" => Some(Key::F1),
        "F2" => Some(Key::F2),
        "F3" => Some(Key::F3),
        "F4" => Some(Key::F4),
        "F5" => Some(Key::F5),
        "F6" => Some(Key::F6),
        "F7" => Some(Key::F7),
        "F8" => Some(Key::F8),
        "F9" => Some(Key::F9),
        "F10" => Some(Key::F10),
        "F11" => Some(Key::F11),
        "F12" => Some(Key::F12),

        // Special keys
        "ESC" => Some(Key::Escape),
        "SPACE" => Some(Key::Space),
        "TAB" => Some(Key::Tab),
        "CAPSLOCK" => Some(Key::CapsLock),
        "BACKSPACE" => Some(Key::Backspace),
        "ENTER" => Some(Key::Return),
        "GRAVE" => Some(Key::BackQuote),

        // Navigation
        "UP" | "UPARROW" => Some(Key::UpArrow),
        "DOWN" | "DOWNARROW" => Some(Key::DownArrow),
        "LEFT" | "LEFTARROW" => Some(Key::LeftArrow),
        "RIGHT" | "RIGHTARROW" => Some(Key::RightArrow),
        "HOME" => Some(Key::Home),
        "END" => Some(Key::End),
        "PAGEUP" => Some(Key::PageUp),
        "PAGEDOWN" => Some(Key::PageDown),

        // Other
        "DELETE" => Some(Key::Delete),
        "INSERT" => Some(Key::Insert),
        "PAUSE" => Some(Key::Pause),
        "SCROLLLOCK" => Some(Key::ScrollLock),
        "PRINTSCREEN" => Some(Key::PrintScreen),
        "FN" | "FUNCTION" | "GLOBE" => Some(Key::Function),

        // Digits
        "0" => Some(Key::Num0),
        "1" => Some(Key::Num1),
        "2" => Some(Key::Num2),
        "3" => Some(Key::Num3),
        "4" => Some(Key::Num4),
        "5" => Some(Key::Num5),
        "6" => Some(Key::Num6),
        "7" => Some(Key::Num7),
        "8" => Some(Key::Num8),
        "9" => Some(Key::Num9),

        // Letters
        "A" => Some(Key::KeyA),
        "B" => Some(Key::KeyB),
        "C" => Some(Key::KeyC),
        "D" => Some(Key::KeyD),
        "E" => Some(Key::KeyE),
        "F" => Some(Key::KeyF),
        "G" => Some(Key::KeyG),
        "H" => Some(Key::KeyH),
        "I" => Some(Key::KeyI),
        "J" => Some(Key::KeyJ),
        "K" => Some(Key::KeyK),
        "L" => Some(Key::KeyL),
        "M" => Some(Key::KeyM),
        "N" => Some(Key::KeyN),
        "O" => Some(Key::KeyO),
        "P" => Some(Key::KeyP),
        "Q" => Some(Key::KeyQ),
        "R" => Some(Key::KeyR),
        "S" => Some(Key::KeyS),
        "T" => Some(Key::KeyT),
        "U" => Some(Key::KeyU),
        "V" => Some(Key::KeyV),
        "W" => Some(Key::KeyW),
        "X" => Some(Key::KeyX),
        "Y" => Some(Key::KeyY),
        "Z" => Some(Key::KeyZ),

        _ => None,
    }
}
