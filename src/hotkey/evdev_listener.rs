//! evdev-based hotkey listener
//!
//! Uses the Linux evdev interface to detect key presses at the kernel level.
//! This works on all Wayland compositors because it bypasses the display server.
//!
//! The user must be in the 'input' group to access /dev/input/* devices.

use super::combo::{Binding, ComboMatcher, Modifier};
use super::{HotkeyEvent, HotkeyListener};
use crate::error::HotkeyError;
use evdev::{Device, InputEventKind, Key};
use std::os::unix::io::AsRawFd;
use std::path::PathBuf;
use tokio::sync::{mpsc, oneshot};

/// evdev-based hotkey listener
pub struct EvdevListener {
    /// Resolved bindings: modifiers, key, action
    bindings: Vec<(std::collections::BTreeSet<Modifier>, Key, super::HotkeyAction)>,
    /// Paths to keyboard devices
    device_paths: Vec<PathBuf>,
    /// Signal to stop the listener task
    stop_signal: Option<oneshot::Sender<()>>,
}

impl EvdevListener {
    /// Create a new evdev listener for the configured bindings
    pub fn new(bindings: &[Binding]) -> Result<Self, HotkeyError> {
        let bindings = bindings
            .iter()
            .map(|b| Ok((b.combo.modifiers.clone(), parse_key_name(&b.combo.key)?, b.action)))
            .collect::<Result<Vec<_>, HotkeyError>>()?;

        let device_paths = find_keyboard_devices()?;

        tracing::debug!(
            "Found {} keyboard device(s): {:?}",
            device_paths.len(),
            device_paths
        );

        Ok(Self {
            bindings,
            device_paths,
            stop_signal: None,
        })
    }
}

#[async_trait::async_trait]
impl HotkeyListener for EvdevListener {
    async fn start(&mut self) -> Result<mpsc::Receiver<HotkeyEvent>, HotkeyError> {
        let (tx, rx) = mpsc::channel(32);
        let (stop_tx, stop_rx) = oneshot::channel();
        self.stop_signal = Some(stop_tx);

        let matcher = ComboMatcher::new(self.bindings.clone());
        let device_paths = self.device_paths.clone();

        tokio::task::spawn_blocking(move || {
            evdev_listener_loop(device_paths, matcher, tx, stop_rx);
        });

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), HotkeyError> {
        if let Some(stop) = self.stop_signal.take() {
            let _ = stop.send(());
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "evdev"
    }
}

/// Map an evdev key to a modifier and whether it is the right-hand one
fn modifier_of(key: Key) -> Option<(Modifier, bool)> {
    match key {
        Key::KEY_LEFTCTRL => Some((Modifier::Ctrl, false)),
        Key::KEY_RIGHTCTRL => Some((Modifier::Ctrl, true)),
        Key::KEY_LEFTSHIFT => Some((Modifier::Shift, false)),
        Key::KEY_RIGHTSHIFT => Some((Modifier::Shift, true)),
        Key::KEY_LEFTALT => Some((Modifier::Alt, false)),
        Key::KEY_RIGHTALT => Some((Modifier::Alt, true)),
        Key::KEY_LEFTMETA => Some((Modifier::Meta, false)),
        Key::KEY_RIGHTMETA => Some((Modifier::Meta, true)),
        _ => None,
    }
}

/// Main listener loop running in a blocking task
fn evdev_listener_loop(
    device_paths: Vec<PathBuf>,
    mut matcher: ComboMatcher<Key>,
    tx: mpsc::Sender<HotkeyEvent>,
    mut stop_rx: oneshot::Receiver<()>,
) {
    // Open all keyboard devices in non-blocking mode
    let mut devices: Vec<Device> = device_paths
        .iter()
        .filter_map(|path| match Device::open(path) {
            Ok(device) => {
                // Set device to non-blocking mode so fetch_events doesn't block
                let fd = device.as_raw_fd();
                unsafe {
                    let flags = libc::fcntl(fd, libc::F_GETFL);
                    if flags != -1 {
                        libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
                    }
                }
                tracing::debug!("Opened device (non-blocking): {:?}", path);
                Some(device)
            }
            Err(e) => {
                tracing::warn!("Failed to open {:?}: {}", path, e);
                None
            }
        })
        .collect();

    if devices.is_empty() {
        tracing::error!("No keyboard devices could be opened");
        return;
    }

    tracing::info!("Listening for hotkeys on {} device(s)", devices.len());

    loop {
        // Check for stop signal (non-blocking)
        match stop_rx.try_recv() {
            Ok(_) | Err(oneshot::error::TryRecvError::Closed) => {
                tracing::debug!("Hotkey listener stopping");
                return;
            }
            Err(oneshot::error::TryRecvError::Empty) => {}
        }

        for device in &mut devices {
            // fetch_events returns immediately if no events (non-blocking)
            let Ok(events) = device.fetch_events() else {
                continue;
            };

            for event in events {
                let InputEventKind::Key(key) = event.kind() else {
                    continue;
                };

                // 0 = release, 1 = press, 2 = repeat
                let value = event.value();

                if let Some((modifier, right)) = modifier_of(key) {
                    match value {
                        1 => matcher.modifier(modifier, right, true),
                        0 => matcher.modifier(modifier, right, false),
                        _ => {}
                    }
                    continue;
                }

                match value {
                    1 => {
                        if let Some(action) = matcher.key_down(key) {
                            tracing::debug!("Hotkey {:?} -> {}", key, action);
                            if tx.blocking_send(HotkeyEvent::Triggered(action)).is_err() {
                                return; // Channel closed
                            }
                        }
                    }
                    0 => matcher.key_up(key),
                    _ => {}
                }
            }
        }

        // Small sleep to avoid busy-waiting
        std::thread::sleep(std::time::Duration::from_millis(5));
    }
}

/// Find all keyboard input devices
fn find_keyboard_devices() -> Result<Vec<PathBuf>, HotkeyError> {
    let mut keyboards = Vec::new();
    let mut denied: Option<PathBuf> = None;

    let input_dir = std::fs::read_dir("/dev/input").map_err(|e| {
        if e.kind() == std::io::ErrorKind::PermissionDenied {
            HotkeyError::PermissionDenied(format!("/dev/input: {}", e))
        } else {
            HotkeyError::Listener(format!("/dev/input: {}", e))
        }
    })?;

    for entry in input_dir.flatten() {
        let path = entry.path();

        // Only look at event* devices
        let is_event_device = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with("event"))
            .unwrap_or(false);

        if !is_event_device {
            continue;
        }

        match Device::open(&path) {
            Ok(device) => {
                // A keyboard should have at least some letter keys
                let has_keys = device
                    .supported_keys()
                    .map(|keys| {
                        keys.contains(Key::KEY_A)
                            && keys.contains(Key::KEY_Z)
                            && keys.contains(Key::KEY_ENTER)
                    })
                    .unwrap_or(false);

                if has_keys {
                    tracing::debug!(
                        "Found keyboard: {:?} ({:?})",
                        path,
                        device.name().unwrap_or("unknown")
                    );
                    keyboards.push(path);
                }
            }
            Err(e) => {
                if e.kind() == std::io::ErrorKind::PermissionDenied {
                    denied.get_or_insert(path);
                } else {
                    tracing::trace!("Skipping {:?}: {}", path, e);
                }
            }
        }
    }

    if keyboards.is_empty() {
        return match denied {
            Some(path) => Err(HotkeyError::PermissionDenied(path.display().to_string())),
            None => Err(HotkeyError::NoKeyboard),
        };
    }

    Ok(keyboards)
}

/// Map a normalized key name (see `combo::parse_combo`) to an evdev Key
fn parse_key_name(name: &str) -> Result<Key, HotkeyError> {
    let key = match name {
        // Letters
        "A" => Key::KEY_A,
        "B" => Key::KEY_B,
        "C" => Key::KEY_C,
        "D" => Key::KEY_D,
        "E" => Key::KEY_E,
        "F" => Key::KEY_F,
        "G" => Key::KEY_G,
        "H" => Key::KEY_H,
        "I" => Key::KEY_I,
        "J" => Key::KEY_J,
        "K" => Key::KEY_K,
        "L" => Key::KEY_L,
        "M" => Key::KEY_M,
        "N" => Key::KEY_N,
        "O" => Key::KEY_O,
        "P" => Key::KEY_P,
        "Q" => Key::KEY_Q,
        "R" => Key::KEY_R,
        "S" => Key::KEY_S,
        "T" => Key::KEY_T,
        "U" => Key::KEY_U,
        "V" => Key::KEY_V,
        "W" => Key::KEY_W,
        "X" => Key::KEY_X,
        "Y" => Key::KEY_Y,
        "Z" => Key::KEY_Z,

        // Digits
        "0" => Key::KEY_0,
        "1" => Key::KEY_1,
        "2" => Key::KEY_2,
        "3" => Key::KEY_3,
        "4" => Key::KEY_4,
        "5" => Key::KEY_5,
        "6" => Key::KEY_6,
        "7" => Key::KEY_7,
        "8" => Key::KEY_8,
        "9" => Key::KEY_9,

        // Lock keys
        "SCROLLLOCK" => Key::KEY_SCROLLLOCK,
        "PAUSE" => Key::KEY_PAUSE,
        "CAPSLOCK" => Key::KEY_CAPSLOCK,
        "NUMLOCK" => Key::KEY_NUMLOCK,
        "INSERT" => Key::KEY_INSERT,

        // Function keys (F13-F24 are often unused and make good hotkeys)
        "F1" => Key::KEY_F1,
        "F2" => Key::KEY_F2,
        "F3" => Key::KEY_F3,
        "F4" => Key::KEY_F4,
        "F5" => Key::KEY_F5,
        "F6" => Key::KEY_F6,
        "F7" => Key::KEY_F7,
        "F8" => Key::KEY_F8,
        "F9" => Key::KEY_F9,
        "F10" => Key::KEY_F10,
        "F11" => Key::KEY_F11,
        "F12" => Key::KEY_F12,
        "F13" => Key::KEY_F13,
        "F14" => Key::KEY_F14,
        "F15" => Key::KEY_F15,
        "F16" => Key::KEY_F16,
        "F17" => Key::KEY_F17,
        "F18" => Key::KEY_F18,
        "F19" => Key::KEY_F19,
        "F20" => Key::KEY_F20,
        "F21" => Key::KEY_F21,
        "F22" => Key::KEY_F22,
        "F23" => Key::KEY_F23,
        "F24" => Key::KEY_F24,

        // Navigation keys
        "HOME" => Key::KEY_HOME,
        "END" => Key::KEY_END,
        "PAGEUP" => Key::KEY_PAGEUP,
        "PAGEDOWN" => Key::KEY_PAGEDOWN,
        "DELETE" => Key::KEY_DELETE,
        "UP" => Key::KEY_UP,
        "DOWN" => Key::KEY_DOWN,
        "LEFT" => Key::KEY_LEFT,
        "RIGHT" => Key::KEY_RIGHT,

        "SPACE" => Key::KEY_SPACE,
        "ENTER" => Key::KEY_ENTER,
        "TAB" => Key::KEY_TAB,
        "BACKSPACE" => Key::KEY_BACKSPACE,
        "ESC" => Key::KEY_ESC,
        "GRAVE" => Key::KEY_GRAVE,

        _ => {
            return Err(HotkeyError::UnknownKey(format!(
                "{}. Try: F1-F24, A-Z, 0-9, SCROLLLOCK, PAUSE, or run 'evtest' to find key names",
                name
            )));
        }
    };

    Ok(key)
}
