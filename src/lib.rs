//! hotprompt: global-hotkey AI assistant for selected text
//!
//! This library provides the core functionality for:
//! - Detecting global key combinations via evdev (Linux) or rdev (macOS, Windows, X11)
//! - Capturing the current selection by sending the copy chord and comparing clipboard reads
//! - Sending the text to an OpenAI-compatible chat endpoint or a local command
//! - Presenting the answer as a desktop notification, on stdout and optionally on the clipboard
//!
//! # Architecture
//!
//! ```text
//!                            ┌─────────────────────────────────────┐
//!                            │              Daemon                 │
//!                            │  (lock, state file, signal loop)    │
//!                            └─────────────────────────────────────┘
//!                                            │
//!                   ┌────────────────────────┴───────────┐
//!                   │                                    │
//!                   ▼                                    ▼
//!          ┌──────────────┐                     ┌──────────────┐
//!          │    Hotkey    │  HotkeyAction       │    State     │
//!          │ (evdev/rdev) │ ──────────┐         │     File     │
//!          └──────────────┘           │         └──────────────┘
//!                                     ▼                  ▲
//!          ┌─────────────────────────────────────────────┴───────────────┐
//!          │                     CaptureDispatcher                       │
//!          │  busy? ──▶ drop      (one cycle in flight, BusySlot)        │
//!          │  read clipboard ──▶ Ctrl/Cmd+C ──▶ settle ──▶ read again    │
//!          └─────────────────────────────────────────────────────────────┘
//!                   │                        │                   │
//!                   ▼                        ▼                   ▼
//!          ┌──────────────┐         ┌──────────────┐    ┌──────────────┐
//!          │  Clipboard   │         │     Keys     │    │      AI      │
//!          │ arboard/wl/  │         │ enigo/ydotool│    │ openai/cmd   │
//!          │ xclip/xsel.. │         └──────────────┘    └──────────────┘
//!          └──────────────┘                                      │
//!                                                                ▼ response
//!                                                       ┌──────────────┐
//!                                                       │  Presenter   │
//!                                                       │ notify/stdout│
//!                                                       └──────────────┘
//! ```

pub mod ai;
pub mod cli;
pub mod clipboard;
pub mod config;
pub mod daemon;
pub mod dispatch;
pub mod error;
pub mod hotkey;
pub mod keys;
pub mod notification;
pub mod presenter;
pub mod state;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use daemon::Daemon;
pub use dispatch::{CaptureDispatcher, CycleOutcome};
pub use error::{HotpromptError, Result};
