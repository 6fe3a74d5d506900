// Command-line interface definitions for hotprompt
//
// This module is separate so it can be used by both the binary (main.rs)
// and build.rs for generating man pages.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "hotprompt")]
#[command(author, version, about = "Send the selected text to an AI model with a global hotkey")]
#[command(long_about = "
hotprompt runs in the background and listens for global hotkeys.
Select text in any application and press a hotkey: hotprompt copies the
selection, sends it to an AI model and shows the answer as a desktop
notification (and on stdout).

SETUP:
  1. Set an API key: export GEMINI_API_KEY=... (or HOTPROMPT_API_KEY)
  2. Linux: add yourself to the input group: sudo usermod -aG input $USER
     macOS: grant Accessibility access to your terminal
  3. Run: hotprompt check (to test clipboard, notifications and AI access)
  4. Run: hotprompt (to start the daemon)

USAGE:
  Ctrl+F9         explain or help with the selected text
  Ctrl+Shift+A    quick analysis of the current clipboard
")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<std::path::PathBuf>,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Override the AI model (e.g., gemini-1.5-flash, gpt-4o-mini)
    #[arg(long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Override the delay between the copy keystroke and re-reading the clipboard
    #[arg(long, value_name = "MS")]
    pub settle_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run as daemon (default if no command specified)
    Daemon,

    /// Send text through the AI model and show the response
    Process {
        /// Text to send
        #[arg(required = true)]
        text: Vec<String>,

        /// Use the secondary (quick analysis) prompt
        #[arg(long)]
        secondary: bool,
    },

    /// Send the current clipboard through the AI model once
    Clipboard,

    /// Check clipboard, notification and AI configuration
    Check {
        /// Also send a short test prompt to the AI service
        #[arg(long)]
        ai: bool,
    },

    /// Show current configuration
    Config {
        /// Write the default config file if none exists
        #[arg(long)]
        init: bool,
    },

    /// Show daemon status (for Waybar/polybar integration)
    Status {
        /// Output format: "text" (default) or "json"
        #[arg(long, default_value = "text")]
        format: String,
    },
}
