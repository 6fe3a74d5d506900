//! hotprompt - send the selected text to an AI model with a global hotkey
//!
//! Run with `hotprompt` or `hotprompt daemon` to start the daemon.
//! Use `hotprompt check` to test clipboard, notifications and AI access.
//! Use `hotprompt process <text>` to send text without the hotkey.

use clap::Parser;
use hotprompt::cli::{Cli, Commands};
use hotprompt::clipboard::ClipboardPort;
use hotprompt::config::{self, Config};
use hotprompt::daemon::{self, Daemon};
use hotprompt::dispatch::CycleOutcome;
use hotprompt::hotkey::{self, HotkeyAction};
use hotprompt::notification::NotificationPort;
use hotprompt::state::StateFile;
use hotprompt::{ai, keys};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Console logging is scoped to config loading; the activity log path
    // isn't known until the config is read
    let mut config = tracing::subscriber::with_default(
        tracing_subscriber::registry().with(console_layer(cli.verbose, cli.quiet, std::io::stderr)),
        || config::load_config(cli.config.as_deref()),
    )?;

    // Apply CLI overrides
    if let Some(model) = cli.model {
        config.ai.model = model;
    }
    if let Some(ms) = cli.settle_ms {
        config.capture.settle_delay_ms = ms;
    }
    config.validate()?;

    let command = cli.command.unwrap_or(Commands::Daemon);
    let log_file = match command {
        Commands::Daemon => config.resolve_log_file(),
        _ => None,
    };
    init_logging(cli.verbose, cli.quiet, log_file.as_deref());

    // Run the appropriate command
    match command {
        Commands::Daemon => {
            let mut daemon = Daemon::new(config);
            daemon.run().await?;
        }

        Commands::Process { text, secondary } => {
            let action = if secondary {
                HotkeyAction::SecondaryAssist
            } else {
                HotkeyAction::PrimaryCapture
            };
            let dispatcher = daemon::build_dispatcher(&config)?;
            exit_on_failure(dispatcher.process_text(action, &text.join(" ")).await);
        }

        Commands::Clipboard => {
            let dispatcher = daemon::build_dispatcher(&config)?;
            exit_on_failure(dispatcher.capture(HotkeyAction::SecondaryAssist).await);
        }

        Commands::Check { ai } => {
            run_check(&config, cli.config.as_deref(), ai).await?;
        }

        Commands::Config { init } => {
            show_config(&config, cli.config.as_deref(), init)?;
        }

        Commands::Status { format } => {
            run_status(&config, &format)?;
        }
    }

    Ok(())
}

/// Console logging to stderr, plus the activity log file when configured
fn init_logging(verbose: u8, quiet: bool, log_file: Option<&Path>) {
    let file_layer = log_file.and_then(|path| match open_log_file(path) {
        Ok(file) => Some(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(file))
                .with_filter(log_filter(verbose, quiet)),
        ),
        Err(e) => {
            eprintln!("Warning: cannot open log file {:?}: {}", path, e);
            None
        }
    });

    tracing_subscriber::registry()
        .with(console_layer(verbose, quiet, std::io::stderr))
        .with(file_layer)
        .init();
}

fn log_filter(verbose: u8, quiet: bool) -> EnvFilter {
    let log_level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("hotprompt={},warn", log_level)))
}

fn console_layer<S, W>(verbose: u8, quiet: bool, writer: W) -> impl Layer<S> + Send + Sync
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(writer)
        .with_filter(log_filter(verbose, quiet))
}

fn open_log_file(path: &Path) -> std::io::Result<std::fs::File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// The presenter has already shown the error; just set the exit code
fn exit_on_failure(outcome: Option<CycleOutcome>) {
    match outcome {
        Some(CycleOutcome::Responded { .. }) => {}
        Some(CycleOutcome::Failed { .. }) => std::process::exit(1),
        Some(CycleOutcome::Empty { .. }) => std::process::exit(2),
        None => {
            eprintln!("Another request is already in flight");
            std::process::exit(3);
        }
    }
}

/// Exercise each configured integration and report what works
async fn run_check(config: &Config, config_path: Option<&Path>, call_ai: bool) -> anyhow::Result<()> {
    println!("hotprompt check\n");

    let path = config_path.map(PathBuf::from).or_else(Config::default_path);
    match path {
        Some(ref p) if p.exists() => println!("  [OK] Config file: {:?}", p),
        Some(ref p) => println!("  [--] Config file: {:?} (not found, using defaults)", p),
        None => println!("  [--] Config file: no config directory"),
    }

    // Hotkeys
    match hotkey::parse_bindings(&config.hotkey.bindings) {
        Ok(bindings) => {
            for binding in bindings {
                println!("  [OK] Hotkey {} -> {}", binding.combo, binding.action);
            }
        }
        Err(e) => println!("  [!!] Hotkeys: {}", e),
    }
    if !config.hotkey.enabled {
        println!("  [--] Built-in hotkeys disabled");
    }

    // Copy chord
    println!(
        "  [OK] Copy chord: {}+C ({:?})",
        keys::modifier_label(config.capture.copy_modifier),
        config.capture.simulator
    );

    // Clipboard
    match ClipboardPort::from_config(&config.clipboard) {
        Ok(clipboard) => match clipboard.try_read().await {
            Ok(text) => println!(
                "  [OK] Clipboard ({}): {} chars",
                clipboard.backend_names().join(", "),
                text.chars().count()
            ),
            Err(e) => println!("  [!!] Clipboard: {}", e),
        },
        Err(e) => println!("  [!!] Clipboard: {}", e),
    }

    // Notifications
    if config.output.notification {
        NotificationPort::platform(config.output.notification_max_chars)
            .notify(hotprompt::presenter::TITLE, "Notifications are working")
            .await;
        println!("  [OK] Notification sent (check your desktop)");
    } else {
        println!("  [--] Notifications disabled");
    }

    // AI
    match ai::create_processor(&config.ai) {
        Ok(processor) => {
            println!("  [OK] AI backend: {} ({})", processor.name(), config.ai.model);
            if config.ai.backend == config::AiBackend::OpenAi {
                match config.ai.resolve_api_key() {
                    Some(_) => println!("  [OK] API key found"),
                    None => println!(
                        "  [!!] No API key: set {} or HOTPROMPT_API_KEY",
                        config.ai.api_key_env
                    ),
                }
            }

            if call_ai {
                match processor.process("Reply with the single word OK.").await {
                    Ok(response) => println!("  [OK] AI responded: {}", response),
                    Err(e) => println!("  [!!] AI request failed: {}", e),
                }
            }
        }
        Err(e) => println!("  [!!] AI backend: {}", e),
    }

    Ok(())
}

/// Run the status command - show current daemon state
fn run_status(config: &Config, format: &str) -> anyhow::Result<()> {
    let Some(path) = config.resolve_state_file() else {
        eprintln!("Error: state_file is not configured.");
        eprintln!();
        eprintln!("To enable status monitoring, add to your config.toml:");
        eprintln!();
        eprintln!("  state_file = \"auto\"");
        std::process::exit(1);
    };

    let state = StateFile::new(path)
        .read()
        .map(|s| s.as_str())
        .unwrap_or("stopped");

    if format == "json" {
        println!("{}", format_state_json(state));
    } else {
        println!("{}", state);
    }
    Ok(())
}

/// Format state as JSON for Waybar consumption
fn format_state_json(state: &str) -> String {
    let (class, tooltip) = match state {
        "idle" => ("idle", "hotprompt ready"),
        "stopped" => ("stopped", "hotprompt not running"),
        "working" => ("working", "Waiting for AI response..."),
        _ => ("busy", "Capturing selection..."),
    };

    serde_json::json!({
        "text": state,
        "class": class,
        "tooltip": tooltip,
    })
    .to_string()
}

/// Show current configuration, or write the default file with --init
fn show_config(config: &Config, config_path: Option<&Path>, init: bool) -> anyhow::Result<()> {
    let path = config_path.map(PathBuf::from).or_else(Config::default_path);

    if init {
        let path = path.ok_or_else(|| anyhow::anyhow!("no config directory available"))?;
        if config::write_default_config(&path)? {
            println!("Wrote default config to {:?}", path);
        } else {
            println!("Config already exists at {:?}", path);
        }
        return Ok(());
    }

    let mut shown = config.clone();
    if shown.ai.api_key.is_some() {
        shown.ai.api_key = Some("********".to_string());
    }

    println!("{}", toml::to_string_pretty(&shown)?);
    println!("# ---");
    println!(
        "# Config file: {:?}",
        path.unwrap_or_else(|| PathBuf::from("(not found)"))
    );
    if let Some(state) = config.resolve_state_file() {
        println!("# State file: {:?}", state);
    }
    if let Some(log) = config.resolve_log_file() {
        println!("# Activity log: {:?}", log);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_format_state_json() {
        let json: serde_json::Value = serde_json::from_str(&format_state_json("working")).unwrap();
        assert_eq!(json["text"], "working");
        assert_eq!(json["class"], "working");

        let json: serde_json::Value = serde_json::from_str(&format_state_json("stopped")).unwrap();
        assert_eq!(json["class"], "stopped");

        let json: serde_json::Value =
            serde_json::from_str(&format_state_json("simulating")).unwrap();
        assert_eq!(json["class"], "busy");
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_config_warnings_reach_console() {
        let captured = Captured::default();
        let writer = captured.clone();
        let dir = tempfile::tempdir().unwrap();

        std::env::set_var("HOTPROMPT_SETTLE_MS", "soon");
        let config = tracing::subscriber::with_default(
            tracing_subscriber::registry().with(console_layer(0, false, move || writer.clone())),
            || config::load_config(Some(&dir.path().join("missing.toml"))),
        );
        std::env::remove_var("HOTPROMPT_SETTLE_MS");

        assert!(config.is_ok());
        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Ignoring invalid HOTPROMPT_SETTLE_MS"), "{}", output);
    }

    #[test]
    fn test_cli_parses_commands() {
        let cli = Cli::parse_from(["hotprompt", "-vv", "--settle-ms", "250", "process", "hello", "there"]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.settle_ms, Some(250));
        match cli.command {
            Some(Commands::Process { text, secondary }) => {
                assert_eq!(text, ["hello", "there"]);
                assert!(!secondary);
            }
            _ => panic!("expected process command"),
        }

        let cli = Cli::parse_from(["hotprompt"]);
        assert!(cli.command.is_none());
    }
}
