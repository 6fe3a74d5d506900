//! Platform-specific desktop notifications
//!
//! Provides a unified interface for sending desktop notifications on
//! different platforms:
//! - Linux: Uses notify-send (libnotify)
//! - macOS: Uses terminal-notifier, falling back to osascript (AppleScript)
//! - Windows: Uses a PowerShell balloon tip
//!
//! Notifications are best-effort: failures are logged at debug level and
//! never reach the caller.

use std::process::Stdio;
use tokio::process::Command;

/// Application name shown by notification daemons
const APP_NAME: &str = "hotprompt";

/// Trait for notification backends
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Show a notification
    async fn notify(&self, title: &str, body: &str) -> std::io::Result<()>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Fire-and-forget notifications through a fallback chain
pub struct NotificationPort {
    backends: Vec<Box<dyn Notifier>>,
    max_chars: usize,
}

impl NotificationPort {
    pub fn new(backends: Vec<Box<dyn Notifier>>, max_chars: usize) -> Self {
        Self { backends, max_chars }
    }

    /// Platform default chain
    pub fn platform(max_chars: usize) -> Self {
        Self::new(default_backends(), max_chars)
    }

    /// A port that drops everything
    pub fn disabled() -> Self {
        Self::new(Vec::new(), 0)
    }

    /// Send a notification, truncating the body. Never fails.
    pub async fn notify(&self, title: &str, body: &str) {
        if self.backends.is_empty() {
            tracing::trace!("Notifications disabled, dropping '{}'", title);
            return;
        }

        let body = truncate(body, self.max_chars);

        for backend in &self.backends {
            match backend.notify(title, &body).await {
                Ok(()) => return,
                Err(e) => tracing::debug!("Notification via {} failed: {}", backend.name(), e),
            }
        }

        tracing::debug!("No notification backend succeeded");
    }
}

/// Truncate to `max_chars` characters, adding "..." when shortened.
/// Counts chars, not bytes, so multi-byte text is never split.
pub fn truncate(text: &str, max_chars: usize) -> String {
    if max_chars == 0 || text.chars().count() <= max_chars {
        return text.to_string();
    }

    let keep = max_chars.saturating_sub(3);
    format!("{}...", text.chars().take(keep).collect::<String>())
}

fn default_backends() -> Vec<Box<dyn Notifier>> {
    if cfg!(target_os = "macos") {
        vec![Box::new(TerminalNotifier), Box::new(Osascript)]
    } else if cfg!(target_os = "windows") {
        vec![Box::new(PowershellBalloon)]
    } else {
        vec![Box::new(NotifySend)]
    }
}

async fn run_quiet(program: &str, args: &[&str]) -> std::io::Result<()> {
    let status = Command::new(program)
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status()
        .await?;

    if status.success() {
        Ok(())
    } else {
        Err(std::io::Error::other(format!("{} exited with {}", program, status)))
    }
}

/// Linux: notify-send (libnotify)
pub struct NotifySend;

#[async_trait::async_trait]
impl Notifier for NotifySend {
    async fn notify(&self, title: &str, body: &str) -> std::io::Result<()> {
        let args = notify_send_args(title, body);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        run_quiet("notify-send", &args).await
    }

    fn name(&self) -> &'static str {
        "notify-send"
    }
}

/// Options end at `--` so a body like "- first point" stays positional
fn notify_send_args(title: &str, body: &str) -> Vec<String> {
    vec![
        format!("--app-name={}", APP_NAME),
        "--expire-time=5000".to_string(),
        "--".to_string(),
        title.to_string(),
        body.to_string(),
    ]
}

/// macOS: terminal-notifier
pub struct TerminalNotifier;

#[async_trait::async_trait]
impl Notifier for TerminalNotifier {
    async fn notify(&self, title: &str, body: &str) -> std::io::Result<()> {
        run_quiet(
            "terminal-notifier",
            &["-title", title, "-message", body, "-group", APP_NAME],
        )
        .await
    }

    fn name(&self) -> &'static str {
        "terminal-notifier"
    }
}

/// macOS: osascript (no extra install needed)
pub struct Osascript;

#[async_trait::async_trait]
impl Notifier for Osascript {
    async fn notify(&self, title: &str, body: &str) -> std::io::Result<()> {
        let script = format!(
            r#"display notification "{}" with title "{}""#,
            escape_applescript(body),
            escape_applescript(title)
        );
        run_quiet("osascript", &["-e", &script]).await
    }

    fn name(&self) -> &'static str {
        "osascript"
    }
}

/// Windows: balloon tip from a transient NotifyIcon
pub struct PowershellBalloon;

#[async_trait::async_trait]
impl Notifier for PowershellBalloon {
    async fn notify(&self, title: &str, body: &str) -> std::io::Result<()> {
        let script = format!(
            "Add-Type -AssemblyName System.Windows.Forms; \
             $n = New-Object System.Windows.Forms.NotifyIcon; \
             $n.Icon = [System.Drawing.SystemIcons]::Information; \
             $n.Visible = $true; \
             $n.ShowBalloonTip(5000, '{}', '{}', 'None'); \
             Start-Sleep -Seconds 5; $n.Dispose()",
            escape_powershell(title),
            escape_powershell(body)
        );

        // The script sleeps while the balloon is shown; don't wait for it
        Command::new("powershell")
            .args(["-NoProfile", "-WindowStyle", "Hidden", "-Command", &script])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(|_| ())
    }

    fn name(&self) -> &'static str {
        "powershell"
    }
}

fn escape_applescript(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn escape_powershell(s: &str) -> String {
    s.replace('\'', "''")
}
