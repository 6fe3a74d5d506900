//! Clipboard access through platform CLI tools
//!
//! - wl-clipboard: `wl-paste --no-newline` / `wl-copy` (Wayland)
//! - xclip / xsel (X11)
//! - pbpaste / pbcopy (macOS)
//! - powershell `Get-Clipboard` / `Set-Clipboard` (Windows)
//!
//! Text is written on stdin and read from stdout. Children are killed if
//! the caller's timeout drops the future.

use super::ClipboardBackend;
use crate::error::ClipboardError;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// One program invocation: binary plus arguments
#[derive(Debug, Clone, Copy)]
struct Invocation {
    program: &'static str,
    args: &'static [&'static str],
}

/// Clipboard backend driven by a pair of CLI commands
pub struct CommandClipboard {
    name: &'static str,
    read: Invocation,
    write: Invocation,
}

impl CommandClipboard {
    pub fn wl_clipboard() -> Self {
        Self {
            name: "wl-clipboard",
            read: Invocation {
                program: "wl-paste",
                args: &["--no-newline"],
            },
            write: Invocation {
                program: "wl-copy",
                args: &[],
            },
        }
    }

    pub fn xclip() -> Self {
        Self {
            name: "xclip",
            read: Invocation {
                program: "xclip",
                args: &["-selection", "clipboard", "-o"],
            },
            write: Invocation {
                program: "xclip",
                args: &["-selection", "clipboard"],
            },
        }
    }

    pub fn xsel() -> Self {
        Self {
            name: "xsel",
            read: Invocation {
                program: "xsel",
                args: &["--clipboard", "--output"],
            },
            write: Invocation {
                program: "xsel",
                args: &["--clipboard", "--input"],
            },
        }
    }

    pub fn pbcopy() -> Self {
        Self {
            name: "pbcopy",
            read: Invocation {
                program: "pbpaste",
                args: &[],
            },
            write: Invocation {
                program: "pbcopy",
                args: &[],
            },
        }
    }

    pub fn powershell() -> Self {
        Self {
            name: "powershell",
            read: Invocation {
                program: "powershell",
                args: &["-NoProfile", "-Command", "Get-Clipboard -Raw"],
            },
            write: Invocation {
                program: "powershell",
                args: &["-NoProfile", "-Command", "$input | Set-Clipboard"],
            },
        }
    }

    fn spawn_error(&self, program: &str, e: std::io::Error) -> ClipboardError {
        if e.kind() == std::io::ErrorKind::NotFound {
            ClipboardError::BackendUnavailable(program.to_string())
        } else {
            ClipboardError::Backend {
                backend: self.name.to_string(),
                message: e.to_string(),
            }
        }
    }

    fn failure(&self, stderr: &[u8]) -> ClipboardError {
        let stderr = String::from_utf8_lossy(stderr).trim().to_string();
        ClipboardError::Backend {
            backend: self.name.to_string(),
            message: if stderr.is_empty() {
                "exited with error".to_string()
            } else {
                stderr
            },
        }
    }
}

#[async_trait::async_trait]
impl ClipboardBackend for CommandClipboard {
    async fn read(&self) -> Result<String, ClipboardError> {
        let output = Command::new(self.read.program)
            .args(self.read.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| self.spawn_error(self.read.program, e))?;

        if !output.status.success() {
            return Err(self.failure(&output.stderr));
        }

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();

        // Get-Clipboard appends a trailing newline
        if self.read.program == "powershell" && text.ends_with("\r\n") {
            text.truncate(text.len() - 2);
        }

        Ok(text)
    }

    async fn write(&self, text: &str) -> Result<(), ClipboardError> {
        let mut child = Command::new(self.write.program)
            .args(self.write.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(self.write.program, e))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .await
                .map_err(|e| ClipboardError::Backend {
                    backend: self.name.to_string(),
                    message: e.to_string(),
                })?;

            // Close stdin to signal EOF
            drop(stdin);
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ClipboardError::Backend {
                backend: self.name.to_string(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(self.failure(&output.stderr));
        }

        Ok(())
    }

    async fn is_available(&self) -> bool {
        which::which(self.read.program).is_ok() && which::which(self.write.program).is_ok()
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_table() {
        let wl = CommandClipboard::wl_clipboard();
        assert_eq!(wl.read.program, "wl-paste");
        assert_eq!(wl.read.args, &["--no-newline"]);
        assert_eq!(wl.write.program, "wl-copy");

        let xclip = CommandClipboard::xclip();
        assert!(xclip.read.args.contains(&"-o"));
        assert!(!xclip.write.args.contains(&"-o"));

        let mac = CommandClipboard::pbcopy();
        assert_eq!((mac.read.program, mac.write.program), ("pbpaste", "pbcopy"));
    }

    #[test]
    fn test_missing_program_is_unavailable() {
        let backend = CommandClipboard::xsel();
        let err = backend.spawn_error(
            "xsel",
            std::io::Error::new(std::io::ErrorKind::NotFound, "nope"),
        );
        assert!(matches!(err, ClipboardError::BackendUnavailable(p) if p == "xsel"));
    }

    #[test]
    fn test_failure_message_uses_stderr() {
        let backend = CommandClipboard::wl_clipboard();
        let err = backend.failure(b"Nothing is copied\n");
        assert_eq!(err.to_string(), "wl-clipboard failed: Nothing is copied");

        let err = backend.failure(b"");
        assert_eq!(err.to_string(), "wl-clipboard failed: exited with error");
    }
}
