//! Response presentation
//!
//! The dispatcher hands every finished cycle to a [`ResponsePresenter`].
//! [`DesktopPresenter`] shows a notification, prints the response to
//! stdout and can put it on the clipboard.

use crate::clipboard::ClipboardPort;
use crate::config::OutputConfig;
use crate::dispatch::CycleOutcome;
use crate::notification::NotificationPort;
use std::io::Write;
use std::sync::Arc;

/// Notification title for responses
pub const TITLE: &str = "hotprompt";
/// Notification title for failures
pub const ERROR_TITLE: &str = "hotprompt error";
/// Body shown when there was nothing to send
pub const EMPTY_MESSAGE: &str = "No text selected or clipboard empty";
/// Body shown when a trigger is dropped
pub const BUSY_MESSAGE: &str = "Still working on the previous request";

/// Trait for showing cycle results to the user
#[async_trait::async_trait]
pub trait ResponsePresenter: Send + Sync {
    /// Present the outcome of a capture cycle
    async fn present(&self, outcome: &CycleOutcome);

    /// Tell the user a trigger was ignored because a request is in flight
    async fn busy(&self) {}
}

/// Notification + stdout (+ clipboard) presenter
pub struct DesktopPresenter {
    notifications: Arc<NotificationPort>,
    clipboard: Arc<ClipboardPort>,
    config: OutputConfig,
}

impl DesktopPresenter {
    pub fn new(
        notifications: Arc<NotificationPort>,
        clipboard: Arc<ClipboardPort>,
        config: OutputConfig,
    ) -> Self {
        Self {
            notifications,
            clipboard,
            config,
        }
    }

    fn print_framed(&self, outcome: &CycleOutcome, response: &str) {
        let rule = "-".repeat(60);
        let stdout = std::io::stdout();
        let mut out = stdout.lock();

        let header = match outcome {
            CycleOutcome::Responded { event, .. } => format!(
                "[{}] {}",
                event.trigger,
                crate::notification::truncate(event.resolved.trim(), 60)
            ),
            _ => String::new(),
        };

        let _ = writeln!(out, "{}", rule);
        if !header.is_empty() {
            let _ = writeln!(out, "{}", header);
            let _ = writeln!(out, "{}", rule);
        }
        let _ = writeln!(out, "{}", response);
        let _ = writeln!(out, "{}", rule);
        let _ = out.flush();
    }
}

#[async_trait::async_trait]
impl ResponsePresenter for DesktopPresenter {
    async fn present(&self, outcome: &CycleOutcome) {
        match outcome {
            CycleOutcome::Responded { response, .. } => {
                tracing::info!("Response received ({} chars)", response.chars().count());

                if self.config.print_response {
                    self.print_framed(outcome, response);
                }

                if self.config.copy_response {
                    if let Err(e) = self.clipboard.write(response).await {
                        tracing::warn!("Failed to copy response to clipboard: {}", e);
                    }
                }

                if self.config.notification {
                    self.notifications.notify(TITLE, response).await;
                }
            }
            CycleOutcome::Failed { event, error } => {
                tracing::error!("Request for {} failed: {}", event.trigger, error);

                if self.config.notification {
                    self.notifications.notify(ERROR_TITLE, &error.to_string()).await;
                }
            }
            CycleOutcome::Empty { trigger } => {
                tracing::info!("{} ({})", EMPTY_MESSAGE, trigger);

                if self.config.notification {
                    self.notifications.notify(TITLE, EMPTY_MESSAGE).await;
                }
            }
        }
    }

    async fn busy(&self) {
        if self.config.notification {
            self.notifications.notify(TITLE, BUSY_MESSAGE).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::ClipboardBackend;
    use crate::dispatch::CaptureEvent;
    use crate::error::{AiError, ClipboardError};
    use crate::hotkey::HotkeyAction;
    use crate::notification::Notifier;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Record {
        notes: Mutex<Vec<(String, String)>>,
        clip: Mutex<Vec<String>>,
    }

    struct Notes(Arc<Record>);

    #[async_trait::async_trait]
    impl Notifier for Notes {
        async fn notify(&self, title: &str, body: &str) -> std::io::Result<()> {
            self.0
                .notes
                .lock()
                .unwrap()
                .push((title.to_string(), body.to_string()));
            Ok(())
        }

        fn name(&self) -> &'static str {
            "notes"
        }
    }

    struct Clip(Arc<Record>);

    #[async_trait::async_trait]
    impl ClipboardBackend for Clip {
        async fn read(&self) -> Result<String, ClipboardError> {
            Ok(String::new())
        }

        async fn write(&self, text: &str) -> Result<(), ClipboardError> {
            self.0.clip.lock().unwrap().push(text.to_string());
            Ok(())
        }

        async fn is_available(&self) -> bool {
            true
        }

        fn name(&self) -> &'static str {
            "clip"
        }
    }

    fn presenter(config: OutputConfig) -> (DesktopPresenter, Arc<Record>) {
        let record = Arc::new(Record::default());
        let presenter = DesktopPresenter::new(
            Arc::new(NotificationPort::new(vec![Box::new(Notes(record.clone()))], 200)),
            Arc::new(ClipboardPort::new(
                vec![Box::new(Clip(record.clone()))],
                Duration::from_millis(100),
            )),
            config,
        );
        (presenter, record)
    }

    fn event() -> CaptureEvent {
        CaptureEvent {
            trigger: HotkeyAction::PrimaryCapture,
            original: String::new(),
            post_copy: "Hello world".to_string(),
            resolved: "Hello world".to_string(),
        }
    }

    #[tokio::test]
    async fn test_responded_notifies_and_copies() {
        let (presenter, record) = presenter(OutputConfig {
            print_response: false,
            copy_response: true,
            ..Default::default()
        });

        presenter
            .present(&CycleOutcome::Responded {
                event: event(),
                response: "A greeting.".to_string(),
            })
            .await;

        assert_eq!(
            record.notes.lock().unwrap().as_slice(),
            [(TITLE.to_string(), "A greeting.".to_string())]
        );
        assert_eq!(record.clip.lock().unwrap().as_slice(), ["A greeting.".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_uses_error_title() {
        let (presenter, record) = presenter(OutputConfig::default());

        presenter
            .present(&CycleOutcome::Failed {
                event: event(),
                error: AiError::RateLimited,
            })
            .await;

        let notes = record.notes.lock().unwrap();
        assert_eq!(notes[0].0, ERROR_TITLE);
        assert!(notes[0].1.contains("Rate limited"));
        assert!(record.clip.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_and_busy_messages() {
        let (presenter, record) = presenter(OutputConfig::default());

        presenter
            .present(&CycleOutcome::Empty {
                trigger: HotkeyAction::SecondaryAssist,
            })
            .await;
        presenter.busy().await;

        let notes = record.notes.lock().unwrap();
        assert_eq!(notes[0].1, EMPTY_MESSAGE);
        assert_eq!(notes[1].1, BUSY_MESSAGE);
    }

    #[tokio::test]
    async fn test_notifications_disabled() {
        let (presenter, record) = presenter(OutputConfig {
            notification: false,
            print_response: false,
            ..Default::default()
        });

        presenter
            .present(&CycleOutcome::Empty {
                trigger: HotkeyAction::PrimaryCapture,
            })
            .await;
        assert!(record.notes.lock().unwrap().is_empty());
    }
}
