//! Daemon module - main event loop orchestration
//!
//! Owns the single-instance lock, the state file and the hotkey listener,
//! and hands every hotkey press to the capture dispatcher.

use crate::ai;
use crate::clipboard::ClipboardPort;
use crate::config::Config;
use crate::dispatch::{CaptureDispatcher, CaptureSettings, TriggerResult};
use crate::error::{HotkeyError, HotpromptError, Result};
use crate::hotkey::{self, HotkeyEvent, HotkeyListener};
use crate::keys::SimulatorChain;
use crate::notification::NotificationPort;
use crate::presenter::DesktopPresenter;
use crate::state::{CaptureState, StateFile};
use pidlock::Pidlock;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Build the dispatcher and all of its ports from configuration
pub fn build_dispatcher(config: &Config) -> Result<CaptureDispatcher> {
    let clipboard = Arc::new(ClipboardPort::from_config(&config.clipboard)?);
    tracing::debug!("Clipboard chain: {}", clipboard.backend_names().join(" -> "));

    let simulator = Arc::new(SimulatorChain::from_config(&config.capture));
    let processor = ai::create_processor(&config.ai)?;
    tracing::debug!("AI processor: {} ({})", processor.name(), config.ai.model);

    let notifications = Arc::new(if config.output.notification {
        NotificationPort::platform(config.output.notification_max_chars)
    } else {
        NotificationPort::disabled()
    });
    let presenter = Arc::new(DesktopPresenter::new(
        notifications,
        clipboard.clone(),
        config.output.clone(),
    ));

    // The daemon and one-shot commands share one cycle lock
    let runtime_dir = Config::runtime_dir();
    std::fs::create_dir_all(&runtime_dir)?;
    let mut settings = CaptureSettings::from_config(config);
    settings.cycle_lock = Some(runtime_dir.join("cycle.lock"));

    Ok(CaptureDispatcher::new(
        clipboard,
        simulator,
        processor,
        presenter,
        settings,
    ))
}

/// Lock file held for the daemon's lifetime, released on drop
struct InstanceLock {
    lock: Pidlock,
    path: PathBuf,
}

impl InstanceLock {
    fn acquire() -> Result<Self> {
        let dir = Config::runtime_dir();
        std::fs::create_dir_all(&dir)?;

        let path = dir.join("daemon.lock");
        let mut lock = Pidlock::new(&path.to_string_lossy());
        lock.acquire()
            .map_err(|_| HotpromptError::AlreadyRunning(path.display().to_string()))?;

        tracing::debug!("Acquired instance lock {:?}", path);
        Ok(Self { lock, path })
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        if let Err(e) = self.lock.release() {
            tracing::warn!("Failed to release lock {:?}: {:?}", self.path, e);
        }
    }
}

/// Main daemon that orchestrates all components
pub struct Daemon {
    config: Config,
    state_file: Option<StateFile>,
}

impl Daemon {
    /// Create a new daemon with the given configuration
    pub fn new(config: Config) -> Self {
        let state_file = config.resolve_state_file().map(StateFile::new);
        Self { config, state_file }
    }

    /// Start the hotkey listener.
    ///
    /// Returns `Ok(None)` when hotkeys are disabled or unavailable and the
    /// daemon should keep running without them.
    async fn start_hotkeys(
        &self,
    ) -> Result<Option<(Box<dyn HotkeyListener>, mpsc::Receiver<HotkeyEvent>)>> {
        if !self.config.hotkey.enabled {
            tracing::info!("Built-in hotkeys disabled, bind `hotprompt clipboard` in your desktop instead");
            return Ok(None);
        }

        let started = match hotkey::create_listener(&self.config.hotkey) {
            Ok(mut listener) => match listener.start().await {
                Ok(rx) => Ok((listener, rx)),
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };

        match started {
            Ok((listener, rx)) => {
                tracing::info!("Hotkey backend: {}", listener.name());
                for (combo, action) in &self.config.hotkey.bindings {
                    tracing::info!("Listening for {} ({})", combo, action);
                }
                Ok(Some((listener, rx)))
            }
            Err(e) if self.config.hotkey.required => Err(e.into()),
            Err(e) => {
                match e {
                    HotkeyError::PermissionDenied(_) => tracing::error!("{}", e),
                    _ => tracing::error!("Hotkeys unavailable: {}", e),
                }
                tracing::warn!("Running without hotkeys (set hotkey.required = true to exit instead)");
                Ok(None)
            }
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        tracing::info!("Starting hotprompt daemon");

        let _lock = InstanceLock::acquire()?;

        let mut dispatcher = build_dispatcher(&self.config)?;
        if let Some(ref file) = self.state_file {
            tracing::info!("State file: {:?}", file.path());
            let observer = file.clone();
            dispatcher = dispatcher.with_state_observer(move |state| observer.write(state));
        }

        let (mut listener, mut hotkey_rx) = match self.start_hotkeys().await? {
            Some((listener, rx)) => (Some(listener), Some(rx)),
            None => (None, None),
        };

        self.update_state(CaptureState::Idle);

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        // Main event loop
        loop {
            tokio::select! {
                event = async {
                    match &mut hotkey_rx {
                        Some(rx) => rx.recv().await,
                        None => std::future::pending().await,
                    }
                } => {
                    match event {
                        Some(HotkeyEvent::Triggered(action)) => {
                            tracing::debug!("Hotkey: {}", action);
                            if let TriggerResult::Dispatched(handle) = dispatcher.trigger(action) {
                                tokio::spawn(async move {
                                    if let Err(e) = handle.await {
                                        tracing::error!("Capture cycle task failed: {}", e);
                                    }
                                });
                            }
                        }
                        None => {
                            tracing::warn!("Hotkey listener stopped, continuing without hotkeys");
                            hotkey_rx = None;
                        }
                    }
                }

                signal = &mut shutdown => {
                    tracing::info!("Received {}, shutting down...", signal);
                    break;
                }
            }
        }

        if dispatcher.is_busy() {
            tracing::info!("Abandoning request in flight");
        }

        if let Some(ref mut listener) = listener {
            if let Err(e) = listener.stop().await {
                tracing::warn!("Failed to stop hotkey listener: {}", e);
            }
        }

        if let Some(ref file) = self.state_file {
            file.cleanup();
        }

        tracing::info!(
            "Daemon stopped ({} triggers dropped while busy)",
            dispatcher.dropped_count()
        );

        Ok(())
    }

    fn update_state(&self, state: CaptureState) {
        if let Some(ref file) = self.state_file {
            file.write(state);
        }
    }
}

/// Resolves with the name of the first shutdown signal received
#[cfg(unix)]
async fn shutdown_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => "SIGINT",
                _ = sigterm.recv() => "SIGTERM",
            }
        }
        Err(e) => {
            tracing::warn!("Failed to set up SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            "SIGINT"
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> &'static str {
    let _ = tokio::signal::ctrl_c().await;
    "Ctrl+C"
}
