//! Capture-and-dispatch core
//!
//! One capture cycle per hotkey press:
//!
//! ```text
//!  trigger ──busy?──► drop (counted, optional notice)
//!     │
//!     ▼
//!  Capturing   snapshot clipboard → original
//!  Simulating  pre-copy delay, Ctrl/Cmd+C, settle delay   (PrimaryCapture only)
//!  Resolving   re-read clipboard → post_copy, pick text
//!  Dispatching empty/whitespace → Empty outcome, stop
//!  Working     prompt → AI processor (own task, bounded by timeout)
//!  Idle        slot released, outcome → presenter
//! ```
//!
//! `trigger()` takes the busy slot synchronously and runs the rest of the
//! cycle on a spawned task, so the hotkey loop never waits on I/O.

pub mod busy;

use crate::ai::AiProcessor;
use crate::clipboard::ClipboardPort;
use crate::config::{AiConfig, Config};
use crate::error::AiError;
use crate::hotkey::HotkeyAction;
use crate::keys::KeySimulator;
use crate::presenter::ResponsePresenter;
use crate::state::CaptureState;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;

pub use busy::{BusyGuard, BusySlot};

/// One captured request, from hotkey to response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureEvent {
    pub trigger: HotkeyAction,
    /// Clipboard before the synthetic copy
    pub original: String,
    /// Clipboard after the synthetic copy
    pub post_copy: String,
    /// Text sent to the AI processor
    pub resolved: String,
}

/// What the presenter receives at the end of a cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Responded { event: CaptureEvent, response: String },
    Failed { event: CaptureEvent, error: AiError },
    /// Nothing selected and nothing usable on the clipboard
    Empty { trigger: HotkeyAction },
}

impl CycleOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CycleOutcome::Responded { .. })
    }
}

/// Result of a trigger
#[derive(Debug)]
pub enum TriggerResult {
    /// The cycle is running on this task
    Dispatched(JoinHandle<CycleOutcome>),
    /// A cycle was already in flight; this trigger was discarded
    Dropped,
}

/// Choose the text to send.
///
/// Prefers the post-copy clipboard when it is non-empty and either differs
/// from the original or the original was empty. Otherwise the original,
/// which covers "copy did nothing" and "nothing selected".
pub fn resolve_text<'a>(original: &'a str, post_copy: &'a str) -> &'a str {
    if !post_copy.is_empty() && (post_copy != original || original.is_empty()) {
        post_copy
    } else {
        original
    }
}

/// Timing and prompt settings for a cycle
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub pre_copy_delay: Duration,
    pub settle_delay: Duration,
    pub ai_timeout: Duration,
    pub notify_when_busy: bool,
    /// Pid lock file shared by every process that runs cycles
    pub cycle_lock: Option<PathBuf>,
    /// Prompt templates and related AI settings
    pub ai: AiConfig,
}

impl CaptureSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            pre_copy_delay: Duration::from_millis(config.capture.pre_copy_delay_ms),
            settle_delay: Duration::from_millis(config.capture.settle_delay_ms),
            ai_timeout: Duration::from_secs(config.ai.timeout_secs),
            notify_when_busy: config.capture.notify_when_busy,
            cycle_lock: None,
            ai: config.ai.clone(),
        }
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

type StateObserver = Arc<dyn Fn(CaptureState) + Send + Sync>;

struct Inner {
    clipboard: Arc<ClipboardPort>,
    simulator: Arc<dyn KeySimulator>,
    processor: Arc<dyn AiProcessor>,
    presenter: Arc<dyn ResponsePresenter>,
    settings: CaptureSettings,
    busy: BusySlot,
    dropped: AtomicU64,
    observer: RwLock<Option<StateObserver>>,
}

/// Orchestrates capture cycles with at most one in flight
#[derive(Clone)]
pub struct CaptureDispatcher {
    inner: Arc<Inner>,
}

impl CaptureDispatcher {
    pub fn new(
        clipboard: Arc<ClipboardPort>,
        simulator: Arc<dyn KeySimulator>,
        processor: Arc<dyn AiProcessor>,
        presenter: Arc<dyn ResponsePresenter>,
        settings: CaptureSettings,
    ) -> Self {
        let busy = match &settings.cycle_lock {
            Some(path) => BusySlot::with_lock_file(path),
            None => BusySlot::new(),
        };

        Self {
            inner: Arc::new(Inner {
                clipboard,
                simulator,
                processor,
                presenter,
                settings,
                busy,
                dropped: AtomicU64::new(0),
                observer: RwLock::new(None),
            }),
        }
    }

    /// Call `observer` on every state transition (e.g. to write a state file)
    pub fn with_state_observer<F>(self, observer: F) -> Self
    where
        F: Fn(CaptureState) + Send + Sync + 'static,
    {
        if let Ok(mut slot) = self.inner.observer.write() {
            *slot = Some(Arc::new(observer));
        }
        self
    }

    /// Start a capture cycle for `action`, unless one is already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn trigger(&self, action: HotkeyAction) -> TriggerResult {
        let Some(guard) = self.inner.busy.try_acquire() else {
            if self.inner.record_dropped(action) {
                let presenter = self.inner.presenter.clone();
                tokio::spawn(async move { presenter.busy().await });
            }
            return TriggerResult::Dropped;
        };

        tracing::debug!("Starting {} cycle", action);
        let inner = self.inner.clone();
        TriggerResult::Dispatched(tokio::spawn(async move {
            inner.run_cycle(action, guard).await
        }))
    }

    /// Run one capture cycle on the current task.
    ///
    /// For one-shot commands: a busy notice is shown before returning, and
    /// `None` means the trigger was dropped.
    pub async fn capture(&self, action: HotkeyAction) -> Option<CycleOutcome> {
        let guard = self.acquire_or_drop(action).await?;
        Some(self.inner.run_cycle(action, guard).await)
    }

    /// Send given text straight to the processor, skipping clipboard capture.
    /// Returns `None` if a cycle is already running.
    pub async fn process_text(&self, action: HotkeyAction, text: &str) -> Option<CycleOutcome> {
        let guard = self.acquire_or_drop(action).await?;
        Some(
            self.inner
                .finish(action, text.to_string(), text.to_string(), guard)
                .await,
        )
    }

    async fn acquire_or_drop(&self, action: HotkeyAction) -> Option<BusyGuard> {
        let guard = self.inner.busy.try_acquire();
        if guard.is_none() && self.inner.record_dropped(action) {
            self.inner.presenter.busy().await;
        }
        guard
    }

    pub fn is_busy(&self) -> bool {
        self.inner.busy.is_busy()
    }

    /// Triggers discarded because a cycle was in flight
    pub fn dropped_count(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }
}

impl Inner {
    /// Count and log a dropped trigger; true when a busy notice is wanted
    fn record_dropped(&self, action: HotkeyAction) -> bool {
        let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!(
            "Already processing a request, ignoring {} ({} dropped so far)",
            action,
            dropped
        );
        self.settings.notify_when_busy
    }

    fn set_state(&self, state: CaptureState) {
        tracing::trace!("State: {}", state);
        let observer = self.observer.read().ok().and_then(|o| o.clone());
        if let Some(observer) = observer {
            observer(state);
        }
    }

    async fn run_cycle(&self, action: HotkeyAction, guard: BusyGuard) -> CycleOutcome {
        self.set_state(CaptureState::Capturing);
        let original = self.clipboard.read().await;

        let post_copy = match action {
            HotkeyAction::PrimaryCapture => {
                self.set_state(CaptureState::Simulating);
                tokio::time::sleep(self.settings.pre_copy_delay).await;

                match self.simulator.simulate_copy_shortcut().await {
                    Ok(()) => {
                        tokio::time::sleep(self.settings.settle_delay).await;
                        self.set_state(CaptureState::Resolving);
                        self.clipboard.read().await
                    }
                    Err(e) => {
                        tracing::warn!("Copy simulation failed, using clipboard as-is: {}", e);
                        self.set_state(CaptureState::Resolving);
                        original.clone()
                    }
                }
            }
            HotkeyAction::SecondaryAssist => {
                self.set_state(CaptureState::Resolving);
                original.clone()
            }
        };

        self.finish(action, original, post_copy, guard).await
    }

    /// Resolve, call the processor, release the slot and present
    async fn finish(
        &self,
        action: HotkeyAction,
        original: String,
        post_copy: String,
        guard: BusyGuard,
    ) -> CycleOutcome {
        let resolved = resolve_text(&original, &post_copy).to_string();
        self.set_state(CaptureState::Dispatching);

        if resolved.trim().is_empty() {
            drop(guard);
            self.set_state(CaptureState::Idle);

            let outcome = CycleOutcome::Empty { trigger: action };
            self.presenter.present(&outcome).await;
            return outcome;
        }

        tracing::info!(
            "Processing {} chars ({})",
            resolved.chars().count(),
            action
        );

        let event = CaptureEvent {
            trigger: action,
            original,
            post_copy,
            resolved,
        };

        self.set_state(CaptureState::Working);
        let prompt = self.settings.ai.render_prompt(action, &event.resolved);
        let result = self.call_processor(prompt).await;

        drop(guard);
        self.set_state(CaptureState::Idle);

        let outcome = match result {
            Ok(response) => CycleOutcome::Responded { event, response },
            Err(error) => CycleOutcome::Failed { event, error },
        };
        self.presenter.present(&outcome).await;
        outcome
    }

    /// Run the processor on its own task so a panic inside it becomes an error
    async fn call_processor(&self, prompt: String) -> Result<String, AiError> {
        let processor = self.processor.clone();
        let name = processor.name();
        let timeout = self.settings.ai_timeout;

        let mut handle = tokio::spawn(async move { processor.process(&prompt).await });

        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) if e.is_panic() => {
                tracing::error!("AI processor {} panicked", name);
                Err(AiError::Internal(format!("{} processor panicked", name)))
            }
            Ok(Err(e)) => Err(AiError::Internal(e.to_string())),
            Err(_) => {
                handle.abort();
                Err(AiError::Timeout(timeout.as_secs()))
            }
        }
    }
}
