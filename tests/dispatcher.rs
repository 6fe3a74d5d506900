//! Capture cycle integration tests
//!
//! Drive the dispatcher end to end with in-memory clipboard, key simulator,
//! AI processor and presenter doubles.

use hotprompt::ai::AiProcessor;
use hotprompt::clipboard::{ClipboardBackend, ClipboardPort};
use hotprompt::dispatch::{CaptureDispatcher, CaptureSettings, CycleOutcome, TriggerResult};
use hotprompt::error::{AiError, ClipboardError, KeySimError};
use hotprompt::hotkey::HotkeyAction;
use hotprompt::keys::KeySimulator;
use hotprompt::presenter::ResponsePresenter;
use hotprompt::state::CaptureState;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Shared fake desktop: the clipboard plus whatever text is selected
#[derive(Default)]
struct Desktop {
    clipboard: Mutex<String>,
    selection: Mutex<String>,
}

impl Desktop {
    fn new(clipboard: &str, selection: &str) -> Arc<Self> {
        Arc::new(Self {
            clipboard: Mutex::new(clipboard.to_string()),
            selection: Mutex::new(selection.to_string()),
        })
    }
}

struct MemoryClipboard(Arc<Desktop>);

#[async_trait::async_trait]
impl ClipboardBackend for MemoryClipboard {
    async fn read(&self) -> Result<String, ClipboardError> {
        Ok(self.0.clipboard.lock().unwrap().clone())
    }

    async fn write(&self, text: &str) -> Result<(), ClipboardError> {
        *self.0.clipboard.lock().unwrap() = text.to_string();
        Ok(())
    }

    async fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Copies the selection to the clipboard, like a focused app receiving Ctrl+C.
/// With a lag the app updates the clipboard some time after the chord.
struct FakeCopy {
    desktop: Arc<Desktop>,
    calls: AtomicUsize,
    fail: bool,
    lag: Duration,
    called_at: Mutex<Option<Instant>>,
}

impl FakeCopy {
    fn new(desktop: Arc<Desktop>, fail: bool, lag: Duration) -> Self {
        Self {
            desktop,
            calls: AtomicUsize::new(0),
            fail,
            lag,
            called_at: Mutex::new(None),
        }
    }
}

fn copy_selection(desktop: &Desktop) {
    let selection = desktop.selection.lock().unwrap().clone();
    if !selection.is_empty() {
        *desktop.clipboard.lock().unwrap() = selection;
    }
}

#[async_trait::async_trait]
impl KeySimulator for FakeCopy {
    async fn simulate_copy_shortcut(&self) -> Result<(), KeySimError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.called_at.lock().unwrap() = Some(Instant::now());
        if self.fail {
            return Err(KeySimError::AllMethodsFailed);
        }

        if self.lag.is_zero() {
            copy_selection(&self.desktop);
        } else {
            let desktop = self.desktop.clone();
            let lag = self.lag;
            tokio::spawn(async move {
                tokio::time::sleep(lag).await;
                copy_selection(&desktop);
            });
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

#[derive(Clone, Copy)]
enum Behavior {
    Echo,
    Fail,
    Panic,
}

/// Records prompts and tracks how many calls overlap
struct FakeAi {
    behavior: Behavior,
    delay: Duration,
    prompts: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeAi {
    fn new(behavior: Behavior, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            delay,
            prompts: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl AiProcessor for FakeAi {
    async fn process(&self, prompt: &str) -> Result<String, AiError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.behavior {
            Behavior::Echo => Ok(format!("answer to: {}", prompt)),
            Behavior::Fail => Err(AiError::Network("connection refused".to_string())),
            Behavior::Panic => panic!("processor exploded"),
        }
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

#[derive(Default)]
struct Recorder {
    outcomes: Mutex<Vec<CycleOutcome>>,
    busy_notices: AtomicUsize,
}

#[async_trait::async_trait]
impl ResponsePresenter for Recorder {
    async fn present(&self, outcome: &CycleOutcome) {
        self.outcomes.lock().unwrap().push(outcome.clone());
    }

    async fn busy(&self) {
        self.busy_notices.fetch_add(1, Ordering::SeqCst);
    }
}

struct Harness {
    dispatcher: CaptureDispatcher,
    copy: Arc<FakeCopy>,
    ai: Arc<FakeAi>,
    presenter: Arc<Recorder>,
}

fn settings() -> CaptureSettings {
    let mut settings = CaptureSettings::default();
    settings.pre_copy_delay = Duration::ZERO;
    settings.settle_delay = Duration::from_millis(10);
    settings.ai_timeout = Duration::from_secs(5);
    settings.ai.primary_prompt = "Explain: {text}".to_string();
    settings.ai.secondary_prompt = "Quick: {text}".to_string();
    settings
}

fn harness(desktop: Arc<Desktop>, ai: Arc<FakeAi>, copy_fails: bool, settings: CaptureSettings) -> Harness {
    let copy = FakeCopy::new(desktop.clone(), copy_fails, Duration::ZERO);
    harness_with_copy(desktop, ai, copy, settings)
}

fn harness_with_copy(
    desktop: Arc<Desktop>,
    ai: Arc<FakeAi>,
    copy: FakeCopy,
    settings: CaptureSettings,
) -> Harness {
    let clipboard = Arc::new(ClipboardPort::new(
        vec![Box::new(MemoryClipboard(desktop))],
        Duration::from_millis(200),
    ));
    let copy = Arc::new(copy);
    let presenter = Arc::new(Recorder::default());

    let dispatcher = CaptureDispatcher::new(
        clipboard,
        copy.clone(),
        ai.clone(),
        presenter.clone(),
        settings,
    );

    Harness {
        dispatcher,
        copy,
        ai,
        presenter,
    }
}

async fn run(dispatcher: &CaptureDispatcher, action: HotkeyAction) -> CycleOutcome {
    match dispatcher.trigger(action) {
        TriggerResult::Dispatched(handle) => handle.await.expect("cycle task failed"),
        TriggerResult::Dropped => panic!("trigger unexpectedly dropped"),
    }
}

#[tokio::test]
async fn test_selected_text_is_sent() {
    let h = harness(
        Desktop::new("something older", "Hello world"),
        FakeAi::new(Behavior::Echo, Duration::ZERO),
        false,
        settings(),
    );

    let outcome = run(&h.dispatcher, HotkeyAction::PrimaryCapture).await;

    match outcome {
        CycleOutcome::Responded { event, response } => {
            assert_eq!(event.original, "something older");
            assert_eq!(event.post_copy, "Hello world");
            assert_eq!(event.resolved, "Hello world");
            assert_eq!(response, "answer to: Explain: Hello world");
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(h.ai.calls(), 1);
    assert_eq!(h.copy.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.presenter.outcomes.lock().unwrap().len(), 1);
    assert!(!h.dispatcher.is_busy());
}

#[tokio::test]
async fn test_selection_with_empty_clipboard() {
    let mut settings = settings();
    settings.ai.primary_prompt = "{text}".to_string();
    let h = harness(
        Desktop::new("", "Hello world"),
        FakeAi::new(Behavior::Echo, Duration::ZERO),
        false,
        settings,
    );

    let outcome = run(&h.dispatcher, HotkeyAction::PrimaryCapture).await;
    assert!(outcome.is_success());
    assert_eq!(h.ai.prompts.lock().unwrap().as_slice(), ["Hello world".to_string()]);
}

#[tokio::test]
async fn test_unchanged_clipboard_uses_original() {
    // Nothing selected: the copy leaves "foo" on the clipboard
    let h = harness(
        Desktop::new("foo", ""),
        FakeAi::new(Behavior::Echo, Duration::ZERO),
        false,
        settings(),
    );

    let outcome = run(&h.dispatcher, HotkeyAction::PrimaryCapture).await;

    match outcome {
        CycleOutcome::Responded { event, .. } => {
            assert_eq!(event.original, "foo");
            assert_eq!(event.post_copy, "foo");
            assert_eq!(event.resolved, "foo");
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(h.ai.prompts.lock().unwrap()[0], "Explain: foo");
}

#[tokio::test]
async fn test_nothing_to_send_skips_ai() {
    let h = harness(
        Desktop::new("", ""),
        FakeAi::new(Behavior::Echo, Duration::ZERO),
        false,
        settings(),
    );

    let outcome = run(&h.dispatcher, HotkeyAction::PrimaryCapture).await;

    assert_eq!(
        outcome,
        CycleOutcome::Empty {
            trigger: HotkeyAction::PrimaryCapture
        }
    );
    assert_eq!(h.ai.calls(), 0);
    assert!(!h.dispatcher.is_busy());
}

#[tokio::test]
async fn test_whitespace_only_skips_ai() {
    let h = harness(
        Desktop::new("  \n\t ", ""),
        FakeAi::new(Behavior::Echo, Duration::ZERO),
        false,
        settings(),
    );

    let outcome = run(&h.dispatcher, HotkeyAction::SecondaryAssist).await;
    assert!(matches!(outcome, CycleOutcome::Empty { .. }));
    assert_eq!(h.ai.calls(), 0);
}

#[tokio::test]
async fn test_second_press_while_busy_is_dropped() {
    let h = harness(
        Desktop::new("", "Hello world"),
        FakeAi::new(Behavior::Echo, Duration::from_millis(300)),
        false,
        settings(),
    );

    let first = match h.dispatcher.trigger(HotkeyAction::PrimaryCapture) {
        TriggerResult::Dispatched(handle) => handle,
        TriggerResult::Dropped => panic!("first trigger dropped"),
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(matches!(
        h.dispatcher.trigger(HotkeyAction::PrimaryCapture),
        TriggerResult::Dropped
    ));

    assert!(first.await.unwrap().is_success());

    // Let the spawned busy notice run
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(h.ai.calls(), 1);
    assert_eq!(h.dispatcher.dropped_count(), 1);
    assert_eq!(h.presenter.busy_notices.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_rapid_triggers_single_flight() {
    let h = harness(
        Desktop::new("", "Hello world"),
        FakeAi::new(Behavior::Echo, Duration::from_millis(100)),
        false,
        settings(),
    );

    let mut handles = Vec::new();
    for _ in 0..10 {
        if let TriggerResult::Dispatched(handle) = h.dispatcher.trigger(HotkeyAction::PrimaryCapture) {
            handles.push(handle);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(h.ai.max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(h.ai.calls() as u64 + h.dispatcher.dropped_count(), 10);
    assert!(h.dispatcher.dropped_count() >= 1);
}

#[tokio::test]
async fn test_busy_released_after_failure() {
    let h = harness(
        Desktop::new("text", ""),
        FakeAi::new(Behavior::Fail, Duration::ZERO),
        false,
        settings(),
    );

    let outcome = run(&h.dispatcher, HotkeyAction::SecondaryAssist).await;
    match outcome {
        CycleOutcome::Failed { error, .. } => {
            assert_eq!(error, AiError::Network("connection refused".to_string()))
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert!(!h.dispatcher.is_busy());

    // The next press is accepted
    assert!(matches!(
        run(&h.dispatcher, HotkeyAction::SecondaryAssist).await,
        CycleOutcome::Failed { .. }
    ));
    assert_eq!(h.ai.calls(), 2);
}

#[tokio::test]
async fn test_busy_released_after_processor_panic() {
    let h = harness(
        Desktop::new("text", ""),
        FakeAi::new(Behavior::Panic, Duration::ZERO),
        false,
        settings(),
    );

    let outcome = run(&h.dispatcher, HotkeyAction::SecondaryAssist).await;
    assert!(matches!(
        outcome,
        CycleOutcome::Failed {
            error: AiError::Internal(_),
            ..
        }
    ));
    assert!(!h.dispatcher.is_busy());
    assert!(matches!(
        h.dispatcher.trigger(HotkeyAction::SecondaryAssist),
        TriggerResult::Dispatched(_)
    ));
}

#[tokio::test]
async fn test_processor_timeout() {
    let mut settings = settings();
    settings.ai_timeout = Duration::from_millis(50);
    let h = harness(
        Desktop::new("text", ""),
        FakeAi::new(Behavior::Echo, Duration::from_secs(5)),
        false,
        settings,
    );

    let outcome = run(&h.dispatcher, HotkeyAction::SecondaryAssist).await;
    assert!(matches!(
        outcome,
        CycleOutcome::Failed {
            error: AiError::Timeout(_),
            ..
        }
    ));
    assert!(!h.dispatcher.is_busy());
}

#[tokio::test]
async fn test_secondary_assist_skips_copy() {
    let h = harness(
        Desktop::new("clipboard text", "selected text"),
        FakeAi::new(Behavior::Echo, Duration::ZERO),
        false,
        settings(),
    );

    let outcome = run(&h.dispatcher, HotkeyAction::SecondaryAssist).await;

    assert_eq!(h.copy.calls.load(Ordering::SeqCst), 0);
    match outcome {
        CycleOutcome::Responded { event, .. } => {
            assert_eq!(event.trigger, HotkeyAction::SecondaryAssist);
            assert_eq!(event.resolved, "clipboard text");
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(h.ai.prompts.lock().unwrap()[0], "Quick: clipboard text");
}

#[tokio::test]
async fn test_copy_failure_falls_back_to_clipboard() {
    let h = harness(
        Desktop::new("already copied", "selected text"),
        FakeAi::new(Behavior::Echo, Duration::ZERO),
        true,
        settings(),
    );

    let outcome = run(&h.dispatcher, HotkeyAction::PrimaryCapture).await;

    match outcome {
        CycleOutcome::Responded { event, .. } => {
            assert_eq!(event.post_copy, "already copied");
            assert_eq!(event.resolved, "already copied");
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn test_state_transitions() {
    let h = harness(
        Desktop::new("", "Hello world"),
        FakeAi::new(Behavior::Echo, Duration::ZERO),
        false,
        settings(),
    );

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let dispatcher = h
        .dispatcher
        .with_state_observer(move |state| sink.lock().unwrap().push(state));

    run(&dispatcher, HotkeyAction::PrimaryCapture).await;

    assert_eq!(
        seen.lock().unwrap().as_slice(),
        [
            CaptureState::Capturing,
            CaptureState::Simulating,
            CaptureState::Resolving,
            CaptureState::Dispatching,
            CaptureState::Working,
            CaptureState::Idle,
        ]
    );
}

#[tokio::test]
async fn test_process_text_bypasses_clipboard() {
    let h = harness(
        Desktop::new("ignored", "ignored"),
        FakeAi::new(Behavior::Echo, Duration::ZERO),
        false,
        settings(),
    );

    let outcome = h
        .dispatcher
        .process_text(HotkeyAction::PrimaryCapture, "direct input")
        .await
        .unwrap();

    assert!(outcome.is_success());
    assert_eq!(h.copy.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.ai.prompts.lock().unwrap()[0], "Explain: direct input");
}

#[tokio::test]
async fn test_settle_delay_waits_for_slow_copy() {
    let desktop = Desktop::new("something older", "Hello world");
    let mut settings = settings();
    settings.settle_delay = Duration::from_millis(250);
    let copy = FakeCopy::new(desktop.clone(), false, Duration::from_millis(50));
    let h = harness_with_copy(desktop, FakeAi::new(Behavior::Echo, Duration::ZERO), copy, settings);

    match run(&h.dispatcher, HotkeyAction::PrimaryCapture).await {
        CycleOutcome::Responded { event, .. } => {
            assert_eq!(event.post_copy, "Hello world");
            assert_eq!(event.resolved, "Hello world");
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn test_copy_slower_than_settle_delay_uses_original() {
    let desktop = Desktop::new("something older", "Hello world");
    let mut settings = settings();
    settings.settle_delay = Duration::from_millis(10);
    let copy = FakeCopy::new(desktop.clone(), false, Duration::from_millis(400));
    let h = harness_with_copy(desktop, FakeAi::new(Behavior::Echo, Duration::ZERO), copy, settings);

    match run(&h.dispatcher, HotkeyAction::PrimaryCapture).await {
        CycleOutcome::Responded { event, .. } => {
            assert_eq!(event.post_copy, "something older");
            assert_eq!(event.resolved, "something older");
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn test_pre_copy_delay_precedes_copy() {
    let desktop = Desktop::new("", "Hello world");
    let mut settings = settings();
    settings.pre_copy_delay = Duration::from_millis(120);
    let copy = FakeCopy::new(desktop.clone(), false, Duration::ZERO);
    let h = harness_with_copy(desktop, FakeAi::new(Behavior::Echo, Duration::ZERO), copy, settings);

    let started = Instant::now();
    assert!(run(&h.dispatcher, HotkeyAction::PrimaryCapture).await.is_success());

    let called_at = (*h.copy.called_at.lock().unwrap()).expect("copy chord was sent");
    assert!(called_at.duration_since(started) >= Duration::from_millis(120));
}

#[tokio::test]
async fn test_cycle_lock_shared_between_dispatchers() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = settings();
    settings.cycle_lock = Some(dir.path().join("cycle.lock"));

    // A daemon cycle and a one-shot command, each with its own dispatcher
    let daemon = harness(
        Desktop::new("daemon text", ""),
        FakeAi::new(Behavior::Echo, Duration::from_millis(300)),
        false,
        settings.clone(),
    );
    let one_shot = harness(
        Desktop::new("one-shot text", ""),
        FakeAi::new(Behavior::Echo, Duration::ZERO),
        false,
        settings,
    );

    let first = match daemon.dispatcher.trigger(HotkeyAction::SecondaryAssist) {
        TriggerResult::Dispatched(handle) => handle,
        TriggerResult::Dropped => panic!("first trigger dropped"),
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(one_shot
        .dispatcher
        .capture(HotkeyAction::SecondaryAssist)
        .await
        .is_none());
    assert_eq!(one_shot.dispatcher.dropped_count(), 1);
    assert_eq!(one_shot.presenter.busy_notices.load(Ordering::SeqCst), 1);
    assert_eq!(one_shot.ai.calls(), 0);
    assert!(!one_shot.dispatcher.is_busy());

    assert!(first.await.unwrap().is_success());

    let outcome = one_shot
        .dispatcher
        .capture(HotkeyAction::SecondaryAssist)
        .await
        .expect("lock released after the first cycle");
    assert!(outcome.is_success());
    assert_eq!(one_shot.ai.calls(), 1);
}
