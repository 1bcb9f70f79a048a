// Tests for the automation engine
// Focus: per-state handlers, counters, deck caching, policy contract, loop control.
// Window, matcher and input are fakes; the catalog is a directory of empty files.

use super::channels::create_event_channel;
use super::config::EngineConfig;
use super::control::{ControlFuture, GameControl};
use super::error::EngineError;
use super::fsm::{Collaborators, GameAutomation, TextRoute, route_text_marker};
use super::match_image::{MatchError, Template, TemplateCatalog, TemplateMatch, VisualMatcher};
use super::observer::ChannelObserver;
use super::policy::{DecisionPolicy, PolicyAnswer, PolicyRequest};
use super::types::{AutomationCommand, AutomationEvent, GameState, Pacing, Step};
use crate::input::{InputCommand, InputResult, InputSynthesizer, Key};
use crate::window::{Frame, WindowAccessor, WindowError, WindowGeometry, WindowResult};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

// ============================================================
// FAKE COLLABORATORS
// ============================================================

const WINDOW: WindowGeometry = WindowGeometry {
    x: 100,
    y: 50,
    width: 640,
    height: 480,
};

#[derive(Clone)]
struct FakeWindow {
    geometry: Arc<Mutex<Option<WindowGeometry>>>,
    captures: Arc<AtomicUsize>,
}

impl FakeWindow {
    fn new() -> Self {
        Self {
            geometry: Arc::new(Mutex::new(Some(WINDOW))),
            captures: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn set_present(&self, present: bool) {
        *self.geometry.lock().unwrap() = present.then_some(WINDOW);
    }

    fn captures(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }
}

impl WindowAccessor for FakeWindow {
    fn title(&self) -> &str {
        "Basilisk II"
    }

    fn geometry(&self) -> WindowResult<WindowGeometry> {
        self.geometry.lock().unwrap().ok_or_else(|| WindowError::Lost {
            title: "Basilisk II".to_string(),
        })
    }

    fn capture(&self) -> WindowResult<Frame> {
        let geometry = self.geometry()?;
        self.captures.fetch_add(1, Ordering::SeqCst);
        Ok(Frame::blank(geometry))
    }
}

/// Reports a match for every label that was `show`n, records every lookup.
#[derive(Clone, Default)]
struct ScriptedMatcher {
    visible: Arc<Mutex<HashMap<String, TemplateMatch>>>,
    calls: Arc<Mutex<Vec<(String, f32)>>>,
}

impl ScriptedMatcher {
    fn show(&self, label: &str, x: i32, y: i32) {
        self.visible
            .lock()
            .unwrap()
            .insert(label.to_string(), TemplateMatch::new(x, y, 0.95));
    }

    fn hide(&self, label: &str) {
        self.visible.lock().unwrap().remove(label);
    }

    fn calls_for(&self, label: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| l == label)
            .count()
    }

    fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn thresholds_for(&self, label: &str) -> Vec<f32> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| l == label)
            .map(|(_, t)| *t)
            .collect()
    }
}

impl VisualMatcher for ScriptedMatcher {
    fn locate(
        &self,
        template: &Template,
        _frame: &Frame,
        threshold: f32,
    ) -> Result<Option<TemplateMatch>, MatchError> {
        self.calls
            .lock()
            .unwrap()
            .push((template.label.clone(), threshold));
        Ok(self.visible.lock().unwrap().get(&template.label).copied())
    }
}

#[derive(Clone, Default)]
struct RecordingInput {
    sent: Arc<Mutex<Vec<InputCommand>>>,
}

impl RecordingInput {
    fn sent(&self) -> Vec<InputCommand> {
        self.sent.lock().unwrap().clone()
    }
}

impl InputSynthesizer for RecordingInput {
    fn send(&self, command: InputCommand) -> InputResult<()> {
        self.sent.lock().unwrap().push(command);
        Ok(())
    }
}

/// Input whose every command takes `delay` to deliver.
#[derive(Clone)]
struct SlowInput {
    delay: Duration,
    started: Arc<AtomicUsize>,
}

impl InputSynthesizer for SlowInput {
    fn send(&self, _command: InputCommand) -> InputResult<()> {
        self.started.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        Ok(())
    }
}

/// Counts restarts; fails each one when `fail` is set.
#[derive(Clone, Default)]
struct FakeGameControl {
    restarts: Arc<AtomicUsize>,
    fail: bool,
}

impl FakeGameControl {
    fn restarts(&self) -> usize {
        self.restarts.load(Ordering::SeqCst)
    }
}

impl GameControl for FakeGameControl {
    fn restart(&self) -> ControlFuture<'_> {
        Box::pin(async move {
            self.restarts.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(EngineError::GameExited {
                    path: PathBuf::from("BasiliskII"),
                    status: "exit status: 1".to_string(),
                });
            }
            Ok(())
        })
    }
}

/// Policy answering every request with the same answer, counting calls.
fn fixed_policy(answer: PolicyAnswer, calls: Arc<AtomicUsize>) -> impl DecisionPolicy {
    move |_request: PolicyRequest| {
        calls.fetch_add(1, Ordering::SeqCst);
        let answer = answer.clone();
        async move { answer }
    }
}

fn abstaining() -> impl DecisionPolicy {
    |_request: PolicyRequest| async { PolicyAnswer::Abstain }
}

// ============================================================
// HARNESS
// ============================================================

struct Harness {
    dir: TempDir,
    window: FakeWindow,
    matcher: ScriptedMatcher,
    input: RecordingInput,
}

fn touch(root: &Path, relative: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, b"").unwrap();
}

fn catalog_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for file in [
        "gui/logo.png",
        "gui/name_entry.png",
        "gofish/title.png",
        "gofish/deck.png",
        "gofish/text/gameover.png",
        "gofish/text/gofish.png",
        "gofish/text/yourturn.png",
        "gofish/cards/ace.png",
        "gofish/cards/king.png",
    ] {
        touch(dir.path(), file);
    }
    dir
}

fn test_config(initial_state: GameState) -> EngineConfig {
    EngineConfig {
        initial_state,
        tick_interval_ms: 0,
        post_click_delay_ms: 0,
        typing_interval_ms: 0,
        ..EngineConfig::default()
    }
}

fn build_with(
    dir: TempDir,
    policy: impl DecisionPolicy + 'static,
    config: EngineConfig,
) -> (GameAutomation, Harness) {
    let harness = Harness {
        dir,
        window: FakeWindow::new(),
        matcher: ScriptedMatcher::default(),
        input: RecordingInput::default(),
    };
    let collaborators = Collaborators {
        window: Arc::new(harness.window.clone()),
        matcher: Arc::new(harness.matcher.clone()),
        input: Arc::new(harness.input.clone()),
        policy: Box::new(policy),
    };
    let catalog = TemplateCatalog::new(harness.dir.path());
    let engine = GameAutomation::new(collaborators, catalog, config).unwrap();
    (engine, harness)
}

fn build(
    initial_state: GameState,
    policy: impl DecisionPolicy + 'static,
) -> (GameAutomation, Harness) {
    build_with(catalog_dir(), policy, test_config(initial_state))
}

// ============================================================
// CONSTRUCTION AND PACING
// ============================================================

#[test]
fn test_new_fails_when_window_missing() {
    let window = FakeWindow::new();
    window.set_present(false);
    let dir = catalog_dir();

    let collaborators = Collaborators {
        window: Arc::new(window),
        matcher: Arc::new(ScriptedMatcher::default()),
        input: Arc::new(RecordingInput::default()),
        policy: Box::new(abstaining()),
    };
    let result = GameAutomation::new(
        collaborators,
        TemplateCatalog::new(dir.path()),
        EngineConfig::default(),
    );

    assert!(
        matches!(result, Err(EngineError::WindowNotFound { ref title }) if title == "Basilisk II"),
        "Missing window should be fatal at construction"
    );
}

#[test]
fn test_step_pacing() {
    let interval = Duration::from_millis(250);
    let frame = Frame::blank(WINDOW);

    assert_eq!(
        Step::stay(GameState::Init).pacing(interval),
        Pacing::Sleep(interval)
    );
    assert_eq!(
        Step::to(GameState::MainMenu).with_frame(frame).pacing(interval),
        Pacing::Immediate
    );
    assert_eq!(
        Step::to(GameState::NameEntry).with_progress().pacing(interval),
        Pacing::Immediate
    );
}

#[tokio::test]
async fn test_states_without_markers_are_idempotent() {
    for state in [
        GameState::Init,
        GameState::MainMenu,
        GameState::GoFishSplash,
        GameState::WaitForText,
        GameState::GetNewCard,
    ] {
        let (mut engine, harness) = build(state, abstaining());

        for _ in 0..3 {
            let step = engine.tick(None).await.unwrap();
            assert_eq!(step.next_state, state, "{:?} should wait in place", state);
            assert!(matches!(step.pacing(Duration::ZERO), Pacing::Sleep(_)));
        }
        assert_eq!(engine.state(), state);
        assert!(harness.input.sent().is_empty(), "{:?} sent input", state);
    }
}

#[tokio::test]
async fn test_new_game_is_unhandled() {
    let (mut engine, _harness) = build(GameState::NewGame, abstaining());

    let err = engine.tick(None).await.unwrap_err();
    assert!(matches!(err, EngineError::UnhandledState(GameState::NewGame)));
}

// ============================================================
// STARTUP AND MENU
// ============================================================

#[tokio::test]
async fn test_init_with_logo_reuses_frame_for_main_menu() {
    let (mut engine, harness) = build(GameState::Init, abstaining());
    harness.matcher.show("logo", 320, 100);

    let step = engine.tick(None).await.unwrap();
    assert_eq!(step.next_state, GameState::MainMenu);
    assert_eq!(step.pacing(Duration::from_secs(1)), Pacing::Immediate);

    let step = engine.tick(step.carried_frame).await.unwrap();
    assert_eq!(step.next_state, GameState::GoFishSplash);
    assert_eq!(harness.window.captures(), 1, "Carried frame should not be recaptured");
    assert_eq!(
        harness.input.sent(),
        vec![
            InputCommand::Press(Key::Char('g')),
            InputCommand::Press(Key::Return)
        ]
    );
}

#[tokio::test]
async fn test_init_opens_game_from_startup_icon() {
    let dir = catalog_dir();
    touch(dir.path(), "gui/startup/icon.png");
    touch(dir.path(), "gui/startup/splash.png");
    let (mut engine, harness) = build_with(dir, abstaining(), test_config(GameState::Init));
    harness.matcher.show("icon", 10, 20);

    let step = engine.tick(None).await.unwrap();

    assert_eq!(step.next_state, GameState::MainMenu);
    assert_eq!(
        harness.input.sent(),
        vec![InputCommand::DoubleClick { x: 110, y: 70 }]
    );
}

#[tokio::test]
async fn test_init_dismisses_startup_splash() {
    let dir = catalog_dir();
    touch(dir.path(), "gui/startup/splash_about.png");
    let (mut engine, harness) = build_with(dir, abstaining(), test_config(GameState::Init));
    harness.matcher.show("splash_about", 200, 150);

    engine.tick(None).await.unwrap();

    assert_eq!(engine.state(), GameState::MainMenu);
    assert_eq!(
        harness.input.sent(),
        vec![InputCommand::Click { x: 300, y: 200 }]
    );
}

#[tokio::test]
async fn test_splash_presses_return_and_skips_sleep() {
    let (mut engine, harness) = build(GameState::GoFishSplash, abstaining());
    harness.matcher.show("title", 320, 40);

    let step = engine.tick(None).await.unwrap();

    assert_eq!(step.next_state, GameState::NameEntry);
    assert_eq!(step.pacing(Duration::from_secs(1)), Pacing::Immediate);
    assert_eq!(harness.input.sent(), vec![InputCommand::Press(Key::Return)]);
}

// ============================================================
// NAME ENTRY
// ============================================================

#[tokio::test]
async fn test_name_entry_rejects_too_long_name() {
    let calls = Arc::new(AtomicUsize::new(0));
    let name = "ABCDEFGHIJKLMNO";
    assert_eq!(name.len(), 15);
    let (mut engine, harness) = build(
        GameState::NameEntry,
        fixed_policy(PolicyAnswer::Name(name.to_string()), calls.clone()),
    );
    harness.matcher.show("name_entry", 320, 240);

    let err = engine.tick(None).await.unwrap_err();

    assert!(matches!(err, EngineError::InvalidName { len: 15, max: 14, .. }));
    assert!(harness.input.sent().is_empty(), "No input for a rejected name");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_name_entry_accepts_max_length_name() {
    let name = "ABCDEFGHIJKLMN";
    let (mut engine, harness) = build(
        GameState::NameEntry,
        fixed_policy(PolicyAnswer::Name(name.to_string()), Arc::default()),
    );
    harness.matcher.show("name_entry", 320, 240);

    let step = engine.tick(None).await.unwrap();

    assert_eq!(step.next_state, GameState::WaitForText);
    assert_eq!(
        harness.input.sent(),
        vec![
            InputCommand::TypeText(name.to_string()),
            InputCommand::Press(Key::Return)
        ]
    );
}

#[tokio::test]
async fn test_name_entry_gives_up_after_max_attempts() {
    let calls = Arc::new(AtomicUsize::new(0));
    let (mut engine, harness) = build(
        GameState::NameEntry,
        fixed_policy(PolicyAnswer::Name("Bot".to_string()), calls.clone()),
    );

    for attempt in 1..5 {
        engine.tick(None).await.unwrap();
        assert_eq!(
            engine.state(),
            GameState::NameEntry,
            "Attempt {} should keep waiting",
            attempt
        );
    }
    engine.tick(None).await.unwrap();

    assert_eq!(engine.state(), GameState::WaitForText);
    assert_eq!(calls.load(Ordering::SeqCst), 0, "Policy asked without a name field");
    assert!(harness.input.sent().is_empty());
}

#[tokio::test]
async fn test_name_entry_abstain_is_fatal() {
    let (mut engine, harness) = build(GameState::NameEntry, abstaining());
    harness.matcher.show("name_entry", 320, 240);

    let err = engine.tick(None).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::PolicyAbstained {
            state: GameState::NameEntry
        }
    ));
}

#[tokio::test]
async fn test_menu_to_wait_for_text_flow() {
    let (mut engine, harness) = build(
        GameState::MainMenu,
        fixed_policy(PolicyAnswer::Name("Bot".to_string()), Arc::default()),
    );
    harness.matcher.show("logo", 320, 100);
    harness.matcher.show("title", 320, 40);
    harness.matcher.show("name_entry", 320, 240);

    for _ in 0..3 {
        engine.tick(None).await.unwrap();
    }

    assert_eq!(engine.state(), GameState::WaitForText);
    assert_eq!(
        harness.input.sent(),
        vec![
            InputCommand::Press(Key::Char('g')),
            InputCommand::Press(Key::Return),
            InputCommand::Press(Key::Return),
            InputCommand::TypeText("Bot".to_string()),
            InputCommand::Press(Key::Return),
        ]
    );
}

// ============================================================
// TEXT ROUTING
// ============================================================

#[test]
fn test_route_text_marker_by_prefix() {
    assert_eq!(route_text_marker("yourturn"), Some(TextRoute::YourTurn));
    assert_eq!(route_text_marker("yourturn_alt"), Some(TextRoute::YourTurn));
    assert_eq!(route_text_marker("gofish2"), Some(TextRoute::GoFish));
    assert_eq!(route_text_marker("gameover"), Some(TextRoute::GameOver));
    assert_eq!(route_text_marker("banner"), None);
    assert_eq!(route_text_marker("YourTurn"), None, "Prefixes are case-sensitive");

    assert_eq!(TextRoute::YourTurn.next_state(), GameState::CardSelection);
    assert_eq!(TextRoute::GoFish.next_state(), GameState::GetNewCard);
}

#[tokio::test]
async fn test_wait_for_text_routes_each_marker() {
    for (label, expected, carries_frame) in [
        ("yourturn", GameState::CardSelection, true),
        ("gofish", GameState::GetNewCard, true),
        ("gameover", GameState::GameOver, false),
    ] {
        let (mut engine, harness) = build(GameState::WaitForText, abstaining());
        harness.matcher.show(label, 320, 400);

        let step = engine.tick(None).await.unwrap();

        assert_eq!(step.next_state, expected, "Marker {}", label);
        assert_eq!(step.carried_frame.is_some(), carries_frame, "Marker {}", label);
        assert_eq!(step.pacing(Duration::from_secs(1)), Pacing::Immediate);
    }
}

#[tokio::test]
async fn test_wait_for_text_skips_unroutable_marker() {
    let dir = catalog_dir();
    touch(dir.path(), "gofish/text/banner.png");
    let (mut engine, harness) = build_with(dir, abstaining(), test_config(GameState::WaitForText));
    harness.matcher.show("banner", 0, 0);

    engine.tick(None).await.unwrap();
    assert_eq!(engine.state(), GameState::WaitForText);

    harness.matcher.show("yourturn", 320, 400);
    engine.tick(None).await.unwrap();
    assert_eq!(engine.state(), GameState::CardSelection);
}

#[tokio::test]
async fn test_text_markers_use_text_threshold() {
    let (mut engine, harness) = build(GameState::Init, abstaining());

    engine.tick(None).await.unwrap();
    assert_eq!(harness.matcher.thresholds_for("logo"), vec![0.70]);

    let (mut engine, harness) = build(GameState::WaitForText, abstaining());
    engine.tick(None).await.unwrap();
    for label in ["gameover", "gofish", "yourturn"] {
        assert_eq!(harness.matcher.thresholds_for(label), vec![0.90], "{}", label);
    }
}

// ============================================================
// CARD SELECTION AND STUCK HANDLING
// ============================================================

#[tokio::test]
async fn test_card_selection_clicks_chosen_card() {
    let asked = Arc::new(Mutex::new(Vec::new()));
    let seen = asked.clone();
    let policy = move |request: PolicyRequest| {
        seen.lock().unwrap().push(request);
        async { PolicyAnswer::Card("king".to_string()) }
    };
    let (mut engine, harness) = build(GameState::CardSelection, policy);
    harness.matcher.show("ace", 60, 400);
    harness.matcher.show("king", 30, 40);

    let step = engine.tick(None).await.unwrap();

    assert_eq!(step.next_state, GameState::WaitForText);
    assert_eq!(
        harness.input.sent(),
        vec![InputCommand::Click { x: 130, y: 90 }]
    );
    assert_eq!(
        *asked.lock().unwrap(),
        vec![PolicyRequest::CardSelection {
            available_cards: vec!["ace".to_string(), "king".to_string()]
        }]
    );
}

#[tokio::test]
async fn test_card_click_applies_vertical_offset() {
    let config = EngineConfig {
        click_offset_y: -20,
        ..test_config(GameState::CardSelection)
    };
    let (mut engine, harness) = build_with(
        catalog_dir(),
        fixed_policy(PolicyAnswer::Card("ace".to_string()), Arc::default()),
        config,
    );
    harness.matcher.show("ace", 30, 40);

    engine.tick(None).await.unwrap();

    assert_eq!(
        harness.input.sent(),
        vec![InputCommand::Click { x: 130, y: 70 }]
    );
}

#[tokio::test]
async fn test_card_selection_ignores_unavailable_choice() {
    let (mut engine, harness) = build(
        GameState::CardSelection,
        fixed_policy(PolicyAnswer::Card("joker".to_string()), Arc::default()),
    );
    harness.matcher.show("ace", 30, 40);

    let step = engine.tick(None).await.unwrap();

    assert_eq!(step.next_state, GameState::CardSelection);
    assert!(harness.input.sent().is_empty());
}

#[tokio::test]
async fn test_card_misses_park_pointer_then_stuck() {
    let calls = Arc::new(AtomicUsize::new(0));
    let (mut engine, harness) = build(
        GameState::CardSelection,
        fixed_policy(PolicyAnswer::Abstain, calls.clone()),
    );

    for miss in 1..=10 {
        engine.tick(None).await.unwrap();
        assert_eq!(engine.state(), GameState::CardSelection, "Miss {}", miss);
        assert_eq!(engine.stuck_counter(), miss);
        let expected_moves = if miss >= 5 { 1 } else { 0 };
        let moves = harness
            .input
            .sent()
            .iter()
            .filter(|c| matches!(c, InputCommand::MovePointer { .. }))
            .count();
        assert_eq!(moves, expected_moves, "Pointer parked exactly once, at miss 5");
    }
    assert_eq!(
        harness.input.sent(),
        vec![InputCommand::MovePointer { x: 105, y: 55 }]
    );

    engine.tick(None).await.unwrap();
    assert_eq!(engine.state(), GameState::Stuck, "Eleventh miss declares stuck");
    assert_eq!(calls.load(Ordering::SeqCst), 0, "No card request without cards");

    engine.tick(None).await.unwrap();
    assert_eq!(engine.state(), GameState::MainMenu);
    assert_eq!(engine.stuck_counter(), 0);
    assert_eq!(calls.load(Ordering::SeqCst), 1, "Policy notified once when stuck");
    assert_eq!(harness.input.sent().last(), Some(&InputCommand::ForceQuit));
}

#[tokio::test]
async fn test_stuck_restarts_game_through_control() {
    let calls = Arc::new(AtomicUsize::new(0));
    let control = FakeGameControl::default();
    let (engine, harness) = build(
        GameState::Stuck,
        fixed_policy(PolicyAnswer::Abstain, calls.clone()),
    );
    let mut engine = engine.with_game_control(Box::new(control.clone()));

    engine.tick(None).await.unwrap();

    assert_eq!(engine.state(), GameState::Init);
    assert_eq!(control.restarts(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1, "Policy still notified");
    assert!(
        harness.input.sent().is_empty(),
        "No force-quit chord when the process can be restarted"
    );
}

#[tokio::test]
async fn test_card_misses_restart_game_once() {
    let control = FakeGameControl::default();
    let (engine, harness) = build(GameState::CardSelection, abstaining());
    let mut engine = engine.with_game_control(Box::new(control.clone()));

    for _ in 0..11 {
        engine.tick(None).await.unwrap();
    }
    assert_eq!(engine.state(), GameState::Stuck);
    assert_eq!(control.restarts(), 0);

    engine.tick(None).await.unwrap();
    assert_eq!(engine.state(), GameState::Init);
    assert_eq!(engine.stuck_counter(), 0);
    assert_eq!(control.restarts(), 1);

    engine.tick(None).await.unwrap();
    assert_eq!(engine.state(), GameState::Init, "Waits for the fresh game");
    assert_eq!(control.restarts(), 1, "One restart per stuck episode");
    assert!(!harness.input.sent().contains(&InputCommand::ForceQuit));
}

#[tokio::test]
async fn test_failed_restart_is_fatal() {
    let control = FakeGameControl {
        fail: true,
        ..FakeGameControl::default()
    };
    let (engine, _harness) = build(GameState::Stuck, abstaining());
    let mut engine = engine.with_game_control(Box::new(control.clone()));

    let result = engine.tick(None).await;

    assert!(matches!(result, Err(EngineError::GameExited { .. })));
    assert_eq!(control.restarts(), 1);
}

#[tokio::test]
async fn test_found_card_resets_stuck_counter() {
    let (mut engine, harness) = build(
        GameState::CardSelection,
        fixed_policy(PolicyAnswer::Card("ace".to_string()), Arc::default()),
    );

    for _ in 0..3 {
        engine.tick(None).await.unwrap();
    }
    assert_eq!(engine.stuck_counter(), 3);

    harness.matcher.show("ace", 30, 40);
    engine.tick(None).await.unwrap();

    assert_eq!(engine.stuck_counter(), 0);
    assert_eq!(engine.state(), GameState::WaitForText);
}

#[tokio::test]
async fn test_card_selection_abstain_keeps_looking() {
    let (mut engine, harness) = build(GameState::CardSelection, abstaining());
    harness.matcher.show("ace", 30, 40);

    let step = engine.tick(None).await.unwrap();

    assert_eq!(step.next_state, GameState::CardSelection);
    assert_eq!(engine.stuck_counter(), 0);
    assert!(harness.input.sent().is_empty());
}

// ============================================================
// DECK CACHING
// ============================================================

#[tokio::test]
async fn test_deck_position_is_cached() {
    let (mut engine, harness) = build(GameState::WaitForText, abstaining());
    harness.matcher.show("gofish", 320, 400);
    harness.matcher.show("deck", 200, 100);

    // WaitForText -> GetNewCard -> WaitForText, twice
    for _ in 0..4 {
        let step = engine.tick(None).await.unwrap();
        engine.tick(step.carried_frame).await.unwrap();
    }

    assert_eq!(harness.matcher.calls_for("deck"), 1, "Deck searched only once");
    assert_eq!(engine.deck_position(), Some((200, 100)));
    let clicks = harness
        .input
        .sent()
        .into_iter()
        .filter(|c| *c == InputCommand::Click { x: 300, y: 150 })
        .count();
    assert!(clicks >= 2, "Every visit clicks the deck");

    engine.invalidate_deck_position();
    assert_eq!(engine.deck_position(), None);
    while engine.state() != GameState::GetNewCard {
        engine.tick(None).await.unwrap();
    }
    engine.tick(None).await.unwrap();
    assert_eq!(harness.matcher.calls_for("deck"), 2);
}

#[tokio::test]
async fn test_missing_deck_is_not_cached() {
    let (mut engine, harness) = build(GameState::GetNewCard, abstaining());

    engine.tick(None).await.unwrap();
    engine.tick(None).await.unwrap();

    assert_eq!(engine.state(), GameState::GetNewCard);
    assert_eq!(engine.deck_position(), None);
    assert_eq!(harness.matcher.calls_for("deck"), 2);
}

// ============================================================
// GAME OVER AND POLICY CONTRACT
// ============================================================

#[tokio::test]
async fn test_game_over_replay() {
    for (replay, key, expected) in [
        (true, 'y', GameState::WaitForText),
        (false, 'n', GameState::MainMenu),
    ] {
        let (mut engine, harness) = build(
            GameState::GameOver,
            fixed_policy(PolicyAnswer::Replay(replay), Arc::default()),
        );

        let step = engine.tick(None).await.unwrap();

        assert_eq!(step.next_state, expected);
        assert_eq!(
            harness.input.sent(),
            vec![InputCommand::Press(Key::Char(key))]
        );
    }
}

#[tokio::test]
async fn test_game_over_wrong_answer_kind_is_error() {
    let (mut engine, harness) = build(
        GameState::GameOver,
        fixed_policy(PolicyAnswer::Name("Bot".to_string()), Arc::default()),
    );

    let err = engine.tick(None).await.unwrap_err();

    assert!(matches!(
        err,
        EngineError::PolicyContract {
            state: GameState::GameOver,
            ..
        }
    ));
    assert!(harness.input.sent().is_empty());
}

#[tokio::test]
async fn test_policy_timeout_declines_replay() {
    let config = EngineConfig {
        policy_timeout_ms: Some(20),
        ..test_config(GameState::GameOver)
    };
    let slow = |_request: PolicyRequest| async {
        tokio::time::sleep(Duration::from_secs(60)).await;
        PolicyAnswer::Replay(true)
    };
    let (mut engine, harness) = build_with(catalog_dir(), slow, config);

    let step = engine.tick(None).await.unwrap();

    assert_eq!(step.next_state, GameState::MainMenu);
    assert_eq!(
        harness.input.sent(),
        vec![InputCommand::Press(Key::Char('n'))]
    );
}

// ============================================================
// WINDOW LOSS
// ============================================================

#[tokio::test]
async fn test_window_loss_is_bounded() {
    let config = EngineConfig {
        max_window_losses: 2,
        ..test_config(GameState::MainMenu)
    };
    let (mut engine, harness) = build_with(catalog_dir(), abstaining(), config);
    harness.window.set_present(false);

    for _ in 0..2 {
        let step = engine.tick(None).await.unwrap();
        assert_eq!(step.next_state, GameState::MainMenu);
    }

    // Recovery resets the count
    harness.window.set_present(true);
    engine.tick(None).await.unwrap();
    harness.window.set_present(false);
    for _ in 0..2 {
        engine.tick(None).await.unwrap();
    }

    let err = engine.tick(None).await.unwrap_err();
    assert!(matches!(err, EngineError::WindowLost { ticks: 3, .. }));
}

#[tokio::test]
async fn test_click_uses_current_window_position() {
    let (mut engine, harness) = build(GameState::GetNewCard, abstaining());
    harness.matcher.show("deck", 200, 100);
    *harness.window.geometry.lock().unwrap() = Some(WindowGeometry::new(0, 0, 640, 480));

    engine.tick(None).await.unwrap();

    assert_eq!(
        harness.input.sent(),
        vec![InputCommand::Click { x: 200, y: 100 }]
    );
}

// ============================================================
// OBSERVER
// ============================================================

#[tokio::test]
async fn test_channel_observer_reports_events() {
    let (tx, mut rx) = create_event_channel(64);
    let (engine, harness) = build(GameState::MainMenu, abstaining());
    let mut engine = engine.with_observer(Arc::new(ChannelObserver::new(tx)));
    harness.matcher.show("logo", 320, 100);

    engine.tick(None).await.unwrap();

    match rx.try_recv().unwrap() {
        AutomationEvent::TemplateChecked { label, found } => {
            assert_eq!(label, "logo");
            assert_eq!(found.map(|m| (m.x, m.y)), Some((320, 100)));
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert!(matches!(
        rx.try_recv().unwrap(),
        AutomationEvent::StateChanged {
            from: GameState::MainMenu,
            to: GameState::GoFishSplash
        }
    ));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_full_event_channel_does_not_block() {
    let (tx, _rx) = create_event_channel(1);
    let (engine, _harness) = build(GameState::WaitForText, abstaining());
    let mut engine = engine.with_observer(Arc::new(ChannelObserver::new(tx)));

    // Three text checks per tick against a one-slot channel
    for _ in 0..3 {
        engine.tick(None).await.unwrap();
    }
    assert_eq!(engine.state(), GameState::WaitForText);
}

// ============================================================
// LOOP CONTROL
// ============================================================

#[tokio::test]
async fn test_start_and_shutdown_returns_engine() {
    let config = EngineConfig {
        tick_interval_ms: 5,
        ..test_config(GameState::WaitForText)
    };
    let (engine, harness) = build_with(catalog_dir(), abstaining(), config);

    let handle = engine.start();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let engine = handle.shutdown().await.unwrap();

    assert_eq!(engine.state(), GameState::WaitForText);
    assert!(harness.matcher.total_calls() > 0, "Loop should have ticked");
}

#[tokio::test]
async fn test_fatal_error_ends_loop() {
    let (engine, _harness) = build(GameState::NewGame, abstaining());

    let mut handle = engine.start();
    let result = tokio::time::timeout(Duration::from_secs(5), handle.wait())
        .await
        .expect("loop should stop on its own");

    assert!(matches!(
        result,
        Err(EngineError::UnhandledState(GameState::NewGame))
    ));
}

#[tokio::test]
async fn test_pause_stops_ticking_until_resume() {
    let config = EngineConfig {
        tick_interval_ms: 5,
        ..test_config(GameState::WaitForText)
    };
    let (engine, harness) = build_with(catalog_dir(), abstaining(), config);
    let handle = engine.start();

    assert!(handle.send(AutomationCommand::Pause).await);
    tokio::time::sleep(Duration::from_millis(30)).await;
    let paused_calls = harness.matcher.total_calls();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(
        harness.matcher.total_calls(),
        paused_calls,
        "No ticks while paused"
    );

    assert!(handle.send(AutomationCommand::Resume).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(harness.matcher.total_calls() > paused_calls, "Ticks resume");

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_invalidate_deck_command() {
    let config = EngineConfig {
        tick_interval_ms: 5,
        ..test_config(GameState::GetNewCard)
    };
    let (engine, harness) = build_with(catalog_dir(), abstaining(), config);
    harness.matcher.show("deck", 200, 100);
    harness.matcher.show("gofish", 320, 400);

    let handle = engine.start();
    tokio::time::sleep(Duration::from_millis(40)).await;
    let before = harness.matcher.calls_for("deck");
    assert_eq!(before, 1);

    harness.matcher.hide("deck");
    assert!(handle.send(AutomationCommand::InvalidateDeck).await);
    tokio::time::sleep(Duration::from_millis(40)).await;
    let engine = handle.shutdown().await.unwrap();

    assert!(harness.matcher.calls_for("deck") > before, "Deck searched again");
    assert_eq!(engine.deck_position(), None);
}

#[tokio::test]
async fn test_shutdown_not_held_up_by_slow_input() {
    let dir = catalog_dir();
    let matcher = ScriptedMatcher::default();
    matcher.show("logo", 320, 100);
    let input = SlowInput {
        delay: Duration::from_millis(1500),
        started: Arc::default(),
    };
    let collaborators = Collaborators {
        window: Arc::new(FakeWindow::new()),
        matcher: Arc::new(matcher),
        input: Arc::new(input.clone()),
        policy: Box::new(abstaining()),
    };
    let config = test_config(GameState::MainMenu);
    let engine =
        GameAutomation::new(collaborators, TemplateCatalog::new(dir.path()), config).unwrap();

    let handle = engine.start();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(input.started.load(Ordering::SeqCst), 1, "Key press in flight");

    let engine = tokio::time::timeout(Duration::from_millis(500), handle.shutdown())
        .await
        .expect("shutdown must not wait for the blocked key press")
        .unwrap();
    assert_eq!(engine.state(), GameState::MainMenu);
}
