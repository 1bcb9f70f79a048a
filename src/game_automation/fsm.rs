// Finite State Machine implementation for the Go Fish automation
use super::channels::create_command_channel;
use super::config::EngineConfig;
use super::control::GameControl;
use super::error::{EngineError, EngineResult};
use super::match_image::{Template, TemplateCatalog, TemplateMatch, VisualMatcher};
use super::observer::{EngineObserver, LogObserver};
use super::policy::{DecisionPolicy, PolicyAnswer, PolicyRequest, ask_with_timeout};
use super::types::{AutomationCommand, GameState, Pacing, Step};
use crate::input::{InputCommand, InputSynthesizer, Key};
use crate::window::{Frame, WindowAccessor, WindowError, WindowGeometry};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// The external collaborators the engine drives.
///
/// Window, matcher and input calls block, so they are shared with the
/// blocking thread pool for the duration of each call.
pub struct Collaborators {
    pub window: Arc<dyn WindowAccessor>,
    pub matcher: Arc<dyn VisualMatcher>,
    pub input: Arc<dyn InputSynthesizer>,
    pub policy: Box<dyn DecisionPolicy>,
}

/// Routing branch selected by a text marker's file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextRoute {
    YourTurn,
    GoFish,
    GameOver,
}

impl TextRoute {
    pub fn next_state(self) -> GameState {
        match self {
            TextRoute::YourTurn => GameState::CardSelection,
            TextRoute::GoFish => GameState::GetNewCard,
            TextRoute::GameOver => GameState::GameOver,
        }
    }
}

/// Route a text marker by the leading token of its label.
pub fn route_text_marker(label: &str) -> Option<TextRoute> {
    if label.starts_with("yourturn") {
        Some(TextRoute::YourTurn)
    } else if label.starts_with("gofish") {
        Some(TextRoute::GoFish)
    } else if label.starts_with("gameover") {
        Some(TextRoute::GameOver)
    } else {
        None
    }
}

pub struct GameAutomation {
    state: GameState,
    window: Arc<dyn WindowAccessor>,
    matcher: Arc<dyn VisualMatcher>,
    input: Arc<dyn InputSynthesizer>,
    policy: Box<dyn DecisionPolicy>,
    game: Option<Box<dyn GameControl>>,
    observer: Arc<dyn EngineObserver>,
    catalog: TemplateCatalog,
    config: EngineConfig,
    deck_position: Option<(i32, i32)>,
    stuck_counter: u32,
    name_entry_misses: u32,
    window_losses: u32,
}

enum Flow {
    Continue,
    Exit,
}

impl GameAutomation {
    /// Build an engine for an already running game window.
    ///
    /// The window is resolved once here; failing that is fatal.
    pub fn new(
        collaborators: Collaborators,
        catalog: TemplateCatalog,
        config: EngineConfig,
    ) -> EngineResult<Self> {
        let Collaborators {
            window,
            matcher,
            input,
            policy,
        } = collaborators;

        match window.geometry() {
            Ok(geometry) => log::info!(
                "🤖 Attached to \"{}\" at ({}, {}) {}x{}",
                window.title(),
                geometry.x,
                geometry.y,
                geometry.width,
                geometry.height
            ),
            Err(WindowError::NotFound { title } | WindowError::Lost { title }) => {
                return Err(EngineError::WindowNotFound { title });
            }
            Err(e) => return Err(e.into()),
        }

        Ok(Self {
            state: config.initial_state,
            window,
            matcher,
            input,
            policy,
            game: None,
            observer: Arc::new(LogObserver),
            catalog,
            config,
            deck_position: None,
            stuck_counter: 0,
            name_entry_misses: 0,
            window_losses: 0,
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn EngineObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Let stuck recovery restart the game process instead of sending the
    /// force-quit key chord.
    pub fn with_game_control(mut self, game: Box<dyn GameControl>) -> Self {
        self.game = Some(game);
        self
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn stuck_counter(&self) -> u32 {
        self.stuck_counter
    }

    pub fn deck_position(&self) -> Option<(i32, i32)> {
        self.deck_position
    }

    pub fn invalidate_deck_position(&mut self) {
        if self.deck_position.take().is_some() {
            log::debug!("🂠 Deck position invalidated");
        }
    }

    /// Spawn the loop on the current tokio runtime and return immediately.
    ///
    /// Dropping every sender of the returned handle stops the loop.
    pub fn start(self) -> AutomationHandle {
        log::info!("🚀 Starting Go Fish automation");
        let (command_tx, command_rx) = create_command_channel();
        let join = tokio::spawn(self.run(command_rx));
        AutomationHandle { command_tx, join }
    }

    /// Run until shutdown or a fatal error, one handler per iteration.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<AutomationCommand>,
    ) -> EngineResult<Self> {
        log::info!("🎮 Automation loop started in {:?}", self.state);
        let mut carried: Option<Frame> = None;
        let mut paused = false;
        let mut deferred = Vec::new();

        'outer: loop {
            while paused {
                let command = commands.recv().await;
                if let Flow::Exit = self.apply_command(command, &mut paused) {
                    break 'outer;
                }
            }

            let step = {
                let shutdown = wait_for_shutdown(&mut commands, &mut deferred);
                tokio::select! {
                    biased;
                    _ = shutdown => break 'outer,
                    step = self.tick(carried.take()) => step?,
                }
            };
            for command in deferred.drain(..) {
                self.apply_command(Some(command), &mut paused);
            }

            match step.pacing(self.config.tick_interval()) {
                Pacing::Immediate => carried = step.carried_frame,
                Pacing::Sleep(delay) => {
                    let shutdown = wait_for_shutdown(&mut commands, &mut deferred);
                    tokio::select! {
                        biased;
                        _ = shutdown => break 'outer,
                        _ = sleep(delay) => {}
                    }
                    for command in deferred.drain(..) {
                        self.apply_command(Some(command), &mut paused);
                    }
                }
            }
        }

        log::info!("🛑 Automation loop ended in {:?}", self.state);
        Ok(self)
    }

    fn apply_command(&mut self, command: Option<AutomationCommand>, paused: &mut bool) -> Flow {
        match command {
            Some(AutomationCommand::Pause) => {
                if !*paused {
                    log::info!("⏸️ Automation paused");
                }
                *paused = true;
            }
            Some(AutomationCommand::Resume) => {
                if *paused {
                    log::info!("▶️ Automation resumed");
                }
                *paused = false;
            }
            Some(AutomationCommand::InvalidateDeck) => self.invalidate_deck_position(),
            Some(AutomationCommand::Shutdown) | None => return Flow::Exit,
        }
        Flow::Continue
    }

    /// Run the handler for the current state once and apply its transition.
    ///
    /// Recoverable window errors leave the state untouched until
    /// `max_window_losses` consecutive ticks have failed.
    pub async fn tick(&mut self, frame: Option<Frame>) -> EngineResult<Step> {
        let step = match self.dispatch(frame).await {
            Ok(step) => {
                self.window_losses = 0;
                step
            }
            Err(EngineError::Window(e)) if e.is_recoverable() => {
                self.window_losses += 1;
                if self.window_losses > self.config.max_window_losses {
                    return Err(EngineError::WindowLost {
                        ticks: self.window_losses,
                        source: e,
                    });
                }
                log::warn!(
                    "⚠️ {} (attempt {}/{})",
                    e,
                    self.window_losses,
                    self.config.max_window_losses
                );
                Step::stay(self.state)
            }
            Err(e) => return Err(e),
        };

        if step.next_state != self.state {
            self.set_state(step.next_state);
        }
        Ok(step)
    }

    async fn dispatch(&mut self, frame: Option<Frame>) -> EngineResult<Step> {
        match self.state {
            GameState::Init => self.handle_init(frame).await,
            GameState::MainMenu => self.handle_main_menu(frame).await,
            GameState::GoFishSplash => self.handle_go_fish_splash(frame).await,
            GameState::NameEntry => self.handle_name_entry(frame).await,
            GameState::WaitForText => self.handle_wait_for_text(frame).await,
            GameState::CardSelection => self.handle_card_selection(frame).await,
            GameState::GetNewCard => self.handle_get_new_card(frame).await,
            GameState::GameOver => self.handle_game_over().await,
            GameState::Stuck => self.handle_stuck().await,
            GameState::NewGame => Err(EngineError::UnhandledState(GameState::NewGame)),
        }
    }

    fn set_state(&mut self, next: GameState) {
        let previous = self.state;
        self.state = next;
        if next == GameState::NameEntry {
            self.name_entry_misses = 0;
        }
        self.observer.state_changed(previous, next);
    }

    async fn frame_or_capture(&self, frame: Option<Frame>) -> EngineResult<Frame> {
        if let Some(frame) = frame {
            return Ok(frame);
        }
        let window = Arc::clone(&self.window);
        blocking(move || Ok(window.capture()?)).await
    }

    async fn geometry(&self) -> EngineResult<WindowGeometry> {
        let window = Arc::clone(&self.window);
        blocking(move || Ok(window.geometry()?)).await
    }

    async fn find(
        &self,
        template: &Template,
        frame: &Frame,
    ) -> EngineResult<Option<TemplateMatch>> {
        let threshold = self.config.matching.threshold_for(template.category);
        let matcher = Arc::clone(&self.matcher);
        let (owned, frame) = (template.clone(), frame.clone());
        let found = blocking(move || Ok(matcher.locate(&owned, &frame, threshold)?)).await?;
        self.observer.template_checked(template, found.as_ref());
        Ok(found)
    }

    async fn send_input(&self, command: InputCommand) -> EngineResult<()> {
        let input = Arc::clone(&self.input);
        blocking(move || Ok(input.send(command)?)).await
    }

    async fn press(&self, key: Key) -> EngineResult<()> {
        self.send_input(InputCommand::Press(key)).await
    }

    async fn ask(&self, request: PolicyRequest) -> PolicyAnswer {
        let answer = ask_with_timeout(
            self.policy.as_ref(),
            request.clone(),
            self.config.policy_timeout(),
        )
        .await;
        self.observer.policy_answered(&request, &answer);
        answer
    }

    /// Screen position of a window-relative point, using fresh geometry.
    async fn to_screen(&self, rel_x: i32, rel_y: i32) -> EngineResult<(i32, i32)> {
        let geometry = self.geometry().await?;
        Ok(geometry.to_screen(rel_x, rel_y + self.config.click_offset_y))
    }

    async fn handle_init(&mut self, frame: Option<Frame>) -> EngineResult<Step> {
        let frame = self.frame_or_capture(frame).await?;

        if self.find(&self.catalog.menu_logo(), &frame).await?.is_some() {
            log::info!("🏠 Game already at the main menu");
            return Ok(Step::to(GameState::MainMenu).with_frame(frame));
        }

        for marker in self.catalog.startup_markers()? {
            let Some(hit) = self.find(&marker, &frame).await? else {
                continue;
            };
            let (x, y) = self.to_screen(hit.x, hit.y).await?;
            if marker.label.starts_with("icon") {
                log::info!("🖱️ Opening game from icon '{}'", marker.label);
                self.send_input(InputCommand::DoubleClick { x, y }).await?;
            } else if marker.label.starts_with("splash") {
                log::info!("🖱️ Dismissing startup splash '{}'", marker.label);
                self.send_input(InputCommand::Click { x, y }).await?;
            } else {
                log::warn!("Startup marker '{}' has no known prefix", marker.label);
                continue;
            }
            return Ok(Step::to(GameState::MainMenu));
        }

        log::debug!("Waiting for game startup...");
        Ok(Step::stay(GameState::Init))
    }

    async fn handle_main_menu(&mut self, frame: Option<Frame>) -> EngineResult<Step> {
        let frame = self.frame_or_capture(frame).await?;
        if self.find(&self.catalog.menu_logo(), &frame).await?.is_none() {
            log::debug!("Waiting for main menu...");
            return Ok(Step::stay(GameState::MainMenu));
        }

        log::debug!("Found logo! Going to Go Fish.");
        self.press(Key::Char('g')).await?;
        self.press(Key::Return).await?;
        Ok(Step::to(GameState::GoFishSplash))
    }

    async fn handle_go_fish_splash(&mut self, frame: Option<Frame>) -> EngineResult<Step> {
        let frame = self.frame_or_capture(frame).await?;
        if self.find(&self.catalog.splash_title(), &frame).await?.is_none() {
            log::debug!("Waiting for Go Fish splash...");
            return Ok(Step::stay(GameState::GoFishSplash));
        }

        self.press(Key::Return).await?;
        Ok(Step::to(GameState::NameEntry).with_progress())
    }

    async fn handle_name_entry(&mut self, frame: Option<Frame>) -> EngineResult<Step> {
        let frame = self.frame_or_capture(frame).await?;

        if self.find(&self.catalog.name_entry(), &frame).await?.is_none() {
            self.name_entry_misses += 1;
            if self.name_entry_misses >= self.config.name_entry_max_attempts {
                log::warn!(
                    "⚠️ Name field not seen after {} checks; assuming it was already passed",
                    self.name_entry_misses
                );
                self.name_entry_misses = 0;
                return Ok(Step::to(GameState::WaitForText));
            }
            log::debug!(
                "Waiting for name field ({}/{})",
                self.name_entry_misses,
                self.config.name_entry_max_attempts
            );
            return Ok(Step::stay(GameState::NameEntry));
        }

        self.name_entry_misses = 0;
        let name = match self.ask(PolicyRequest::NameEntry).await {
            PolicyAnswer::Name(name) => name,
            PolicyAnswer::Abstain => {
                return Err(EngineError::PolicyAbstained {
                    state: GameState::NameEntry,
                });
            }
            other => {
                return Err(EngineError::PolicyContract {
                    state: GameState::NameEntry,
                    answer: format!("{:?}", other),
                });
            }
        };

        let len = name.chars().count();
        if len > self.config.max_name_len {
            return Err(EngineError::InvalidName {
                name,
                len,
                max: self.config.max_name_len,
            });
        }

        log::info!("✍️ Entering name.");
        self.send_input(InputCommand::TypeText(name)).await?;
        self.press(Key::Return).await?;
        Ok(Step::to(GameState::WaitForText))
    }

    async fn handle_wait_for_text(&mut self, frame: Option<Frame>) -> EngineResult<Step> {
        let frame = self.frame_or_capture(frame).await?;

        for marker in self.catalog.text_markers()? {
            if self.find(&marker, &frame).await?.is_none() {
                continue;
            }
            match route_text_marker(&marker.label) {
                Some(route @ (TextRoute::YourTurn | TextRoute::GoFish)) => {
                    return Ok(Step::to(route.next_state()).with_frame(frame));
                }
                Some(TextRoute::GameOver) => {
                    return Ok(Step::to(GameState::GameOver).with_progress());
                }
                None => log::warn!("Text marker '{}' matched but routes nowhere", marker.label),
            }
        }

        log::debug!("Waiting for Text...");
        Ok(Step::stay(GameState::WaitForText))
    }

    async fn handle_card_selection(&mut self, frame: Option<Frame>) -> EngineResult<Step> {
        log::info!("🃏 It's our turn now!");
        let frame = self.frame_or_capture(frame).await?;

        let mut found: Vec<(String, TemplateMatch)> = Vec::new();
        for card in self.catalog.cards()? {
            if let Some(hit) = self.find(&card, &frame).await? {
                found.push((card.label, hit));
            }
        }

        if found.is_empty() {
            return self.card_miss().await;
        }

        self.stuck_counter = 0;
        let available_cards: Vec<String> = found.iter().map(|(label, _)| label.clone()).collect();
        log::debug!("available_cards: {:?}", available_cards);

        match self
            .ask(PolicyRequest::CardSelection { available_cards })
            .await
        {
            PolicyAnswer::Card(choice) => {
                let Some((_, hit)) = found.iter().find(|(label, _)| *label == choice) else {
                    log::info!("{} not in available cards!", choice);
                    return Ok(Step::stay(GameState::CardSelection));
                };
                let (x, y) = self.to_screen(hit.x, hit.y).await?;
                self.send_input(InputCommand::Click { x, y }).await?;
                sleep(self.config.post_click_delay()).await;
                Ok(Step::to(GameState::WaitForText))
            }
            PolicyAnswer::Abstain => {
                log::info!("No card chosen; looking again");
                Ok(Step::stay(GameState::CardSelection))
            }
            other => Err(EngineError::PolicyContract {
                state: GameState::CardSelection,
                answer: format!("{:?}", other),
            }),
        }
    }

    async fn card_miss(&mut self) -> EngineResult<Step> {
        self.stuck_counter += 1;
        let misses = self.stuck_counter;

        if misses > self.config.stuck_after {
            log::error!("🆘 No cards found {} times in a row; giving up", misses);
            return Ok(Step::to(GameState::Stuck));
        }

        if misses == self.config.park_pointer_after {
            // The cursor can hide part of a card.
            let (dx, dy) = self.config.pointer_park_offset;
            let (x, y) = self.geometry().await?.to_screen(dx, dy);
            log::warn!("No cards found ({}); moving the pointer out of the way", misses);
            self.send_input(InputCommand::MovePointer { x, y }).await?;
        } else if misses < self.config.park_pointer_after {
            log::debug!("No cards found ({})", misses);
        } else {
            log::warn!("No cards found ({}/{})", misses, self.config.stuck_after);
        }
        Ok(Step::stay(GameState::CardSelection))
    }

    async fn handle_get_new_card(&mut self, frame: Option<Frame>) -> EngineResult<Step> {
        log::info!("🎣 It's time to Go Fish!");

        let (rel_x, rel_y) = match self.deck_position {
            Some(position) => position,
            None => {
                let frame = self.frame_or_capture(frame).await?;
                let Some(hit) = self.find(&self.catalog.deck(), &frame).await? else {
                    log::warn!("Couldn't find the deck of cards!");
                    return Ok(Step::stay(GameState::GetNewCard));
                };
                log::debug!("Deck located at ({}, {})", hit.x, hit.y);
                self.deck_position = Some((hit.x, hit.y));
                (hit.x, hit.y)
            }
        };

        let (x, y) = self.to_screen(rel_x, rel_y).await?;
        self.send_input(InputCommand::Click { x, y }).await?;
        sleep(self.config.post_click_delay()).await;
        Ok(Step::to(GameState::WaitForText))
    }

    async fn handle_game_over(&mut self) -> EngineResult<Step> {
        log::info!("🏁 Game over!");
        match self.ask(PolicyRequest::GameOver).await {
            PolicyAnswer::Replay(true) => {
                self.press(Key::Char('y')).await?;
                Ok(Step::to(GameState::WaitForText))
            }
            PolicyAnswer::Replay(false) | PolicyAnswer::Abstain => {
                self.press(Key::Char('n')).await?;
                Ok(Step::to(GameState::MainMenu))
            }
            other => Err(EngineError::PolicyContract {
                state: GameState::GameOver,
                answer: format!("{:?}", other),
            }),
        }
    }

    /// Restart through the game control when there is one (the fresh
    /// instance starts over from `Init`), else force-quit with the key chord.
    async fn handle_stuck(&mut self) -> EngineResult<Step> {
        let answer = self.ask(PolicyRequest::Stuck).await;
        if answer != PolicyAnswer::Abstain {
            log::debug!("Ignoring policy answer {:?} to stuck notification", answer);
        }

        self.stuck_counter = 0;
        self.invalidate_deck_position();

        if let Some(game) = &self.game {
            log::warn!("🔄 Restarting the game and starting over");
            game.restart().await?;
            return Ok(Step::to(GameState::Init));
        }

        log::warn!("🔄 Force quitting the game and starting over");
        self.send_input(InputCommand::ForceQuit).await?;
        Ok(Step::to(GameState::MainMenu))
    }
}

/// Run a blocking collaborator call on tokio's blocking thread pool.
async fn blocking<T, F>(call: F) -> EngineResult<T>
where
    F: FnOnce() -> EngineResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(call).await?
}

async fn wait_for_shutdown(
    commands: &mut mpsc::Receiver<AutomationCommand>,
    deferred: &mut Vec<AutomationCommand>,
) {
    loop {
        match commands.recv().await {
            Some(AutomationCommand::Shutdown) | None => return,
            Some(other) => deferred.push(other),
        }
    }
}

/// Handle to a loop started with [`GameAutomation::start`].
pub struct AutomationHandle {
    command_tx: mpsc::Sender<AutomationCommand>,
    join: JoinHandle<EngineResult<GameAutomation>>,
}

impl AutomationHandle {
    /// Queue a command; `false` if the loop is no longer running.
    pub async fn send(&self, command: AutomationCommand) -> bool {
        self.command_tx.send(command).await.is_ok()
    }

    /// Wait for the loop to end on its own (a fatal error).
    ///
    /// Must not be called again once it has returned.
    pub async fn wait(&mut self) -> EngineResult<GameAutomation> {
        (&mut self.join).await?
    }

    /// Stop the loop, cancelling any in-flight handler, and return the engine.
    pub async fn shutdown(self) -> EngineResult<GameAutomation> {
        let _ = self.command_tx.send(AutomationCommand::Shutdown).await;
        self.join.await?
    }
}
