// Types and enums for game automation
use super::match_image::TemplateMatch;
use super::policy::{PolicyAnswer, PolicyRequest};
use crate::window::Frame;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where the game is, as far as the screen tells us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameState {
    Init,
    MainMenu,
    GoFishSplash,
    NameEntry,
    WaitForText,
    CardSelection,
    GetNewCard,
    GameOver,
    Stuck,
    /// Reserved; no handler exists for it.
    NewGame,
}

/// Outcome of one handler invocation.
///
/// `carried_frame` is handed to the next handler instead of capturing again;
/// `progress` asks the loop to run the next handler without the poll delay.
#[derive(Debug, Clone)]
pub struct Step {
    pub next_state: GameState,
    pub carried_frame: Option<Frame>,
    pub progress: bool,
}

/// What the loop does between two handler invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    Immediate,
    Sleep(Duration),
}

impl Step {
    /// No transition; poll again after the interval.
    pub fn stay(state: GameState) -> Self {
        Self {
            next_state: state,
            carried_frame: None,
            progress: false,
        }
    }

    /// Transition to `state`.
    pub fn to(state: GameState) -> Self {
        Self::stay(state)
    }

    pub fn with_frame(mut self, frame: Frame) -> Self {
        self.carried_frame = Some(frame);
        self
    }

    pub fn with_progress(mut self) -> Self {
        self.progress = true;
        self
    }

    pub fn pacing(&self, interval: Duration) -> Pacing {
        if self.carried_frame.is_some() || self.progress {
            Pacing::Immediate
        } else {
            Pacing::Sleep(interval)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutomationCommand {
    Pause,
    Resume,
    /// Forget the cached deck position; it is searched for again next time.
    InvalidateDeck,
    Shutdown,
}

#[derive(Debug, Clone)]
pub enum AutomationEvent {
    StateChanged { from: GameState, to: GameState },
    TemplateChecked {
        label: String,
        found: Option<TemplateMatch>,
    },
    PolicyAnswered {
        request: PolicyRequest,
        answer: PolicyAnswer,
    },
}
