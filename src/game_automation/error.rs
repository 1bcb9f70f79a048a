use super::match_image::MatchError;
use super::types::GameState;
use crate::input::InputError;
use crate::window::WindowError;
use std::path::PathBuf;
use thiserror::Error;

/// A specialized `Result` type for the automation engine.
pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("No window found matching title \"{title}\"")]
    WindowNotFound { title: String },

    #[error("Don't know how to handle state {0:?}")]
    UnhandledState(GameState),

    #[error("Name \"{name}\" is {len} characters long; at most {max} are allowed")]
    InvalidName { name: String, len: usize, max: usize },

    #[error("Decision policy answered {answer} to a {state:?} request")]
    PolicyContract { state: GameState, answer: String },

    #[error("Decision policy gave no answer in state {state:?}")]
    PolicyAbstained { state: GameState },

    #[error("Window unavailable for {ticks} consecutive ticks: {source}")]
    WindowLost { ticks: u32, source: WindowError },

    #[error(transparent)]
    Window(#[from] WindowError),

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error(transparent)]
    Input(#[from] InputError),

    #[error("Failed to launch {path:?}: {source}")]
    LaunchFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Game process {path:?} exited during startup ({status})")]
    GameExited { path: PathBuf, status: String },

    #[error("Invalid config {path:?}: {description}")]
    Config { path: PathBuf, description: String },

    #[error("Automation task failed: {source}")]
    JoinError {
        #[from]
        source: tokio::task::JoinError,
    },
}
