// Input commands and the synthesizer trait
use super::error::InputResult;
use std::fmt;

/// Keys the engine needs to press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Return,
    Escape,
}

/// One synthesized input action. Coordinates are absolute screen pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputCommand {
    Press(Key),
    TypeText(String),
    Click { x: i32, y: i32 },
    DoubleClick { x: i32, y: i32 },
    MovePointer { x: i32, y: i32 },
    /// Force the frontmost game application to quit.
    ForceQuit,
}

impl fmt::Display for InputCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputCommand::Press(key) => write!(f, "key {:?}", key),
            InputCommand::TypeText(text) => write!(f, "text ({} chars)", text.chars().count()),
            InputCommand::Click { x, y } => write!(f, "click at ({}, {})", x, y),
            InputCommand::DoubleClick { x, y } => write!(f, "double-click at ({}, {})", x, y),
            InputCommand::MovePointer { x, y } => write!(f, "pointer move to ({}, {})", x, y),
            InputCommand::ForceQuit => write!(f, "force quit"),
        }
    }
}

// Trait defining input capabilities. `send` blocks until the command was
// delivered to the OS.
pub trait InputSynthesizer: Send + Sync {
    fn send(&self, command: InputCommand) -> InputResult<()>;
}
