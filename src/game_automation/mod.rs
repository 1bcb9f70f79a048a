// Game automation module
// This module provides a finite state machine that plays Go Fish through the
// game window: it looks at the screen, matches templates and synthesizes input.

pub mod channels;
pub mod config;
pub mod control;
pub mod error;
pub mod fsm;
pub mod match_image;
pub mod observer;
pub mod policy;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export the main types and functions for easy access
pub use channels::{create_command_channel, create_event_channel};
pub use config::EngineConfig;
pub use control::{ControlFuture, GameControl};
pub use error::{EngineError, EngineResult};
pub use fsm::{AutomationHandle, Collaborators, GameAutomation, TextRoute, route_text_marker};
pub use match_image::{
    MatchConfig, MatchError, Template, TemplateCatalog, TemplateCategory, TemplateMatch,
    TemplateMatcher, VisualMatcher,
};
pub use observer::{ChannelObserver, EngineObserver, LogObserver};
pub use policy::{AutoPlayPolicy, DecisionPolicy, PolicyAnswer, PolicyFuture, PolicyRequest};
pub use types::{AutomationCommand, AutomationEvent, GameState, Pacing, Step};
