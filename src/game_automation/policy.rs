//! Decision policy: the pluggable source of game-playing choices.
//!
//! The engine asks at four points: the name to enter, the card to play, whether
//! to play again, and (as a notification) that it got stuck. Any
//! `Fn(PolicyRequest) -> impl Future<Output = PolicyAnswer>` closure is a
//! policy.

use super::types::GameState;
use rand::seq::IndexedRandom;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyRequest {
    NameEntry,
    CardSelection { available_cards: Vec<String> },
    GameOver,
    Stuck,
}

impl PolicyRequest {
    pub fn state(&self) -> GameState {
        match self {
            PolicyRequest::NameEntry => GameState::NameEntry,
            PolicyRequest::CardSelection { .. } => GameState::CardSelection,
            PolicyRequest::GameOver => GameState::GameOver,
            PolicyRequest::Stuck => GameState::Stuck,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyAnswer {
    Name(String),
    /// Label of the card to play; need not be among the visible cards.
    Card(String),
    Replay(bool),
    /// No decision. Also what a timed-out call turns into.
    Abstain,
}

pub type PolicyFuture<'a> = Pin<Box<dyn Future<Output = PolicyAnswer> + Send + 'a>>;

pub trait DecisionPolicy: Send + Sync {
    fn decide(&self, request: PolicyRequest) -> PolicyFuture<'_>;
}

impl<F, Fut> DecisionPolicy for F
where
    F: Fn(PolicyRequest) -> Fut + Send + Sync,
    Fut: Future<Output = PolicyAnswer> + Send + 'static,
{
    fn decide(&self, request: PolicyRequest) -> PolicyFuture<'_> {
        Box::pin(self(request))
    }
}

/// Ask `policy`, turning an expired `timeout` into `Abstain`.
pub async fn ask_with_timeout(
    policy: &dyn DecisionPolicy,
    request: PolicyRequest,
    timeout: Option<Duration>,
) -> PolicyAnswer {
    let state = request.state();
    match timeout {
        None => policy.decide(request).await,
        Some(limit) => match tokio::time::timeout(limit, policy.decide(request)).await {
            Ok(answer) => answer,
            Err(_) => {
                log::warn!(
                    "⏱️ Decision policy did not answer {:?} within {:?}",
                    state,
                    limit
                );
                PolicyAnswer::Abstain
            }
        },
    }
}

/// Plays on its own: fixed name, a random visible card, optional replay.
#[derive(Debug, Clone)]
pub struct AutoPlayPolicy {
    name: String,
    replay: bool,
}

impl AutoPlayPolicy {
    pub fn new(name: impl Into<String>, replay: bool) -> Self {
        Self {
            name: name.into(),
            replay,
        }
    }
}

impl DecisionPolicy for AutoPlayPolicy {
    fn decide(&self, request: PolicyRequest) -> PolicyFuture<'_> {
        let answer = match request {
            PolicyRequest::NameEntry => PolicyAnswer::Name(self.name.clone()),
            PolicyRequest::CardSelection { available_cards } => {
                match available_cards.choose(&mut rand::rng()) {
                    Some(card) => {
                        log::info!("🃏 Selecting {}", card);
                        PolicyAnswer::Card(card.clone())
                    }
                    None => PolicyAnswer::Abstain,
                }
            }
            PolicyRequest::GameOver => {
                if self.replay {
                    log::info!("🔁 Playing again");
                }
                PolicyAnswer::Replay(self.replay)
            }
            PolicyRequest::Stuck => {
                log::warn!("🆘 Automation is stuck; the game will be restarted");
                PolicyAnswer::Abstain
            }
        };
        Box::pin(std::future::ready(answer))
    }
}
