// Observers of the automation loop: state transitions, template checks and
// policy exchanges. The engine never configures logging itself.
use super::match_image::{Template, TemplateMatch};
use super::policy::{PolicyAnswer, PolicyRequest};
use super::types::{AutomationEvent, GameState};
use tokio::sync::mpsc;

pub trait EngineObserver: Send + Sync {
    fn state_changed(&self, _from: GameState, _to: GameState) {}

    fn template_checked(&self, _template: &Template, _found: Option<&TemplateMatch>) {}

    fn policy_answered(&self, _request: &PolicyRequest, _answer: &PolicyAnswer) {}
}

/// Default observer writing through the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl EngineObserver for LogObserver {
    fn state_changed(&self, from: GameState, to: GameState) {
        log::info!("🎮 Game state: {:?} -> {:?}", from, to);
    }

    fn template_checked(&self, template: &Template, found: Option<&TemplateMatch>) {
        if let Some(m) = found {
            log::debug!(
                "🎯 Found '{}' at ({}, {}) confidence {:.3}",
                template.label,
                m.x,
                m.y,
                m.confidence
            );
        } else {
            log::trace!("👀 '{}' not on screen", template.label);
        }
    }

    fn policy_answered(&self, request: &PolicyRequest, answer: &PolicyAnswer) {
        log::debug!("🤔 Policy {:?} -> {:?}", request, answer);
    }
}

/// Forwards every observation as an `AutomationEvent`. Events are dropped
/// rather than blocking the loop when the receiver falls behind.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::Sender<AutomationEvent>,
}

impl ChannelObserver {
    pub fn new(tx: mpsc::Sender<AutomationEvent>) -> Self {
        Self { tx }
    }

    fn forward(&self, event: AutomationEvent) {
        if let Err(e) = self.tx.try_send(event) {
            log::trace!("Automation event dropped: {}", e);
        }
    }
}

impl EngineObserver for ChannelObserver {
    fn state_changed(&self, from: GameState, to: GameState) {
        self.forward(AutomationEvent::StateChanged { from, to });
    }

    fn template_checked(&self, template: &Template, found: Option<&TemplateMatch>) {
        self.forward(AutomationEvent::TemplateChecked {
            label: template.label.clone(),
            found: found.copied(),
        });
    }

    fn policy_answered(&self, request: &PolicyRequest, answer: &PolicyAnswer) {
        self.forward(AutomationEvent::PolicyAnswered {
            request: request.clone(),
            answer: answer.clone(),
        });
    }
}
