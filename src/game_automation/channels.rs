// Communication channels for game automation
use super::types::{AutomationCommand, AutomationEvent};
use tokio::sync::mpsc;

/// Command channel feeding a running automation loop.
pub fn create_command_channel() -> (
    mpsc::Sender<AutomationCommand>,
    mpsc::Receiver<AutomationCommand>,
) {
    mpsc::channel(32)
}

/// Event channel for a `ChannelObserver`.
pub fn create_event_channel(
    capacity: usize,
) -> (mpsc::Sender<AutomationEvent>, mpsc::Receiver<AutomationEvent>) {
    mpsc::channel(capacity.max(1))
}
