pub mod game_automation;
pub mod input;
pub mod process;
pub mod window;

pub use game_automation::{EngineConfig, EngineError, EngineResult, GameAutomation, GameState};
pub use input::EnigoInput;
pub use process::{GameProcess, GameSupervisor};
pub use window::XcapWindow;
