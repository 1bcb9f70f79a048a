//! Engine configuration
//!
//! Every tunable the automation loop uses lives here. Defaults reproduce the
//! behaviour the bot was tuned with; a JSON file passed with `--config` may
//! override any subset of fields.

use super::error::{EngineError, EngineResult};
use super::match_image::MatchConfig;
use super::types::GameState;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Title (or title substring) of the game window.
    pub window_title: String,
    /// Executable to spawn before attaching; attach only when `None`.
    pub launch: Option<PathBuf>,
    pub launch_args: Vec<String>,
    /// Wait after spawning before the window is looked up.
    pub launch_settle_ms: u64,
    /// Root of the template catalog.
    pub templates_dir: PathBuf,
    pub initial_state: GameState,
    pub matching: MatchConfig,
    /// Delay between polls when a handler made no progress.
    pub tick_interval_ms: u64,
    /// Wait after clicking a card or the deck.
    pub post_click_delay_ms: u64,
    /// Pause between typed characters.
    pub typing_interval_ms: u64,
    pub max_name_len: usize,
    /// Failed name-field checks before assuming the field was already passed.
    pub name_entry_max_attempts: u32,
    /// Card misses after which the pointer is moved out of the way.
    pub park_pointer_after: u32,
    /// Card misses tolerated before the engine declares itself stuck.
    pub stuck_after: u32,
    /// Window-relative spot the pointer is parked at.
    pub pointer_park_offset: (i32, i32),
    /// Vertical correction added to every click. Zero when the reported window
    /// origin and the captured region line up, which holds for xcap. Window
    /// managers that report the origin below a 20 px title bar need `-20`.
    pub click_offset_y: i32,
    /// Upper bound on one decision policy call; no bound when `None`.
    pub policy_timeout_ms: Option<u64>,
    /// Consecutive ticks the window may be missing before the loop gives up.
    pub max_window_losses: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_title: "Basilisk II".to_string(),
            launch: None,
            launch_args: Vec::new(),
            launch_settle_ms: 5_000,
            templates_dir: PathBuf::from("templates"),
            initial_state: GameState::Init,
            matching: MatchConfig::default(),
            tick_interval_ms: 1_000,
            post_click_delay_ms: 1_000,
            typing_interval_ms: 150,
            max_name_len: 14,
            name_entry_max_attempts: 5,
            park_pointer_after: 5,
            stuck_after: 10,
            pointer_park_offset: (5, 5),
            click_offset_y: 0,
            policy_timeout_ms: None,
            max_window_losses: 30,
        }
    }
}

impl EngineConfig {
    /// Load a JSON config; missing fields keep their defaults.
    pub fn load(path: &Path) -> EngineResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| EngineError::Config {
            path: path.to_path_buf(),
            description: e.to_string(),
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| EngineError::Config {
            path: path.to_path_buf(),
            description: e.to_string(),
        })?;
        log::debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn post_click_delay(&self) -> Duration {
        Duration::from_millis(self.post_click_delay_ms)
    }

    pub fn typing_interval(&self) -> Duration {
        Duration::from_millis(self.typing_interval_ms)
    }

    pub fn launch_settle(&self) -> Duration {
        Duration::from_millis(self.launch_settle_ms)
    }

    pub fn policy_timeout(&self) -> Option<Duration> {
        self.policy_timeout_ms.map(Duration::from_millis)
    }
}
