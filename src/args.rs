use go_fish_run::EngineConfig;
use std::env;
use std::path::PathBuf;

pub const DEFAULT_PLAYER_NAME: &str = "FishBot";

#[derive(Debug, Default)]
pub struct Args {
    pub window_title: Option<String>,
    pub launch: Option<PathBuf>,
    pub templates_dir: Option<PathBuf>,
    pub config_path: Option<PathBuf>,
    pub player_name: Option<String>,
    pub no_replay: bool,
    pub policy_timeout_ms: Option<u64>,
    pub debug_mode: bool,
    pub timeout_secs: Option<u64>,
}

impl Args {
    pub fn parse() -> Option<Self> {
        Self::parse_from(env::args().skip(1))
    }

    /// Returns `None` when the program should exit without running
    /// (help, version, or a bad flag already reported).
    pub fn parse_from(args: impl IntoIterator<Item = String>) -> Option<Self> {
        let mut parsed = Args::default();

        for arg in args {
            if arg == "--help" || arg == "-h" {
                print_help();
                return None;
            } else if arg == "--version" || arg == "-v" {
                println!(
                    "Go Fish Run v{} (c) {}",
                    env!("APP_VERSION_DISPLAY"),
                    env!("APP_BUILD_YEAR")
                );
                return None;
            } else if arg == "--debug" {
                parsed.debug_mode = true;
            } else if arg == "--no-replay" {
                parsed.no_replay = true;
            } else if let Some(val) = arg.strip_prefix("--title=") {
                parsed.window_title = Some(val.to_string());
            } else if let Some(val) = arg.strip_prefix("--launch=") {
                parsed.launch = Some(PathBuf::from(val));
            } else if let Some(val) = arg.strip_prefix("--templates=") {
                parsed.templates_dir = Some(PathBuf::from(val));
            } else if let Some(val) = arg.strip_prefix("--config=") {
                parsed.config_path = Some(PathBuf::from(val));
            } else if let Some(val) = arg.strip_prefix("--name=") {
                parsed.player_name = Some(val.to_string());
            } else if let Some(val) = arg.strip_prefix("--policy-timeout=") {
                match val.parse::<u64>() {
                    Ok(ms) => parsed.policy_timeout_ms = Some(ms),
                    Err(_) => {
                        eprintln!("❌ Invalid policy timeout value: {}", val);
                        return None;
                    }
                }
            } else if let Some(val) = arg.strip_prefix("--timeout=") {
                match val.parse::<u64>() {
                    Ok(secs) => parsed.timeout_secs = Some(secs),
                    Err(_) => {
                        eprintln!("❌ Invalid timeout value: {}", val);
                        return None;
                    }
                }
            } else {
                eprintln!("❌ Unknown argument: {}", arg);
                print_help();
                return None;
            }
        }

        Some(parsed)
    }

    /// Command line flags override values from the config file.
    pub fn apply_to(&self, config: &mut EngineConfig) {
        if let Some(title) = &self.window_title {
            config.window_title = title.clone();
        }
        if let Some(launch) = &self.launch {
            config.launch = Some(launch.clone());
        }
        if let Some(dir) = &self.templates_dir {
            config.templates_dir = dir.clone();
        }
        if let Some(ms) = self.policy_timeout_ms {
            config.policy_timeout_ms = Some(ms);
        }
    }

    pub fn player_name(&self) -> &str {
        self.player_name.as_deref().unwrap_or(DEFAULT_PLAYER_NAME)
    }
}

fn print_help() {
    println!("🐟 Go Fish Automation Tool");
    println!();
    println!("USAGE:");
    println!("    go-fish-run [FLAGS]");
    println!();
    println!("FLAGS:");
    println!("    --title=TEXT        Game window title or part of it (default: Basilisk II)");
    println!("    --launch=PATH       Start this executable before attaching to its window");
    println!("    --templates=DIR     Template catalog root (default: templates)");
    println!("    --config=FILE       Load engine settings from a JSON file");
    println!(
        "    --name=NAME         Player name, at most 14 characters (default: {})",
        DEFAULT_PLAYER_NAME
    );
    println!("    --no-replay         Go back to the main menu after a game instead of replaying");
    println!("    --policy-timeout=MS Give up on a decision after MS milliseconds");
    println!("    --debug             Enable debug output for automation");
    println!("    --timeout=N         Auto-exit after N seconds (for testing)");
    println!("    --help, -h          Show this help message");
    println!("    --version, -v       Show version information");
    println!();
    println!("EXAMPLES:");
    println!("    go-fish-run --title=\"Basilisk II\"");
    println!("    go-fish-run --launch=/usr/bin/BasiliskII --name=Nemo");
    println!("    go-fish-run --config=engine.json --debug --timeout=600");
}
