mod args;

use args::Args;
use go_fish_run::game_automation::{
    AutoPlayPolicy, Collaborators, EngineConfig, EngineError, EngineResult, GameAutomation,
    TemplateCatalog, TemplateMatcher,
};
use go_fish_run::window::WindowError;
use go_fish_run::{EnigoInput, GameProcess, GameSupervisor, XcapWindow};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

enum Exit {
    Finished(EngineResult<GameAutomation>),
    Interrupted,
    TimedOut,
}

fn main() -> ExitCode {
    let Some(args) = Args::parse() else {
        return ExitCode::SUCCESS;
    };

    let log_level = if args.debug_mode { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("❌ Failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(args)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> EngineResult<()> {
    let mut config = match &args.config_path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    args.apply_to(&mut config);

    let catalog = TemplateCatalog::open(&config.templates_dir)?;
    catalog.validate()?;

    let game = match &config.launch {
        Some(path) => {
            let process =
                GameProcess::launch(path, &config.launch_args, config.launch_settle()).await?;
            let supervisor = GameSupervisor::new(process);
            log::info!("🎮 Game started (pid {:?})", supervisor.id().await);
            Some(supervisor)
        }
        None => None,
    };

    let result = drive(&args, config, catalog, game.clone()).await;

    if let Some(game) = &game {
        game.shutdown().await;
    }
    result
}

async fn drive(
    args: &Args,
    config: EngineConfig,
    catalog: TemplateCatalog,
    game: Option<GameSupervisor>,
) -> EngineResult<()> {
    let window = match XcapWindow::resolve(&config.window_title) {
        Ok(window) => window,
        Err(WindowError::NotFound { title }) => {
            if let Ok(titles) = XcapWindow::list_titles() {
                log::info!("Visible windows: {:?}", titles);
            }
            return Err(EngineError::WindowNotFound { title });
        }
        Err(e) => return Err(e.into()),
    };

    let collaborators = Collaborators {
        window: Arc::new(window),
        matcher: Arc::new(TemplateMatcher::new()),
        input: Arc::new(EnigoInput::new(config.typing_interval())?),
        policy: Box::new(AutoPlayPolicy::new(args.player_name(), !args.no_replay)),
    };
    let mut engine = GameAutomation::new(collaborators, catalog, config)?;
    if let Some(game) = game {
        engine = engine.with_game_control(Box::new(game));
    }
    let mut handle = engine.start();

    let deadline = async {
        match args.timeout_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };

    let exit = tokio::select! {
        result = handle.wait() => Exit::Finished(result),
        _ = tokio::signal::ctrl_c() => Exit::Interrupted,
        _ = deadline => Exit::TimedOut,
    };

    let engine = match exit {
        Exit::Finished(result) => result?,
        Exit::Interrupted => {
            log::info!("🛑 Interrupted, shutting down");
            handle.shutdown().await?
        }
        Exit::TimedOut => {
            log::info!("⏰ Timeout reached, shutting down");
            handle.shutdown().await?
        }
    };

    log::info!(
        "👋 Stopped in {:?} (stuck counter {})",
        engine.state(),
        engine.stuck_counter()
    );
    Ok(())
}
