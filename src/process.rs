// Game process lifecycle: optionally spawn the emulator before attaching,
// and make sure it does not outlive the automation.
use crate::game_automation::{ControlFuture, EngineError, EngineResult, GameControl};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

pub struct GameProcess {
    path: PathBuf,
    args: Vec<String>,
    settle: Duration,
    child: Child,
}

impl GameProcess {
    /// Spawn `path` and give it `settle` to bring up its window.
    ///
    /// Exiting before the settle time is over counts as a failed launch.
    pub async fn launch(path: &Path, args: &[String], settle: Duration) -> EngineResult<Self> {
        let child = spawn(path, args, settle).await?;
        Ok(Self {
            path: path.to_path_buf(),
            args: args.to_vec(),
            settle,
            child,
        })
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Kill the running instance and launch the same command again.
    pub async fn restart(&mut self) -> EngineResult<()> {
        self.shutdown().await;
        self.child = spawn(&self.path, &self.args, self.settle).await?;
        Ok(())
    }

    /// Kill the process and reap it. Already exited is fine.
    pub async fn shutdown(&mut self) {
        match self.child.try_wait() {
            Ok(Some(status)) => {
                log::info!("Game process already exited ({})", status);
                return;
            }
            Ok(None) => {}
            Err(e) => log::warn!("⚠️ Could not query game process: {}", e),
        }

        log::info!("🔪 Stopping game process {:?}", self.path);
        if let Err(e) = self.child.kill().await {
            log::warn!("⚠️ Failed to kill game process: {}", e);
        }
    }
}

async fn spawn(path: &Path, args: &[String], settle: Duration) -> EngineResult<Child> {
    log::info!("🚀 Launching {:?} {:?}", path, args);
    let mut child = Command::new(path)
        .args(args)
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| EngineError::LaunchFailed {
            path: path.to_path_buf(),
            source,
        })?;

    if !settle.is_zero() {
        log::info!("⏳ Waiting {:?} for the game to start", settle);
        tokio::time::sleep(settle).await;
    }

    match child.try_wait() {
        Ok(Some(status)) => Err(EngineError::GameExited {
            path: path.to_path_buf(),
            status: status.to_string(),
        }),
        Ok(None) => {
            log::debug!("Game process running with pid {:?}", child.id());
            Ok(child)
        }
        Err(source) => Err(EngineError::LaunchFailed {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Shared handle on a launched game: the engine restarts it during stuck
/// recovery while the binary still stops it on exit.
#[derive(Clone)]
pub struct GameSupervisor {
    process: Arc<Mutex<GameProcess>>,
}

impl GameSupervisor {
    pub fn new(process: GameProcess) -> Self {
        Self {
            process: Arc::new(Mutex::new(process)),
        }
    }

    pub async fn id(&self) -> Option<u32> {
        self.process.lock().await.id()
    }

    pub async fn shutdown(&self) {
        self.process.lock().await.shutdown().await;
    }
}

impl GameControl for GameSupervisor {
    fn restart(&self) -> ControlFuture<'_> {
        Box::pin(async move { self.process.lock().await.restart().await })
    }
}
