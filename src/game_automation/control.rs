// Control over the game process itself, for recovery that input alone cannot do.
use super::error::EngineResult;
use std::future::Future;
use std::pin::Pin;

pub type ControlFuture<'a> = Pin<Box<dyn Future<Output = EngineResult<()>> + Send + 'a>>;

pub trait GameControl: Send + Sync {
    /// Terminate the running game and bring up a fresh instance. Resolves once
    /// the new instance had its settle time.
    fn restart(&self) -> ControlFuture<'_>;
}
