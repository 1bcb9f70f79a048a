use thiserror::Error;

/// A specialized `Result` type for input synthesis.
pub type InputResult<T> = Result<T, InputError>;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("Failed to initialize input backend: {description}")]
    BackendInit { description: String },

    #[error("Failed to send {command}: {description}")]
    Synthesis {
        command: String,
        description: String,
    },

    #[error("Input worker thread has stopped")]
    WorkerStopped,
}
