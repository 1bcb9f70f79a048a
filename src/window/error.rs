use thiserror::Error;

/// A specialized `Result` type for window operations.
pub type WindowResult<T> = Result<T, WindowError>;

/// The error type for window lookup and capture.
#[derive(Debug, Error)]
pub enum WindowError {
    #[error("No window found matching title \"{title}\"")]
    NotFound { title: String },

    #[error("Window \"{title}\" is no longer available")]
    Lost { title: String },

    #[error("Failed to enumerate windows: {description}")]
    EnumerationFailed { description: String },

    #[error("Failed to capture window \"{title}\": {description}")]
    CaptureFailed { title: String, description: String },

    #[error("Capture of \"{title}\" returned a {len}-byte buffer for {width}x{height}")]
    InvalidBuffer {
        title: String,
        width: u32,
        height: u32,
        len: usize,
    },
}

impl WindowError {
    /// Mid-run failures the engine may retry on the next tick.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            WindowError::Lost { .. } | WindowError::CaptureFailed { .. }
        )
    }

    /// Name of the window involved, if the error carries one.
    pub fn title(&self) -> Option<&str> {
        match self {
            WindowError::NotFound { title }
            | WindowError::Lost { title }
            | WindowError::CaptureFailed { title, .. }
            | WindowError::InvalidBuffer { title, .. } => Some(title),
            WindowError::EnumerationFailed { .. } => None,
        }
    }
}
