use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the template catalog and matcher. All of them are
/// configuration problems; a template that is simply not on screen is a
/// `None` match, never an error.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("Template image not found: {path:?}")]
    TemplateMissing { path: PathBuf },

    #[error("Failed to load template {path:?}: {description}")]
    TemplateDecode { path: PathBuf, description: String },

    #[error("Template directory not found: {path:?}")]
    CategoryMissing { path: PathBuf },

    #[error("Failed to read template directory {path:?}: {source}")]
    CatalogRead {
        path: PathBuf,
        source: std::io::Error,
    },
}
