//! Image matching module for the Go Fish automation
//!
//! This module provides the template catalog (labeled reference images on
//! disk), the visual matcher that locates them in a captured frame, and the
//! similarity thresholds used per template category.

pub mod config;
pub mod detector;
pub mod error;
pub mod template;


// Re-export main types and functions
pub use config::MatchConfig;
pub use detector::{
    TemplateMatcher, VisualMatcher, correlation_coefficient, first_at_or_above,
};
pub use error::MatchError;
pub use template::{Template, TemplateCatalog, TemplateCategory, TemplateMatch};
