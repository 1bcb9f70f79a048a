//! Similarity thresholds for template matching

use super::template::TemplateCategory;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Threshold for UI markers, cards and the deck (0.0 to 1.0)
    pub confidence_threshold: f32,
    /// Stricter threshold for the dense text banners
    pub text_threshold: f32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.70,
            text_threshold: 0.90,
        }
    }
}

impl MatchConfig {
    /// Threshold to apply when matching a template of `category`.
    pub fn threshold_for(&self, category: TemplateCategory) -> f32 {
        match category {
            TemplateCategory::Text => self.text_threshold,
            _ => self.confidence_threshold,
        }
    }
}
