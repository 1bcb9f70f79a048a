//! Template catalog and match types

use super::error::MatchError;
use std::path::{Path, PathBuf};

const MENU_LOGO: &str = "gui/logo.png";
const NAME_ENTRY: &str = "gui/name_entry.png";
const STARTUP_DIR: &str = "gui/startup";
const SPLASH_TITLE: &str = "gofish/title.png";
const DECK: &str = "gofish/deck.png";
const TEXT_DIR: &str = "gofish/text";
const CARDS_DIR: &str = "gofish/cards";

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateCategory {
    MenuLogo,
    NameEntry,
    Startup,
    SplashTitle,
    Deck,
    Text,
    Card,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub path: PathBuf,
    /// File stem; the card label for cards, the routing token for text markers.
    pub label: String,
    pub category: TemplateCategory,
}

impl Template {
    pub fn new(path: PathBuf, category: TemplateCategory) -> Self {
        let label = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();
        Self {
            path,
            label,
            category,
        }
    }
}

/// A located template. `x`/`y` is the template's center, relative to the
/// captured window region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemplateMatch {
    pub x: i32,
    pub y: i32,
    pub confidence: f32,
}

impl TemplateMatch {
    pub fn new(x: i32, y: i32, confidence: f32) -> Self {
        Self { x, y, confidence }
    }

    /// Build a match from the top-left corner of a `width`x`height` hit.
    pub fn centered(left: u32, top: u32, width: u32, height: u32, confidence: f32) -> Self {
        Self {
            x: (left + width / 2) as i32,
            y: (top + height / 2) as i32,
            confidence,
        }
    }
}

/// Read-only view of the on-disk template tree.
///
/// Directory categories are listed again on every call so a new card or text
/// marker only needs its image dropped in place. Listings are sorted by file
/// name, which fixes the scan order.
#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    root: PathBuf,
}

impl TemplateCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Open a catalog, failing if the root directory is missing.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, MatchError> {
        let catalog = Self::new(root);
        if !catalog.root.is_dir() {
            return Err(MatchError::CategoryMissing {
                path: catalog.root.clone(),
            });
        }
        Ok(catalog)
    }

    pub fn menu_logo(&self) -> Template {
        self.fixed(MENU_LOGO, TemplateCategory::MenuLogo)
    }

    pub fn name_entry(&self) -> Template {
        self.fixed(NAME_ENTRY, TemplateCategory::NameEntry)
    }

    pub fn splash_title(&self) -> Template {
        self.fixed(SPLASH_TITLE, TemplateCategory::SplashTitle)
    }

    pub fn deck(&self) -> Template {
        self.fixed(DECK, TemplateCategory::Deck)
    }

    /// Startup markers (`icon*`, `splash*`). The directory is optional.
    pub fn startup_markers(&self) -> Result<Vec<Template>, MatchError> {
        let dir = self.root.join(STARTUP_DIR);
        if !dir.is_dir() {
            log::trace!("No startup markers at {:?}", dir);
            return Ok(Vec::new());
        }
        self.list(STARTUP_DIR, TemplateCategory::Startup)
    }

    /// Routing text markers, sorted by file name.
    pub fn text_markers(&self) -> Result<Vec<Template>, MatchError> {
        self.list(TEXT_DIR, TemplateCategory::Text)
    }

    /// One template per card, sorted by file name.
    pub fn cards(&self) -> Result<Vec<Template>, MatchError> {
        self.list(CARDS_DIR, TemplateCategory::Card)
    }

    /// Check every required file and directory up front.
    pub fn validate(&self) -> Result<(usize, usize), MatchError> {
        for template in [
            self.menu_logo(),
            self.name_entry(),
            self.splash_title(),
            self.deck(),
        ] {
            if !template.path.is_file() {
                return Err(MatchError::TemplateMissing {
                    path: template.path,
                });
            }
        }
        let texts = self.text_markers()?.len();
        let cards = self.cards()?.len();
        log::info!(
            "🗂️ Template catalog {:?}: {} text markers, {} cards",
            self.root,
            texts,
            cards
        );
        Ok((texts, cards))
    }

    fn fixed(&self, relative: &str, category: TemplateCategory) -> Template {
        Template::new(self.root.join(relative), category)
    }

    fn list(
        &self,
        relative: &str,
        category: TemplateCategory,
    ) -> Result<Vec<Template>, MatchError> {
        let dir = self.root.join(relative);
        if !dir.is_dir() {
            return Err(MatchError::CategoryMissing { path: dir });
        }

        let entries = std::fs::read_dir(&dir).map_err(|source| MatchError::CatalogRead {
            path: dir.clone(),
            source,
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| MatchError::CatalogRead {
                path: dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.is_file() && has_image_extension(&path) {
                paths.push(path);
            }
        }
        paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        Ok(paths
            .into_iter()
            .map(|path| Template::new(path, category))
            .collect())
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.as_str()))
}
