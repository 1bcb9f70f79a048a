//! Window lookup and capture through `xcap`.
//!
//! Supports X11, Wayland, Windows and macOS. Nothing about the window is
//! cached: every geometry query and capture enumerates windows again.

use super::error::{WindowError, WindowResult};
use super::types::{Frame, WindowAccessor, WindowGeometry};

/// Accessor for a window identified by its title.
#[derive(Debug, Clone)]
pub struct XcapWindow {
    title: String,
}

impl XcapWindow {
    /// Resolve `title` once, failing with `NotFound` if no window matches.
    pub fn resolve(title: &str) -> WindowResult<Self> {
        let accessor = Self {
            title: title.to_string(),
        };
        match accessor.find() {
            Ok(window) => {
                let geometry = read_geometry(&window, title)?;
                log::info!(
                    "🪟 Found window \"{}\" at ({}, {}) {}x{}",
                    window.title().unwrap_or_default(),
                    geometry.x,
                    geometry.y,
                    geometry.width,
                    geometry.height
                );
                Ok(accessor)
            }
            Err(WindowError::Lost { title }) => Err(WindowError::NotFound { title }),
            Err(e) => Err(e),
        }
    }

    /// Titles of all visible windows, logged when the configured title matches none.
    pub fn list_titles() -> WindowResult<Vec<String>> {
        let windows = xcap::Window::all().map_err(|e| WindowError::EnumerationFailed {
            description: e.to_string(),
        })?;
        Ok(windows
            .iter()
            .filter_map(|w| w.title().ok())
            .filter(|t| !t.is_empty())
            .collect())
    }

    fn find(&self) -> WindowResult<xcap::Window> {
        let windows = xcap::Window::all().map_err(|e| WindowError::EnumerationFailed {
            description: e.to_string(),
        })?;
        let titles: Vec<String> = windows
            .iter()
            .map(|w| w.title().unwrap_or_default())
            .collect();

        pick_title(&titles, &self.title)
            .and_then(|idx| windows.into_iter().nth(idx))
            .ok_or_else(|| WindowError::Lost {
                title: self.title.clone(),
            })
    }
}

impl WindowAccessor for XcapWindow {
    fn title(&self) -> &str {
        &self.title
    }

    fn geometry(&self) -> WindowResult<WindowGeometry> {
        let window = self.find()?;
        read_geometry(&window, &self.title)
    }

    fn capture(&self) -> WindowResult<Frame> {
        let window = self.find()?;
        let geometry = read_geometry(&window, &self.title)?;
        let image = window
            .capture_image()
            .map_err(|e| WindowError::CaptureFailed {
                title: self.title.clone(),
                description: e.to_string(),
            })?;

        let (width, height) = (image.width(), image.height());
        let raw = image.into_raw();
        let len = raw.len();
        log::trace!("📸 Captured {}x{} from \"{}\"", width, height, self.title);

        Frame::from_raw(width, height, raw, geometry).ok_or_else(|| WindowError::InvalidBuffer {
            title: self.title.clone(),
            width,
            height,
            len,
        })
    }
}

fn read_geometry(window: &xcap::Window, title: &str) -> WindowResult<WindowGeometry> {
    let lost = |e: xcap::XCapError| {
        log::debug!("Window \"{}\" geometry unavailable: {}", title, e);
        WindowError::Lost {
            title: title.to_string(),
        }
    };
    Ok(WindowGeometry::new(
        window.x().map_err(lost)?,
        window.y().map_err(lost)?,
        window.width().map_err(lost)?,
        window.height().map_err(lost)?,
    ))
}

/// Index of the window whose title best matches `wanted`.
///
/// A case-insensitive exact match wins over a substring match; among equals
/// the first in enumeration order is taken.
pub(crate) fn pick_title(titles: &[String], wanted: &str) -> Option<usize> {
    let needle = wanted.to_lowercase();
    if needle.is_empty() {
        return None;
    }
    titles
        .iter()
        .position(|t| t.to_lowercase() == needle)
        .or_else(|| titles.iter().position(|t| t.to_lowercase().contains(&needle)))
}
