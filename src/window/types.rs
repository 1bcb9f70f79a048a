// Core window types and the accessor trait
use super::error::WindowResult;
use image::{GrayImage, RgbaImage, imageops};
use std::fmt;
use std::sync::Arc;

/// On-screen position and size of the game window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowGeometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl WindowGeometry {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Translate a window-relative point into absolute screen coordinates.
    pub fn to_screen(&self, rel_x: i32, rel_y: i32) -> (i32, i32) {
        (self.x + rel_x, self.y + rel_y)
    }
}

/// An immutable capture of the window at one instant.
///
/// Only the single-channel copy the matcher works on is kept, so a frame
/// handed from one handler to the next is never converted twice. Cloning only
/// bumps a reference count.
#[derive(Clone)]
pub struct Frame {
    inner: Arc<FrameData>,
}

struct FrameData {
    luma: GrayImage,
    geometry: WindowGeometry,
}

impl Frame {
    pub fn new(rgba: RgbaImage, geometry: WindowGeometry) -> Self {
        let luma = imageops::grayscale(&rgba);
        Self {
            inner: Arc::new(FrameData { luma, geometry }),
        }
    }

    /// Build a frame from a raw RGBA buffer; `None` if the length does not fit.
    pub fn from_raw(
        width: u32,
        height: u32,
        raw: Vec<u8>,
        geometry: WindowGeometry,
    ) -> Option<Self> {
        RgbaImage::from_raw(width, height, raw).map(|rgba| Self::new(rgba, geometry))
    }

    /// A black frame covering `geometry`.
    pub fn blank(geometry: WindowGeometry) -> Self {
        Self::new(RgbaImage::new(geometry.width, geometry.height), geometry)
    }

    pub fn luma(&self) -> &GrayImage {
        &self.inner.luma
    }

    pub fn width(&self) -> u32 {
        self.inner.luma.width()
    }

    pub fn height(&self) -> u32 {
        self.inner.luma.height()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("captured_from", &self.inner.geometry)
            .finish()
    }
}

// Trait defining window capabilities. Implementations must not cache
// geometry between calls.
pub trait WindowAccessor: Send + Sync {
    /// Title the accessor was resolved with.
    fn title(&self) -> &str;

    /// Current position and size of the window.
    fn geometry(&self) -> WindowResult<WindowGeometry>;

    /// Capture exactly the window region.
    fn capture(&self) -> WindowResult<Frame>;
}
