//! Template matching against captured frames

use super::error::MatchError;
use super::template::{Template, TemplateMatch};
use crate::window::Frame;
use image::{GrayImage, ImageBuffer, Luma};
use imageproc::integral_image::{integral_image, integral_squared_image, sum_image_pixels};
use imageproc::template_matching::{MatchTemplateMethod, match_template};
use std::path::Path;

/// Locates a reference image inside a frame.
pub trait VisualMatcher: Send + Sync {
    /// First location (row-major scan order) whose similarity is at least
    /// `threshold`, or `None`.
    fn locate(
        &self,
        template: &Template,
        frame: &Frame,
        threshold: f32,
    ) -> Result<Option<TemplateMatch>, MatchError>;
}

/// Correlation-coefficient matcher. Templates are read from disk on every
/// call, so edits to the catalog apply on the next tick.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateMatcher;

impl TemplateMatcher {
    pub fn new() -> Self {
        Self
    }

    fn load_template(path: &Path) -> Result<GrayImage, MatchError> {
        if !path.is_file() {
            return Err(MatchError::TemplateMissing {
                path: path.to_path_buf(),
            });
        }
        let image = image::open(path).map_err(|e| MatchError::TemplateDecode {
            path: path.to_path_buf(),
            description: e.to_string(),
        })?;
        Ok(image.to_luma8())
    }
}

impl VisualMatcher for TemplateMatcher {
    fn locate(
        &self,
        template: &Template,
        frame: &Frame,
        threshold: f32,
    ) -> Result<Option<TemplateMatch>, MatchError> {
        let template_gray = Self::load_template(&template.path)?;
        let (width, height) = template_gray.dimensions();

        if width == 0 || height == 0 || width > frame.width() || height > frame.height() {
            log::debug!(
                "⚠️ Skipping template '{}' - {}x{} does not fit in {}x{} frame",
                template.label,
                width,
                height,
                frame.width(),
                frame.height()
            );
            return Ok(None);
        }

        let surface = correlation_coefficient(frame.luma(), &template_gray);

        let found = first_at_or_above(&surface, threshold)
            .map(|(x, y, score)| TemplateMatch::centered(x, y, width, height, score));

        log::trace!(
            "🔍 '{}' at threshold {:.2}: {:?}",
            template.label,
            threshold,
            found
        );
        Ok(found)
    }
}

/// Zero-mean normalized cross-correlation of `template` at every position of
/// `image`, in `[-1, 1]`.
///
/// Window sums come from integral images, so only the raw cross-correlation
/// is computed per position. A flat window or a flat template scores 0.
pub fn correlation_coefficient(
    image: &GrayImage,
    template: &GrayImage,
) -> ImageBuffer<Luma<f32>, Vec<f32>> {
    let (tw, th) = template.dimensions();
    let n = f64::from(tw) * f64::from(th);

    let cross = match_template(image, template, MatchTemplateMethod::CrossCorrelation);
    let sums = integral_image::<_, u64>(image);
    let squares = integral_squared_image::<_, u64>(image);

    let (t_sum, t_squares) = template.pixels().fold((0.0f64, 0.0f64), |(sum, sq), p| {
        let v = f64::from(p[0]);
        (sum + v, sq + v * v)
    });
    let t_var = t_squares - t_sum * t_sum / n;

    ImageBuffer::from_fn(cross.width(), cross.height(), |x, y| {
        let (right, bottom) = (x + tw - 1, y + th - 1);
        let i_sum = sum_image_pixels(&sums, x, y, right, bottom)[0] as f64;
        let i_squares = sum_image_pixels(&squares, x, y, right, bottom)[0] as f64;
        let i_var = i_squares - i_sum * i_sum / n;

        // Integer pixels: any real variation is at least (n - 1) / n.
        if i_var < 0.5 || t_var < 0.5 {
            return Luma([0.0]);
        }
        let numerator = f64::from(cross.get_pixel(x, y)[0]) - i_sum * t_sum / n;
        let score = numerator / (i_var * t_var).sqrt();
        Luma([score.clamp(-1.0, 1.0) as f32])
    })
}

/// First point of a correlation surface, in row-major order, whose score is
/// `>= threshold`. A score equal to the threshold counts; NaN never does.
pub fn first_at_or_above(
    surface: &ImageBuffer<Luma<f32>, Vec<f32>>,
    threshold: f32,
) -> Option<(u32, u32, f32)> {
    surface
        .enumerate_pixels()
        .find(|(_, _, score)| score[0] >= threshold)
        .map(|(x, y, score)| (x, y, score[0]))
}
