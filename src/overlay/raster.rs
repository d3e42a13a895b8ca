//! Raster surface backed by an RGBA image.
//!
//! Burns overlays into still frames, e.g. snapshots saved next to a
//! recording.

use std::path::Path;

use image::{Rgba, RgbaImage};

use crate::error::{Error, Result};

use super::surface::{Color, Rect, Surface};

/// Default stroke width in pixels.
const DEFAULT_LINE_WIDTH: u32 = 2;

/// [`Surface`] drawing into an [`RgbaImage`].
///
/// Coordinates are rounded to whole pixels and clipped to the image.
#[derive(Debug, Clone)]
pub struct RasterSurface {
    image: RgbaImage,
    line_width: u32,
}

impl RasterSurface {
    /// Creates a transparent surface.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self::from_image(RgbaImage::new(width, height))
    }

    /// Draws on top of an existing frame.
    #[must_use]
    pub fn from_image(image: RgbaImage) -> Self {
        Self {
            image,
            line_width: DEFAULT_LINE_WIDTH,
        }
    }

    /// Sets the stroke width (at least one pixel).
    #[must_use]
    pub fn with_line_width(mut self, line_width: u32) -> Self {
        self.line_width = line_width.max(1);
        self
    }

    /// Returns the image.
    #[inline]
    #[must_use]
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Consumes the surface, returning the image.
    #[inline]
    #[must_use]
    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// Writes the image as PNG.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if encoding or writing fails.
    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        self.image
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(|e| Error::Io(std::io::Error::other(e)))
    }

    /// Converts a rectangle to clipped pixel bounds `[x0, x1) x [y0, y1)`.
    fn pixel_bounds(&self, rect: Rect) -> Option<(u32, u32, u32, u32)> {
        let (width, height) = self.image.dimensions();
        let clip = |v: f64, max: u32| v.round().clamp(0.0, f64::from(max)) as u32;

        let (left, right) = if rect.width >= 0.0 {
            (rect.x, rect.x + rect.width)
        } else {
            (rect.x + rect.width, rect.x)
        };
        let (top, bottom) = if rect.height >= 0.0 {
            (rect.y, rect.y + rect.height)
        } else {
            (rect.y + rect.height, rect.y)
        };

        let x0 = clip(left, width);
        let x1 = clip(right, width);
        let y0 = clip(top, height);
        let y1 = clip(bottom, height);
        (x0 < x1 && y0 < y1).then_some((x0, x1, y0, y1))
    }

    fn fill(&mut self, x0: u32, x1: u32, y0: u32, y1: u32, pixel: Rgba<u8>) {
        for y in y0..y1 {
            for x in x0..x1 {
                self.image.put_pixel(x, y, pixel);
            }
        }
    }
}

impl Surface for RasterSurface {
    fn clear_rect(&mut self, rect: Rect) {
        if let Some((x0, x1, y0, y1)) = self.pixel_bounds(rect) {
            self.fill(x0, x1, y0, y1, Rgba([0, 0, 0, 0]));
        }
    }

    fn stroke_rect(&mut self, rect: Rect, color: Color) {
        let Some((x0, x1, y0, y1)) = self.pixel_bounds(rect) else {
            return;
        };
        let pixel = Rgba(color.to_rgba());
        let line = self.line_width;

        self.fill(x0, x1, y0, (y0 + line).min(y1), pixel);
        self.fill(x0, x1, y1.saturating_sub(line).max(y0), y1, pixel);
        self.fill(x0, (x0 + line).min(x1), y0, y1, pixel);
        self.fill(x1.saturating_sub(line).max(x0), x1, y0, y1, pixel);
    }
}
