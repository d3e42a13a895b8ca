//! Video-to-canvas coordinate transform.
//!
//! Boxes arrive in source-video pixels and are scaled onto the canvas:
//!
//! ```text
//! x0' = x0 * scale_x        w' = (x1 - x0) * scale_x
//! y0' = y0 * scale_y        h' = (y1 - y0) * scale_y
//! ```
//!
//! In full-screen mode the canvas is rotated by 90 degrees and a box is
//! drawn at `(canvas_h - y0' - h', x0', h', w')`.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::surface::Rect;

// ============================================================================
// Size
// ============================================================================

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    /// Width in pixels.
    pub width: f64,
    /// Height in pixels.
    pub height: f64,
}

impl Size {
    /// Creates a size.
    #[inline]
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Fails unless both dimensions are finite and positive.
    fn validate(self, what: &str) -> Result<Self> {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if valid(self.width) && valid(self.height) {
            Ok(self)
        } else {
            Err(Error::invalid_argument(format!(
                "{what} size must be positive, got {}x{}",
                self.width, self.height
            )))
        }
    }
}

// ============================================================================
// OverlayBox
// ============================================================================

/// One detection box in source-video pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlayBox {
    /// Detection id; `0` marks the primary subject.
    #[serde(default)]
    pub id: Option<i64>,
    /// Left edge.
    pub x0: f64,
    /// Top edge.
    pub y0: f64,
    /// Right edge.
    pub x1: f64,
    /// Bottom edge.
    pub y1: f64,
}

impl OverlayBox {
    /// Creates a box.
    #[must_use]
    pub const fn new(id: i64, x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            id: Some(id),
            x0,
            y0,
            x1,
            y1,
        }
    }

    /// Returns `true` for the primary subject.
    #[inline]
    #[must_use]
    pub fn is_primary(&self) -> bool {
        self.id == Some(0)
    }
}

// ============================================================================
// Transform
// ============================================================================

/// Scale and rotation state mapping video pixels to canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    video: Size,
    canvas: Size,
    scale_x: f64,
    scale_y: f64,
    full_screen: bool,
}

impl Transform {
    /// Creates a transform for the given video and canvas sizes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for zero, negative or non-finite
    /// dimensions.
    pub fn new(video: Size, canvas: Size) -> Result<Self> {
        let video = video.validate("video")?;
        let canvas = canvas.validate("canvas")?;
        Ok(Self {
            video,
            canvas,
            scale_x: canvas.width / video.width,
            scale_y: canvas.height / video.height,
            full_screen: false,
        })
    }

    /// Returns the source video size.
    #[inline]
    #[must_use]
    pub fn video(&self) -> Size {
        self.video
    }

    /// Returns the canvas size as last set.
    #[inline]
    #[must_use]
    pub fn canvas(&self) -> Size {
        self.canvas
    }

    /// Returns `(scale_x, scale_y)`.
    #[inline]
    #[must_use]
    pub fn scale(&self) -> (f64, f64) {
        (self.scale_x, self.scale_y)
    }

    /// Returns `true` in rotated full-screen mode.
    #[inline]
    #[must_use]
    pub fn is_full_screen(&self) -> bool {
        self.full_screen
    }

    /// Updates the source video size and rescales.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for invalid dimensions.
    pub fn set_video_size(&mut self, width: f64, height: f64) -> Result<()> {
        self.video = Size::new(width, height).validate("video")?;
        self.rescale();
        Ok(())
    }

    /// Updates the canvas size, rescales and leaves full-screen mode.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for invalid dimensions.
    pub fn set_canvas_size(&mut self, width: f64, height: f64) -> Result<()> {
        self.canvas = Size::new(width, height).validate("canvas")?;
        self.full_screen = false;
        self.rescale();
        Ok(())
    }

    /// Enters full-screen mode for a `width` x `height` screen.
    ///
    /// The canvas axes are swapped so boxes can be drawn rotated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for invalid dimensions.
    pub fn set_full_screen(&mut self, width: f64, height: f64) -> Result<()> {
        self.set_canvas_size(height, width)?;
        self.full_screen = true;
        Ok(())
    }

    /// Returns the region to erase before drawing.
    #[must_use]
    pub fn clear_region(&self) -> Rect {
        if self.full_screen {
            Rect::new(0.0, 0.0, self.canvas.height, self.canvas.width)
        } else {
            Rect::new(0.0, 0.0, self.canvas.width, self.canvas.height)
        }
    }

    /// Maps a video-space box to the rectangle to stroke.
    #[must_use]
    pub fn map_box(&self, b: &OverlayBox) -> Rect {
        let x0 = b.x0 * self.scale_x;
        let y0 = b.y0 * self.scale_y;
        let w = (b.x1 - b.x0) * self.scale_x;
        let h = (b.y1 - b.y0) * self.scale_y;

        if self.full_screen {
            Rect::new(self.canvas.height - y0 - h, x0, h, w)
        } else {
            Rect::new(x0, y0, w, h)
        }
    }

    fn rescale(&mut self) {
        self.scale_x = self.canvas.width / self.video.width;
        self.scale_y = self.canvas.height / self.video.height;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    const EPSILON: f64 = 1e-9;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < EPSILON
    }

    fn hd() -> Transform {
        Transform::new(Size::new(1280.0, 720.0), Size::new(1280.0, 720.0)).expect("transform")
    }

    #[test]
    fn test_half_size_canvas() {
        let mut transform = hd();
        transform.set_canvas_size(640.0, 360.0).expect("canvas");

        let rect = transform.map_box(&OverlayBox::new(0, 100.0, 100.0, 200.0, 200.0));
        assert_eq!(rect, Rect::new(50.0, 50.0, 50.0, 50.0));
    }

    #[test]
    fn test_full_screen_rotation() {
        let mut transform = hd();
        transform.set_full_screen(640.0, 360.0).expect("full screen");

        assert!(transform.is_full_screen());
        assert_eq!(transform.canvas(), Size::new(360.0, 640.0));

        let rect = transform.map_box(&OverlayBox::new(1, 100.0, 100.0, 200.0, 200.0));
        let h = 100.0 * 640.0 / 720.0;
        assert!(approx(rect.x, 640.0 - h - h));
        assert!(approx(rect.y, 28.125));
        assert!(approx(rect.width, h));
        assert!(approx(rect.height, 28.125));
    }

    #[test]
    fn test_canvas_resize_leaves_full_screen() {
        let mut transform = hd();
        transform.set_full_screen(640.0, 360.0).expect("full screen");
        transform.set_canvas_size(640.0, 360.0).expect("canvas");
        assert!(!transform.is_full_screen());
    }

    #[test]
    fn test_clear_region_swaps_axes_in_full_screen() {
        let mut transform = hd();
        assert_eq!(transform.clear_region(), Rect::new(0.0, 0.0, 1280.0, 720.0));

        transform.set_full_screen(640.0, 360.0).expect("full screen");
        assert_eq!(transform.clear_region(), Rect::new(0.0, 0.0, 640.0, 360.0));
    }

    #[test]
    fn test_video_size_rescales() {
        let mut transform = hd();
        transform.set_video_size(640.0, 360.0).expect("video");
        assert_eq!(transform.scale(), (2.0, 2.0));
    }

    #[test]
    fn test_rejects_zero_dimensions() {
        assert!(Transform::new(Size::new(0.0, 720.0), Size::new(1.0, 1.0)).is_err());

        let mut transform = hd();
        assert!(matches!(
            transform.set_video_size(1280.0, 0.0),
            Err(Error::InvalidArgument { .. })
        ));
        assert!(transform.set_canvas_size(f64::NAN, 10.0).is_err());
        assert!(transform.set_full_screen(-1.0, 10.0).is_err());
        assert_eq!(transform, hd());
    }

    #[test]
    fn test_box_without_id_is_not_primary() {
        let parsed: OverlayBox =
            serde_json::from_str(r#"{"x0":1,"y0":2,"x1":3,"y1":4}"#).expect("box");
        assert!(!parsed.is_primary());
        assert!(OverlayBox::new(0, 0.0, 0.0, 1.0, 1.0).is_primary());
    }

    proptest! {
        // A box spanning the whole video fills the canvas region exactly.
        #[test]
        fn prop_full_frame_box_fills_canvas(
            vw in 1.0f64..4096.0, vh in 1.0f64..4096.0,
            cw in 1.0f64..4096.0, ch in 1.0f64..4096.0,
            full_screen in any::<bool>(),
        ) {
            let mut transform = Transform::new(Size::new(vw, vh), Size::new(cw, ch)).expect("transform");
            if full_screen {
                transform.set_full_screen(cw, ch).expect("full screen");
            }

            let rect = transform.map_box(&OverlayBox::new(0, 0.0, 0.0, vw, vh));
            let region = transform.clear_region();
            let tolerance = 1e-6 * cw.max(ch);
            prop_assert!((rect.x - region.x).abs() < tolerance);
            prop_assert!((rect.y - region.y).abs() < tolerance);
            prop_assert!((rect.width - region.width).abs() < tolerance);
            prop_assert!((rect.height - region.height).abs() < tolerance);
        }

        // Boxes inside the video never leave the drawable region.
        #[test]
        fn prop_boxes_stay_inside_region(
            x0 in 0.0f64..1280.0, y0 in 0.0f64..720.0,
            dx in 0.0f64..1.0, dy in 0.0f64..1.0,
            full_screen in any::<bool>(),
        ) {
            let x1 = x0 + (1280.0 - x0) * dx;
            let y1 = y0 + (720.0 - y0) * dy;
            let mut transform = hd();
            if full_screen {
                transform.set_full_screen(640.0, 360.0).expect("full screen");
            } else {
                transform.set_canvas_size(640.0, 360.0).expect("canvas");
            }

            let rect = transform.map_box(&OverlayBox::new(1, x0, y0, x1, y1));
            let region = transform.clear_region();
            prop_assert!(rect.x >= -1e-9 && rect.y >= -1e-9);
            prop_assert!(rect.x + rect.width <= region.width + 1e-9);
            prop_assert!(rect.y + rect.height <= region.height + 1e-9);
        }
    }
}
