//! Drawing surfaces.
//!
//! The renderer only ever clears a rectangle or strokes one, so a surface
//! implements just those two operations.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// Geometry & Color
// ============================================================================

/// Axis-aligned rectangle in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

impl Rect {
    /// Creates a rectangle.
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// RGBA stroke color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    /// Red.
    pub r: u8,
    /// Green.
    pub g: u8,
    /// Blue.
    pub b: u8,
    /// Alpha.
    pub a: u8,
}

impl Color {
    /// Primary subject (`#00FF00`).
    pub const GREEN: Self = Self::rgb(0x00, 0xFF, 0x00);

    /// Any other detection (`#FF0000`).
    pub const RED: Self = Self::rgb(0xFF, 0x00, 0x00);

    /// Creates an opaque color.
    #[inline]
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xFF }
    }

    /// Returns the color as an RGBA array.
    #[inline]
    #[must_use]
    pub const fn to_rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

// ============================================================================
// Surface
// ============================================================================

/// Target the overlay renderer draws on.
pub trait Surface: Send {
    /// Erases `rect`.
    fn clear_rect(&mut self, rect: Rect);

    /// Strokes the outline of `rect`.
    fn stroke_rect(&mut self, rect: Rect, color: Color);
}

// ============================================================================
// DisplayList
// ============================================================================

/// One recorded drawing operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawOp {
    /// `clear_rect`.
    Clear(Rect),
    /// `stroke_rect`.
    Stroke(Rect, Color),
}

/// Surface that records operations instead of rasterizing them.
///
/// Useful for forwarding overlays to another renderer, and in tests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayList {
    ops: Vec<DrawOp>,
}

impl DisplayList {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded operations.
    #[inline]
    #[must_use]
    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    /// Returns the strokes issued since the last clear.
    #[must_use]
    pub fn current_strokes(&self) -> Vec<(Rect, Color)> {
        let start = self
            .ops
            .iter()
            .rposition(|op| matches!(op, DrawOp::Clear(_)))
            .map_or(0, |i| i + 1);
        self.ops[start..]
            .iter()
            .filter_map(|op| match op {
                DrawOp::Stroke(rect, color) => Some((*rect, *color)),
                DrawOp::Clear(_) => None,
            })
            .collect()
    }

    /// Removes and returns the recorded operations.
    pub fn take(&mut self) -> Vec<DrawOp> {
        std::mem::take(&mut self.ops)
    }
}

impl Surface for DisplayList {
    fn clear_rect(&mut self, rect: Rect) {
        self.ops.push(DrawOp::Clear(rect));
    }

    fn stroke_rect(&mut self, rect: Rect, color: Color) {
        self.ops.push(DrawOp::Stroke(rect, color));
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_hex() {
        assert_eq!(Color::GREEN.to_string(), "#00FF00");
        assert_eq!(Color::RED.to_string(), "#FF0000");
    }

    #[test]
    fn test_current_strokes_after_last_clear() {
        let mut list = DisplayList::new();
        let a = Rect::new(0.0, 0.0, 1.0, 1.0);
        let b = Rect::new(2.0, 2.0, 1.0, 1.0);

        list.stroke_rect(a, Color::RED);
        list.clear_rect(Rect::new(0.0, 0.0, 10.0, 10.0));
        list.stroke_rect(b, Color::GREEN);

        assert_eq!(list.current_strokes(), vec![(b, Color::GREEN)]);
        assert_eq!(list.take().len(), 3);
        assert!(list.ops().is_empty());
    }
}
