//! Detection overlay.
//!
//! Scales boxes reported in source-video pixels onto a drawing surface,
//! optionally rotated for full-screen playback.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `transform` | [`Transform`] video-to-canvas math |
//! | `surface` | [`Surface`] trait and [`DisplayList`] |
//! | `raster` | [`RasterSurface`] drawing into an RGBA image |
//! | `renderer` | [`OverlayRenderer`] fed by `data` events |

// ============================================================================
// Submodules
// ============================================================================

/// RGBA image surface.
pub mod raster;

/// Connection-driven renderer.
pub mod renderer;

/// Surface abstraction.
pub mod surface;

/// Coordinate transform.
pub mod transform;

// ============================================================================
// Re-exports
// ============================================================================

pub use raster::RasterSurface;
pub use renderer::{DATA_TYPE_FACE, DATA_TYPE_MEDIA, OverlayConfig, OverlayRenderer};
pub use surface::{Color, DisplayList, DrawOp, Rect, Surface};
pub use transform::{OverlayBox, Size, Transform};
