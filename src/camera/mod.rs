//! Camera control on top of the channel.
//!
//! | Module | Description |
//! |--------|-------------|
//! | `backend` | [`DeviceBackend`] interface for listing and selecting devices |
//! | `control` | [`CameraControl`] typed motion, mode and AI calls |

/// Device backend interface.
pub mod backend;

/// Camera control events.
pub mod control;

pub use backend::{CloseResult, DeviceBackend, DeviceSummary, LoginRequest, SessionDescriptor};
pub use control::{
    CameraControl, ControlResult, EVENT_AI, EVENT_HOME, EVENT_MODE, EVENT_MOVE, EVENT_STOP,
    EVENT_SYNC, ModeResult,
};
