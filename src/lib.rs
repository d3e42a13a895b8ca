//! Media Channel - Bidirectional control channel for live media endpoints.
//!
//! This library connects to a media endpoint over WebSocket, negotiates a
//! playback session and exchanges named events with it. Detection results
//! pushed over the channel can be drawn as an overlay.
//!
//! # Architecture
//!
//! - **Connection**: owns one socket and one event loop task, drives the
//!   `Idle → Connecting → Open → Closing → Closed` lifecycle
//! - **Protocol**: JSON envelopes of kind SEND, CALL or REPLY; calls are
//!   correlated with replies by a per-connection `eventId`
//! - **Overlay**: scales boxes from video to canvas pixels, with a rotated
//!   full-screen mode
//!
//! # Quick Start
//!
//! ```no_run
//! use media_channel::{CameraControl, Connection, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let connection = Connection::builder()
//!         .origin("ws://192.168.1.20:7000")
//!         .path("/live/cam-1")
//!         .build()?;
//!
//!     connection.on("shakeHandle", |event| {
//!         println!("playback path: {:?}", event.path());
//!     });
//!
//!     connection.open(None)?;
//!     connection.opened().await?;
//!
//!     let camera = CameraControl::new(connection.clone());
//!     let moved = camera.move_by(10.0, 0.0).await;
//!     println!("moved: {} ({})", moved.result, moved.msg);
//!
//!     connection.close();
//!     connection.closed().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`bus`] | Named-event listener registry |
//! | [`camera`] | Camera control events and device backend interface |
//! | [`client`] | [`Connection`], its builder and options |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`overlay`] | Detection overlay transform and surfaces |
//! | [`protocol`] | Envelope, codec and call correlation |
//! | [`transport`] | WebSocket and in-memory transports |

// ============================================================================
// Modules
// ============================================================================

/// Event bus.
///
/// Listener registry keyed by event name, shared by a connection and all
/// of its clones.
pub mod bus;

/// Camera control.
pub mod camera;

/// Channel client.
///
/// Use [`Connection::builder()`] to create a connection.
pub mod client;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
///
/// Newtype wrappers keep event ids, listener ids and session ids apart.
pub mod identifiers;

/// Detection overlay.
pub mod overlay;

/// Wire protocol.
///
/// Envelope, JSON codec and correlation table.
pub mod protocol;

/// Transport layer.
///
/// [`Connector`](transport::Connector) implementations for WebSocket and
/// in-process sockets.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Bus types
pub use bus::EventBus;

// Camera types
pub use camera::{
    CameraControl, CloseResult, ControlResult, DeviceBackend, DeviceSummary, LoginRequest,
    ModeResult, SessionDescriptor,
};

// Client types
pub use client::{
    Connection, ConnectionBuilder, ConnectionOptions, ConnectionState, Credentials, Event, Reply,
    ReplyToken, Session,
};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{EventId, ListenerId, SessionId};

// Overlay types
pub use overlay::{
    Color, DisplayList, OverlayBox, OverlayConfig, OverlayRenderer, RasterSurface, Rect, Size,
    Surface, Transform,
};

// Protocol types
pub use protocol::{Envelope, MessageType};

// Transport types
pub use transport::{Connector, MemoryConnector, MemoryPeer, WebSocketConnector};
