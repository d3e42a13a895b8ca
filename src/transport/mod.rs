//! Transport layer.
//!
//! A [`Connection`](crate::Connection) never opens sockets itself. It is
//! given a [`Connector`] at build time and asks it for one
//! [`FrameSink`]/[`FrameStream`] pair when `open()` runs.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   connect(url)   ┌──────────────────────┐
//! │  Connection task │ ───────────────► │  Connector           │
//! │                  │ ◄─────────────── │  (WebSocket, Memory) │
//! │  sink / stream   │  text frames     └──────────────────────┘
//! └──────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `websocket` | tokio-tungstenite client connector |
//! | `memory` | In-process connector with a scriptable peer |

// ============================================================================
// Submodules
// ============================================================================

/// In-process transport.
pub mod memory;

/// WebSocket client transport.
pub mod websocket;

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;

use crate::error::Result;

// ============================================================================
// Re-exports
// ============================================================================

pub use memory::{MemoryConnector, MemoryPeer, PeerEvent};
pub use websocket::WebSocketConnector;

// ============================================================================
// Traits
// ============================================================================

/// Sink and stream halves of one transport connection.
pub type TransportPair = (Box<dyn FrameSink>, Box<dyn FrameStream>);

/// Opens transport connections.
///
/// Selected once when the connection is configured.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connects to `url` and returns the two halves of the socket.
    async fn connect(&self, url: &str) -> Result<TransportPair>;
}

/// Outbound half of a transport connection.
#[async_trait]
pub trait FrameSink: Send {
    /// Sends one text frame.
    async fn send_text(&mut self, text: String) -> Result<()>;

    /// Requests an orderly close.
    async fn close(&mut self) -> Result<()>;
}

/// Inbound half of a transport connection.
#[async_trait]
pub trait FrameStream: Send {
    /// Waits for the next text frame.
    ///
    /// Returns `None` once the peer closed the connection. Must be cancel
    /// safe: dropping the future loses no frame.
    async fn next_frame(&mut self) -> Option<Result<String>>;
}
