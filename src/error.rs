//! Error types for the media channel.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use media_channel::{Connection, Result};
//!
//! async fn example(connection: &Connection) -> Result<()> {
//!     let reply = connection.call("camera-home", vec![]).await?;
//!     println!("{:?}", reply.args());
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants | Effect on the connection |
//! |----------|----------|--------------------------|
//! | Argument | [`Error::Config`], [`Error::InvalidArgument`], [`Error::InvalidState`] | None, returned at the call site |
//! | Framing | [`Error::Decode`] | Fatal, routed through `error()` |
//! | Protocol | [`Error::Protocol`] | Message dropped, connection stays open |
//! | Connection | [`Error::Connection`], [`Error::HandshakeTimeout`], [`Error::ConnectionClosed`] | Fatal |
//! | Calls | [`Error::RequestTimeout`] | The single call is abandoned |
//! | Overlay | [`Error::InvalidData`] | Payload ignored |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`] | Depends on caller |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::client::ConnectionState;
use crate::identifiers::EventId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Argument Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when connection or overlay configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Invalid argument passed to an operation.
    ///
    /// Never coerced: the call fails before anything is sent.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    /// Operation not permitted in the current lifecycle state.
    #[error("Invalid state for {operation}: connection is {state}")]
    InvalidState {
        /// Operation that was attempted.
        operation: &'static str,
        /// State the connection was in.
        state: ConnectionState,
    },

    // ========================================================================
    // Framing & Protocol Errors
    // ========================================================================
    /// A frame could not be parsed as JSON.
    ///
    /// Framing corruption invalidates the whole channel.
    #[error("Decode error: {message}")]
    Decode {
        /// Parser error description.
        message: String,
    },

    /// Protocol violation on a single message.
    ///
    /// Returned when an envelope is well-formed JSON but not a valid message.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Transport connection failed.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Handshake did not complete before the open timeout.
    #[error("Open channel timeout after {timeout_ms}ms")]
    HandshakeTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Connection closed before the operation could complete.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Call did not receive its reply in time.
    #[error("Call {event_id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// Correlation id of the abandoned call.
        event_id: EventId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Overlay Errors
    // ========================================================================
    /// Overlay payload was not understood.
    #[error("Invalid overlay data: {message}")]
    InvalidData {
        /// Description of the problem.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates an invalid state error.
    #[inline]
    pub fn invalid_state(operation: &'static str, state: ConnectionState) -> Self {
        Self::InvalidState { operation, state }
    }

    /// Creates a decode error.
    #[inline]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a handshake timeout error.
    #[inline]
    pub fn handshake_timeout(timeout_ms: u64) -> Self {
        Self::HandshakeTimeout { timeout_ms }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(event_id: EventId, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            event_id,
            timeout_ms,
        }
    }

    /// Creates an invalid overlay data error.
    #[inline]
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::HandshakeTimeout { .. } | Self::RequestTimeout { .. }
        )
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::HandshakeTimeout { .. }
                | Self::ConnectionClosed
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this error invalidates the whole channel.
    ///
    /// Fatal errors go through `Connection::error`, which closes the
    /// connection. Everything else stays local to one message or call.
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Decode { .. }
                | Self::Connection { .. }
                | Self::HandshakeTimeout { .. }
                | Self::WebSocket(_)
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
