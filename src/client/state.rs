//! Connection lifecycle states.

use std::fmt;

/// Lifecycle state of a [`Connection`](super::Connection).
///
/// ```text
/// Idle ──open()──► Connecting ──handshake──► Open
///   │                  │                       │
///   └──────────────────┴──── close()/error() ──┴──► Closing ──► Closed
/// ```
///
/// `Closed` is terminal. A connection closed by `error()` keeps the
/// triggering error, see [`Connection::last_error`](super::Connection::last_error).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Created, `open()` not called yet.
    Idle,
    /// Transport connecting or waiting for the handshake.
    Connecting,
    /// Handshake completed.
    Open,
    /// Close requested, transport shutting down.
    Closing,
    /// Terminal.
    Closed,
}

impl ConnectionState {
    /// Returns `true` once `close()` has been requested.
    #[inline]
    #[must_use]
    pub const fn is_closing(self) -> bool {
        matches!(self, Self::Closing | Self::Closed)
    }

    /// Returns `true` while outbound messages are accepted.
    #[inline]
    #[must_use]
    pub const fn can_send(self) -> bool {
        matches!(self, Self::Connecting | Self::Open)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
        })
    }
}
