//! Wire protocol.
//!
//! This module defines the message envelope exchanged with the media
//! endpoint, its JSON codec, and the table correlating calls with replies.
//!
//! # Protocol Overview
//!
//! | Type | Code | `eventId` | Purpose |
//! |------|------|-----------|---------|
//! | `SEND` | 1 | never | Fire-and-forget notification |
//! | `CALL` | 2 | always | Request expecting one reply |
//! | `REPLY` | 3 | always | Answer to a CALL |
//!
//! # Reserved Events
//!
//! The names in [`BUILTIN_EVENTS`] never travel as CALL/REPLY traffic.
//! Emitting one on a connection notifies local listeners only.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `message` | [`Envelope`] and [`MessageType`] |
//! | `codec` | Frame [`encode`] / [`decode`] |
//! | `correlation` | [`CorrelationTable`] |

// ============================================================================
// Submodules
// ============================================================================

/// Frame encoding and decoding.
pub mod codec;

/// Pending call bookkeeping.
pub mod correlation;

/// Envelope and message kinds.
pub mod message;

// ============================================================================
// Re-exports
// ============================================================================

pub use codec::{decode, encode, event_name, parse};
pub use correlation::CorrelationTable;
pub use message::{Envelope, MessageType, spread};

// ============================================================================
// Constants
// ============================================================================

/// Handshake event carrying the assigned session id.
pub const EVENT_HANDSHAKE: &str = "shakeHandle";

/// Event name used by `send` for generic payloads.
pub const EVENT_MESSAGE: &str = "message";

/// Event name carrying overlay metadata.
pub const EVENT_DATA: &str = "data";

/// Local notification after the handshake completed.
pub const EVENT_OPEN: &str = "open";

/// Local notification emitted once when the connection closes.
pub const EVENT_CLOSE: &str = "close";

/// Local notification emitted before a fatal error closes the connection.
pub const EVENT_ERROR: &str = "error";

/// Event names delivered as local notifications only.
pub const BUILTIN_EVENTS: [&str; 8] = [
    EVENT_ERROR,
    EVENT_OPEN,
    EVENT_CLOSE,
    "pause",
    "resume",
    EVENT_DATA,
    EVENT_MESSAGE,
    EVENT_HANDSHAKE,
];

/// Returns `true` if `event` is reserved for local notifications.
#[inline]
#[must_use]
pub fn is_builtin(event: &str) -> bool {
    BUILTIN_EVENTS.contains(&event)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_builtin() {
        assert!(is_builtin("open"));
        assert!(is_builtin("shakeHandle"));
        assert!(!is_builtin("camera-move"));
    }
}
