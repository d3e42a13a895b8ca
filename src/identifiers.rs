//! Type-safe identifiers.
//!
//! Newtype wrappers keep correlation ids, listener handles and session ids
//! from being mixed up at compile time.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::num::NonZeroU64;

use serde::{Serialize, Serializer};
use serde_json::Value;

// ============================================================================
// EventId
// ============================================================================

/// Correlation id linking a CALL to its single REPLY.
///
/// Minted per connection starting at 1; zero is never a valid id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(NonZeroU64);

impl EventId {
    /// Creates an event id.
    ///
    /// # Panics
    ///
    /// Panics if `id` is zero.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        match NonZeroU64::new(id) {
            Some(id) => Self(id),
            None => panic!("event id must be non-zero"),
        }
    }

    /// Creates an event id, returning `None` for zero.
    #[inline]
    #[must_use]
    pub const fn try_new(id: u64) -> Option<Self> {
        match NonZeroU64::new(id) {
            Some(id) => Some(Self(id)),
            None => None,
        }
    }

    /// Returns the raw integer.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for EventId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.as_u64())
    }
}

// ============================================================================
// ListenerId
// ============================================================================

/// Handle returned by listener registration, used to remove it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    #[inline]
    pub(crate) const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw integer.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

// ============================================================================
// SessionId
// ============================================================================

/// Session id assigned by the remote peer during the handshake.
///
/// Kept in its JSON form (string or number) so it is echoed back exactly
/// as the peer sent it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionId(Value);

impl SessionId {
    /// Creates a session id from a JSON value.
    ///
    /// Only non-empty strings and numbers are accepted.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(Self(value.clone())),
            Value::Number(_) => Some(Self(value.clone())),
            _ => None,
        }
    }

    /// Returns the id as it appears on the wire.
    #[inline]
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(Value::String(id.to_string()))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Value::String(s) => f.write_str(s),
            other => write!(f, "{other}"),
        }
    }
}

impl Serialize for SessionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

// ============================================================================
// Tests
// ============================================================================
