//! Frame encoding and decoding.
//!
//! Frames are JSON text. Decoding distinguishes two failure classes:
//!
//! | Failure | Error | Scope |
//! |---------|-------|-------|
//! | Not JSON | [`Error::Decode`] | Whole channel |
//! | JSON, but not an envelope | [`Error::Protocol`] | One message |

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;

use crate::error::{Error, Result};

use super::Envelope;

// ============================================================================
// Codec
// ============================================================================

/// Serializes an envelope into a text frame.
///
/// # Errors
///
/// Returns [`Error::Json`] if a payload value cannot be serialized.
pub fn encode(envelope: &Envelope) -> Result<String> {
    Ok(serde_json::to_string(envelope)?)
}

/// Parses a text frame as JSON without validating the envelope.
///
/// Control frames (handshake, open, close, data) are routed by event name
/// alone, so callers inspect the raw value before [`Envelope::from_value`].
///
/// # Errors
///
/// Returns [`Error::Decode`] if the frame is not valid JSON.
pub fn parse(frame: &str) -> Result<Value> {
    serde_json::from_str(frame).map_err(|e| Error::decode(e.to_string()))
}

/// Parses a text frame into an envelope.
///
/// # Errors
///
/// - [`Error::Decode`] if the frame is not valid JSON
/// - [`Error::Protocol`] if the JSON is not a valid envelope
pub fn decode(frame: &str) -> Result<Envelope> {
    Envelope::from_value(parse(frame)?)
}

/// Returns the `event` field of a parsed frame.
#[must_use]
pub fn event_name(value: &Value) -> Option<&str> {
    value.get("event")?.as_str()
}

// ============================================================================
// Tests
// ============================================================================
