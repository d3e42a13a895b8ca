//! Wire envelope.
//!
//! Every frame on the channel is one JSON object:
//!
//! ```json
//! {
//!   "id": "session-id",
//!   "type": 2,
//!   "event": "camera-move",
//!   "eventId": 5,
//!   "opts": { ... },
//!   "data": [ ... ]
//! }
//! ```
//!
//! `id` is absent until the handshake assigned one. `eventId` is present
//! exactly on CALL and REPLY messages. `opts` and `data` are omitted when
//! absent, never sent as `null`.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::identifiers::{EventId, SessionId};

// ============================================================================
// MessageType
// ============================================================================

/// Message kind discriminator (`type` field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Fire-and-forget notification.
    Send,
    /// Request expecting exactly one reply.
    Call,
    /// Reply to a previous call.
    Reply,
}

impl MessageType {
    /// Returns the wire code.
    #[inline]
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Send => 1,
            Self::Call => 2,
            Self::Reply => 3,
        }
    }

    /// Parses a wire code.
    #[inline]
    #[must_use]
    pub const fn from_code(code: u64) -> Option<Self> {
        match code {
            1 => Some(Self::Send),
            2 => Some(Self::Call),
            3 => Some(Self::Reply),
            _ => None,
        }
    }

    /// Parses the `type` field, accepting numbers and numeric strings.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_u64().and_then(Self::from_code),
            Value::String(s) => s.trim().parse::<u64>().ok().and_then(Self::from_code),
            _ => None,
        }
    }

    /// Returns `true` if messages of this kind carry an `eventId`.
    #[inline]
    #[must_use]
    pub const fn is_correlated(self) -> bool {
        matches!(self, Self::Call | Self::Reply)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Send => "SEND",
            Self::Call => "CALL",
            Self::Reply => "REPLY",
        })
    }
}

impl Serialize for MessageType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

// ============================================================================
// Envelope
// ============================================================================

/// One message on the channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    /// Session id, absent before the handshake.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<SessionId>,

    /// Message kind.
    #[serde(rename = "type")]
    pub kind: MessageType,

    /// Event name.
    pub event: String,

    /// Correlation id (CALL and REPLY only).
    #[serde(rename = "eventId", skip_serializing_if = "Option::is_none")]
    pub event_id: Option<EventId>,

    /// Out-of-band options.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opts: Option<Map<String, Value>>,

    /// Payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Envelope {
    /// Creates a SEND envelope.
    #[must_use]
    pub fn send(event: impl Into<String>) -> Self {
        Self {
            id: None,
            kind: MessageType::Send,
            event: event.into(),
            event_id: None,
            opts: None,
            data: None,
        }
    }

    /// Creates a CALL envelope.
    #[must_use]
    pub fn call(event: impl Into<String>, event_id: EventId) -> Self {
        Self {
            kind: MessageType::Call,
            event_id: Some(event_id),
            ..Self::send(event)
        }
    }

    /// Creates a REPLY envelope.
    #[must_use]
    pub fn reply(event: impl Into<String>, event_id: EventId) -> Self {
        Self {
            kind: MessageType::Reply,
            event_id: Some(event_id),
            ..Self::send(event)
        }
    }

    /// Sets the session id.
    #[inline]
    #[must_use]
    pub fn with_id(mut self, id: Option<SessionId>) -> Self {
        self.id = id;
        self
    }

    /// Sets the options map.
    #[inline]
    #[must_use]
    pub fn with_opts(mut self, opts: Option<Map<String, Value>>) -> Self {
        self.opts = opts;
        self
    }

    /// Sets the payload.
    #[inline]
    #[must_use]
    pub fn with_data(mut self, data: Option<Value>) -> Self {
        self.data = data;
        self
    }

    /// Validates an envelope from an already-parsed JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the value is not an object, lacks an
    /// event name, has a missing or unknown `type`, or breaks the `eventId`
    /// rule for its kind.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut object) = value else {
            return Err(Error::protocol("message is not an object"));
        };

        let event = match object.remove("event") {
            Some(Value::String(event)) if !event.is_empty() => event,
            _ => return Err(Error::protocol("message has no event name")),
        };

        let kind = object
            .get("type")
            .and_then(MessageType::from_value)
            .ok_or_else(|| {
                Error::protocol(format!(
                    "message({event}) has invalid type {}",
                    object.get("type").unwrap_or(&Value::Null)
                ))
            })?;

        let event_id = match object.remove("eventId") {
            None | Some(Value::Null) => None,
            Some(raw) => Some(
                raw.as_u64()
                    .and_then(EventId::try_new)
                    .ok_or_else(|| Error::protocol(format!("message({event}) has invalid eventId {raw}")))?,
            ),
        };

        match (kind, event_id) {
            (MessageType::Send, Some(id)) => {
                return Err(Error::protocol(format!(
                    "SEND message({event}) carries eventId {id}"
                )));
            }
            (MessageType::Call | MessageType::Reply, None) => {
                return Err(Error::protocol(format!(
                    "{kind} message({event}) has no eventId"
                )));
            }
            _ => {}
        }

        let id = object.get("id").and_then(SessionId::from_value);

        let opts = match object.remove("opts") {
            Some(Value::Object(opts)) => Some(opts),
            _ => None,
        };

        let data = match object.remove("data") {
            None | Some(Value::Null) => None,
            Some(data) => Some(data),
        };

        Ok(Self {
            id,
            kind,
            event,
            event_id,
            opts,
            data,
        })
    }

    /// Returns the payload spread into positional arguments.
    ///
    /// Arrays become one argument per element, any other value a single
    /// argument, and an absent payload no arguments.
    #[must_use]
    pub fn args(&self) -> Vec<Value> {
        spread(self.data.clone())
    }
}

/// Spreads a payload into positional arguments.
#[must_use]
pub fn spread(data: Option<Value>) -> Vec<Value> {
    match data {
        None => Vec::new(),
        Some(Value::Array(items)) => items,
        Some(value) => vec![value],
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_type_codes() {
        assert_eq!(MessageType::Send.code(), 1);
        assert_eq!(MessageType::Call.code(), 2);
        assert_eq!(MessageType::Reply.code(), 3);
        assert_eq!(MessageType::from_code(4), None);
    }

    #[test]
    fn test_message_type_from_string() {
        assert_eq!(MessageType::from_value(&json!("2")), Some(MessageType::Call));
        assert_eq!(MessageType::from_value(&json!("x")), None);
        assert_eq!(MessageType::from_value(&json!(true)), None);
    }

    #[test]
    fn test_send_serialization_omits_absent_fields() {
        let envelope = Envelope::send("camera-stop");
        let json = serde_json::to_value(&envelope).expect("serialize");
        assert_eq!(json, json!({"type": 1, "event": "camera-stop"}));
    }

    #[test]
    fn test_call_serialization() {
        let envelope = Envelope::call("camera-move", EventId::new(4))
            .with_id(Some(SessionId::from("abc")))
            .with_data(Some(json!([{"x": 1, "y": -1}])));
        let json = serde_json::to_value(&envelope).expect("serialize");
        assert_eq!(
            json,
            json!({
                "id": "abc",
                "type": 2,
                "event": "camera-move",
                "eventId": 4,
                "data": [{"x": 1, "y": -1}]
            })
        );
    }

    #[test]
    fn test_from_value_rejects_non_object() {
        let err = Envelope::from_value(json!([1, 2])).unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[test]
    fn test_from_value_rejects_unknown_type() {
        let err = Envelope::from_value(json!({"id": "a", "type": 9, "event": "x"})).unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[test]
    fn test_from_value_requires_event_id_for_call() {
        let err = Envelope::from_value(json!({"id": "a", "type": 2, "event": "x"})).unwrap_err();
        assert!(err.to_string().contains("no eventId"));
    }

    #[test]
    fn test_from_value_rejects_event_id_on_send() {
        let err = Envelope::from_value(json!({"type": 1, "event": "x", "eventId": 3})).unwrap_err();
        assert!(err.to_string().contains("carries eventId"));
    }

    #[test]
    fn test_from_value_drops_null_data() {
        let envelope =
            Envelope::from_value(json!({"type": 1, "event": "x", "data": null})).expect("valid");
        assert!(envelope.data.is_none());
        assert!(envelope.id.is_none());
    }

    #[test]
    fn test_spread() {
        assert!(spread(None).is_empty());
        assert_eq!(spread(Some(json!([1, 2]))), vec![json!(1), json!(2)]);
        assert_eq!(spread(Some(json!({"a": 1}))), vec![json!({"a": 1})]);
    }
}
