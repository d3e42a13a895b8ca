//! One-shot reply token handed to CALL listeners.
//!
//! Completing a token sends exactly one REPLY. Every later completion is a
//! no-op, so a listener cannot answer one call twice.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::Result;
use crate::identifiers::EventId;
use crate::protocol::EVENT_MESSAGE;

use super::Connection;

// ============================================================================
// ReplyToken
// ============================================================================

struct TokenInner {
    connection: Connection,
    event: String,
    event_id: EventId,
    consumed: AtomicBool,
}

/// Handle for answering one inbound CALL.
///
/// Cheap to clone; all clones share the consumed flag.
#[derive(Clone)]
pub struct ReplyToken {
    inner: Arc<TokenInner>,
}

impl fmt::Debug for ReplyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplyToken")
            .field("event", &self.inner.event)
            .field("event_id", &self.inner.event_id)
            .field("consumed", &self.is_consumed())
            .finish()
    }
}

impl ReplyToken {
    pub(crate) fn new(connection: Connection, event: impl Into<String>, event_id: EventId) -> Self {
        Self {
            inner: Arc::new(TokenInner {
                connection,
                event: event.into(),
                event_id,
                consumed: AtomicBool::new(false),
            }),
        }
    }

    /// Returns the event name being answered.
    #[inline]
    #[must_use]
    pub fn event(&self) -> &str {
        &self.inner.event
    }

    /// Returns the correlation id of the call.
    #[inline]
    #[must_use]
    pub fn event_id(&self) -> EventId {
        self.inner.event_id
    }

    /// Returns `true` once a reply was attempted.
    #[inline]
    #[must_use]
    pub fn is_consumed(&self) -> bool {
        self.inner.consumed.load(Ordering::Acquire)
    }

    /// Replies with positional arguments.
    ///
    /// For the `message` event a single argument becomes the payload and
    /// two arguments are read as `(opts, data)`. Other events send the
    /// argument list as the payload.
    ///
    /// Returns `Ok(false)` without sending if the token was already used.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection no longer accepts messages. The
    /// token is consumed either way.
    pub fn reply(&self, args: Vec<Value>) -> Result<bool> {
        if self.inner.event == EVENT_MESSAGE {
            let mut args = args.into_iter();
            return match (args.next(), args.next()) {
                (None, _) => self.complete(None, None),
                (Some(data), None) => self.complete(None, Some(data)),
                (Some(opts), Some(data)) => {
                    let opts = match opts {
                        Value::Object(map) => Some(map),
                        _ => None,
                    };
                    self.complete(opts, Some(data))
                }
            };
        }
        self.complete(None, Some(Value::Array(args)))
    }

    /// Replies with explicit options and payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection no longer accepts messages.
    pub fn reply_message(&self, opts: Option<Map<String, Value>>, data: Value) -> Result<bool> {
        self.complete(opts, Some(data))
    }

    fn complete(&self, opts: Option<Map<String, Value>>, data: Option<Value>) -> Result<bool> {
        if self.inner.consumed.swap(true, Ordering::AcqRel) {
            debug!(event_id = %self.inner.event_id, "Reply already sent");
            return Ok(false);
        }
        self.inner
            .connection
            .send_reply(&self.inner.event, self.inner.event_id, opts, data)?;
        Ok(true)
    }
}
