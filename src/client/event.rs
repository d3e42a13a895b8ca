//! Listener and callback payloads.
//!
//! | Type | Delivered to | Built from |
//! |------|--------------|------------|
//! | [`Event`] | listeners registered with `on`/`once` | SEND/CALL messages and local notifications |
//! | [`Reply`] | the callback of one outgoing CALL | the matching REPLY |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::identifiers::EventId;
use crate::protocol::{EVENT_MESSAGE, Envelope, spread};

use super::{Connection, ReplyToken};

// ============================================================================
// Event
// ============================================================================

/// A notification delivered to listeners.
///
/// Always carries the originating connection. CALL messages also carry a
/// [`ReplyToken`].
#[derive(Clone)]
pub struct Event {
    name: String,
    connection: Connection,
    opts: Option<Map<String, Value>>,
    args: Vec<Value>,
    reply: Option<ReplyToken>,
    error: Option<Arc<Error>>,
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("name", &self.name)
            .field("opts", &self.opts)
            .field("args", &self.args)
            .field("reply", &self.reply)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl Event {
    pub(crate) fn new(name: impl Into<String>, connection: Connection) -> Self {
        Self {
            name: name.into(),
            connection,
            opts: None,
            args: Vec::new(),
            reply: None,
            error: None,
        }
    }

    /// Builds the event for an inbound SEND or CALL.
    ///
    /// `message` keeps its payload whole next to `opts`; other events get
    /// the payload spread into arguments.
    pub(crate) fn from_envelope(
        connection: Connection,
        envelope: Envelope,
        reply: Option<ReplyToken>,
    ) -> Self {
        let args = if envelope.event == EVENT_MESSAGE {
            envelope.data.into_iter().collect()
        } else {
            spread(envelope.data)
        };
        Self {
            name: envelope.event,
            connection,
            opts: envelope.opts,
            args,
            reply,
            error: None,
        }
    }

    pub(crate) fn with_opts(mut self, opts: Option<Map<String, Value>>) -> Self {
        self.opts = opts;
        self
    }

    pub(crate) fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    pub(crate) fn with_error(mut self, error: Arc<Error>) -> Self {
        self.args = vec![Value::String(error.to_string())];
        self.error = Some(error);
        self
    }

    /// Returns the event name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the connection the event came from.
    #[inline]
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Returns the message options, if any.
    #[inline]
    #[must_use]
    pub fn opts(&self) -> Option<&Map<String, Value>> {
        self.opts.as_ref()
    }

    /// Returns a string option.
    #[must_use]
    pub fn opt_str(&self, key: &str) -> Option<&str> {
        self.opts.as_ref()?.get(key)?.as_str()
    }

    /// Returns the positional arguments.
    #[inline]
    #[must_use]
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Returns one positional argument.
    #[inline]
    #[must_use]
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    /// Deserializes one positional argument.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the argument is missing or has the wrong
    /// shape.
    pub fn arg_as<T: DeserializeOwned>(&self, index: usize) -> Result<T> {
        arg_as(&self.args, index)
    }

    /// Returns the negotiated playback path of a `shakeHandle` event.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        self.args.first()?.as_str()
    }

    /// Returns the error of an `error` event.
    #[inline]
    #[must_use]
    pub fn error(&self) -> Option<&Error> {
        self.error.as_deref()
    }

    /// Returns `true` if the peer expects a reply.
    #[inline]
    #[must_use]
    pub fn is_call(&self) -> bool {
        self.reply.is_some()
    }

    /// Returns the reply token of a CALL.
    #[inline]
    #[must_use]
    pub fn reply_token(&self) -> Option<&ReplyToken> {
        self.reply.as_ref()
    }

    /// Replies to a CALL with positional arguments.
    ///
    /// Returns `Ok(false)` if this event is not a call or was already
    /// answered.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection no longer accepts messages.
    pub fn reply(&self, args: Vec<Value>) -> Result<bool> {
        match &self.reply {
            Some(token) => token.reply(args),
            None => Ok(false),
        }
    }
}

// ============================================================================
// Reply
// ============================================================================

/// The answer to an outgoing CALL.
#[derive(Clone)]
pub struct Reply {
    connection: Connection,
    event: String,
    event_id: EventId,
    opts: Option<Map<String, Value>>,
    args: Vec<Value>,
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reply")
            .field("event", &self.event)
            .field("event_id", &self.event_id)
            .field("opts", &self.opts)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

impl Reply {
    /// Builds the reply from an inbound REPLY envelope.
    ///
    /// `message` replies always carry an options map, possibly empty.
    pub(crate) fn from_envelope(connection: Connection, event_id: EventId, envelope: Envelope) -> Self {
        let (opts, args) = if envelope.event == EVENT_MESSAGE {
            (
                Some(envelope.opts.unwrap_or_default()),
                envelope.data.into_iter().collect(),
            )
        } else {
            (envelope.opts, spread(envelope.data))
        };
        Self {
            connection,
            event: envelope.event,
            event_id,
            opts,
            args,
        }
    }

    /// Returns the connection the reply arrived on.
    #[inline]
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Returns the event name of the call.
    #[inline]
    #[must_use]
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Returns the correlation id.
    #[inline]
    #[must_use]
    pub fn event_id(&self) -> EventId {
        self.event_id
    }

    /// Returns the reply options, if any.
    #[inline]
    #[must_use]
    pub fn opts(&self) -> Option<&Map<String, Value>> {
        self.opts.as_ref()
    }

    /// Returns the positional arguments.
    #[inline]
    #[must_use]
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Returns one positional argument.
    #[inline]
    #[must_use]
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    /// Deserializes one positional argument.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the argument is missing or has the wrong
    /// shape.
    pub fn arg_as<T: DeserializeOwned>(&self, index: usize) -> Result<T> {
        arg_as(&self.args, index)
    }

    /// Consumes the reply, returning its arguments.
    #[inline]
    #[must_use]
    pub fn into_args(self) -> Vec<Value> {
        self.args
    }
}

fn arg_as<T: DeserializeOwned>(args: &[Value], index: usize) -> Result<T> {
    let value = args.get(index).cloned().unwrap_or(Value::Null);
    Ok(serde_json::from_value(value)?)
}
