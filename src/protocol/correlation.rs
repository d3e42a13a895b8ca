//! Request/response correlation.
//!
//! [`CorrelationTable`] mints per-connection event ids and keeps the
//! callback of every outstanding CALL until its REPLY arrives. Entries that
//! never get a reply are discarded on reset without being invoked.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::identifiers::EventId;

// ============================================================================
// CorrelationTable
// ============================================================================

/// Pending calls keyed by event id.
///
/// Generic over the reply type `R` delivered to callbacks.
pub struct CorrelationTable<R> {
    pending: FxHashMap<EventId, Box<dyn FnOnce(R) + Send>>,
    last_id: u64,
}

impl<R> Default for CorrelationTable<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> fmt::Debug for CorrelationTable<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorrelationTable")
            .field("pending", &self.pending.len())
            .field("last_id", &self.last_id)
            .finish()
    }
}

impl<R> CorrelationTable<R> {
    /// Creates an empty table. The first minted id is 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: FxHashMap::default(),
            last_id: 0,
        }
    }

    /// Mints the next event id.
    pub fn next_event_id(&mut self) -> EventId {
        self.last_id += 1;
        EventId::new(self.last_id)
    }

    /// Registers a callback for `event_id`.
    ///
    /// Returns `false`, leaving the existing entry in place, if the id is
    /// already pending.
    pub fn register<F>(&mut self, event_id: EventId, callback: F) -> bool
    where
        F: FnOnce(R) + Send + 'static,
    {
        if self.pending.contains_key(&event_id) {
            debug!(%event_id, "Event id already pending");
            return false;
        }
        self.pending.insert(event_id, Box::new(callback));
        true
    }

    /// Removes the entry for `event_id` and invokes it with `reply`.
    ///
    /// Returns `false` for unknown ids, which is the normal outcome for
    /// stray or duplicate replies.
    pub fn resolve(&mut self, event_id: EventId, reply: R) -> bool {
        match self.take(event_id) {
            Some(callback) => {
                callback(reply);
                true
            }
            None => false,
        }
    }

    /// Removes and returns the callback for `event_id` without invoking it.
    ///
    /// Lets the owner run the callback after releasing its own locks.
    pub fn take(&mut self, event_id: EventId) -> Option<Box<dyn FnOnce(R) + Send>> {
        let callback = self.pending.remove(&event_id);
        if callback.is_none() {
            debug!(%event_id, "Reply for unknown event id");
        } else {
            trace!(%event_id, "Pending call resolved");
        }
        callback
    }

    /// Discards the entry for `event_id` without invoking it.
    pub fn remove(&mut self, event_id: EventId) -> bool {
        self.pending.remove(&event_id).is_some()
    }

    /// Removes all entries without invoking them and returns them, so the
    /// caller controls where they are dropped.
    pub fn drain(&mut self) -> Vec<Box<dyn FnOnce(R) + Send>> {
        self.pending.drain().map(|(_, callback)| callback).collect()
    }

    /// Drops all entries without invoking them.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Returns `true` if `event_id` is pending.
    #[inline]
    #[must_use]
    pub fn contains(&self, event_id: EventId) -> bool {
        self.pending.contains_key(&event_id)
    }

    /// Returns the number of pending calls.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns `true` if no call is pending.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
