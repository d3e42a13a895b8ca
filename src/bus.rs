//! Named publish/subscribe primitive.
//!
//! [`EventBus`] stores listeners per event name and invokes them in
//! registration order. Every [`emit`](EventBus::emit) runs against a
//! snapshot of the listener list taken when the emit starts, so a listener
//! added or removed while handlers are running does not affect the dispatch
//! already in flight.
//!
//! # Example
//!
//! ```
//! use media_channel::bus::EventBus;
//!
//! let bus: EventBus<u32> = EventBus::new();
//! let id = bus.on("tick", |n| println!("tick {n}"));
//! assert!(bus.emit("tick", &1));
//! bus.off("tick", id);
//! assert!(!bus.emit("tick", &2));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::identifiers::ListenerId;

// ============================================================================
// Types
// ============================================================================

/// Listener callback.
pub type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// One registered listener.
struct Listener<T> {
    id: ListenerId,
    handler: Handler<T>,
    once: bool,
}

impl<T> Clone for Listener<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            handler: Arc::clone(&self.handler),
            once: self.once,
        }
    }
}

// ============================================================================
// EventBus
// ============================================================================

/// Listener registry keyed by event name.
///
/// Thread-safe. No internal lock is held while a handler runs, so handlers
/// may freely register, remove or emit on the same bus.
pub struct EventBus<T> {
    listeners: Mutex<FxHashMap<String, Vec<Listener<T>>>>,
    next_id: AtomicU64,
}

impl<T> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for EventBus<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners = self.listeners.lock();
        let mut names: Vec<_> = listeners.keys().cloned().collect();
        names.sort();
        f.debug_struct("EventBus").field("events", &names).finish()
    }
}

impl<T> EventBus<T> {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(FxHashMap::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a listener for `event`.
    pub fn on<F>(&self, event: &str, handler: F) -> ListenerId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.insert(event, Arc::new(handler), false)
    }

    /// Registers a listener that removes itself before its first run.
    pub fn once<F>(&self, event: &str, handler: F) -> ListenerId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.insert(event, Arc::new(handler), true)
    }

    /// Removes the listener registered under `id` for `event`.
    ///
    /// Returns `false` if no such listener exists.
    pub fn off(&self, event: &str, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let Some(list) = listeners.get_mut(event) else {
            return false;
        };
        let Some(index) = list.iter().position(|l| l.id == id) else {
            return false;
        };
        list.remove(index);
        if list.is_empty() {
            listeners.remove(event);
        }
        true
    }

    /// Removes all listeners of `event`, or of every event when `None`.
    pub fn remove_all(&self, event: Option<&str>) {
        let mut listeners = self.listeners.lock();
        match event {
            Some(event) => {
                listeners.remove(event);
            }
            None => listeners.clear(),
        }
    }

    /// Invokes every listener of `event` with `args`.
    ///
    /// Returns `true` if at least one listener ran.
    pub fn emit(&self, event: &str, args: &T) -> bool {
        let snapshot = self.snapshot(event);
        if snapshot.is_empty() {
            return false;
        }
        for listener in &snapshot {
            (listener.handler)(args);
        }
        true
    }

    /// Returns the number of listeners registered for `event`.
    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.lock().get(event).map_or(0, Vec::len)
    }

    /// Returns `true` if no listener is registered at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.lock().is_empty()
    }

    fn insert(&self, event: &str, handler: Handler<T>, once: bool) -> ListenerId {
        let id = ListenerId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .entry(event.to_string())
            .or_default()
            .push(Listener { id, handler, once });
        id
    }

    /// Copies the current listener list, dropping `once` listeners from the
    /// registry as they are claimed by this dispatch.
    fn snapshot(&self, event: &str) -> Vec<Listener<T>> {
        let mut listeners = self.listeners.lock();
        let Some(list) = listeners.get_mut(event) else {
            return Vec::new();
        };
        let snapshot = list.clone();
        list.retain(|l| !l.once);
        if list.is_empty() {
            listeners.remove(event);
        }
        snapshot
    }
}

// ============================================================================
// Tests
// ============================================================================
