//! Channel client.
//!
//! A [`Connection`] owns one transport socket, drives the handshake and
//! lifecycle, and routes messages to listeners or to pending calls.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | [`ConnectionBuilder`] |
//! | `connection` | [`Connection`] state machine and event loop |
//! | `event` | [`Event`] and [`Reply`] payloads |
//! | `options` | [`ConnectionOptions`] |
//! | `reply` | [`ReplyToken`] for inbound calls |
//! | `session` | [`Session`] addressing and [`Credentials`] |
//! | `state` | [`ConnectionState`] |

// ============================================================================
// Submodules
// ============================================================================

/// Connection builder.
pub mod builder;

/// Connection state machine.
pub mod connection;

/// Listener and callback payloads.
pub mod event;

/// Connection options.
pub mod options;

/// Reply tokens.
pub mod reply;

/// Session addressing.
pub mod session;

/// Lifecycle states.
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ConnectionBuilder;
pub use connection::Connection;
pub use event::{Event, Reply};
pub use options::{ConnectionOptions, DEFAULT_OPEN_TIMEOUT, DEFAULT_PATH};
pub use reply::ReplyToken;
pub use session::{Credentials, Session};
pub use state::ConnectionState;
