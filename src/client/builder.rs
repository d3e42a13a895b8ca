//! Builder pattern for connection configuration.
//!
//! # Example
//!
//! ```no_run
//! use media_channel::Connection;
//!
//! # fn example() -> media_channel::Result<()> {
//! let connection = Connection::builder()
//!     .origin("ws://192.168.1.20:7000")
//!     .path("/live/cam-1")
//!     .token("token")
//!     .srand("srand")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};
use crate::transport::{Connector, WebSocketConnector};

use super::Connection;
use super::options::ConnectionOptions;

// ============================================================================
// ConnectionBuilder
// ============================================================================

/// Builder for configuring a [`Connection`].
///
/// Use [`Connection::builder()`] to create a new builder.
#[derive(Default, Clone)]
pub struct ConnectionBuilder {
    /// Scheme, host and port of the media endpoint.
    origin: Option<String>,
    /// Channel options.
    options: ConnectionOptions,
    /// Transport factory (WebSocket when unset).
    connector: Option<Arc<dyn Connector>>,
}

impl fmt::Debug for ConnectionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionBuilder")
            .field("origin", &self.origin)
            .field("options", &self.options)
            .field("custom_connector", &self.connector.is_some())
            .finish()
    }
}

// ============================================================================
// ConnectionBuilder Implementation
// ============================================================================

impl ConnectionBuilder {
    /// Creates a new builder with no configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the endpoint origin (e.g. `ws://host:port`).
    #[inline]
    #[must_use]
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Sets the stream path (default `/live`).
    #[inline]
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.options.path = path.into();
        self
    }

    /// Sets the access token.
    #[inline]
    #[must_use]
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.options.credentials.token = Some(token.into());
        self
    }

    /// Sets the srand value.
    #[inline]
    #[must_use]
    pub fn srand(mut self, srand: impl Into<String>) -> Self {
        self.options.credentials.srand = Some(srand.into());
        self
    }

    /// Sets the handshake timeout (default 30s).
    #[inline]
    #[must_use]
    pub fn open_timeout(mut self, timeout: Duration) -> Self {
        self.options.open_timeout = timeout;
        self
    }

    /// Sets a per-call reply timeout (default none).
    #[inline]
    #[must_use]
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.options.call_timeout = Some(timeout);
        self
    }

    /// Replaces all options at once.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: ConnectionOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the transport factory.
    #[inline]
    #[must_use]
    pub fn connector(mut self, connector: impl Connector + 'static) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    /// Builds the connection in the `Idle` state.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the origin is missing or not a `ws`/`wss` URL
    /// - [`Error::Config`] if the options are invalid
    pub fn build(self) -> Result<Connection> {
        let origin = self.validate_origin()?;
        self.options.validate().map_err(Error::config)?;

        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(WebSocketConnector::new()));

        Ok(Connection::new(origin, self.options, connector))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ConnectionBuilder {
    fn validate_origin(&self) -> Result<String> {
        let origin = self
            .origin
            .as_deref()
            .ok_or_else(|| Error::config("origin is required"))?;

        let parsed = Url::parse(origin).map_err(|e| Error::config(format!("invalid origin {origin:?}: {e}")))?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(Error::config(format!(
                "origin scheme must be ws or wss, got {}",
                parsed.scheme()
            )));
        }

        Ok(origin.trim_end_matches('/').to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::client::ConnectionState;

    #[test]
    fn test_missing_origin() {
        let err = ConnectionBuilder::new().build().unwrap_err();
        assert!(err.to_string().contains("origin is required"));
    }

    #[test]
    fn test_rejects_http_origin() {
        let err = ConnectionBuilder::new()
            .origin("http://cam:7000")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_rejects_invalid_options() {
        let err = ConnectionBuilder::new()
            .origin("ws://cam")
            .open_timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_build_is_idle() {
        let connection = ConnectionBuilder::new()
            .origin("ws://cam:7000/")
            .path("/live/cam-1")
            .token("t")
            .build()
            .expect("build");

        assert_eq!(connection.state(), ConnectionState::Idle);
        assert_eq!(connection.origin(), "ws://cam:7000");
        assert!(connection.session_id().is_none());
    }
}
