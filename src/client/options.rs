//! Connection options.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use media_channel::ConnectionOptions;
//!
//! let options = ConnectionOptions::new()
//!     .with_path("/live/cam-1")
//!     .with_token("token")
//!     .with_open_timeout(Duration::from_secs(10));
//!
//! assert!(options.validate().is_ok());
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use super::session::Credentials;

// ============================================================================
// Constants
// ============================================================================

/// Default stream path.
pub const DEFAULT_PATH: &str = "/live";

/// Default time allowed between `open()` and the handshake.
pub const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_millis(30_000);

// ============================================================================
// ConnectionOptions
// ============================================================================

/// Channel configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Stream path appended to the origin.
    pub path: String,

    /// Token and srand sent in the query string.
    pub credentials: Credentials,

    /// Time allowed for the handshake after `open()`.
    pub open_timeout: Duration,

    /// Time allowed for a call's reply (`None` = wait until close).
    pub call_timeout: Option<Duration>,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl ConnectionOptions {
    /// Creates options with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            path: DEFAULT_PATH.to_string(),
            credentials: Credentials::default(),
            open_timeout: DEFAULT_OPEN_TIMEOUT,
            call_timeout: None,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ConnectionOptions {
    /// Sets the stream path.
    #[inline]
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Sets the access token.
    #[inline]
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.credentials.token = Some(token.into());
        self
    }

    /// Sets the srand value.
    #[inline]
    #[must_use]
    pub fn with_srand(mut self, srand: impl Into<String>) -> Self {
        self.credentials.srand = Some(srand.into());
        self
    }

    /// Sets the handshake timeout.
    #[inline]
    #[must_use]
    pub fn with_open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }

    /// Sets a per-call reply timeout.
    #[inline]
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ConnectionOptions {
    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns an error message if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        if !self.path.starts_with('/') {
            return Err(format!("path must start with '/', got {:?}", self.path));
        }
        if self.open_timeout.is_zero() {
            return Err("open timeout must be greater than zero".to_string());
        }
        if self.call_timeout.is_some_and(|t| t.is_zero()) {
            return Err("call timeout must be greater than zero".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
