//! Session addressing.
//!
//! Builds the channel URL and the negotiated playback path:
//!
//! | Item | Format |
//! |------|--------|
//! | Channel URL | `{origin}{path}.media?edger-token={token}&&edger-srand={srand}` |
//! | Playback path | `{path}{query}&&id={session}` or `{path}?id={session}` without a query |
//!
//! Query segments only appear for values that were provided. Values are
//! percent-encoded.

// ============================================================================
// Imports
// ============================================================================

use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::SessionId;

// ============================================================================
// Constants
// ============================================================================

/// Query separator used by the media endpoint.
const QUERY_SEPARATOR: &str = "&&";

/// Suffix appended to the stream path for the control channel.
const CHANNEL_SUFFIX: &str = ".media";

// ============================================================================
// Credentials
// ============================================================================

/// Opaque access values attached to the channel URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Access token.
    pub token: Option<String>,
    /// Random nonce paired with the token.
    pub srand: Option<String>,
}

impl Credentials {
    /// Creates credentials with both values set.
    #[must_use]
    pub fn new(token: impl Into<String>, srand: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            srand: Some(srand.into()),
        }
    }

    /// Returns `true` if neither value is set.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.token.is_none() && self.srand.is_none()
    }
}

// ============================================================================
// Session
// ============================================================================

/// Per-connection addressing state.
#[derive(Debug, Clone)]
pub struct Session {
    /// Assigned by the peer during the handshake, cleared on reset.
    pub id: Option<SessionId>,
    origin: String,
    path: String,
    credentials: Credentials,
    query: String,
}

impl Session {
    /// Creates a session for `origin` and stream `path`.
    #[must_use]
    pub fn new(origin: impl Into<String>, path: impl Into<String>, credentials: Credentials) -> Self {
        let mut session = Self {
            id: None,
            origin: origin.into(),
            path: path.into(),
            credentials,
            query: String::new(),
        };
        session.update_query();
        session
    }

    /// Returns the origin.
    #[inline]
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Returns the stream path.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the current credentials.
    #[inline]
    #[must_use]
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Returns the query string (`""` or starting with `?`).
    #[inline]
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Overwrites whichever credential values are set in `update`.
    pub fn apply(&mut self, update: Credentials) {
        if update.is_empty() {
            return;
        }
        if let Some(token) = update.token {
            self.credentials.token = Some(token);
        }
        if let Some(srand) = update.srand {
            self.credentials.srand = Some(srand);
        }
        self.update_query();
    }

    /// Returns the control channel URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the result is not a valid `ws`/`wss` URL.
    pub fn channel_url(&self) -> Result<String> {
        let url = format!("{}{}{CHANNEL_SUFFIX}{}", self.origin, self.path, self.query);
        let parsed = Url::parse(&url).map_err(|e| Error::config(format!("invalid channel url: {e}")))?;
        match parsed.scheme() {
            "ws" | "wss" => Ok(url),
            scheme => Err(Error::config(format!(
                "channel url scheme must be ws or wss, got {scheme}"
            ))),
        }
    }

    /// Returns the playback path negotiated for `id`.
    #[must_use]
    pub fn playback_path(&self, id: &SessionId) -> String {
        let id = urlencoding::encode(&id.to_string()).into_owned();
        if self.query.is_empty() {
            format!("{}?id={id}", self.path)
        } else {
            format!("{}{}{QUERY_SEPARATOR}id={id}", self.path, self.query)
        }
    }

    fn update_query(&mut self) {
        let segments: Vec<String> = [
            ("edger-token", &self.credentials.token),
            ("edger-srand", &self.credentials.srand),
        ]
        .into_iter()
        .filter_map(|(key, value)| {
            value
                .as_deref()
                .map(|v| format!("{key}={}", urlencoding::encode(v)))
        })
        .collect();

        self.query = if segments.is_empty() {
            String::new()
        } else {
            format!("?{}", segments.join(QUERY_SEPARATOR))
        };
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_empty_without_credentials() {
        let session = Session::new("ws://cam", "/live", Credentials::default());
        assert_eq!(session.query(), "");
        assert_eq!(
            session.channel_url().expect("url"),
            "ws://cam/live.media"
        );
    }

    #[test]
    fn test_query_with_both_values() {
        let session = Session::new("ws://cam:7000", "/live", Credentials::new("t0k", "r4nd"));
        assert_eq!(session.query(), "?edger-token=t0k&&edger-srand=r4nd");
        assert_eq!(
            session.channel_url().expect("url"),
            "ws://cam:7000/live.media?edger-token=t0k&&edger-srand=r4nd"
        );
    }

    #[test]
    fn test_query_with_srand_only() {
        let credentials = Credentials {
            token: None,
            srand: Some("r".into()),
        };
        let session = Session::new("ws://cam", "/live", credentials);
        assert_eq!(session.query(), "?edger-srand=r");
    }

    #[test]
    fn test_query_values_are_encoded() {
        let session = Session::new("ws://cam", "/live", Credentials::new("a+b/c", "x y"));
        assert_eq!(session.query(), "?edger-token=a%2Bb%2Fc&&edger-srand=x%20y");
    }

    #[test]
    fn test_apply_overwrites_given_values() {
        let mut session = Session::new("ws://cam", "/live", Credentials::new("old", "s1"));
        session.apply(Credentials {
            token: Some("new".into()),
            srand: None,
        });
        assert_eq!(session.credentials().token.as_deref(), Some("new"));
        assert_eq!(session.credentials().srand.as_deref(), Some("s1"));
        assert_eq!(session.query(), "?edger-token=new&&edger-srand=s1");
    }

    #[test]
    fn test_playback_path_without_query() {
        let session = Session::new("ws://cam", "/live/cam-1", Credentials::default());
        assert_eq!(session.playback_path(&SessionId::from("abc")), "/live/cam-1?id=abc");
    }

    #[test]
    fn test_playback_path_with_query() {
        let session = Session::new("ws://cam", "/live", Credentials::new("t", "s"));
        assert_eq!(
            session.playback_path(&SessionId::from("abc")),
            "/live?edger-token=t&&edger-srand=s&&id=abc"
        );
    }

    #[test]
    fn test_channel_url_rejects_http() {
        let session = Session::new("http://cam", "/live", Credentials::default());
        assert!(matches!(session.channel_url(), Err(Error::Config { .. })));
    }

    #[test]
    fn test_channel_url_rejects_garbage() {
        let session = Session::new("not a url", "/live", Credentials::default());
        assert!(session.channel_url().is_err());
    }
}
