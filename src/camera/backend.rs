//! Device backend interface.
//!
//! The backend lists cameras and prepares a stream before a channel is
//! opened. Only the interface and its JSON shapes live here; transports
//! (HTTP or otherwise) implement [`DeviceBackend`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One entry of the device list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSummary {
    /// Device key.
    pub dev_id: String,
    /// Display name.
    #[serde(default)]
    pub alias: String,
    /// Report tag shown next to the alias.
    #[serde(default)]
    pub report: String,
    /// `true` if the device is online.
    #[serde(default)]
    pub status: bool,
}

/// Result of selecting or logging into a device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDescriptor {
    /// `true` if the request succeeded.
    pub result: bool,
    /// Status text.
    #[serde(default)]
    pub msg: String,
    /// `true` if credentials must be supplied through
    /// [`DeviceBackend::login`] first.
    #[serde(default)]
    pub login: bool,
    /// Stream path, e.g. `/sid`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    /// `true` if the camera accepts motion commands.
    #[serde(default)]
    pub enable_move: bool,
    /// Automatic tracking state.
    #[serde(default)]
    pub auto_mode: bool,
}

impl SessionDescriptor {
    /// Returns the stream path to open a channel on.
    ///
    /// `None` unless the request succeeded without requiring a login.
    #[must_use]
    pub fn playable_path(&self) -> Option<&str> {
        if !self.result || self.login {
            return None;
        }
        self.video_url.as_deref().filter(|path| !path.is_empty())
    }
}

/// Credentials for [`DeviceBackend::login`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// Device key.
    pub dev_id: String,
    /// Account name.
    pub username: String,
    /// Account password.
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("dev_id", &self.dev_id)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Result of closing a device stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseResult {
    /// `true` if the stream was closed.
    pub result: bool,
    /// Status text.
    #[serde(default)]
    pub msg: String,
}

/// Device management operations.
#[async_trait]
pub trait DeviceBackend: Send + Sync {
    /// Lists known devices.
    async fn list(&self) -> Result<Vec<DeviceSummary>>;

    /// Prepares the stream of `dev_id`.
    async fn select(&self, dev_id: &str) -> Result<SessionDescriptor>;

    /// Logs into a device that required credentials.
    async fn login(&self, request: &LoginRequest) -> Result<SessionDescriptor>;

    /// Releases the stream of `dev_id`.
    async fn close(&self, dev_id: &str) -> Result<CloseResult>;
}
