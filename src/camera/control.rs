//! Typed camera control calls.
//!
//! | Event | Argument | Reply |
//! |-------|----------|-------|
//! | `camera-move` | `{ x, y }` | `{ result, msg }` |
//! | `camera-stop` | | `{ result, msg }` |
//! | `camera-home` | | `{ result, msg }` |
//! | `camera-mode` | `bool` | `{ result, msg, autoMode }` |
//! | `camera-ai` | `bool` | `bool` |
//!
//! The endpoint pushes `camera-sync <bool>` when another client switches
//! the automatic mode.

// ============================================================================
// Imports
// ============================================================================

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::client::{Connection, Reply};
use crate::error::{Error, Result};
use crate::identifiers::ListenerId;

// ============================================================================
// Constants
// ============================================================================

/// Relative pan/tilt.
pub const EVENT_MOVE: &str = "camera-move";

/// Stops any motion.
pub const EVENT_STOP: &str = "camera-stop";

/// Returns to the home position.
pub const EVENT_HOME: &str = "camera-home";

/// Switches automatic tracking.
pub const EVENT_MODE: &str = "camera-mode";

/// Switches detection on the stream.
pub const EVENT_AI: &str = "camera-ai";

/// Server push announcing the current automatic mode.
pub const EVENT_SYNC: &str = "camera-sync";

// ============================================================================
// Results
// ============================================================================

/// Outcome of a motion command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlResult {
    /// `true` if the camera accepted the command.
    pub result: bool,
    /// Status text, `"ok"` on success.
    #[serde(default)]
    pub msg: String,
}

impl ControlResult {
    fn failure(err: &Error) -> Self {
        Self {
            result: false,
            msg: err.to_string(),
        }
    }
}

/// Outcome of a `camera-mode` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeResult {
    /// `true` if the mode was applied.
    pub result: bool,
    /// Status text.
    #[serde(default)]
    pub msg: String,
    /// Automatic mode now in effect, when reported.
    #[serde(default, rename = "autoMode", skip_serializing_if = "Option::is_none")]
    pub auto_mode: Option<bool>,
}

impl ModeResult {
    fn failure(err: &Error) -> Self {
        Self {
            result: false,
            msg: err.to_string(),
            auto_mode: None,
        }
    }
}

// ============================================================================
// CameraControl
// ============================================================================

/// Camera commands over an open [`Connection`].
///
/// None of the methods fail: transport and decoding problems are folded
/// into a `result: false` outcome carrying the error text.
#[derive(Debug, Clone)]
pub struct CameraControl {
    connection: Connection,
}

impl CameraControl {
    /// Wraps a connection.
    #[must_use]
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    /// Returns the underlying connection.
    #[inline]
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Pans by `x` and tilts by `y`.
    pub async fn move_by(&self, x: f64, y: f64) -> ControlResult {
        self.control(EVENT_MOVE, vec![json!({ "x": x, "y": y })]).await
    }

    /// Stops the camera.
    pub async fn stop(&self) -> ControlResult {
        self.control(EVENT_STOP, Vec::new()).await
    }

    /// Moves the camera to its home position.
    pub async fn home(&self) -> ControlResult {
        self.control(EVENT_HOME, Vec::new()).await
    }

    /// Switches automatic tracking.
    pub async fn set_auto_mode(&self, enabled: bool) -> ModeResult {
        match self.typed_call(EVENT_MODE, vec![Value::Bool(enabled)]).await {
            Ok(result) => result,
            Err(e) => {
                warn!(event = EVENT_MODE, error = %e, "Camera call failed");
                ModeResult::failure(&e)
            }
        }
    }

    /// Switches detection; returns whether it is now enabled.
    ///
    /// A failed call reports `false`.
    pub async fn set_ai(&self, enabled: bool) -> bool {
        match self.typed_call::<bool>(EVENT_AI, vec![Value::Bool(enabled)]).await {
            Ok(enabled) => enabled,
            Err(e) => {
                warn!(event = EVENT_AI, error = %e, "Camera call failed");
                false
            }
        }
    }

    /// Registers `handler` for `camera-sync` pushes.
    ///
    /// Pushes without a boolean argument are ignored.
    pub fn on_sync<F>(&self, handler: F) -> ListenerId
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.connection.on(EVENT_SYNC, move |event| {
            match event.arg(0).and_then(Value::as_bool) {
                Some(auto_mode) => handler(auto_mode),
                None => debug!(args = ?event.args(), "Ignoring camera-sync without mode"),
            }
        })
    }

    async fn control(&self, event: &'static str, args: Vec<Value>) -> ControlResult {
        match self.typed_call(event, args).await {
            Ok(result) => result,
            Err(e) => {
                warn!(event, error = %e, "Camera call failed");
                ControlResult::failure(&e)
            }
        }
    }

    async fn typed_call<T: DeserializeOwned>(&self, event: &str, args: Vec<Value>) -> Result<T> {
        let reply: Reply = self.connection.call(event, args).await?;
        reply.arg_as(0)
    }
}

// ============================================================================
// Tests
// ============================================================================
