//! Overlay renderer layered on a connection.
//!
//! Listens for `data` notifications and draws detection boxes:
//!
//! | `opts.type` | Payload | Effect |
//! |-------------|---------|--------|
//! | `media` | `{ width, height }` | Updates the source video size |
//! | `face` | `[{ id, x0, y0, x1, y1 }, ...]` | Clears and draws the boxes |
//! | anything else | | Logged as invalid data |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::{debug, trace, warn};

use crate::client::Connection;
use crate::error::{Error, Result};
use crate::identifiers::ListenerId;
use crate::protocol::EVENT_DATA;

use super::surface::{Color, Surface};
use super::transform::{OverlayBox, Size, Transform};

// ============================================================================
// Constants
// ============================================================================

/// `opts.type` announcing the stream dimensions.
pub const DATA_TYPE_MEDIA: &str = "media";

/// `opts.type` carrying detection boxes.
pub const DATA_TYPE_FACE: &str = "face";

// ============================================================================
// OverlayConfig
// ============================================================================

/// Initial overlay geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayConfig {
    /// Source video size.
    pub video: Size,
    /// Canvas size.
    pub canvas: Size,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            video: Size::new(1280.0, 720.0),
            canvas: Size::new(1280.0, 720.0),
        }
    }
}

impl OverlayConfig {
    /// Sets the initial video size.
    #[inline]
    #[must_use]
    pub fn with_video_size(mut self, width: f64, height: f64) -> Self {
        self.video = Size::new(width, height);
        self
    }

    /// Sets the initial canvas size.
    #[inline]
    #[must_use]
    pub fn with_canvas_size(mut self, width: f64, height: f64) -> Self {
        self.canvas = Size::new(width, height);
        self
    }
}

// ============================================================================
// OverlayState
// ============================================================================

struct OverlayState<S> {
    transform: Transform,
    surface: S,
}

impl<S: Surface> OverlayState<S> {
    fn clear(&mut self) {
        let region = self.transform.clear_region();
        self.surface.clear_rect(region);
    }

    fn draw(&mut self, layouts: &Value) -> usize {
        let Value::Array(items) = layouts else {
            trace!("Overlay payload is not a list");
            return 0;
        };

        self.clear();
        let mut drawn = 0;
        for item in items {
            let b: OverlayBox = match serde_json::from_value(item.clone()) {
                Ok(b) => b,
                Err(e) => {
                    debug!(error = %e, "Skipping malformed box");
                    continue;
                }
            };
            let color = if b.is_primary() {
                Color::GREEN
            } else {
                Color::RED
            };
            self.surface.stroke_rect(self.transform.map_box(&b), color);
            drawn += 1;
        }
        drawn
    }

    fn handle_data(&mut self, opts: Option<&Map<String, Value>>, data: Option<&Value>) -> Result<()> {
        let kind = opts.and_then(|o| o.get("type")).and_then(Value::as_str);
        let data = data.unwrap_or(&Value::Null);

        match kind {
            Some(DATA_TYPE_MEDIA) => {
                let video = self.transform.video();
                let width = data.get("width").and_then(Value::as_f64).unwrap_or(video.width);
                let height = data
                    .get("height")
                    .and_then(Value::as_f64)
                    .unwrap_or(video.height);
                debug!(width, height, "Media info");
                self.transform.set_video_size(width, height)
            }
            Some(DATA_TYPE_FACE) => {
                let drawn = self.draw(data);
                trace!(drawn, "Face info");
                Ok(())
            }
            other => Err(Error::invalid_data(format!("unknown data type {other:?}"))),
        }
    }
}

// ============================================================================
// OverlayRenderer
// ============================================================================

/// Draws detection boxes pushed over a [`Connection`] onto a [`Surface`].
///
/// The renderer exclusively owns its surface. Dropping it unregisters its
/// `data` listener.
pub struct OverlayRenderer<S: Surface + 'static> {
    connection: Connection,
    state: Arc<Mutex<OverlayState<S>>>,
    listener: ListenerId,
}

impl<S: Surface + 'static> fmt::Debug for OverlayRenderer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverlayRenderer")
            .field("transform", &self.state.lock().transform)
            .field("listener", &self.listener)
            .finish_non_exhaustive()
    }
}

impl<S: Surface + 'static> OverlayRenderer<S> {
    /// Attaches a renderer to `connection` and clears the surface.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the configured sizes are invalid.
    pub fn attach(connection: &Connection, surface: S, config: OverlayConfig) -> Result<Self> {
        let transform = Transform::new(config.video, config.canvas)?;
        let state = Arc::new(Mutex::new(OverlayState { transform, surface }));
        state.lock().clear();

        let listener_state = Arc::clone(&state);
        let listener = connection.on(EVENT_DATA, move |event| {
            let result = listener_state.lock().handle_data(event.opts(), event.arg(0));
            if let Err(e) = result {
                warn!(error = %e, "Data invalid");
            }
        });

        Ok(Self {
            connection: connection.clone(),
            state,
            listener,
        })
    }

    /// Returns the connection the renderer listens on.
    #[inline]
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Returns a copy of the current transform.
    #[must_use]
    pub fn transform(&self) -> Transform {
        self.state.lock().transform
    }

    /// Updates the source video size.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for invalid dimensions.
    pub fn set_video_size(&self, width: f64, height: f64) -> Result<()> {
        self.state.lock().transform.set_video_size(width, height)
    }

    /// Updates the canvas size and leaves full-screen mode.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for invalid dimensions.
    pub fn set_canvas_size(&self, width: f64, height: f64) -> Result<()> {
        self.state.lock().transform.set_canvas_size(width, height)
    }

    /// Enters rotated full-screen mode.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for invalid dimensions.
    pub fn set_full_screen(&self, width: f64, height: f64) -> Result<()> {
        self.state.lock().transform.set_full_screen(width, height)
    }

    /// Erases the surface.
    pub fn clear(&self) {
        self.state.lock().clear();
    }

    /// Clears and draws `layouts`; returns the number of boxes drawn.
    ///
    /// A payload that is not a list is ignored. Malformed entries are
    /// skipped.
    pub fn draw(&self, layouts: &Value) -> usize {
        self.state.lock().draw(layouts)
    }

    /// Applies one `data` notification.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidData`] for an unknown `opts.type`
    /// - [`Error::InvalidArgument`] for invalid media dimensions
    pub fn handle_data(&self, opts: Option<&Map<String, Value>>, data: Option<&Value>) -> Result<()> {
        self.state.lock().handle_data(opts, data)
    }

    /// Runs `f` with the surface.
    pub fn with_surface<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        f(&mut self.state.lock().surface)
    }
}

impl<S: Surface + 'static> Drop for OverlayRenderer<S> {
    fn drop(&mut self) {
        self.connection.off(EVENT_DATA, self.listener);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::overlay::surface::{DisplayList, DrawOp, Rect};
    use crate::transport::MemoryConnector;

    fn renderer(config: OverlayConfig) -> (Connection, OverlayRenderer<DisplayList>) {
        let (connector, _peer) = MemoryConnector::pair();
        let connection = Connection::builder()
            .origin("ws://cam")
            .connector(connector)
            .build()
            .expect("build");
        let renderer =
            OverlayRenderer::attach(&connection, DisplayList::new(), config).expect("renderer");
        (connection, renderer)
    }

    fn face_opts() -> Map<String, Value> {
        json!({"type": "face"}).as_object().cloned().expect("object")
    }

    #[test]
    fn test_attach_clears_surface() {
        let (_connection, renderer) = renderer(OverlayConfig::default());
        renderer.with_surface(|list| {
            assert_eq!(list.ops(), &[DrawOp::Clear(Rect::new(0.0, 0.0, 1280.0, 720.0))]);
        });
    }

    #[test]
    fn test_draw_colors_by_id() {
        let (_connection, renderer) =
            renderer(OverlayConfig::default().with_canvas_size(640.0, 360.0));

        let drawn = renderer.draw(&json!([
            {"id": 0, "x0": 100, "y0": 100, "x1": 200, "y1": 200},
            {"id": 3, "x0": 0, "y0": 0, "x1": 1280, "y1": 720},
        ]));

        assert_eq!(drawn, 2);
        renderer.with_surface(|list| {
            assert_eq!(
                list.current_strokes(),
                vec![
                    (Rect::new(50.0, 50.0, 50.0, 50.0), Color::GREEN),
                    (Rect::new(0.0, 0.0, 640.0, 360.0), Color::RED),
                ]
            );
        });
    }

    #[test]
    fn test_draw_ignores_non_list() {
        let (_connection, renderer) = renderer(OverlayConfig::default());
        renderer.with_surface(DisplayList::take);

        assert_eq!(renderer.draw(&json!({"id": 0})), 0);
        renderer.with_surface(|list| assert!(list.ops().is_empty()));
    }

    #[test]
    fn test_draw_skips_malformed_boxes() {
        let (_connection, renderer) = renderer(OverlayConfig::default());
        let drawn = renderer.draw(&json!([
            {"id": 1, "x0": "left"},
            {"id": 1, "x0": 0, "y0": 0, "x1": 10, "y1": 10},
        ]));
        assert_eq!(drawn, 1);
    }

    #[test]
    fn test_media_data_updates_video_size() {
        let (_connection, renderer) = renderer(OverlayConfig::default());
        let opts = json!({"type": "media"}).as_object().cloned();

        renderer
            .handle_data(opts.as_ref(), Some(&json!({"width": 640, "height": 360})))
            .expect("media");
        assert_eq!(renderer.transform().video(), Size::new(640.0, 360.0));
        assert_eq!(renderer.transform().scale(), (2.0, 2.0));
    }

    #[test]
    fn test_unknown_data_type_is_invalid() {
        let (_connection, renderer) = renderer(OverlayConfig::default());
        let opts = json!({"type": "plate"}).as_object().cloned();

        let err = renderer.handle_data(opts.as_ref(), None).unwrap_err();
        assert!(matches!(err, Error::InvalidData { .. }));
        assert!(matches!(
            renderer.handle_data(None, None),
            Err(Error::InvalidData { .. })
        ));
    }

    #[test]
    fn test_full_screen_draw() {
        let (_connection, renderer) = renderer(OverlayConfig::default());
        renderer.set_full_screen(640.0, 360.0).expect("full screen");
        renderer.draw(&json!([{"id": 0, "x0": 0, "y0": 0, "x1": 1280, "y1": 720}]));

        renderer.with_surface(|list| {
            let ops = list.ops();
            assert_eq!(
                ops[ops.len() - 2],
                DrawOp::Clear(Rect::new(0.0, 0.0, 640.0, 360.0))
            );
            assert_eq!(
                ops[ops.len() - 1],
                DrawOp::Stroke(Rect::new(0.0, 0.0, 640.0, 360.0), Color::GREEN)
            );
        });
    }

    #[tokio::test]
    async fn test_data_events_reach_renderer() {
        let (connector, mut peer) = MemoryConnector::pair();
        let connection = Connection::builder()
            .origin("ws://cam")
            .connector(connector)
            .build()
            .expect("build");
        let renderer = OverlayRenderer::attach(&connection, DisplayList::new(), OverlayConfig::default())
            .expect("renderer");
        assert_eq!(connection.listener_count("data"), 1);

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        connection.on("data", move |_| {
            let _ = tx.send(());
        });

        connection.open(None).expect("open");
        peer.connected().await.expect("connected");
        peer.send_raw(json!({"id": "s1", "type": 1, "event": "shakeHandle"}).to_string())
            .expect("handshake");
        connection.opened().await.expect("opened");

        peer.send_raw(
            json!({
                "event": "data",
                "opts": face_opts(),
                "data": [{"id": 2, "x0": 0, "y0": 0, "x1": 2, "y1": 2}],
            })
            .to_string(),
        )
        .expect("data");
        rx.recv().await.expect("data event");

        renderer.with_surface(|list| {
            assert_eq!(
                list.current_strokes(),
                vec![(Rect::new(0.0, 0.0, 2.0, 2.0), Color::RED)]
            );
        });

        drop(renderer);
        assert_eq!(connection.listener_count("data"), 1);
        connection.close();
    }

    #[test]
    fn test_invalid_config_rejected() {
        let (connector, _peer) = MemoryConnector::pair();
        let connection = Connection::builder()
            .origin("ws://cam")
            .connector(connector)
            .build()
            .expect("build");
        let result = OverlayRenderer::attach(
            &connection,
            DisplayList::new(),
            OverlayConfig::default().with_video_size(0.0, 720.0),
        );
        assert!(matches!(result, Err(Error::InvalidArgument { .. })));
    }
}
