//! WebSocket client transport.
//!
//! Connects with `tokio_tungstenite::connect_async` and splits the stream
//! into the sink/stream halves the connection task drives.
//!
//! `wss://` origins need the crate's `tls` feature.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use crate::error::{Error, Result};

use super::{Connector, FrameSink, FrameStream, TransportPair};

// ============================================================================
// Types
// ============================================================================

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ============================================================================
// WebSocketConnector
// ============================================================================

/// Default connector backed by tokio-tungstenite.
#[derive(Debug, Clone, Default)]
pub struct WebSocketConnector {
    /// Maximum accepted message size in bytes (`None` = library default).
    max_message_size: Option<usize>,
}

impl WebSocketConnector {
    /// Creates a connector with library defaults.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits the size of a single inbound message.
    #[inline]
    #[must_use]
    pub fn with_max_message_size(mut self, bytes: usize) -> Self {
        self.max_message_size = Some(bytes);
        self
    }

    fn config(&self) -> Option<WebSocketConfig> {
        self.max_message_size.map(|bytes| {
            let mut config = WebSocketConfig::default();
            config.max_message_size = Some(bytes);
            config.max_frame_size = Some(bytes);
            config
        })
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &str) -> Result<TransportPair> {
        let (ws_stream, response) =
            tokio_tungstenite::connect_async_with_config(url, self.config(), false)
                .await
                .map_err(|e| Error::connection(format!("WebSocket connect failed: {e}")))?;

        debug!(status = %response.status(), "WebSocket connected");

        let (write, read) = ws_stream.split();
        let sink: Box<dyn FrameSink> = Box::new(WsSink { write });
        let stream: Box<dyn FrameStream> = Box::new(WsFrames { read });
        Ok((sink, stream))
    }
}

// ============================================================================
// WsSink
// ============================================================================

struct WsSink {
    write: SplitSink<WsStream, Message>,
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.write.send(Message::Text(text.into())).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.write.close().await?;
        Ok(())
    }
}

// ============================================================================
// WsFrames
// ============================================================================

struct WsFrames {
    read: SplitStream<WsStream>,
}

#[async_trait]
impl FrameStream for WsFrames {
    async fn next_frame(&mut self) -> Option<Result<String>> {
        loop {
            match self.read.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),

                Ok(Message::Close(frame)) => {
                    debug!(?frame, "WebSocket closed by remote");
                    return None;
                }

                Ok(Message::Binary(bytes)) => {
                    trace!(len = bytes.len(), "Ignoring binary frame");
                }

                // Ping/Pong are answered by tungstenite
                Ok(_) => {}

                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
