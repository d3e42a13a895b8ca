//! In-process transport.
//!
//! [`MemoryConnector`] hands the connection a channel-backed socket whose
//! other end is a [`MemoryPeer`]. The peer plays the media endpoint: it
//! sees every frame the connection sends and can push frames back.
//!
//! # Example
//!
//! ```ignore
//! let (connector, mut peer) = MemoryConnector::pair();
//! let connection = Connection::builder()
//!     .origin("ws://camera.local")
//!     .connector(connector)
//!     .build()?;
//!
//! connection.open(None)?;
//! peer.connected().await;
//! peer.send(&Envelope::send("shakeHandle").with_id(Some("abc".into())))?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::trace;

use crate::error::{Error, Result};
use crate::protocol::{self, Envelope};

use super::{Connector, FrameSink, FrameStream, TransportPair};

// ============================================================================
// PeerEvent
// ============================================================================

/// What the peer observes on its end of the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    /// The connection connected to this URL.
    Connected(String),
    /// The connection sent a text frame.
    Frame(String),
    /// The connection closed its sink.
    Closed,
}

// ============================================================================
// MemoryConnector
// ============================================================================

/// Channel ends handed out on the first connect.
struct ClientEnds {
    to_peer: mpsc::UnboundedSender<PeerEvent>,
    from_peer: mpsc::UnboundedReceiver<Option<String>>,
}

/// Connector producing a single in-process socket.
pub struct MemoryConnector {
    ends: Mutex<Option<ClientEnds>>,
}

impl MemoryConnector {
    /// Creates a connector and the peer sitting on the other end.
    #[must_use]
    pub fn pair() -> (Self, MemoryPeer) {
        let (to_peer, peer_rx) = mpsc::unbounded_channel();
        let (peer_tx, from_peer) = mpsc::unbounded_channel();
        let connector = Self {
            ends: Mutex::new(Some(ClientEnds { to_peer, from_peer })),
        };
        let peer = MemoryPeer {
            tx: peer_tx,
            rx: peer_rx,
        };
        (connector, peer)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, url: &str) -> Result<TransportPair> {
        let ends = self
            .ends
            .lock()
            .take()
            .ok_or_else(|| Error::connection("memory transport already used"))?;

        ends.to_peer
            .send(PeerEvent::Connected(url.to_string()))
            .map_err(|_| Error::connection("memory peer dropped"))?;

        let sink: Box<dyn FrameSink> = Box::new(MemorySink {
            to_peer: ends.to_peer,
        });
        let stream: Box<dyn FrameStream> = Box::new(MemoryFrames {
            from_peer: ends.from_peer,
        });
        Ok((sink, stream))
    }
}

struct MemorySink {
    to_peer: mpsc::UnboundedSender<PeerEvent>,
}

#[async_trait]
impl FrameSink for MemorySink {
    async fn send_text(&mut self, text: String) -> Result<()> {
        trace!(%text, "memory frame out");
        self.to_peer
            .send(PeerEvent::Frame(text))
            .map_err(|_| Error::ConnectionClosed)
    }

    async fn close(&mut self) -> Result<()> {
        // A peer that already went away needs no close notice.
        let _ = self.to_peer.send(PeerEvent::Closed);
        Ok(())
    }
}

struct MemoryFrames {
    from_peer: mpsc::UnboundedReceiver<Option<String>>,
}

#[async_trait]
impl FrameStream for MemoryFrames {
    async fn next_frame(&mut self) -> Option<Result<String>> {
        self.from_peer.recv().await.flatten().map(Ok)
    }
}

// ============================================================================
// MemoryPeer
// ============================================================================

/// Remote end of a [`MemoryConnector`] socket.
pub struct MemoryPeer {
    tx: mpsc::UnboundedSender<Option<String>>,
    rx: mpsc::UnboundedReceiver<PeerEvent>,
}

impl MemoryPeer {
    /// Pushes a raw text frame to the connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the connection side is gone.
    pub fn send_raw(&self, frame: impl Into<String>) -> Result<()> {
        self.tx
            .send(Some(frame.into()))
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Encodes and pushes an envelope.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the connection side is gone.
    pub fn send(&self, envelope: &Envelope) -> Result<()> {
        self.send_raw(protocol::encode(envelope)?)
    }

    /// Closes the socket from the peer side.
    pub fn close(&self) {
        let _ = self.tx.send(None);
    }

    /// Waits for the next thing the connection did.
    pub async fn recv(&mut self) -> Option<PeerEvent> {
        self.rx.recv().await
    }

    /// Waits for the connect and returns the URL that was used.
    pub async fn connected(&mut self) -> Option<String> {
        loop {
            match self.rx.recv().await? {
                PeerEvent::Connected(url) => return Some(url),
                other => trace!(?other, "skipping peer event"),
            }
        }
    }

    /// Waits for the next envelope the connection sent.
    ///
    /// Returns `None` once the connection closed its sink.
    pub async fn recv_envelope(&mut self) -> Option<Envelope> {
        loop {
            match self.rx.recv().await? {
                PeerEvent::Frame(frame) => return protocol::decode(&frame).ok(),
                PeerEvent::Closed => return None,
                PeerEvent::Connected(_) => {}
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frames_flow_both_ways() {
        let (connector, mut peer) = MemoryConnector::pair();
        let (mut sink, mut stream) = connector.connect("ws://x/live.media").await.expect("connect");

        assert_eq!(peer.connected().await.as_deref(), Some("ws://x/live.media"));

        sink.send_text(r#"{"type":1,"event":"ping"}"#.into())
            .await
            .expect("send");
        let envelope = peer.recv_envelope().await.expect("envelope");
        assert_eq!(envelope.event, "ping");

        peer.send_raw("hello").expect("peer send");
        assert_eq!(stream.next_frame().await.expect("frame").expect("ok"), "hello");

        peer.close();
        assert!(stream.next_frame().await.is_none());
    }

    #[tokio::test]
    async fn test_second_connect_fails() {
        let (connector, _peer) = MemoryConnector::pair();
        let _first = connector.connect("ws://x").await.expect("connect");
        assert!(connector.connect("ws://x").await.is_err());
    }

    #[tokio::test]
    async fn test_sink_close_reaches_peer() {
        let (connector, mut peer) = MemoryConnector::pair();
        let (mut sink, _stream) = connector.connect("ws://x").await.expect("connect");
        peer.connected().await;

        sink.close().await.expect("close");
        assert_eq!(peer.recv().await, Some(PeerEvent::Closed));
    }
}
