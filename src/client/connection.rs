//! Connection state machine and event loop.
//!
//! # Event Loop
//!
//! `open()` spawns one tokio task per connection. The task:
//!
//! - Connects the transport, racing the open timeout and `close()`
//! - Writes queued outbound frames in the order they were produced
//! - Routes inbound frames to listeners or to pending call callbacks
//! - Runs the close sequence exactly once when it exits
//!
//! Listener and callback code never runs while an internal lock is held,
//! so handlers may call back into the connection freely.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::runtime::Handle;
use tokio::sync::{Notify, mpsc, oneshot, watch};
use tokio::time::{Instant, sleep, sleep_until, timeout};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::bus::EventBus;
use crate::error::{Error, Result};
use crate::identifiers::{EventId, ListenerId, SessionId};
use crate::protocol::{
    self, CorrelationTable, EVENT_CLOSE, EVENT_DATA, EVENT_ERROR, EVENT_HANDSHAKE, EVENT_MESSAGE,
    EVENT_OPEN, Envelope, MessageType,
};
use crate::transport::{Connector, FrameSink, FrameStream};

use super::builder::ConnectionBuilder;
use super::event::{Event, Reply};
use super::options::ConnectionOptions;
use super::reply::ReplyToken;
use super::session::{Credentials, Session};
use super::state::ConnectionState;

// ============================================================================
// Constants
// ============================================================================

/// Maximum outstanding calls before new ones are rejected.
const MAX_PENDING_CALLS: usize = 1024;

// ============================================================================
// Types
// ============================================================================

/// Callback stored for one outstanding CALL.
type PendingCall = Box<dyn FnOnce(Reply) + Send>;

/// Work queued for the event loop.
#[derive(Debug)]
enum ChannelCommand {
    /// Write an encoded frame.
    Send(String),
    /// Forget a call whose reply deadline passed.
    RemoveCorrelation(EventId),
}

/// Mutable connection state, guarded by one lock.
struct Shared {
    state: ConnectionState,
    session: Session,
    correlation: CorrelationTable<Reply>,
    commands: Option<mpsc::UnboundedSender<ChannelCommand>>,
    runtime: Option<Handle>,
    last_error: Option<Arc<Error>>,
}

struct Inner {
    uuid: Uuid,
    bus: EventBus<Event>,
    shared: Mutex<Shared>,
    shutdown: Notify,
    state_tx: watch::Sender<ConnectionState>,
    connector: Arc<dyn Connector>,
    open_timeout: Duration,
    call_timeout: Option<Duration>,
}

// ============================================================================
// Connection
// ============================================================================

/// One bidirectional control channel to a media endpoint.
///
/// Cheap to clone; clones share the same channel.
///
/// # Example
///
/// ```no_run
/// use media_channel::Connection;
///
/// # async fn example() -> media_channel::Result<()> {
/// let connection = Connection::builder()
///     .origin("ws://192.168.1.20:7000")
///     .path("/live/cam-1")
///     .build()?;
///
/// connection.on("shakeHandle", |event| {
///     println!("play {}", event.path().unwrap_or_default());
/// });
///
/// connection.open(None)?;
/// connection.opened().await?;
///
/// let reply = connection.call("camera-home", vec![]).await?;
/// println!("{:?}", reply.args());
///
/// connection.close();
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = self.inner.shared.lock();
        f.debug_struct("Connection")
            .field("uuid", &self.inner.uuid)
            .field("state", &shared.state)
            .field("origin", &shared.session.origin())
            .field("path", &shared.session.path())
            .field("session_id", &shared.session.id)
            .field("pending_calls", &shared.correlation.len())
            .finish()
    }
}

// ============================================================================
// Connection - Construction & Accessors
// ============================================================================

impl Connection {
    /// Creates a builder.
    #[inline]
    #[must_use]
    pub fn builder() -> ConnectionBuilder {
        ConnectionBuilder::new()
    }

    pub(crate) fn new(
        origin: String,
        options: ConnectionOptions,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Idle);
        let session = Session::new(origin, options.path, options.credentials);

        Self {
            inner: Arc::new(Inner {
                uuid: Uuid::new_v4(),
                bus: EventBus::new(),
                shared: Mutex::new(Shared {
                    state: ConnectionState::Idle,
                    session,
                    correlation: CorrelationTable::new(),
                    commands: None,
                    runtime: None,
                    last_error: None,
                }),
                shutdown: Notify::new(),
                state_tx,
                connector,
                open_timeout: options.open_timeout,
                call_timeout: options.call_timeout,
            }),
        }
    }

    /// Returns the local identifier used in logs.
    #[inline]
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.inner.uuid
    }

    /// Returns the current lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.shared.lock().state
    }

    /// Returns the endpoint origin.
    #[must_use]
    pub fn origin(&self) -> String {
        self.inner.shared.lock().session.origin().to_string()
    }

    /// Returns the stream path.
    #[must_use]
    pub fn path(&self) -> String {
        self.inner.shared.lock().session.path().to_string()
    }

    /// Returns the session id assigned by the handshake.
    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        self.inner.shared.lock().session.id.clone()
    }

    /// Returns the playback path negotiated by the handshake.
    #[must_use]
    pub fn playback_path(&self) -> Option<String> {
        let shared = self.inner.shared.lock();
        shared
            .session
            .id
            .as_ref()
            .map(|id| shared.session.playback_path(id))
    }

    /// Returns the error that closed the connection, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<Arc<Error>> {
        self.inner.shared.lock().last_error.clone()
    }

    /// Returns the number of calls waiting for a reply.
    #[must_use]
    pub fn pending_calls(&self) -> usize {
        self.inner.shared.lock().correlation.len()
    }
}

// ============================================================================
// Connection - Listeners
// ============================================================================

impl Connection {
    /// Registers a listener for `event`.
    pub fn on<F>(&self, event: &str, handler: F) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.inner.bus.on(event, handler)
    }

    /// Registers a listener that runs at most once.
    pub fn once<F>(&self, event: &str, handler: F) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.inner.bus.once(event, handler)
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub fn off(&self, event: &str, id: ListenerId) -> bool {
        self.inner.bus.off(event, id)
    }

    /// Removes the listeners of one event, or of all events.
    pub fn remove_all_listeners(&self, event: Option<&str>) {
        self.inner.bus.remove_all(event);
    }

    /// Returns the number of listeners for `event`.
    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.inner.bus.listener_count(event)
    }

    fn emit_local(&self, event: &Event) -> bool {
        self.inner.bus.emit(event.name(), event)
    }
}

// ============================================================================
// Connection - Lifecycle
// ============================================================================

impl Connection {
    /// Starts connecting.
    ///
    /// Credentials given here overwrite the configured ones. The handshake
    /// must complete within the open timeout, otherwise the connection
    /// closes with [`Error::HandshakeTimeout`].
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] unless the connection is `Idle`
    /// - [`Error::Config`] if the channel URL is invalid
    /// - [`Error::Connection`] if called outside a tokio runtime
    pub fn open(&self, credentials: Option<Credentials>) -> Result<()> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::connection(format!("no tokio runtime: {e}")))?;

        let (url, command_rx) = {
            let mut shared = self.inner.shared.lock();
            if shared.state != ConnectionState::Idle {
                return Err(Error::invalid_state("open", shared.state));
            }
            if let Some(credentials) = credentials {
                shared.session.apply(credentials);
            }
            let url = shared.session.channel_url()?;

            let (command_tx, command_rx) = mpsc::unbounded_channel();
            shared.commands = Some(command_tx);
            shared.runtime = Some(runtime.clone());
            shared.state = ConnectionState::Connecting;
            (url, command_rx)
        };
        self.publish_state();

        info!(uuid = %self.inner.uuid, %url, "Opening data channel");

        let deadline = Instant::now() + self.inner.open_timeout;
        runtime.spawn(self.clone().run_event_loop(url, command_rx, deadline));
        Ok(())
    }

    /// Closes the connection.
    ///
    /// Idempotent. Pending calls are discarded without running their
    /// callbacks, `close` is emitted once, then every listener is removed.
    pub fn close(&self) {
        let finish_now = {
            let mut shared = self.inner.shared.lock();
            match shared.state {
                ConnectionState::Closing | ConnectionState::Closed => return,
                ConnectionState::Idle => {
                    shared.state = ConnectionState::Closing;
                    true
                }
                ConnectionState::Connecting | ConnectionState::Open => {
                    shared.state = ConnectionState::Closing;
                    false
                }
            }
        };
        self.publish_state();

        info!(uuid = %self.inner.uuid, "Close client");

        if finish_now {
            self.finish();
        } else {
            self.inner.shutdown.notify_one();
        }
    }

    /// Reports a fatal error: emits `error`, then closes.
    ///
    /// The first error is kept and available from [`last_error`](Self::last_error).
    pub fn error(&self, err: Error) {
        error!(uuid = %self.inner.uuid, error = %err, "Connection error");

        let err = Arc::new(err);
        {
            let mut shared = self.inner.shared.lock();
            if shared.state == ConnectionState::Closed {
                debug!("Error after close ignored");
                return;
            }
            if shared.last_error.is_none() {
                shared.last_error = Some(Arc::clone(&err));
            }
        }

        self.emit_local(&Event::new(EVENT_ERROR, self.clone()).with_error(err));
        self.close();
    }

    /// Waits until the handshake completed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the connection closes first.
    pub async fn opened(&self) -> Result<()> {
        let mut state_rx = self.inner.state_tx.subscribe();
        let state = *state_rx
            .wait_for(|state| *state == ConnectionState::Open || state.is_closing())
            .await
            .map_err(|_| Error::ConnectionClosed)?;

        match state {
            ConnectionState::Open => Ok(()),
            _ => Err(Error::ConnectionClosed),
        }
    }

    /// Waits until the connection reached `Closed`.
    pub async fn closed(&self) {
        let mut state_rx = self.inner.state_tx.subscribe();
        let _ = state_rx
            .wait_for(|state| *state == ConnectionState::Closed)
            .await;
    }

    /// Runs the close sequence. Only the first call has an effect.
    fn finish(&self) {
        let dropped = {
            let mut shared = self.inner.shared.lock();
            if shared.state == ConnectionState::Closed {
                return;
            }
            shared.state = ConnectionState::Closed;
            shared.session.id = None;
            shared.commands = None;
            shared.runtime = None;
            shared.correlation.drain()
        };

        if !dropped.is_empty() {
            debug!(count = dropped.len(), "Discarded pending calls");
        }
        drop(dropped);

        self.emit_local(&Event::new(EVENT_CLOSE, self.clone()));
        self.inner.bus.remove_all(None);
        self.publish_state();

        info!(uuid = %self.inner.uuid, "Connection closed");
    }

    /// Mirrors the current state to waiters.
    fn publish_state(&self) {
        let state = self.inner.shared.lock().state;
        self.inner.state_tx.send_replace(state);
    }
}

// ============================================================================
// Connection - Outbound
// ============================================================================

impl Connection {
    /// Sends a `message` notification.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if both `opts` and `data` are empty
    /// - [`Error::InvalidState`] unless connecting or open
    pub fn send(&self, opts: Option<Map<String, Value>>, data: Value) -> Result<()> {
        let envelope = message_envelope(opts, data)?;
        self.transmit("send", envelope, None).map(|_| ())
    }

    /// Sends a `message` call; `callback` receives the reply.
    ///
    /// Returns the minted event id.
    ///
    /// # Errors
    ///
    /// Same as [`send`](Self::send).
    pub fn send_with_callback<F>(
        &self,
        opts: Option<Map<String, Value>>,
        data: Value,
        callback: F,
    ) -> Result<EventId>
    where
        F: FnOnce(Reply) + Send + 'static,
    {
        let envelope = message_envelope(opts, data)?;
        let event_id = self.transmit_call("send", envelope, Box::new(callback))?;
        self.schedule_expiry(event_id);
        Ok(event_id)
    }

    /// Sends a `message` call and waits for the reply.
    ///
    /// # Errors
    ///
    /// - Same as [`send`](Self::send)
    /// - [`Error::RequestTimeout`] if a call timeout is configured and passes
    /// - [`Error::ConnectionClosed`] if the connection closes first
    pub async fn send_call(&self, opts: Option<Map<String, Value>>, data: Value) -> Result<Reply> {
        let envelope = message_envelope(opts, data)?;
        let (reply_tx, reply_rx) = oneshot::channel();
        let event_id = self.transmit_call(
            "send",
            envelope,
            Box::new(move |reply| {
                let _ = reply_tx.send(reply);
            }),
        )?;
        self.await_reply(event_id, reply_rx).await
    }

    /// Emits `event` to the peer, or to local listeners if it is reserved.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `event` is empty
    /// - [`Error::InvalidState`] unless connecting or open (remote events)
    pub fn emit(&self, event: &str, args: Vec<Value>) -> Result<()> {
        validate_event(event)?;

        if protocol::is_builtin(event) {
            self.emit_local(&Event::new(event, self.clone()).with_args(args));
            return Ok(());
        }

        let envelope = Envelope::send(event).with_data(args_payload(args));
        self.transmit("emit", envelope, None).map(|_| ())
    }

    /// Calls `event` on the peer; `callback` receives the reply.
    ///
    /// Returns the minted event id.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `event` is empty or reserved
    /// - [`Error::InvalidState`] unless connecting or open
    pub fn emit_with_callback<F>(&self, event: &str, args: Vec<Value>, callback: F) -> Result<EventId>
    where
        F: FnOnce(Reply) + Send + 'static,
    {
        let envelope = call_envelope(event, args)?;
        let event_id = self.transmit_call("emit", envelope, Box::new(callback))?;
        self.schedule_expiry(event_id);
        Ok(event_id)
    }

    /// Calls `event` on the peer and waits for the reply.
    ///
    /// # Errors
    ///
    /// - Same as [`emit_with_callback`](Self::emit_with_callback)
    /// - [`Error::RequestTimeout`] if a call timeout is configured and passes
    /// - [`Error::ConnectionClosed`] if the connection closes first
    pub async fn call(&self, event: &str, args: Vec<Value>) -> Result<Reply> {
        let envelope = call_envelope(event, args)?;
        let (reply_tx, reply_rx) = oneshot::channel();
        let event_id = self.transmit_call(
            "call",
            envelope,
            Box::new(move |reply| {
                let _ = reply_tx.send(reply);
            }),
        )?;
        self.await_reply(event_id, reply_rx).await
    }

    /// Sends the REPLY for an inbound CALL.
    pub(crate) fn send_reply(
        &self,
        event: &str,
        event_id: EventId,
        opts: Option<Map<String, Value>>,
        data: Option<Value>,
    ) -> Result<()> {
        let envelope = Envelope::reply(event, event_id)
            .with_opts(opts)
            .with_data(data.filter(|d| !d.is_null()));
        self.transmit("reply", envelope, None).map(|_| ())
    }

    fn transmit_call(
        &self,
        operation: &'static str,
        envelope: Envelope,
        callback: PendingCall,
    ) -> Result<EventId> {
        self.transmit(operation, envelope, Some(callback))?
            .ok_or_else(|| Error::protocol("call was not registered"))
    }

    /// Stamps, encodes and queues one envelope.
    ///
    /// With a callback the envelope becomes a CALL: a fresh event id is
    /// minted and the callback registered before the lock is released, so
    /// the reply cannot overtake the registration.
    fn transmit(
        &self,
        operation: &'static str,
        mut envelope: Envelope,
        callback: Option<PendingCall>,
    ) -> Result<Option<EventId>> {
        let mut shared = self.inner.shared.lock();
        if !shared.state.can_send() {
            return Err(Error::invalid_state(operation, shared.state));
        }
        let commands = shared.commands.clone().ok_or(Error::ConnectionClosed)?;

        envelope.id = shared.session.id.clone();

        let Some(callback) = callback else {
            let frame = protocol::encode(&envelope)?;
            commands
                .send(ChannelCommand::Send(frame))
                .map_err(|_| Error::ConnectionClosed)?;
            trace!(event = %envelope.event, kind = %envelope.kind, "Message queued");
            return Ok(None);
        };

        if shared.correlation.len() >= MAX_PENDING_CALLS {
            warn!(
                pending = shared.correlation.len(),
                max = MAX_PENDING_CALLS,
                "Too many pending calls"
            );
            return Err(Error::protocol(format!(
                "Too many pending calls: {}/{MAX_PENDING_CALLS}",
                shared.correlation.len()
            )));
        }

        let event_id = shared.correlation.next_event_id();
        envelope.kind = MessageType::Call;
        envelope.event_id = Some(event_id);

        if !shared.correlation.register(event_id, callback) {
            return Err(Error::protocol(format!("Event id {event_id} already pending")));
        }

        let queued = protocol::encode(&envelope).and_then(|frame| {
            commands
                .send(ChannelCommand::Send(frame))
                .map_err(|_| Error::ConnectionClosed)
        });
        if let Err(e) = queued {
            shared.correlation.remove(event_id);
            return Err(e);
        }

        trace!(event = %envelope.event, %event_id, "Call queued");
        Ok(Some(event_id))
    }

    /// Drops the callback of `event_id` once the call timeout passes.
    fn schedule_expiry(&self, event_id: EventId) {
        let Some(limit) = self.inner.call_timeout else {
            return;
        };
        let (commands, runtime) = {
            let shared = self.inner.shared.lock();
            (shared.commands.clone(), shared.runtime.clone())
        };
        let (Some(commands), Some(runtime)) = (commands, runtime) else {
            return;
        };

        runtime.spawn(async move {
            sleep(limit).await;
            let _ = commands.send(ChannelCommand::RemoveCorrelation(event_id));
        });
    }

    async fn await_reply(&self, event_id: EventId, reply_rx: oneshot::Receiver<Reply>) -> Result<Reply> {
        let Some(limit) = self.inner.call_timeout else {
            return reply_rx.await.map_err(|_| Error::ConnectionClosed);
        };

        match timeout(limit, reply_rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                self.inner.shared.lock().correlation.remove(event_id);
                Err(Error::request_timeout(
                    event_id,
                    u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                ))
            }
        }
    }
}

// ============================================================================
// Connection - Event Loop
// ============================================================================

impl Connection {
    async fn run_event_loop(
        self,
        url: String,
        mut command_rx: mpsc::UnboundedReceiver<ChannelCommand>,
        deadline: Instant,
    ) {
        let connector = Arc::clone(&self.inner.connector);

        let transport = tokio::select! {
            biased;

            () = self.inner.shutdown.notified() => None,

            () = sleep_until(deadline) => {
                self.error(Error::handshake_timeout(self.open_timeout_ms()));
                None
            }

            result = connector.connect(&url) => match result {
                Ok(pair) => Some(pair),
                Err(e) => {
                    self.error(e);
                    None
                }
            },
        };

        if let Some((mut sink, mut stream)) = transport {
            info!(uuid = %self.inner.uuid, "Data channel connect success");

            self.pump(sink.as_mut(), stream.as_mut(), &mut command_rx, deadline)
                .await;

            if let Err(e) = sink.close().await {
                debug!(error = %e, "Transport close failed");
            }
        }

        self.finish();
        debug!(uuid = %self.inner.uuid, "Event loop terminated");
    }

    async fn pump(
        &self,
        sink: &mut dyn FrameSink,
        stream: &mut dyn FrameStream,
        command_rx: &mut mpsc::UnboundedReceiver<ChannelCommand>,
        deadline: Instant,
    ) {
        loop {
            let state = self.state();
            if state.is_closing() {
                break;
            }
            let awaiting_handshake = state == ConnectionState::Connecting;

            tokio::select! {
                biased;

                () = self.inner.shutdown.notified() => {
                    debug!("Shutdown requested");
                    break;
                }

                () = sleep_until(deadline), if awaiting_handshake => {
                    self.error(Error::handshake_timeout(self.open_timeout_ms()));
                }

                command = command_rx.recv() => {
                    match command {
                        Some(ChannelCommand::Send(frame)) => {
                            trace!(%frame, "Frame out");
                            if let Err(e) = sink.send_text(frame).await {
                                warn!(error = %e, "Failed to send frame");
                                self.close();
                            }
                        }

                        Some(ChannelCommand::RemoveCorrelation(event_id)) => {
                            if self.inner.shared.lock().correlation.remove(event_id) {
                                debug!(%event_id, "Removed expired call");
                            }
                        }

                        None => {
                            debug!("Command channel closed");
                            break;
                        }
                    }
                }

                frame = stream.next_frame() => {
                    match frame {
                        Some(Ok(text)) => self.handle_frame(&text),

                        Some(Err(e)) => {
                            warn!(error = %e, "Transport error");
                            self.close();
                        }

                        None => {
                            debug!("Transport closed by remote");
                            self.close();
                            break;
                        }
                    }
                }
            }
        }
    }

    fn open_timeout_ms(&self) -> u64 {
        u64::try_from(self.inner.open_timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

// ============================================================================
// Connection - Inbound
// ============================================================================

impl Connection {
    /// Routes one inbound frame.
    ///
    /// Control events are recognized by name alone. Everything else must
    /// be a valid envelope carrying the session id.
    fn handle_frame(&self, frame: &str) {
        if self.state().is_closing() {
            trace!("Frame after close dropped");
            return;
        }
        trace!(%frame, "Frame in");

        let mut value = match protocol::parse(frame) {
            Ok(value) => value,
            Err(e) => {
                self.error(e);
                return;
            }
        };

        let event = protocol::event_name(&value).map(str::to_owned);
        match event.as_deref() {
            Some(EVENT_HANDSHAKE) => self.on_handshake(&value),
            Some(EVENT_OPEN) => self.on_remote_open(),
            Some(EVENT_CLOSE) => {
                debug!("Close requested by remote");
                self.close();
            }
            Some(EVENT_DATA) => {
                let opts = match take_field(&mut value, "opts") {
                    Some(Value::Object(opts)) => Some(opts),
                    _ => None,
                };
                let args = take_field(&mut value, "data").into_iter().collect();
                self.emit_local(
                    &Event::new(EVENT_DATA, self.clone())
                        .with_opts(opts)
                        .with_args(args),
                );
            }
            _ => match Envelope::from_value(value) {
                Ok(envelope) => self.on_message(envelope),
                Err(e) => debug!(error = %e, "Message invalid"),
            },
        }
    }

    fn on_handshake(&self, value: &Value) {
        let id = value
            .get("id")
            .and_then(SessionId::from_value)
            .or_else(|| match value.get("data") {
                Some(Value::Array(items)) => items.first().and_then(SessionId::from_value),
                Some(data) => SessionId::from_value(data),
                None => None,
            });

        let Some(id) = id else {
            warn!("Handshake without session id");
            return;
        };

        let (path, opened) = {
            let mut shared = self.inner.shared.lock();
            let opened = shared.state == ConnectionState::Connecting;
            if opened {
                shared.state = ConnectionState::Open;
            }
            let path = shared.session.playback_path(&id);
            shared.session.id = Some(id.clone());
            (path, opened)
        };

        info!(uuid = %self.inner.uuid, session_id = %id, %path, "Handshake completed");

        self.emit_local(
            &Event::new(EVENT_HANDSHAKE, self.clone()).with_args(vec![Value::String(path)]),
        );
        // A shakeHandle listener may already have closed the channel.
        if opened && self.state() == ConnectionState::Open {
            self.emit_local(&Event::new(EVENT_OPEN, self.clone()));
        }
        self.publish_state();
    }

    fn on_remote_open(&self) {
        let opened = {
            let mut shared = self.inner.shared.lock();
            let opened = shared.state == ConnectionState::Connecting;
            if opened {
                shared.state = ConnectionState::Open;
            }
            opened
        };

        if !opened {
            debug!("Duplicate open ignored");
            return;
        }

        self.emit_local(&Event::new(EVENT_OPEN, self.clone()));
        self.publish_state();
    }

    fn on_message(&self, envelope: Envelope) {
        if envelope.id.is_none() {
            debug!(event = %envelope.event, "Message invalid: no session id");
            return;
        }

        match (envelope.kind, envelope.event_id) {
            (MessageType::Send, _) => {
                self.emit_local(&Event::from_envelope(self.clone(), envelope, None));
            }

            (MessageType::Call, Some(event_id)) => {
                let token = ReplyToken::new(self.clone(), envelope.event.clone(), event_id);
                let event = Event::from_envelope(self.clone(), envelope, Some(token));
                if !self.emit_local(&event) {
                    debug!(event = %event.name(), %event_id, "No listener for call");
                }
            }

            (MessageType::Reply, Some(event_id)) => {
                let callback = {
                    let mut shared = self.inner.shared.lock();
                    if shared.state.is_closing() {
                        trace!(%event_id, "Reply after close dropped");
                        return;
                    }
                    shared.correlation.take(event_id)
                };
                match callback {
                    Some(callback) => {
                        callback(Reply::from_envelope(self.clone(), event_id, envelope));
                    }
                    None => debug!(%event_id, "Reply event invalid"),
                }
            }

            (kind, None) => debug!(%kind, "Message invalid: no eventId"),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn validate_event(event: &str) -> Result<()> {
    if event.is_empty() {
        return Err(Error::invalid_argument("event name is empty"));
    }
    Ok(())
}

fn message_envelope(opts: Option<Map<String, Value>>, data: Value) -> Result<Envelope> {
    if opts.is_none() && data.is_null() {
        return Err(Error::invalid_argument("message needs opts or data"));
    }
    let data = (!data.is_null()).then_some(data);
    Ok(Envelope::send(EVENT_MESSAGE).with_opts(opts).with_data(data))
}

fn call_envelope(event: &str, args: Vec<Value>) -> Result<Envelope> {
    validate_event(event)?;
    if protocol::is_builtin(event) {
        return Err(Error::invalid_argument(format!(
            "reserved event {event:?} cannot be called"
        )));
    }
    Ok(Envelope::send(event).with_data(args_payload(args)))
}

/// Packs positional arguments; no arguments means no payload.
fn args_payload(args: Vec<Value>) -> Option<Value> {
    (!args.is_empty()).then_some(Value::Array(args))
}

fn take_field(value: &mut Value, key: &str) -> Option<Value> {
    value
        .as_object_mut()?
        .remove(key)
        .filter(|v| !v.is_null())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use crate::transport::{MemoryConnector, MemoryPeer};

    fn memory_connection() -> (Connection, MemoryPeer) {
        let (connector, peer) = MemoryConnector::pair();
        let connection = Connection::builder()
            .origin("ws://cam:7000")
            .path("/live/cam-1")
            .connector(connector)
            .build()
            .expect("build");
        (connection, peer)
    }

    async fn open_with_session(connection: &Connection, peer: &mut MemoryPeer, id: &str) {
        connection.open(None).expect("open");
        peer.connected().await.expect("connected");
        peer.send_raw(json!({"id": id, "type": 1, "event": "shakeHandle"}).to_string())
            .expect("handshake");
        connection.opened().await.expect("opened");
    }

    fn counter(connection: &Connection, event: &str) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        connection.on(event, move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        count
    }

    fn channel_of(
        connection: &Connection,
        event: &str,
    ) -> mpsc::UnboundedReceiver<(Option<Map<String, Value>>, Vec<Value>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        connection.on(event, move |e| {
            let _ = tx.send((e.opts().cloned(), e.args().to_vec()));
        });
        rx
    }

    #[tokio::test]
    async fn test_open_connects_to_channel_url() {
        let (connection, mut peer) = memory_connection();
        connection
            .open(Some(Credentials::new("t", "s")))
            .expect("open");

        let url = peer.connected().await.expect("connected");
        assert_eq!(url, "ws://cam:7000/live/cam-1.media?edger-token=t&&edger-srand=s");
        assert_eq!(connection.state(), ConnectionState::Connecting);
    }

    #[tokio::test]
    async fn test_handshake_emits_path_then_open() {
        let (connection, mut peer) = memory_connection();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_clone = Arc::clone(&seen);
        connection.on("shakeHandle", move |e| {
            seen_clone
                .lock()
                .push(format!("shakeHandle:{}", e.path().unwrap_or_default()));
        });
        let seen_clone = Arc::clone(&seen);
        connection.on("open", move |_| seen_clone.lock().push("open".to_string()));

        connection.open(None).expect("open");
        peer.connected().await.expect("connected");
        // Handshake frames need no type field.
        peer.send_raw(r#"{"event":"shakeHandle","data":"abc"}"#)
            .expect("handshake");
        connection.opened().await.expect("opened");

        assert_eq!(
            *seen.lock(),
            vec!["shakeHandle:/live/cam-1?id=abc".to_string(), "open".to_string()]
        );
        assert_eq!(connection.session_id(), Some(SessionId::from("abc")));
        assert_eq!(connection.playback_path().as_deref(), Some("/live/cam-1?id=abc"));
    }

    #[tokio::test]
    async fn test_close_in_handshake_listener_skips_open() {
        let (connection, mut peer) = memory_connection();
        let opens = counter(&connection, "open");
        let closes = counter(&connection, "close");
        connection.on("shakeHandle", |e| {
            e.connection().close();
        });

        connection.open(None).expect("open");
        peer.connected().await.expect("connected");
        peer.send_raw(json!({"id": "abc", "type": 1, "event": "shakeHandle"}).to_string())
            .expect("handshake");
        connection.closed().await;

        assert_eq!(opens.load(Ordering::SeqCst), 0);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert_eq!(connection.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_opened_pending_until_handshake() {
        let (connection, mut peer) = memory_connection();
        connection.open(None).expect("open");
        peer.connected().await.expect("connected");

        let mut opened = tokio_test::task::spawn(connection.opened());
        tokio_test::assert_pending!(opened.poll());

        peer.send_raw(json!({"id": "abc", "type": 1, "event": "shakeHandle"}).to_string())
            .expect("handshake");
        connection.opened().await.expect("opened");

        tokio_test::assert_ready_ok!(opened.poll());
    }

    #[tokio::test]
    async fn test_handshake_path_keeps_query() {
        let (connection, mut peer) = memory_connection();
        let mut paths = channel_of(&connection, "shakeHandle");

        connection
            .open(Some(Credentials::new("t", "s")))
            .expect("open");
        peer.connected().await.expect("connected");
        peer.send_raw(json!({"id": "abc", "type": 1, "event": "shakeHandle"}).to_string())
            .expect("handshake");

        let (_, args) = paths.recv().await.expect("shakeHandle");
        assert_eq!(args, vec![json!("/live/cam-1?edger-token=t&&edger-srand=s&&id=abc")]);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (connection, mut peer) = memory_connection();
        let closes = counter(&connection, "close");
        open_with_session(&connection, &mut peer, "abc").await;

        connection.close();
        connection.close();
        connection.closed().await;
        connection.close();

        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert_eq!(connection.state(), ConnectionState::Closed);
        assert!(connection.session_id().is_none());
        assert_eq!(connection.listener_count("close"), 0);
        assert!(peer.recv_envelope().await.is_none());
    }

    #[tokio::test]
    async fn test_close_discards_pending_calls() {
        let (connection, mut peer) = memory_connection();
        open_with_session(&connection, &mut peer, "abc").await;

        let invoked = Arc::new(AtomicUsize::new(0));
        let invoked_clone = Arc::clone(&invoked);
        connection
            .emit_with_callback("camera-home", vec![], move |_| {
                invoked_clone.fetch_add(1, Ordering::SeqCst);
            })
            .expect("call");
        assert_eq!(connection.pending_calls(), 1);

        connection.close();
        connection.closed().await;

        assert_eq!(connection.pending_calls(), 0);
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_close_fails_awaited_call() {
        let (connection, mut peer) = memory_connection();
        open_with_session(&connection, &mut peer, "abc").await;

        let (reply, ()) = tokio::join!(connection.call("camera-home", vec![]), async {
            peer.recv_envelope().await.expect("call frame");
            connection.close();
        });

        assert!(matches!(reply, Err(Error::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_reply_after_close_is_dropped() {
        let (connection, mut peer) = memory_connection();
        open_with_session(&connection, &mut peer, "abc").await;

        let invoked = Arc::new(AtomicUsize::new(0));
        let invoked_clone = Arc::clone(&invoked);
        let event_id = connection
            .emit_with_callback("camera-home", vec![], move |_| {
                invoked_clone.fetch_add(1, Ordering::SeqCst);
            })
            .expect("call");

        connection.inner.shared.lock().state = ConnectionState::Closing;
        connection.on_message(
            Envelope::reply("camera-home", event_id).with_id(Some(SessionId::from("abc"))),
        );

        assert_eq!(invoked.load(Ordering::SeqCst), 0);
        assert_eq!(connection.pending_calls(), 1);

        connection.inner.shared.lock().state = ConnectionState::Open;
        connection.close();
        connection.closed().await;
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_call_with_taken_event_id_is_rejected() {
        let (connection, mut peer) = memory_connection();
        open_with_session(&connection, &mut peer, "abc").await;

        assert!(connection
            .inner
            .shared
            .lock()
            .correlation
            .register(EventId::new(1), |_| {}));

        let err = connection
            .emit_with_callback("camera-home", vec![], |_| {})
            .expect_err("duplicate id");
        assert!(matches!(err, Error::Protocol { .. }));
        assert_eq!(connection.pending_calls(), 1);

        let event_id = connection
            .emit_with_callback("camera-stop", vec![], |_| {})
            .expect("call");
        assert_eq!(event_id, EventId::new(2));

        // Only the accepted call reaches the wire.
        let call = peer.recv_envelope().await.expect("call frame");
        assert_eq!(call.event, "camera-stop");
        assert_eq!(call.event_id, Some(event_id));
    }

    #[tokio::test]
    async fn test_call_before_handshake_resolves_after() {
        let (connection, mut peer) = memory_connection();
        connection.open(None).expect("open");
        peer.connected().await.expect("connected");

        let (reply_tx, reply_rx) = oneshot::channel();
        let event_id = connection
            .emit_with_callback("camera-home", vec![], move |reply| {
                let _ = reply_tx.send(reply);
            })
            .expect("call");
        assert_eq!(event_id.as_u64(), 1);

        let call = peer.recv_envelope().await.expect("call frame");
        assert_eq!(call.kind, MessageType::Call);
        assert_eq!(call.event_id, Some(event_id));
        assert!(call.id.is_none());

        peer.send_raw(json!({"id": "abc", "type": 1, "event": "shakeHandle"}).to_string())
            .expect("handshake");
        peer.send(
            &Envelope::reply("camera-home", event_id)
                .with_id(Some(SessionId::from("abc")))
                .with_data(Some(json!([{"result": true, "msg": "ok"}]))),
        )
        .expect("reply");

        let reply = reply_rx.await.expect("reply");
        assert_eq!(reply.event(), "camera-home");
        assert_eq!(reply.arg(0), Some(&json!({"result": true, "msg": "ok"})));
        assert_eq!(connection.pending_calls(), 0);
    }

    #[tokio::test]
    async fn test_async_call_round_trip() {
        let (connection, mut peer) = memory_connection();
        open_with_session(&connection, &mut peer, "abc").await;

        let (reply, ()) = tokio::join!(connection.call("camera-ai", vec![json!(true)]), async {
            let call = peer.recv_envelope().await.expect("call frame");
            assert_eq!(call.id, Some(SessionId::from("abc")));
            assert_eq!(call.data, Some(json!([true])));
            let event_id = call.event_id.expect("event id");
            peer.send(
                &Envelope::reply("camera-ai", event_id)
                    .with_id(call.id.clone())
                    .with_data(Some(json!([true]))),
            )
            .expect("reply");
        });

        let reply = reply.expect("reply");
        assert!(reply.arg_as::<bool>(0).expect("bool"));
    }

    #[tokio::test]
    async fn test_message_call_reply_has_opts() {
        let (connection, mut peer) = memory_connection();
        open_with_session(&connection, &mut peer, "abc").await;

        let (reply, ()) = tokio::join!(connection.send_call(None, json!("ping")), async {
            let call = peer.recv_envelope().await.expect("call frame");
            assert_eq!(call.event, "message");
            assert_eq!(call.data, Some(json!("ping")));
            peer.send(
                &Envelope::reply("message", call.event_id.expect("event id"))
                    .with_id(call.id.clone())
                    .with_data(Some(json!(["pong", 1]))),
            )
            .expect("reply");
        });

        let reply = reply.expect("reply");
        assert_eq!(reply.opts(), Some(&Map::new()));
        assert_eq!(reply.args(), &[json!(["pong", 1])]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_timeout() {
        let (connector, mut peer) = MemoryConnector::pair();
        let connection = Connection::builder()
            .origin("ws://cam")
            .call_timeout(Duration::from_millis(100))
            .connector(connector)
            .build()
            .expect("build");
        open_with_session(&connection, &mut peer, "abc").await;

        let err = connection.call("camera-home", vec![]).await.unwrap_err();
        assert!(matches!(err, Error::RequestTimeout { timeout_ms: 100, .. }));
        assert_eq!(connection.pending_calls(), 0);
        assert_eq!(connection.state(), ConnectionState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handshake_timeout() {
        let (connector, mut peer) = MemoryConnector::pair();
        let connection = Connection::builder()
            .origin("ws://cam")
            .open_timeout(Duration::from_secs(1))
            .connector(connector)
            .build()
            .expect("build");
        let errors = counter(&connection, "error");
        let closes = counter(&connection, "close");

        connection.open(None).expect("open");
        peer.connected().await.expect("connected");
        connection.closed().await;

        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        let err = connection.last_error().expect("error kept");
        assert!(matches!(*err, Error::HandshakeTimeout { timeout_ms: 1000 }));
    }

    #[tokio::test]
    async fn test_decode_error_is_fatal() {
        let (connection, mut peer) = memory_connection();
        open_with_session(&connection, &mut peer, "abc").await;

        peer.send_raw("{not json").expect("frame");
        connection.closed().await;

        let err = connection.last_error().expect("error kept");
        assert!(matches!(*err, Error::Decode { .. }));
    }

    #[tokio::test]
    async fn test_invalid_message_is_dropped() {
        let (connection, mut peer) = memory_connection();
        open_with_session(&connection, &mut peer, "abc").await;
        let mut pings = channel_of(&connection, "ping");

        peer.send_raw(r#"{"id":"abc","type":9,"event":"ping"}"#)
            .expect("bad type");
        peer.send_raw(r#"{"type":1,"event":"ping","data":["no id"]}"#)
            .expect("no id");
        peer.send_raw(r#"{"id":"abc","type":3,"event":"ping","eventId":99}"#)
            .expect("stray reply");
        peer.send_raw(r#"{"id":"abc","type":1,"event":"ping","data":["ok"]}"#)
            .expect("valid");

        let (_, args) = pings.recv().await.expect("ping");
        assert_eq!(args, vec![json!("ok")]);
        assert_eq!(connection.state(), ConnectionState::Open);
        assert!(connection.last_error().is_none());
    }

    #[tokio::test]
    async fn test_message_event_keeps_payload_whole() {
        let (connection, mut peer) = memory_connection();
        open_with_session(&connection, &mut peer, "abc").await;
        let mut messages = channel_of(&connection, "message");

        peer.send_raw(
            json!({"id": "abc", "type": 1, "event": "message", "opts": {"k": "v"}, "data": [1, 2]})
                .to_string(),
        )
        .expect("message");

        let (opts, args) = messages.recv().await.expect("message");
        assert_eq!(opts, json!({"k": "v"}).as_object().cloned());
        assert_eq!(args, vec![json!([1, 2])]);
    }

    #[tokio::test]
    async fn test_data_event_routed_without_type() {
        let (connection, mut peer) = memory_connection();
        open_with_session(&connection, &mut peer, "abc").await;
        let mut data = channel_of(&connection, "data");

        peer.send_raw(r#"{"event":"data","opts":{"type":"face"},"data":[{"id":0}]}"#)
            .expect("data");

        let (opts, args) = data.recv().await.expect("data");
        assert_eq!(
            opts.as_ref().and_then(|o| o.get("type")),
            Some(&json!("face"))
        );
        assert_eq!(args, vec![json!([{"id": 0}])]);
    }

    #[tokio::test]
    async fn test_inbound_call_replied_once() {
        let (connection, mut peer) = memory_connection();
        open_with_session(&connection, &mut peer, "abc").await;

        let second = Arc::new(Mutex::new(None));
        let second_clone = Arc::clone(&second);
        connection.on("camera-sync", move |e| {
            assert!(e.is_call());
            assert!(e.reply(vec![json!("ok")]).expect("reply"));
            *second_clone.lock() = Some(e.reply(vec![json!("again")]).expect("reply"));
        });

        peer.send_raw(
            json!({"id": "abc", "type": 2, "event": "camera-sync", "eventId": 7, "data": [{}]})
                .to_string(),
        )
        .expect("call");

        let reply = peer.recv_envelope().await.expect("reply frame");
        assert_eq!(reply.kind, MessageType::Reply);
        assert_eq!(reply.event_id, Some(EventId::new(7)));
        assert_eq!(reply.data, Some(json!(["ok"])));
        assert_eq!(*second.lock(), Some(false));

        connection.close();
        assert!(peer.recv_envelope().await.is_none());
    }

    #[tokio::test]
    async fn test_message_reply_splits_opts_and_data() {
        let (connection, mut peer) = memory_connection();
        open_with_session(&connection, &mut peer, "abc").await;

        connection.on("message", |e| {
            let token = e.reply_token().expect("call token");
            let replied = match e.args().first().and_then(Value::as_str) {
                Some("one") => token.reply(vec![json!("d")]),
                Some("two") => token.reply(vec![json!({"k": 1}), json!("d")]),
                Some("scalar") => token.reply(vec![json!("k"), json!("d")]),
                _ => {
                    let mut opts = Map::new();
                    opts.insert("k".to_string(), json!(2));
                    token.reply_message(Some(opts), json!({"ok": true}))
                }
            };
            assert!(replied.expect("reply"));
        });

        let cases = [
            ("one", None, json!("d")),
            ("two", Some(json!({"k": 1})), json!("d")),
            ("scalar", None, json!("d")),
            ("explicit", Some(json!({"k": 2})), json!({"ok": true})),
        ];
        for (event_id, (payload, opts, data)) in (1u64..).zip(cases) {
            peer.send_raw(
                json!({"id": "abc", "type": 2, "event": "message", "eventId": event_id, "data": payload})
                    .to_string(),
            )
            .expect("call");

            let reply = peer.recv_envelope().await.expect("reply frame");
            assert_eq!(reply.kind, MessageType::Reply);
            assert_eq!(reply.event, "message");
            assert_eq!(reply.event_id, Some(EventId::new(event_id)));
            assert_eq!(reply.id, Some(SessionId::from("abc")));
            assert_eq!(reply.opts.map(Value::Object), opts, "{payload}");
            assert_eq!(reply.data, Some(data), "{payload}");
        }
    }

    #[tokio::test]
    async fn test_remote_close() {
        let (connection, mut peer) = memory_connection();
        let closes = counter(&connection, "close");
        open_with_session(&connection, &mut peer, "abc").await;

        peer.close();
        connection.closed().await;

        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(connection.last_error().is_none());
    }

    #[tokio::test]
    async fn test_remote_close_event() {
        let (connection, mut peer) = memory_connection();
        open_with_session(&connection, &mut peer, "abc").await;

        peer.send_raw(r#"{"event":"close"}"#).expect("close");
        connection.closed().await;
        assert_eq!(connection.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_remote_open_completes_connecting() {
        let (connection, mut peer) = memory_connection();
        let opens = counter(&connection, "open");
        let mut paths = channel_of(&connection, "shakeHandle");
        connection.open(None).expect("open");
        peer.connected().await.expect("connected");

        peer.send_raw(r#"{"event":"open"}"#).expect("open");
        connection.opened().await.expect("opened");
        assert!(connection.session_id().is_none());

        peer.send_raw(r#"{"event":"open"}"#).expect("open again");
        peer.send_raw(json!({"id": "abc", "type": 1, "event": "shakeHandle"}).to_string())
            .expect("handshake");

        let (_, args) = paths.recv().await.expect("shakeHandle");
        assert_eq!(args, vec![json!("/live/cam-1?id=abc")]);
        assert_eq!(opens.load(Ordering::SeqCst), 1);
        assert_eq!(connection.session_id(), Some(SessionId::from("abc")));
    }

    #[tokio::test]
    async fn test_emit_sends_spread_arguments() {
        let (connection, mut peer) = memory_connection();
        open_with_session(&connection, &mut peer, "abc").await;

        connection
            .emit("camera-move", vec![json!({"x": 1, "y": -1})])
            .expect("emit");
        connection.emit("camera-stop", vec![]).expect("emit");

        let first = peer.recv_envelope().await.expect("frame");
        assert_eq!(first.kind, MessageType::Send);
        assert_eq!(first.event, "camera-move");
        assert_eq!(first.event_id, None);
        assert_eq!(first.data, Some(json!([{"x": 1, "y": -1}])));

        let second = peer.recv_envelope().await.expect("frame");
        assert_eq!(second.event, "camera-stop");
        assert!(second.data.is_none());
    }

    #[tokio::test]
    async fn test_event_ids_increase() {
        let (connection, mut peer) = memory_connection();
        open_with_session(&connection, &mut peer, "abc").await;

        let first = connection
            .emit_with_callback("a", vec![], |_| {})
            .expect("call");
        let second = connection
            .send_with_callback(None, json!("x"), |_| {})
            .expect("call");
        assert_eq!(first.as_u64(), 1);
        assert_eq!(second.as_u64(), 2);
    }

    #[test]
    fn test_emit_builtin_is_local() {
        let (connection, _peer) = memory_connection();
        let pauses = counter(&connection, "pause");

        connection.emit("pause", vec![]).expect("emit");
        assert_eq!(pauses.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_argument_validation() {
        let (connection, _peer) = memory_connection();

        assert!(matches!(
            connection.send(None, Value::Null),
            Err(Error::InvalidArgument { .. })
        ));
        assert!(matches!(
            connection.emit("", vec![]),
            Err(Error::InvalidArgument { .. })
        ));
        assert!(matches!(
            connection.emit_with_callback("open", vec![], |_| {}),
            Err(Error::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_send_requires_open_channel() {
        let (connection, _peer) = memory_connection();
        let err = connection.send(None, json!("x")).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidState {
                operation: "send",
                state: ConnectionState::Idle
            }
        ));
    }

    #[test]
    fn test_close_before_open() {
        let (connection, _peer) = memory_connection();
        let closes = counter(&connection, "close");

        connection.close();
        assert_eq!(connection.state(), ConnectionState::Closed);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_open_outside_runtime_fails() {
        let (connection, _peer) = memory_connection();
        assert!(matches!(
            connection.open(None),
            Err(Error::Connection { .. })
        ));
        assert_eq!(connection.state(), ConnectionState::Idle);
    }

    #[tokio::test]
    async fn test_closed_connection_cannot_reopen() {
        let (connection, mut peer) = memory_connection();
        open_with_session(&connection, &mut peer, "abc").await;
        assert!(matches!(
            connection.open(None),
            Err(Error::InvalidState { .. })
        ));

        connection.close();
        connection.closed().await;
        assert!(matches!(
            connection.open(None),
            Err(Error::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn test_connect_failure_reports_error() {
        let (connector, peer) = MemoryConnector::pair();
        drop(peer);
        let connection = Connection::builder()
            .origin("ws://cam")
            .connector(connector)
            .build()
            .expect("build");
        let errors = counter(&connection, "error");

        connection.open(None).expect("open");
        connection.closed().await;

        assert_eq!(errors.load(Ordering::SeqCst), 1);
        let err = connection.last_error().expect("error kept");
        assert!(err.is_connection_error());
    }

    #[tokio::test]
    async fn test_close_during_connect() {
        let (connection, peer) = memory_connection();
        connection.open(None).expect("open");
        connection.close();
        connection.closed().await;

        assert_eq!(connection.state(), ConnectionState::Closed);
        assert!(connection.last_error().is_none());
        assert!(connection.send(None, json!("late")).is_err());
        drop(peer);
    }
}
