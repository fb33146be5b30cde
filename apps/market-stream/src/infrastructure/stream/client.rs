//! Stream Client
//!
//! Owns the single WebSocket connection of one stream: connect and
//! authenticate, send subscribe/unsubscribe frames, run the listener loop,
//! and tear the connection down.
//!
//! # Lifecycle
//!
//! `Unconnected -> Connected -> Closed`. Transitions only move forward; a
//! closed client is not reused.
//!
//! # Concurrency
//!
//! The client is shared as `Arc<StreamClient>` between the listener task and
//! the controlling task. Every write (control frames, pongs, the close frame)
//! goes through one `tokio::sync::Mutex` around the write half. The read
//! half is taken out by the single listener.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::auth::{AUTH_TIMEOUT, AuthError, AuthHandler, AuthProgress, AuthStyle};
use super::codec::{CodecError, JsonCodec};
use super::messages::{ControlAction, ControlMessage};
use crate::application::ports::EventHandler;
use crate::domain::streaming::MarketEvent;
use crate::domain::subscription::{SubscriptionError, SymbolSelection};
use crate::infrastructure::config::{ConfigError, StreamConfig};
use crate::infrastructure::metrics::{self, ConnectOutcome};

/// Upper bound for sending the close frame and closing the sink.
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

// =============================================================================
// Error Type
// =============================================================================

/// Errors that can occur in the stream client.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Invalid subscription request.
    #[error("invalid subscription: {0}")]
    Subscription(#[from] SubscriptionError),

    /// Transport handshake failed.
    #[error("connection failed: {0}")]
    Connection(#[source] tungstenite::Error),

    /// Challenge/accept exchange failed.
    #[error("authentication failed: {0}")]
    Authentication(#[from] AuthError),

    /// Operation needs a connected client.
    #[error("not connected (state: {state})")]
    NotConnected {
        /// State at the time of the call
        state: ConnectionState,
    },

    /// `connect` called twice.
    #[error("already connected")]
    AlreadyConnected,

    /// Client was closed.
    #[error("client is closed")]
    Closed,

    /// Another listener holds the read half.
    #[error("a listener is already running")]
    ListenerActive,

    /// Writing a frame failed.
    #[error("send failed: {0}")]
    Send(#[source] tungstenite::Error),

    /// Listener loop ended abnormally.
    #[error("listen failed: {0}")]
    Listen(String),

    /// Close frame could not be delivered.
    #[error("close failed: {0}")]
    Close(String),

    /// Frame encoding or decoding failed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

// =============================================================================
// States
// =============================================================================

/// Lifecycle state of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// `connect` has not succeeded yet.
    Unconnected,
    /// Transport open and authenticated.
    Connected,
    /// Torn down, locally or by the server.
    Closed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Unconnected => "unconnected",
            Self::Connected => "connected",
            Self::Closed => "closed",
        })
    }
}

/// Why the listener returned without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenOutcome {
    /// `close` was called or the cancellation token fired.
    Cancelled,
    /// Server closed the connection normally.
    RemoteClosed,
}

// =============================================================================
// Stream Client
// =============================================================================

/// WebSocket client for one market data stream.
pub struct StreamClient {
    config: StreamConfig,
    codec: JsonCodec,
    state: Mutex<ConnectionState>,
    writer: tokio::sync::Mutex<Option<WsSink>>,
    reader: tokio::sync::Mutex<Option<WsSource>>,
    done: CancellationToken,
    closing: AtomicBool,
    discarded: AtomicU64,
}

impl std::fmt::Debug for StreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamClient")
            .field("url", &self.config.redacted_url())
            .field("state", &self.state())
            .field("discarded", &self.discarded_frames())
            .finish_non_exhaustive()
    }
}

impl StreamClient {
    /// Create an unconnected client.
    #[must_use]
    pub fn new(config: StreamConfig) -> Self {
        Self {
            config,
            codec: JsonCodec::new(),
            state: Mutex::new(ConnectionState::Unconnected),
            writer: tokio::sync::Mutex::new(None),
            reader: tokio::sync::Mutex::new(None),
            done: CancellationToken::new(),
            closing: AtomicBool::new(false),
            discarded: AtomicU64::new(0),
        }
    }

    /// Stream configuration.
    #[must_use]
    pub const fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Number of frames the listener could not decode.
    #[must_use]
    pub fn discarded_frames(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }

    // =========================================================================
    // Connection Manager
    // =========================================================================

    /// Open the connection and authenticate.
    ///
    /// Query credential connections are ready once the transport handshake
    /// succeeds. Challenge/accept connections additionally complete the
    /// `auth` exchange within [`AUTH_TIMEOUT`].
    ///
    /// # Errors
    ///
    /// - `Connection` if the transport handshake fails
    /// - `Authentication` if the server rejects the credential or the
    ///   exchange times out
    /// - `AlreadyConnected` / `Closed` if the client is not unconnected
    pub async fn connect(&self) -> Result<(), StreamError> {
        let mut writer = self.writer.lock().await;
        match self.state() {
            ConnectionState::Unconnected => {}
            ConnectionState::Connected => return Err(StreamError::AlreadyConnected),
            ConnectionState::Closed => return Err(StreamError::Closed),
        }
        if self.closing.load(Ordering::Acquire) {
            return Err(StreamError::Closed);
        }

        let asset_class = self.config.asset_class();
        let auth_style = self.config.auth_style();
        info!(
            url = %self.config.redacted_url(),
            auth_style = %auth_style,
            "Connecting to market data stream"
        );

        let mut ws = match connect_async(self.config.connection_url()).await {
            Ok((ws, _response)) => ws,
            Err(e) => {
                metrics::record_connect(asset_class, ConnectOutcome::TransportFailed);
                return Err(StreamError::Connection(e));
            }
        };

        if auth_style == AuthStyle::ChallengeAccept {
            let exchange = tokio::select! {
                biased;
                () = self.done.cancelled() => Err(StreamError::Closed),
                result = tokio::time::timeout(AUTH_TIMEOUT, self.authenticate(&mut ws)) => {
                    result.unwrap_or_else(|_| Err(AuthError::Timeout.into()))
                }
            };
            if let Err(e) = exchange {
                if let Some(outcome) = handshake_failure_outcome(&e) {
                    metrics::record_connect(asset_class, outcome);
                }
                let _ = ws.close(None).await;
                return Err(e);
            }
        }

        if self.closing.load(Ordering::Acquire) {
            let _ = ws.close(None).await;
            return Err(StreamError::Closed);
        }

        let (sink, source) = ws.split();
        *self.reader.lock().await = Some(source);
        *writer = Some(sink);
        {
            let mut state = self.state.lock();
            if self.closing.load(Ordering::Acquire) {
                writer.take();
                if let Ok(mut reader) = self.reader.try_lock() {
                    reader.take();
                }
                return Err(StreamError::Closed);
            }
            *state = ConnectionState::Connected;
        }

        metrics::record_connect(asset_class, ConnectOutcome::Connected);
        info!(
            asset_class = %asset_class,
            channel = %self.config.channel(),
            "Connected to market data stream"
        );
        Ok(())
    }

    async fn authenticate(&self, ws: &mut WsStream) -> Result<(), StreamError> {
        let mut handler = AuthHandler::new();

        while let Some(frame) = ws.next().await {
            match frame.map_err(StreamError::Connection)? {
                Message::Text(text) => {
                    for event in self.codec.decode(text.as_str())? {
                        let MarketEvent::Status(status) = event else {
                            continue;
                        };
                        debug!(status = %status.status, message = status.message(), "Auth status");

                        match handler.on_status(&status)? {
                            AuthProgress::SendAuth => {
                                let request = handler.create_auth_request(self.config.credential());
                                let json = self.codec.encode(&request)?;
                                ws.send(Message::Text(json.into()))
                                    .await
                                    .map_err(StreamError::Send)?;
                                metrics::record_control_frame(ControlAction::Auth.as_str());
                                debug!("Sent authentication request");
                            }
                            AuthProgress::Authenticated => {
                                info!("Authenticated");
                                return Ok(());
                            }
                            AuthProgress::Pending => {}
                        }
                    }
                }
                Message::Ping(data) => {
                    ws.send(Message::Pong(data))
                        .await
                        .map_err(StreamError::Send)?;
                }
                Message::Close(frame) => {
                    return Err(AuthError::ConnectionClosed(describe_close(frame.as_ref())).into());
                }
                Message::Binary(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }

        Err(AuthError::ConnectionClosed("stream ended".to_string()).into())
    }

    // =========================================================================
    // Subscription Controller
    // =========================================================================

    /// Subscribe to the configured initial symbols.
    ///
    /// # Errors
    ///
    /// Same as [`StreamClient::subscribe`].
    pub async fn subscribe_initial(&self) -> Result<(), StreamError> {
        self.subscribe(self.config.symbols()).await
    }

    /// Send a subscribe frame for `symbols` on the configured channel.
    ///
    /// Acknowledgements are not consumed here; they reach the listener
    /// as status records.
    ///
    /// # Errors
    ///
    /// Returns `NotConnected` unless the client is connected, `Subscription`
    /// for an empty selection, or `Send` if the write fails.
    pub async fn subscribe(&self, symbols: &SymbolSelection) -> Result<(), StreamError> {
        self.send_control(ControlAction::Subscribe, symbols).await
    }

    /// Send an unsubscribe frame for `symbols` on the configured channel.
    ///
    /// # Errors
    ///
    /// Same as [`StreamClient::subscribe`].
    pub async fn unsubscribe(&self, symbols: &SymbolSelection) -> Result<(), StreamError> {
        self.send_control(ControlAction::Unsubscribe, symbols).await
    }

    async fn send_control(
        &self,
        action: ControlAction,
        symbols: &SymbolSelection,
    ) -> Result<(), StreamError> {
        self.ensure_connected()?;

        let params = symbols.to_params(self.config.channel())?;
        let message = match action {
            ControlAction::Subscribe => ControlMessage::subscribe(params),
            ControlAction::Unsubscribe => ControlMessage::unsubscribe(params),
            ControlAction::Auth => ControlMessage::auth(self.config.credential().expose()),
        };
        let json = self.codec.encode(&message)?;

        let mut writer = self.writer.lock().await;
        self.ensure_connected()?;
        let sink = writer.as_mut().ok_or_else(|| StreamError::NotConnected {
            state: self.state(),
        })?;
        sink.send(Message::Text(json.into()))
            .await
            .map_err(StreamError::Send)?;

        metrics::record_control_frame(action.as_str());
        debug!(message = ?message, "Sent control frame");
        Ok(())
    }

    // =========================================================================
    // Event Listener Loop
    // =========================================================================

    /// Read frames and deliver every decoded record to `handler`, in order.
    ///
    /// Frames that fail to decode are logged, counted and skipped. Returns
    /// `Cancelled` promptly after [`StreamClient::close`] or when `cancel`
    /// fires, and `RemoteClosed` when the server closes normally.
    ///
    /// # Errors
    ///
    /// - `NotConnected` if the client is not connected
    /// - `ListenerActive` if another listener holds the read half
    /// - `Listen` on a read error or an abnormal close code
    pub async fn listen<H>(
        &self,
        handler: &mut H,
        cancel: &CancellationToken,
    ) -> Result<ListenOutcome, StreamError>
    where
        H: EventHandler + ?Sized,
    {
        self.ensure_connected()?;
        let mut reader = self
            .reader
            .lock()
            .await
            .take()
            .ok_or(StreamError::ListenerActive)?;

        debug!("Listener started");
        let outcome = self.read_loop(&mut reader, handler, cancel).await;

        match &outcome {
            Ok(ListenOutcome::Cancelled) if !self.done.is_cancelled() => {
                // Caller's token fired; the connection stays usable.
                self.restore_reader(reader).await;
            }
            Ok(ListenOutcome::Cancelled) => {}
            Ok(ListenOutcome::RemoteClosed) | Err(_) => {
                self.mark_closed();
                drop(reader);
                self.release_writer().await;
            }
        }

        debug!(outcome = ?outcome, "Listener stopped");
        outcome
    }

    async fn read_loop<H>(
        &self,
        reader: &mut WsSource,
        handler: &mut H,
        cancel: &CancellationToken,
    ) -> Result<ListenOutcome, StreamError>
    where
        H: EventHandler + ?Sized,
    {
        loop {
            let frame = tokio::select! {
                biased;
                () = self.done.cancelled() => return Ok(ListenOutcome::Cancelled),
                () = cancel.cancelled() => return Ok(ListenOutcome::Cancelled),
                frame = reader.next() => frame,
            };

            match frame {
                Some(Ok(Message::Text(text))) => self.dispatch(text.as_str(), handler),
                Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                    Ok(text) => self.dispatch(text, handler),
                    Err(e) => self.discard(&e.to_string()),
                },
                Some(Ok(Message::Ping(data))) => self.pong(data).await,
                Some(Ok(Message::Close(frame))) => {
                    return close_outcome(frame.as_ref());
                }
                Some(Ok(Message::Pong(_) | Message::Frame(_))) => {}
                Some(Err(_)) | None if self.done.is_cancelled() => {
                    return Ok(ListenOutcome::Cancelled);
                }
                Some(Err(e)) => return Err(StreamError::Listen(e.to_string())),
                None => {
                    return Err(StreamError::Listen(
                        "stream ended without a close frame".to_string(),
                    ));
                }
            }
        }
    }

    fn dispatch<H>(&self, text: &str, handler: &mut H)
    where
        H: EventHandler + ?Sized,
    {
        let asset_class = self.config.asset_class();
        metrics::record_frame_received(asset_class);

        match self.codec.decode(text) {
            Ok(events) => {
                for event in events {
                    if let MarketEvent::Status(status) = &event {
                        debug!(status = %status.status, message = status.message(), "Status");
                    }
                    metrics::record_event_delivered(asset_class, event.event_type());
                    handler.on_event(event);
                }
            }
            Err(e) => self.discard(&e.to_string()),
        }
    }

    fn discard(&self, reason: &str) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
        metrics::record_frame_discarded(self.config.asset_class());
        warn!(reason, "Discarding undecodable frame");
    }

    async fn pong(&self, data: tungstenite::Bytes) {
        let mut writer = self.writer.lock().await;
        if let Some(sink) = writer.as_mut()
            && let Err(e) = sink.send(Message::Pong(data)).await
        {
            warn!(error = %e, "Failed to send pong");
        }
    }

    // =========================================================================
    // Lifecycle / Shutdown Controller
    // =========================================================================

    /// Close the connection.
    ///
    /// Idempotent: only the first call does any work, and closing a client
    /// that never connected is a no-op. A running listener returns
    /// `Cancelled`. The close frame (code 1000) is sent under the write lock
    /// within [`CLOSE_TIMEOUT`].
    ///
    /// # Errors
    ///
    /// Returns `Close` if the close frame could not be delivered. The
    /// connection is torn down either way.
    pub async fn close(&self) -> Result<(), StreamError> {
        if self.closing.swap(true, Ordering::AcqRel) {
            debug!("Close already requested");
            return Ok(());
        }
        self.done.cancel();

        let previous = std::mem::replace(&mut *self.state.lock(), ConnectionState::Closed);
        let result = match previous {
            ConnectionState::Unconnected => return Ok(()),
            ConnectionState::Closed => Ok(()),
            ConnectionState::Connected => {
                match tokio::time::timeout(CLOSE_TIMEOUT, self.send_close_frame()).await {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(StreamError::Close(e.to_string())),
                    Err(_) => Err(StreamError::Close(format!(
                        "close handshake timed out after {}ms",
                        CLOSE_TIMEOUT.as_millis()
                    ))),
                }
            }
        };

        if let Ok(mut writer) = self.writer.try_lock() {
            writer.take();
        }
        if let Ok(mut reader) = self.reader.try_lock() {
            reader.take();
        }

        match &result {
            Ok(()) => info!("Stream closed"),
            Err(e) => warn!(error = %e, "Stream closed with error"),
        }
        result
    }

    async fn send_close_frame(&self) -> Result<(), tungstenite::Error> {
        let Some(mut sink) = self.writer.lock().await.take() else {
            return Ok(());
        };
        sink.send(Message::Close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        })))
        .await?;
        sink.close().await
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn ensure_connected(&self) -> Result<(), StreamError> {
        match self.state() {
            ConnectionState::Connected => Ok(()),
            state => Err(StreamError::NotConnected { state }),
        }
    }

    /// Flush any queued close reply and drop the write half.
    async fn release_writer(&self) {
        let Some(mut sink) = self.writer.lock().await.take() else {
            return;
        };
        match tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(error = %e, "Write half closed with error"),
            Err(_) => debug!("Timed out closing write half"),
        }
    }

    /// Put the read half back for the next listener, unless a close
    /// started in the meantime.
    async fn restore_reader(&self, reader: WsSource) {
        let mut slot = self.reader.lock().await;
        if self.closing.load(Ordering::Acquire) {
            debug!("Dropping read half of closed stream");
            return;
        }
        *slot = Some(reader);
    }

    fn mark_closed(&self) {
        let mut state = self.state.lock();
        if *state == ConnectionState::Connected {
            *state = ConnectionState::Closed;
        }
    }
}

/// Metric label for a failed handshake; a local close is not a failure.
const fn handshake_failure_outcome(error: &StreamError) -> Option<ConnectOutcome> {
    match error {
        StreamError::Closed => None,
        _ => Some(ConnectOutcome::AuthFailed),
    }
}

fn close_outcome(frame: Option<&CloseFrame>) -> Result<ListenOutcome, StreamError> {
    match frame {
        None => {
            info!("Server closed the connection");
            Ok(ListenOutcome::RemoteClosed)
        }
        Some(frame) if frame.code == CloseCode::Normal => {
            info!(reason = %frame.reason, "Server closed the connection");
            Ok(ListenOutcome::RemoteClosed)
        }
        Some(_) => Err(StreamError::Listen(format!(
            "server closed the connection: {}",
            describe_close(frame)
        ))),
    }
}

fn describe_close(frame: Option<&CloseFrame>) -> String {
    frame.map_or_else(
        || "no close frame".to_string(),
        |frame| format!("code {} {}", u16::from(frame.code), frame.reason),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::subscription::AssetClass;
    use crate::infrastructure::stream::auth::Credential;

    fn client() -> StreamClient {
        let config = StreamConfig::new(
            Credential::new("s3cr3t").unwrap(),
            AssetClass::Stocks,
            "T",
            SymbolSelection::parse(&["MSFT", "AAPL"]).unwrap(),
        )
        .unwrap();
        StreamClient::new(config)
    }

    #[tokio::test]
    async fn subscribe_before_connect_is_not_connected() {
        let client = client();
        let err = client.subscribe_initial().await.unwrap_err();
        assert!(matches!(
            err,
            StreamError::NotConnected {
                state: ConnectionState::Unconnected
            }
        ));
    }

    #[tokio::test]
    async fn listen_before_connect_is_not_connected() {
        let client = client();
        let mut events = Vec::new();
        let mut handler = |event: MarketEvent| events.push(event);
        let result = client.listen(&mut handler, &CancellationToken::new()).await;
        assert!(matches!(result, Err(StreamError::NotConnected { .. })));
    }

    #[tokio::test]
    async fn close_without_connect_is_noop() {
        let client = client();
        client.close().await.unwrap();
        client.close().await.unwrap();
        assert_eq!(client.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn connect_after_close_fails() {
        let client = client();
        client.close().await.unwrap();
        assert!(matches!(client.connect().await, Err(StreamError::Closed)));
    }

    #[test]
    fn normal_close_is_remote_closed() {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "bye".into(),
        };
        assert_eq!(
            close_outcome(Some(&frame)).unwrap(),
            ListenOutcome::RemoteClosed
        );
        assert_eq!(close_outcome(None).unwrap(), ListenOutcome::RemoteClosed);
    }

    #[test]
    fn abnormal_close_is_listen_error() {
        let frame = CloseFrame {
            code: CloseCode::Policy,
            reason: "policy violation".into(),
        };
        let err = close_outcome(Some(&frame)).unwrap_err();
        assert!(err.to_string().contains("1008"));
    }

    #[test]
    fn local_close_during_handshake_is_not_auth_failure() {
        assert_eq!(handshake_failure_outcome(&StreamError::Closed), None);
        assert_eq!(
            handshake_failure_outcome(&AuthError::Timeout.into()),
            Some(ConnectOutcome::AuthFailed)
        );
    }

    #[tokio::test]
    async fn reader_is_dropped_when_close_wins_the_race() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            while let Some(Ok(msg)) = ws.next().await {
                if msg.is_close() {
                    break;
                }
            }
        });

        let config = StreamConfig::new(
            Credential::new("s3cr3t").unwrap(),
            AssetClass::Stocks,
            "FMV",
            SymbolSelection::parse(&["MSFT"]).unwrap(),
        )
        .unwrap()
        .with_endpoint(url);
        let client = StreamClient::new(config);
        client.connect().await.unwrap();

        // A listener holding the read half while close runs.
        let reader = client.reader.lock().await.take().unwrap();
        client.close().await.unwrap();
        client.restore_reader(reader).await;

        assert!(client.reader.lock().await.is_none());
        assert_eq!(client.state(), ConnectionState::Closed);
        server.await.unwrap();
    }

    #[test]
    fn debug_redacts_credential() {
        let debug = format!("{:?}", client());
        assert!(!debug.contains("s3cr3t"));
        assert!(debug.contains("stocks/T"));
    }
}
