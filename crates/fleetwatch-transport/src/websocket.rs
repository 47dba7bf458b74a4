//! WebSocket channel implementation using `tokio-tungstenite`.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{Message, Utf8Bytes};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use crate::hub::Hub;
use crate::{
    Channel, ConnectionState, DataStream, OpenCallback, ReconnectPolicy,
    TransportError,
};

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// A client-side WebSocket [`Channel`] that reconnects on failure.
///
/// Created idle; [`connect`](Self::connect) spawns the background task
/// that owns the socket. Dropping the channel closes it.
///
/// Sends made before the first open, or while a reconnect is pending,
/// wait in the outbound queue and are written as soon as the next
/// connection opens. Only a closed channel drops them.
///
/// `wss://` URLs are served by rustls with the webpki root store.
///
/// ```rust,no_run
/// use fleetwatch_transport::{Channel, ReconnectPolicy, WebSocketChannel};
///
/// # async fn demo() -> Result<(), fleetwatch_transport::TransportError> {
/// let channel = WebSocketChannel::new(ReconnectPolicy::default());
/// channel.on_open(std::sync::Arc::new(|| println!("open")));
/// let _inbound = channel.data_stream();
/// channel.connect("ws://localhost:8080/websocket")?;
/// channel.send(r#"{"type":"load_username"}"#.to_string());
/// # Ok(())
/// # }
/// ```
pub struct WebSocketChannel {
    hub: Arc<Hub>,
    policy: ReconnectPolicy,
    outbound: mpsc::UnboundedSender<String>,
    /// Taken by `connect`; `None` afterwards.
    outbound_rx: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl WebSocketChannel {
    /// Creates an idle channel with the given reconnect policy.
    pub fn new(policy: ReconnectPolicy) -> Self {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown, _) = watch::channel(false);
        Self {
            hub: Arc::new(Hub::new()),
            policy: policy.validated(),
            outbound,
            outbound_rx: Mutex::new(Some(outbound_rx)),
            shutdown,
            task: Mutex::new(None),
        }
    }

    /// Starts connecting to `url` on a background task.
    ///
    /// Must be called from within a Tokio runtime. Connection failures are
    /// not reported here; they surface on the data streams and the status
    /// watch while the task keeps retrying.
    ///
    /// # Errors
    /// - [`TransportError::AlreadyStarted`] if called twice.
    /// - [`TransportError::Shutdown`] if the channel was already closed.
    pub fn connect(&self, url: &str) -> Result<(), TransportError> {
        if *self.shutdown.borrow() {
            return Err(TransportError::Shutdown);
        }
        let outbound_rx = self
            .outbound_rx
            .lock()
            .take()
            .ok_or(TransportError::AlreadyStarted)?;

        let task = ChannelTask {
            hub: Arc::clone(&self.hub),
            url: url.to_string(),
            policy: self.policy.clone(),
            outbound_rx,
            shutdown_rx: self.shutdown.subscribe(),
        };
        if url.starts_with("wss:") {
            install_crypto_provider();
        }
        tracing::info!(url, "starting WebSocket channel");
        *self.task.lock() = Some(tokio::spawn(task.run()));
        Ok(())
    }

    /// Returns the current connection state.
    pub fn state(&self) -> ConnectionState {
        self.hub.state()
    }

    /// Closes the channel and waits for the background task to finish.
    pub async fn shutdown(&self) {
        self.close();
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "channel task ended abnormally");
            }
        }
    }
}

impl Channel for WebSocketChannel {
    fn on_open(&self, callback: OpenCallback) {
        self.hub.register_open(callback);
    }

    fn data_stream(&self) -> DataStream {
        self.hub.subscribe()
    }

    fn send(&self, message: String) {
        let state = self.hub.state();
        if state.is_closed() || *self.shutdown.borrow() {
            tracing::warn!(bytes = message.len(), "channel closed, dropping outbound message");
            return;
        }
        if !state.is_open() {
            tracing::debug!(%state, bytes = message.len(), "channel not open, queueing outbound message");
        }
        if self.outbound.send(message).is_err() {
            tracing::warn!("channel task gone, dropping outbound message");
        }
    }

    fn close(&self) {
        self.shutdown.send_replace(true);
        // Never connected: no task will observe the flag, finish here.
        if self.outbound_rx.lock().is_some() {
            self.hub.finish();
        }
    }

    fn status(&self) -> watch::Receiver<ConnectionState> {
        self.hub.watch_state()
    }
}

impl Drop for WebSocketChannel {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

/// Installs the `ring` provider as the process-wide rustls default.
/// Losing the race to another installer is fine; any provider will do.
fn install_crypto_provider() {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        tracing::trace!("rustls crypto provider already installed");
    }
}

// ---------------------------------------------------------------------------
// Background task
// ---------------------------------------------------------------------------

/// Why a single connection ended.
enum SessionEnd {
    /// The server sent a Normal (1000) close frame.
    Graceful,
    /// `close()` was called or the channel was dropped.
    Shutdown,
    /// Anything else; triggers a reconnect.
    Failed(TransportError),
}

/// Owns the socket and runs the connect → pump → backoff loop.
struct ChannelTask {
    hub: Arc<Hub>,
    url: String,
    policy: ReconnectPolicy,
    outbound_rx: mpsc::UnboundedReceiver<String>,
    shutdown_rx: watch::Receiver<bool>,
}

impl ChannelTask {
    async fn run(mut self) {
        // Consecutive failures since the last successful open.
        let mut attempt: u32 = 0;

        loop {
            if *self.shutdown_rx.borrow() {
                break;
            }

            self.hub.set_state(ConnectionState::Connecting);
            tracing::debug!(url = %self.url, attempt, "connecting");

            let connected = tokio::select! {
                result = tokio_tungstenite::connect_async(self.url.as_str()) => result,
                _ = self.shutdown_rx.changed() => break,
            };

            match connected {
                Ok((ws, _response)) => {
                    attempt = 0;
                    self.hub.set_state(ConnectionState::Open);
                    tracing::info!(url = %self.url, "channel open");
                    self.hub.notify_open();

                    match self.pump(ws).await {
                        SessionEnd::Graceful => {
                            tracing::info!(url = %self.url, "server closed the channel");
                            break;
                        }
                        SessionEnd::Shutdown => break,
                        SessionEnd::Failed(err) => {
                            tracing::warn!(url = %self.url, error = %err, "channel dropped");
                            self.hub.publish(Err(err));
                        }
                    }
                }
                Err(e) => {
                    let err = TransportError::ConnectFailed(e.to_string());
                    tracing::warn!(url = %self.url, error = %err, "connect failed");
                    self.hub.publish(Err(err));
                }
            }

            let delay = self.policy.delay_for(attempt);
            attempt = attempt.saturating_add(1);
            self.hub
                .set_state(ConnectionState::Reconnecting { attempt, delay });
            tracing::info!(
                url = %self.url,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "reconnect scheduled"
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.shutdown_rx.changed() => break,
            }
        }

        self.hub.finish();
        tracing::info!(url = %self.url, "channel closed");
    }

    /// Moves frames in both directions until the connection ends.
    async fn pump(&mut self, ws: WsStream) -> SessionEnd {
        let (mut sink, mut stream) = ws.split();

        loop {
            tokio::select! {
                _ = self.shutdown_rx.changed() => {
                    let frame = CloseFrame {
                        code: CloseCode::Normal,
                        reason: Utf8Bytes::from_static("client closing"),
                    };
                    if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                        tracing::debug!(error = %e, "close frame not delivered");
                    }
                    return SessionEnd::Shutdown;
                }

                outbound = self.outbound_rx.recv() => {
                    // The channel holds a sender for as long as it lives.
                    let Some(text) = outbound else {
                        return SessionEnd::Shutdown;
                    };
                    tracing::debug!(bytes = text.len(), "sending message");
                    if let Err(e) = sink.send(Message::Text(text.into())).await {
                        return SessionEnd::Failed(TransportError::SendFailed(e.to_string()));
                    }
                }

                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        self.hub.publish(Ok(text.as_str().to_owned()));
                    }
                    Some(Ok(Message::Binary(data))) => {
                        match String::from_utf8(data.to_vec()) {
                            Ok(text) => self.hub.publish(Ok(text)),
                            Err(_) => tracing::warn!(
                                bytes = data.len(),
                                "dropping non-UTF-8 binary frame"
                            ),
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        // Flush tungstenite's queued close reply.
                        let _ = sink.flush().await;
                        return match frame {
                            Some(f) if f.code == CloseCode::Normal => SessionEnd::Graceful,
                            Some(f) => SessionEnd::Failed(TransportError::ConnectionClosed(
                                format!("code {} {}", u16::from(f.code), f.reason.as_str()),
                            )),
                            None => SessionEnd::Failed(TransportError::ConnectionClosed(
                                "closed without status".into(),
                            )),
                        };
                    }
                    Some(Ok(_)) => continue, // ping/pong/raw frame
                    Some(Err(e)) => {
                        return SessionEnd::Failed(TransportError::ReceiveFailed(e.to_string()));
                    }
                    None => {
                        return SessionEnd::Failed(TransportError::ConnectionClosed(
                            "connection reset".into(),
                        ));
                    }
                },
            }
        }
    }
}
