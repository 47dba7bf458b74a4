//! In-process channel for tests and offline demos.
//!
//! [`MemoryChannel::pair`] returns the client end (a [`Channel`]) and a
//! [`MemoryPeer`] that plays the server: it opens the channel, pushes
//! inbound messages, injects failures, and reads what the client sent.
//!
//! Like the WebSocket channel, sends made while the channel is not open
//! are held back and delivered when the peer next opens it.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};

use crate::hub::Hub;
use crate::{
    Channel, ConnectionState, DataStream, OpenCallback, TransportError,
};

/// Client end of an in-process channel.
pub struct MemoryChannel {
    hub: Arc<Hub>,
    outbox: Arc<Outbox>,
}

/// Server end of an in-process channel.
pub struct MemoryPeer {
    hub: Arc<Hub>,
    outbox: Arc<Outbox>,
    sent: mpsc::UnboundedReceiver<String>,
    failures: u32,
}

/// Client-to-peer path. `pending` holds sends made while not open; the
/// lock is also held across state changes so nothing slips between a
/// state check and the queue.
struct Outbox {
    pending: Mutex<VecDeque<String>>,
    tx: mpsc::UnboundedSender<String>,
}

impl Outbox {
    fn deliver(&self, message: String) {
        if self.tx.send(message).is_err() {
            tracing::warn!("memory peer gone, dropping outbound message");
        }
    }
}

impl MemoryChannel {
    /// Creates a connected client/peer pair. The channel starts idle;
    /// call [`MemoryPeer::open`] to open it.
    pub fn pair() -> (MemoryChannel, MemoryPeer) {
        let hub = Arc::new(Hub::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let outbox = Arc::new(Outbox {
            pending: Mutex::new(VecDeque::new()),
            tx,
        });
        (
            MemoryChannel {
                hub: Arc::clone(&hub),
                outbox: Arc::clone(&outbox),
            },
            MemoryPeer {
                hub,
                outbox,
                sent: rx,
                failures: 0,
            },
        )
    }
}

impl Channel for MemoryChannel {
    fn on_open(&self, callback: OpenCallback) {
        self.hub.register_open(callback);
    }

    fn data_stream(&self) -> DataStream {
        self.hub.subscribe()
    }

    fn send(&self, message: String) {
        let mut pending = self.outbox.pending.lock();
        match self.hub.state() {
            ConnectionState::Open => self.outbox.deliver(message),
            ConnectionState::Closed => {
                tracing::warn!("memory channel closed, dropping outbound message");
            }
            state => {
                tracing::debug!(%state, "memory channel not open, queueing outbound message");
                pending.push_back(message);
            }
        }
    }

    fn close(&self) {
        self.outbox.pending.lock().clear();
        self.hub.finish();
    }

    fn status(&self) -> watch::Receiver<ConnectionState> {
        self.hub.watch_state()
    }
}

impl MemoryPeer {
    /// Opens (or re-opens) the channel, delivering anything queued while
    /// it was down, then firing every `on_open` callback.
    pub fn open(&mut self) {
        self.failures = 0;
        {
            let mut pending = self.outbox.pending.lock();
            self.hub.set_state(ConnectionState::Open);
            for message in pending.drain(..) {
                self.outbox.deliver(message);
            }
        }
        self.hub.notify_open();
    }

    /// Delivers one inbound text message to every data stream.
    pub fn push(&self, text: impl Into<String>) {
        self.hub.publish(Ok(text.into()));
    }

    /// Simulates a dropped connection: an error item on every data stream
    /// and a move to `Reconnecting`.
    pub fn fail(&mut self, error: TransportError) {
        self.failures += 1;
        self.hub.publish(Err(error));
        let _pending = self.outbox.pending.lock();
        self.hub.set_state(ConnectionState::Reconnecting {
            attempt: self.failures,
            delay: Duration::ZERO,
        });
    }

    /// Simulates a graceful server close: streams complete, state `Closed`.
    pub fn close(&self) {
        self.outbox.pending.lock().clear();
        self.hub.finish();
    }

    /// Waits for the next message the client sent.
    pub async fn next_sent(&mut self) -> Option<String> {
        self.sent.recv().await
    }

    /// Returns a sent message if one is already queued.
    pub fn try_next_sent(&mut self) -> Option<String> {
        self.sent.try_recv().ok()
    }

    /// Current state as seen by the client.
    pub fn state(&self) -> ConnectionState {
        self.hub.state()
    }
}
