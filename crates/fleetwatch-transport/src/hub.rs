//! Fan-out registry shared by every channel implementation.
//!
//! Holds the `on_open` callbacks, the per-subscriber inbound senders, and
//! the connection-state watch. Channel tasks push into the hub; consumers
//! pull out of the streams it hands out.
//!
//! Every subscriber gets its own unbounded queue: the socket task never
//! waits on a slow consumer, and no inbound event is lost to one.
//!
//! The hub never owns a socket, so both [`WebSocketChannel`] and
//! [`MemoryChannel`] share it unchanged.
//!
//! [`WebSocketChannel`]: crate::WebSocketChannel
//! [`MemoryChannel`]: crate::MemoryChannel

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::{ConnectionState, TransportError};

/// One item on a data stream: a raw text message or a transport failure.
pub type Inbound = Result<String, TransportError>;

/// Lazy, push-driven sequence of inbound messages. One per subscriber.
pub type DataStream = UnboundedReceiverStream<Inbound>;

/// Callback invoked every time the channel transitions to open.
pub type OpenCallback = Arc<dyn Fn() + Send + Sync>;

/// Shared state between a channel handle and its background task.
///
/// All three registries sit behind their own lock, so publishing an
/// inbound message never waits on a callback registration.
pub(crate) struct Hub {
    on_open: Mutex<Vec<OpenCallback>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<Inbound>>>,
    state: watch::Sender<ConnectionState>,
}

impl Hub {
    pub(crate) fn new() -> Self {
        let (state, _) = watch::channel(ConnectionState::Idle);
        Self {
            on_open: Mutex::new(Vec::new()),
            subscribers: Mutex::new(Vec::new()),
            state,
        }
    }

    pub(crate) fn register_open(&self, callback: OpenCallback) {
        self.on_open.lock().push(callback);
    }

    /// Runs every open callback in registration order.
    ///
    /// The list is cloned first so a callback may register further
    /// callbacks without deadlocking.
    pub(crate) fn notify_open(&self) {
        let callbacks = self.on_open.lock().clone();
        tracing::debug!(callbacks = callbacks.len(), "running on-open callbacks");
        for callback in &callbacks {
            callback();
        }
    }

    /// Hands out a fresh stream. Returns an already-finished stream once
    /// the channel is closed.
    pub(crate) fn subscribe(&self) -> DataStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut subscribers = self.subscribers.lock();
        if !self.state.borrow().is_closed() {
            subscribers.push(tx);
        }
        UnboundedReceiverStream::new(rx)
    }

    /// Pushes an item to every live subscriber, pruning dropped ones.
    pub(crate) fn publish(&self, item: Inbound) {
        self.subscribers
            .lock()
            .retain(|tx| tx.send(item.clone()).is_ok());
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    pub(crate) fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub(crate) fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Marks the channel closed and completes every data stream.
    pub(crate) fn finish(&self) {
        self.set_state(ConnectionState::Closed);
        self.subscribers.lock().clear();
    }
}
