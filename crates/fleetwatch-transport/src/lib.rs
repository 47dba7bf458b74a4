//! Duplex channel layer for Fleetwatch.
//!
//! Provides the [`Channel`] trait: a persistent, self-healing connection
//! to the fleet server with an inbound message stream, fire-and-forget
//! outbound sends, and an `on_open` hook that fires on every (re)connect.
//!
//! Two implementations ship with the crate:
//!
//! - [`WebSocketChannel`]: the real thing, via `tokio-tungstenite`,
//!   with bounded exponential reconnect backoff ([`ReconnectPolicy`]).
//! - [`MemoryChannel`]: an in-process channel driven by a
//!   [`MemoryPeer`], for tests and offline demos.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket channel via `tokio-tungstenite`

mod error;
mod hub;
mod memory;
mod policy;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use hub::{DataStream, Inbound, OpenCallback};
pub use memory::{MemoryChannel, MemoryPeer};
pub use policy::{ConnectionState, ReconnectPolicy};
#[cfg(feature = "websocket")]
pub use websocket::WebSocketChannel;

use tokio::sync::watch;

/// A duplex connection to the server that survives disconnects.
///
/// This is the seam between the transport and everything above it. The
/// dispatcher only ever reads [`data_stream`](Self::data_stream) and
/// registers [`on_open`](Self::on_open); the command effects only ever
/// call [`send`](Self::send). Neither knows whether frames travel over a
/// socket or an in-process queue.
///
/// # Why `Send + Sync + 'static`?
///
/// A channel is shared behind an `Arc` by the effect handlers, which run
/// on the store task, and by the client handle, which may live on any
/// task. Every method therefore takes `&self` and does its own locking.
///
/// # Lifecycle
///
/// ```text
/// Idle → Connecting → Open ⇄ Reconnecting → ... → Closed
/// ```
///
/// `Closed` is terminal: data streams complete, `send` drops its input,
/// and no further `on_open` callbacks fire.
pub trait Channel: Send + Sync + 'static {
    /// Registers a callback that runs every time the channel opens,
    /// including after each successful reconnect.
    ///
    /// Callbacks run synchronously on the channel's own task, so they
    /// must not block. Hand work off (for example, dispatch into a
    /// store) instead of doing it inline.
    fn on_open(&self, callback: OpenCallback);

    /// Returns a new stream of inbound messages.
    ///
    /// Each call creates an independent subscriber that sees messages
    /// arriving from now on. Transport failures appear as `Err` items and
    /// do not end the stream; the stream ends only when the channel closes.
    fn data_stream(&self) -> DataStream;

    /// Transmits one text message, fire-and-forget.
    ///
    /// While the channel is idle, connecting or reconnecting the message
    /// is queued and written in order once the next connection opens.
    /// After the channel has closed it is dropped and logged.
    fn send(&self, message: String);

    /// Closes the channel without reconnecting.
    fn close(&self);

    /// Subscribes to out-of-band connection-state changes.
    fn status(&self) -> watch::Receiver<ConnectionState>;
}
