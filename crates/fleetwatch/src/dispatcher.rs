//! The dispatcher: inbound channel messages in, store actions out.
//!
//! Two jobs:
//!
//! 1. **Bootstrap.** Every time the channel opens, including every
//!    reconnect, dispatch `load_username`. The server keeps no session
//!    for a reconnecting client and doesn't replay what it missed, so
//!    each open must re-prime state.
//! 2. **Routing.** For each inbound message: parse, drop empty input,
//!    decode, dispatch. Nothing that arrives on the wire can stop the
//!    loop; bad input is logged and skipped.

use std::sync::Arc;

use fleetwatch_protocol::{Action, Codec, Envelope, ProtocolError};
use fleetwatch_store::StoreHandle;
use fleetwatch_transport::{Channel, DataStream};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;

/// A running dispatcher. Stop it with [`stop`](Self::stop); dropping the
/// value leaves the task running until the data stream ends.
pub struct Dispatcher {
    task: JoinHandle<()>,
}

impl Dispatcher {
    /// Registers the bootstrap on `channel` and starts routing its data
    /// stream into `store`.
    ///
    /// Call before the channel connects so the first open is seen. Must
    /// be called from within a Tokio runtime.
    pub fn start<C, K>(channel: &C, codec: K, store: StoreHandle) -> Self
    where
        C: Channel,
        K: Codec,
    {
        let bootstrap = store.clone();
        channel.on_open(Arc::new(move || {
            tracing::info!("channel open, requesting username");
            if let Err(e) = bootstrap.dispatch(Action::load_username()) {
                tracing::warn!(error = %e, "bootstrap not dispatched");
            }
        }));

        let stream = channel.data_stream();
        let task = tokio::spawn(route_stream(stream, codec, store));
        Self { task }
    }

    /// Unsubscribes from the channel. In-flight messages are dropped.
    pub fn stop(&self) {
        self.task.abort();
    }

    /// Whether the routing task has ended.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the routing task to end (stream completion or `stop`).
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            if !e.is_cancelled() {
                tracing::error!(error = %e, "dispatcher task panicked");
            }
        }
    }
}

async fn route_stream<K: Codec>(mut stream: DataStream, codec: K, store: StoreHandle) {
    tracing::info!("dispatcher started");

    while let Some(item) = stream.next().await {
        match item {
            Ok(text) => {
                let Some(action) = route_message(&codec, &text) else {
                    continue;
                };
                tracing::debug!(%action, "dispatching inbound action");
                if store.dispatch(action).is_err() {
                    tracing::warn!("store closed, dispatcher stopping");
                    return;
                }
            }
            Err(e) => {
                // The channel is already reconnecting; keep listening.
                tracing::error!(error = %e, "transport error on data stream");
            }
        }
    }

    tracing::warn!("data stream completed, dispatcher stopped");
}

/// Turns one raw inbound message into the action to dispatch, or `None`
/// if it should be dropped.
///
/// Dropped, in order of checking:
/// - text that isn't JSON (logged at warn)
/// - "falsy" JSON: `null`, `false`, `0`, `""`, `[]`, `{}` (logged at debug)
/// - anything that isn't an envelope or doesn't decode (logged at warn)
/// - commands, which only ever travel client → server (logged at warn)
pub fn route_message<K: Codec>(codec: &K, text: &str) -> Option<Action> {
    let value: Value = match codec.decode(text) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, bytes = text.len(), "dropping unparsable message");
            return None;
        }
    };

    if is_empty(&value) {
        tracing::debug!(%value, "dropping empty message");
        return None;
    }

    let envelope: Envelope = match serde_json::from_value(value) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!(error = %e, "dropping message that is not an envelope");
            return None;
        }
    };

    match Action::decode(envelope) {
        Ok(Action::Command(command)) => {
            tracing::warn!(kind = command.kind(), "server sent a client command, ignoring");
            None
        }
        Ok(action) => Some(action),
        Err(ProtocolError::UnknownKind(kind)) => {
            tracing::warn!(%kind, "unknown action kind, dropping");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "dropping undecodable action");
            None
        }
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

// =========================================================================
// Tests
// =========================================================================
