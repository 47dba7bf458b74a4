//! The store: sole owner and mutator of the state snapshot.
//!
//! [`Store`] is the synchronous core. It holds the snapshot, the effects
//! and the inspectors, and processes one action at a time.
//! [`Store::spawn`] moves it into its own Tokio task (the actor model)
//! and returns a [`StoreHandle`], a cheap clonable sender. Every
//! dispatch from every handle lands in one FIFO queue, so the reducer
//! never sees two writers and actions are applied in arrival order.

use std::sync::Arc;

use fleetwatch_protocol::Action;
use tokio::sync::{mpsc, oneshot, watch};

use crate::{AppState, Effect, Inspector, StoreError, reduce};

// ---------------------------------------------------------------------------
// Synchronous core
// ---------------------------------------------------------------------------

/// Holds the current snapshot and applies actions to it.
pub struct Store {
    state: watch::Sender<Arc<AppState>>,
    effects: Vec<Effect>,
    inspectors: Vec<Arc<dyn Inspector>>,
}

impl Store {
    /// Creates a store holding [`AppState::initial`].
    pub fn new() -> Self {
        Self::with_state(AppState::initial())
    }

    /// Creates a store holding `state`.
    pub fn with_state(state: Arc<AppState>) -> Self {
        let (tx, _) = watch::channel(state);
        Self {
            state: tx,
            effects: Vec::new(),
            inspectors: Vec::new(),
        }
    }

    /// Registers an effect. Effects run in registration order.
    pub fn effect(mut self, effect: Effect) -> Self {
        tracing::debug!(effect = effect.name(), "effect registered");
        self.effects.push(effect);
        self
    }

    /// Registers several effects.
    pub fn effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        for effect in effects {
            self = self.effect(effect);
        }
        self
    }

    /// Registers an inspector.
    pub fn inspector(mut self, inspector: Arc<dyn Inspector>) -> Self {
        self.inspectors.push(inspector);
        self
    }

    /// The current snapshot.
    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state.borrow())
    }

    /// Subscribes to snapshot changes.
    pub fn subscribe(&self) -> watch::Receiver<Arc<AppState>> {
        self.state.subscribe()
    }

    /// Processes one action: effects, then the reducer, then (if the
    /// snapshot changed) subscribers, then inspectors.
    ///
    /// Returns `true` if the snapshot changed.
    pub fn dispatch(&mut self, action: &Action) -> bool {
        for effect in &self.effects {
            effect.run(action);
        }

        let current = self.state();
        let next = reduce(&current, action);
        let changed = !Arc::ptr_eq(&current, &next);
        if changed {
            self.state.send_replace(Arc::clone(&next));
        }

        for inspector in &self.inspectors {
            inspector.record(action, &next);
        }
        changed
    }

    /// Moves the store onto its own task and returns a handle to it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(self) -> StoreHandle {
        let (sender, receiver) = mpsc::unbounded_channel();
        let state = self.subscribe();
        let actor = StoreActor {
            store: self,
            receiver,
        };
        tokio::spawn(actor.run());
        StoreHandle { sender, state }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// Commands sent to the store task.
///
/// `Settle` carries a reply channel. The task answers it after every
/// action queued before it has been processed.
enum StoreCommand {
    Dispatch(Action),
    Settle(oneshot::Sender<Arc<AppState>>),
    Shutdown,
}

struct StoreActor {
    store: Store,
    receiver: mpsc::UnboundedReceiver<StoreCommand>,
}

impl StoreActor {
    async fn run(mut self) {
        tracing::info!("store started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                StoreCommand::Dispatch(action) => {
                    tracing::debug!(%action, "dispatching");
                    self.store.dispatch(&action);
                }
                StoreCommand::Settle(reply) => {
                    let _ = reply.send(self.store.state());
                }
                StoreCommand::Shutdown => {
                    tracing::info!("store shutting down");
                    break;
                }
            }
        }

        tracing::info!("store stopped");
    }
}

/// Handle to a running store. Cheap to clone.
#[derive(Clone)]
pub struct StoreHandle {
    sender: mpsc::UnboundedSender<StoreCommand>,
    state: watch::Receiver<Arc<AppState>>,
}

impl StoreHandle {
    /// Queues an action. Never blocks, so it is safe to call from
    /// synchronous callbacks.
    ///
    /// # Errors
    /// [`StoreError::Closed`] if the store task has stopped.
    pub fn dispatch(&self, action: Action) -> Result<(), StoreError> {
        self.sender
            .send(StoreCommand::Dispatch(action))
            .map_err(|_| StoreError::Closed)
    }

    /// Subscribes to snapshot changes. The receiver starts out holding
    /// the current snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<AppState>> {
        self.state.clone()
    }

    /// The most recently published snapshot.
    pub fn snapshot(&self) -> Arc<AppState> {
        Arc::clone(&self.state.borrow())
    }

    /// Waits until every action dispatched before this call has been
    /// processed and returns the snapshot at that point.
    ///
    /// # Errors
    /// [`StoreError::Closed`] if the store task has stopped.
    pub async fn settled(&self) -> Result<Arc<AppState>, StoreError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(StoreCommand::Settle(reply_tx))
            .map_err(|_| StoreError::Closed)?;
        reply_rx.await.map_err(|_| StoreError::Closed)
    }

    /// Whether the store task has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Stops the store after the actions already queued and waits for
    /// the task to end. Calling it again is a no-op.
    pub async fn shutdown(&self) {
        if self.sender.send(StoreCommand::Shutdown).is_ok() {
            self.sender.closed().await;
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
