//! `FleetClient` builder and handle.
//!
//! This is the entry point for consumers. It ties the layers together:
//! channel → dispatcher → store, with the command effects closing the
//! loop from store back to channel.
//!
//! ```text
//!  intent ──► StoreHandle::dispatch ──► effects ──► Channel::send ──► server
//!                    ▲                                                  │
//!                    └──── Dispatcher ◄──── Channel::data_stream ◄──────┘
//! ```

use std::sync::Arc;

use fleetwatch_protocol::{Action, Codec, JsonCodec, UnitNumber};
use fleetwatch_store::{AppState, Effect, Inspector, Store, StoreHandle};
use fleetwatch_transport::{Channel, ConnectionState, WebSocketChannel};
use tokio::sync::watch;

use crate::effects::{ChannelSink, command_effects};
use crate::{ClientConfig, Dispatcher, FleetError};

/// Builder for a [`FleetClient`].
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use fleetwatch::prelude::*;
///
/// # async fn demo() -> Result<(), FleetError> {
/// let client = FleetClientBuilder::new(ClientConfig::from_env())
///     .inspector(Arc::new(TracingInspector))
///     .build()?;
/// client.load_units()?;
/// # Ok(())
/// # }
/// ```
pub struct FleetClientBuilder {
    config: ClientConfig,
    inspectors: Vec<Arc<dyn Inspector>>,
    effects: Vec<Effect>,
}

impl FleetClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            inspectors: Vec::new(),
            effects: Vec::new(),
        }
    }

    /// Adds an inspector that sees every action and resulting state.
    pub fn inspector(mut self, inspector: Arc<dyn Inspector>) -> Self {
        self.inspectors.push(inspector);
        self
    }

    /// Adds an effect that runs after the built-in command effects.
    pub fn effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    /// Wires everything up over a WebSocket and starts connecting.
    ///
    /// Returns as soon as the connection attempt is underway; the
    /// username request goes out once the channel opens. Intents
    /// dispatched before that are queued by the channel and sent on open,
    /// so calling [`FleetClient::load_units`] right away is fine. Must be
    /// called from within a Tokio runtime.
    ///
    /// # Errors
    /// [`FleetError::InvalidConfig`] for a non-WebSocket URL.
    pub fn build(self) -> Result<FleetClient<WebSocketChannel>, FleetError> {
        let config = self.config.clone().validated()?;
        let channel = Arc::new(WebSocketChannel::new(config.reconnect.clone()));
        let client = self.assemble(channel, JsonCodec);
        client.channel.connect(&config.url)?;
        tracing::info!(url = %config.url, "fleet client started");
        Ok(client)
    }

    /// Wires everything up over a caller-supplied channel.
    ///
    /// The channel is not connected here; whoever owns it decides when
    /// it opens. The configured URL and reconnect policy are not used.
    pub fn build_with_channel<C, K>(self, channel: Arc<C>, codec: K) -> FleetClient<C>
    where
        C: Channel,
        K: Codec + Clone,
    {
        self.assemble(channel, codec)
    }

    fn assemble<C, K>(self, channel: Arc<C>, codec: K) -> FleetClient<C>
    where
        C: Channel,
        K: Codec + Clone,
    {
        let sink = Arc::new(ChannelSink::new(Arc::clone(&channel), codec.clone()));
        let mut store = Store::new().effects(command_effects(sink)).effects(self.effects);
        for inspector in self.inspectors {
            store = store.inspector(inspector);
        }
        let store = store.spawn();
        let dispatcher = Dispatcher::start(channel.as_ref(), codec, store.clone());

        FleetClient {
            channel,
            store,
            dispatcher,
        }
    }
}

/// A running client: channel, dispatcher and store.
pub struct FleetClient<C: Channel = WebSocketChannel> {
    channel: Arc<C>,
    store: StoreHandle,
    dispatcher: Dispatcher,
}

impl FleetClient<WebSocketChannel> {
    pub fn builder(config: ClientConfig) -> FleetClientBuilder {
        FleetClientBuilder::new(config)
    }
}

impl<C: Channel> FleetClient<C> {
    /// The store handle, for dispatching arbitrary actions.
    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    pub fn channel(&self) -> &Arc<C> {
        &self.channel
    }

    /// The current snapshot.
    pub fn state(&self) -> Arc<AppState> {
        self.store.snapshot()
    }

    /// Subscribes to snapshot changes.
    pub fn subscribe(&self) -> watch::Receiver<Arc<AppState>> {
        self.store.subscribe()
    }

    /// Subscribes to connection-state changes (out-of-band, not actions).
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.channel.status()
    }

    /// Asks the server for every unit.
    pub fn load_units(&self) -> Result<(), FleetError> {
        self.store.dispatch(Action::load_units())?;
        Ok(())
    }

    /// Asks the server to delay `unit` by `minutes`.
    pub fn delay_unit(&self, unit: UnitNumber, minutes: i32) -> Result<(), FleetError> {
        self.store.dispatch(Action::delay_unit(unit, minutes))?;
        Ok(())
    }

    /// Stops the dispatcher, closes the channel without reconnecting,
    /// and stops the store once it has drained what is queued.
    pub async fn shutdown(self) {
        tracing::info!("fleet client shutting down");
        self.dispatcher.stop();
        self.channel.close();
        self.store.shutdown().await;
        self.dispatcher.join().await;
    }
}
