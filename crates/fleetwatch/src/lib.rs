//! # Fleetwatch
//!
//! Real-time client that mirrors a server-driven fleet of transport units
//! into a local, immutable state snapshot.
//!
//! The server is the only source of truth. The client keeps a persistent
//! WebSocket open, folds every inbound event into [`AppState`] with a pure
//! reducer, and turns the two user intents (load the unit list, delay a
//! unit) into commands sent back over the same socket.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fleetwatch::prelude::*;
//!
//! # async fn demo() -> Result<(), FleetError> {
//! let client = FleetClient::builder(ClientConfig::from_env()).build()?;
//! // Queued until the socket opens.
//! client.load_units()?;
//!
//! let mut states = client.subscribe();
//! while states.changed().await.is_ok() {
//!     let state = states.borrow_and_update().clone();
//!     println!("{}: {} units", state.user.name, state.units.len());
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod dispatcher;
mod effects;
mod error;

pub use client::{FleetClient, FleetClientBuilder};
pub use config::ClientConfig;
pub use dispatcher::{Dispatcher, route_message};
pub use effects::{ChannelSink, CommandSink, command_effects};
pub use error::FleetError;

pub use fleetwatch_protocol as protocol;
pub use fleetwatch_store as store;
pub use fleetwatch_transport as transport;

pub use fleetwatch_protocol::{Action, TransportUnit, UnitNumber, User};
pub use fleetwatch_store::AppState;
pub use fleetwatch_transport::{ConnectionState, ReconnectPolicy};

/// Everything a typical consumer needs.
pub mod prelude {
    pub use crate::{ClientConfig, FleetClient, FleetClientBuilder, FleetError};
    pub use fleetwatch_protocol::{
        Action, Codec, Command, Event, JsonCodec, TransportUnit, UnitNumber, User,
    };
    pub use fleetwatch_store::{
        ActionLog, AppState, Effect, Inspector, StoreError, StoreHandle, TracingInspector,
    };
    pub use fleetwatch_transport::{
        Channel, ConnectionState, MemoryChannel, MemoryPeer, ReconnectPolicy, WebSocketChannel,
    };
}
