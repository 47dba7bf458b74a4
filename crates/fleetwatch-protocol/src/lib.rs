//! Wire protocol for Fleetwatch.
//!
//! This crate defines the "language" the client and the fleet server
//! speak:
//!
//! - **Types** ([`TransportUnit`], [`User`], [`Envelope`]): the domain
//!   records and the JSON envelope that carries them.
//! - **Actions** ([`Action`], [`Command`], [`Event`], [`Failure`]): the
//!   typed vocabulary, decoded from envelopes by a single exhaustive match.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how actions become text
//!   frames and back.
//! - **Errors** ([`ProtocolError`]): what can go wrong in between.
//!
//! The crate knows nothing about sockets or state. It only describes
//! messages.
//!
//! ```text
//! Transport (text) → Protocol (Envelope → Action) → Store (state)
//! ```

mod action;
mod codec;
mod error;
mod types;

pub use action::{Action, Command, Event, Failure, kind};
pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{Envelope, ErrorInfo, TransportUnit, UnitNumber, User};
