//! Unified error type for the Fleetwatch client.

use fleetwatch_protocol::ProtocolError;
use fleetwatch_store::StoreError;
use fleetwatch_transport::TransportError;

/// Top-level error that wraps every crate-specific error.
///
/// `#[from]` on each variant generates the `From` impl, so `?` converts
/// sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum FleetError {
    /// Connection setup or channel lifecycle.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Encoding or decoding an action.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The store has stopped.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A configuration value that can't be used.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
