//! State container for Fleetwatch.
//!
//! One immutable [`AppState`] snapshot, replaced (never mutated) by the
//! pure [`reduce`] function as actions arrive. The [`Store`] owns the
//! snapshot and runs as a single Tokio task; everything else talks to it
//! through a [`StoreHandle`].
//!
//! # Key types
//!
//! - [`AppState`]: user profile plus the ordered unit list
//! - [`reduce`]: `(state, action) → state'`, total and panic-free
//! - [`Store`] / [`StoreHandle`]: the snapshot owner and its handle
//! - [`Effect`]: a side effect registered for matching actions
//! - [`Inspector`]: a hook that sees every action and its result

mod effect;
mod error;
mod inspect;
mod reducer;
mod state;
mod store;

pub use effect::Effect;
pub use error::StoreError;
pub use inspect::{ActionLog, Inspector, LogEntry, TracingInspector};
pub use reducer::reduce;
pub use state::AppState;
pub use store::{Store, StoreHandle};
