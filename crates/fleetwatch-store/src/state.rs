//! The application state snapshot.

use std::sync::Arc;

use fleetwatch_protocol::{TransportUnit, UnitNumber, User};

/// The single immutable snapshot of everything the client knows.
///
/// A snapshot is never changed in place. The reducer builds a new one
/// and the store swaps the `Arc`. Records are individually reference
/// counted, so a new snapshot shares every unit it didn't touch with
/// its predecessor and `Arc::ptr_eq` tells a consumer exactly what
/// changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    pub user: Arc<User>,
    /// First-seen order. Unit numbers are unique.
    pub units: Vec<Arc<TransportUnit>>,
}

impl AppState {
    /// The snapshot at process start: placeholder user, no units.
    pub fn initial() -> Arc<AppState> {
        Arc::new(AppState::default())
    }

    /// Looks up a unit by number.
    pub fn unit(&self, number: UnitNumber) -> Option<&Arc<TransportUnit>> {
        self.units.iter().find(|u| u.unit_number == number)
    }

    pub(crate) fn index_of(&self, number: UnitNumber) -> Option<usize> {
        self.units.iter().position(|u| u.unit_number == number)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            user: Arc::new(User::default()),
            units: Vec::new(),
        }
    }
}
