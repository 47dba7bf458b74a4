//! Pluggable inspection hooks.
//!
//! An [`Inspector`] sees every action the store processes together with
//! the snapshot that resulted from it. Tooling hangs off this: logging,
//! recording for tests, time-travel views.

use std::sync::Arc;

use fleetwatch_protocol::Action;
use parking_lot::Mutex;

use crate::AppState;

/// Observes `(action, resulting state)` after every reduction.
///
/// Called on the store task. Implementations must be quick and must not
/// dispatch back into the store.
pub trait Inspector: Send + Sync + 'static {
    fn record(&self, action: &Action, state: &Arc<AppState>);
}

/// Logs every action at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingInspector;

impl Inspector for TracingInspector {
    fn record(&self, action: &Action, state: &Arc<AppState>) {
        tracing::debug!(
            kind = action.kind(),
            subject = ?action.subject().map(|u| u.0),
            error = action.is_error(),
            user = %state.user.name,
            units = state.units.len(),
            "action reduced"
        );
    }
}

/// One recorded step.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub action: Action,
    pub state: Arc<AppState>,
}

/// Keeps every action and resulting snapshot in memory.
///
/// Cloning shares the log, so a test can keep one clone and hand the
/// other to the store.
#[derive(Debug, Clone, Default)]
pub struct ActionLog {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl ActionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of everything recorded so far.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    /// The kinds recorded so far, in order.
    pub fn kinds(&self) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .map(|e| e.action.kind().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl Inspector for ActionLog {
    fn record(&self, action: &Action, state: &Arc<AppState>) {
        self.entries.lock().push(LogEntry {
            action: action.clone(),
            state: Arc::clone(state),
        });
    }
}
