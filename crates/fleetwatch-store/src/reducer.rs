//! The pure state-transition function.
//!
//! `reduce(state, action)` folds one action into a snapshot. It never
//! fails and never panics. Anything it can't apply comes back as the
//! *same* `Arc` it was given, which is how the store (and any consumer)
//! knows nothing changed.

use std::sync::Arc;

use fleetwatch_protocol::{Action, Event, Failure, TransportUnit, UnitNumber};

use crate::AppState;

/// Computes the snapshot that follows `state` once `action` is applied.
///
/// | Action | Result |
/// |---|---|
/// | command | `state` unchanged (commands are for effects) |
/// | failure | logged at error level, `state` unchanged |
/// | username loaded | new snapshot with the new user |
/// | unit created | record with that number replaced wholesale, or appended |
/// | unit moved / delayed / arrived | new snapshot with one new record |
///
/// For moved/delayed/arrived the returned snapshot shares every other
/// record with `state`. An event naming a unit that doesn't exist is
/// logged and ignored.
pub fn reduce(state: &Arc<AppState>, action: &Action) -> Arc<AppState> {
    match action {
        Action::Command(_) => Arc::clone(state),
        Action::Failure(failure) => {
            report(failure);
            Arc::clone(state)
        }
        Action::Event(event) => apply(state, event),
    }
}

fn apply(state: &Arc<AppState>, event: &Event) -> Arc<AppState> {
    match event {
        Event::UsernameLoaded(user) => Arc::new(AppState {
            user: Arc::new(user.clone()),
            units: state.units.clone(),
        }),

        Event::UnitCreated { unit, record } => upsert(state, *unit, record),

        Event::UnitMoved { unit, position } => update(state, *unit, |u| {
            u.current_position.clone_from(position);
        }),

        Event::UnitDelayed { unit, minutes } => update(state, *unit, |u| {
            u.delay_minutes = *minutes;
        }),

        Event::UnitArrived { unit } => update(state, *unit, |u| {
            u.arrived = Some(true);
        }),
    }
}

/// Replaces the record keyed by `unit`, or appends a new one.
fn upsert(state: &Arc<AppState>, unit: UnitNumber, record: &TransportUnit) -> Arc<AppState> {
    let mut record = record.clone();
    if record.unit_number != unit {
        // The subject is the key; a disagreeing body must not create a
        // second record under another number.
        tracing::warn!(
            %unit,
            body = %record.unit_number,
            "created event body names another unit, keeping subject"
        );
        record.unit_number = unit;
    }

    let mut units = state.units.clone();
    match state.index_of(unit) {
        Some(index) => units[index] = Arc::new(record),
        None => units.push(Arc::new(record)),
    }
    Arc::new(AppState {
        user: Arc::clone(&state.user),
        units,
    })
}

/// Copies one record, lets `change` edit the copy, and builds a snapshot
/// around it.
fn update(
    state: &Arc<AppState>,
    unit: UnitNumber,
    change: impl FnOnce(&mut TransportUnit),
) -> Arc<AppState> {
    let Some(index) = state.index_of(unit) else {
        tracing::warn!(%unit, "event for unknown unit, ignoring");
        return Arc::clone(state);
    };

    let mut record = TransportUnit::clone(&state.units[index]);
    change(&mut record);

    let mut units = state.units.clone();
    units[index] = Arc::new(record);
    Arc::new(AppState {
        user: Arc::clone(&state.user),
        units,
    })
}

fn report(failure: &Failure) {
    match failure.subject {
        Some(unit) => tracing::error!(
            kind = %failure.kind,
            %unit,
            error = %failure.error,
            "server reported a failure"
        ),
        None => tracing::error!(
            kind = %failure.kind,
            error = %failure.error,
            "server reported a failure"
        ),
    }
    if let Some(stack) = &failure.error.stack {
        tracing::debug!(kind = %failure.kind, %stack, "server stack trace");
    }
}

// =========================================================================
// Tests
// =========================================================================
