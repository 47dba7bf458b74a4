//! The action vocabulary: every message the client can send or receive.
//!
//! Two disjoint families share one envelope on the wire:
//!
//! - [`Command`]: client → server intents. Dispatched locally by the
//!   presentation layer, picked up by effect handlers, and sent.
//! - [`Event`]: server → client facts. The only input that changes state.
//!
//! A third shape, [`Failure`], covers envelopes with `error: true`. It is
//! neither a command nor an event; the reducer logs it and moves on.
//!
//! Decoding is one exhaustive `match` on the kind string in
//! [`Action::decode`]. Each kind fixes its own subject and payload types,
//! so a decoded [`Action`] can't carry a string where a delay belongs.

use std::fmt;

use serde_json::Value;

use crate::{Envelope, ErrorInfo, ProtocolError, TransportUnit, UnitNumber, User};

/// Wire literals for every kind in the vocabulary.
pub mod kind {
    pub const LOAD_USERNAME: &str = "load_username";
    pub const LOAD_UNITS: &str = "load_verkehrsmittel";
    pub const DELAY_UNIT: &str = "delay_verkehrsmittel";

    pub const USERNAME_LOADED: &str = "username_loaded";
    pub const UNIT_CREATED: &str = "verkehrsmittel_created";
    pub const UNIT_MOVED: &str = "verkehrsmittel_moved";
    pub const UNIT_DELAYED: &str = "verkehrsmittel_delayed";
    pub const UNIT_ARRIVED: &str = "verkehrsmittel_arrived";

    /// Kind the server uses for its own error envelopes.
    pub const SERVER_ERROR: &str = "server_error";
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// A client → server intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Ask who the current user is.
    LoadUsername,
    /// Ask for every known unit; the server answers with one
    /// `UnitCreated` per unit.
    LoadUnits,
    /// Ask the server to apply a delay to a unit.
    DelayUnit { unit: UnitNumber, minutes: i32 },
}

impl Command {
    pub fn kind(&self) -> &'static str {
        match self {
            Command::LoadUsername => kind::LOAD_USERNAME,
            Command::LoadUnits => kind::LOAD_UNITS,
            Command::DelayUnit { .. } => kind::DELAY_UNIT,
        }
    }

    pub fn subject(&self) -> Option<UnitNumber> {
        match self {
            Command::DelayUnit { unit, .. } => Some(*unit),
            _ => None,
        }
    }

    /// The wire form. The delay travels as a decimal string because the
    /// server reads that payload as text.
    pub fn to_envelope(&self) -> Envelope {
        let payload = match self {
            Command::DelayUnit { minutes, .. } => Value::String(minutes.to_string()),
            _ => Value::Null,
        };
        Envelope::new(self.kind(), payload, self.subject())
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// A server → client fact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    UsernameLoaded(User),
    /// First sighting or full resync of a unit. Replaces any existing
    /// record with the same number.
    UnitCreated { unit: UnitNumber, record: TransportUnit },
    UnitMoved { unit: UnitNumber, position: String },
    UnitDelayed { unit: UnitNumber, minutes: i32 },
    UnitArrived { unit: UnitNumber },
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::UsernameLoaded(_) => kind::USERNAME_LOADED,
            Event::UnitCreated { .. } => kind::UNIT_CREATED,
            Event::UnitMoved { .. } => kind::UNIT_MOVED,
            Event::UnitDelayed { .. } => kind::UNIT_DELAYED,
            Event::UnitArrived { .. } => kind::UNIT_ARRIVED,
        }
    }

    pub fn subject(&self) -> Option<UnitNumber> {
        match self {
            Event::UsernameLoaded(_) => None,
            Event::UnitCreated { unit, .. }
            | Event::UnitMoved { unit, .. }
            | Event::UnitDelayed { unit, .. }
            | Event::UnitArrived { unit } => Some(*unit),
        }
    }

    /// The wire form, as the server sends it.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if the record can't be serialized.
    pub fn to_envelope(&self) -> Result<Envelope, ProtocolError> {
        let payload = match self {
            Event::UsernameLoaded(user) => Value::String(user.name.clone()),
            Event::UnitCreated { record, .. } => {
                serde_json::to_value(record).map_err(ProtocolError::Encode)?
            }
            Event::UnitMoved { position, .. } => Value::String(position.clone()),
            Event::UnitDelayed { minutes, .. } => Value::from(*minutes),
            Event::UnitArrived { .. } => Value::Null,
        };
        Ok(Envelope::new(self.kind(), payload, self.subject()))
    }
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

/// An envelope flagged `error: true`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// The envelope's kind, kept verbatim (usually `server_error`).
    pub kind: String,
    pub subject: Option<UnitNumber>,
    pub error: ErrorInfo,
}

impl Failure {
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if the error info can't be serialized.
    pub fn to_envelope(&self) -> Result<Envelope, ProtocolError> {
        let payload = serde_json::to_value(&self.error).map_err(ProtocolError::Encode)?;
        let mut envelope = Envelope::new(self.kind.clone(), payload, self.subject);
        envelope.error = true;
        Ok(envelope)
    }
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// Anything that flows through the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Command(Command),
    Event(Event),
    Failure(Failure),
}

impl Action {
    // -- Constructors, one per kind --

    pub fn load_username() -> Self {
        Action::Command(Command::LoadUsername)
    }

    pub fn load_units() -> Self {
        Action::Command(Command::LoadUnits)
    }

    pub fn delay_unit(unit: UnitNumber, minutes: i32) -> Self {
        Action::Command(Command::DelayUnit { unit, minutes })
    }

    pub fn username_loaded(name: impl Into<String>) -> Self {
        Action::Event(Event::UsernameLoaded(User::new(name)))
    }

    /// The subject is taken from the record itself.
    pub fn unit_created(record: TransportUnit) -> Self {
        Action::Event(Event::UnitCreated {
            unit: record.unit_number,
            record,
        })
    }

    pub fn unit_moved(unit: UnitNumber, position: impl Into<String>) -> Self {
        Action::Event(Event::UnitMoved {
            unit,
            position: position.into(),
        })
    }

    pub fn unit_delayed(unit: UnitNumber, minutes: i32) -> Self {
        Action::Event(Event::UnitDelayed { unit, minutes })
    }

    pub fn unit_arrived(unit: UnitNumber) -> Self {
        Action::Event(Event::UnitArrived { unit })
    }

    pub fn failure(
        kind: impl Into<String>,
        subject: Option<UnitNumber>,
        error: ErrorInfo,
    ) -> Self {
        Action::Failure(Failure {
            kind: kind.into(),
            subject,
            error,
        })
    }

    // -- Accessors --

    pub fn kind(&self) -> &str {
        match self {
            Action::Command(c) => c.kind(),
            Action::Event(e) => e.kind(),
            Action::Failure(f) => &f.kind,
        }
    }

    pub fn subject(&self) -> Option<UnitNumber> {
        match self {
            Action::Command(c) => c.subject(),
            Action::Event(e) => e.subject(),
            Action::Failure(f) => f.subject,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Action::Failure(_))
    }

    pub fn as_command(&self) -> Option<&Command> {
        match self {
            Action::Command(c) => Some(c),
            _ => None,
        }
    }

    /// The wire form of this action.
    ///
    /// Commands always encode; events and failures carry serialized
    /// payloads and report [`ProtocolError::Encode`] if that fails.
    pub fn to_envelope(&self) -> Result<Envelope, ProtocolError> {
        match self {
            Action::Command(c) => Ok(c.to_envelope()),
            Action::Event(e) => e.to_envelope(),
            Action::Failure(f) => f.to_envelope(),
        }
    }

    // -- Decoding --

    /// Turns a wire envelope into a typed action.
    ///
    /// Error envelopes always decode (to [`Action::Failure`]) whatever
    /// their kind, so a server failure is never mistaken for an unknown
    /// message.
    ///
    /// # Errors
    /// - [`ProtocolError::UnknownKind`] for kinds outside the vocabulary.
    /// - [`ProtocolError::MissingSubject`] if a unit kind has no `meta`.
    /// - [`ProtocolError::InvalidPayload`] if the payload has the wrong shape.
    pub fn decode(envelope: Envelope) -> Result<Self, ProtocolError> {
        if envelope.error {
            return Ok(Action::failure(
                envelope.kind.clone(),
                envelope.subject(),
                ErrorInfo::from_value(&envelope.payload),
            ));
        }

        let subject = envelope.subject();
        let unit = || subject.ok_or_else(|| ProtocolError::MissingSubject(envelope.kind.clone()));
        let kind = envelope.kind.as_str();

        let action = match kind {
            kind::LOAD_USERNAME => Action::load_username(),
            kind::LOAD_UNITS => Action::load_units(),
            kind::DELAY_UNIT => Action::delay_unit(unit()?, minutes(kind, &envelope.payload)?),

            kind::USERNAME_LOADED => {
                Action::Event(Event::UsernameLoaded(user(kind, &envelope.payload)?))
            }
            kind::UNIT_CREATED => {
                let record: TransportUnit = serde_json::from_value(envelope.payload.clone())
                    .map_err(|e| ProtocolError::invalid(kind, e))?;
                // `meta` names the subject; older servers only put the
                // number inside the record.
                Action::Event(Event::UnitCreated {
                    unit: subject.unwrap_or(record.unit_number),
                    record,
                })
            }
            kind::UNIT_MOVED => match &envelope.payload {
                Value::String(position) => Action::unit_moved(unit()?, position.clone()),
                other => return Err(ProtocolError::invalid(kind, format!("expected position string, got {other}"))),
            },
            kind::UNIT_DELAYED => Action::unit_delayed(unit()?, minutes(kind, &envelope.payload)?),
            kind::UNIT_ARRIVED => Action::unit_arrived(unit()?),

            _ => return Err(ProtocolError::UnknownKind(kind.to_string())),
        };
        Ok(action)
    }
}

impl From<Command> for Action {
    fn from(c: Command) -> Self {
        Action::Command(c)
    }
}

impl From<Event> for Action {
    fn from(e: Event) -> Self {
        Action::Event(e)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.subject() {
            Some(unit) => write!(f, "{}({unit})", self.kind()),
            None => f.write_str(self.kind()),
        }
    }
}

/// Delay minutes arrive as a JSON integer or as a numeric string.
fn minutes(kind: &str, payload: &Value) -> Result<i32, ProtocolError> {
    let parsed = match payload {
        Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<i32>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| ProtocolError::invalid(kind, format!("expected delay minutes, got {payload}")))
}

/// The user arrives as a bare name string or as `{"name": ...}`.
fn user(kind: &str, payload: &Value) -> Result<User, ProtocolError> {
    match payload {
        Value::String(name) => Ok(User::new(name.clone())),
        Value::Object(_) => {
            serde_json::from_value(payload.clone()).map_err(|e| ProtocolError::invalid(kind, e))
        }
        other => Err(ProtocolError::invalid(kind, format!("expected user name, got {other}"))),
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn decode(value: Value) -> Result<Action, ProtocolError> {
        Action::decode(serde_json::from_value(value).unwrap())
    }

    fn ic(n: u64) -> TransportUnit {
        TransportUnit::new(n, "IC", format!("IC {n}"), vec!["Bern".into(), "Olten".into()])
    }

    // =====================================================================
    // Commands
    // =====================================================================

    #[test]
    fn test_delay_command_sends_minutes_as_string() {
        let env = Action::delay_unit(UnitNumber(7), 5).to_envelope().unwrap();
        assert_eq!(
            serde_json::to_value(&env).unwrap(),
            json!({"type": "delay_verkehrsmittel", "payload": "5", "meta": 7, "error": false})
        );
    }

    #[test]
    fn test_bootstrap_commands_have_no_payload() {
        let env = Action::load_username().to_envelope().unwrap();
        assert_eq!(env.kind, "load_username");
        assert!(env.payload.is_null());
        assert!(env.meta.is_null());

        assert_eq!(Action::load_units().kind(), "load_verkehrsmittel");
    }

    #[test]
    fn test_delay_command_decodes_number_or_string() {
        let a = decode(json!({"type": "delay_verkehrsmittel", "payload": "15", "meta": 3})).unwrap();
        let b = decode(json!({"type": "delay_verkehrsmittel", "payload": 15, "meta": 3})).unwrap();
        assert_eq!(a, Action::delay_unit(UnitNumber(3), 15));
        assert_eq!(a, b);
    }

    // =====================================================================
    // Events
    // =====================================================================

    #[test]
    fn test_username_loaded_accepts_bare_string_and_object() {
        let a = decode(json!({"type": "username_loaded", "payload": "anna"})).unwrap();
        let b = decode(json!({"type": "username_loaded", "payload": {"name": "anna"}})).unwrap();
        assert_eq!(a, Action::username_loaded("anna"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_unit_created_carries_full_record() {
        let action = decode(json!({
            "type": "verkehrsmittel_created",
            "meta": 7,
            "payload": {
                "vmNummer": 7, "vmArt": "IC", "bezeichnung": "IC 7",
                "fahrtpunkte": ["Bern", "Olten"], "aktuellePosition": "Bern", "delay": 0
            }
        }))
        .unwrap();

        match action {
            Action::Event(Event::UnitCreated { unit, record }) => {
                assert_eq!(unit, UnitNumber(7));
                assert_eq!(record.route, vec!["Bern", "Olten"]);
            }
            other => panic!("expected UnitCreated, got {other:?}"),
        }
    }

    #[test]
    fn test_unit_created_without_meta_uses_record_number() {
        let action = decode(json!({
            "type": "verkehrsmittel_created",
            "payload": {"vmNummer": 11}
        }))
        .unwrap();
        assert_eq!(action.subject(), Some(UnitNumber(11)));
    }

    #[test]
    fn test_moved_delayed_arrived_decode() {
        assert_eq!(
            decode(json!({"type": "verkehrsmittel_moved", "payload": "Olten", "meta": 7})).unwrap(),
            Action::unit_moved(UnitNumber(7), "Olten")
        );
        assert_eq!(
            decode(json!({"type": "verkehrsmittel_delayed", "payload": -3, "meta": 7})).unwrap(),
            Action::unit_delayed(UnitNumber(7), -3)
        );
        assert_eq!(
            decode(json!({"type": "verkehrsmittel_arrived", "meta": 7})).unwrap(),
            Action::unit_arrived(UnitNumber(7))
        );
    }

    #[test]
    fn test_event_envelopes_decode_back_to_the_same_action() {
        // Tests and demos fake the server with `to_envelope`, so the
        // server-side shape must survive a trip through `decode`.
        for action in [
            Action::username_loaded("anna"),
            Action::unit_created(ic(4)),
            Action::unit_moved(UnitNumber(4), "Olten"),
            Action::unit_delayed(UnitNumber(4), 12),
            Action::unit_arrived(UnitNumber(4)),
        ] {
            assert_eq!(Action::decode(action.to_envelope().unwrap()).unwrap(), action);
        }
    }

    // =====================================================================
    // Rejections
    // =====================================================================

    #[test]
    fn test_unit_event_without_subject_is_rejected() {
        let err = decode(json!({"type": "verkehrsmittel_moved", "payload": "Olten"})).unwrap_err();
        assert!(matches!(err, ProtocolError::MissingSubject(k) if k == "verkehrsmittel_moved"));
    }

    #[test]
    fn test_wrong_payload_shapes_are_rejected() {
        let err = decode(json!({"type": "verkehrsmittel_delayed", "payload": "soon", "meta": 1}))
            .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidPayload { .. }));

        let err = decode(json!({"type": "verkehrsmittel_moved", "payload": 5, "meta": 1})).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidPayload { .. }));

        let err = decode(json!({"type": "verkehrsmittel_created", "payload": "x", "meta": 1}))
            .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidPayload { .. }));
    }

    #[test]
    fn test_unknown_kind_is_an_error_value() {
        let err = decode(json!({"type": "verkehrsmittel_removed", "meta": 1})).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownKind(_)));
    }

    // =====================================================================
    // Failures
    // =====================================================================

    #[test]
    fn test_error_envelope_becomes_failure_regardless_of_kind() {
        let action = decode(json!({
            "type": "server_error",
            "error": true,
            "payload": {"message": "no such unit", "name": "NotFound"},
            "meta": 99
        }))
        .unwrap();

        assert!(action.is_error());
        assert_eq!(action.kind(), "server_error");
        assert_eq!(action.subject(), Some(UnitNumber(99)));

        // Even a kind we'd otherwise reject.
        let action = decode(json!({"type": "whatever", "error": true, "payload": "boom"})).unwrap();
        assert_eq!(
            action,
            Action::failure("whatever", None, ErrorInfo::new("boom"))
        );
    }

    #[test]
    fn test_payload_envelopes_carry_serialized_bodies() {
        let env = Action::unit_created(ic(4)).to_envelope().unwrap();
        assert_eq!(env.payload["vmNummer"], json!(4));
        assert_eq!(env.meta, json!(4));

        let failure = Action::failure("server_error", Some(UnitNumber(4)), ErrorInfo::new("boom"));
        let env = failure.to_envelope().unwrap();
        assert!(env.error);
        assert_eq!(env.payload["message"], json!("boom"));
    }

    #[test]
    fn test_display_shows_kind_and_subject() {
        assert_eq!(Action::unit_arrived(UnitNumber(3)).to_string(), "verkehrsmittel_arrived(#3)");
        assert_eq!(Action::load_units().to_string(), "load_verkehrsmittel");
    }
}
