//! Domain records and the wire envelope.
//!
//! These are the structures that travel "on the wire" between the fleet
//! server and this client. Field names on the wire follow the server's
//! camelCase (German) naming; the Rust side uses descriptive English
//! names and `#[serde(rename = "...")]` bridges the two.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// The unique key of a transport unit (the server's `vmNummer`).
///
/// A newtype over `u64` so a unit number can't be confused with a delay
/// or any other integer. `#[serde(transparent)]` keeps it a plain number
/// in JSON: `UnitNumber(7)` is `7`, not `{"0":7}`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UnitNumber(pub u64);

impl fmt::Display for UnitNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for UnitNumber {
    fn from(n: u64) -> Self {
        Self(n)
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One tracked moving entity: a train, bus, tram, and so on.
///
/// `route` is fixed when the unit is created. `current_position`,
/// `delay_minutes` and `arrived` change through their matching events.
///
/// The server may send `null` for string or list fields of a unit that
/// hasn't departed yet; those decode to the empty default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportUnit {
    #[serde(rename = "vmNummer")]
    pub unit_number: UnitNumber,

    /// Category such as `"IC"` or `"S-Bahn"`.
    #[serde(rename = "vmArt", default, deserialize_with = "null_as_default")]
    pub kind: String,

    /// Display name.
    #[serde(rename = "bezeichnung", default, deserialize_with = "null_as_default")]
    pub label: String,

    /// Ordered waypoint identifiers.
    #[serde(rename = "fahrtpunkte", default, deserialize_with = "null_as_default")]
    pub route: Vec<String>,

    #[serde(
        rename = "aktuellePosition",
        default,
        deserialize_with = "null_as_default"
    )]
    pub current_position: String,

    /// Signed; a negative value means the unit runs early.
    #[serde(rename = "delay", default, deserialize_with = "null_as_default")]
    pub delay_minutes: i32,

    /// `None` until the server or the reducer marks the unit arrived.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrived: Option<bool>,
}

impl TransportUnit {
    /// Creates a unit positioned at the first waypoint of `route`, on time.
    pub fn new(
        unit_number: impl Into<UnitNumber>,
        kind: impl Into<String>,
        label: impl Into<String>,
        route: Vec<String>,
    ) -> Self {
        let current_position = route.first().cloned().unwrap_or_default();
        Self {
            unit_number: unit_number.into(),
            kind: kind.into(),
            label: label.into(),
            route,
            current_position,
            delay_minutes: 0,
            arrived: None,
        }
    }

    /// Whether the unit has reached its destination.
    pub fn is_arrived(&self) -> bool {
        self.arrived.unwrap_or(false)
    }
}

/// The signed-in user's profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
}

impl User {
    /// Placeholder name shown until the server resolves the user.
    pub const UNDEFINED: &'static str = "<undefined>";

    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for User {
    fn default() -> Self {
        Self::new(Self::UNDEFINED)
    }
}

/// Details of a server-side failure carried by an error envelope.
///
/// The server sends either an object `{message, name?, stack?}` or a bare
/// string; [`ErrorInfo::from_value`] accepts both.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ErrorInfo {
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            name: None,
            stack: None,
        }
    }

    /// Reads an error payload leniently. Never fails: shapes it doesn't
    /// recognize are kept as their JSON text in `message`.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(s) => Self::new(s.clone()),
            Value::Null => Self::new("unspecified server error"),
            Value::Object(_) => serde_json::from_value(value.clone())
                .unwrap_or_else(|_| Self::new(value.to_string())),
            other => Self::new(other.to_string()),
        }
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The JSON object that carries every message in both directions.
///
/// ```text
/// {"type": "verkehrsmittel_moved", "payload": "Bern", "meta": 7, "error": false}
///   ^ kind discriminant            ^ data           ^ subject   ^ failure flag
/// ```
///
/// The envelope is deliberately loose (`payload` and `meta` are raw JSON
/// values). Turning it into a typed [`Action`](crate::Action) is a
/// separate step that can fail per kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub payload: Value,

    /// The subject, usually a unit number. Any JSON value is tolerated
    /// here so that error envelopes with unusual `meta` still decode.
    #[serde(default)]
    pub meta: Value,

    #[serde(default)]
    pub error: bool,
}

impl Envelope {
    /// Creates a non-error envelope.
    pub fn new(kind: impl Into<String>, payload: Value, meta: Option<UnitNumber>) -> Self {
        Self {
            kind: kind.into(),
            payload,
            meta: meta.map_or(Value::Null, |n| Value::from(n.0)),
            error: false,
        }
    }

    /// The subject as a unit number, if `meta` holds a non-negative
    /// integer (or a string of one).
    pub fn subject(&self) -> Option<UnitNumber> {
        match &self.meta {
            Value::Number(n) => n.as_u64().map(UnitNumber),
            Value::String(s) => s.trim().parse().ok().map(UnitNumber),
            _ => None,
        }
    }
}

/// Treats an explicit JSON `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_unit_number_is_a_plain_number() {
        assert_eq!(serde_json::to_string(&UnitNumber(42)).unwrap(), "42");
        assert_eq!(UnitNumber(7).to_string(), "#7");
    }

    #[test]
    fn test_unit_decodes_server_field_names() {
        let unit: TransportUnit = serde_json::from_value(json!({
            "vmNummer": 7,
            "vmArt": "IC",
            "bezeichnung": "IC 1",
            "fahrtpunkte": ["Bern", "Olten", "Zürich"],
            "aktuellePosition": "Olten",
            "delay": -2
        }))
        .unwrap();

        assert_eq!(unit.unit_number, UnitNumber(7));
        assert_eq!(unit.kind, "IC");
        assert_eq!(unit.label, "IC 1");
        assert_eq!(unit.route, vec!["Bern", "Olten", "Zürich"]);
        assert_eq!(unit.current_position, "Olten");
        assert_eq!(unit.delay_minutes, -2);
        assert_eq!(unit.arrived, None);
        assert!(!unit.is_arrived());
    }

    #[test]
    fn test_unit_tolerates_nulls_and_missing_fields() {
        let unit: TransportUnit = serde_json::from_value(json!({
            "vmNummer": 3,
            "aktuellePosition": null,
            "fahrtpunkte": null
        }))
        .unwrap();
        assert_eq!(unit.current_position, "");
        assert!(unit.route.is_empty());
        assert_eq!(unit.delay_minutes, 0);
    }

    #[test]
    fn test_unit_without_number_is_rejected() {
        let result: Result<TransportUnit, _> =
            serde_json::from_value(json!({"vmArt": "IC"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_unit_serializes_server_field_names() {
        let unit = TransportUnit::new(5, "S", "S 5", vec!["A".into(), "B".into()]);
        let json = serde_json::to_value(&unit).unwrap();
        assert_eq!(json["vmNummer"], 5);
        assert_eq!(json["aktuellePosition"], "A");
        assert_eq!(json["delay"], 0);
        // Unset flag is omitted rather than sent as null.
        assert!(json.get("arrived").is_none());
    }

    #[test]
    fn test_user_default_is_placeholder() {
        assert_eq!(User::default().name, "<undefined>");
    }

    #[test]
    fn test_error_info_accepts_object_or_string() {
        let info = ErrorInfo::from_value(&json!({
            "message": "unit unknown",
            "name": "IllegalArgumentException"
        }));
        assert_eq!(info.message, "unit unknown");
        assert_eq!(info.to_string(), "IllegalArgumentException: unit unknown");

        let info = ErrorInfo::from_value(&json!("boom"));
        assert_eq!(info, ErrorInfo::new("boom"));

        let info = ErrorInfo::from_value(&json!(17));
        assert_eq!(info.message, "17");
    }

    #[test]
    fn test_envelope_defaults_optional_fields() {
        let env: Envelope = serde_json::from_str(r#"{"type":"load_username"}"#).unwrap();
        assert_eq!(env.kind, "load_username");
        assert!(env.payload.is_null());
        assert!(env.meta.is_null());
        assert!(!env.error);
        assert_eq!(env.subject(), None);
    }

    #[test]
    fn test_envelope_subject_from_number_or_string() {
        let env = Envelope::new("x", Value::Null, Some(UnitNumber(9)));
        assert_eq!(env.subject(), Some(UnitNumber(9)));

        let env: Envelope = serde_json::from_str(r#"{"type":"x","meta":"12"}"#).unwrap();
        assert_eq!(env.subject(), Some(UnitNumber(12)));

        let env: Envelope = serde_json::from_str(r#"{"type":"x","meta":-1}"#).unwrap();
        assert_eq!(env.subject(), None);
    }
}
