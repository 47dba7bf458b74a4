//! Codec trait and the JSON implementation.
//!
//! A "codec" (coder/decoder) converts between Rust values and the text
//! frames the channel carries. Everything above this layer works with
//! [`Action`]s; everything below works with strings.

use serde::{Serialize, de::DeserializeOwned};

use crate::{Action, Envelope, ProtocolError};

/// Converts values to and from wire text.
///
/// ## Trait bounds explained
///
/// - `Send + Sync`: one codec value is used by the command effects on
///   the store task and by the dispatcher on its own task at once.
/// - `'static`: the codec is moved into those long-lived tasks, so it
///   can't borrow anything shorter-lived.
///
/// ## Generic methods
///
/// `encode` and `decode` work with any serde type, not just envelopes.
/// `decode` asks for `DeserializeOwned` rather than `Deserialize<'de>`:
/// the decoded value must outlive the frame it came from, which the
/// dispatcher drops as soon as the action is built.
///
/// The two provided methods, [`encode_action`](Self::encode_action) and
/// [`decode_action`](Self::decode_action), go through [`Envelope`] so
/// that an implementation only has to handle raw serde values.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into a text frame.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError>;

    /// Parses a text frame into a value.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the text is malformed or
    /// doesn't match `T`.
    fn decode<T: DeserializeOwned>(&self, text: &str) -> Result<T, ProtocolError>;

    /// Encodes an action as its wire envelope.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if the envelope or its payload
    /// can't be serialized.
    fn encode_action(&self, action: &Action) -> Result<String, ProtocolError> {
        self.encode(&action.to_envelope()?)
    }

    /// Decodes a text frame all the way to a typed action.
    fn decode_action(&self, text: &str) -> Result<Action, ProtocolError> {
        let envelope: Envelope = self.decode(text)?;
        Action::decode(envelope)
    }
}

/// A [`Codec`] backed by `serde_json`.
///
/// ```rust
/// use fleetwatch_protocol::{Action, Codec, JsonCodec, UnitNumber};
///
/// let codec = JsonCodec;
/// let text = codec.encode_action(&Action::delay_unit(UnitNumber(7), 5)).unwrap();
/// assert_eq!(text, r#"{"type":"delay_verkehrsmittel","payload":"5","meta":7,"error":false}"#);
///
/// let action = codec.decode_action(&text).unwrap();
/// assert_eq!(action, Action::delay_unit(UnitNumber(7), 5));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError> {
        serde_json::to_string(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, text: &str) -> Result<T, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Decode)
    }
}
