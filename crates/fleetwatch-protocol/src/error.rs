//! Error types for the protocol layer.
//!
//! Syntax errors (the text isn't JSON, or isn't an envelope) are
//! `Decode`. Messages that parse but make no sense for their kind are
//! reported with the kind attached so the log line says what was dropped.

/// Errors that can occur while encoding or decoding actions.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    ///
    /// With `serde_json` this only happens for a custom `Serialize` impl
    /// that reports an error, or a map whose keys aren't strings. The
    /// effect handlers log it and send nothing.
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// The text is not valid JSON, or not an envelope.
    ///
    /// Carries the underlying `serde_json` error, which includes the
    /// line and column of the problem.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The envelope's `type` is not part of the vocabulary.
    ///
    /// Newer servers may add kinds; the dispatcher logs this and keeps
    /// reading.
    #[error("unknown action kind {0:?}")]
    UnknownKind(String),

    /// The payload does not have the shape this kind requires.
    #[error("invalid payload for {kind}: {reason}")]
    InvalidPayload { kind: String, reason: String },

    /// The kind needs a unit number in `meta` and none was given.
    #[error("{0} requires a unit number subject")]
    MissingSubject(String),
}

impl ProtocolError {
    pub(crate) fn invalid(kind: &str, reason: impl ToString) -> Self {
        Self::InvalidPayload {
            kind: kind.to_string(),
            reason: reason.to_string(),
        }
    }
}
