//! Protocol error types.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while encoding or decoding wire frames.
///
/// None of these are fatal: the connection layer logs them and drops the
/// offending frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame is not valid JSON or lacks the frame envelope.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// Topic name is not part of the supported set.
    #[error("unknown topic: {0}")]
    UnknownTopic(String),

    /// `data` does not match the shape expected for its topic.
    #[error("invalid payload for {topic}: {reason}")]
    InvalidPayload {
        /// Topic whose payload failed to decode
        topic: String,
        /// Decoder message
        reason: String,
    },

    /// A field required by the topic is absent.
    #[error("missing field {field} for {topic}")]
    MissingField {
        /// Topic that requires the field
        topic: String,
        /// Name of the absent field
        field: &'static str,
    },

    /// Frame could not be serialized.
    #[error("encode failed: {0}")]
    Encode(String),
}
