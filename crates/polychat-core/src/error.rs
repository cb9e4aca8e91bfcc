//! Error types for the connection layer.
//!
//! Strongly-typed errors for the connection state machine and for the
//! observers attached to event buses. None of them end a session: the driver
//! logs them and keeps running.

use polychat_proto::ProtocolError;
use thiserror::Error;

use crate::connection::ConnectionState;

/// Errors that can occur during connection state machine operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Invalid state transition attempted
    #[error("invalid state transition: cannot {operation} from {state:?}")]
    InvalidState {
        /// Current state when error occurred
        state: ConnectionState,
        /// Operation that was attempted
        operation: &'static str,
    },

    /// `connect` was called before an identity was set
    #[error("no identity set for the connection")]
    MissingIdentity,

    /// Base URL cannot be turned into a connection URL
    #[error("invalid server url {url}: {reason}")]
    InvalidUrl {
        /// URL that failed to parse
        url: String,
        /// Parser message
        reason: String,
    },

    /// Topic name is not part of the fixed topic set
    #[error("unknown topic: {0}")]
    UnknownTopic(String),

    /// Protocol error from frame parsing/validation
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<ProtocolError> for ConnectionError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::UnknownTopic(topic) => Self::UnknownTopic(topic),
            other => Self::Protocol(other.to_string()),
        }
    }
}

/// Failure reported by an event-bus subscriber.
///
/// Returned from a callback to signal that it could not handle an event. The
/// bus logs it and continues delivering to the remaining subscribers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ObserverError {
    /// Event payload did not decode for the observer's topic
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Observer rejected the event
    #[error("{0}")]
    Rejected(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_topic_keeps_its_kind_across_layers() {
        let err = ConnectionError::from(ProtocolError::UnknownTopic("onTyping".to_string()));
        assert_eq!(err, ConnectionError::UnknownTopic("onTyping".to_string()));

        let err = ConnectionError::from(ProtocolError::Malformed("eof".to_string()));
        assert!(matches!(err, ConnectionError::Protocol(_)));
    }
}
