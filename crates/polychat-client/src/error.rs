//! Client error types.

use polychat_core::ConnectionError;
use polychat_proto::ChannelId;
use thiserror::Error;

/// Errors from local user intents against the chat state.
///
/// These reject an intent before anything is sent; they never touch the
/// connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// Channel is not in the current collection
    #[error("unknown channel: {0}")]
    UnknownChannel(ChannelId),

    /// Intent needs a focused channel and there is none
    #[error("no channel is focused")]
    NoFocus,

    /// Intent needs an identity and none is set
    #[error("no identity set")]
    NoIdentity,

    /// Message text is empty
    #[error("message is empty")]
    EmptyMessage,

    /// Channel name fails validation
    #[error("invalid channel name: {0:?}")]
    InvalidChannelName(String),

    /// Identity fails validation
    #[error("invalid username: {0:?}")]
    InvalidUsername(String),

    /// Outbox has no handler loop behind it
    #[error("session is closed")]
    SessionClosed,
}

/// Errors from a transport link.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Dialling the server failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Reading or writing the stream failed.
    #[error("stream error: {0}")]
    Stream(String),

    /// Frame could not be encoded.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Top-level error for session operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Connection layer rejected the operation
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Chat state rejected the intent
    #[error(transparent)]
    State(#[from] StateError),
}
