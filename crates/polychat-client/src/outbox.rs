//! Outbound requests and the channel that carries them to the handler loop.
//!
//! The reconciler and controller never touch the connection directly. They
//! describe what should go out as [`Outbound`] values and push them through
//! an [`Outbox`]; the session loop drains the other end and feeds the
//! connection handler. Observers run inside the handler's dispatch, so this
//! indirection is what keeps them from re-entering it.

use polychat_proto::{ChannelId, Frame, OutboundTopic};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::StateError;

/// Thumbs-up emoji sent by a "like".
pub const LIKE: &str = "\u{1F44D}";

/// Something the client wants the server to know.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Join a channel
    Join(ChannelId),
    /// Leave a channel
    Leave(ChannelId),
    /// Request a channel's history
    FetchHistory(ChannelId),
    /// Post a chat message
    SendMessage {
        /// Target channel
        channel_id: ChannelId,
        /// Message text
        text: String,
    },
    /// Create a channel
    CreateChannel(String),
    /// Join a channel's voice room
    JoinVoice {
        /// Channel hosting the room
        channel_id: ChannelId,
        /// Opaque media-negotiation offer
        offer: Value,
    },
    /// Leave a voice room
    LeaveVoice(ChannelId),
}

impl Outbound {
    /// Topic this request is sent on.
    pub fn topic(&self) -> OutboundTopic {
        match self {
            Self::Join(_) => OutboundTopic::JoinChannel,
            Self::Leave(_) => OutboundTopic::LeaveChannel,
            Self::FetchHistory(_) => OutboundTopic::FetchHistory,
            Self::SendMessage { .. } => OutboundTopic::SendMessage,
            Self::CreateChannel(_) => OutboundTopic::CreateChannel,
            Self::JoinVoice { .. } => OutboundTopic::JoinVoice,
            Self::LeaveVoice(_) => OutboundTopic::LeaveVoice,
        }
    }

    /// Wire frame for this request.
    pub fn into_frame(self) -> Frame {
        let topic = self.topic();
        let (channel_id, data) = match self {
            Self::Join(id) | Self::Leave(id) | Self::FetchHistory(id) | Self::LeaveVoice(id) => {
                (Some(id), Value::Null)
            },
            Self::SendMessage { channel_id, text } => (Some(channel_id), Value::String(text)),
            Self::CreateChannel(name) => (None, Value::String(name)),
            Self::JoinVoice { channel_id, offer } => (Some(channel_id), offer),
        };
        Frame::outbound(topic, channel_id, data)
    }
}

/// Request for the session loop.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Emit a frame through the connection handler
    Emit(Frame),
    /// Reconnect under a new identity
    ChangeIdentity(String),
    /// Close the connection and reset the model
    SignOut,
    /// Close the connection and stop, keeping the model
    Quit,
}

/// Cloneable sender half of the command channel.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<Command>,
}

impl Outbox {
    /// Create an outbox and the receiver the session loop drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Command>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue one request.
    pub fn send(&self, request: Outbound) -> Result<(), StateError> {
        tracing::debug!(topic = %request.topic(), "queue outbound");
        self.command(Command::Emit(request.into_frame()))
    }

    /// Queue several requests in order.
    pub fn send_all(&self, requests: impl IntoIterator<Item = Outbound>) -> Result<(), StateError> {
        requests.into_iter().try_for_each(|request| self.send(request))
    }

    /// Ask the session to reconnect as `identity`.
    pub fn change_identity(&self, identity: impl Into<String>) -> Result<(), StateError> {
        self.command(Command::ChangeIdentity(identity.into()))
    }

    /// Ask the session to sign out.
    pub fn sign_out(&self) -> Result<(), StateError> {
        self.command(Command::SignOut)
    }

    /// Ask the session to close and stop.
    pub fn quit(&self) -> Result<(), StateError> {
        self.command(Command::Quit)
    }

    fn command(&self, command: Command) -> Result<(), StateError> {
        self.tx.send(command).map_err(|_| StateError::SessionClosed)
    }
}
