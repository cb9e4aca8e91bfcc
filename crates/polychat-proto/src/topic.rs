//! Closed topic sets for each direction of the channel.
//!
//! Topics are matched by their wire names. Both enums are exhaustive: adding
//! a topic means adding a variant, its name and its slot in `ALL`, and every
//! `match` in the workspace will point at the code that needs to handle it.

use std::{fmt, str::FromStr};

use crate::errors::ProtocolError;

/// Topics the server pushes to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InboundTopic {
    /// Full channel-list snapshot (`data`: array of channel snapshots).
    ChannelList,
    /// History of one channel (`data`: `{id, messages}`).
    ChannelHistory,
    /// Live chat message (`data`: text, `channelId` required).
    Message,
    /// Server-reported error (`data`: text).
    Error,
    /// Opaque media-negotiation signal.
    PeerSignal,
    /// Acknowledgement of a channel creation.
    ChannelCreated,
    /// Acknowledgement of a join.
    ChannelJoined,
    /// Acknowledgement of a leave.
    ChannelLeft,
}

impl InboundTopic {
    /// Every supported inbound topic.
    pub const ALL: [Self; 8] = [
        Self::ChannelList,
        Self::ChannelHistory,
        Self::Message,
        Self::Error,
        Self::PeerSignal,
        Self::ChannelCreated,
        Self::ChannelJoined,
        Self::ChannelLeft,
    ];

    /// Name of the topic on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ChannelList => "updateChannelsList",
            Self::ChannelHistory => "onGetChannel",
            Self::Message => "onMessage",
            Self::Error => "onError",
            Self::PeerSignal => "onPeerSignal",
            Self::ChannelCreated => "onCreateChannel",
            Self::ChannelJoined => "onJoinChannel",
            Self::ChannelLeft => "onLeaveChannel",
        }
    }

    /// Look up a topic by wire name. `None` if unsupported.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|topic| topic.as_str() == name)
    }
}

impl FromStr for InboundTopic {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| ProtocolError::UnknownTopic(s.to_string()))
    }
}

impl fmt::Display for InboundTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Topics the client sends to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OutboundTopic {
    /// Ask to join a channel.
    JoinChannel,
    /// Ask to leave a channel.
    LeaveChannel,
    /// Create a channel (`data`: name, no channel id).
    CreateChannel,
    /// Request a channel's history.
    FetchHistory,
    /// Post a chat message (`data`: text).
    SendMessage,
    /// Join a channel's voice room (`data`: opaque offer).
    JoinVoice,
    /// Leave a channel's voice room.
    LeaveVoice,
}

impl OutboundTopic {
    /// Every supported outbound topic.
    pub const ALL: [Self; 7] = [
        Self::JoinChannel,
        Self::LeaveChannel,
        Self::CreateChannel,
        Self::FetchHistory,
        Self::SendMessage,
        Self::JoinVoice,
        Self::LeaveVoice,
    ];

    /// Name of the topic on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::JoinChannel => "onJoinChannel",
            Self::LeaveChannel => "onLeaveChannel",
            Self::CreateChannel => "onCreateChannel",
            Self::FetchHistory => "onGetChannel",
            Self::SendMessage => "onMessage",
            Self::JoinVoice => "onJoinVocalChannel",
            Self::LeaveVoice => "onLeaveVocalChannel",
        }
    }

    /// Look up a topic by wire name. `None` if unsupported.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|topic| topic.as_str() == name)
    }
}

impl FromStr for OutboundTopic {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| ProtocolError::UnknownTopic(s.to_string()))
    }
}

impl fmt::Display for OutboundTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_names_round_trip() {
        for topic in InboundTopic::ALL {
            assert_eq!(InboundTopic::from_name(topic.as_str()), Some(topic));
        }
    }

    #[test]
    fn outbound_names_round_trip() {
        for topic in OutboundTopic::ALL {
            assert_eq!(topic.as_str().parse::<OutboundTopic>(), Ok(topic));
        }
    }

    #[test]
    fn unknown_name_is_an_error() {
        assert_eq!(
            "onSomethingElse".parse::<InboundTopic>(),
            Err(ProtocolError::UnknownTopic("onSomethingElse".to_string()))
        );
        // Outbound-only names are not accepted inbound
        assert_eq!(InboundTopic::from_name("onJoinVocalChannel"), None);
    }
}
