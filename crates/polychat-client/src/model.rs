//! Local data model.
//!
//! Channels carry the latest server metadata plus a locally accumulated
//! message history. Messages have no server-assigned id; their identity is
//! the dedup key `(data, sender, timestamp, channel)`.

use polychat_proto::{ChannelId, ChannelSnapshot, Timestamp, WireMessage, payloads::DedupKey};

/// Chat message as held locally.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Message {
    /// Identity of the author
    pub sender: String,
    /// Message text
    pub data: String,
    /// Server timestamp (local send time for unconfirmed messages)
    pub timestamp: Timestamp,
    /// Owning channel
    pub channel_id: ChannelId,
}

impl Message {
    /// Convert a wire message received for `channel_id`.
    ///
    /// History batches may omit the channel per message; the batch's channel
    /// is used then.
    pub fn from_wire(wire: WireMessage, channel_id: &ChannelId) -> Self {
        Self {
            sender: wire.sender,
            data: wire.data,
            timestamp: wire.timestamp,
            channel_id: wire.channel_id.unwrap_or_else(|| channel_id.clone()),
        }
    }

    /// `(data, sender, timestamp, channelId)`.
    pub fn dedup_key(&self) -> DedupKey {
        (self.data.clone(), self.sender.clone(), self.timestamp, Some(self.channel_id.clone()))
    }
}

/// Channel with its local history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    /// Metadata from the last snapshot
    pub snapshot: ChannelSnapshot,
    /// History, oldest first, free of duplicate dedup keys
    pub messages: Vec<Message>,
}

impl Channel {
    /// Channel with no history yet.
    pub fn new(snapshot: ChannelSnapshot) -> Self {
        Self { snapshot, messages: Vec::new() }
    }

    /// Channel identifier.
    pub fn id(&self) -> &ChannelId {
        &self.snapshot.id
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.snapshot.name
    }

    /// True if the server marked the local user as a member.
    pub fn is_joined(&self) -> bool {
        self.snapshot.join_status
    }

    /// True once any message is held locally.
    pub fn has_history(&self) -> bool {
        !self.messages.is_empty()
    }
}

/// Joined-channel index entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedChannel {
    /// Metadata from the snapshot that marked the channel joined
    pub channel: ChannelSnapshot,
    /// Messages received since the channel was last focused
    pub unread: u32,
}
