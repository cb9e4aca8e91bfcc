//! The wire frame.
//!
//! A `Frame` is one JSON text message on the duplex channel:
//!
//! ```text
//! { "topic": string, "channelId": string|null, "data": <topic-specific> }
//! ```
//!
//! Inbound chat messages additionally carry `sender` and `timestamp` next to
//! the envelope. The topic is kept as the raw wire string so that the router
//! can report unknown topics instead of failing the whole decode; typed access
//! goes through [`Frame::inbound_topic`] and the payload accessors.
//!
//! # Invariants
//!
//! - Outbound frames are only built from an [`OutboundTopic`], so the client
//!   can never put an unsupported topic on the wire.
//! - `channelId` is always present in encoded output (`null` when absent).

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
    ChannelHistory, ChannelId, ChannelSnapshot, InboundTopic, OutboundTopic, Timestamp,
    WireMessage,
    errors::{ProtocolError, Result},
};

/// One logical message on the event channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    /// Topic name as found on the wire.
    #[serde(alias = "eventType")]
    pub topic: String,

    /// Target channel, if the topic is channel-scoped.
    #[serde(default)]
    pub channel_id: Option<ChannelId>,

    /// Topic-specific payload.
    #[serde(default)]
    pub data: Value,

    /// Author of an inbound chat message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,

    /// Server timestamp of an inbound chat message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
}

impl Frame {
    /// Build an outbound frame.
    pub fn outbound(topic: OutboundTopic, channel_id: Option<ChannelId>, data: Value) -> Self {
        Self {
            topic: topic.as_str().to_string(),
            channel_id,
            data,
            sender: None,
            timestamp: None,
        }
    }

    /// Parse a frame from a JSON text message.
    ///
    /// Only the envelope is validated here. Payloads are decoded lazily by
    /// whichever observer consumes the topic.
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }

    /// Serialize the frame to a JSON text message.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    /// Typed inbound topic.
    pub fn inbound_topic(&self) -> Result<InboundTopic> {
        self.topic.parse()
    }

    /// Typed outbound topic.
    pub fn outbound_topic(&self) -> Result<OutboundTopic> {
        self.topic.parse()
    }

    /// Decode `data` as `T`.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T> {
        T::deserialize(&self.data).map_err(|e| ProtocolError::InvalidPayload {
            topic: self.topic.clone(),
            reason: e.to_string(),
        })
    }

    /// Channel snapshots carried by a channel-list frame.
    pub fn channel_snapshots(&self) -> Result<Vec<ChannelSnapshot>> {
        if self.data.is_null() {
            return Ok(Vec::new());
        }
        self.data_as()
    }

    /// History batch carried by a channel-history frame.
    pub fn channel_history(&self) -> Result<ChannelHistory> {
        self.data_as()
    }

    /// Chat message carried by a message frame.
    ///
    /// The text is `data`; author, time and channel come from the envelope.
    pub fn chat_message(&self) -> Result<WireMessage> {
        let data = self.data_as::<String>()?;
        let channel_id = self.require(self.channel_id.clone(), "channelId")?;
        let sender = self.require(self.sender.clone(), "sender")?;
        let timestamp = self.require(self.timestamp, "timestamp")?;

        Ok(WireMessage { sender, data, timestamp, channel_id: Some(channel_id) })
    }

    /// Text carried by an error frame. `None` for an empty error.
    pub fn error_text(&self) -> Option<String> {
        match &self.data {
            Value::Null => None,
            Value::String(text) if text.is_empty() => None,
            Value::String(text) => Some(text.clone()),
            other => Some(other.to_string()),
        }
    }

    fn require<T>(&self, value: Option<T>, field: &'static str) -> Result<T> {
        value.ok_or_else(|| ProtocolError::MissingField { topic: self.topic.clone(), field })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn outbound_frame_encodes_null_channel() {
        let frame = Frame::outbound(OutboundTopic::CreateChannel, None, json!("general"));
        let text = frame.encode().unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value, json!({"topic": "onCreateChannel", "channelId": null, "data": "general"}));
    }

    #[test]
    fn decode_accepts_legacy_event_type_key() {
        let frame = Frame::decode(r#"{"eventType":"onError","channelId":null,"data":"boom"}"#)
            .unwrap();
        assert_eq!(frame.inbound_topic(), Ok(InboundTopic::Error));
        assert_eq!(frame.error_text().as_deref(), Some("boom"));
    }

    #[test]
    fn decode_rejects_non_json() {
        assert!(matches!(Frame::decode("not json"), Err(ProtocolError::Malformed(_))));
        assert!(matches!(Frame::decode(r#"{"channelId":"g"}"#), Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn unknown_topic_decodes_but_does_not_type() {
        let frame = Frame::decode(r#"{"topic":"onTyping","channelId":"g","data":null}"#).unwrap();
        assert_eq!(frame.inbound_topic(), Err(ProtocolError::UnknownTopic("onTyping".into())));
    }

    #[test]
    fn chat_message_requires_sender() {
        let frame = Frame::decode(
            r#"{"topic":"onMessage","channelId":"g","data":"hi","timestamp":1000}"#,
        )
        .unwrap();
        assert_eq!(
            frame.chat_message(),
            Err(ProtocolError::MissingField { topic: "onMessage".into(), field: "sender" })
        );
    }

    #[test]
    fn chat_message_reads_envelope_fields() {
        let frame = Frame::decode(
            r#"{"topic":"onMessage","channelId":"g","data":"hi","sender":"A","timestamp":1000}"#,
        )
        .unwrap();
        let message = frame.chat_message().unwrap();
        assert_eq!(message.sender, "A");
        assert_eq!(message.data, "hi");
        assert_eq!(message.channel_id, Some(ChannelId::from("g")));
        assert_eq!(message.timestamp.as_millis(), 1000);
    }

    #[test]
    fn null_channel_list_is_empty() {
        let frame =
            Frame::decode(r#"{"topic":"updateChannelsList","channelId":null,"data":null}"#)
                .unwrap();
        assert_eq!(frame.channel_snapshots(), Ok(vec![]));
    }

    #[test]
    fn empty_error_has_no_text() {
        let frame = Frame::decode(r#"{"topic":"onError","channelId":null,"data":""}"#).unwrap();
        assert_eq!(frame.error_text(), None);
    }
}
