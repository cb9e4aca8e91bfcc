//! Typed payloads carried in frame `data`.
//!
//! The server never assigns message ids, so messages are plain value types:
//! [`WireMessage::dedup_key`] is the only notion of identity the client has.

use std::{borrow::Borrow, fmt};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Server-assigned channel identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    /// Wrap a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ChannelId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for ChannelId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// UTC instant attached to chat messages.
///
/// Decodes from either an RFC 3339 string or integer/float milliseconds since
/// the Unix epoch. Always encodes as RFC 3339 with millisecond precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Wrap a `chrono` instant.
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self(instant)
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Instant from milliseconds since the Unix epoch. `None` if out of range.
    pub fn from_millis(millis: i64) -> Option<Self> {
        DateTime::from_timestamp_millis(millis).map(Self)
    }

    /// Milliseconds since the Unix epoch.
    pub fn as_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }

    /// Underlying `chrono` instant.
    pub fn instant(&self) -> DateTime<Utc> {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Millis(i64),
            Fractional(f64),
            Text(String),
        }

        let out_of_range = || serde::de::Error::custom("timestamp out of range");
        match Raw::deserialize(deserializer)? {
            Raw::Millis(ms) => Self::from_millis(ms).ok_or_else(out_of_range),
            Raw::Fractional(ms) => Self::from_millis(ms as i64).ok_or_else(out_of_range),
            Raw::Text(text) => DateTime::parse_from_rfc3339(&text)
                .map(|dt| Self(dt.with_timezone(&Utc)))
                .map_err(serde::de::Error::custom),
        }
    }
}

/// Authoritative channel metadata from the last channel-list push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSnapshot {
    /// Channel identifier.
    pub id: ChannelId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Member count reported by the server.
    #[serde(default)]
    pub number_of_users: u32,
    /// Whether the local user is a member.
    #[serde(default)]
    pub join_status: bool,
}

/// History batch for one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelHistory {
    /// Channel the batch belongs to.
    pub id: ChannelId,
    /// Messages, oldest first. A `null` batch decodes as empty.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub messages: Vec<WireMessage>,
}

/// Chat message as carried on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage {
    /// Identity of the author.
    pub sender: String,
    /// Message text.
    pub data: String,
    /// Server timestamp.
    pub timestamp: Timestamp,
    /// Owning channel. History batches may omit it per message.
    #[serde(default)]
    pub channel_id: Option<ChannelId>,
}

/// Key deciding message identity for merge purposes.
pub type DedupKey = (String, String, Timestamp, Option<ChannelId>);

impl WireMessage {
    /// `(data, sender, timestamp, channelId)` tuple.
    pub fn dedup_key(&self) -> DedupKey {
        (self.data.clone(), self.sender.clone(), self.timestamp, self.channel_id.clone())
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_accepts_millis_and_rfc3339() {
        let from_ms: Timestamp = serde_json::from_str("1700000000123").unwrap();
        let from_text: Timestamp = serde_json::from_str("\"2023-11-14T22:13:20.123Z\"").unwrap();
        assert_eq!(from_ms, from_text);
        assert_eq!(from_ms.as_millis(), 1_700_000_000_123);
    }

    #[test]
    fn timestamp_rejects_garbage() {
        assert!(serde_json::from_str::<Timestamp>("\"yesterday\"").is_err());
        assert!(serde_json::from_str::<Timestamp>("true").is_err());
    }

    #[test]
    fn snapshot_tolerates_missing_optional_fields() {
        let snapshot: ChannelSnapshot = serde_json::from_str(r#"{"id":"g"}"#).unwrap();
        assert_eq!(snapshot.id.as_str(), "g");
        assert!(!snapshot.join_status);
        assert_eq!(snapshot.number_of_users, 0);
    }

    #[test]
    fn null_history_is_empty() {
        let history: ChannelHistory =
            serde_json::from_str(r#"{"id":"g","messages":null}"#).unwrap();
        assert!(history.messages.is_empty());
    }

    #[test]
    fn dedup_key_distinguishes_channels() {
        let ts = Timestamp::from_millis(1).unwrap();
        let a = WireMessage {
            sender: "A".into(),
            data: "hi".into(),
            timestamp: ts,
            channel_id: Some("g".into()),
        };
        let b = WireMessage { channel_id: Some("h".into()), ..a.clone() };
        assert_ne!(a.dedup_key(), b.dedup_key());
        assert_eq!(a.dedup_key(), a.clone().dedup_key());
    }
}
