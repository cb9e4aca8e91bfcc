//! Chat state reconciliation.
//!
//! [`ChatState`] merges server-pushed channel snapshots and history batches
//! into locally held state, counts unread messages, and tracks which locally
//! sent messages the server has echoed back.
//!
//! Operations that need the server to act return [`Outbound`] requests
//! instead of sending anything; the caller forwards them.
//!
//! # Invariants
//!
//! - A channel's history never holds two messages with the same dedup key.
//! - A joined-index entry exists for a channel iff the last snapshot marked
//!   it joined.
//! - The focused channel is always in the collection; an empty collection
//!   has no focus.
//! - The focused channel never accumulates unread messages.

use std::collections::{HashMap, HashSet, VecDeque};

use polychat_proto::{ChannelId, ChannelSnapshot, Timestamp, WireMessage, payloads::DedupKey};
use serde_json::Value;

use crate::{
    error::StateError,
    model::{Channel, JoinedChannel, Message},
    outbox::{LIKE, Outbound},
};

/// Result of applying a channel-list snapshot.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SnapshotOutcome {
    /// True if the previous focus is still a joined channel. When false the
    /// whole view needs redrawing.
    pub focus_preserved: bool,
    /// Requests triggered by a refocus.
    pub requests: Vec<Outbound>,
}

/// Result of ingesting one live message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ingested {
    /// False if the message was an exact replay and was skipped
    pub appended: bool,
    /// True if the message landed in the focused channel
    pub focused: bool,
    /// True if it confirmed one of the local user's pending messages
    pub confirmed: bool,
}

/// User/session model and channel collection.
#[derive(Debug, Clone, Default)]
pub struct ChatState {
    identity: Option<String>,
    /// Joined channels first, each group in snapshot order
    channels: Vec<Channel>,
    joined: HashMap<ChannelId, JoinedChannel>,
    focus: Option<ChannelId>,
    unconfirmed: HashMap<ChannelId, Vec<Message>>,
    confirmed: HashMap<ChannelId, Vec<Message>>,
    errors: VecDeque<String>,
    voice: Option<ChannelId>,
}

impl ChatState {
    /// Empty model for `identity`.
    pub fn new(identity: impl Into<String>) -> Self {
        Self { identity: Some(identity.into()), ..Self::default() }
    }

    /// Local identity, if signed in.
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Replace the local identity. Channel state is kept.
    pub fn set_identity(&mut self, identity: impl Into<String>) {
        self.identity = Some(identity.into());
    }

    /// Discard everything, including the identity.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Channel collection, joined channels first.
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Look up a channel.
    pub fn channel(&self, id: &ChannelId) -> Option<&Channel> {
        self.channels.iter().find(|c| c.id() == id)
    }

    /// Focused channel id.
    pub fn focus(&self) -> Option<&ChannelId> {
        self.focus.as_ref()
    }

    /// Focused channel.
    pub fn focused_channel(&self) -> Option<&Channel> {
        self.focus.as_ref().and_then(|id| self.channel(id))
    }

    /// True if the joined index holds `id`.
    pub fn is_joined(&self, id: &ChannelId) -> bool {
        self.joined.contains_key(id)
    }

    /// Joined channels in collection order.
    pub fn joined_channels(&self) -> impl Iterator<Item = &JoinedChannel> {
        self.channels.iter().filter_map(|c| self.joined.get(c.id()))
    }

    /// Unread count for a channel. Zero for channels not joined.
    pub fn unread(&self, id: &ChannelId) -> u32 {
        self.joined.get(id).map_or(0, |entry| entry.unread)
    }

    /// Unread count across all joined channels.
    pub fn total_unread(&self) -> u32 {
        self.joined.values().map(|entry| entry.unread).sum()
    }

    /// Sent messages not yet echoed back for a channel.
    pub fn unconfirmed(&self, id: &ChannelId) -> &[Message] {
        self.unconfirmed.get(id).map_or(&[], Vec::as_slice)
    }

    /// Echoed-back messages for a channel.
    pub fn confirmed(&self, id: &ChannelId) -> &[Message] {
        self.confirmed.get(id).map_or(&[], Vec::as_slice)
    }

    /// True if `message` is a confirmed send by the local user.
    ///
    /// Matched on text and server timestamp within the message's channel.
    pub fn has_sent_message(&self, message: &Message) -> bool {
        self.confirmed(&message.channel_id)
            .iter()
            .any(|m| m.data == message.data && m.timestamp == message.timestamp)
    }

    /// Voice room the local user is in.
    pub fn voice_channel(&self) -> Option<&ChannelId> {
        self.voice.as_ref()
    }

    /// Pending server errors, oldest first.
    pub fn errors(&self) -> impl Iterator<Item = &str> {
        self.errors.iter().map(String::as_str)
    }

    /// Oldest pending server error.
    pub fn current_error(&self) -> Option<&str> {
        self.errors.front().map(String::as_str)
    }

    /// Merge a channel-list snapshot.
    ///
    /// An empty snapshot clears the collection, the joined index and the
    /// focus. Otherwise known channels keep their history and joined
    /// channels keep their unread counters. If the focus is no longer a
    /// joined channel, the first channel is focused instead.
    pub fn apply_snapshot(&mut self, snapshots: Vec<ChannelSnapshot>) -> SnapshotOutcome {
        if snapshots.is_empty() {
            self.channels.clear();
            self.joined.clear();
            self.focus = None;
            return SnapshotOutcome::default();
        }

        let mut histories: HashMap<ChannelId, Vec<Message>> =
            self.channels.drain(..).map(|c| (c.snapshot.id, c.messages)).collect();

        let mut seen = HashSet::with_capacity(snapshots.len());
        let mut joined = HashMap::new();
        let mut members = Vec::new();
        let mut others = Vec::new();

        for snapshot in snapshots {
            if !seen.insert(snapshot.id.clone()) {
                tracing::warn!(channel = %snapshot.id, "duplicate channel in snapshot");
                continue;
            }

            let messages = histories.remove(&snapshot.id).unwrap_or_default();

            if snapshot.join_status {
                let unread = self.unread(&snapshot.id);
                joined.insert(snapshot.id.clone(), JoinedChannel {
                    channel: snapshot.clone(),
                    unread,
                });
                members.push(Channel { snapshot, messages });
            } else {
                others.push(Channel { snapshot, messages });
            }
        }

        members.extend(others);
        self.channels = members;
        self.joined = joined;

        let focus_preserved = self.focus.as_ref().is_some_and(|id| self.joined.contains_key(id));
        let mut requests = Vec::new();
        if !focus_preserved {
            let first = self.channels.first().map(|c| c.id().clone());
            self.focus = None;
            if let Some(first) = first {
                tracing::debug!(channel = %first, "focus invalidated by snapshot");
                requests = self.focus_on(first);
            }
        }

        SnapshotOutcome { focus_preserved, requests }
    }

    /// Merge a history batch into a channel.
    ///
    /// Incoming messages come first, then previously held ones not already
    /// present. Returns `false` for an empty batch or an unknown channel.
    pub fn apply_history(&mut self, id: &ChannelId, messages: Vec<WireMessage>) -> bool {
        if messages.is_empty() {
            return false;
        }
        let Some(channel) = self.channels.iter_mut().find(|c| c.id() == id) else {
            tracing::debug!(channel = %id, "history for unknown channel");
            return false;
        };

        let incoming = messages.into_iter().map(|wire| Message::from_wire(wire, id));
        let previous = std::mem::take(&mut channel.messages);

        let mut keys: HashSet<DedupKey> = HashSet::new();
        channel.messages =
            incoming.chain(previous).filter(|message| keys.insert(message.dedup_key())).collect();

        true
    }

    /// Append a live message to its channel.
    ///
    /// An exact replay is skipped. A message from the local identity
    /// confirms the first pending message with the same text. Joined
    /// channels other than the focused one gain an unread message.
    pub fn ingest(&mut self, wire: WireMessage, id: &ChannelId) -> Result<Ingested, StateError> {
        let Some(channel) = self.channels.iter_mut().find(|c| c.id() == id) else {
            return Err(StateError::UnknownChannel(id.clone()));
        };

        let message = Message {
            sender: wire.sender,
            data: wire.data,
            timestamp: wire.timestamp,
            channel_id: id.clone(),
        };
        let focused = self.focus.as_ref() == Some(id);

        if channel.messages.contains(&message) {
            return Ok(Ingested { appended: false, focused, confirmed: false });
        }
        channel.messages.push(message.clone());

        let confirmed =
            self.identity.as_deref() == Some(message.sender.as_str()) && self.confirm(message);

        if !focused && let Some(entry) = self.joined.get_mut(id) {
            entry.unread = entry.unread.saturating_add(1);
        }

        Ok(Ingested { appended: true, focused, confirmed })
    }

    /// Focus a channel.
    ///
    /// Requests history if none is held and a join if the user is not a
    /// member; otherwise clears the unread counter.
    pub fn set_focus(&mut self, id: &ChannelId) -> Result<Vec<Outbound>, StateError> {
        if self.channel(id).is_none() {
            return Err(StateError::UnknownChannel(id.clone()));
        }
        Ok(self.focus_on(id.clone()))
    }

    /// Request to join a channel. Local state changes only on the next
    /// snapshot.
    pub fn join(&self, id: &ChannelId) -> Result<Outbound, StateError> {
        self.known(id).map(Outbound::Join)
    }

    /// Request to leave a channel.
    pub fn leave(&self, id: &ChannelId) -> Result<Outbound, StateError> {
        self.known(id).map(Outbound::Leave)
    }

    /// Leave if joined, join otherwise.
    pub fn toggle_membership(&self, id: &ChannelId) -> Result<Outbound, StateError> {
        if self.is_joined(id) { self.leave(id) } else { self.join(id) }
    }

    /// Send text to the focused channel and record it as pending.
    pub fn send_message(
        &mut self,
        text: impl Into<String>,
        now: Timestamp,
    ) -> Result<Outbound, StateError> {
        let text = text.into();
        if text.is_empty() {
            return Err(StateError::EmptyMessage);
        }
        let sender = self.identity.clone().ok_or(StateError::NoIdentity)?;
        let channel_id = self.focus.clone().ok_or(StateError::NoFocus)?;

        self.unconfirmed.entry(channel_id.clone()).or_default().push(Message {
            sender,
            data: text.clone(),
            timestamp: now,
            channel_id: channel_id.clone(),
        });

        Ok(Outbound::SendMessage { channel_id, text })
    }

    /// Send a thumbs-up to the focused channel.
    pub fn send_like(&mut self, now: Timestamp) -> Result<Outbound, StateError> {
        self.send_message(LIKE, now)
    }

    /// Re-request the focused channel's history.
    pub fn refresh_history(&self) -> Result<Outbound, StateError> {
        self.focus.clone().map(Outbound::FetchHistory).ok_or(StateError::NoFocus)
    }

    /// Switch voice rooms.
    ///
    /// Leaves the current room if any, then joins `id` unless it was the
    /// room just left.
    pub fn toggle_voice(
        &mut self,
        id: &ChannelId,
        offer: Value,
    ) -> Result<Vec<Outbound>, StateError> {
        let id = self.known(id)?;
        let mut requests = Vec::with_capacity(2);

        let previous = self.voice.take();
        if let Some(previous) = &previous {
            requests.push(Outbound::LeaveVoice(previous.clone()));
        }
        if previous.as_ref() != Some(&id) {
            self.voice = Some(id.clone());
            requests.push(Outbound::JoinVoice { channel_id: id, offer });
        }

        Ok(requests)
    }

    /// Queue a server error. Empty errors are ignored.
    pub fn push_error(&mut self, error: impl Into<String>) -> bool {
        let error = error.into();
        if error.is_empty() {
            return false;
        }
        self.errors.push_back(error);
        true
    }

    /// Remove and return the oldest server error.
    pub fn dismiss_error(&mut self) -> Option<String> {
        self.errors.pop_front()
    }

    fn known(&self, id: &ChannelId) -> Result<ChannelId, StateError> {
        self.channel(id)
            .map(|c| c.id().clone())
            .ok_or_else(|| StateError::UnknownChannel(id.clone()))
    }

    fn focus_on(&mut self, id: ChannelId) -> Vec<Outbound> {
        let mut requests = Vec::with_capacity(2);

        if !self.channel(&id).is_some_and(Channel::has_history) {
            requests.push(Outbound::FetchHistory(id.clone()));
        }
        match self.joined.get_mut(&id) {
            Some(entry) => entry.unread = 0,
            None => requests.push(Outbound::Join(id.clone())),
        }

        self.focus = Some(id);
        requests
    }

    fn confirm(&mut self, message: Message) -> bool {
        let Some(pending) = self.unconfirmed.get_mut(&message.channel_id) else {
            return false;
        };
        let Some(index) =
            pending.iter().position(|p| p.sender == message.sender && p.data == message.data)
        else {
            return false;
        };

        pending.remove(index);
        self.confirmed.entry(message.channel_id.clone()).or_default().push(message);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(id: &str, joined: bool) -> ChannelSnapshot {
        ChannelSnapshot {
            id: id.into(),
            name: id.to_uppercase(),
            number_of_users: 1,
            join_status: joined,
        }
    }

    fn wire(sender: &str, data: &str, millis: i64) -> WireMessage {
        WireMessage {
            sender: sender.into(),
            data: data.into(),
            timestamp: Timestamp::from_millis(millis).unwrap(),
            channel_id: None,
        }
    }

    fn ids(state: &ChatState) -> Vec<&str> {
        state.channels().iter().map(|c| c.id().as_str()).collect()
    }

    #[test]
    fn snapshot_orders_joined_first() {
        let mut state = ChatState::new("me");
        state.apply_snapshot(vec![
            snapshot("a", false),
            snapshot("b", true),
            snapshot("c", false),
            snapshot("d", true),
        ]);

        assert_eq!(ids(&state), vec!["b", "d", "a", "c"]);
        assert!(state.is_joined(&"b".into()));
        assert!(!state.is_joined(&"a".into()));
    }

    #[test]
    fn first_snapshot_focuses_first_channel() {
        let mut state = ChatState::new("me");
        let outcome = state.apply_snapshot(vec![snapshot("g", true)]);

        assert!(!outcome.focus_preserved);
        assert_eq!(outcome.requests, vec![Outbound::FetchHistory("g".into())]);
        assert_eq!(state.focus(), Some(&"g".into()));
    }

    #[test]
    fn refocus_on_unjoined_channel_requests_join() {
        let mut state = ChatState::new("me");
        let outcome = state.apply_snapshot(vec![snapshot("g", false)]);

        assert_eq!(outcome.requests, vec![
            Outbound::FetchHistory("g".into()),
            Outbound::Join("g".into()),
        ]);
    }

    #[test]
    fn snapshot_keeps_history_and_unread() {
        let mut state = ChatState::new("me");
        state.apply_snapshot(vec![snapshot("g", true), snapshot("h", true)]);
        state.apply_history(&"h".into(), vec![wire("A", "old", 1)]);
        state.ingest(wire("A", "new", 2), &"h".into()).unwrap();
        assert_eq!(state.unread(&"h".into()), 1);

        let outcome = state.apply_snapshot(vec![snapshot("h", true), snapshot("g", true)]);

        assert!(outcome.focus_preserved);
        assert!(outcome.requests.is_empty());
        assert_eq!(state.channel(&"h".into()).unwrap().messages.len(), 2);
        assert_eq!(state.unread(&"h".into()), 1);
    }

    #[test]
    fn empty_snapshot_clears_everything() {
        let mut state = ChatState::new("me");
        state.apply_snapshot(vec![snapshot("g", true)]);

        let outcome = state.apply_snapshot(vec![]);

        assert!(!outcome.focus_preserved);
        assert!(state.channels().is_empty());
        assert_eq!(state.focus(), None);
        assert_eq!(state.joined_channels().count(), 0);
    }

    #[test]
    fn leaving_focused_channel_moves_focus() {
        let mut state = ChatState::new("me");
        state.apply_snapshot(vec![snapshot("g", true), snapshot("h", true)]);
        state.apply_history(&"h".into(), vec![wire("A", "x", 1)]);
        state.set_focus(&"g".into()).unwrap();

        let outcome = state.apply_snapshot(vec![snapshot("g", false), snapshot("h", true)]);

        assert!(!outcome.focus_preserved);
        assert_eq!(state.focus(), Some(&"h".into()));
        // "h" is joined and has history: no side effects
        assert!(outcome.requests.is_empty());
    }

    #[test]
    fn duplicate_snapshot_entries_keep_first() {
        let mut state = ChatState::new("me");
        state.apply_snapshot(vec![snapshot("g", true), snapshot("g", false)]);
        assert_eq!(ids(&state), vec!["g"]);
        assert!(state.is_joined(&"g".into()));
    }

    #[test]
    fn history_merge_puts_incoming_first() {
        let mut state = ChatState::new("me");
        state.apply_snapshot(vec![snapshot("g", true)]);
        state.ingest(wire("B", "live", 5), &"g".into()).unwrap();

        state.apply_history(&"g".into(), vec![wire("A", "1", 1), wire("A", "2", 2)]);

        let data: Vec<_> =
            state.channel(&"g".into()).unwrap().messages.iter().map(|m| m.data.as_str()).collect();
        assert_eq!(data, vec!["1", "2", "live"]);
    }

    #[test]
    fn history_merge_collapses_duplicates_inside_batch() {
        let mut state = ChatState::new("me");
        state.apply_snapshot(vec![snapshot("g", true)]);

        state.apply_history(&"g".into(), vec![wire("A", "1", 1), wire("A", "1", 1)]);

        assert_eq!(state.channel(&"g".into()).unwrap().messages.len(), 1);
    }

    #[test]
    fn history_for_unknown_channel_is_ignored() {
        let mut state = ChatState::new("me");
        assert!(!state.apply_history(&"nope".into(), vec![wire("A", "1", 1)]));
        assert!(!state.apply_history(&"nope".into(), vec![]));
    }

    #[test]
    fn ingest_counts_unread_outside_focus() {
        let mut state = ChatState::new("me");
        state.apply_snapshot(vec![snapshot("g", true), snapshot("h", true), snapshot("x", false)]);

        let focused = state.ingest(wire("A", "1", 1), &"g".into()).unwrap();
        state.ingest(wire("A", "2", 2), &"h".into()).unwrap();
        state.ingest(wire("A", "3", 3), &"h".into()).unwrap();
        state.ingest(wire("A", "4", 4), &"x".into()).unwrap();

        assert!(focused.focused);
        assert_eq!(state.unread(&"g".into()), 0);
        assert_eq!(state.unread(&"h".into()), 2);
        assert_eq!(state.unread(&"x".into()), 0);
        assert_eq!(state.total_unread(), 2);

        state.set_focus(&"h".into()).unwrap();
        assert_eq!(state.unread(&"h".into()), 0);
    }

    #[test]
    fn ingest_skips_replayed_frame() {
        let mut state = ChatState::new("me");
        state.apply_snapshot(vec![snapshot("g", true), snapshot("h", true)]);

        state.ingest(wire("A", "1", 1), &"h".into()).unwrap();
        let replay = state.ingest(wire("A", "1", 1), &"h".into()).unwrap();

        assert!(!replay.appended);
        assert_eq!(state.channel(&"h".into()).unwrap().messages.len(), 1);
        assert_eq!(state.unread(&"h".into()), 1);
    }

    #[test]
    fn ingest_into_unknown_channel_fails() {
        let mut state = ChatState::new("me");
        assert_eq!(
            state.ingest(wire("A", "1", 1), &"g".into()),
            Err(StateError::UnknownChannel("g".into()))
        );
    }

    #[test]
    fn echo_confirms_pending_message_once() {
        let mut state = ChatState::new("me");
        state.apply_snapshot(vec![snapshot("g", true)]);

        let request = state.send_message("hello", Timestamp::from_millis(10).unwrap()).unwrap();
        assert_eq!(request, Outbound::SendMessage { channel_id: "g".into(), text: "hello".into() });
        assert_eq!(state.unconfirmed(&"g".into()).len(), 1);

        let echo = state.ingest(wire("me", "hello", 20), &"g".into()).unwrap();
        assert!(echo.confirmed);
        assert!(state.unconfirmed(&"g".into()).is_empty());
        assert_eq!(state.confirmed(&"g".into()).len(), 1);

        let again = state.ingest(wire("me", "hello", 30), &"g".into()).unwrap();
        assert!(!again.confirmed);
        assert_eq!(state.confirmed(&"g".into()).len(), 1);

        let sent = &state.channel(&"g".into()).unwrap().messages[0];
        assert!(state.has_sent_message(sent));
        let other = &state.channel(&"g".into()).unwrap().messages[1];
        assert!(!state.has_sent_message(other));
    }

    #[test]
    fn send_requires_focus_identity_and_text() {
        let mut state = ChatState::default();
        let now = Timestamp::from_millis(0).unwrap();
        assert_eq!(state.send_message("", now), Err(StateError::EmptyMessage));
        assert_eq!(state.send_message("x", now), Err(StateError::NoIdentity));

        state.set_identity("me");
        assert_eq!(state.send_message("x", now), Err(StateError::NoFocus));
        assert_eq!(state.refresh_history(), Err(StateError::NoFocus));
    }

    #[test]
    fn like_is_thumbs_up() {
        let mut state = ChatState::new("me");
        state.apply_snapshot(vec![snapshot("g", true)]);
        let request = state.send_like(Timestamp::from_millis(0).unwrap()).unwrap();
        assert_eq!(request, Outbound::SendMessage {
            channel_id: "g".into(),
            text: "\u{1F44D}".into(),
        });
    }

    #[test]
    fn toggle_membership_follows_joined_index() {
        let mut state = ChatState::new("me");
        state.apply_snapshot(vec![snapshot("g", true), snapshot("h", false)]);

        assert_eq!(state.toggle_membership(&"g".into()), Ok(Outbound::Leave("g".into())));
        assert_eq!(state.toggle_membership(&"h".into()), Ok(Outbound::Join("h".into())));
        assert_eq!(
            state.toggle_membership(&"zz".into()),
            Err(StateError::UnknownChannel("zz".into()))
        );
    }

    #[test]
    fn voice_toggle_switches_rooms() {
        let mut state = ChatState::new("me");
        state.apply_snapshot(vec![snapshot("g", true), snapshot("h", true)]);

        let join = state.toggle_voice(&"g".into(), Value::Null).unwrap();
        assert_eq!(join, vec![Outbound::JoinVoice { channel_id: "g".into(), offer: Value::Null }]);

        let switch = state.toggle_voice(&"h".into(), Value::Null).unwrap();
        assert_eq!(switch, vec![
            Outbound::LeaveVoice("g".into()),
            Outbound::JoinVoice { channel_id: "h".into(), offer: Value::Null },
        ]);

        let leave = state.toggle_voice(&"h".into(), Value::Null).unwrap();
        assert_eq!(leave, vec![Outbound::LeaveVoice("h".into())]);
        assert_eq!(state.voice_channel(), None);
    }

    #[test]
    fn errors_are_dismissed_in_order() {
        let mut state = ChatState::new("me");
        assert!(!state.push_error(""));
        assert!(state.push_error("first"));
        assert!(state.push_error("second"));

        assert_eq!(state.current_error(), Some("first"));
        assert_eq!(state.dismiss_error().as_deref(), Some("first"));
        assert_eq!(state.dismiss_error().as_deref(), Some("second"));
        assert_eq!(state.dismiss_error(), None);
    }

    #[test]
    fn reset_forgets_identity() {
        let mut state = ChatState::new("me");
        state.push_error("x");
        state.reset();
        assert_eq!(state.identity(), None);
        assert_eq!(state.current_error(), None);
    }
}
