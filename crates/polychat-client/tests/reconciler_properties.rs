//! Property-based tests for state reconciliation.
//!
//! Arbitrary sequences of snapshots, history batches, live messages, focus
//! changes and local sends are applied to a `ChatState`, checking that:
//! - No channel ever holds two messages with the same dedup key
//! - Applying a history batch twice equals applying it once
//! - After a snapshot the focus is a listed channel, or there is no channel
//! - Unread counters count live messages since the last focus
//! - Each local send is confirmed at most once

use std::collections::HashSet;

use polychat_client::{ChatState, Outbound};
use polychat_proto::{ChannelId, ChannelSnapshot, Timestamp, WireMessage};
use proptest::prelude::*;

const CHANNELS: [&str; 3] = ["a", "b", "c"];

#[derive(Debug, Clone)]
enum Op {
    Snapshot(Vec<(usize, bool)>),
    History(usize, Vec<WireMessage>),
    Ingest(usize, WireMessage),
    Focus(usize),
    Send(String),
}

fn channel(index: usize) -> ChannelId {
    ChannelId::from(CHANNELS[index % CHANNELS.len()])
}

fn snapshot(id: &str, joined: bool) -> ChannelSnapshot {
    ChannelSnapshot { id: id.into(), name: id.to_string(), number_of_users: 1, join_status: joined }
}

fn wire(sender: &str, data: &str, millis: i64, channel: Option<ChannelId>) -> WireMessage {
    WireMessage {
        sender: sender.to_string(),
        data: data.to_string(),
        timestamp: Timestamp::from_millis(millis).unwrap(),
        channel_id: channel,
    }
}

fn arbitrary_wire() -> impl Strategy<Value = WireMessage> {
    (
        prop::sample::select(vec!["me", "ann", "bob"]),
        prop::sample::select(vec!["hi", "yo", "\u{1F44D}"]),
        0i64..4,
    )
        .prop_map(|(sender, data, millis)| wire(sender, data, millis, None))
}

fn arbitrary_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        prop::collection::vec((0usize..3, any::<bool>()), 0..4).prop_map(Op::Snapshot),
        (0usize..3, prop::collection::vec(arbitrary_wire(), 0..5))
            .prop_map(|(c, batch)| Op::History(c, batch)),
        (0usize..3, arbitrary_wire()).prop_map(|(c, w)| Op::Ingest(c, w)),
        (0usize..3).prop_map(Op::Focus),
        prop::sample::select(vec!["hi", "yo"]).prop_map(|t| Op::Send(t.to_string())),
    ]
}

fn apply(state: &mut ChatState, op: Op) {
    match op {
        Op::Snapshot(entries) => {
            let snapshots =
                entries.into_iter().map(|(c, joined)| snapshot(channel(c).as_str(), joined));
            state.apply_snapshot(snapshots.collect());
        },
        Op::History(c, batch) => {
            state.apply_history(&channel(c), batch);
        },
        Op::Ingest(c, message) => {
            let _ = state.ingest(message, &channel(c));
        },
        Op::Focus(c) => {
            let _ = state.set_focus(&channel(c));
        },
        Op::Send(text) => {
            let _ = state.send_message(text, Timestamp::from_millis(0).unwrap());
        },
    }
}

fn assert_no_duplicates(state: &ChatState) -> Result<(), TestCaseError> {
    for channel in state.channels() {
        let mut keys = HashSet::new();
        for message in &channel.messages {
            prop_assert!(
                keys.insert(message.dedup_key()),
                "duplicate {:?} in {}",
                message,
                channel.id()
            );
        }
    }
    Ok(())
}

#[test]
fn prop_history_never_holds_duplicates() {
    proptest!(|(ops in prop::collection::vec(arbitrary_op(), 1..48))| {
        let mut state = ChatState::new("me");
        for op in ops {
            apply(&mut state, op);
            assert_no_duplicates(&state)?;
        }
    });
}

#[test]
fn prop_history_merge_is_idempotent() {
    proptest!(|(
        ops in prop::collection::vec(arbitrary_op(), 0..24),
        target in 0usize..3,
        batch in prop::collection::vec(arbitrary_wire(), 1..6),
    )| {
        let mut state = ChatState::new("me");
        state.apply_snapshot(CHANNELS.iter().map(|id| snapshot(id, true)).collect());
        for op in ops {
            apply(&mut state, op);
        }

        let id = channel(target);
        state.apply_history(&id, batch.clone());
        let once = state.channel(&id).map(|c| c.messages.clone());
        state.apply_history(&id, batch);
        let twice = state.channel(&id).map(|c| c.messages.clone());

        prop_assert_eq!(once, twice);
    });
}

#[test]
fn prop_focus_survives_every_snapshot() {
    proptest!(|(ops in prop::collection::vec(arbitrary_op(), 1..48))| {
        let mut state = ChatState::new("me");
        for op in ops {
            let is_snapshot = matches!(op, Op::Snapshot(_));
            apply(&mut state, op);
            if !is_snapshot {
                continue;
            }
            match state.focus() {
                Some(id) => prop_assert!(state.channel(id).is_some()),
                None => prop_assert!(state.channels().is_empty()),
            }
        }
    });
}

#[derive(Debug, Clone)]
enum UnreadOp {
    Message(usize),
    Focus(usize),
}

#[test]
fn prop_unread_counts_messages_since_focus() {
    let unread_op = prop_oneof![
        3 => (0usize..2).prop_map(UnreadOp::Message),
        1 => (0usize..2).prop_map(UnreadOp::Focus),
    ];

    proptest!(|(ops in prop::collection::vec(unread_op, 1..64))| {
        let mut state = ChatState::new("me");
        state.apply_snapshot(vec![snapshot("a", true), snapshot("b", true)]);
        let mut expected = [0u32; 2];
        let mut focus = 0usize;

        for (n, op) in ops.into_iter().enumerate() {
            match op {
                UnreadOp::Message(c) => {
                    let message = wire("ann", "hi", n as i64, Some(channel(c)));
                    let ingested = state.ingest(message, &channel(c)).unwrap();
                    prop_assert!(ingested.appended);
                    if c != focus {
                        expected[c] += 1;
                    }
                },
                UnreadOp::Focus(c) => {
                    state.set_focus(&channel(c)).unwrap();
                    focus = c;
                    expected[c] = 0;
                },
            }
            prop_assert_eq!(state.unread(&channel(0)), expected[0]);
            prop_assert_eq!(state.unread(&channel(1)), expected[1]);
            prop_assert_eq!(state.total_unread(), expected[0] + expected[1]);
        }
    });
}

#[test]
fn prop_sends_are_confirmed_at_most_once() {
    proptest!(|(sent in 0usize..5, echoed in 0usize..8)| {
        let mut state = ChatState::new("me");
        state.apply_snapshot(vec![snapshot("a", true)]);
        let id = channel(0);

        for _ in 0..sent {
            state.send_message("hi", Timestamp::from_millis(0).unwrap()).unwrap();
        }
        let mut confirmations = 0;
        for n in 0..echoed {
            let echo = wire("me", "hi", 100 + n as i64, Some(id.clone()));
            if state.ingest(echo, &id).unwrap().confirmed {
                confirmations += 1;
            }
        }

        prop_assert_eq!(confirmations, sent.min(echoed));
        prop_assert_eq!(state.confirmed(&id).len(), sent.min(echoed));
        prop_assert_eq!(state.unconfirmed(&id).len(), sent - sent.min(echoed));
    });
}

#[test]
fn focus_on_empty_channel_fetches_history_once_merged() {
    let mut state = ChatState::new("me");
    let outcome = state.apply_snapshot(vec![snapshot("g", true)]);
    assert_eq!(outcome.requests, vec![Outbound::FetchHistory("g".into())]);

    let g = ChannelId::from("g");
    assert_eq!(state.set_focus(&g).unwrap(), vec![Outbound::FetchHistory("g".into())]);

    let batch = vec![wire("A", "hi", 7, Some(g.clone()))];
    assert!(state.apply_history(&g, batch.clone()));
    assert_eq!(state.channel(&g).unwrap().messages.len(), 1);
    state.apply_history(&g, batch);
    assert_eq!(state.channel(&g).unwrap().messages.len(), 1);
}

#[test]
fn leaving_focused_channel_moves_focus_to_first() {
    let mut state = ChatState::new("me");
    state.apply_snapshot(vec![snapshot("g", true), snapshot("h", true)]);
    state.apply_history(&"h".into(), vec![wire("A", "hi", 1, None)]);
    state.set_focus(&"g".into()).unwrap();

    let outcome = state.apply_snapshot(vec![snapshot("g", false), snapshot("h", true)]);

    assert!(!outcome.focus_preserved);
    assert_eq!(state.focus(), Some(&"h".into()));
    assert!(outcome.requests.is_empty());
}
