//! Fuzz target for chat state reconciliation
//!
//! Applies arbitrary snapshots, history batches, live messages and focus
//! changes to a `ChatState` and checks after every step:
//! - No channel holds two messages with the same dedup key
//! - The focus, if any, names a listed channel

#![no_main]

use std::collections::HashSet;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use polychat_client::ChatState;
use polychat_proto::{ChannelId, ChannelSnapshot, Timestamp, WireMessage};

#[derive(Debug, Arbitrary)]
struct Wire {
    sender: u8,
    data: u8,
    millis: u16,
}

#[derive(Debug, Arbitrary)]
enum Step {
    Snapshot(Vec<(u8, bool)>),
    History(u8, Vec<Wire>),
    Ingest(u8, Wire),
    Focus(u8),
    Send(u8),
}

fn channel(n: u8) -> ChannelId {
    ChannelId::new(format!("c{}", n % 4))
}

fn wire(w: &Wire) -> WireMessage {
    WireMessage {
        sender: format!("u{}", w.sender % 3),
        data: format!("m{}", w.data % 3),
        timestamp: Timestamp::from_millis(i64::from(w.millis)).unwrap_or_else(Timestamp::now),
        channel_id: None,
    }
}

fuzz_target!(|steps: Vec<Step>| {
    let mut state = ChatState::new("u0");

    for step in steps {
        match step {
            Step::Snapshot(entries) => {
                let snapshots = entries
                    .into_iter()
                    .map(|(n, joined)| ChannelSnapshot {
                        id: channel(n),
                        name: String::new(),
                        number_of_users: 0,
                        join_status: joined,
                    })
                    .collect();
                state.apply_snapshot(snapshots);
            },
            Step::History(n, batch) => {
                state.apply_history(&channel(n), batch.iter().map(wire).collect());
            },
            Step::Ingest(n, w) => {
                let _ = state.ingest(wire(&w), &channel(n));
            },
            Step::Focus(n) => {
                let _ = state.set_focus(&channel(n));
            },
            Step::Send(data) => {
                let _ = state.send_message(format!("m{}", data % 3), Timestamp::now());
            },
        }

        for channel in state.channels() {
            let mut keys = HashSet::new();
            assert!(channel.messages.iter().all(|m| keys.insert(m.dedup_key())));
        }
        if let Some(focus) = state.focus() {
            assert!(state.channel(focus).is_some());
        }
    }
});
