//! Property-based tests for the connection policy.
//!
//! These tests drive the state machine with arbitrary event sequences and
//! verify that:
//! - Only abnormal closure ever produces a new transport
//! - A local clean never leads to a reconnect
//! - Outbound frames are either sent or scheduled, never dropped
//! - At most one link is requested per closure

use polychat_core::{
    ABNORMAL_CLOSURE, Connection, ConnectionAction, ConnectionConfig, ConnectionState,
};
use polychat_proto::{Frame, OutboundTopic};
use proptest::prelude::*;
use serde_json::Value;

#[derive(Debug, Clone)]
enum Event {
    Connect,
    Open,
    Close(u16),
    Emit,
    SendFailed,
    Clean,
    Detached,
}

fn arbitrary_close_code() -> impl Strategy<Value = u16> {
    prop_oneof![
        3 => Just(ABNORMAL_CLOSURE),
        1 => Just(1000u16),
        1 => Just(1001u16),
        1 => Just(1005u16),
        1 => 4000u16..5000,
    ]
}

fn arbitrary_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        Just(Event::Connect),
        Just(Event::Open),
        arbitrary_close_code().prop_map(Event::Close),
        Just(Event::Emit),
        Just(Event::SendFailed),
        Just(Event::Clean),
        Just(Event::Detached),
    ]
}

fn frame() -> Frame {
    Frame::outbound(OutboundTopic::SendMessage, Some("g".into()), Value::String("hi".into()))
}

fn opens(actions: &[ConnectionAction]) -> usize {
    actions.iter().filter(|a| matches!(a, ConnectionAction::OpenTransport { .. })).count()
}

#[test]
fn prop_only_abnormal_closure_reconnects() {
    proptest!(|(events in prop::collection::vec(arbitrary_event(), 1..64))| {
        let mut conn = Connection::new(ConnectionConfig::default());
        conn.set_identity("alice").expect("default base url parses");

        for event in events {
            let before = conn.state();
            let actions = match event {
                Event::Connect => conn.connect().unwrap_or_default(),
                Event::Open => conn.handle_open().unwrap_or_default(),
                Event::Close(code) => {
                    let actions = conn.handle_close(code);
                    let live = matches!(before, ConnectionState::Connecting | ConnectionState::Open);

                    // PROPERTY: a live link closing with 1006 reconnects, anything else does not
                    prop_assert_eq!(opens(&actions), usize::from(live && code == ABNORMAL_CLOSURE));
                    actions
                },
                Event::Emit => {
                    let actions = conn.emit(frame());
                    // PROPERTY: emit never loses the frame
                    prop_assert_eq!(actions.len(), 1);
                    prop_assert!(matches!(
                        &actions[0],
                        ConnectionAction::Send(_) | ConnectionAction::ScheduleRetry { .. }
                    ), "emit must yield Send or ScheduleRetry");
                    actions
                },
                Event::SendFailed => conn.send_failed(frame()),
                Event::Clean => {
                    let actions = conn.clean();
                    // PROPERTY: clean never opens a link
                    prop_assert_eq!(opens(&actions), 0);
                    actions
                },
                Event::Detached => {
                    conn.handle_detached();
                    Vec::new()
                },
            };

            // PROPERTY: at most one link requested per input
            prop_assert!(opens(&actions) <= 1);

            if opens(&actions) == 1 {
                prop_assert_eq!(conn.state(), ConnectionState::Connecting);
            }
        }
    });
}

#[test]
fn prop_clean_then_any_close_stays_closed() {
    proptest!(|(codes in prop::collection::vec(arbitrary_close_code(), 0..8))| {
        let mut conn = Connection::new(ConnectionConfig::default());
        conn.set_identity("alice").expect("default base url parses");
        conn.connect().expect("first connect succeeds");
        conn.handle_open().expect("open after connect");

        conn.clean();
        conn.handle_detached();

        for code in codes {
            // PROPERTY: late closes after a clean are inert
            prop_assert!(conn.handle_close(code).is_empty());
        }
        prop_assert_eq!(conn.state(), ConnectionState::Closed);
    });
}
