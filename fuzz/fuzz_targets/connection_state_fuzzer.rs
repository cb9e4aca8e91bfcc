//! Fuzz target for the connection state machine
//!
//! Drives `Connection` with arbitrary input sequences and checks:
//! - Only an abnormal closure ever requests a new transport
//! - No input after a local clean leads to a reconnect
//! - Every emitted frame is either sent or scheduled for retry

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use polychat_core::{
    ABNORMAL_CLOSURE, Connection, ConnectionAction, ConnectionConfig, ConnectionState,
};
use polychat_proto::{Frame, OutboundTopic};
use serde_json::Value;

#[derive(Debug, Arbitrary)]
enum Input {
    Connect,
    Open,
    Close(u16),
    Emit,
    SendFailed,
    Clean,
    Detached,
}

fn frame() -> Frame {
    Frame::outbound(OutboundTopic::SendMessage, Some("g".into()), Value::String("hi".into()))
}

fuzz_target!(|inputs: Vec<Input>| {
    let mut conn = Connection::new(ConnectionConfig::default());
    if conn.set_identity("fuzz").is_err() {
        return;
    }

    for input in inputs {
        let before = conn.state();
        let actions = match input {
            Input::Connect => conn.connect().unwrap_or_default(),
            Input::Open => conn.handle_open().unwrap_or_default(),
            Input::Close(code) => conn.handle_close(code),
            Input::Emit => {
                let actions = conn.emit(frame());
                assert!(actions.iter().any(|a| matches!(
                    a,
                    ConnectionAction::Send(_) | ConnectionAction::ScheduleRetry { .. }
                )));
                actions
            },
            Input::SendFailed => conn.send_failed(frame()),
            Input::Clean => conn.clean(),
            Input::Detached => {
                conn.handle_detached();
                Vec::new()
            },
        };

        let reopens = actions.iter().any(|a| matches!(a, ConnectionAction::OpenTransport { .. }));
        if reopens && !matches!(input, Input::Connect) {
            assert!(matches!(input, Input::Close(ABNORMAL_CLOSURE)));
            assert!(matches!(before, ConnectionState::Connecting | ConnectionState::Open));
        }
    }
});
