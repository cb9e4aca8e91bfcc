//! Fuzz target for Frame::decode
//!
//! Feeds arbitrary text to the frame decoder and every payload accessor to
//! find:
//! - Parser panics on malformed JSON
//! - Topic names that bypass the closed topic sets
//! - Payload shapes that panic instead of returning an error
//!
//! The fuzzer should NEVER panic. All invalid inputs should return an error.

#![no_main]

use libfuzzer_sys::fuzz_target;
use polychat_proto::Frame;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(frame) = Frame::decode(text) else {
        return;
    };

    let _ = frame.inbound_topic();
    let _ = frame.outbound_topic();
    let _ = frame.channel_snapshots();
    let _ = frame.channel_history();
    let _ = frame.chat_message();
    let _ = frame.error_text();

    // Whatever decodes must encode again.
    assert!(frame.encode().is_ok());
});
