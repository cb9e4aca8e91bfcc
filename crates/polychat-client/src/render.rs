//! Interfaces to the rendering and media collaborators.
//!
//! The core never draws anything. Observers tell a [`RenderSink`] the
//! smallest scope that needs redrawing, and the sink decides how.

use polychat_proto::ChannelId;
use serde_json::Value;

/// Named surface of the user interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Surface {
    /// Connect-in-progress indicator
    Loading,
    /// Channel list with membership and unread counts
    ChannelList,
    /// History of the focused channel
    ChatWindow,
    /// Identity and total unread count
    Navigation,
    /// Pending server errors
    Errors,
}

/// What must be redrawn after a state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidation {
    /// Everything
    All,
    /// One surface
    Surface(Surface),
    /// Only the newest message of the focused channel
    AppendMessage {
        /// Channel the message was appended to
        channel_id: ChannelId,
    },
}

/// Origin of an error passed to the rendering layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSource {
    /// Transport fault. Recovered automatically; not for the user.
    Transport,
    /// Error pushed by the server. Shown to the user.
    Server,
}

/// Rendering collaborator.
///
/// Called synchronously from the dispatch thread with no state borrowed, so
/// implementations may read the shared state.
pub trait RenderSink {
    /// Redraw `scope`.
    fn invalidate(&self, scope: Invalidation);

    /// A connect attempt started (`true`) or ended (`false`).
    fn loading_changed(&self, loading: bool);

    /// An error occurred.
    fn error(&self, source: ErrorSource, message: &str);
}

/// Media-negotiation collaborator. Receives opaque peer signals.
pub trait PeerSignalSink {
    /// Forward one signal from the server.
    fn signal(&self, payload: &Value);
}

/// Sink that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl RenderSink for NullSink {
    fn invalidate(&self, _scope: Invalidation) {}

    fn loading_changed(&self, _loading: bool) {}

    fn error(&self, _source: ErrorSource, _message: &str) {}
}

impl PeerSignalSink for NullSink {
    fn signal(&self, _payload: &Value) {}
}

/// Test doubles.
pub mod test_utils {
    use std::cell::RefCell;

    use serde_json::Value;

    use super::{ErrorSource, Invalidation, PeerSignalSink, RenderSink};

    /// One call observed by [`RecordingSink`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum RenderCall {
        /// `invalidate`
        Invalidate(Invalidation),
        /// `loading_changed`
        Loading(bool),
        /// `error`
        Error(ErrorSource, String),
        /// `signal`
        Signal(String),
    }

    /// Sink that records every call in order.
    #[derive(Debug, Default)]
    pub struct RecordingSink {
        calls: RefCell<Vec<RenderCall>>,
    }

    impl RecordingSink {
        /// Empty recorder.
        pub fn new() -> Self {
            Self::default()
        }

        /// Drain recorded calls.
        pub fn take(&self) -> Vec<RenderCall> {
            self.calls.take()
        }

        /// Recorded calls so far.
        pub fn calls(&self) -> Vec<RenderCall> {
            self.calls.borrow().clone()
        }
    }

    impl RenderSink for RecordingSink {
        fn invalidate(&self, scope: Invalidation) {
            self.calls.borrow_mut().push(RenderCall::Invalidate(scope));
        }

        fn loading_changed(&self, loading: bool) {
            self.calls.borrow_mut().push(RenderCall::Loading(loading));
        }

        fn error(&self, source: ErrorSource, message: &str) {
            self.calls.borrow_mut().push(RenderCall::Error(source, message.to_string()));
        }
    }

    impl PeerSignalSink for RecordingSink {
        fn signal(&self, payload: &Value) {
            self.calls.borrow_mut().push(RenderCall::Signal(payload.to_string()));
        }
    }
}
