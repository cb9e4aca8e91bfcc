//! Observers: inbound topic events to state mutations and redraw signals.
//!
//! Each observer holds explicit handles to what it touches: the shared
//! [`ChatState`], the [`RenderSink`], and the [`Outbox`] for any request a
//! mutation triggers. State borrows are released before the sink is called,
//! so a sink may read the state while rendering.

use std::{cell::RefCell, rc::Rc};

use polychat_core::{ObserverError, SubscriptionId, TopicRegistry};
use polychat_proto::{Frame, InboundTopic};

use crate::{
    error::StateError,
    outbox::Outbox,
    render::{ErrorSource, Invalidation, PeerSignalSink, RenderSink, Surface},
    state::ChatState,
};

impl From<StateError> for ObserverError {
    fn from(err: StateError) -> Self {
        Self::Rejected(err.to_string())
    }
}

/// Shared state handle.
pub type SharedState = Rc<RefCell<ChatState>>;

/// Channel-list snapshots and history batches.
#[derive(Clone)]
pub struct ChannelsObserver {
    state: SharedState,
    sink: Rc<dyn RenderSink>,
    outbox: Outbox,
}

impl ChannelsObserver {
    /// Observer over the given state, sink and outbox.
    pub fn new(state: SharedState, sink: Rc<dyn RenderSink>, outbox: Outbox) -> Self {
        Self { state, sink, outbox }
    }

    /// Apply a channel-list snapshot.
    ///
    /// Redraws only the channel list if the focus survived, everything
    /// otherwise. Refocus side effects are queued on the outbox.
    pub fn on_channel_list(&self, frame: &Frame) -> Result<(), ObserverError> {
        let snapshots = frame.channel_snapshots()?;
        let count = snapshots.len();
        let outcome = self.state.borrow_mut().apply_snapshot(snapshots);
        tracing::debug!(channels = count, focus_preserved = outcome.focus_preserved, "snapshot");

        let queued = self.outbox.send_all(outcome.requests);
        self.sink.invalidate(if outcome.focus_preserved {
            Invalidation::Surface(Surface::ChannelList)
        } else {
            Invalidation::All
        });

        queued.map_err(ObserverError::from)
    }

    /// Merge a history batch.
    pub fn on_channel_history(&self, frame: &Frame) -> Result<(), ObserverError> {
        let history = frame.channel_history()?;
        let id = history.id;

        let (changed, focused) = {
            let mut state = self.state.borrow_mut();
            let changed = state.apply_history(&id, history.messages);
            (changed, state.focus() == Some(&id))
        };

        if changed && focused {
            self.sink.invalidate(Invalidation::Surface(Surface::ChatWindow));
        }
        Ok(())
    }
}

/// Live chat messages.
#[derive(Clone)]
pub struct MessagesObserver {
    state: SharedState,
    sink: Rc<dyn RenderSink>,
}

impl MessagesObserver {
    /// Observer over the given state and sink.
    pub fn new(state: SharedState, sink: Rc<dyn RenderSink>) -> Self {
        Self { state, sink }
    }

    /// Ingest one message.
    ///
    /// A message for the focused channel is appended on screen; the channel
    /// list and navigation always refresh for unread counts.
    pub fn on_message(&self, frame: &Frame) -> Result<(), ObserverError> {
        let message = frame.chat_message()?;
        let Some(channel_id) = message.channel_id.clone() else {
            return Err(ObserverError::Rejected("message without channel".to_string()));
        };

        let ingested = self.state.borrow_mut().ingest(message, &channel_id)?;

        if ingested.appended && ingested.focused {
            self.sink.invalidate(Invalidation::AppendMessage { channel_id });
        }
        self.sink.invalidate(Invalidation::Surface(Surface::ChannelList));
        self.sink.invalidate(Invalidation::Surface(Surface::Navigation));
        Ok(())
    }
}

/// Server-reported errors.
#[derive(Clone)]
pub struct ErrorsObserver {
    state: SharedState,
    sink: Rc<dyn RenderSink>,
}

impl ErrorsObserver {
    /// Observer over the given state and sink.
    pub fn new(state: SharedState, sink: Rc<dyn RenderSink>) -> Self {
        Self { state, sink }
    }

    /// Queue a server error. Empty errors are ignored.
    pub fn on_error(&self, frame: &Frame) -> Result<(), ObserverError> {
        let Some(text) = frame.error_text() else {
            return Ok(());
        };
        if !self.state.borrow_mut().push_error(text.clone()) {
            return Ok(());
        }

        tracing::info!(error = %text, "server error");
        self.sink.error(ErrorSource::Server, &text);
        self.sink.invalidate(Invalidation::Surface(Surface::Errors));
        Ok(())
    }
}

/// Peer signals for the media collaborator.
#[derive(Clone)]
pub struct VoiceObserver {
    state: SharedState,
    peer: Rc<dyn PeerSignalSink>,
}

impl VoiceObserver {
    /// Observer forwarding to `peer`.
    pub fn new(state: SharedState, peer: Rc<dyn PeerSignalSink>) -> Self {
        Self { state, peer }
    }

    /// Forward a signal while in a voice room; drop it otherwise.
    pub fn on_peer_signal(&self, frame: &Frame) -> Result<(), ObserverError> {
        if self.state.borrow().voice_channel().is_none() {
            tracing::debug!("peer signal outside a voice room");
            return Ok(());
        }
        self.peer.signal(&frame.data);
        Ok(())
    }
}

/// Everything the default observers need.
#[derive(Clone)]
pub struct ObserverContext {
    /// Shared chat state
    pub state: SharedState,
    /// Rendering collaborator
    pub sink: Rc<dyn RenderSink>,
    /// Media collaborator
    pub peer: Rc<dyn PeerSignalSink>,
    /// Outbound request channel
    pub outbox: Outbox,
}

/// Subscribe the default observers. Returns the subscriptions made.
///
/// Acknowledgement topics get no observer; the authoritative change arrives
/// with the next snapshot.
pub fn register_observers(
    registry: &mut TopicRegistry,
    ctx: &ObserverContext,
) -> Vec<(InboundTopic, SubscriptionId)> {
    let channels = ChannelsObserver::new(ctx.state.clone(), ctx.sink.clone(), ctx.outbox.clone());
    let history = channels.clone();
    let messages = MessagesObserver::new(ctx.state.clone(), ctx.sink.clone());
    let errors = ErrorsObserver::new(ctx.state.clone(), ctx.sink.clone());
    let voice = VoiceObserver::new(ctx.state.clone(), ctx.peer.clone());

    vec![
        (
            InboundTopic::ChannelList,
            registry.subscribe(InboundTopic::ChannelList, move |f| channels.on_channel_list(f)),
        ),
        (
            InboundTopic::ChannelHistory,
            registry.subscribe(InboundTopic::ChannelHistory, move |f| {
                history.on_channel_history(f)
            }),
        ),
        (
            InboundTopic::Message,
            registry.subscribe(InboundTopic::Message, move |f| messages.on_message(f)),
        ),
        (InboundTopic::Error, registry.subscribe(InboundTopic::Error, move |f| errors.on_error(f))),
        (
            InboundTopic::PeerSignal,
            registry.subscribe(InboundTopic::PeerSignal, move |f| voice.on_peer_signal(f)),
        ),
    ]
}
