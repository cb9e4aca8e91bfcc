//! Local user intents.
//!
//! The controller validates an intent, applies whatever local change it
//! implies to the [`ChatState`](crate::ChatState), queues the outbound
//! requests and tells the sink what to redraw. It never talks to the
//! connection directly.

use std::rc::Rc;

use polychat_proto::{ChannelId, Timestamp};
use serde_json::Value;

use crate::{
    error::StateError,
    model::Message,
    observer::SharedState,
    outbox::{Outbound, Outbox},
    render::{Invalidation, RenderSink, Surface},
    validation::{validate_group_name, validate_username},
};

/// Entry point for everything the user does.
#[derive(Clone)]
pub struct Controller {
    state: SharedState,
    sink: Rc<dyn RenderSink>,
    outbox: Outbox,
}

impl Controller {
    /// Create a controller over shared state.
    pub fn new(state: SharedState, sink: Rc<dyn RenderSink>, outbox: Outbox) -> Self {
        Self { state, sink, outbox }
    }

    /// Shared chat state.
    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// Present `id` to the user.
    pub fn set_focus(&self, id: &ChannelId) -> Result<(), StateError> {
        let requests = self.state.borrow_mut().set_focus(id)?;
        self.outbox.send_all(requests)?;
        self.sink.invalidate(Invalidation::All);
        Ok(())
    }

    /// Ask to join `id`.
    pub fn join(&self, id: &ChannelId) -> Result<(), StateError> {
        let request = self.state.borrow().join(id)?;
        self.outbox.send(request)
    }

    /// Ask to leave `id`.
    pub fn leave(&self, id: &ChannelId) -> Result<(), StateError> {
        let request = self.state.borrow().leave(id)?;
        self.outbox.send(request)
    }

    /// Leave `id` if joined, join it otherwise.
    pub fn toggle_membership(&self, id: &ChannelId) -> Result<(), StateError> {
        let request = self.state.borrow().toggle_membership(id)?;
        self.outbox.send(request)
    }

    /// Post `text` to the focused channel.
    pub fn send_message(&self, text: &str) -> Result<(), StateError> {
        let request = self.state.borrow_mut().send_message(text, Timestamp::now())?;
        self.outbox.send(request)
    }

    /// Post a thumbs-up to the focused channel.
    pub fn send_like(&self) -> Result<(), StateError> {
        let request = self.state.borrow_mut().send_like(Timestamp::now())?;
        self.outbox.send(request)
    }

    /// Ask the server to create a channel.
    pub fn create_channel(&self, name: &str) -> Result<(), StateError> {
        if !validate_group_name(name) {
            return Err(StateError::InvalidChannelName(name.to_string()));
        }
        self.outbox.send(Outbound::CreateChannel(name.to_string()))
    }

    /// Re-request the focused channel's history.
    pub fn refresh_history(&self) -> Result<(), StateError> {
        let request = self.state.borrow().refresh_history()?;
        self.outbox.send(request)
    }

    /// Enter or leave the voice room of `id`.
    pub fn toggle_voice(&self, id: &ChannelId, offer: Value) -> Result<(), StateError> {
        let requests = self.state.borrow_mut().toggle_voice(id, offer)?;
        self.outbox.send_all(requests)?;
        self.sink.invalidate(Invalidation::Surface(Surface::ChannelList));
        Ok(())
    }

    /// Drop the oldest server error.
    pub fn dismiss_error(&self) -> Option<String> {
        let dismissed = self.state.borrow_mut().dismiss_error();
        if dismissed.is_some() {
            self.sink.invalidate(Invalidation::Surface(Surface::Errors));
        }
        dismissed
    }

    /// Reconnect under a new identity.
    pub fn change_identity(&self, name: &str) -> Result<(), StateError> {
        if !validate_username(name) {
            return Err(StateError::InvalidUsername(name.to_string()));
        }
        self.outbox.change_identity(name)
    }

    /// Close the connection and forget everything.
    pub fn sign_out(&self) -> Result<(), StateError> {
        self.outbox.sign_out()
    }

    /// Close the connection and stop the session.
    pub fn quit(&self) -> Result<(), StateError> {
        self.outbox.quit()
    }

    /// Whether `message` was sent from here and is still tracked.
    pub fn has_sent_message(&self, message: &Message) -> bool {
        self.state.borrow().has_sent_message(message)
    }

    /// Unread count of `id`.
    pub fn unread(&self, id: &ChannelId) -> u32 {
        self.state.borrow().unread(id)
    }

    /// Unread count over every joined channel.
    pub fn total_unread(&self) -> u32 {
        self.state.borrow().total_unread()
    }
}
