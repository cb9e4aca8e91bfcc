//! Session context.
//!
//! A [`Session`] is built once at startup and owns everything with session
//! lifetime: the connection handler, the shared chat state, and the command
//! channel that intents and observers feed. It wires the default observers
//! on construction and turns session-level commands (identity change, sign
//! out, quit) into handler operations.

use std::{cell::RefCell, rc::Rc};

use polychat_core::Environment;
use polychat_proto::ChannelId;
use tokio::sync::mpsc;

use crate::{
    config::ClientConfig,
    controller::Controller,
    error::ClientError,
    handler::{ConnectionHandler, RunExit},
    link::Transport,
    observer::{ObserverContext, SharedState, register_observers},
    outbox::{Command, Outbound, Outbox},
    render::{Invalidation, PeerSignalSink, RenderSink},
    state::ChatState,
};

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// User signed out; the model was reset
    SignedOut,
    /// User quit; the model is left as it was
    Quit,
    /// Server closed the session with this code
    Terminated {
        /// Close code reported by the transport
        code: u16,
    },
}

/// Explicit session context.
pub struct Session<T: Transport, E: Environment> {
    handler: ConnectionHandler<T, E>,
    state: SharedState,
    sink: Rc<dyn RenderSink>,
    outbox: Outbox,
    commands: mpsc::UnboundedReceiver<Command>,
}

impl<T: Transport, E: Environment> Session<T, E> {
    /// Build a session for `identity` and register the default observers.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::InvalidUrl` if the configured base URL is invalid
    pub fn new(
        transport: T,
        env: E,
        config: &ClientConfig,
        identity: &str,
        sink: Rc<dyn RenderSink>,
        peer: Rc<dyn PeerSignalSink>,
    ) -> Result<Self, ClientError> {
        let state: SharedState = Rc::new(RefCell::new(ChatState::new(identity)));
        let (outbox, commands) = Outbox::channel();

        let mut handler = ConnectionHandler::new(transport, env, config.into(), sink.clone());
        handler.set_identity(identity)?;

        let subscriptions = register_observers(handler.registry_mut(), &ObserverContext {
            state: state.clone(),
            sink: sink.clone(),
            peer,
            outbox: outbox.clone(),
        });
        tracing::debug!(observers = subscriptions.len(), "observers registered");

        Ok(Self { handler, state, sink, outbox, commands })
    }

    /// Shared chat state.
    pub fn state(&self) -> SharedState {
        self.state.clone()
    }

    /// Sender for outbound requests.
    pub fn outbox(&self) -> Outbox {
        self.outbox.clone()
    }

    /// Intent entry point bound to this session.
    pub fn controller(&self) -> Controller {
        Controller::new(self.state.clone(), self.sink.clone(), self.outbox.clone())
    }

    /// Connection handler.
    pub fn handler(&self) -> &ConnectionHandler<T, E> {
        &self.handler
    }

    /// Connection handler, for extra subscriptions.
    pub fn handler_mut(&mut self) -> &mut ConnectionHandler<T, E> {
        &mut self.handler
    }

    /// Start the first connect attempt. [`Self::run`] completes it.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::InvalidState` if already connected
    pub fn start(&mut self) -> Result<(), ClientError> {
        Ok(self.handler.begin_connect()?)
    }

    /// Serve the session until it ends.
    ///
    /// # Errors
    ///
    /// - `ConnectionError` if reconnecting under a new identity fails
    pub async fn run(&mut self) -> Result<SessionEnd, ClientError> {
        loop {
            match self.handler.run(&mut self.commands).await {
                RunExit::ChangeIdentity(identity) => self.change_identity(&identity)?,
                RunExit::SignOut => {
                    self.sign_out();
                    return Ok(SessionEnd::SignedOut);
                },
                RunExit::Quit => {
                    self.handler.clean_socket();
                    return Ok(SessionEnd::Quit);
                },
                RunExit::Terminated { code } => return Ok(SessionEnd::Terminated { code }),
            }
        }
    }

    /// Reconnect as `identity` and re-join every joined channel.
    ///
    /// The joins ride the retry path until the new link opens. Frames
    /// already waiting for a retry are carried over to the new link.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::InvalidUrl` if the URL cannot be rebuilt
    pub fn change_identity(&mut self, identity: &str) -> Result<(), ClientError> {
        tracing::info!(%identity, "changing identity");

        self.handler.clean_socket();
        self.handler.set_identity(identity)?;
        self.state.borrow_mut().set_identity(identity);
        self.handler.begin_connect()?;

        let joined: Vec<ChannelId> =
            self.state.borrow().joined_channels().map(|j| j.channel.id.clone()).collect();
        for id in joined {
            self.handler.emit(Outbound::Join(id).into_frame());
        }

        self.sink.invalidate(Invalidation::All);
        Ok(())
    }

    /// Close the link, cancel retries and forget the model.
    pub fn sign_out(&mut self) {
        tracing::info!("signing out");
        self.handler.clean_socket();
        self.handler.drop_retries();
        self.state.borrow_mut().reset();
        self.sink.invalidate(Invalidation::All);
    }
}
