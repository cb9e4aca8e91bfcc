//! Async connection handler.
//!
//! Drives the sans-IO [`Connection`] state machine against a [`Transport`].
//! The handler executes the actions the state machine returns, feeds link
//! events back into it, and routes inbound text frames through the
//! [`TopicRegistry`].
//!
//! Runs on one thread. Retry timers are futures polled by the handler loop,
//! so they live exactly as long as the handler (or until dropped on sign
//! out).

use std::{collections::VecDeque, rc::Rc};

use futures::{StreamExt, future::LocalBoxFuture, stream::FuturesUnordered};
use polychat_core::{
    ABNORMAL_CLOSURE, Connection, ConnectionAction, ConnectionConfig, ConnectionError,
    ConnectionState, Environment, ObserverError, SubscriptionId, TopicRegistry,
};
use polychat_proto::{ChannelId, Frame, InboundTopic, OutboundTopic};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::{
    link::{LinkEvent, Transport, TransportLink},
    outbox::Command,
    render::{ErrorSource, RenderSink},
};

/// Why [`ConnectionHandler::run`] returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunExit {
    /// Session asked to reconnect as a new identity
    ChangeIdentity(String),
    /// Session asked to sign out
    SignOut,
    /// Session asked to stop
    Quit,
    /// Server closed the session
    Terminated {
        /// Close code reported by the transport
        code: u16,
    },
}

enum Wakeup {
    Link(Option<LinkEvent>),
    Retry(Frame),
    Command(Option<Command>),
}

/// Connection handler.
///
/// Owns at most one [`TransportLink`] at a time. Replacing or dropping the
/// link detaches it, so nothing the old link reports is ever routed.
pub struct ConnectionHandler<T: Transport, E: Environment> {
    transport: T,
    env: E,
    connection: Connection,
    topics: TopicRegistry,
    link: Option<TransportLink>,
    retries: FuturesUnordered<LocalBoxFuture<'static, Frame>>,
    sink: Rc<dyn RenderSink>,
    terminated: Option<u16>,
}

impl<T: Transport, E: Environment> ConnectionHandler<T, E> {
    /// Create a handler with no identity and no link.
    pub fn new(transport: T, env: E, config: ConnectionConfig, sink: Rc<dyn RenderSink>) -> Self {
        Self {
            transport,
            env,
            connection: Connection::new(config),
            topics: TopicRegistry::new(),
            link: None,
            retries: FuturesUnordered::new(),
            sink,
            terminated: None,
        }
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// URL the next link will dial.
    pub fn url(&self) -> Option<&str> {
        self.connection.url()
    }

    /// Frames waiting for their retry delay.
    pub fn pending_retries(&self) -> usize {
        self.retries.len()
    }

    /// Inbound topic buses.
    pub fn registry_mut(&mut self) -> &mut TopicRegistry {
        &mut self.topics
    }

    /// Subscribe to an inbound topic.
    pub fn subscribe<F>(&mut self, topic: InboundTopic, callback: F) -> SubscriptionId
    where
        F: FnMut(&Frame) -> Result<(), ObserverError> + 'static,
    {
        self.topics.subscribe(topic, callback)
    }

    /// Subscribe to an inbound topic by wire name.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::UnknownTopic` if the name is not an inbound topic
    pub fn subscribe_named<F>(
        &mut self,
        name: &str,
        callback: F,
    ) -> Result<SubscriptionId, ConnectionError>
    where
        F: FnMut(&Frame) -> Result<(), ObserverError> + 'static,
    {
        self.topics.subscribe_named(name, callback)
    }

    /// Remove a subscription.
    pub fn unsubscribe(&mut self, topic: InboundTopic, id: SubscriptionId) -> bool {
        self.topics.unsubscribe(topic, id)
    }

    /// Rebuild the connection URL for `identity`.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::InvalidUrl` if the configured base URL is invalid
    pub fn set_identity(&mut self, identity: &str) -> Result<(), ConnectionError> {
        self.connection.set_identity(identity)
    }

    /// Start a connect attempt without waiting for it.
    ///
    /// The link's events, including `Opened`, are served by [`Self::run`],
    /// so session commands keep flowing while the attempt is pending.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::MissingIdentity` if no identity was set
    /// - `ConnectionError::InvalidState` if a link is already live
    pub fn begin_connect(&mut self) -> Result<(), ConnectionError> {
        self.terminated = None;
        let actions = self.connection.connect()?;
        self.execute(actions);
        Ok(())
    }

    /// Open a link and wait until it is open or the session ended.
    ///
    /// Abnormal closures while connecting are retried internally. Returns the
    /// resulting state: `Open`, or `Closed` if the server terminated. Nothing
    /// else is served meanwhile; a session uses [`Self::begin_connect`].
    ///
    /// # Errors
    ///
    /// - `ConnectionError::MissingIdentity` if no identity was set
    /// - `ConnectionError::InvalidState` if a link is already live
    pub async fn connect(&mut self) -> Result<ConnectionState, ConnectionError> {
        self.begin_connect()?;

        while self.connection.state() == ConnectionState::Connecting {
            let Some(link) = self.link.as_mut() else {
                break;
            };
            let event = link.next_event().await;
            self.on_link_event(event);
        }

        Ok(self.connection.state())
    }

    /// Send a frame now if open, otherwise after the retry delay.
    pub fn emit(&mut self, frame: Frame) {
        let actions = self.connection.emit(frame);
        self.execute(actions);
    }

    /// Emit on an outbound topic given by wire name.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::UnknownTopic` if the name is not an outbound topic
    pub fn emit_topic(
        &mut self,
        name: &str,
        channel_id: Option<ChannelId>,
        data: Value,
    ) -> Result<(), ConnectionError> {
        let topic = OutboundTopic::from_name(name)
            .ok_or_else(|| ConnectionError::UnknownTopic(name.to_string()))?;
        self.emit(Frame::outbound(topic, channel_id, data));
        Ok(())
    }

    /// Close the current link with the normal-closure code and detach it.
    ///
    /// Never triggers a reconnect. Pending retries are kept.
    pub fn clean_socket(&mut self) {
        let actions = self.connection.clean();
        self.execute(actions);
    }

    /// Cancel every pending retry. Returns how many were dropped.
    pub fn drop_retries(&mut self) -> usize {
        let dropped = self.retries.len();
        self.retries = FuturesUnordered::new();
        if dropped > 0 {
            tracing::debug!(dropped, "retries cancelled");
        }
        dropped
    }

    /// Serve link events, retry timers and session commands until the
    /// session asks to stop or the server terminates it.
    ///
    /// Commands are served in every state, including while a connect
    /// attempt is still waiting for its link to open.
    pub async fn run(&mut self, commands: &mut mpsc::UnboundedReceiver<Command>) -> RunExit {
        loop {
            if let Some(code) = self.terminated {
                return RunExit::Terminated { code };
            }

            // Link events first so frames already received are routed before
            // a session command replaces the link.
            let wakeup = tokio::select! {
                biased;

                event = next_link_event(&mut self.link) => Wakeup::Link(event),
                Some(frame) = self.retries.next(), if !self.retries.is_empty() => {
                    Wakeup::Retry(frame)
                },
                command = commands.recv() => Wakeup::Command(command),
            };

            match wakeup {
                Wakeup::Link(event) => self.on_link_event(event),
                Wakeup::Retry(frame) => {
                    tracing::debug!(topic = %frame.topic, "retrying frame");
                    self.emit(frame);
                },
                Wakeup::Command(Some(Command::Emit(frame))) => self.emit(frame),
                Wakeup::Command(Some(Command::ChangeIdentity(identity))) => {
                    return RunExit::ChangeIdentity(identity);
                },
                Wakeup::Command(Some(Command::SignOut)) => return RunExit::SignOut,
                Wakeup::Command(Some(Command::Quit) | None) => return RunExit::Quit,
            }
        }
    }

    fn on_link_event(&mut self, event: Option<LinkEvent>) {
        // A link whose I/O side vanished without a close frame was dropped.
        let event = event.unwrap_or(LinkEvent::Closed { code: ABNORMAL_CLOSURE });

        match event {
            LinkEvent::Opened => match self.connection.handle_open() {
                Ok(actions) => {
                    tracing::info!(url = ?self.connection.url(), "link open");
                    self.execute(actions);
                },
                Err(err) => tracing::warn!(%err, "ignoring open event"),
            },
            LinkEvent::Frame(text) => {
                self.topics.route(&text);
            },
            LinkEvent::SendFailed(frame) => {
                tracing::debug!(topic = %frame.topic, "write failed");
                let actions = self.connection.send_failed(frame);
                self.execute(actions);
            },
            LinkEvent::Closed { code } => {
                self.link = None;
                if code == ABNORMAL_CLOSURE {
                    tracing::warn!(code, failures = self.connection.failures(), "link dropped");
                    self.sink.error(ErrorSource::Transport, "connection lost, reconnecting");
                }
                let actions = self.connection.handle_close(code);
                self.execute(actions);
            },
        }
    }

    fn execute(&mut self, actions: Vec<ConnectionAction>) {
        let mut queue = VecDeque::from(actions);

        while let Some(action) = queue.pop_front() {
            match action {
                ConnectionAction::SetLoading(loading) => self.sink.loading_changed(loading),
                ConnectionAction::OpenTransport { url, delay } => {
                    tracing::info!(%url, ?delay, "opening link");
                    self.link = Some(self.transport.open(&url, delay));
                },
                ConnectionAction::Send(frame) => {
                    let sent = match &self.link {
                        Some(link) => link.send(frame),
                        None => Err(frame),
                    };
                    if let Err(frame) = sent {
                        queue.extend(self.connection.send_failed(frame));
                    }
                },
                ConnectionAction::ScheduleRetry { frame, delay } => {
                    tracing::debug!(topic = %frame.topic, ?delay, "retry scheduled");
                    let sleep = self.env.sleep(delay);
                    self.retries.push(Box::pin(async move {
                        sleep.await;
                        frame
                    }));
                },
                ConnectionAction::CloseTransport { code } => {
                    if let Some(link) = self.link.take() {
                        link.close(code);
                    }
                    self.connection.handle_detached();
                    tracing::info!(code, "link closed");
                },
                ConnectionAction::Terminated { code } => {
                    self.link = None;
                    self.terminated = Some(code);
                    tracing::warn!(code, "session terminated by server");
                    self.sink.error(
                        ErrorSource::Transport,
                        &format!("connection closed by server (code {code})"),
                    );
                },
            }
        }
    }
}

async fn next_link_event(link: &mut Option<TransportLink>) -> Option<LinkEvent> {
    match link {
        Some(link) => link.next_event().await,
        None => std::future::pending().await,
    }
}
