//! Client
//!
//! State reconciliation and the async connection driver for the PolyChat
//! chat client.
//!
//! # Architecture
//!
//! Inbound frames flow one way: a [`Transport`] link reports a text frame,
//! the [`ConnectionHandler`] routes it to the topic's bus, the default
//! observers merge it into the shared [`ChatState`] and tell a
//! [`RenderSink`] what to redraw. Outbound requests flow back through an
//! [`Outbox`] that the handler loop drains, so nothing ever re-enters the
//! handler from inside a dispatch.
//!
//! # Components
//!
//! - [`ChatState`]: channel collection, histories, unread counts, pending
//!   sends and the server error queue
//! - [`ConnectionHandler`]: executes the connection policy against a link
//! - [`Controller`]: local user intents
//! - [`Session`]: explicit session context owning all of the above
//!
//! # Transport (optional)
//!
//! With the `transport` feature enabled, this crate also provides
//! [`transport::WebSocketTransport`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod config;
mod controller;
mod error;
mod handler;
pub mod link;
mod model;
pub mod observer;
mod outbox;
pub mod render;
mod session;
mod state;
pub mod validation;

#[cfg(feature = "transport")]
pub mod transport;

pub use config::ClientConfig;
pub use controller::Controller;
pub use error::{ClientError, StateError, TransportError};
pub use handler::{ConnectionHandler, RunExit};
pub use link::{LinkCommand, LinkEnd, LinkEvent, Transport, TransportLink};
pub use model::{Channel, JoinedChannel, Message};
pub use observer::SharedState;
pub use outbox::{Command, LIKE, Outbound, Outbox};
pub use polychat_core::{
    ConnectionState, Environment, SystemEnv,
    connection::{DEFAULT_BASE_URL, DEFAULT_RECONNECT_DELAY, DEFAULT_RETRY_DELAY},
};
pub use render::{ErrorSource, Invalidation, NullSink, PeerSignalSink, RenderSink, Surface};
pub use session::{Session, SessionEnd};
pub use state::{ChatState, Ingested, SnapshotOutcome};
pub use validation::{validate_group_name, validate_username};
