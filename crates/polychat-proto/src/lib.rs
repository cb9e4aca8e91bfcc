//! Wire protocol for the PolyChat event channel.
//!
//! Every logical message on the duplex channel is one JSON text frame of the
//! shape `{topic, channelId, data}`. This crate owns that shape ([`Frame`]),
//! the closed sets of topics in each direction ([`InboundTopic`],
//! [`OutboundTopic`]), and the typed payloads carried by the inbound topics.
//!
//! # Components
//!
//! - [`Frame`]: one wire frame, carried verbatim through the event buses
//! - [`InboundTopic`] / [`OutboundTopic`]: tagged dispatch over the topic sets
//! - [`payloads`]: channel snapshots, history batches and chat messages
//! - [`ProtocolError`]: structured decode failures (never fatal to a session)

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod errors;
mod frame;
pub mod payloads;
mod topic;

pub use errors::{ProtocolError, Result};
pub use frame::Frame;
pub use payloads::{ChannelHistory, ChannelId, ChannelSnapshot, Timestamp, WireMessage};
pub use topic::{InboundTopic, OutboundTopic};
