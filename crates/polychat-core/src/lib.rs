//! Sans-IO core of the PolyChat connection layer.
//!
//! Everything here is synchronous and free of I/O so it can be driven by the
//! async client in production and stepped by hand in tests.
//!
//! # Components
//!
//! - [`Connection`]: connect/reconnect/retry/clean policy as an action-returning
//!   state machine
//! - [`EventBus`]: ordered multi-subscriber notification with failure isolation
//! - [`TopicRegistry`]: one bus per inbound topic; routes decoded frames
//! - [`Environment`]: time abstraction (system clock or virtual clock)

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod bus;
pub mod connection;
pub mod env;
pub mod error;
pub mod topics;

pub use bus::{EventBus, SubscriptionId};
pub use connection::{
    ABNORMAL_CLOSURE, Connection, ConnectionAction, ConnectionConfig, ConnectionState,
    NORMAL_CLOSURE,
};
pub use env::{Environment, SystemEnv};
pub use error::{ConnectionError, ObserverError};
pub use topics::{Routed, TopicRegistry};
