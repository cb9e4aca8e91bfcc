//! PolyChat terminal client.
//!
//! A line-oriented front end over [`polychat_client`]: stdin lines become
//! controller intents, invalidations become printed text.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod commands;
pub mod error;
pub mod render;
pub mod runtime;

pub use error::CliError;
