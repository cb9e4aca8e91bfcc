//! Client configuration.

use std::time::Duration;

use polychat_core::{
    ConnectionConfig,
    connection::{DEFAULT_BASE_URL, DEFAULT_RECONNECT_DELAY, DEFAULT_RETRY_DELAY},
};

/// Settings for a [`Session`](crate::Session).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Server base URL
    pub base_url: String,
    /// Delay before a frame that could not be written is emitted again
    pub retry_delay: Duration,
    /// Delay between consecutive reconnect attempts
    pub reconnect_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            retry_delay: DEFAULT_RETRY_DELAY,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

impl From<&ClientConfig> for ConnectionConfig {
    fn from(config: &ClientConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            retry_delay: config.retry_delay,
            reconnect_delay: config.reconnect_delay,
        }
    }
}
