//! Connection policy state machine.
//!
//! Decides when to open a transport, when to reconnect, and what to do with
//! outbound frames. Uses the action pattern: methods take inputs and return
//! actions for the driver to execute. The state machine performs no I/O and
//! never sleeps; delays are carried inside the actions.
//!
//! # State Machine
//!
//! ```text
//!              connect            open
//! ┌────────┐ ─────────> ┌────────────┐ ──────> ┌──────┐
//! │ Closed │            │ Connecting │         │ Open │
//! └────────┘ <───────── └────────────┘ <────── └──────┘
//!     ↑      close ≠ 1006   ↑    │  close 1006     │
//!     │                     └────┘                 │ clean
//!     │                  close 1006                ↓
//!     │                                       ┌─────────┐
//!     └────────────────────────────────────── │ Closing │
//!                     detached                └─────────┘
//! ```
//!
//! Only an abnormal closure (1006) reconnects. Any other code is a
//! server-directed termination and ends the session. A local `clean` closes
//! with 1000 and detaches the link first, so it can never loop back into a
//! reconnect.

use std::time::Duration;

use polychat_proto::Frame;
use url::Url;

use crate::error::ConnectionError;

/// Close code for a graceful, locally initiated close.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Close code for a connection dropped without a close handshake.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Delay before an outbound frame that could not be written is tried again.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Delay before the second and later consecutive reconnect attempts.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(500);

/// Server used when none is configured.
pub const DEFAULT_BASE_URL: &str = "wss://inter-host.ca/staging";

/// Path of the chat endpoint under the base URL.
pub const CHAT_SERVICE_PATH: &str = "chatservice";

/// Query parameter carrying the identity.
pub const IDENTITY_PARAM: &str = "username";

/// Actions returned by the connection state machine.
///
/// The driver executes these in order:
/// - `SetLoading`: tell the rendering layer a connect attempt started/ended
/// - `OpenTransport`: wait `delay`, then dial `url` as the new link
/// - `Send`: write the frame to the current link
/// - `ScheduleRetry`: hand the frame back to `emit` after `delay`
/// - `CloseTransport`: close the current link with `code` and detach it
/// - `Terminated`: the server ended the session; stop driving it
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionAction {
    /// Loading indicator on or off
    SetLoading(bool),

    /// Open a new transport link
    OpenTransport {
        /// Connection URL including the identity parameter
        url: String,
        /// Time to wait before dialling
        delay: Duration,
    },

    /// Write this frame to the open link
    Send(Frame),

    /// Try to emit this frame again later
    ScheduleRetry {
        /// Frame to re-emit
        frame: Frame,
        /// Time to wait before re-emitting
        delay: Duration,
    },

    /// Close and detach the current link
    CloseTransport {
        /// Close code to send
        code: u16,
    },

    /// Session ended by the server
    Terminated {
        /// Close code reported by the transport
        code: u16,
    },
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No link
    Closed,
    /// Link requested, waiting for it to open
    Connecting,
    /// Link open, frames are written directly
    Open,
    /// Local close in progress
    Closing,
}

/// Connection configuration
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Server base URL; the chat endpoint is appended to it
    pub base_url: String,
    /// Delay before re-emitting a frame that could not be written
    pub retry_delay: Duration,
    /// Delay between consecutive reconnect attempts
    pub reconnect_delay: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            retry_delay: DEFAULT_RETRY_DELAY,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

/// Connection state machine
///
/// Owns the reconnect and retry policy for exactly one logical channel. The
/// driver owns the link itself.
#[derive(Debug, Clone)]
pub struct Connection {
    state: ConnectionState,
    config: ConnectionConfig,
    /// Connection URL for the current identity
    url: Option<String>,
    /// Abnormal closures since the last successful open
    failures: u32,
}

impl Connection {
    /// Create a connection in [`ConnectionState::Closed`] with no identity.
    pub fn new(config: ConnectionConfig) -> Self {
        Self { state: ConnectionState::Closed, config, url: None, failures: 0 }
    }

    /// Current connection state
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// URL the next link will dial. `None` until an identity is set.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Consecutive abnormal closures since the last open.
    #[must_use]
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Rebuild the connection URL for a new identity.
    ///
    /// Takes effect on the next `connect`; an open link is not touched.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::InvalidUrl` if the base URL does not parse
    pub fn set_identity(&mut self, identity: &str) -> Result<(), ConnectionError> {
        self.url = Some(build_url(&self.config.base_url, identity)?);
        Ok(())
    }

    /// Start a fresh connect attempt.
    ///
    /// The first attempt of a session is never delayed.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::MissingIdentity` if no identity was set
    /// - `ConnectionError::InvalidState` if a link is already live
    pub fn connect(&mut self) -> Result<Vec<ConnectionAction>, ConnectionError> {
        if matches!(self.state, ConnectionState::Connecting | ConnectionState::Open) {
            return Err(ConnectionError::InvalidState { state: self.state, operation: "connect" });
        }
        let Some(url) = self.url.clone() else {
            return Err(ConnectionError::MissingIdentity);
        };

        self.state = ConnectionState::Connecting;
        self.failures = 0;

        Ok(vec![ConnectionAction::SetLoading(true), ConnectionAction::OpenTransport {
            url,
            delay: Duration::ZERO,
        }])
    }

    /// The current link reported that it is open.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::InvalidState` if no connect attempt is pending
    pub fn handle_open(&mut self) -> Result<Vec<ConnectionAction>, ConnectionError> {
        if self.state != ConnectionState::Connecting {
            return Err(ConnectionError::InvalidState {
                state: self.state,
                operation: "handle_open",
            });
        }

        self.state = ConnectionState::Open;
        self.failures = 0;

        Ok(vec![ConnectionAction::SetLoading(false)])
    }

    /// The current link closed with `code`.
    ///
    /// Abnormal closure starts a new attempt; anything else terminates the
    /// session. A close arriving after a local clean is ignored.
    pub fn handle_close(&mut self, code: u16) -> Vec<ConnectionAction> {
        let was_connecting = match self.state {
            ConnectionState::Connecting => true,
            ConnectionState::Open => false,
            ConnectionState::Closing | ConnectionState::Closed => return Vec::new(),
        };

        match (code, self.url.clone()) {
            (ABNORMAL_CLOSURE, Some(url)) => {
                let delay = if self.failures == 0 {
                    Duration::ZERO
                } else {
                    self.config.reconnect_delay
                };
                self.failures = self.failures.saturating_add(1);
                self.state = ConnectionState::Connecting;

                vec![ConnectionAction::SetLoading(true), ConnectionAction::OpenTransport {
                    url,
                    delay,
                }]
            },
            _ => {
                self.state = ConnectionState::Closed;

                let mut actions = Vec::with_capacity(2);
                if was_connecting {
                    actions.push(ConnectionAction::SetLoading(false));
                }
                actions.push(ConnectionAction::Terminated { code });
                actions
            },
        }
    }

    /// Queue an outbound frame.
    ///
    /// Written immediately when open; otherwise scheduled for a retry so it
    /// survives an in-flight reconnect.
    pub fn emit(&mut self, frame: Frame) -> Vec<ConnectionAction> {
        if self.state == ConnectionState::Open {
            vec![ConnectionAction::Send(frame)]
        } else {
            vec![self.retry(frame)]
        }
    }

    /// A write to the current link failed.
    pub fn send_failed(&mut self, frame: Frame) -> Vec<ConnectionAction> {
        vec![self.retry(frame)]
    }

    /// Close the current link gracefully and detach it.
    ///
    /// Clears the loading indicator if a connect attempt was pending.
    pub fn clean(&mut self) -> Vec<ConnectionAction> {
        let mut actions = Vec::with_capacity(2);
        match self.state {
            ConnectionState::Closed | ConnectionState::Closing => return actions,
            ConnectionState::Connecting => actions.push(ConnectionAction::SetLoading(false)),
            ConnectionState::Open => {},
        }

        self.state = ConnectionState::Closing;
        self.failures = 0;
        actions.push(ConnectionAction::CloseTransport { code: NORMAL_CLOSURE });
        actions
    }

    /// The driver dropped the link after a local close.
    pub fn handle_detached(&mut self) {
        if self.state == ConnectionState::Closing {
            self.state = ConnectionState::Closed;
        }
    }

    fn retry(&self, frame: Frame) -> ConnectionAction {
        ConnectionAction::ScheduleRetry { frame, delay: self.config.retry_delay }
    }
}

/// Build `{base}/chatservice?username={identity}`.
///
/// # Errors
///
/// - `ConnectionError::InvalidUrl` if `base` does not parse
pub fn build_url(base: &str, identity: &str) -> Result<String, ConnectionError> {
    let invalid = |reason: String| ConnectionError::InvalidUrl { url: base.to_string(), reason };

    let endpoint = format!("{}/{CHAT_SERVICE_PATH}", base.trim_end_matches('/'));
    let mut url = Url::parse(&endpoint).map_err(|e| invalid(e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(invalid("not a hierarchical url".to_string()));
    }
    url.query_pairs_mut().append_pair(IDENTITY_PARAM, identity);

    Ok(url.into())
}
