//! Environment abstraction for deterministic testing.
//!
//! Decouples connection logic from real timers. Production code uses
//! [`SystemEnv`] (tokio timers); tests use [`test_utils::MockEnv`], whose
//! `sleep` completes immediately, so retry and reconnect paths run without
//! real delays.

use std::{future::Future, time::Duration};

/// Abstract environment providing async sleeping.
///
/// # Invariants
///
/// - `sleep(d)` completes no earlier than `d` after it was created, as seen
///   by the environment's own clock
pub trait Environment: Clone + Send + Sync + 'static {
    /// Sleeps for the specified duration.
    ///
    /// Only driver code awaits this. The state machines never sleep; they
    /// return the delay inside an action.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send + 'static;
}

/// Production environment backed by tokio timers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send + 'static {
        tokio::time::sleep(duration)
    }
}

/// Deterministic environments for tests.
pub mod test_utils {
    use std::{
        future::Future,
        sync::{Arc, Mutex, PoisonError},
        time::Duration,
    };

    use super::Environment;

    /// Virtual-time environment.
    ///
    /// `sleep` returns a future that is immediately ready. Every requested
    /// delay is recorded so tests can assert on scheduling without waiting
    /// for it.
    #[derive(Debug, Clone, Default)]
    pub struct MockEnv {
        sleeps: Arc<Mutex<Vec<Duration>>>,
    }

    impl MockEnv {
        /// Create a mock environment with no recorded sleeps.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Every duration passed to `sleep`, in call order.
        #[must_use]
        pub fn sleeps(&self) -> Vec<Duration> {
            self.sleeps.lock().unwrap_or_else(PoisonError::into_inner).clone()
        }
    }

    impl Environment for MockEnv {
        fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send + 'static {
            self.sleeps.lock().unwrap_or_else(PoisonError::into_inner).push(duration);
            std::future::ready(())
        }
    }
}
