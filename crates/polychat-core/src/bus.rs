//! Multi-subscriber publish/notify primitive.
//!
//! An [`EventBus`] holds an ordered list of callbacks. Publishing an event
//! invokes each callback once, synchronously, in registration order. There is
//! no persistence: events published with no subscribers are gone.
//!
//! # Failure isolation
//!
//! A subscriber that returns an [`ObserverError`] or panics does not stop
//! delivery to the subscribers after it. Errors are logged at `warn`, panics
//! are caught at the dispatch boundary and logged at `error`.

use std::{
    any::Any,
    fmt,
    panic::{self, AssertUnwindSafe},
};

use crate::error::ObserverError;

/// Opaque handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Callback<T> = Box<dyn FnMut(&T) -> Result<(), ObserverError>>;

/// Typed event bus.
pub struct EventBus<T> {
    label: &'static str,
    next_id: u64,
    subscribers: Vec<(SubscriptionId, Callback<T>)>,
}

impl<T> EventBus<T> {
    /// Create an empty bus. `label` names the bus in log output.
    pub fn new(label: &'static str) -> Self {
        Self { label, next_id: 0, subscribers: Vec::new() }
    }

    /// Name used in log output.
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Register a callback. It will be invoked after every callback
    /// registered before it.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&T) -> Result<(), ObserverError> + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Remove a callback. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub, _)| *sub != id);
        self.subscribers.len() != before
    }

    /// Number of registered callbacks.
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// True if nothing is subscribed.
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Deliver `event` to every subscriber.
    ///
    /// Returns the number of callbacks that completed successfully.
    pub fn publish(&mut self, event: &T) -> usize {
        let mut delivered = 0;

        for (id, callback) in &mut self.subscribers {
            match panic::catch_unwind(AssertUnwindSafe(|| callback(event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(err)) => {
                    tracing::warn!(bus = self.label, subscription = id.0, %err, "subscriber failed");
                },
                Err(payload) => {
                    tracing::error!(
                        bus = self.label,
                        subscription = id.0,
                        panic = panic_message(payload.as_ref()),
                        "subscriber panicked"
                    );
                },
            }
        }

        delivered
    }
}

impl<T> fmt::Debug for EventBus<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("label", &self.label)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;

    fn recorder(
        log: &Rc<RefCell<Vec<String>>>,
        name: &'static str,
    ) -> impl FnMut(&u32) -> Result<(), ObserverError> + 'static {
        let log = Rc::clone(log);
        move |event| {
            log.borrow_mut().push(format!("{name}:{event}"));
            Ok(())
        }
    }

    #[test]
    fn publish_runs_in_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new("test");
        bus.subscribe(recorder(&log, "a"));
        bus.subscribe(recorder(&log, "b"));

        assert_eq!(bus.publish(&7), 2);
        assert_eq!(*log.borrow(), vec!["a:7", "b:7"]);
    }

    #[test]
    fn unsubscribed_callback_is_not_invoked() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new("test");
        let a = bus.subscribe(recorder(&log, "a"));
        bus.subscribe(recorder(&log, "b"));

        assert!(bus.unsubscribe(a));
        assert!(!bus.unsubscribe(a));
        bus.publish(&1);

        assert_eq!(*log.borrow(), vec!["b:1"]);
    }

    #[test]
    fn failing_subscriber_does_not_stop_delivery() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new("test");
        bus.subscribe(|_: &u32| Err(ObserverError::Rejected("nope".to_string())));
        bus.subscribe(recorder(&log, "after"));

        assert_eq!(bus.publish(&3), 1);
        assert_eq!(*log.borrow(), vec!["after:3"]);
    }

    #[test]
    fn panicking_subscriber_does_not_stop_delivery() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new("test");
        bus.subscribe(|_: &u32| panic!("observer bug"));
        bus.subscribe(recorder(&log, "after"));

        assert_eq!(bus.publish(&4), 1);
        assert_eq!(*log.borrow(), vec!["after:4"]);

        // Bus stays usable after a panic
        assert_eq!(bus.publish(&5), 1);
    }

    #[test]
    fn publish_without_subscribers_is_a_noop() {
        let mut bus: EventBus<u32> = EventBus::new("empty");
        assert!(bus.is_empty());
        assert_eq!(bus.publish(&0), 0);
    }
}
