//! Per-topic routing of inbound frames.
//!
//! The registry owns one [`EventBus`] per supported inbound topic. The set of
//! buses is fixed when the registry is built; nothing can add a topic later.

use std::collections::BTreeMap;

use polychat_proto::{Frame, InboundTopic};

use crate::{
    bus::{EventBus, SubscriptionId},
    error::{ConnectionError, ObserverError},
};

/// Outcome of routing one inbound text frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    /// Frame delivered to its topic's bus.
    Delivered {
        /// Topic the frame was routed to
        topic: InboundTopic,
        /// Subscribers that handled it without error
        handled: usize,
    },
    /// Frame was dropped before reaching any bus.
    Dropped(ConnectionError),
}

/// Fixed map from inbound topic to its bus.
#[derive(Debug)]
pub struct TopicRegistry {
    buses: BTreeMap<InboundTopic, EventBus<Frame>>,
}

impl Default for TopicRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TopicRegistry {
    /// Build a registry with one bus per supported topic.
    pub fn new() -> Self {
        let buses = InboundTopic::ALL
            .into_iter()
            .map(|topic| (topic, EventBus::new(topic.as_str())))
            .collect();
        Self { buses }
    }

    /// Subscribe to a topic.
    pub fn subscribe<F>(&mut self, topic: InboundTopic, callback: F) -> SubscriptionId
    where
        F: FnMut(&Frame) -> Result<(), ObserverError> + 'static,
    {
        self.bus_mut(topic).subscribe(callback)
    }

    /// Subscribe to a topic by wire name.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::UnknownTopic` if the name is not a supported
    ///   inbound topic
    pub fn subscribe_named<F>(
        &mut self,
        name: &str,
        callback: F,
    ) -> Result<SubscriptionId, ConnectionError>
    where
        F: FnMut(&Frame) -> Result<(), ObserverError> + 'static,
    {
        let topic: InboundTopic = name.parse()?;
        Ok(self.subscribe(topic, callback))
    }

    /// Remove a subscription from a topic.
    pub fn unsubscribe(&mut self, topic: InboundTopic, id: SubscriptionId) -> bool {
        self.bus_mut(topic).unsubscribe(id)
    }

    /// Number of subscribers on a topic.
    pub fn subscriber_count(&self, topic: InboundTopic) -> usize {
        self.buses.get(&topic).map_or(0, EventBus::len)
    }

    /// Publish an already-decoded frame on its topic's bus.
    pub fn dispatch(&mut self, frame: &Frame) -> Routed {
        match frame.inbound_topic() {
            Ok(topic) => {
                let handled = self.bus_mut(topic).publish(frame);
                Routed::Delivered { topic, handled }
            },
            Err(err) => Routed::Dropped(err.into()),
        }
    }

    /// Decode a text frame and publish it.
    ///
    /// Malformed JSON and unknown topics are logged and dropped. They never
    /// reach a bus.
    pub fn route(&mut self, text: &str) -> Routed {
        let routed = match Frame::decode(text) {
            Ok(frame) => self.dispatch(&frame),
            Err(err) => Routed::Dropped(err.into()),
        };

        match &routed {
            Routed::Delivered { topic, handled } => {
                tracing::trace!(%topic, handled, "frame routed");
            },
            Routed::Dropped(err) => {
                tracing::warn!(%err, "dropping inbound frame");
            },
        }

        routed
    }

    // Every topic gets a bus in `new`; the insert is never hit.
    fn bus_mut(&mut self, topic: InboundTopic) -> &mut EventBus<Frame> {
        self.buses.entry(topic).or_insert_with(|| EventBus::new(topic.as_str()))
    }
}
