//! Transport seam.
//!
//! A [`Transport`] opens links. A [`TransportLink`] is one underlying
//! connection as seen by the handler: a command sender and an event
//! receiver. The I/O side holds the matching [`LinkEnd`]. Dropping a link
//! detaches it; whatever the I/O side reports afterwards is never observed.

use std::time::Duration;

use polychat_proto::Frame;
use tokio::sync::mpsc;

/// Command from the handler to the I/O side of a link.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkCommand {
    /// Write a frame
    Send(Frame),
    /// Close with this code
    Close(u16),
}

/// Event from the I/O side of a link.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// Connection established
    Opened,
    /// Text frame received
    Frame(String),
    /// A write failed; the frame is handed back
    SendFailed(Frame),
    /// Connection closed
    Closed {
        /// Close code (1006 if the connection dropped)
        code: u16,
    },
}

/// Opens links to the server.
pub trait Transport {
    /// Start opening a link to `url` after `delay`.
    ///
    /// Returns immediately. Progress arrives as [`LinkEvent`]s: `Opened` on
    /// success, `Closed { code: 1006 }` if dialling fails.
    fn open(&self, url: &str, delay: Duration) -> TransportLink;
}

/// Handler side of a link.
#[derive(Debug)]
pub struct TransportLink {
    commands: mpsc::UnboundedSender<LinkCommand>,
    events: mpsc::UnboundedReceiver<LinkEvent>,
}

/// I/O side of a link.
#[derive(Debug)]
pub struct LinkEnd {
    /// Commands from the handler. Ends when the link is dropped.
    pub commands: mpsc::UnboundedReceiver<LinkCommand>,
    /// Events for the handler.
    pub events: mpsc::UnboundedSender<LinkEvent>,
}

impl LinkEnd {
    /// Report an event. Returns `false` once the handler detached.
    pub fn report(&self, event: LinkEvent) -> bool {
        self.events.send(event).is_ok()
    }

    /// Whether the handler dropped its side of the link.
    pub fn is_detached(&self) -> bool {
        self.events.is_closed()
    }

    /// Close code the handler asked for before detaching, if it asked.
    pub fn requested_close(&mut self) -> Option<u16> {
        std::iter::from_fn(|| self.commands.try_recv().ok()).find_map(|command| match command {
            LinkCommand::Close(code) => Some(code),
            LinkCommand::Send(_) => None,
        })
    }
}

impl TransportLink {
    /// Create a connected link/end pair.
    pub fn pair() -> (Self, LinkEnd) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        (Self { commands: command_tx, events: event_rx }, LinkEnd {
            commands: command_rx,
            events: event_tx,
        })
    }

    /// Hand a frame to the I/O side. Gives the frame back if it is gone.
    pub fn send(&self, frame: Frame) -> Result<(), Frame> {
        if self.commands.is_closed() {
            return Err(frame);
        }
        self.commands.send(LinkCommand::Send(frame.clone())).map_err(|_| frame)
    }

    /// Close with `code` and detach.
    pub fn close(self, code: u16) {
        if self.commands.send(LinkCommand::Close(code)).is_err() {
            tracing::debug!(code, "link already gone at close");
        }
    }

    /// Next event. `None` once the I/O side is gone.
    pub async fn next_event(&mut self) -> Option<LinkEvent> {
        self.events.recv().await
    }
}

/// Test doubles.
pub mod test_utils {
    use std::{cell::RefCell, collections::VecDeque, rc::Rc, time::Duration};

    use super::{LinkCommand, LinkEnd, LinkEvent, Transport, TransportLink};

    /// One `open` call seen by [`ScriptedTransport`].
    #[derive(Debug)]
    pub struct OpenedLink {
        /// URL dialled
        pub url: String,
        /// Delay requested before dialling
        pub delay: Duration,
        /// I/O side of the link
        pub end: LinkEnd,
    }

    #[derive(Debug, Default)]
    struct Script {
        pending: VecDeque<Vec<LinkEvent>>,
        opened: Vec<OpenedLink>,
    }

    /// Transport that replays scripted events.
    ///
    /// Each `open` takes the next script and reports its events on the new
    /// link straight away. A link opened with no script left stays silent.
    #[derive(Debug, Clone, Default)]
    pub struct ScriptedTransport {
        inner: Rc<RefCell<Script>>,
    }

    impl ScriptedTransport {
        /// Transport with no scripts.
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue the events for the next link opened.
        pub fn script(&self, events: impl IntoIterator<Item = LinkEvent>) -> &Self {
            self.inner.borrow_mut().pending.push_back(events.into_iter().collect());
            self
        }

        /// `(url, delay)` of every link opened, in order.
        pub fn opened(&self) -> Vec<(String, Duration)> {
            self.inner.borrow().opened.iter().map(|l| (l.url.clone(), l.delay)).collect()
        }

        /// Drain the commands the handler sent on link `index`.
        pub fn commands(&self, index: usize) -> Vec<LinkCommand> {
            let mut inner = self.inner.borrow_mut();
            let Some(link) = inner.opened.get_mut(index) else {
                return Vec::new();
            };
            std::iter::from_fn(|| link.end.commands.try_recv().ok()).collect()
        }

        /// Report an event on link `index`. `false` if it was detached.
        pub fn report(&self, index: usize, event: LinkEvent) -> bool {
            self.inner.borrow().opened.get(index).is_some_and(|l| l.end.report(event))
        }
    }

    impl Transport for ScriptedTransport {
        fn open(&self, url: &str, delay: Duration) -> TransportLink {
            let (link, end) = TransportLink::pair();
            let mut inner = self.inner.borrow_mut();
            for event in inner.pending.pop_front().unwrap_or_default() {
                end.report(event);
            }
            inner.opened.push(OpenedLink { url: url.to_string(), delay, end });
            link
        }
    }
}
