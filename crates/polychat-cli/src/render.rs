//! Plain-text rendering.
//!
//! Prints whatever an invalidation names as a few lines of text. Redrawing
//! "everything" reprints the channel list, the focused history and the
//! navigation line. Only server errors are shown to the user; transport
//! faults go to the log.

use std::{
    cell::RefCell,
    io::{self, Write},
};

use polychat_client::{
    ChatState, ErrorSource, Invalidation, Message, PeerSignalSink, RenderSink, SharedState,
    Surface,
};
use polychat_proto::ChannelId;
use serde_json::Value;

/// Render sink writing lines to `W`.
pub struct TextRenderer<W: Write> {
    out: RefCell<W>,
    state: RefCell<Option<SharedState>>,
}

impl TextRenderer<io::Stdout> {
    /// Renderer on standard output.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TextRenderer<W> {
    /// Renderer on `out`. Nothing but notices is printed until a state is
    /// attached.
    pub fn new(out: W) -> Self {
        Self { out: RefCell::new(out), state: RefCell::new(None) }
    }

    /// Read from `state` when redrawing.
    pub fn attach(&self, state: SharedState) {
        *self.state.borrow_mut() = Some(state);
    }

    /// Print a one-off line.
    pub fn notice(&self, text: &str) {
        self.write_lines(&[format!("-- {text}")]);
    }

    /// Consume the renderer and return the writer.
    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    fn lines_for(&self, scope: &Invalidation) -> Vec<String> {
        let Some(state) = self.state.borrow().clone() else {
            return Vec::new();
        };
        let state = state.borrow();

        match scope {
            Invalidation::All => {
                let mut lines = channel_list(&state);
                lines.extend(chat_window(&state));
                lines.push(navigation(&state));
                lines
            },
            Invalidation::Surface(Surface::ChannelList) => channel_list(&state),
            Invalidation::Surface(Surface::ChatWindow) => chat_window(&state),
            Invalidation::Surface(Surface::Navigation) => vec![navigation(&state)],
            Invalidation::Surface(Surface::Errors) => {
                state.current_error().map(error_line).into_iter().collect()
            },
            Invalidation::Surface(Surface::Loading) => Vec::new(),
            Invalidation::AppendMessage { channel_id } => {
                last_message(&state, channel_id).map(message_line).into_iter().collect()
            },
        }
    }

    fn write_lines(&self, lines: &[String]) {
        let mut out = self.out.borrow_mut();
        let written = lines
            .iter()
            .try_for_each(|line| writeln!(out, "{line}"))
            .and_then(|()| out.flush());
        if let Err(err) = written {
            tracing::warn!(%err, "failed to write output");
        }
    }
}

impl<W: Write> RenderSink for TextRenderer<W> {
    fn invalidate(&self, scope: Invalidation) {
        let lines = self.lines_for(&scope);
        self.write_lines(&lines);
    }

    fn loading_changed(&self, loading: bool) {
        if loading {
            self.notice("connecting...");
        }
    }

    fn error(&self, source: ErrorSource, message: &str) {
        match source {
            ErrorSource::Server => self.write_lines(&[error_line(message)]),
            ErrorSource::Transport => tracing::debug!(%message, "transport error"),
        }
    }
}

impl<W: Write> PeerSignalSink for TextRenderer<W> {
    fn signal(&self, payload: &Value) {
        tracing::debug!(%payload, "peer signal ignored; no media stack");
    }
}

/// Channel list, one line per channel.
pub fn channel_list(state: &ChatState) -> Vec<String> {
    let mut lines = vec!["channels:".to_string()];
    for channel in state.channels() {
        let id = channel.id();
        let focus = if state.focus() == Some(id) { '>' } else { ' ' };
        let member = if channel.is_joined() { 'x' } else { ' ' };
        let mut line = format!(
            "{focus} [{member}] {} ({} users)",
            channel.name(),
            channel.snapshot.number_of_users
        );
        match state.unread(id) {
            0 => {},
            n => line.push_str(&format!(" {n} unread")),
        }
        if state.voice_channel() == Some(id) {
            line.push_str(" [voice]");
        }
        lines.push(line);
    }
    lines
}

/// Focused channel's history.
pub fn chat_window(state: &ChatState) -> Vec<String> {
    let Some(channel) = state.focused_channel() else {
        return vec!["(no channel focused)".to_string()];
    };
    let mut lines = vec![format!("== {} ==", channel.name())];
    lines.extend(channel.messages.iter().map(message_line));
    lines
}

/// Identity and total unread count.
pub fn navigation(state: &ChatState) -> String {
    let identity = state.identity().unwrap_or("(signed out)");
    format!("{identity} | {} unread", state.total_unread())
}

fn last_message<'a>(state: &'a ChatState, id: &ChannelId) -> Option<&'a Message> {
    state.channel(id).and_then(|c| c.messages.last())
}

fn message_line(message: &Message) -> String {
    let time = message.timestamp.instant().format("%H:%M:%S");
    format!("[{time}] {}: {}", message.sender, message.data)
}

fn error_line(message: &str) -> String {
    format!("!! {message} (/dismiss)")
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use polychat_proto::{ChannelSnapshot, Timestamp, WireMessage};

    use super::*;

    fn state() -> ChatState {
        let mut state = ChatState::new("alice");
        state.apply_snapshot(vec![
            ChannelSnapshot {
                id: "g".into(),
                name: "general".into(),
                number_of_users: 3,
                join_status: true,
            },
            ChannelSnapshot {
                id: "r".into(),
                name: "random".into(),
                number_of_users: 1,
                join_status: true,
            },
            ChannelSnapshot {
                id: "q".into(),
                name: "quiet".into(),
                number_of_users: 0,
                join_status: false,
            },
        ]);
        state.apply_history(&"g".into(), vec![WireMessage {
            sender: "bob".into(),
            data: "hello".into(),
            timestamp: Timestamp::from_millis(3_600_000).unwrap(),
            channel_id: None,
        }]);
        state
            .ingest(
                WireMessage {
                    sender: "bob".into(),
                    data: "over here".into(),
                    timestamp: Timestamp::from_millis(3_601_000).unwrap(),
                    channel_id: Some("r".into()),
                },
                &"r".into(),
            )
            .unwrap();
        state
    }

    fn rendered(renderer: TextRenderer<Vec<u8>>) -> String {
        String::from_utf8(renderer.into_inner()).unwrap()
    }

    #[test]
    fn full_redraw() {
        let renderer = TextRenderer::new(Vec::new());
        renderer.attach(Rc::new(RefCell::new(state())));
        renderer.invalidate(Invalidation::All);

        insta::assert_snapshot!(rendered(renderer), @r"
        channels:
        > [x] general (3 users)
          [x] random (1 users) 1 unread
          [ ] quiet (0 users)
        == general ==
        [01:00:00] bob: hello
        alice | 1 unread
        ");
    }

    #[test]
    fn append_prints_only_the_newest_message() {
        let renderer = TextRenderer::new(Vec::new());
        renderer.attach(Rc::new(RefCell::new(state())));
        renderer.invalidate(Invalidation::AppendMessage { channel_id: "r".into() });

        assert_eq!(rendered(renderer), "[01:00:01] bob: over here\n");
    }

    #[test]
    fn only_server_errors_are_printed() {
        let renderer = TextRenderer::new(Vec::new());
        renderer.error(ErrorSource::Transport, "connection lost, reconnecting");
        renderer.error(ErrorSource::Server, "name taken");

        assert_eq!(rendered(renderer), "!! name taken (/dismiss)\n");
    }

    #[test]
    fn nothing_is_drawn_before_a_state_is_attached() {
        let renderer = TextRenderer::new(Vec::new());
        renderer.invalidate(Invalidation::All);
        renderer.loading_changed(true);

        assert_eq!(rendered(renderer), "-- connecting...\n");
    }
}
