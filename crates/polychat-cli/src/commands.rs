//! Slash-command parsing.
//!
//! A line starting with `/` is a command; anything else is a chat message
//! for the focused channel.

/// Parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/focus <channel>`
    Focus {
        /// Channel id or name
        channel: String,
    },
    /// `/join <channel>`
    Join {
        /// Channel id or name
        channel: String,
    },
    /// `/leave <channel>`
    Leave {
        /// Channel id or name
        channel: String,
    },
    /// `/toggle <channel>`
    Toggle {
        /// Channel id or name
        channel: String,
    },
    /// `/create <name>`
    Create {
        /// New channel name
        name: String,
    },
    /// `/nick <name>`
    Nick {
        /// New identity
        name: String,
    },
    /// `/voice <channel>`
    Voice {
        /// Channel id or name
        channel: String,
    },
    /// `/refresh`
    Refresh,
    /// `/dismiss`
    Dismiss,
    /// `/like`
    Like,
    /// `/channels`
    Channels,
    /// `/signout`
    SignOut,
    /// `/help`
    Help,
    /// `/quit`
    Quit,
    /// Plain text
    Message {
        /// Text to send
        text: String,
    },
    /// Unrecognized command
    Unknown {
        /// The line as typed
        input: String,
    },
    /// Recognized command with bad arguments
    InvalidArgs {
        /// Command name without the slash
        command: String,
        /// What is wrong
        error: String,
    },
}

/// One-line usage summary per command.
pub const HELP: &[&str] = &[
    "/focus <channel>   show a channel",
    "/join <channel>    join a channel",
    "/leave <channel>   leave a channel",
    "/toggle <channel>  join or leave a channel",
    "/create <name>     create a channel (5-20 characters)",
    "/nick <name>       reconnect as another user (3-15 characters)",
    "/voice <channel>   enter or leave a voice room",
    "/refresh           reload the focused channel's history",
    "/dismiss           dismiss the oldest error",
    "/like              send a thumbs-up",
    "/channels          list channels",
    "/signout           sign out and exit",
    "/quit              exit",
];

/// Parse one input line.
pub fn parse(line: &str) -> Command {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        return Command::Message { text: line.to_string() };
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    let with_arg = |build: fn(String) -> Command, what: &str| {
        if arg.is_empty() {
            Command::InvalidArgs { command: name.to_string(), error: format!("missing {what}") }
        } else {
            build(arg.to_string())
        }
    };
    let bare = |command: Command| {
        if arg.is_empty() {
            command
        } else {
            Command::InvalidArgs {
                command: name.to_string(),
                error: "takes no arguments".to_string(),
            }
        }
    };

    match name {
        "focus" => with_arg(|channel| Command::Focus { channel }, "channel"),
        "join" => with_arg(|channel| Command::Join { channel }, "channel"),
        "leave" => with_arg(|channel| Command::Leave { channel }, "channel"),
        "toggle" => with_arg(|channel| Command::Toggle { channel }, "channel"),
        "create" => with_arg(|name| Command::Create { name }, "name"),
        "nick" => with_arg(|name| Command::Nick { name }, "name"),
        "voice" => with_arg(|channel| Command::Voice { channel }, "channel"),
        "refresh" => bare(Command::Refresh),
        "dismiss" => bare(Command::Dismiss),
        "like" => bare(Command::Like),
        "channels" => bare(Command::Channels),
        "signout" => bare(Command::SignOut),
        "help" => bare(Command::Help),
        "quit" | "exit" => bare(Command::Quit),
        _ => Command::Unknown { input: line.to_string() },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_a_message() {
        assert_eq!(parse("  hello there "), Command::Message { text: "hello there".into() });
    }

    #[test]
    fn commands_with_arguments() {
        assert_eq!(parse("/focus general"), Command::Focus { channel: "general".into() });
        assert_eq!(parse("/create  the lounge "), Command::Create { name: "the lounge".into() });
        assert_eq!(parse("/nick bob"), Command::Nick { name: "bob".into() });
    }

    #[test]
    fn missing_argument_is_reported() {
        assert_eq!(parse("/join"), Command::InvalidArgs {
            command: "join".into(),
            error: "missing channel".into()
        });
    }

    #[test]
    fn bare_commands_reject_arguments() {
        assert_eq!(parse("/like"), Command::Like);
        assert_eq!(parse("/quit now"), Command::InvalidArgs {
            command: "quit".into(),
            error: "takes no arguments".into()
        });
    }

    #[test]
    fn unknown_command_keeps_input() {
        assert_eq!(parse("/dance wildly"), Command::Unknown { input: "/dance wildly".into() });
    }
}
