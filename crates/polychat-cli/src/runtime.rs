//! Async runtime
//!
//! Runs the session and the stdin reader side by side on one thread. The
//! reader turns lines into controller intents; the session serves the
//! connection until the user quits, signs out or the server ends it.

use std::rc::Rc;

use polychat_client::{
    ChatState, ClientConfig, Controller, Session, SessionEnd, StateError, SystemEnv,
    transport::WebSocketTransport, validate_username,
};
use polychat_proto::ChannelId;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::{
    commands::{self, Command, HELP},
    error::CliError,
    render::{TextRenderer, channel_list},
};

/// Connect as `identity` and serve until the session ends.
///
/// Must run inside a `LocalSet`; the stdin reader is a local task.
pub async fn run(config: ClientConfig, identity: String) -> Result<SessionEnd, CliError> {
    if !validate_username(&identity) {
        return Err(CliError::InvalidUsername(identity));
    }

    let renderer = Rc::new(TextRenderer::stdout());
    let mut session = Session::new(
        WebSocketTransport::new(),
        SystemEnv::new(),
        &config,
        &identity,
        renderer.clone(),
        renderer.clone(),
    )?;
    renderer.attach(session.state());

    let input = tokio::task::spawn_local(read_input(session.controller(), renderer.clone()));

    tracing::info!(server = %config.base_url, %identity, "connecting");
    session.start()?;
    let end = session.run().await;

    input.abort();
    end.map_err(CliError::from)
}

async fn read_input<W: std::io::Write>(controller: Controller, renderer: Rc<TextRenderer<W>>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                tracing::warn!(%err, "stdin read failed");
                break;
            },
        };
        match dispatch(&controller, commands::parse(&line)) {
            Ok(notices) => notices.iter().for_each(|n| renderer.notice(n)),
            Err(err) => renderer.notice(&err.to_string()),
        }
    }

    // Input is gone; nothing more can be asked of the session.
    if controller.quit().is_err() {
        tracing::debug!("session already closed");
    }
}

/// Carry out one command. Returns lines to show the user.
pub fn dispatch(controller: &Controller, command: Command) -> Result<Vec<String>, StateError> {
    let resolve = |arg: &str| resolve_channel(&controller.state().borrow(), arg);

    match command {
        Command::Message { text } if text.is_empty() => {},
        Command::Message { text } => controller.send_message(&text)?,
        Command::Focus { channel } => controller.set_focus(&resolve(&channel)?)?,
        Command::Join { channel } => controller.join(&resolve(&channel)?)?,
        Command::Leave { channel } => controller.leave(&resolve(&channel)?)?,
        Command::Toggle { channel } => controller.toggle_membership(&resolve(&channel)?)?,
        Command::Voice { channel } => controller.toggle_voice(&resolve(&channel)?, Value::Null)?,
        Command::Create { name } => controller.create_channel(&name)?,
        Command::Nick { name } => controller.change_identity(&name)?,
        Command::Refresh => controller.refresh_history()?,
        Command::Like => controller.send_like()?,
        Command::Dismiss => {
            if controller.dismiss_error().is_none() {
                return Ok(vec!["no errors".to_string()]);
            }
        },
        Command::Channels => return Ok(channel_list(&controller.state().borrow())),
        Command::SignOut => controller.sign_out()?,
        Command::Quit => controller.quit()?,
        Command::Help => return Ok(HELP.iter().map(ToString::to_string).collect()),
        Command::Unknown { input } => return Ok(vec![format!("unknown command: {input}")]),
        Command::InvalidArgs { command, error } => {
            return Ok(vec![format!("/{command}: {error}")]);
        },
    }
    Ok(Vec::new())
}

/// Find a channel by id, then by display name.
fn resolve_channel(state: &ChatState, arg: &str) -> Result<ChannelId, StateError> {
    let id = ChannelId::from(arg);
    if state.channel(&id).is_some() {
        return Ok(id);
    }
    state
        .channels()
        .iter()
        .find(|c| c.name() == arg)
        .map(|c| c.id().clone())
        .ok_or(StateError::UnknownChannel(id))
}
