//! WebSocket transport.
//!
//! Each link is served by a spawned task that dials the server, then pumps
//! frames between the link's channels and the socket. The task only talks
//! to the handler through the link, so it never touches chat state.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use polychat_core::{ABNORMAL_CLOSURE, NORMAL_CLOSURE};
use polychat_proto::Frame;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{
        Message,
        protocol::{CloseFrame, frame::coding::CloseCode},
    },
};

use crate::{
    error::TransportError,
    link::{LinkCommand, LinkEnd, LinkEvent, Transport, TransportLink},
};

/// Close code reported when the server closes without a status.
pub const NO_STATUS_RECEIVED: u16 = 1005;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Transport over `ws://` and `wss://` URLs.
///
/// Must be used inside a tokio runtime; every `open` spawns a task.
#[derive(Debug, Clone, Copy)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    /// Create the transport and install the TLS crypto provider.
    pub fn new() -> Self {
        // Fails only if a provider is already installed, which is fine.
        if rustls::crypto::ring::default_provider().install_default().is_err() {
            tracing::debug!("crypto provider already installed");
        }
        Self
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for WebSocketTransport {
    fn open(&self, url: &str, delay: Duration) -> TransportLink {
        let (link, end) = TransportLink::pair();
        tokio::spawn(run_link(url.to_string(), delay, end));
        link
    }
}

async fn dial(url: &str) -> Result<Socket, TransportError> {
    let (socket, response) =
        connect_async(url).await.map_err(|e| TransportError::Connection(e.to_string()))?;
    tracing::debug!(status = %response.status(), "websocket handshake complete");
    Ok(socket)
}

fn encode(frame: &Frame) -> Result<Message, TransportError> {
    frame
        .encode()
        .map(|text| Message::Text(text.into()))
        .map_err(|e| TransportError::Protocol(e.to_string()))
}

async fn close_socket(mut socket: Socket, code: u16) {
    let close = CloseFrame { code: CloseCode::from(code), reason: "".into() };
    if let Err(err) = socket.close(Some(close)).await {
        tracing::debug!(%err, "close handshake failed");
    }
}

async fn run_link(url: String, delay: Duration, mut end: LinkEnd) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    if end.is_detached() {
        tracing::debug!(%url, "link detached before dialling");
        return;
    }

    let socket = match dial(&url).await {
        Ok(socket) => socket,
        Err(err) => {
            tracing::warn!(%err, %url, "dial failed");
            end.report(LinkEvent::Closed { code: ABNORMAL_CLOSURE });
            return;
        },
    };
    if !end.report(LinkEvent::Opened) {
        let code = end.requested_close().unwrap_or(NORMAL_CLOSURE);
        tracing::debug!(%url, code, "link detached while dialling");
        close_socket(socket, code).await;
        return;
    }

    let (mut writer, mut reader) = socket.split();

    loop {
        tokio::select! {
            command = end.commands.recv() => match command {
                Some(LinkCommand::Send(frame)) => {
                    let written = match encode(&frame) {
                        Ok(message) => writer
                            .send(message)
                            .await
                            .map_err(|e| TransportError::Stream(e.to_string())),
                        Err(err) => {
                            tracing::warn!(%err, topic = %frame.topic, "dropping frame");
                            continue;
                        },
                    };
                    if let Err(err) = written {
                        tracing::debug!(%err, "write failed");
                        end.report(LinkEvent::SendFailed(frame));
                    }
                },
                Some(LinkCommand::Close(code)) => {
                    let close = CloseFrame { code: CloseCode::from(code), reason: "".into() };
                    if let Err(err) = writer.send(Message::Close(Some(close))).await {
                        tracing::debug!(%err, "close handshake failed");
                    }
                    return;
                },
                None => {
                    // Handler detached without a close; nobody is listening.
                    if let Err(err) = writer.close().await {
                        tracing::debug!(%err, "close after detach failed");
                    }
                    return;
                },
            },
            message = reader.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    end.report(LinkEvent::Frame(text.as_str().to_owned()));
                },
                Some(Ok(Message::Close(frame))) => {
                    let code = frame.map_or(NO_STATUS_RECEIVED, |f| u16::from(f.code));
                    end.report(LinkEvent::Closed { code });
                    return;
                },
                Some(Ok(other)) => tracing::trace!(?other, "ignoring non-text message"),
                Some(Err(err)) => {
                    tracing::warn!(%err, "websocket read failed");
                    end.report(LinkEvent::Closed { code: ABNORMAL_CLOSURE });
                    return;
                },
                None => {
                    end.report(LinkEvent::Closed { code: ABNORMAL_CLOSURE });
                    return;
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;

    #[tokio::test]
    async fn detached_link_is_never_dialled() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/chatservice?username=alice", listener.local_addr().unwrap());

        let (link, end) = TransportLink::pair();
        link.close(NORMAL_CLOSURE);

        let finished =
            tokio::time::timeout(Duration::from_secs(1), run_link(url, Duration::ZERO, end)).await;
        assert!(finished.is_ok());

        let accepted =
            tokio::time::timeout(Duration::from_millis(50), listener.accept()).await;
        assert!(accepted.is_err());
    }

    #[tokio::test]
    async fn unreachable_server_reports_abnormal_closure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (mut link, end) = TransportLink::pair();
        run_link(format!("ws://{addr}/chatservice"), Duration::ZERO, end).await;

        assert_eq!(link.next_event().await, Some(LinkEvent::Closed { code: ABNORMAL_CLOSURE }));
    }
}
