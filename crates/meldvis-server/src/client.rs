//! Runtime connection: a WebSocket client that reconnects forever.
//!
//! Each successful connection is bracketed by `opened`/`closed` on the
//! session, so a dropped link always resets the visualizer. Reconnect
//! attempts run at a fixed interval with no backoff.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::actor::{Outbound, SessionHandle};
use crate::error::Result;

type RuntimeSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ended {
    /// Runtime closed or the link dropped; try again.
    Disconnected,
    /// The session asked for a fresh connection.
    Reset,
    /// The session actor is gone; stop for good.
    Shutdown,
}

/// Keeps the session connected to the runtime.
pub struct RuntimeClient {
    url: String,
    reconnect_interval: Duration,
    session: SessionHandle,
    outbound: mpsc::UnboundedReceiver<Outbound>,
}

impl RuntimeClient {
    pub fn new(
        url: impl Into<String>,
        reconnect_interval: Duration,
        session: SessionHandle,
        outbound: mpsc::UnboundedReceiver<Outbound>,
    ) -> Self {
        Self {
            url: url.into(),
            reconnect_interval,
            session,
            outbound,
        }
    }

    /// Connect, pump messages, and reconnect until the session shuts down.
    pub async fn run(mut self) {
        loop {
            match connect_async(self.url.as_str()).await {
                Ok((socket, _response)) => {
                    tracing::info!(url = %self.url, "connected to runtime");
                    let ended = self.connected(socket).await;
                    if ended == Ended::Shutdown {
                        break;
                    }
                }
                Err(err) => {
                    tracing::warn!(url = %self.url, error = %err, "runtime connection failed");
                }
            }
            tokio::time::sleep(self.reconnect_interval).await;
        }
        tracing::info!("runtime client stopped");
    }

    async fn connected(&mut self, socket: RuntimeSocket) -> Ended {
        // Anything queued while disconnected belongs to the previous run.
        while let Ok(stale) = self.outbound.try_recv() {
            tracing::debug!(?stale, "dropping stale outbound");
        }

        if self.session.opened().is_err() {
            return Ended::Shutdown;
        }
        let ended = match self.pump(socket).await {
            Ok(ended) => ended,
            Err(err) => {
                tracing::warn!(error = %err, "runtime connection lost");
                Ended::Disconnected
            }
        };
        if self.session.closed().is_err() {
            return Ended::Shutdown;
        }
        ended
    }

    async fn pump(&mut self, socket: RuntimeSocket) -> Result<Ended> {
        let (mut write, mut read) = socket.split();

        loop {
            tokio::select! {
                message = read.next() => match message {
                    Some(Ok(Message::Text(text))) => {
                        if self.session.inbound(text.as_str().to_owned()).is_err() {
                            return Ok(Ended::Shutdown);
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::info!(?frame, "runtime closed the connection");
                        return Ok(Ended::Disconnected);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => return Err(err.into()),
                    None => return Ok(Ended::Disconnected),
                },
                outbound = self.outbound.recv() => match outbound {
                    Some(Outbound::Action(action)) => {
                        let json = action.to_json()?;
                        write.send(Message::Text(json.into())).await?;
                    }
                    Some(Outbound::Reset) => {
                        let _ = write.send(Message::Close(None)).await;
                        return Ok(Ended::Reset);
                    }
                    None => return Ok(Ended::Shutdown),
                },
            }
        }
    }
}
