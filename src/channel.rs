// SPDX-FileCopyrightText: 2025 blinry <mail@blinry.org>
// SPDX-FileCopyrightText: 2025 zormit <nt4u@kpvn.de>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! This module provides the [`ChannelManager`], which owns the single websocket connection to the
//! peer editor.
//!
//! The socket itself lives in a spawned task. The task reports what happens to it as
//! [`ConnectionEvent`]s, and the owner of the manager feeds those back through
//! [`ChannelManager::on_event`] in arrival order. Connection state is therefore only ever changed
//! by the owner, never concurrently.
use crate::types::Message;
use derive_more::Display;
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_tungstenite::{connect_async, tungstenite::Message as Frame};
use tracing::{debug, info, warn};

const HOST: &str = "localhost";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[display("#{_0}")]
pub struct ConnectionId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
    Errored,
}

/// What the socket task reports about its connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Opened(ConnectionId),
    Frame(ConnectionId, String),
    Errored(ConnectionId, String),
    Closed(ConnectionId),
}

impl ConnectionEvent {
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        match self {
            Self::Opened(id) | Self::Frame(id, _) | Self::Errored(id, _) | Self::Closed(id) => *id,
        }
    }
}

/// The part of a [`ConnectionEvent`] the owner has to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Opened,
    Message(Message),
    Errored(String),
    Closed,
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Not connected")]
    NotConnected,
    #[error("Not connected, status: {0}")]
    NotOpen(ConnectionState),
    #[error("Connection task has stopped")]
    TaskStopped,
    #[error("Failed to serialize message")]
    Serialize(#[from] serde_json::Error),
}

struct Connection {
    id: ConnectionId,
    state: ConnectionState,
    outbound_tx: mpsc::UnboundedSender<Frame>,
    task: JoinHandle<()>,
}

pub struct ChannelManager {
    connection: Option<Connection>,
    next_id: usize,
    event_tx: mpsc::UnboundedSender<ConnectionEvent>,
}

impl ChannelManager {
    #[must_use]
    pub fn new(event_tx: mpsc::UnboundedSender<ConnectionEvent>) -> Self {
        Self {
            connection: None,
            next_id: 0,
            event_tx,
        }
    }

    /// Starts connecting to the peer listening on `port`, replacing any current connection. The
    /// connection is usable once its `Opened` event came back through [`Self::on_event`].
    pub fn connect(&mut self, port: u16) -> ConnectionId {
        if self.connection.is_some() {
            self.disconnect();
        }

        let id = ConnectionId(self.next_id);
        self.next_id += 1;

        let url = format!("ws://{HOST}:{port}");
        info!("Connecting to {url} ({id})");

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let event_tx = self.event_tx.clone();
        let task = tokio::spawn(async move {
            run_connection(id, url, outbound_rx, event_tx).await;
        });

        self.connection = Some(Connection {
            id,
            state: ConnectionState::Connecting,
            outbound_tx,
            task,
        });
        id
    }

    /// Closes and forgets the current connection. Returns whether there was one.
    pub fn disconnect(&mut self) -> bool {
        match self.connection.take() {
            Some(connection) => {
                debug!("Dropping connection {}", connection.id);
                // Dropping the sender makes the task send a close frame and finish.
                drop(connection.outbound_tx);
                true
            }
            None => false,
        }
    }

    /// Tears the connection down without waiting for the close handshake.
    pub fn close(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.task.abort();
        }
    }

    #[must_use]
    pub fn state(&self) -> Option<ConnectionState> {
        self.connection.as_ref().map(|connection| connection.state)
    }

    #[must_use]
    pub fn current_id(&self) -> Option<ConnectionId> {
        self.connection.as_ref().map(|connection| connection.id)
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Serializes and transmits `message`. If the connection is missing or not open, the handle
    /// is discarded, and the caller has to connect again before sending succeeds.
    pub fn send(&mut self, message: &Message) -> Result<(), ChannelError> {
        let Some(connection) = &self.connection else {
            return Err(ChannelError::NotConnected);
        };
        if connection.state != ConnectionState::Open {
            let state = connection.state;
            self.close();
            return Err(ChannelError::NotOpen(state));
        }

        let frame = message.to_frame()?;
        debug!("Sending {frame}");
        if connection.outbound_tx.send(Frame::Text(frame)).is_err() {
            self.close();
            return Err(ChannelError::TaskStopped);
        }
        Ok(())
    }

    /// Updates the connection state from a task report. Reports of replaced connections yield
    /// nothing, as do frames that don't parse.
    pub fn on_event(&mut self, event: ConnectionEvent) -> Option<Inbound> {
        let Some(connection) = self
            .connection
            .as_mut()
            .filter(|connection| connection.id == event.id())
        else {
            debug!("Ignoring event of stale connection {}", event.id());
            return None;
        };

        match event {
            ConnectionEvent::Opened(_) => {
                connection.state = ConnectionState::Open;
                Some(Inbound::Opened)
            }
            ConnectionEvent::Frame(_, frame) => {
                debug!("Received {frame}");
                match Message::from_frame(&frame) {
                    Ok(message) => Some(Inbound::Message(message)),
                    Err(err) => {
                        warn!("Dropping malformed frame ({err}): {frame}");
                        None
                    }
                }
            }
            ConnectionEvent::Errored(_, description) => {
                connection.state = ConnectionState::Errored;
                Some(Inbound::Errored(description))
            }
            ConnectionEvent::Closed(_) => {
                if connection.state != ConnectionState::Errored {
                    connection.state = ConnectionState::Closed;
                }
                Some(Inbound::Closed)
            }
        }
    }
}

impl Drop for ChannelManager {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_connection(
    id: ConnectionId,
    url: String,
    mut outbound_rx: mpsc::UnboundedReceiver<Frame>,
    event_tx: mpsc::UnboundedSender<ConnectionEvent>,
) {
    // The owner may have gone away, in which case nobody cares about these events anymore.
    let report = |event: ConnectionEvent| {
        let _ = event_tx.send(event);
    };

    let stream = match connect_async(url.as_str()).await {
        Ok((stream, _response)) => stream,
        Err(err) => {
            report(ConnectionEvent::Errored(id, err.to_string()));
            report(ConnectionEvent::Closed(id));
            return;
        }
    };
    report(ConnectionEvent::Opened(id));

    let (mut writer, mut reader) = stream.split();
    loop {
        tokio::select! {
            outgoing = outbound_rx.recv() => {
                let Some(frame) = outgoing else {
                    // The handle was dropped.
                    let _ = writer.close().await;
                    break;
                };
                if let Err(err) = writer.send(frame).await {
                    report(ConnectionEvent::Errored(id, err.to_string()));
                    break;
                }
            }
            incoming = reader.next() => match incoming {
                Some(Ok(Frame::Text(text))) => report(ConnectionEvent::Frame(id, text)),
                Some(Ok(Frame::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    report(ConnectionEvent::Errored(id, err.to_string()));
                    break;
                }
            },
        }
    }
    report(ConnectionEvent::Closed(id));
}
