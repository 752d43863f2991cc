// SPDX-FileCopyrightText: 2025 blinry <mail@blinry.org>
// SPDX-FileCopyrightText: 2025 zormit <nt4u@kpvn.de>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The session actor ties the channel, the debouncer and the reconciler to one host editor.
//!
//! Everything that can change synchronization state (user commands, local editor events, socket
//! events and debounce timers) is funneled into a single task, which handles one of them at a
//! time. That task exclusively owns the connection handle and the [`PositionState`], so neither
//! needs locking.
use crate::channel::{ChannelManager, ConnectionEvent, ConnectionState, Inbound};
use crate::debounce::{Debouncer, DEFAULT_WINDOW};
use crate::editor::{Editor, EditorEvent, Notifier};
use crate::reconciler::Reconciler;
use crate::registry;
use crate::selector::{select_session, SessionPicker};
use crate::state::{LastPosition, PositionState};
use crate::types::{CursorPos, Message, Origin, SelectionPos, TextContent};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Put into the `sender` field of our frames.
    pub origin: Origin,
    pub debounce: Duration,
    /// Session registry to read instead of the platform default.
    pub registry: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            origin: Origin::Vscode,
            debounce: DEFAULT_WINDOW,
            registry: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub connection: Option<ConnectionState>,
    pub last_position: Option<LastPosition>,
    pub pending: bool,
}

pub type EditorAction<E> = Box<dyn FnOnce(&mut E) + Send>;

// These messages are sent to the task that owns the session.
pub enum SessionMessage<E> {
    /// Pick a peer from the session registry and connect to it.
    Connect,
    ConnectTo(u16),
    Disconnect,
    FromEditor(EditorEvent),
    WithEditor(EditorAction<E>),
    Status {
        response_tx: oneshot::Sender<SessionStatus>,
    },
    Close {
        response_tx: oneshot::Sender<()>,
    },
}

impl<E> fmt::Debug for SessionMessage<E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Connect => "connect".to_string(),
            Self::ConnectTo(port) => format!("connect to port {port}"),
            Self::Disconnect => "disconnect".to_string(),
            Self::FromEditor(event) => format!("editor event in {}", event.path()),
            Self::WithEditor(_) => "editor action".to_string(),
            Self::Status { .. } => "status".to_string(),
            Self::Close { .. } => "close".to_string(),
        };
        write!(f, "{repr}")
    }
}

/// Debounced frames. Buffer content is never debounced.
#[derive(Debug)]
enum Outgoing {
    Cursor(CursorPos),
    Selection(SelectionPos),
}

struct SessionActor<E> {
    config: SessionConfig,
    message_rx: mpsc::Receiver<SessionMessage<E>>,
    connection_rx: mpsc::UnboundedReceiver<ConnectionEvent>,
    elapsed_rx: mpsc::UnboundedReceiver<u64>,
    editor: E,
    notifier: Box<dyn Notifier>,
    picker: Box<dyn SessionPicker>,
    channel: ChannelManager,
    debouncer: Debouncer<Outgoing>,
    last_position: PositionState,
    reconciler: Reconciler,
}

impl<E: Editor + 'static> SessionActor<E> {
    fn new(
        config: SessionConfig,
        message_rx: mpsc::Receiver<SessionMessage<E>>,
        editor: E,
        notifier: Box<dyn Notifier>,
        picker: Box<dyn SessionPicker>,
    ) -> Self {
        let (connection_tx, connection_rx) = mpsc::unbounded_channel();
        let (elapsed_tx, elapsed_rx) = mpsc::unbounded_channel();
        Self {
            reconciler: Reconciler::new(config.origin),
            debouncer: Debouncer::new(config.debounce, elapsed_tx),
            channel: ChannelManager::new(connection_tx),
            last_position: PositionState::default(),
            config,
            message_rx,
            connection_rx,
            elapsed_rx,
            editor,
            notifier,
            picker,
        }
    }

    async fn run(&mut self) {
        loop {
            tokio::select! {
                message = self.message_rx.recv() => {
                    let Some(message) = message else {
                        // All handles are gone.
                        self.channel.close();
                        break;
                    };
                    if !self.handle_message(message).await {
                        break;
                    }
                }
                Some(event) = self.connection_rx.recv() => {
                    self.handle_connection_event(event).await;
                }
                Some(generation) = self.elapsed_rx.recv() => {
                    self.flush_debounced(generation);
                }
            }
        }
    }

    /// Returns whether the actor should keep running.
    async fn handle_message(&mut self, message: SessionMessage<E>) -> bool {
        debug!("Handling session message: {message:?}");
        match message {
            SessionMessage::Connect => self.connect().await,
            SessionMessage::ConnectTo(port) => {
                self.channel.connect(port);
            }
            SessionMessage::Disconnect => self.disconnect(),
            SessionMessage::FromEditor(event) => self.handle_editor_event(event),
            SessionMessage::WithEditor(action) => action(&mut self.editor),
            SessionMessage::Status { response_tx } => {
                let status = SessionStatus {
                    connection: self.channel.state(),
                    last_position: self.last_position.last().cloned(),
                    pending: self.debouncer.is_pending(),
                };
                // The requester might not wait for the answer.
                let _ = response_tx.send(status);
            }
            SessionMessage::Close { response_tx } => {
                self.channel.close();
                let _ = response_tx.send(());
                return false;
            }
        }
        true
    }

    async fn connect(&mut self) {
        let sessions = match &self.config.registry {
            Some(path) => registry::list_sessions_from(path),
            None => registry::list_sessions(),
        };
        let current_file = self.editor.active_path();
        let port = select_session(
            sessions,
            current_file.as_deref(),
            self.picker.as_mut(),
            self.notifier.as_ref(),
        )
        .await;

        if let Some(port) = port {
            self.channel.connect(port);
        }
    }

    fn disconnect(&mut self) {
        if self.channel.disconnect() {
            info!("Disconnected from peer");
            self.notifier.info("Disconnected from WebSocket server");
        } else {
            debug!("Not connected, nothing to disconnect");
        }
    }

    async fn handle_connection_event(&mut self, event: ConnectionEvent) {
        match self.channel.on_event(event) {
            Some(Inbound::Opened) => {
                info!("Connected to peer");
                self.notifier.info("Connected to WebSocket server");
            }
            Some(Inbound::Message(message)) => {
                self.reconciler
                    .apply(message, &mut self.editor, &mut self.last_position)
                    .await;
            }
            Some(Inbound::Errored(description)) => {
                error!("Connection error: {description}");
            }
            Some(Inbound::Closed) => {
                info!("Disconnected from peer");
            }
            None => {}
        }
    }

    fn handle_editor_event(&mut self, event: EditorEvent) {
        if !self.channel.is_connected() {
            return;
        }
        // Only the editor the user is working in speaks for this side.
        if !self.editor.has_focus() || self.editor.active_path().as_deref() != Some(event.path()) {
            debug!("Not broadcasting event from background editor ({})", event.path());
            return;
        }

        let origin = self.config.origin;
        match event {
            EditorEvent::CursorMoved {
                path,
                caret,
                center_line,
            } => {
                self.debouncer.schedule(Outgoing::Cursor(CursorPos::from_local(
                    origin,
                    path,
                    caret,
                    center_line,
                )));
            }
            EditorEvent::SelectionChanged { path, range } => {
                self.debouncer
                    .schedule(Outgoing::Selection(SelectionPos::from_local(path, range)));
            }
            EditorEvent::DocumentChanged { path, text, caret } => {
                let message = TextContent::from_local(origin, path, text, caret);
                self.send(&Message::TextContent(message));
            }
        }
    }

    fn flush_debounced(&mut self, generation: u64) {
        let Some(candidate) = self.debouncer.take_elapsed(generation) else {
            return;
        };
        match candidate {
            Outgoing::Cursor(message) => {
                if !self
                    .last_position
                    .replace_if_changed(LastPosition::from(&message))
                {
                    debug!("Cursor did not move since the last frame, not sending");
                    return;
                }
                self.send(&Message::CursorPos(message));
            }
            Outgoing::Selection(message) => self.send(&Message::SelectionPos(message)),
        }
    }

    fn send(&mut self, message: &Message) {
        if let Err(err) = self.channel.send(message) {
            error!("Failed to send message: {err}");
            self.notifier.error(&err.to_string());
        }
    }
}

/// Cloneable handle to a running session. Every method just posts a message to the session task.
pub struct SessionHandle<E> {
    message_tx: mpsc::Sender<SessionMessage<E>>,
}

impl<E> Clone for SessionHandle<E> {
    fn clone(&self) -> Self {
        Self {
            message_tx: self.message_tx.clone(),
        }
    }
}

impl<E: Editor + 'static> SessionHandle<E> {
    #[must_use]
    pub fn spawn(
        config: SessionConfig,
        editor: E,
        notifier: impl Notifier + 'static,
        picker: impl SessionPicker + 'static,
    ) -> Self {
        let (message_tx, message_rx) = mpsc::channel(16);
        let mut actor = SessionActor::new(
            config,
            message_rx,
            editor,
            Box::new(notifier),
            Box::new(picker),
        );
        tokio::spawn(async move { actor.run().await });
        Self { message_tx }
    }

    pub async fn send_message(&self, message: SessionMessage<E>) {
        if self.message_tx.send(message).await.is_err() {
            debug!("Session task is gone, dropping message");
        }
    }

    pub async fn connect(&self) {
        self.send_message(SessionMessage::Connect).await;
    }

    pub async fn connect_to(&self, port: u16) {
        self.send_message(SessionMessage::ConnectTo(port)).await;
    }

    pub async fn disconnect(&self) {
        self.send_message(SessionMessage::Disconnect).await;
    }

    pub async fn editor_event(&self, event: EditorEvent) {
        self.send_message(SessionMessage::FromEditor(event)).await;
    }

    /// Runs `action` on the session's editor, in order with all other session messages.
    pub async fn with_editor<R, F>(&self, action: F) -> Option<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut E) -> R + Send + 'static,
    {
        let (response_tx, response_rx) = oneshot::channel();
        let action: EditorAction<E> = Box::new(move |editor| {
            let _ = response_tx.send(action(editor));
        });
        self.send_message(SessionMessage::WithEditor(action)).await;
        response_rx.await.ok()
    }

    pub async fn status(&self) -> Option<SessionStatus> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send_message(SessionMessage::Status { response_tx })
            .await;
        response_rx.await.ok()
    }

    /// Closes the connection and stops the session task.
    pub async fn close(&self) {
        let (response_tx, response_rx) = oneshot::channel();
        self.send_message(SessionMessage::Close { response_tx }).await;
        let _ = response_rx.await;
    }
}
