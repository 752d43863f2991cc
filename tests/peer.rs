// SPDX-FileCopyrightText: 2025 blinry <mail@blinry.org>
// SPDX-FileCopyrightText: 2025 zormit <nt4u@kpvn.de>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Runs a session against a fake peer editor listening on a local websocket.
use futures::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use serde_json::{json, Value as JSONValue};
use shareedit::channel::ConnectionState;
use shareedit::editor::{Editor, EditorEvent, MemoryEditor, Notifier};
use shareedit::selector::{SessionChoice, SessionPicker};
use shareedit::session::{SessionConfig, SessionHandle, SessionStatus};
use shareedit::types::{Origin, Position};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout, Duration};
use tokio_tungstenite::{accept_async, tungstenite::Message as Frame};

const PATH: &str = "/project/main.rs";
const WINDOW: Duration = Duration::from_millis(200);

struct MockPeer {
    port: u16,
    writer_tx: mpsc::Sender<String>,
    reader_rx: mpsc::Receiver<String>,
}

impl MockPeer {
    async fn bind() -> Self {
        let listener = TcpListener::bind("localhost:0")
            .await
            .expect("Could not bind to a local port");
        let port = listener
            .local_addr()
            .expect("Listener should have an address")
            .port();
        let (writer_tx, mut writer_rx) = mpsc::channel::<String>(16);
        let (reader_tx, reader_rx) = mpsc::channel::<String>(16);

        tokio::spawn(async move {
            let (stream, _) = listener
                .accept()
                .await
                .expect("Could not accept connection");
            let socket = accept_async(stream)
                .await
                .expect("Websocket handshake failed");
            let (mut writer, mut reader) = socket.split();

            loop {
                tokio::select! {
                    outgoing = writer_rx.recv() => match outgoing {
                        Some(text) => writer
                            .send(Frame::Text(text))
                            .await
                            .expect("Could not write to socket"),
                        None => {
                            let _ = writer.close().await;
                            break;
                        }
                    },
                    incoming = reader.next() => match incoming {
                        Some(Ok(Frame::Text(text))) => {
                            if reader_tx.send(text).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(Frame::Close(_)) | Err(_)) | None => break,
                        Some(Ok(_)) => {}
                    },
                }
            }
        });

        Self {
            port,
            writer_tx,
            reader_rx,
        }
    }

    async fn send(&self, message: JSONValue) {
        self.writer_tx
            .send(message.to_string())
            .await
            .expect("Could not send message");
    }

    async fn recv(&mut self) -> JSONValue {
        let frame = timeout(Duration::from_secs(5), self.reader_rx.recv())
            .await
            .expect("Timed out waiting for a frame")
            .expect("Peer connection is closed");
        serde_json::from_str(&frame).expect("Frame is not JSON")
    }

    async fn assert_silent(&mut self, duration: Duration) {
        if let Ok(Some(frame)) = timeout(duration, self.reader_rx.recv()).await {
            panic!("Expected no frame, got {frame}");
        }
    }
}

#[derive(Clone, Default)]
struct RecordingNotifier {
    infos: Arc<Mutex<Vec<String>>>,
    errors: Arc<Mutex<Vec<String>>>,
}

impl Notifier for RecordingNotifier {
    fn info(&self, message: &str) {
        self.infos.lock().unwrap().push(message.to_string());
    }
    fn error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}

struct NoPicker;

#[async_trait::async_trait]
impl SessionPicker for NoPicker {
    async fn pick(&mut self, _choices: &[SessionChoice]) -> Option<usize> {
        None
    }
}

struct Setup {
    peer: MockPeer,
    session: SessionHandle<MemoryEditor>,
    notifier: RecordingNotifier,
}

async fn wait_for(
    session: &SessionHandle<MemoryEditor>,
    condition: impl Fn(&SessionStatus) -> bool,
) -> SessionStatus {
    for _ in 0..250 {
        let status = session.status().await.expect("Session is gone");
        if condition(&status) {
            return status;
        }
        sleep(Duration::from_millis(20)).await;
    }
    panic!("Session never reached the expected state");
}

async fn connected(focused: bool) -> Setup {
    let peer = MockPeer::bind().await;
    let notifier = RecordingNotifier::default();
    let config = SessionConfig {
        origin: Origin::Vscode,
        debounce: WINDOW,
        registry: None,
    };
    let editor = MemoryEditor::new()
        .with_buffer(PATH, "fn main() {\n    println!();\n}\n")
        .focused(focused);
    let session = SessionHandle::spawn(config, editor, notifier.clone(), NoPicker);

    session.connect_to(peer.port).await;
    wait_for(&session, |status| {
        status.connection == Some(ConnectionState::Open)
    })
    .await;

    Setup {
        peer,
        session,
        notifier,
    }
}

fn cursor_moved(line: usize, character: usize) -> EditorEvent {
    EditorEvent::CursorMoved {
        path: PATH.to_string(),
        caret: Position::new(line, character),
        center_line: None,
    }
}

async fn caret(session: &SessionHandle<MemoryEditor>) -> Position {
    session
        .with_editor(|editor| editor.caret())
        .await
        .expect("Session is gone")
}

#[tokio::test]
async fn opening_is_announced() {
    let setup = connected(true).await;
    assert_eq!(
        *setup.notifier.infos.lock().unwrap(),
        vec!["Connected to WebSocket server"]
    );
}

#[tokio::test]
async fn cursor_burst_sends_last_position_once() {
    let mut setup = connected(true).await;

    for character in 1..=3 {
        setup.session.editor_event(cursor_moved(1, character)).await;
        sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(
        setup.peer.recv().await,
        json!({
            "type": "CursorPos",
            "sender": "vscode",
            "path": PATH,
            "line": 2,
            "col": 4,
            "centerLine": null,
        })
    );
    setup.peer.assert_silent(WINDOW * 2).await;
}

#[tokio::test]
async fn unchanged_cursor_is_not_resent() {
    let mut setup = connected(true).await;

    setup.session.editor_event(cursor_moved(0, 3)).await;
    setup.peer.recv().await;

    setup.session.editor_event(cursor_moved(0, 3)).await;
    setup.peer.assert_silent(WINDOW * 2).await;
}

#[tokio::test]
async fn selections_are_sent() {
    let mut setup = connected(true).await;

    setup
        .session
        .editor_event(EditorEvent::SelectionChanged {
            path: PATH.to_string(),
            range: shareedit::types::Range::new(Position::new(0, 0), Position::new(1, 4)),
        })
        .await;

    assert_eq!(
        setup.peer.recv().await,
        json!({
            "type": "SelectionPos",
            "path": PATH,
            "startLine": 1,
            "startCol": 1,
            "endLine": 2,
            "endCol": 5,
        })
    );
}

#[tokio::test]
async fn content_changes_are_sent_immediately() {
    let mut setup = connected(true).await;

    setup
        .session
        .editor_event(EditorEvent::DocumentChanged {
            path: PATH.to_string(),
            text: "fn main() {}\n".to_string(),
            caret: Position::new(0, 12),
        })
        .await;

    let frame = timeout(WINDOW / 2, setup.peer.recv())
        .await
        .expect("Content should not wait for the debounce window");
    assert_eq!(
        frame,
        json!({
            "type": "TextContent",
            "sender": "vscode",
            "path": PATH,
            "text": "fn main() {}\n",
            "cursorLine": 1,
            "cursorCol": 13,
        })
    );
}

#[tokio::test]
async fn background_editor_stays_quiet() {
    let mut setup = connected(false).await;

    setup.session.editor_event(cursor_moved(1, 1)).await;
    setup.peer.assert_silent(WINDOW * 2).await;
}

#[tokio::test]
async fn peer_cursor_moves_background_editor() {
    let setup = connected(false).await;

    setup
        .peer
        .send(json!({
            "type": "CursorPos",
            "sender": "vim",
            "path": PATH,
            "line": 2,
            "col": 5,
        }))
        .await;

    for _ in 0..250 {
        if caret(&setup.session).await == Position::new(1, 4) {
            return;
        }
        sleep(Duration::from_millis(20)).await;
    }
    panic!("Caret was never moved");
}

#[tokio::test]
async fn applied_peer_cursor_is_not_echoed_back() {
    let mut setup = connected(false).await;

    setup
        .peer
        .send(json!({
            "type": "CursorPos",
            "sender": "vim",
            "path": PATH,
            "line": 2,
            "col": 5,
        }))
        .await;
    wait_for(&setup.session, |status| status.last_position.is_some()).await;

    // The host reports the programmatic caret move, and the user clicks into the window.
    setup
        .session
        .with_editor(|editor| editor.set_focus(true))
        .await;
    setup.session.editor_event(cursor_moved(1, 4)).await;

    setup.peer.assert_silent(WINDOW * 2).await;
}

#[tokio::test]
async fn own_frames_are_ignored() {
    let setup = connected(false).await;

    setup
        .peer
        .send(json!({
            "type": "CursorPos",
            "sender": "vscode",
            "path": PATH,
            "line": 3,
            "col": 1,
        }))
        .await;
    // Something we do apply, to know the first frame was processed.
    setup
        .peer
        .send(json!({
            "type": "SelectionPos",
            "path": PATH,
            "startLine": 1,
            "startCol": 1,
            "endLine": 1,
            "endCol": 3,
        }))
        .await;

    for _ in 0..250 {
        let selection = setup
            .session
            .with_editor(|editor| editor.selection())
            .await
            .expect("Session is gone");
        if !selection.is_empty() {
            let status = setup.session.status().await.expect("Session is gone");
            assert_eq!(status.last_position, None);
            assert_eq!(selection.end, Position::new(0, 2));
            return;
        }
        sleep(Duration::from_millis(20)).await;
    }
    panic!("Selection was never applied");
}

#[tokio::test]
async fn send_after_peer_hung_up_fails_closed() {
    let Setup {
        peer,
        session,
        notifier,
    } = connected(true).await;

    drop(peer);
    wait_for(&session, |status| {
        status.connection == Some(ConnectionState::Closed)
    })
    .await;

    session
        .editor_event(EditorEvent::DocumentChanged {
            path: PATH.to_string(),
            text: "changed".to_string(),
            caret: Position::new(0, 0),
        })
        .await;
    let status = session.status().await.expect("Session is gone");

    assert_eq!(status.connection, None);
    assert_eq!(
        *notifier.errors.lock().unwrap(),
        vec!["Not connected, status: Closed"]
    );
}

#[tokio::test]
async fn disconnect_closes_socket() {
    let Setup {
        mut peer,
        session,
        notifier,
    } = connected(true).await;

    session.disconnect().await;
    let status = session.status().await.expect("Session is gone");

    assert_eq!(status.connection, None);
    assert_eq!(
        notifier.infos.lock().unwrap().last().cloned(),
        Some("Disconnected from WebSocket server".to_string())
    );
    // The peer sees the close handshake, so its reader ends.
    let closed = timeout(Duration::from_secs(5), peer.reader_rx.recv())
        .await
        .expect("Peer was not disconnected");
    assert_eq!(closed, None);
}
