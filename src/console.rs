// SPDX-FileCopyrightText: 2025 blinry <mail@blinry.org>
// SPDX-FileCopyrightText: 2025 zormit <nt4u@kpvn.de>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Drives a [`MemoryEditor`] from line commands on stdin, as if a user was typing into a terminal
//! editor.
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use shareedit::editor::{Editor, EditorEvent, MemoryEditor, Notifier};
use shareedit::selector::{SessionChoice, SessionPicker};
use shareedit::session::SessionHandle;
use shareedit::types::{Position, Range};
use std::io::{ErrorKind, Write};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, LinesCodec};
use tracing::{error, info, warn};

pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn info(&self, message: &str) {
        info!("{message}");
    }

    fn error(&self, message: &str) {
        error!("{message}");
    }
}

/// Asks on stdout which session to join. The answer is the next line the console reads.
pub struct PromptPicker {
    answer_rx: mpsc::UnboundedReceiver<String>,
    waiting: Arc<AtomicBool>,
}

/// The console's side of a [`PromptPicker`].
pub struct PromptAnswers {
    answer_tx: mpsc::UnboundedSender<String>,
    waiting: Arc<AtomicBool>,
}

impl PromptAnswers {
    /// Hands `line` to the picker if it is waiting for an answer.
    fn offer(&self, line: &str) -> bool {
        if self.waiting.swap(false, Ordering::SeqCst) {
            let _ = self.answer_tx.send(line.to_string());
            true
        } else {
            false
        }
    }
}

#[must_use]
pub fn prompt() -> (PromptPicker, PromptAnswers) {
    let (answer_tx, answer_rx) = mpsc::unbounded_channel();
    let waiting = Arc::new(AtomicBool::new(false));
    (
        PromptPicker {
            answer_rx,
            waiting: waiting.clone(),
        },
        PromptAnswers { answer_tx, waiting },
    )
}

#[async_trait]
impl SessionPicker for PromptPicker {
    async fn pick(&mut self, choices: &[SessionChoice]) -> Option<usize> {
        println!("Select a ShareEdit session:");
        for (index, choice) in choices.iter().enumerate() {
            println!("  [{}] {}  {}", index + 1, choice.label, choice.description);
        }
        print!("Number (empty to cancel): ");
        let _ = std::io::stdout().flush();

        self.waiting.store(true, Ordering::SeqCst);
        let answer = self.answer_rx.recv().await?;
        parse_choice(&answer, choices.len())
    }
}

fn parse_choice(answer: &str, count: usize) -> Option<usize> {
    let number: usize = answer.trim().parse().ok()?;
    (1..=count).contains(&number).then(|| number - 1)
}

/// Line numbers and columns are 1-indexed, like in most editors' status bars.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Goto(Position),
    Select(Range),
    Type(String),
    Focus,
    Blur,
    Open(String),
    Show,
    Disconnect,
    Reconnect,
    Quit,
}

fn parse_position(line: Option<&str>, column: Option<&str>) -> Result<Position> {
    let (Some(line), Some(column)) = (line, column) else {
        bail!("Expected a line and a column");
    };
    let line: u32 = line.parse().context("Line is not a number")?;
    let column: u32 = column.parse().context("Column is not a number")?;
    Ok(Position::from_wire(line, column))
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(input: &str) -> Result<Self> {
        let input = input.trim();
        let (name, rest) = input.split_once(' ').unwrap_or((input, ""));
        let mut args = rest.split_whitespace();

        let command = match name {
            "goto" => Self::Goto(parse_position(args.next(), args.next())?),
            "select" => {
                let start = parse_position(args.next(), args.next())?;
                let end = parse_position(args.next(), args.next())?;
                Self::Select(Range::new(start, end))
            }
            // `\n` in the argument stands for a line break.
            "type" => Self::Type(rest.replace("\\n", "\n")),
            "focus" => Self::Focus,
            "blur" => Self::Blur,
            "open" if !rest.trim().is_empty() => Self::Open(rest.trim().to_string()),
            "open" => bail!("Expected a path"),
            "show" => Self::Show,
            "disconnect" => Self::Disconnect,
            "reconnect" => Self::Reconnect,
            "quit" | "exit" => Self::Quit,
            other => bail!("Unknown command '{other}'"),
        };
        Ok(command)
    }
}

pub struct Console {
    session: SessionHandle<MemoryEditor>,
    answers: PromptAnswers,
    /// Fixed port from the command line. Without it, reconnecting asks the registry again.
    port: Option<u16>,
}

impl Console {
    #[must_use]
    pub const fn new(
        session: SessionHandle<MemoryEditor>,
        answers: PromptAnswers,
        port: Option<u16>,
    ) -> Self {
        Self {
            session,
            answers,
            port,
        }
    }

    pub async fn connect(&self) {
        match self.port {
            Some(port) => self.session.connect_to(port).await,
            None => self.session.connect().await,
        }
    }

    /// Cancels a session prompt still waiting for an answer, then closes the session.
    pub async fn shutdown(self) {
        let Self {
            session, answers, ..
        } = self;
        drop(answers);
        session.close().await;
    }

    /// Reads commands until stdin ends or `quit` is entered.
    pub async fn run(&self) -> Result<()> {
        let mut lines = FramedRead::new(tokio::io::stdin(), LinesCodec::new());
        while let Some(line) = lines.next().await {
            let line = line.context("Failed to read from stdin")?;
            if self.answers.offer(&line) || line.trim().is_empty() {
                continue;
            }
            match line.parse::<Command>() {
                Ok(Command::Quit) => break,
                Ok(command) => self.execute(command).await?,
                Err(err) => warn!("{err}"),
            }
        }
        Ok(())
    }

    async fn execute(&self, command: Command) -> Result<()> {
        match command {
            Command::Goto(position) => {
                self.edit_selection(move |editor| editor.set_selection(Range::caret(position)))
                    .await;
            }
            Command::Select(range) => {
                self.edit_selection(move |editor| editor.set_selection(range))
                    .await;
            }
            Command::Type(text) => {
                let events = self
                    .session
                    .with_editor(move |editor| {
                        editor.type_text(&text);
                        [
                            EditorEvent::from_content(editor),
                            EditorEvent::from_selection(editor),
                        ]
                    })
                    .await;
                for event in events.into_iter().flatten().flatten() {
                    self.session.editor_event(event).await;
                }
            }
            Command::Focus => {
                self.session
                    .with_editor(|editor| editor.set_focus(true))
                    .await;
            }
            Command::Blur => {
                self.session
                    .with_editor(|editor| editor.set_focus(false))
                    .await;
            }
            Command::Open(path) => self.open(path).await?,
            Command::Show => self.show().await,
            Command::Disconnect => self.session.disconnect().await,
            Command::Reconnect => self.connect().await,
            Command::Quit => {}
        }
        Ok(())
    }

    /// Changes the selection and reports it like the host editor would.
    async fn edit_selection<F>(&self, edit: F)
    where
        F: FnOnce(&mut MemoryEditor) + Send + 'static,
    {
        let event = self
            .session
            .with_editor(move |editor| {
                edit(editor);
                EditorEvent::from_selection(editor)
            })
            .await
            .flatten();
        if let Some(event) = event {
            self.session.editor_event(event).await;
        }
    }

    async fn open(&self, path: String) -> Result<()> {
        let target = path.clone();
        let switched = self
            .session
            .with_editor(move |editor| editor.activate(&target))
            .await
            .unwrap_or_default();
        if !switched {
            let text = match tokio::fs::read_to_string(&path).await {
                Ok(text) => text,
                Err(err) if err.kind() == ErrorKind::NotFound => String::new(),
                Err(err) => return Err(err).with_context(|| format!("Failed to open '{path}'")),
            };
            self.session
                .with_editor(move |editor| editor.open_buffer(&path, &text))
                .await;
        }
        self.edit_selection(|_| {}).await;
        Ok(())
    }

    async fn show(&self) {
        let summary = self
            .session
            .with_editor(|editor| {
                let (line, column) = editor.caret().to_wire();
                format!(
                    "{} at {line}:{column}{}\n{}",
                    editor.active_path().unwrap_or_else(|| "(no buffer)".into()),
                    if editor.has_focus() { "" } else { " (unfocused)" },
                    editor.text()
                )
            })
            .await;
        let status = self.session.status().await;
        if let Some(summary) = summary {
            println!("{summary}");
        }
        if let Some(status) = status {
            match status.connection {
                Some(state) => println!("Connection: {state}"),
                None => println!("Connection: none"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use shareedit::session::SessionConfig;
    use std::time::Duration;

    #[test]
    fn parses_positions_one_indexed() {
        assert_eq!(
            "goto 3 5".parse::<Command>().unwrap(),
            Command::Goto(Position::new(2, 4))
        );
        assert_eq!(
            "select 1 1 2 3".parse::<Command>().unwrap(),
            Command::Select(Range::new(Position::new(0, 0), Position::new(1, 2)))
        );
    }

    #[test]
    fn type_keeps_spaces_and_line_breaks() {
        assert_eq!(
            "type  hello  world\\nbye".parse::<Command>().unwrap(),
            Command::Type(" hello  world\nbye".to_string())
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert!("goto 1".parse::<Command>().is_err());
        assert!("goto a b".parse::<Command>().is_err());
        assert!("open".parse::<Command>().is_err());
        assert!("fly".parse::<Command>().is_err());
    }

    #[test]
    fn simple_commands() {
        assert_eq!("quit".parse::<Command>().unwrap(), Command::Quit);
        assert_eq!(
            "open /tmp/a.txt".parse::<Command>().unwrap(),
            Command::Open("/tmp/a.txt".to_string())
        );
        assert_eq!(" blur ".parse::<Command>().unwrap(), Command::Blur);
    }

    #[test]
    fn choices_are_one_indexed() {
        assert_eq!(parse_choice("1", 2), Some(0));
        assert_eq!(parse_choice(" 2 ", 2), Some(1));
        assert_eq!(parse_choice("3", 2), None);
        assert_eq!(parse_choice("0", 2), None);
        assert_eq!(parse_choice("", 2), None);
    }

    #[tokio::test]
    async fn shutdown_cancels_open_prompt() {
        let dir = temp_dir::TempDir::new().expect("Failed to create temp directory");
        let registry = dir.child(shareedit::registry::REGISTRY_FILE);
        std::fs::write(
            &registry,
            r#"[{"port":4000,"directory":"/project","timestamp":1}]"#,
        )
        .expect("Failed to write registry");
        let config = SessionConfig {
            registry: Some(registry),
            ..SessionConfig::default()
        };
        let (picker, answers) = prompt();
        let waiting = answers.waiting.clone();
        let session = SessionHandle::spawn(config, MemoryEditor::new(), LogNotifier, picker);
        let console = Console::new(session, answers, None);

        console.connect().await;
        while !waiting.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }

        let closed = tokio::time::timeout(Duration::from_secs(3), console.shutdown()).await;
        assert!(closed.is_ok());
    }

    #[tokio::test]
    async fn answers_only_go_to_waiting_picker() {
        let (mut picker, answers) = prompt();
        assert!(!answers.offer("1"));

        let choices = vec![SessionChoice {
            port: 4000,
            label: "Port 4000".into(),
            description: "/project".into(),
        }];
        let pick = tokio::spawn(async move { picker.pick(&choices).await });
        while !answers.offer("1") {
            tokio::task::yield_now().await;
        }
        assert_eq!(pick.await.unwrap(), Some(0));
    }
}
