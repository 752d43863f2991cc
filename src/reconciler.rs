// SPDX-FileCopyrightText: 2025 blinry <mail@blinry.org>
// SPDX-FileCopyrightText: 2025 zormit <nt4u@kpvn.de>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Applies frames from the peer to the local editor.
//!
//! Two editors that mirror each other's cursor will happily bounce the same position back and
//! forth forever. The rules here break that loop: whoever has focus is authoritative, and a
//! position equal to the last one sent or applied is never applied again.
use crate::editor::Editor;
use crate::state::{LastPosition, PositionState};
use crate::types::{CursorPos, Message, Origin, Range, SelectionPos, TextContent};
use derive_more::Display;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Skipped {
    /// The frame was sent by an editor of our own kind.
    #[display("echo of our own frame")]
    Echo,
    #[display("not the active buffer")]
    OtherBuffer,
    #[display("editor has focus")]
    Focused,
    #[display("position already applied")]
    AlreadyApplied,
    #[display("editor gained focus while opening the document")]
    FocusGained,
    #[display("document could not be opened")]
    OpenFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Skipped(Skipped),
}

pub struct Reconciler {
    origin: Origin,
}

impl Reconciler {
    #[must_use]
    pub const fn new(origin: Origin) -> Self {
        Self { origin }
    }

    pub async fn apply<E: Editor + ?Sized>(
        &self,
        message: Message,
        editor: &mut E,
        last_position: &mut PositionState,
    ) -> Outcome {
        if message.sender() == Some(self.origin) {
            return Outcome::Skipped(Skipped::Echo);
        }

        let outcome = match message {
            Message::TextContent(message) => Self::apply_text_content(&message, editor),
            Message::CursorPos(message) => {
                Self::apply_cursor_pos(&message, editor, last_position).await
            }
            Message::SelectionPos(message) => Self::apply_selection_pos(&message, editor),
        };
        if let Outcome::Skipped(reason) = outcome {
            debug!("Not applying frame: {reason}");
        }
        outcome
    }

    fn apply_text_content<E: Editor + ?Sized>(message: &TextContent, editor: &mut E) -> Outcome {
        if editor.active_path().as_deref() != Some(message.path.as_str()) {
            return Outcome::Skipped(Skipped::OtherBuffer);
        }

        editor.replace_content(&message.text);
        let caret = Range::caret(message.local_caret());
        editor.set_selection(caret);
        editor.reveal(caret);
        Outcome::Applied
    }

    async fn apply_cursor_pos<E: Editor + ?Sized>(
        message: &CursorPos,
        editor: &mut E,
        last_position: &mut PositionState,
    ) -> Outcome {
        if editor.has_focus() {
            return Outcome::Skipped(Skipped::Focused);
        }

        let is_active = editor.active_path().as_deref() == Some(message.path.as_str());
        let target = message.local_position();
        // The peer's buffer can be momentarily ahead of ours.
        let target = if is_active && !editor.contains(target) {
            editor.caret()
        } else {
            target
        };

        let (line, col) = target.to_wire();
        let resolved = LastPosition {
            path: message.path.clone(),
            line,
            col,
            center_line: message.center_line,
        };
        if last_position.matches(&resolved) {
            return Outcome::Skipped(Skipped::AlreadyApplied);
        }

        if !is_active {
            if let Err(err) = editor.open_document(&message.path).await {
                warn!("Failed to open {}: {err:#}", message.path);
                return Outcome::Skipped(Skipped::OpenFailed);
            }
            // Opening yields to the host, the user might have clicked into the editor meanwhile.
            if editor.has_focus() {
                return Outcome::Skipped(Skipped::FocusGained);
            }
        }

        // Only positions that were actually applied are recorded.
        last_position.update(resolved);
        if let Some(center_line) = message.center_line {
            editor.center_on_line(center_line);
        }
        let caret = Range::caret(target);
        editor.set_selection(caret);
        editor.reveal(caret);
        Outcome::Applied
    }

    // No focus check here, unlike for cursors.
    fn apply_selection_pos<E: Editor + ?Sized>(message: &SelectionPos, editor: &mut E) -> Outcome {
        if editor.active_path().as_deref() != Some(message.path.as_str()) {
            return Outcome::Skipped(Skipped::OtherBuffer);
        }

        let range = message.local_range();
        editor.set_selection(range);
        editor.reveal(range);
        Outcome::Applied
    }
}
