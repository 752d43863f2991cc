// SPDX-FileCopyrightText: 2025 blinry <mail@blinry.org>
// SPDX-FileCopyrightText: 2025 zormit <nt4u@kpvn.de>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! This module is all about the host editor we are embedded in.
//!
//! The host owns the buffers, the caret and the UI. We only talk to it through the [`Editor`]
//! and [`Notifier`] traits, and it tells us about local changes with [`EditorEvent`]s.
use crate::types::{Position, Range};
use anyhow::Result;
use async_trait::async_trait;

pub mod memory;

pub use memory::MemoryEditor;

/// Buffer and caret primitives of the host editor. All positions are 0-indexed and refer to the
/// active buffer.
#[async_trait]
pub trait Editor: Send {
    /// Path of the buffer in the active editor, if there is one.
    fn active_path(&self) -> Option<String>;
    /// Whether the editor currently has input focus.
    fn has_focus(&self) -> bool;
    fn line_count(&self) -> usize;
    /// Length of the given line in characters, without its line break.
    fn line_len(&self, line: usize) -> Option<usize>;
    /// The active end of the primary selection.
    fn caret(&self) -> Position;
    fn selection(&self) -> Range;
    fn text(&self) -> String;
    /// 0-indexed line in the middle of the viewport.
    fn center_line(&self) -> Option<u32>;

    fn replace_content(&mut self, text: &str);
    fn set_selection(&mut self, range: Range);
    fn reveal(&mut self, range: Range);
    fn center_on_line(&mut self, line: u32);
    /// Opens the document and makes it the active one.
    async fn open_document(&mut self, path: &str) -> Result<()>;

    fn contains(&self, position: Position) -> bool {
        position.line < self.line_count()
            && self
                .line_len(position.line)
                .is_some_and(|len| position.character <= len)
    }
}

/// User-facing notifications (pop-ups in an IDE, log lines in the CLI).
pub trait Notifier: Send + Sync {
    fn info(&self, message: &str);
    fn error(&self, message: &str);
}

/// Local changes reported by the host. Every event names the buffer it happened in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEvent {
    /// The caret moved or the viewport scrolled.
    CursorMoved {
        path: String,
        caret: Position,
        center_line: Option<u32>,
    },
    /// A non-empty selection changed.
    SelectionChanged { path: String, range: Range },
    /// The buffer content changed.
    DocumentChanged {
        path: String,
        text: String,
        caret: Position,
    },
}

impl EditorEvent {
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::CursorMoved { path, .. }
            | Self::SelectionChanged { path, .. }
            | Self::DocumentChanged { path, .. } => path,
        }
    }

    /// Describes where the caret of `editor` currently is, as the host would after a selection
    /// change. Empty selections are cursor moves.
    pub fn from_selection<E: Editor + ?Sized>(editor: &E) -> Option<Self> {
        let path = editor.active_path()?;
        let selection = editor.selection();
        if selection.is_empty() {
            Some(Self::CursorMoved {
                path,
                caret: editor.caret(),
                center_line: editor.center_line(),
            })
        } else {
            Some(Self::SelectionChanged {
                path,
                range: selection,
            })
        }
    }

    pub fn from_content<E: Editor + ?Sized>(editor: &E) -> Option<Self> {
        Some(Self::DocumentChanged {
            path: editor.active_path()?,
            text: editor.text(),
            caret: editor.caret(),
        })
    }
}
