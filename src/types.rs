// SPDX-FileCopyrightText: 2025 blinry <mail@blinry.org>
// SPDX-FileCopyrightText: 2025 zormit <nt4u@kpvn.de>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The wire protocol spoken between the two editors.
//!
//! One websocket text frame carries exactly one JSON-encoded [`Message`]. Caret positions in
//! [`TextContent`] and [`CursorPos`] are 1-indexed on the wire, while editors count from zero.
//! All conversions between the two go through [`Position`].
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Identifies which kind of editor produced a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    #[display("vscode")]
    Vscode,
    #[display("vim")]
    Vim,
}

impl FromStr for Origin {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "vscode" => Ok(Self::Vscode),
            "vim" => Ok(Self::Vim),
            other => anyhow::bail!("Unknown sender '{other}', expected 'vscode' or 'vim'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextContent {
    pub sender: Origin,
    pub path: String,
    pub text: String,
    pub cursor_line: u32,
    pub cursor_col: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorPos {
    pub sender: Origin,
    pub path: String,
    pub line: u32,
    pub col: u32,
    /// 0-indexed line the sender wants in the middle of the viewport. `None` (absent or `null` on
    /// the wire) means "leave the viewport alone"; `Some(0)` centers the first line.
    #[serde(default)]
    pub center_line: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionPos {
    pub path: String,
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    TextContent(TextContent),
    CursorPos(CursorPos),
    SelectionPos(SelectionPos),
}

impl Message {
    pub fn from_frame(frame: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(frame)
    }

    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::TextContent(TextContent { path, .. })
            | Self::CursorPos(CursorPos { path, .. })
            | Self::SelectionPos(SelectionPos { path, .. }) => path,
        }
    }

    /// Selections carry no sender, so they never count as our own echo.
    #[must_use]
    pub fn sender(&self) -> Option<Origin> {
        match self {
            Self::TextContent(message) => Some(message.sender),
            Self::CursorPos(message) => Some(message.sender),
            Self::SelectionPos(_) => None,
        }
    }
}

/// A 0-indexed position inside a local buffer. `character` counts chars, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Display)]
#[display("{line}:{character}")]
pub struct Position {
    pub line: usize,
    pub character: usize,
}

impl Position {
    #[must_use]
    pub const fn new(line: usize, character: usize) -> Self {
        Self { line, character }
    }

    /// Converts 1-indexed wire coordinates. Zero is treated as the first line/column.
    #[must_use]
    pub fn from_wire(line: u32, col: u32) -> Self {
        Self {
            line: line.saturating_sub(1) as usize,
            character: col.saturating_sub(1) as usize,
        }
    }

    #[must_use]
    pub fn to_wire(self) -> (u32, u32) {
        (self.line as u32 + 1, self.character as u32 + 1)
    }
}

/// A 0-indexed selection; `start` is the anchor, `end` the active end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    #[must_use]
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub fn caret(position: Position) -> Self {
        Self::new(position, position)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl CursorPos {
    #[must_use]
    pub fn from_local(
        sender: Origin,
        path: impl Into<String>,
        position: Position,
        center_line: Option<u32>,
    ) -> Self {
        let (line, col) = position.to_wire();
        Self {
            sender,
            path: path.into(),
            line,
            col,
            center_line,
        }
    }

    #[must_use]
    pub fn local_position(&self) -> Position {
        Position::from_wire(self.line, self.col)
    }
}

impl TextContent {
    #[must_use]
    pub fn from_local(
        sender: Origin,
        path: impl Into<String>,
        text: impl Into<String>,
        caret: Position,
    ) -> Self {
        let (cursor_line, cursor_col) = caret.to_wire();
        Self {
            sender,
            path: path.into(),
            text: text.into(),
            cursor_line,
            cursor_col,
        }
    }

    #[must_use]
    pub fn local_caret(&self) -> Position {
        Position::from_wire(self.cursor_line, self.cursor_col)
    }
}

impl SelectionPos {
    #[must_use]
    pub fn from_local(path: impl Into<String>, range: Range) -> Self {
        let (start_line, start_col) = range.start.to_wire();
        let (end_line, end_col) = range.end.to_wire();
        Self {
            path: path.into(),
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    #[must_use]
    pub fn local_range(&self) -> Range {
        Range::new(
            Position::from_wire(self.start_line, self.start_col),
            Position::from_wire(self.end_line, self.end_col),
        )
    }
}

#[cfg(test)]
pub mod factories {
    use super::{CursorPos, Origin, Position};

    pub fn cursor(path: &str, line: usize, character: usize) -> CursorPos {
        CursorPos::from_local(Origin::Vim, path, Position::new(line, character), None)
    }

    pub fn centered_cursor(path: &str, line: usize, character: usize, center: u32) -> CursorPos {
        CursorPos::from_local(Origin::Vim, path, Position::new(line, character), Some(center))
    }
}
