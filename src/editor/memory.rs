// SPDX-FileCopyrightText: 2025 blinry <mail@blinry.org>
// SPDX-FileCopyrightText: 2025 zormit <nt4u@kpvn.de>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! A headless [`Editor`] keeping its buffers in ropes. The CLI drives one of these, and the tests
//! use it to observe what the reconciler did.
use super::Editor;
use crate::types::{Position, Range};
use anyhow::{Context, Result};
use async_trait::async_trait;
use ropey::Rope;
use std::collections::HashMap;
use std::io::ErrorKind;
use tracing::debug;

const VIEWPORT_HEIGHT: usize = 40;

#[derive(Debug, Default)]
struct Buffer {
    rope: Rope,
    selection: Range,
    center: Option<u32>,
    revealed: Option<Range>,
}

impl Buffer {
    fn new(text: &str) -> Self {
        Self {
            rope: Rope::from_str(text),
            ..Self::default()
        }
    }

    fn line_len(&self, line: usize) -> Option<usize> {
        let slice = self.rope.get_line(line)?;
        let mut len = slice.len_chars();
        if len > 0 && slice.char(len - 1) == '\n' {
            len -= 1;
            if len > 0 && slice.char(len - 1) == '\r' {
                len -= 1;
            }
        }
        Some(len)
    }

    fn clamp(&self, position: Position) -> Position {
        let line = position.line.min(self.rope.len_lines().saturating_sub(1));
        let character = position
            .character
            .min(self.line_len(line).unwrap_or_default());
        Position::new(line, character)
    }

    fn char_index(&self, position: Position) -> usize {
        let position = self.clamp(position);
        self.rope.line_to_char(position.line) + position.character
    }

    fn position_of(&self, char_index: usize) -> Position {
        let line = self.rope.char_to_line(char_index);
        Position::new(line, char_index - self.rope.line_to_char(line))
    }

    fn is_visible(&self, line: usize) -> bool {
        let half = VIEWPORT_HEIGHT / 2;
        let (top, bottom) = self.center.map_or((0, VIEWPORT_HEIGHT), |center| {
            let center = center as usize;
            (center.saturating_sub(half), center + half)
        });
        (top..bottom).contains(&line)
    }
}

#[derive(Debug, Default)]
pub struct MemoryEditor {
    buffers: HashMap<String, Buffer>,
    active: Option<String>,
    focused: bool,
    focus_on_open: bool,
}

impl MemoryEditor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a buffer and makes it the active one.
    #[must_use]
    pub fn with_buffer(mut self, path: &str, text: &str) -> Self {
        self.open_buffer(path, text);
        self
    }

    #[must_use]
    pub fn focused(mut self, focused: bool) -> Self {
        self.focused = focused;
        self
    }

    pub fn open_buffer(&mut self, path: &str, text: &str) {
        self.buffers.insert(path.to_string(), Buffer::new(text));
        self.active = Some(path.to_string());
    }

    /// Makes [`Editor::open_document`] take input focus, like hosts that focus newly opened
    /// documents.
    #[must_use]
    pub fn focusing_on_open(mut self, focus_on_open: bool) -> Self {
        self.focus_on_open = focus_on_open;
        self
    }

    /// Switches to an already open buffer. Returns whether there was one for `path`.
    pub fn activate(&mut self, path: &str) -> bool {
        if self.buffers.contains_key(path) {
            self.active = Some(path.to_string());
            true
        } else {
            false
        }
    }

    pub fn set_focus(&mut self, focused: bool) {
        self.focused = focused;
    }

    #[must_use]
    pub fn buffer_text(&self, path: &str) -> Option<String> {
        self.buffers.get(path).map(|buffer| buffer.rope.to_string())
    }

    /// The range most recently scrolled into view in the active buffer.
    #[must_use]
    pub fn revealed(&self) -> Option<Range> {
        self.active_buffer().and_then(|buffer| buffer.revealed)
    }

    /// Replaces the selection with `text` and puts the caret behind it, like typing would.
    pub fn type_text(&mut self, text: &str) {
        let Some(buffer) = self.active_buffer_mut() else {
            return;
        };
        let selection = buffer.selection;
        let (from, to) = {
            let a = buffer.char_index(selection.start);
            let b = buffer.char_index(selection.end);
            (a.min(b), a.max(b))
        };
        buffer.rope.remove(from..to);
        buffer.rope.insert(from, text);
        let caret = buffer.position_of(from + text.chars().count());
        buffer.selection = Range::caret(caret);
    }

    fn active_buffer(&self) -> Option<&Buffer> {
        self.active.as_ref().and_then(|path| self.buffers.get(path))
    }

    fn active_buffer_mut(&mut self) -> Option<&mut Buffer> {
        let path = self.active.as_ref()?;
        self.buffers.get_mut(path)
    }
}

#[async_trait]
impl Editor for MemoryEditor {
    fn active_path(&self) -> Option<String> {
        self.active.clone()
    }

    fn has_focus(&self) -> bool {
        self.focused
    }

    fn line_count(&self) -> usize {
        self.active_buffer()
            .map_or(0, |buffer| buffer.rope.len_lines())
    }

    fn line_len(&self, line: usize) -> Option<usize> {
        self.active_buffer()?.line_len(line)
    }

    fn caret(&self) -> Position {
        self.selection().end
    }

    fn selection(&self) -> Range {
        self.active_buffer()
            .map(|buffer| buffer.selection)
            .unwrap_or_default()
    }

    fn text(&self) -> String {
        self.active_buffer()
            .map(|buffer| buffer.rope.to_string())
            .unwrap_or_default()
    }

    fn center_line(&self) -> Option<u32> {
        self.active_buffer().and_then(|buffer| buffer.center)
    }

    fn replace_content(&mut self, text: &str) {
        if let Some(buffer) = self.active_buffer_mut() {
            buffer.rope = Rope::from_str(text);
            let selection = buffer.selection;
            buffer.selection = Range::new(buffer.clamp(selection.start), buffer.clamp(selection.end));
        }
    }

    fn set_selection(&mut self, range: Range) {
        if let Some(buffer) = self.active_buffer_mut() {
            buffer.selection = Range::new(buffer.clamp(range.start), buffer.clamp(range.end));
        }
    }

    fn reveal(&mut self, range: Range) {
        if let Some(buffer) = self.active_buffer_mut() {
            if !buffer.is_visible(range.end.line) {
                buffer.center = Some(range.end.line as u32);
            }
            buffer.revealed = Some(range);
        }
    }

    fn center_on_line(&mut self, line: u32) {
        if let Some(buffer) = self.active_buffer_mut() {
            buffer.center = Some(line);
        }
    }

    async fn open_document(&mut self, path: &str) -> Result<()> {
        if !self.buffers.contains_key(path) {
            let text = match tokio::fs::read_to_string(path).await {
                Ok(text) => text,
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    debug!("{path} does not exist yet, opening an empty buffer");
                    String::new()
                }
                Err(err) => {
                    return Err(err).with_context(|| format!("Failed to open '{path}'"));
                }
            };
            self.buffers.insert(path.to_string(), Buffer::new(&text));
        }
        self.active = Some(path.to_string());
        if self.focus_on_open {
            self.focused = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn line_lengths_ignore_line_breaks() {
        let editor = MemoryEditor::new().with_buffer("/a", "hello\r\nwörld\n");
        assert_eq!(editor.line_count(), 3);
        assert_eq!(editor.line_len(0), Some(5));
        assert_eq!(editor.line_len(1), Some(5));
        assert_eq!(editor.line_len(2), Some(0));
        assert_eq!(editor.line_len(3), None);
    }

    #[test]
    fn contains_allows_end_of_line() {
        let editor = MemoryEditor::new().with_buffer("/a", "abc\nde");
        assert!(editor.contains(Position::new(0, 3)));
        assert!(!editor.contains(Position::new(0, 4)));
        assert!(!editor.contains(Position::new(2, 0)));
    }

    #[test]
    fn selections_are_clamped() {
        let mut editor = MemoryEditor::new().with_buffer("/a", "abc\nde");
        editor.set_selection(Range::caret(Position::new(7, 7)));
        assert_eq!(editor.caret(), Position::new(1, 2));
    }

    #[test]
    fn typing_replaces_selection() {
        let mut editor = MemoryEditor::new().with_buffer("/a", "hello world");
        editor.set_selection(Range::new(Position::new(0, 6), Position::new(0, 11)));
        editor.type_text("there\n!");
        assert_eq!(editor.text(), "hello there\n!");
        assert_eq!(editor.caret(), Position::new(1, 1));
    }

    #[test]
    fn reveal_scrolls_far_lines_into_view() {
        let text = "x\n".repeat(200);
        let mut editor = MemoryEditor::new().with_buffer("/a", &text);
        editor.reveal(Range::caret(Position::new(3, 0)));
        assert_eq!(editor.center_line(), None);
        editor.reveal(Range::caret(Position::new(150, 0)));
        assert_eq!(editor.center_line(), Some(150));
    }

    #[tokio::test]
    async fn opening_missing_file_gives_empty_buffer() {
        let dir = temp_dir::TempDir::new().expect("Failed to create temp directory");
        let path = dir.child("new.txt").display().to_string();
        let mut editor = MemoryEditor::new();
        editor.open_document(&path).await.unwrap();
        assert_eq!(editor.active_path(), Some(path));
        assert_eq!(editor.text(), "");
    }

    #[tokio::test]
    async fn opening_can_take_focus() {
        let mut editor = MemoryEditor::new().focusing_on_open(true);
        editor.open_buffer("/a", "text");
        editor.open_document("/a").await.unwrap();
        assert!(editor.has_focus());
    }

    #[tokio::test]
    async fn opening_existing_file_reads_it() {
        let dir = temp_dir::TempDir::new().expect("Failed to create temp directory");
        let file = dir.child("file.txt");
        std::fs::write(&file, "content").expect("Failed to write file");
        let mut editor = MemoryEditor::new();
        editor.open_document(&file.display().to_string()).await.unwrap();
        assert_eq!(editor.text(), "content");
    }
}
