// SPDX-FileCopyrightText: 2025 blinry <mail@blinry.org>
// SPDX-FileCopyrightText: 2025 zormit <nt4u@kpvn.de>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The de-duplication oracle shared by the inbound and outbound paths.
use crate::types::CursorPos;

/// A cursor location in wire coordinates (1-indexed line and column).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastPosition {
    pub path: String,
    pub line: u32,
    pub col: u32,
    pub center_line: Option<u32>,
}

impl From<&CursorPos> for LastPosition {
    fn from(message: &CursorPos) -> Self {
        Self {
            path: message.path.clone(),
            line: message.line,
            col: message.col,
            center_line: message.center_line,
        }
    }
}

/// Holds the last cursor location that was sent to or applied from the peer. Empty until the
/// first cursor frame goes either way.
#[derive(Debug, Default)]
pub struct PositionState {
    last: Option<LastPosition>,
}

impl PositionState {
    #[must_use]
    pub fn last(&self) -> Option<&LastPosition> {
        self.last.as_ref()
    }

    #[must_use]
    pub fn matches(&self, candidate: &LastPosition) -> bool {
        self.last.as_ref() == Some(candidate)
    }

    pub fn update(&mut self, position: LastPosition) {
        self.last = Some(position);
    }

    /// Stores `candidate` unless it equals the current value. Returns whether it was stored.
    pub fn replace_if_changed(&mut self, candidate: LastPosition) -> bool {
        if self.matches(&candidate) {
            return false;
        }
        self.update(candidate);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::factories::*;

    #[test]
    fn starts_empty() {
        let state = PositionState::default();
        assert!(state.last().is_none());
        assert!(!state.matches(&LastPosition::from(&cursor("/a", 0, 0))));
    }

    #[test]
    fn same_position_is_only_stored_once() {
        let mut state = PositionState::default();
        assert!(state.replace_if_changed(LastPosition::from(&cursor("/a", 4, 9))));
        assert!(!state.replace_if_changed(LastPosition::from(&cursor("/a", 4, 9))));
        assert!(state.replace_if_changed(LastPosition::from(&cursor("/b", 4, 9))));
    }

    #[test]
    fn center_line_is_part_of_the_identity() {
        let mut state = PositionState::default();
        state.update(LastPosition::from(&cursor("/a", 1, 1)));
        assert!(!state.matches(&LastPosition::from(&centered_cursor("/a", 1, 1, 0))));
    }
}
