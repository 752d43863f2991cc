// SPDX-FileCopyrightText: 2025 blinry <mail@blinry.org>
// SPDX-FileCopyrightText: 2025 zormit <nt4u@kpvn.de>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Picks one peer out of the advertised sessions.
use crate::editor::Notifier;
use crate::registry::SessionInfo;
use async_trait::async_trait;
use std::cmp::Reverse;
use std::path::Path;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};
use tracing::debug;

const MAX_DIRECTORY_WIDTH: usize = 60;
const KEPT_SEGMENTS: usize = 3;

/// One entry of the list shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionChoice {
    pub port: u16,
    pub label: String,
    pub description: String,
}

impl From<&SessionInfo> for SessionChoice {
    fn from(session: &SessionInfo) -> Self {
        Self {
            port: session.port,
            label: format!("Port {}", session.port),
            description: format!(
                "{} ({})",
                abbreviate_directory(&session.directory),
                format_timestamp(session.timestamp)
            ),
        }
    }
}

/// Lets a human choose among sessions. Returns the index of the chosen entry, or `None` if they
/// cancelled.
#[async_trait]
pub trait SessionPicker: Send {
    async fn pick(&mut self, choices: &[SessionChoice]) -> Option<usize>;
}

/// How strongly a session's directory contains the file: the number of path components of the
/// directory if it is an ancestor of the file, zero otherwise.
fn containment(directory: &str, current_file: Option<&str>) -> usize {
    match current_file {
        Some(file) if Path::new(file).starts_with(directory) => {
            Path::new(directory).components().count()
        }
        _ => 0,
    }
}

/// Sessions whose directory contains the current file come first, the closest ancestor before
/// farther ones. Within the same containment, newer sessions come first.
#[must_use]
pub fn rank_sessions(mut sessions: Vec<SessionInfo>, current_file: Option<&str>) -> Vec<SessionInfo> {
    sessions.sort_by_key(|session| {
        (
            Reverse(containment(&session.directory, current_file)),
            Reverse(session.timestamp),
        )
    });
    sessions
}

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

/// Shortens all but the last three path segments to their first letter. Falls back to
/// `(...)/a/b/c` if that is still too wide. Both `/` and `\` separate segments, and the first
/// one found joins them again. Drive prefixes like `C:` are kept.
#[must_use]
pub fn abbreviate_directory(directory: &str) -> String {
    let separator = directory.chars().find(|&c| is_separator(c)).unwrap_or('/');
    let segments: Vec<&str> = directory.split(is_separator).collect();
    if segments.len() <= KEPT_SEGMENTS {
        return directory.to_string();
    }
    let split = segments.len() - KEPT_SEGMENTS;
    let (head, tail) = segments.split_at(split);
    let joiner = separator.to_string();

    let abbreviated = head
        .iter()
        .map(|segment| {
            if segment.ends_with(':') {
                (*segment).to_string()
            } else {
                segment.chars().next().map(String::from).unwrap_or_default()
            }
        })
        .chain(tail.iter().map(|segment| (*segment).to_string()))
        .collect::<Vec<_>>()
        .join(&joiner);

    if abbreviated.chars().count() > MAX_DIRECTORY_WIDTH {
        format!("(...){separator}{}", tail.join(&joiner))
    } else {
        abbreviated
    }
}

fn format_timestamp(timestamp: i64) -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(timestamp) * 1_000_000)
        .ok()
        .and_then(|date| date.to_offset(offset).format(format).ok())
        .unwrap_or_else(|| "unknown time".to_string())
}

/// Ranks the sessions and lets the user choose one. Returns the chosen port.
pub async fn select_session<P, N>(
    sessions: Vec<SessionInfo>,
    current_file: Option<&str>,
    picker: &mut P,
    notifier: &N,
) -> Option<u16>
where
    P: SessionPicker + ?Sized,
    N: Notifier + ?Sized,
{
    if sessions.is_empty() {
        notifier.error("No active ShareEdit sessions found");
        return None;
    }

    let choices: Vec<SessionChoice> = rank_sessions(sessions, current_file)
        .iter()
        .map(SessionChoice::from)
        .collect();

    let chosen = picker.pick(&choices).await;
    match chosen.and_then(|index| choices.get(index)) {
        Some(choice) => Some(choice.port),
        None => {
            debug!("Session selection was cancelled");
            None
        }
    }
}
