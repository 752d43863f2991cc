// SPDX-FileCopyrightText: 2025 blinry <mail@blinry.org>
// SPDX-FileCopyrightText: 2025 zormit <nt4u@kpvn.de>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Keeps the caret, selection and buffer content of two editors on the same machine in sync over
//! a local websocket.

pub mod channel;
pub mod config;
pub mod debounce;
pub mod editor;
pub mod logging;
pub mod reconciler;
pub mod registry;
pub mod selector;
pub mod session;
pub mod state;
pub mod types;
