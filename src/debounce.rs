// SPDX-FileCopyrightText: 2025 blinry <mail@blinry.org>
// SPDX-FileCopyrightText: 2025 zormit <nt4u@kpvn.de>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Trailing-edge debouncing of local editor events.
//!
//! Cursor and scroll events fire for every intermediate position of a drag. The peer only needs
//! the position we come to rest at, so a [`Debouncer`] keeps the newest candidate and emits it once
//! nothing new arrived for a whole window.
use std::time::Duration;
use tokio::{sync::mpsc, task::JoinHandle, time::sleep};

pub const DEFAULT_WINDOW: Duration = Duration::from_millis(50);

/// Tells the owner that the window of the given generation elapsed.
pub type ElapsedSender = mpsc::UnboundedSender<u64>;
pub type ElapsedReceiver = mpsc::UnboundedReceiver<u64>;

/// Holds at most one pending candidate and one timer. The timer does not hand out the candidate
/// itself; it only reports its generation on the `elapsed` channel, and the owner claims the
/// candidate with [`Debouncer::take_elapsed`]. Reports from superseded timers are ignored.
pub struct Debouncer<T> {
    window: Duration,
    generation: u64,
    pending: Option<T>,
    timer: Option<JoinHandle<()>>,
    elapsed_tx: ElapsedSender,
}

impl<T> Debouncer<T> {
    #[must_use]
    pub fn new(window: Duration, elapsed_tx: ElapsedSender) -> Self {
        Self {
            window,
            generation: 0,
            pending: None,
            timer: None,
            elapsed_tx,
        }
    }

    /// Replaces any pending candidate and restarts the window.
    pub fn schedule(&mut self, candidate: T) {
        self.stop_timer();
        self.generation += 1;
        self.pending = Some(candidate);

        let generation = self.generation;
        let window = self.window;
        let elapsed_tx = self.elapsed_tx.clone();
        self.timer = Some(tokio::spawn(async move {
            sleep(window).await;
            // The owner might be gone already, that's fine.
            let _ = elapsed_tx.send(generation);
        }));
    }

    /// Drops the pending candidate without emitting it.
    pub fn cancel_pending(&mut self) -> Option<T> {
        self.stop_timer();
        self.pending.take()
    }

    /// Claims the candidate if `generation` belongs to the most recent `schedule` call.
    pub fn take_elapsed(&mut self, generation: u64) -> Option<T> {
        if generation != self.generation {
            return None;
        }
        self.timer = None;
        self.pending.take()
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    fn stop_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        self.stop_timer();
    }
}
