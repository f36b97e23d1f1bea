//! Cancellable one-shot deadline, polled from the tick.
//!
//! Each timed phase owns at most one pending timeout. Arming replaces whatever
//! was pending and bumps the generation, so a deadline that was cancelled or
//! superseded can never fire afterwards.

use std::fmt::Debug;
use std::time::{Duration, Instant};

/// Longest delay a deadline is armed for; longer requests are clamped.
pub const MAX_DELAY: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// A pending timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline<K> {
    pub kind: K,
    pub due: Instant,
    pub generation: u64,
}

/// Single-slot timer keyed by timeout kind.
#[derive(Debug)]
pub struct TimerSlot<K> {
    pending: Option<Deadline<K>>,
    generation: u64,
}

impl<K> Default for TimerSlot<K> {
    fn default() -> Self {
        Self {
            pending: None,
            generation: 0,
        }
    }
}

impl<K: Copy + Debug> TimerSlot<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `kind` to fire `after` from `now` (at most [`MAX_DELAY`]),
    /// replacing any pending deadline. Returns the new generation.
    pub fn arm(&mut self, kind: K, now: Instant, after: Duration) -> u64 {
        self.generation += 1;
        let generation = self.generation;
        // An instant past the platform's range never fires
        self.pending = now
            .checked_add(after.min(MAX_DELAY))
            .map(|due| Deadline {
                kind,
                due,
                generation,
            });
        self.generation
    }

    /// Drop the pending deadline, if any.
    pub fn cancel(&mut self) -> Option<K> {
        self.pending.take().map(|d| d.kind)
    }

    /// Take the pending deadline if it is due at `now`.
    pub fn poll(&mut self, now: Instant) -> Option<Deadline<K>> {
        match self.pending {
            Some(deadline) if now >= deadline.due => self.pending.take(),
            _ => None,
        }
    }

    pub fn pending(&self) -> Option<&Deadline<K>> {
        self.pending.as_ref()
    }

    /// Time left before the pending deadline fires (zero when overdue).
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.pending
            .as_ref()
            .map(|d| d.due.saturating_duration_since(now))
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}
