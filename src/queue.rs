//! Line queue between the reader threads and the tick.
//!
//! Reader threads push, the tick drains everything that arrived since the last
//! frame. Unbounded: the oracle emits a few hundred lines per session at most.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

/// One complete line from the analysis process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    text: String,
    received_at: Instant,
}

impl RawLine {
    /// Build a line, stripping a trailing `\n` / `\r\n`.
    pub fn new(text: impl Into<String>) -> Self {
        Self::at(text, Instant::now())
    }

    pub fn at(text: impl Into<String>, received_at: Instant) -> Self {
        let mut text = text.into();
        if text.ends_with('\n') {
            text.pop();
            if text.ends_with('\r') {
                text.pop();
            }
        }
        Self { text, received_at }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn received_at(&self) -> Instant {
        self.received_at
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

/// Thread-safe FIFO of [`RawLine`]s. Cloning shares the same queue.
#[derive(Debug, Clone, Default)]
pub struct LineQueue {
    inner: Arc<Mutex<VecDeque<RawLine>>>,
}

impl LineQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, line: RawLine) {
        self.inner.lock().push_back(line);
    }

    /// Take everything queued so far, oldest first.
    ///
    /// The lock is held only for the swap; lines pushed while the caller
    /// processes the batch land in the next drain.
    pub fn drain(&self) -> Vec<RawLine> {
        let batch = std::mem::take(&mut *self.inner.lock());
        Vec::from(batch)
    }

    pub fn pop(&self) -> Option<RawLine> {
        self.inner.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
