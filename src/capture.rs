//! Capture trigger
//!
//! A visitor presses the button; the kiosk asks the analysis process for a
//! frame. Requests are only honoured while the kiosk is idle and not more
//! often than the configured cooldown.

use std::fmt;
use std::time::{Duration, Instant};

use crate::clock::SharedClock;
use crate::config::CaptureConfig;
use crate::flow::FlowState;
use crate::protocol;

/// Why a capture request was turned down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureRejected {
    /// An interaction is already in progress
    Busy(FlowState),
    /// Too soon after the previous request
    Cooldown(Duration),
}

impl fmt::Display for CaptureRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy(state) => write!(f, "busy ({})", state),
            Self::Cooldown(left) => write!(f, "cooling down ({:.1}s left)", left.as_secs_f64()),
        }
    }
}

#[derive(Debug)]
pub struct CaptureTrigger {
    camera_index: u32,
    cooldown: Duration,
    last_fired: Option<Instant>,
    clock: SharedClock,
}

impl CaptureTrigger {
    pub fn new(config: &CaptureConfig, clock: SharedClock) -> Self {
        Self {
            camera_index: config.camera_index,
            cooldown: Duration::try_from_secs_f64(config.cooldown_secs).unwrap_or(Duration::ZERO),
            last_fired: None,
            clock,
        }
    }

    /// Accept or reject a request given the current flow state. On success
    /// returns the stdin command to send.
    pub fn try_fire(&mut self, state: FlowState) -> Result<String, CaptureRejected> {
        if state != FlowState::Waiting {
            return Err(CaptureRejected::Busy(state));
        }
        let now = self.clock.now();
        if let Some(left) = self.cooldown_remaining_at(now) {
            return Err(CaptureRejected::Cooldown(left));
        }
        self.last_fired = Some(now);
        Ok(protocol::capture_command(self.camera_index))
    }

    /// Time before the next request is accepted, if still cooling down
    pub fn cooldown_remaining(&self) -> Option<Duration> {
        self.cooldown_remaining_at(self.clock.now())
    }

    fn cooldown_remaining_at(&self, now: Instant) -> Option<Duration> {
        let last = self.last_fired?;
        let elapsed = now.saturating_duration_since(last);
        (elapsed < self.cooldown).then(|| self.cooldown - elapsed)
    }
}
