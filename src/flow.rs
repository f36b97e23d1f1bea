//! Phase state machine
//!
//! Drives the visitor-facing view through one interaction:
//!
//! ```text
//!            scan start           scan complete         message ready
//! Waiting ─────────────► Scanning ─────────────► ScanComplete ─────────► Message
//!    ▲                      │  (skip: stay, set flag)  ─────────────────►   │
//!    │                      │                                              │ timeout
//!    └──── timeout ──── End ◄──────────────────────────────────────────────┘
//!    └──── error (from anywhere)
//! ```
//!
//! All notifications are synchronous and come from the tick thread. Timed
//! phases arm a single [`TimerSlot`]; every transition cancels it first.

use std::fmt;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::clock::SharedClock;
use crate::config::FlowConfig;
use crate::sinks::PhasePresenter;
use crate::timer::TimerSlot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowState {
    Waiting,
    Scanning,
    ScanComplete,
    Message,
    End,
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Waiting => "waiting",
            Self::Scanning => "scanning",
            Self::ScanComplete => "scan_complete",
            Self::Message => "message",
            Self::End => "end",
        };
        f.write_str(name)
    }
}

/// What caused a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cause {
    ScanStart,
    ScanComplete,
    MessageReady,
    MessageTimeout,
    EndTimeout,
    /// Scanning watchdog expired
    ScanTimeout,
    Error(String),
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ScanStart => f.write_str("scan start"),
            Self::ScanComplete => f.write_str("scan complete"),
            Self::MessageReady => f.write_str("message ready"),
            Self::MessageTimeout => f.write_str("message timeout"),
            Self::EndTimeout => f.write_str("end timeout"),
            Self::ScanTimeout => f.write_str("scan timeout"),
            Self::Error(reason) => write!(f, "error: {}", reason),
        }
    }
}

/// An accepted state change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: FlowState,
    pub to: FlowState,
    pub cause: Cause,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} ({})", self.from, self.to, self.cause)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Timeout {
    Message,
    End,
    Scan,
}

/// Seconds to a duration; negative, NaN and overflowing values become zero.
fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

pub struct FlowStateMachine {
    state: FlowState,
    config: FlowConfig,
    presenter: Box<dyn PhasePresenter>,
    clock: SharedClock,
    timer: TimerSlot<Timeout>,
    /// Audio length reported before the Message phase began
    pending_duration: Option<f64>,
    /// ScanComplete arrived while skip_scan_complete is on
    skip_occurred: bool,
    journal: Vec<Transition>,
}

impl fmt::Debug for FlowStateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowStateMachine")
            .field("state", &self.state)
            .field("pending_duration", &self.pending_duration)
            .field("skip_occurred", &self.skip_occurred)
            .field("timer", &self.timer)
            .finish_non_exhaustive()
    }
}

impl FlowStateMachine {
    /// Starts in `Waiting` without touching the presenter; call [`start`](Self::start)
    /// once the host is ready to draw.
    pub fn new(config: FlowConfig, presenter: Box<dyn PhasePresenter>, clock: SharedClock) -> Self {
        Self {
            state: FlowState::Waiting,
            config,
            presenter,
            clock,
            timer: TimerSlot::new(),
            pending_duration: None,
            skip_occurred: false,
            journal: Vec::new(),
        }
    }

    /// Show the waiting view
    pub fn start(&mut self) {
        info!(state = %self.state, "flow started");
        self.presenter.show_waiting();
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    /// True in `Scanning` and `ScanComplete`
    pub fn is_in_scanning_phase(&self) -> bool {
        matches!(self.state, FlowState::Scanning | FlowState::ScanComplete)
    }

    pub fn pending_duration(&self) -> Option<f64> {
        self.pending_duration
    }

    pub fn skip_occurred(&self) -> bool {
        self.skip_occurred
    }

    /// Time left on the current phase timer
    pub fn remaining(&self) -> Option<Duration> {
        self.timer.remaining(self.clock.now())
    }

    /// Transitions accepted since the last call, oldest first
    pub fn drain_transitions(&mut self) -> Vec<Transition> {
        std::mem::take(&mut self.journal)
    }

    // ── Notifications ─────────────────────────────────────────────────────────

    pub fn notify_scan_start(&mut self) -> Option<Transition> {
        match self.state {
            FlowState::Waiting => Some(self.change_state(FlowState::Scanning, Cause::ScanStart)),
            state => self.ignore("scan start", state),
        }
    }

    pub fn notify_scan_complete(&mut self) -> Option<Transition> {
        match self.state {
            FlowState::Scanning if self.config.skip_scan_complete => {
                debug!("scan complete view skipped, staying in scanning");
                self.skip_occurred = true;
                None
            }
            FlowState::Scanning => {
                Some(self.change_state(FlowState::ScanComplete, Cause::ScanComplete))
            }
            state => self.ignore("scan complete", state),
        }
    }

    pub fn notify_message_ready(&mut self) -> Option<Transition> {
        match self.state {
            FlowState::ScanComplete => {
                Some(self.change_state(FlowState::Message, Cause::MessageReady))
            }
            FlowState::Scanning if self.skip_occurred => {
                Some(self.change_state(FlowState::Message, Cause::MessageReady))
            }
            state => self.ignore("message ready", state),
        }
    }

    /// Abandon the interaction from any state
    pub fn notify_error(&mut self, reason: &str) -> Transition {
        warn!(state = %self.state, reason, "flow reset by error");
        self.pending_duration = None;
        self.change_state(FlowState::Waiting, Cause::Error(reason.to_string()))
    }

    /// Audio length of the current message, in seconds.
    ///
    /// Applied immediately (measured from now) during `Message`, otherwise kept
    /// for the next `Message` entry. Both paths add the configured padding.
    pub fn set_message_duration(&mut self, seconds: f64) {
        if !seconds.is_finite() || seconds < 0.0 {
            warn!(seconds, "ignoring invalid message duration");
            return;
        }

        if self.state == FlowState::Message {
            let after = secs(seconds + self.config.message_padding_secs);
            self.timer.arm(Timeout::Message, self.clock.now(), after);
            self.pending_duration = None;
            debug!(seconds, after_ms = after.as_millis() as u64, "message timeout re-armed");
        } else {
            debug!(seconds, state = %self.state, "message duration stored");
            self.pending_duration = Some(seconds);
        }
    }

    /// Fire the phase timer if it is due
    pub fn tick(&mut self) -> Option<Transition> {
        let deadline = self.timer.poll(self.clock.now())?;
        match (deadline.kind, self.state) {
            (Timeout::Message, FlowState::Message) => {
                Some(self.change_state(FlowState::End, Cause::MessageTimeout))
            }
            (Timeout::End, FlowState::End) => {
                Some(self.change_state(FlowState::Waiting, Cause::EndTimeout))
            }
            (Timeout::Scan, FlowState::Scanning | FlowState::ScanComplete) => {
                warn!(state = %self.state, "scan watchdog expired");
                Some(self.change_state(FlowState::Waiting, Cause::ScanTimeout))
            }
            (kind, state) => {
                debug!(?kind, %state, generation = deadline.generation, "stale deadline dropped");
                None
            }
        }
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn ignore(&self, what: &str, state: FlowState) -> Option<Transition> {
        debug!(notification = what, %state, "notification ignored");
        None
    }

    fn change_state(&mut self, to: FlowState, cause: Cause) -> Transition {
        self.timer.cancel();
        let from = self.state;
        self.state = to;

        let transition = Transition { from, to, cause };
        info!(from = %from, to = %to, cause = %transition.cause, "flow transition");

        match to {
            FlowState::Waiting => {
                self.skip_occurred = false;
                self.presenter.show_waiting();
            }
            FlowState::Scanning => {
                self.pending_duration = None;
                self.skip_occurred = false;
                self.arm_scan_watchdog();
                self.presenter.show_scanning();
            }
            FlowState::ScanComplete => {
                self.arm_scan_watchdog();
                self.presenter.show_scan_complete();
            }
            FlowState::Message => {
                self.skip_occurred = false;
                let after = match self.pending_duration.take() {
                    Some(seconds) => secs(seconds + self.config.message_padding_secs),
                    None => secs(self.config.message_secs),
                };
                self.timer.arm(Timeout::Message, self.clock.now(), after);
                self.presenter.show_message();
                self.presenter.start_typewriter();
            }
            FlowState::End => {
                if self.config.skip_end {
                    self.timer.arm(Timeout::End, self.clock.now(), Duration::ZERO);
                } else {
                    self.timer
                        .arm(Timeout::End, self.clock.now(), secs(self.config.end_secs));
                    self.presenter.show_end();
                }
            }
        }

        self.journal.push(transition.clone());
        transition
    }

    fn arm_scan_watchdog(&mut self) {
        if let Some(limit) = self.config.scan_timeout_secs {
            self.timer.arm(Timeout::Scan, self.clock.now(), secs(limit));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::sinks::{Recorder, SinkEvent};
    use std::sync::Arc;

    fn machine(config: FlowConfig) -> (FlowStateMachine, Arc<ManualClock>, Recorder) {
        let clock = ManualClock::shared();
        let recorder = Recorder::new();
        let flow = FlowStateMachine::new(config, Box::new(recorder.clone()), clock.clone());
        (flow, clock, recorder)
    }

    fn to_message(flow: &mut FlowStateMachine) {
        flow.notify_scan_start().unwrap();
        flow.notify_scan_complete().unwrap();
        flow.notify_message_ready().unwrap();
        assert_eq!(flow.state(), FlowState::Message);
    }

    #[test]
    fn test_full_cycle_with_default_timings() {
        let (mut flow, clock, recorder) = machine(FlowConfig::default());
        flow.start();
        to_message(&mut flow);

        clock.advance(Duration::from_millis(9_900));
        assert!(flow.tick().is_none());
        clock.advance(Duration::from_millis(100));
        let t = flow.tick().unwrap();
        assert_eq!((t.from, t.to), (FlowState::Message, FlowState::End));

        clock.advance_secs(5.0);
        let t = flow.tick().unwrap();
        assert_eq!(t.to, FlowState::Waiting);
        assert_eq!(t.cause, Cause::EndTimeout);

        assert_eq!(
            recorder.events(),
            vec![
                SinkEvent::ShowWaiting,
                SinkEvent::ShowScanning,
                SinkEvent::ShowScanComplete,
                SinkEvent::ShowMessage,
                SinkEvent::Typewriter,
                SinkEvent::ShowEnd,
                SinkEvent::ShowWaiting,
            ]
        );
    }

    #[test]
    fn test_out_of_order_notifications_are_ignored() {
        let (mut flow, _clock, recorder) = machine(FlowConfig::default());

        assert!(flow.notify_message_ready().is_none());
        assert!(flow.notify_scan_complete().is_none());
        assert_eq!(flow.state(), FlowState::Waiting);

        flow.notify_scan_start().unwrap();
        assert!(flow.notify_scan_start().is_none());
        // Message before the scan completed
        assert!(flow.notify_message_ready().is_none());
        assert_eq!(flow.state(), FlowState::Scanning);
        assert_eq!(recorder.count(&SinkEvent::ShowScanning), 1);
    }

    #[test]
    fn test_skipped_scan_complete_goes_straight_to_message() {
        let config = FlowConfig {
            skip_scan_complete: true,
            ..FlowConfig::default()
        };
        let (mut flow, _clock, recorder) = machine(config);

        flow.notify_scan_start().unwrap();
        assert!(flow.notify_scan_complete().is_none());
        assert!(flow.skip_occurred());
        assert_eq!(flow.state(), FlowState::Scanning);

        let t = flow.notify_message_ready().unwrap();
        assert_eq!((t.from, t.to), (FlowState::Scanning, FlowState::Message));
        assert!(!flow.skip_occurred());
        assert_eq!(recorder.count(&SinkEvent::ShowScanComplete), 0);
    }

    #[test]
    fn test_skip_without_scan_complete_still_requires_it() {
        let config = FlowConfig {
            skip_scan_complete: true,
            ..FlowConfig::default()
        };
        let (mut flow, _clock, _recorder) = machine(config);
        flow.notify_scan_start().unwrap();
        assert!(flow.notify_message_ready().is_none());
    }

    #[test]
    fn test_duration_set_during_message_rearms_from_now() {
        let (mut flow, clock, _recorder) = machine(FlowConfig::default());
        to_message(&mut flow);

        clock.advance_secs(4.0);
        flow.set_message_duration(1.5);
        // 1.5 + 2.0 padding from now
        clock.advance(Duration::from_millis(3_400));
        assert!(flow.tick().is_none());
        clock.advance(Duration::from_millis(100));
        assert_eq!(flow.tick().unwrap().to, FlowState::End);
    }

    #[test]
    fn test_pending_duration_applies_on_message_entry() {
        let (mut flow, clock, _recorder) = machine(FlowConfig::default());
        flow.notify_scan_start().unwrap();
        flow.notify_scan_complete().unwrap();
        flow.set_message_duration(20.0);
        assert_eq!(flow.pending_duration(), Some(20.0));

        flow.notify_message_ready().unwrap();
        assert_eq!(flow.pending_duration(), None);

        clock.advance(Duration::from_millis(21_900));
        assert!(flow.tick().is_none());
        clock.advance(Duration::from_millis(100));
        assert_eq!(flow.tick().unwrap().to, FlowState::End);
    }

    #[test]
    fn test_pending_duration_cleared_on_scan_start() {
        let (mut flow, _clock, _recorder) = machine(FlowConfig::default());
        flow.set_message_duration(7.0);
        assert_eq!(flow.pending_duration(), Some(7.0));
        flow.notify_scan_start().unwrap();
        assert_eq!(flow.pending_duration(), None);
    }

    #[test]
    fn test_invalid_duration_ignored() {
        let (mut flow, _clock, _recorder) = machine(FlowConfig::default());
        flow.set_message_duration(-1.0);
        flow.set_message_duration(f64::NAN);
        assert_eq!(flow.pending_duration(), None);
    }

    #[test]
    fn test_error_cancels_message_timeout() {
        let (mut flow, clock, _recorder) = machine(FlowConfig::default());
        to_message(&mut flow);

        let t = flow.notify_error("api down");
        assert_eq!(t.to, FlowState::Waiting);
        assert!(flow.remaining().is_none());

        // The old message deadline must not drag the next session into End
        flow.notify_scan_start().unwrap();
        clock.advance_secs(60.0);
        assert!(flow.tick().is_none());
        assert_eq!(flow.state(), FlowState::Scanning);
    }

    #[test]
    fn test_error_in_waiting_reshows_waiting() {
        let (mut flow, _clock, recorder) = machine(FlowConfig::default());
        let t = flow.notify_error("spawn failed");
        assert_eq!((t.from, t.to), (FlowState::Waiting, FlowState::Waiting));
        assert_eq!(recorder.events(), vec![SinkEvent::ShowWaiting]);
    }

    #[test]
    fn test_skip_end_returns_on_next_tick() {
        let config = FlowConfig {
            skip_end: true,
            ..FlowConfig::default()
        };
        let (mut flow, clock, recorder) = machine(config);
        to_message(&mut flow);

        clock.advance_secs(10.0);
        assert_eq!(flow.tick().unwrap().to, FlowState::End);
        assert_eq!(flow.tick().unwrap().to, FlowState::Waiting);
        assert_eq!(recorder.count(&SinkEvent::ShowEnd), 0);
    }

    #[test]
    fn test_scan_watchdog() {
        let config = FlowConfig {
            scan_timeout_secs: Some(30.0),
            ..FlowConfig::default()
        };
        let (mut flow, clock, _recorder) = machine(config);
        flow.notify_scan_start().unwrap();

        clock.advance_secs(29.0);
        assert!(flow.tick().is_none());
        clock.advance_secs(1.0);
        let t = flow.tick().unwrap();
        assert_eq!(t.cause, Cause::ScanTimeout);
        assert_eq!(flow.state(), FlowState::Waiting);
    }

    #[test]
    fn test_watchdog_off_by_default() {
        let (mut flow, clock, _recorder) = machine(FlowConfig::default());
        flow.notify_scan_start().unwrap();
        clock.advance_secs(3600.0);
        assert!(flow.tick().is_none());
        assert!(flow.is_in_scanning_phase());
    }

    #[test]
    fn test_enormous_audio_duration_does_not_panic() {
        let (mut flow, clock, _) = machine(FlowConfig::default());
        flow.start();
        to_message(&mut flow);

        flow.set_message_duration(1e19);
        assert_eq!(flow.remaining(), Some(crate::timer::MAX_DELAY));

        clock.advance_secs(3600.0);
        assert!(flow.tick().is_none());
        assert_eq!(flow.state(), FlowState::Message);

        // Stored for the next Message entry as well
        flow.notify_error("reset");
        flow.notify_scan_start().unwrap();
        flow.notify_scan_complete().unwrap();
        flow.set_message_duration(1e19);
        flow.notify_message_ready().unwrap();
        assert_eq!(flow.remaining(), Some(crate::timer::MAX_DELAY));
    }

    #[test]
    fn test_journal_records_transitions() {
        let (mut flow, _clock, _recorder) = machine(FlowConfig::default());
        to_message(&mut flow);
        let journal = flow.drain_transitions();
        let states: Vec<_> = journal.iter().map(|t| t.to).collect();
        assert_eq!(
            states,
            vec![FlowState::Scanning, FlowState::ScanComplete, FlowState::Message]
        );
        assert!(flow.drain_transitions().is_empty());
    }

    #[test]
    fn test_transition_display() {
        let t = Transition {
            from: FlowState::Scanning,
            to: FlowState::Waiting,
            cause: Cause::Error("HTTP 500".into()),
        };
        assert_eq!(t.to_string(), "scanning -> waiting (error: HTTP 500)");
    }
}
