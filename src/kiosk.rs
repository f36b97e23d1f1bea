//! Composition root
//!
//! Wires queue, supervisor, router, flow and capture trigger together and
//! exposes the handful of operations a host loop needs.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::capture::{CaptureRejected, CaptureTrigger};
use crate::clock::SharedClock;
use crate::config::KioskConfig;
use crate::flow::{FlowState, FlowStateMachine, Transition};
use crate::queue::LineQueue;
use crate::router::ProtocolRouter;
use crate::sinks::{Consumers, PhasePresenter, RuneFeed};
use crate::supervisor::{CommandChannel, ProcessSpec, ProcessSupervisor, ShutdownOutcome};

/// Everything the host draws with
pub struct Presentation {
    pub phases: Box<dyn PhasePresenter>,
    pub consumers: Consumers,
    pub rune_feed: Option<Box<dyn RuneFeed>>,
}

/// Result of one tick
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub lines: usize,
    pub transitions: Vec<Transition>,
}

/// Result of a capture request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    Started,
    Rejected(CaptureRejected),
    /// Command could not reach the analysis process
    Undelivered,
}

pub struct Kiosk {
    queue: LineQueue,
    router: ProtocolRouter,
    capture: CaptureTrigger,
    channel: Box<dyn CommandChannel>,
    grace_period: Duration,
    stopped: bool,
}

impl Kiosk {
    /// Assemble a kiosk around an existing command channel and queue.
    pub fn new(
        config: &KioskConfig,
        channel: Box<dyn CommandChannel>,
        queue: LineQueue,
        presentation: Presentation,
        clock: SharedClock,
    ) -> Self {
        let flow = FlowStateMachine::new(config.flow.clone(), presentation.phases, clock.clone());
        let mut router = ProtocolRouter::new(config.router.clone(), flow, presentation.consumers);
        if let Some(feed) = presentation.rune_feed {
            router.attach_rune_feed(feed);
        }
        router.flow_mut().start();

        Self {
            queue,
            router,
            capture: CaptureTrigger::new(&config.capture, clock),
            channel,
            grace_period: config.process.grace_period(),
            stopped: false,
        }
    }

    /// Start the configured analysis process and assemble the kiosk around it.
    ///
    /// A launch failure does not abort: it is routed to the flow (which shows
    /// the waiting view) and the kiosk runs without a process.
    pub fn launch(config: &KioskConfig, presentation: Presentation, clock: SharedClock) -> Self {
        let queue = LineQueue::new();
        let mut supervisor = ProcessSupervisor::new(queue.clone(), config.process.grace_period());
        let started = supervisor.start(&ProcessSpec::from_config(&config.process));

        let mut kiosk = Self::new(config, Box::new(supervisor), queue, presentation, clock);
        match started {
            Ok(handle) => info!(pid = handle.pid, "kiosk ready"),
            Err(err) => {
                kiosk.router.on_process_error(&err.to_string());
            }
        }
        kiosk
    }

    pub fn state(&self) -> FlowState {
        self.router.state()
    }

    pub fn router(&self) -> &ProtocolRouter {
        &self.router
    }

    pub fn router_mut(&mut self) -> &mut ProtocolRouter {
        &mut self.router
    }

    /// Queue that process output lands in
    pub fn queue(&self) -> &LineQueue {
        &self.queue
    }

    /// Route everything queued since the last tick, then fire due timers.
    pub fn tick(&mut self) -> TickReport {
        let batch = self.queue.drain();
        let lines = batch.len();
        for line in &batch {
            self.router.on_line(line);
        }

        let flow = self.router.flow_mut();
        flow.tick();
        TickReport {
            lines,
            transitions: flow.drain_transitions(),
        }
    }

    /// Ask the analysis process for a frame and enter scanning.
    pub fn trigger_capture(&mut self) -> CaptureOutcome {
        let state = self.state();
        let command = match self.capture.try_fire(state) {
            Ok(command) => command,
            Err(rejected) => {
                debug!(%rejected, "capture rejected");
                return CaptureOutcome::Rejected(rejected);
            }
        };

        if !self.channel.send_command(&command) {
            warn!(command = %command, "capture command not delivered");
            return CaptureOutcome::Undelivered;
        }
        self.router.begin_scan();
        CaptureOutcome::Started
    }

    /// Audio length of the message being read out
    pub fn set_message_duration(&mut self, seconds: f64) {
        self.router.flow_mut().set_message_duration(seconds);
    }

    /// Stop the analysis process. Later calls are no-ops.
    pub fn shutdown(&mut self) -> ShutdownOutcome {
        if self.stopped {
            return ShutdownOutcome::NotRunning;
        }
        self.stopped = true;
        let outcome = self.channel.shutdown(self.grace_period);
        info!(?outcome, "kiosk shut down");
        outcome
    }
}

impl Drop for Kiosk {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::queue::RawLine;
    use crate::sinks::{Recorder, SinkEvent};
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Records commands instead of writing to a process
    #[derive(Clone, Default)]
    struct FakeChannel {
        sent: Arc<Mutex<Vec<String>>>,
        shutdowns: Arc<Mutex<u32>>,
        accept: bool,
    }

    impl CommandChannel for FakeChannel {
        fn send_command(&mut self, text: &str) -> bool {
            self.sent.lock().push(text.to_string());
            self.accept
        }

        fn shutdown(&mut self, _grace: Duration) -> ShutdownOutcome {
            *self.shutdowns.lock() += 1;
            ShutdownOutcome::Graceful
        }
    }

    fn kiosk(channel: FakeChannel) -> (Kiosk, Arc<ManualClock>, Recorder) {
        let clock = ManualClock::shared();
        let recorder = Recorder::new();
        let presentation = Presentation {
            phases: Box::new(recorder.clone()),
            consumers: Consumers::uniform(recorder.clone()),
            rune_feed: None,
        };
        let kiosk = Kiosk::new(
            &KioskConfig::default(),
            Box::new(channel),
            LineQueue::new(),
            presentation,
            clock.clone(),
        );
        (kiosk, clock, recorder)
    }

    #[test]
    fn test_capture_sends_command_and_scans() {
        let channel = FakeChannel {
            accept: true,
            ..FakeChannel::default()
        };
        let (mut kiosk, _clock, recorder) = kiosk(channel.clone());

        assert_eq!(kiosk.trigger_capture(), CaptureOutcome::Started);
        assert_eq!(kiosk.state(), FlowState::Scanning);
        assert_eq!(*channel.sent.lock(), vec!["CAPTURE 0".to_string()]);
        assert!(recorder.events().contains(&SinkEvent::ShowScanning));

        assert!(matches!(
            kiosk.trigger_capture(),
            CaptureOutcome::Rejected(CaptureRejected::Busy(FlowState::Scanning))
        ));
    }

    #[test]
    fn test_undelivered_capture_stays_waiting() {
        let (mut kiosk, _clock, _recorder) = kiosk(FakeChannel::default());
        assert_eq!(kiosk.trigger_capture(), CaptureOutcome::Undelivered);
        assert_eq!(kiosk.state(), FlowState::Waiting);
    }

    #[test]
    fn test_tick_drains_queue_and_reports() {
        let (mut kiosk, clock, _recorder) = kiosk(FakeChannel::default());
        let queue = kiosk.queue().clone();
        queue.push(RawLine::new("[[CAPTURE_DONE]]"));
        queue.push(RawLine::new(
            r#"POST https://api.deepseek.com/chat "HTTP/1.1 200 OK""#,
        ));
        queue.push(RawLine::new("[[MESSAGE]] Hello"));

        let report = kiosk.tick();
        assert_eq!(report.lines, 3);
        let states: Vec<_> = report.transitions.iter().map(|t| t.to).collect();
        assert_eq!(
            states,
            vec![FlowState::Scanning, FlowState::ScanComplete, FlowState::Message]
        );
        assert!(queue.is_empty());

        kiosk.set_message_duration(1.0);
        clock.advance_secs(3.0);
        let report = kiosk.tick();
        assert_eq!(report.transitions.len(), 1);
        assert_eq!(kiosk.state(), FlowState::End);
    }

    #[test]
    fn test_shutdown_once() {
        let channel = FakeChannel::default();
        let (mut kiosk, _clock, _recorder) = kiosk(channel.clone());
        assert_eq!(kiosk.shutdown(), ShutdownOutcome::Graceful);
        assert_eq!(kiosk.shutdown(), ShutdownOutcome::NotRunning);
        drop(kiosk);
        assert_eq!(*channel.shutdowns.lock(), 1);
    }
}
