//! Transcript replay
//!
//! Feeds a recorded (or hand-written) stdout transcript through the real
//! router and state machine on a [`ManualClock`], so an interaction can be
//! inspected without a camera or a Python process.
//!
//! Transcript format: one protocol line per line, plus directives:
//!
//! ```text
//! #wait 12.5          advance logical time, ticking as the host would
//! #duration 4.2       report the audio length of the current message
//! #capture            press the capture button
//! #error <reason>     simulate a process failure
//! # free text         comment
//! ```

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use crate::clock::{Clock, ManualClock};
use crate::config::KioskConfig;
use crate::error::{KioskError, Result};
use crate::flow::{FlowState, Transition};
use crate::kiosk::{CaptureOutcome, Kiosk, Presentation};
use crate::queue::{LineQueue, RawLine};
use crate::sinks::{Consumers, Recorder, SinkEvent};
use crate::supervisor::{CommandChannel, ShutdownOutcome};

#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    Wait(f64),
    Duration(f64),
    Capture,
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Protocol(String),
    Directive(Directive),
}

/// Parse a transcript; blank lines and comments are dropped.
pub fn parse_transcript(text: &str) -> Result<Vec<(usize, Entry)>> {
    let mut entries = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim_end();
        if line.trim().is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix('#') {
            if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                continue;
            }
            entries.push((line_no, Entry::Directive(parse_directive(line_no, rest)?)));
        } else {
            entries.push((line_no, Entry::Protocol(line.to_string())));
        }
    }
    Ok(entries)
}

fn parse_directive(line: usize, body: &str) -> Result<Directive> {
    let (name, arg) = match body.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (body, ""),
    };

    let seconds = |what: &str| -> Result<f64> {
        arg.parse::<f64>()
            .ok()
            .filter(|s| s.is_finite() && *s >= 0.0)
            .ok_or_else(|| KioskError::BadDirective {
                line,
                details: format!("#{} needs a non-negative number of seconds, got '{}'", what, arg),
            })
    };

    match name {
        "wait" => Ok(Directive::Wait(seconds("wait")?)),
        "duration" => Ok(Directive::Duration(seconds("duration")?)),
        "capture" => Ok(Directive::Capture),
        "error" => Ok(Directive::Error(if arg.is_empty() {
            "simulated error".to_string()
        } else {
            arg.to_string()
        })),
        other => Err(KioskError::BadDirective {
            line,
            details: format!("unknown directive '#{}'", other),
        }),
    }
}

/// A transition stamped with logical time since the replay started
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedTransition {
    pub at: Duration,
    pub transition: Transition,
}

#[derive(Debug, Clone)]
pub struct ReplayReport {
    pub transitions: Vec<TimedTransition>,
    pub events: Vec<SinkEvent>,
    pub commands: Vec<String>,
    pub final_state: FlowState,
    pub credit: String,
    pub message: String,
}

impl ReplayReport {
    pub fn states(&self) -> Vec<FlowState> {
        let mut states = vec![FlowState::Waiting];
        states.extend(self.transitions.iter().map(|t| t.transition.to));
        states
    }
}

/// Stands in for the process: records commands, always delivers
#[derive(Debug, Clone, Default)]
struct TranscriptChannel {
    commands: Arc<Mutex<Vec<String>>>,
}

impl CommandChannel for TranscriptChannel {
    fn send_command(&mut self, text: &str) -> bool {
        debug!(command = text, "replay command");
        self.commands.lock().push(text.to_string());
        true
    }

    fn shutdown(&mut self, _grace: Duration) -> ShutdownOutcome {
        ShutdownOutcome::NotRunning
    }
}

pub struct Replay {
    kiosk: Kiosk,
    queue: LineQueue,
    clock: Arc<ManualClock>,
    recorder: Recorder,
    channel: TranscriptChannel,
    step: Duration,
    transitions: Vec<TimedTransition>,
}

impl Replay {
    pub fn new(config: &KioskConfig) -> Self {
        let clock = ManualClock::shared();
        let recorder = Recorder::new();
        let channel = TranscriptChannel::default();
        let queue = LineQueue::new();
        let presentation = Presentation {
            phases: Box::new(recorder.clone()),
            consumers: Consumers::uniform(recorder.clone()),
            rune_feed: Some(Box::new(recorder.clone())),
        };
        let kiosk = Kiosk::new(
            config,
            Box::new(channel.clone()),
            queue.clone(),
            presentation,
            clock.clone(),
        );

        Self {
            kiosk,
            queue,
            clock,
            recorder,
            channel,
            step: config.tick_period(),
            transitions: Vec::new(),
        }
    }

    pub fn kiosk(&self) -> &Kiosk {
        &self.kiosk
    }

    pub fn apply(&mut self, entry: &Entry) {
        match entry {
            Entry::Protocol(line) => {
                self.queue.push(RawLine::at(line.as_str(), self.clock.now()));
                self.tick();
            }
            Entry::Directive(Directive::Wait(secs)) => self.wait(*secs),
            Entry::Directive(Directive::Duration(secs)) => {
                self.kiosk.set_message_duration(*secs);
            }
            Entry::Directive(Directive::Capture) => {
                if let CaptureOutcome::Rejected(reason) = self.kiosk.trigger_capture() {
                    debug!(%reason, "replayed capture rejected");
                }
                self.collect(Vec::new());
            }
            Entry::Directive(Directive::Error(reason)) => {
                self.kiosk.router_mut().on_process_error(reason);
                self.tick();
            }
        }
    }

    /// Advance logical time in host-sized ticks
    pub fn wait(&mut self, secs: f64) {
        let mut left = Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO);
        while !left.is_zero() {
            let step = self.step.min(left);
            self.clock.advance(step);
            left -= step;
            self.tick();
        }
    }

    fn tick(&mut self) {
        let report = self.kiosk.tick();
        self.collect(report.transitions);
    }

    fn collect(&mut self, transitions: Vec<Transition>) {
        let at = self.clock.elapsed();
        // trigger_capture transitions are still in the journal
        let mut all = transitions;
        all.extend(self.kiosk.router_mut().flow_mut().drain_transitions());
        self.transitions
            .extend(all.into_iter().map(|transition| TimedTransition { at, transition }));
    }

    pub fn finish(mut self) -> ReplayReport {
        self.tick();
        let session = self.kiosk.router().session();
        ReplayReport {
            final_state: self.kiosk.state(),
            credit: session.credit().to_string(),
            message: session.message().to_string(),
            transitions: std::mem::take(&mut self.transitions),
            events: self.recorder.events(),
            commands: self.channel.commands.lock().clone(),
        }
    }
}

/// Run a whole transcript
pub fn run(config: &KioskConfig, transcript: &str) -> Result<ReplayReport> {
    let entries = parse_transcript(transcript)?;
    let mut replay = Replay::new(config);
    for (_, entry) in &entries {
        replay.apply(entry);
    }
    Ok(replay.finish())
}
