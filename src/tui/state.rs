//! View state - Domain Layer
//!
//! `KioskView` is what the core writes into (through [`ViewSink`]) and what
//! the widgets read. `AppState` holds the dashboard's own bookkeeping.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::archive::ArchiveEntry;
use crate::flow::{Cause, FlowState, Transition};
use crate::sinks::{
    ItemContent, MessageArchive, MessageDisplay, PhasePresenter, RuneFeed, ScanPhase, ScanProgress,
    StatusConsole,
};

/// Typewriter reveal speed, characters per second
pub const TYPEWRITER_CPS: f32 = 30.0;

// ─────────────────────────────────────────────────────────────────────────────
// Kiosk View
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct KioskView {
    pub phase: FlowState,
    pub credit: String,
    pub message: String,
    pub typewriter_start: Option<Instant>,
    pub rune: String,
    pub status: String,
    pub scan_phase: Option<ScanPhase>,
    pub tokens: Option<u32>,
    pub item: Option<String>,
    pub archive: VecDeque<ArchiveEntry>,
    pub max_archive: usize,
}

impl Default for KioskView {
    fn default() -> Self {
        Self {
            phase: FlowState::Waiting,
            credit: String::new(),
            message: String::new(),
            typewriter_start: None,
            rune: String::new(),
            status: String::new(),
            scan_phase: None,
            tokens: None,
            item: None,
            archive: VecDeque::new(),
            max_archive: 50,
        }
    }
}

impl KioskView {
    /// Part of the message revealed so far
    pub fn revealed(&self, now: Instant) -> &str {
        let Some(start) = self.typewriter_start else {
            return &self.message;
        };
        let chars = (now.saturating_duration_since(start).as_secs_f32() * TYPEWRITER_CPS) as usize;
        match self.message.char_indices().nth(chars) {
            Some((idx, _)) => &self.message[..idx],
            None => &self.message,
        }
    }

    /// Seed the archive panel from the side file
    pub fn load_history(&mut self, entries: Vec<ArchiveEntry>) {
        for entry in entries.into_iter().rev().take(self.max_archive) {
            self.archive.push_back(entry);
        }
    }

    fn push_archive(&mut self, entry: ArchiveEntry) {
        self.archive.push_front(entry);
        if self.archive.len() > self.max_archive {
            self.archive.pop_back();
        }
    }
}

pub type SharedView = Arc<Mutex<KioskView>>;

/// Writes collaborator calls into the shared view
#[derive(Debug, Clone)]
pub struct ViewSink {
    view: SharedView,
}

impl ViewSink {
    pub fn new(view: SharedView) -> Self {
        Self { view }
    }
}

impl PhasePresenter for ViewSink {
    fn show_waiting(&mut self) {
        let mut view = self.view.lock();
        view.phase = FlowState::Waiting;
        view.scan_phase = None;
        view.tokens = None;
    }

    fn show_scanning(&mut self) {
        self.view.lock().phase = FlowState::Scanning;
    }

    fn show_scan_complete(&mut self) {
        self.view.lock().phase = FlowState::ScanComplete;
    }

    fn show_message(&mut self) {
        let mut view = self.view.lock();
        view.phase = FlowState::Message;
        view.typewriter_start = None;
    }

    fn start_typewriter(&mut self) {
        self.view.lock().typewriter_start = Some(Instant::now());
    }

    fn show_end(&mut self) {
        self.view.lock().phase = FlowState::End;
    }
}

impl MessageDisplay for ViewSink {
    fn set_credit(&mut self, credit: &str) {
        self.view.lock().credit = credit.to_string();
    }

    fn receive_message(&mut self, message: &str) {
        self.view.lock().message = message.to_string();
    }
}

impl RuneFeed for ViewSink {
    fn set_message(&mut self, text: &str) {
        self.view.lock().rune = text.to_string();
    }
}

impl StatusConsole for ViewSink {
    fn set_status(&mut self, line: &str) {
        self.view.lock().status = line.to_string();
    }

    /// Only the newest entry is highlighted; the panel keeps history
    fn clear_archive(&mut self) {}

    fn add_log_entry(&mut self, message: &str, credit: &str) {
        self.view.lock().push_archive(ArchiveEntry {
            message: message.to_string(),
            credit: credit.to_string(),
        });
    }
}

impl ScanProgress for ViewSink {
    fn show_phase(&mut self, phase: ScanPhase) {
        self.view.lock().scan_phase = Some(phase);
    }

    fn set_token_count(&mut self, tokens: u32) {
        self.view.lock().tokens = Some(tokens);
    }
}

impl ItemContent for ViewSink {
    fn item_identified(&mut self, item: &str) {
        self.view.lock().item = Some(item.to_string());
    }
}

/// Durable storage is the host's `MessageLog`; the panel is fed by
/// `add_log_entry`
impl MessageArchive for ViewSink {
    fn append(&mut self, _message: &str, _credit: &str) {}
}

// ─────────────────────────────────────────────────────────────────────────────
// App State
// ─────────────────────────────────────────────────────────────────────────────

/// Dashboard bookkeeping
#[derive(Debug)]
pub struct AppState {
    pub start_time: Instant,
    pub elapsed: Duration,
    pub lines_routed: u64,

    // Activity log
    pub events: VecDeque<ActivityEvent>,
    pub max_events: usize,

    // UI state
    pub show_help: bool,
    pub should_quit: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            start_time: Instant::now(),
            elapsed: Duration::ZERO,
            lines_routed: 0,
            events: VecDeque::new(),
            max_events: 100,
            show_help: false,
            should_quit: false,
        }
    }
}

impl AppState {
    /// Add an activity event
    pub fn push_event(&mut self, event: ActivityEvent) {
        self.events.push_front(event);
        if self.events.len() > self.max_events {
            self.events.pop_back();
        }
    }

    /// Update elapsed time
    pub fn tick(&mut self) {
        self.elapsed = self.start_time.elapsed();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Activity Events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ActivityEvent {
    pub timestamp: Instant,
    pub event_type: ActivityEventType,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityEventType {
    Info,
    Transition,
    Capture,
    Warning,
    Error,
}

impl ActivityEvent {
    fn new(event_type: ActivityEventType, message: impl Into<String>) -> Self {
        Self {
            timestamp: Instant::now(),
            event_type,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(ActivityEventType::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(ActivityEventType::Warning, message)
    }

    pub fn capture(message: impl Into<String>) -> Self {
        Self::new(ActivityEventType::Capture, message)
    }

    pub fn transition(transition: &Transition) -> Self {
        let event_type = match transition.cause {
            Cause::Error(_) | Cause::ScanTimeout => ActivityEventType::Error,
            _ => ActivityEventType::Transition,
        };
        Self::new(event_type, transition.to_string())
    }

    pub fn icon(&self) -> &'static str {
        match self.event_type {
            ActivityEventType::Info => "ℹ",
            ActivityEventType::Transition => "→",
            ActivityEventType::Capture => "◉",
            ActivityEventType::Warning => "⚠",
            ActivityEventType::Error => "✗",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typewriter_reveals_gradually() {
        let mut view = KioskView {
            message: "héllo world".to_string(),
            ..KioskView::default()
        };
        let start = Instant::now();
        view.typewriter_start = Some(start);

        assert_eq!(view.revealed(start), "");
        // 30 cps: 110ms reveals 3 characters, multibyte-safe
        assert_eq!(view.revealed(start + Duration::from_millis(110)), "hél");
        assert_eq!(view.revealed(start + Duration::from_secs(5)), "héllo world");
    }

    #[test]
    fn test_sink_updates_view() {
        let view: SharedView = Arc::new(Mutex::new(KioskView::default()));
        let mut sink = ViewSink::new(view.clone());

        sink.show_scanning();
        sink.show_phase(ScanPhase::Analyzing);
        sink.set_credit("by Aria｜Test");
        sink.add_log_entry("Hi", "by Aria｜Test");

        let view = view.lock();
        assert_eq!(view.phase, FlowState::Scanning);
        assert_eq!(view.scan_phase, Some(ScanPhase::Analyzing));
        assert_eq!(view.credit, "by Aria｜Test");
        assert_eq!(view.archive.front().map(|e| e.message.as_str()), Some("Hi"));
    }

    #[test]
    fn test_sink_backs_every_consumer() {
        let view: SharedView = Arc::new(Mutex::new(KioskView::default()));
        let mut consumers = crate::sinks::Consumers::uniform(ViewSink::new(view.clone()));

        consumers.status.add_log_entry("Hi", "by Aria｜Test");
        consumers.archive.append("Hi", "by Aria｜Test");
        consumers.items.item_identified("fan");

        let view = view.lock();
        assert_eq!(view.archive.len(), 1);
        assert_eq!(view.item.as_deref(), Some("fan"));
    }

    #[test]
    fn test_event_log_is_bounded() {
        let mut state = AppState {
            max_events: 2,
            ..AppState::default()
        };
        state.push_event(ActivityEvent::info("a"));
        state.push_event(ActivityEvent::info("b"));
        state.push_event(ActivityEvent::info("c"));
        assert_eq!(state.events.len(), 2);
        assert_eq!(state.events[0].message, "c");
    }

    #[test]
    fn test_error_transition_is_flagged() {
        let event = ActivityEvent::transition(&Transition {
            from: FlowState::Scanning,
            to: FlowState::Waiting,
            cause: Cause::Error("HTTP 500".into()),
        });
        assert_eq!(event.event_type, ActivityEventType::Error);
    }
}
