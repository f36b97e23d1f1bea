//! Presentation contracts
//!
//! The core never renders anything itself. It drives narrow collaborator
//! traits that hosts implement (terminal UI, log output, tests), all injected
//! at construction time.
//!
//! ```text
//! FlowStateMachine ──► PhasePresenter      (which view is on screen)
//! ProtocolRouter   ──► MessageDisplay      (credit + message text)
//!                  ──► RuneFeed            (particle text, attachable later)
//!                  ──► StatusConsole       (sub display: status + archive)
//!                  ──► ScanProgress        (scanning sub-phases)
//!                  ──► ItemContent         (identified item mode)
//!                  ──► MessageArchive      (durable append-only log)
//! ```

use std::sync::Arc;

use parking_lot::Mutex;

// ─────────────────────────────────────────────────────────────────────────────
// Traits
// ─────────────────────────────────────────────────────────────────────────────

/// Switches the main view. Exactly one view is visible at a time.
pub trait PhasePresenter {
    fn show_waiting(&mut self);
    fn show_scanning(&mut self);
    fn show_scan_complete(&mut self);
    fn show_message(&mut self);
    /// Begin revealing the current message
    fn start_typewriter(&mut self);
    fn show_end(&mut self);
}

/// Main message view
pub trait MessageDisplay {
    fn set_credit(&mut self, credit: &str);
    fn receive_message(&mut self, message: &str);
}

/// Particle/rune text effect
pub trait RuneFeed {
    fn set_message(&mut self, text: &str);
}

/// Secondary display: rolling status line plus the archive of past messages
pub trait StatusConsole {
    fn set_status(&mut self, line: &str);
    fn clear_archive(&mut self);
    fn add_log_entry(&mut self, message: &str, credit: &str);
}

/// Scanning sub-phase indicator
pub trait ScanProgress {
    fn show_phase(&mut self, phase: ScanPhase);
    fn set_token_count(&mut self, tokens: u32);
}

/// Secondary content keyed by the identified item
pub trait ItemContent {
    fn item_identified(&mut self, item: &str);
}

/// Durable message history
pub trait MessageArchive {
    fn append(&mut self, message: &str, credit: &str);
}

/// Stage of the analysis while the scanning view is up. Only moves forward
/// within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScanPhase {
    Capturing,
    Analyzing,
    Generating,
}

impl ScanPhase {
    /// 1-based index shown to visitors
    pub fn index(&self) -> u8 {
        match self {
            Self::Capturing => 1,
            Self::Analyzing => 2,
            Self::Generating => 3,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Capturing => "capturing",
            Self::Analyzing => "analyzing",
            Self::Generating => "generating",
        }
    }
}

/// Router-side consumers, bundled for construction
pub struct Consumers {
    pub message: Box<dyn MessageDisplay>,
    pub status: Box<dyn StatusConsole>,
    pub progress: Box<dyn ScanProgress>,
    pub items: Box<dyn ItemContent>,
    pub archive: Box<dyn MessageArchive>,
}

impl Consumers {
    /// Every consumer discards its input
    pub fn silent() -> Self {
        Self::uniform(NullSink)
    }

    /// Use clones of one sink for every consumer
    pub fn uniform<S>(sink: S) -> Self
    where
        S: MessageDisplay + StatusConsole + ScanProgress + ItemContent + MessageArchive + Clone + 'static,
    {
        Self {
            message: Box::new(sink.clone()),
            status: Box::new(sink.clone()),
            progress: Box::new(sink.clone()),
            items: Box::new(sink.clone()),
            archive: Box::new(sink),
        }
    }

    pub fn with_archive(mut self, archive: Box<dyn MessageArchive>) -> Self {
        self.archive = archive;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Null sink
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl PhasePresenter for NullSink {
    fn show_waiting(&mut self) {}
    fn show_scanning(&mut self) {}
    fn show_scan_complete(&mut self) {}
    fn show_message(&mut self) {}
    fn start_typewriter(&mut self) {}
    fn show_end(&mut self) {}
}

impl MessageDisplay for NullSink {
    fn set_credit(&mut self, _credit: &str) {}
    fn receive_message(&mut self, _message: &str) {}
}

impl RuneFeed for NullSink {
    fn set_message(&mut self, _text: &str) {}
}

impl StatusConsole for NullSink {
    fn set_status(&mut self, _line: &str) {}
    fn clear_archive(&mut self) {}
    fn add_log_entry(&mut self, _message: &str, _credit: &str) {}
}

impl ScanProgress for NullSink {
    fn show_phase(&mut self, _phase: ScanPhase) {}
    fn set_token_count(&mut self, _tokens: u32) {}
}

impl ItemContent for NullSink {
    fn item_identified(&mut self, _item: &str) {}
}

impl MessageArchive for NullSink {
    fn append(&mut self, _message: &str, _credit: &str) {}
}

// ─────────────────────────────────────────────────────────────────────────────
// Recorder
// ─────────────────────────────────────────────────────────────────────────────

/// One call made on a collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    ShowWaiting,
    ShowScanning,
    ShowScanComplete,
    ShowMessage,
    Typewriter,
    ShowEnd,
    Credit(String),
    Message(String),
    Rune(String),
    Status(String),
    ClearArchive,
    LogEntry { message: String, credit: String },
    Phase(ScanPhase),
    Tokens(u32),
    Item(String),
    Archived { message: String, credit: String },
}

/// Records every collaborator call in order. Clones share the same log, so one
/// recorder can stand in for all collaborators at once.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<SinkEvent>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: SinkEvent) {
        self.events.lock().push(event);
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().clone()
    }

    /// Remove and return everything recorded so far
    pub fn take(&self) -> Vec<SinkEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Last credit pushed to the message display
    pub fn last_credit(&self) -> Option<String> {
        self.events.lock().iter().rev().find_map(|e| match e {
            SinkEvent::Credit(c) => Some(c.clone()),
            _ => None,
        })
    }

    pub fn count(&self, wanted: &SinkEvent) -> usize {
        self.events.lock().iter().filter(|e| *e == wanted).count()
    }
}

impl PhasePresenter for Recorder {
    fn show_waiting(&mut self) {
        self.push(SinkEvent::ShowWaiting);
    }
    fn show_scanning(&mut self) {
        self.push(SinkEvent::ShowScanning);
    }
    fn show_scan_complete(&mut self) {
        self.push(SinkEvent::ShowScanComplete);
    }
    fn show_message(&mut self) {
        self.push(SinkEvent::ShowMessage);
    }
    fn start_typewriter(&mut self) {
        self.push(SinkEvent::Typewriter);
    }
    fn show_end(&mut self) {
        self.push(SinkEvent::ShowEnd);
    }
}

impl MessageDisplay for Recorder {
    fn set_credit(&mut self, credit: &str) {
        self.push(SinkEvent::Credit(credit.to_string()));
    }
    fn receive_message(&mut self, message: &str) {
        self.push(SinkEvent::Message(message.to_string()));
    }
}

impl RuneFeed for Recorder {
    fn set_message(&mut self, text: &str) {
        self.push(SinkEvent::Rune(text.to_string()));
    }
}

impl StatusConsole for Recorder {
    fn set_status(&mut self, line: &str) {
        self.push(SinkEvent::Status(line.to_string()));
    }
    fn clear_archive(&mut self) {
        self.push(SinkEvent::ClearArchive);
    }
    fn add_log_entry(&mut self, message: &str, credit: &str) {
        self.push(SinkEvent::LogEntry {
            message: message.to_string(),
            credit: credit.to_string(),
        });
    }
}

impl ScanProgress for Recorder {
    fn show_phase(&mut self, phase: ScanPhase) {
        self.push(SinkEvent::Phase(phase));
    }
    fn set_token_count(&mut self, tokens: u32) {
        self.push(SinkEvent::Tokens(tokens));
    }
}

impl ItemContent for Recorder {
    fn item_identified(&mut self, item: &str) {
        self.push(SinkEvent::Item(item.to_string()));
    }
}

impl MessageArchive for Recorder {
    fn append(&mut self, message: &str, credit: &str) {
        self.push(SinkEvent::Archived {
            message: message.to_string(),
            credit: credit.to_string(),
        });
    }
}
