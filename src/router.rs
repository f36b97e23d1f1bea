//! Protocol router
//!
//! Turns each stdout line of the analysis process into session updates,
//! consumer calls and flow notifications. Runs on the tick thread only, holds
//! no timers and never blocks.

use tracing::{debug, error, info, warn};

use crate::config::RouterConfig;
use crate::flow::{FlowState, FlowStateMachine, Transition};
use crate::protocol::{self, ProtocolTag};
use crate::queue::RawLine;
use crate::sinks::{Consumers, RuneFeed, ScanPhase};

/// Per-interaction accumulator, reset whenever a new scan actually starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    character: Option<String>,
    /// Credit body as received, before the character prefix
    raw_credit: Option<String>,
    credit: String,
    message: String,
    scan_phase: Option<ScanPhase>,
    tokens: Option<u32>,
    item: Option<String>,
}

impl Session {
    pub fn character(&self) -> Option<&str> {
        self.character.as_deref()
    }

    /// Displayed credit
    pub fn credit(&self) -> &str {
        &self.credit
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn scan_phase(&self) -> Option<ScanPhase> {
        self.scan_phase
    }

    pub fn tokens(&self) -> Option<u32> {
        self.tokens
    }

    pub fn item(&self) -> Option<&str> {
        self.item.as_deref()
    }

    fn set_credit_body(&mut self, body: String) -> &str {
        self.raw_credit = Some(body);
        self.recompose();
        &self.credit
    }

    /// Returns the recomposed credit when one was already set
    fn set_character(&mut self, name: String) -> Option<&str> {
        self.character = if name.is_empty() { None } else { Some(name) };
        if self.raw_credit.is_some() {
            self.recompose();
            Some(self.credit.as_str())
        } else {
            None
        }
    }

    fn recompose(&mut self) {
        if let Some(body) = &self.raw_credit {
            self.credit = protocol::compose_credit(self.character.as_deref(), body);
        }
    }

    /// Move the progress indicator forward; never backwards
    fn advance(&mut self, phase: ScanPhase) -> bool {
        if self.scan_phase.map_or(true, |current| phase > current) {
            self.scan_phase = Some(phase);
            true
        } else {
            false
        }
    }
}

/// Routing counters, surfaced in the host status bar
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterStats {
    pub lines: u64,
    pub messages: u64,
    pub api_errors: u64,
}

pub struct ProtocolRouter {
    config: RouterConfig,
    flow: FlowStateMachine,
    consumers: Consumers,
    rune_feed: Option<Box<dyn RuneFeed>>,
    /// Latest rune text that arrived with no feed attached
    pending_rune: Option<String>,
    session: Session,
    stats: RouterStats,
}

impl ProtocolRouter {
    pub fn new(config: RouterConfig, flow: FlowStateMachine, consumers: Consumers) -> Self {
        Self {
            config,
            flow,
            consumers,
            rune_feed: None,
            pending_rune: None,
            session: Session::default(),
            stats: RouterStats::default(),
        }
    }

    pub fn flow(&self) -> &FlowStateMachine {
        &self.flow
    }

    pub fn flow_mut(&mut self) -> &mut FlowStateMachine {
        &mut self.flow
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn stats(&self) -> RouterStats {
        self.stats
    }

    pub fn has_pending_rune(&self) -> bool {
        self.pending_rune.is_some()
    }

    /// Attach the particle feed; a message buffered while detached is
    /// delivered right away.
    pub fn attach_rune_feed(&mut self, mut feed: Box<dyn RuneFeed>) {
        if let Some(text) = self.pending_rune.take() {
            debug!("flushing buffered rune text");
            feed.set_message(&text);
        }
        self.rune_feed = Some(feed);
    }

    pub fn detach_rune_feed(&mut self) -> Option<Box<dyn RuneFeed>> {
        self.rune_feed.take()
    }

    /// Route one line. Returns the tag it was classified as.
    pub fn on_line(&mut self, line: &RawLine) -> ProtocolTag {
        let text = line.text();
        self.stats.lines += 1;

        if self.config.broadcast_all_lines && !text.trim().is_empty() {
            self.feed_rune(text);
        }

        let tag = protocol::classify(text, &self.config.api_host);
        debug!(%tag, line = text, "routing line");

        match tag {
            ProtocolTag::CaptureDone | ProtocolTag::ScanStart => {
                self.consumers.status.set_status(text);
                self.begin_scan();
            }
            ProtocolTag::OllamaStart => self.advance_progress(ScanPhase::Analyzing),
            ProtocolTag::OllamaProgress => {
                self.advance_progress(ScanPhase::Analyzing);
                if let Some(tokens) = protocol::progress_tokens(text) {
                    self.session.tokens = Some(tokens);
                    self.consumers.progress.set_token_count(tokens);
                }
            }
            ProtocolTag::OllamaDone | ProtocolTag::VendorProgress => {
                self.advance_progress(ScanPhase::Generating)
            }
            ProtocolTag::Character => {
                let name = protocol::character_body(text);
                if let Some(credit) = self.session.set_character(name) {
                    self.consumers.message.set_credit(credit);
                }
            }
            ProtocolTag::Credit => {
                let credit = self.session.set_credit_body(protocol::credit_body(text));
                self.consumers.message.set_credit(credit);
            }
            ProtocolTag::Message => self.handle_message(text),
            ProtocolTag::ItemIdentified => {
                let item = protocol::item_body(text);
                if !item.is_empty() {
                    self.consumers.items.item_identified(&item);
                    self.session.item = Some(item);
                }
            }
            ProtocolTag::ExternalApiResponse { status } if tag.is_api_success() => {
                debug!(status, "analysis API answered");
                self.consumers.status.set_status(text);
                self.flow.notify_scan_complete();
                self.refresh_rune();
            }
            ProtocolTag::ExternalApiResponse { status } => {
                self.stats.api_errors += 1;
                warn!(status, "analysis API failed");
                self.consumers.status.set_status(&format!("[API Error] {}", text));
                self.flow.notify_error(&format!("HTTP {}", status));
            }
            ProtocolTag::Other => {
                if self.flow.is_in_scanning_phase() && !text.trim().is_empty() {
                    self.consumers.status.set_status(text);
                }
            }
        }

        tag
    }

    /// Enter `Scanning` if the flow is idle; the session is reset only when
    /// the flow actually moved.
    pub fn begin_scan(&mut self) -> Option<Transition> {
        let transition = self.flow.notify_scan_start()?;
        self.session = Session::default();
        self.session.advance(ScanPhase::Capturing);
        self.consumers.progress.show_phase(ScanPhase::Capturing);
        Some(transition)
    }

    /// The analysis process could not be started or died
    pub fn on_process_error(&mut self, reason: &str) -> Transition {
        error!(reason, "analysis process error");
        self.consumers
            .status
            .set_status(&format!("[Process Error] {}", reason));
        self.flow.notify_error(reason)
    }

    fn handle_message(&mut self, text: &str) {
        let message = protocol::message_body(text);
        if message.is_empty() {
            debug!("empty message ignored");
            return;
        }

        self.stats.messages += 1;
        self.consumers.message.receive_message(&message);
        self.feed_rune(&message);
        self.session.message = message;

        if self.flow.notify_message_ready().is_some() {
            let credit = self.session.credit.clone();
            let message = self.session.message.clone();
            self.consumers.status.clear_archive();
            self.consumers.status.add_log_entry(&message, &credit);
            self.consumers.archive.append(&message, &credit);
            info!(chars = message.chars().count(), "message delivered");
        } else {
            debug!(state = %self.flow.state(), "message outside a scan, not archived");
        }
    }

    fn advance_progress(&mut self, phase: ScanPhase) {
        if !self.flow.is_in_scanning_phase() {
            debug!(phase = phase.label(), "progress outside scanning ignored");
            return;
        }
        if self.session.advance(phase) {
            self.consumers.progress.show_phase(phase);
        }
    }

    fn feed_rune(&mut self, text: &str) {
        match self.rune_feed.as_mut() {
            Some(feed) => feed.set_message(text),
            None => self.pending_rune = Some(text.to_string()),
        }
    }

    /// Push the current message again once the API confirmed the scan
    fn refresh_rune(&mut self) {
        let Some(feed) = self.rune_feed.as_mut() else {
            return;
        };
        let text = self
            .pending_rune
            .take()
            .unwrap_or_else(|| self.session.message.clone());
        if !text.is_empty() {
            feed.set_message(&text);
        }
    }

    pub fn state(&self) -> FlowState {
        self.flow.state()
    }
}
