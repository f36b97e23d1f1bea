//! Headless host
//!
//! Runs the kiosk without a terminal UI: presentation goes to the log, the
//! tick is a tokio interval, and a line on stdin stands in for the capture
//! button (`c` or an empty line captures, `q` quits).

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::archive::MessageLog;
use crate::clock::SystemClock;
use crate::config::KioskConfig;
use crate::kiosk::{CaptureOutcome, Kiosk, Presentation};
use crate::sinks::{
    Consumers, ItemContent, MessageArchive, MessageDisplay, PhasePresenter, RuneFeed, ScanPhase,
    ScanProgress, StatusConsole,
};

/// Presentation that writes everything to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogPresenter;

impl PhasePresenter for LogPresenter {
    fn show_waiting(&mut self) {
        info!(target: "view", "waiting for a visitor");
    }
    fn show_scanning(&mut self) {
        info!(target: "view", "scanning");
    }
    fn show_scan_complete(&mut self) {
        info!(target: "view", "scan complete");
    }
    fn show_message(&mut self) {
        info!(target: "view", "message");
    }
    fn start_typewriter(&mut self) {}
    fn show_end(&mut self) {
        info!(target: "view", "thank you");
    }
}

impl MessageDisplay for LogPresenter {
    fn set_credit(&mut self, credit: &str) {
        info!(target: "view", credit, "credit");
    }
    fn receive_message(&mut self, message: &str) {
        info!(target: "view", message, "message received");
    }
}

impl RuneFeed for LogPresenter {
    fn set_message(&mut self, _text: &str) {}
}

impl StatusConsole for LogPresenter {
    fn set_status(&mut self, line: &str) {
        info!(target: "status", "{}", line);
    }
    fn clear_archive(&mut self) {}
    fn add_log_entry(&mut self, _message: &str, _credit: &str) {}
}

impl ScanProgress for LogPresenter {
    fn show_phase(&mut self, phase: ScanPhase) {
        info!(target: "view", phase = phase.label(), step = phase.index(), "scan progress");
    }
    fn set_token_count(&mut self, _tokens: u32) {}
}

impl ItemContent for LogPresenter {
    fn item_identified(&mut self, item: &str) {
        info!(target: "view", item, "item identified");
    }
}

impl MessageArchive for LogPresenter {
    fn append(&mut self, _message: &str, _credit: &str) {}
}

/// Run until ctrl-c or `q` on stdin.
pub async fn run(config: KioskConfig) -> anyhow::Result<()> {
    let archive = MessageLog::open(&config.storage.message_log)?;
    let presentation = Presentation {
        phases: Box::new(LogPresenter),
        consumers: Consumers::uniform(LogPresenter).with_archive(Box::new(archive)),
        rune_feed: None,
    };
    let mut kiosk = Kiosk::launch(&config, presentation, SystemClock::shared());

    let mut ticker = interval(config.tick_period());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut input_open = true;

    info!("headless kiosk running (Enter = capture, q = quit)");
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                kiosk.tick();
            }
            line = input.next_line(), if input_open => {
                match line {
                    Ok(Some(line)) => match line.trim() {
                        "" | "c" | "capture" => log_capture(kiosk.trigger_capture()),
                        "q" | "quit" => break,
                        other => warn!(input = other, "unknown command"),
                    },
                    Ok(None) => input_open = false,
                    Err(e) => {
                        warn!(error = %e, "stdin unreadable, capture input disabled");
                        input_open = false;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    kiosk.shutdown();
    Ok(())
}

fn log_capture(outcome: CaptureOutcome) {
    match outcome {
        CaptureOutcome::Started => info!("capture requested"),
        CaptureOutcome::Rejected(reason) => info!(%reason, "capture ignored"),
        CaptureOutcome::Undelivered => warn!("capture could not reach the analysis process"),
    }
}
