//! TUI Application - Main entry point and run loop

use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use parking_lot::Mutex;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame, Terminal,
};
use tracing::warn;

use super::events::{handle_key_event, poll_event, Action};
use super::state::{ActivityEvent, ActivityEventType, AppState, KioskView, SharedView, ViewSink};
use super::theme::{icons, HyperspaceTheme};
use super::widgets::utils::{format_duration, progress_bar, truncate};
use crate::archive::{self, MessageLog};
use crate::clock::SystemClock;
use crate::config::KioskConfig;
use crate::flow::FlowState;
use crate::kiosk::{CaptureOutcome, Kiosk, Presentation};
use crate::sinks::{Consumers, ScanPhase};

/// TUI Application
pub struct TuiApp {
    state: AppState,
    theme: HyperspaceTheme,
    view: SharedView,
    kiosk: Kiosk,
    tick_rate: Duration,
}

impl TuiApp {
    /// Start the analysis process and build the dashboard around it
    pub fn new(config: &KioskConfig) -> anyhow::Result<Self> {
        let view: SharedView = Arc::new(Mutex::new(KioskView::default()));

        match archive::read_history(&config.storage.message_log) {
            Ok(entries) => view.lock().load_history(entries),
            Err(e) => warn!(error = %e, "could not read message history"),
        }

        let sink = ViewSink::new(view.clone());
        let log = MessageLog::open(&config.storage.message_log)?;
        let presentation = Presentation {
            phases: Box::new(sink.clone()),
            consumers: Consumers::uniform(sink.clone()).with_archive(Box::new(log)),
            rune_feed: Some(Box::new(sink)),
        };
        let kiosk = Kiosk::launch(config, presentation, SystemClock::shared());

        Ok(Self {
            state: AppState::default(),
            theme: HyperspaceTheme::new(),
            view,
            kiosk,
            tick_rate: config.tick_period(),
        })
    }

    /// Run the TUI application
    pub async fn run(mut self) -> anyhow::Result<()> {
        let mut terminal = self.setup_terminal()?;

        self.state
            .push_event(ActivityEvent::info("Kiosk started"));
        self.state
            .push_event(ActivityEvent::info("Press Space to scan, 'q' to quit"));

        let result = self.main_loop(&mut terminal).await;

        self.restore_terminal(&mut terminal)?;
        self.kiosk.shutdown();

        result
    }

    /// Setup terminal for TUI
    fn setup_terminal(&self) -> anyhow::Result<Terminal<CrosstermBackend<Stdout>>> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;
        Ok(terminal)
    }

    /// Restore terminal to normal state
    fn restore_terminal(
        &self,
        terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    ) -> anyhow::Result<()> {
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;
        Ok(())
    }

    /// Main event loop
    async fn main_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    ) -> anyhow::Result<()> {
        loop {
            self.state.tick();

            let report = self.kiosk.tick();
            self.state.lines_routed += report.lines as u64;
            for transition in &report.transitions {
                self.state.push_event(ActivityEvent::transition(transition));
            }

            terminal.draw(|frame| self.render(frame))?;

            if let Some(key) = poll_event(self.tick_rate)? {
                match handle_key_event(key, &mut self.state) {
                    Action::Quit => self.state.should_quit = true,
                    Action::Capture => self.capture(),
                    Action::Help | Action::None => {}
                }
            }

            if self.state.should_quit {
                break;
            }
        }

        Ok(())
    }

    fn capture(&mut self) {
        let event = match self.kiosk.trigger_capture() {
            CaptureOutcome::Started => ActivityEvent::capture("Capture requested"),
            CaptureOutcome::Rejected(reason) => {
                ActivityEvent::info(format!("Capture ignored: {}", reason))
            }
            CaptureOutcome::Undelivered => {
                ActivityEvent::warning("Capture could not reach the analysis process")
            }
        };
        self.state.push_event(event);
    }

    // ── Rendering ─────────────────────────────────────────────────────────────

    fn render(&self, frame: &mut Frame) {
        let area = frame.area();
        let view = self.view.lock();

        let main_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Min(10),   // Stage + side panels
                Constraint::Length(8), // Activity
                Constraint::Length(1), // Footer
            ])
            .split(area);

        self.render_header(frame, main_chunks[0], &view);

        let content_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
            .split(main_chunks[1]);

        self.render_stage(frame, content_chunks[0], &view);

        let side_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(7), Constraint::Min(4)])
            .split(content_chunks[1]);

        self.render_status(frame, side_chunks[0], &view);
        self.render_archive(frame, side_chunks[1], &view);

        self.render_activity(frame, main_chunks[2]);
        self.render_footer(frame, main_chunks[3]);

        if self.state.show_help {
            self.render_help(frame, area);
        }
    }

    fn render_header(&self, frame: &mut Frame, area: Rect, view: &KioskView) {
        let header = Line::from(vec![
            Span::styled(
                format!("{} KIOSK v{}", icons::KIOSK, env!("CARGO_PKG_VERSION")),
                self.theme.header(),
            ),
            Span::raw("  │  "),
            Span::styled(
                format!("{} {}", icons::phase(view.phase), view.phase).to_uppercase(),
                self.theme.phase_border(view.phase),
            ),
            Span::raw("  │  "),
            Span::styled(
                format!("⏱ {}", format_duration(self.state.elapsed.as_secs())),
                self.theme.text(),
            ),
            Span::raw("  │  "),
            Span::styled(format!("{} lines", self.state.lines_routed), self.theme.dimmed()),
            Span::raw("  │  "),
            Span::styled("F1:Help", self.theme.dimmed()),
        ]);

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(self.theme.header())
            .title(" KIOSK ");

        frame.render_widget(Paragraph::new(header).block(block), area);
    }

    /// Main view: one screen per phase
    fn render_stage(&self, frame: &mut Frame, area: Rect, view: &KioskView) {
        let lines = match view.phase {
            FlowState::Waiting => vec![
                Line::from(""),
                Line::from(Span::styled("Place an object and press SPACE", self.theme.highlight())),
            ],
            FlowState::Scanning => self.scan_lines(view),
            FlowState::ScanComplete => {
                let mut lines = self.scan_lines(view);
                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled("Scan complete", self.theme.success())));
                lines
            }
            FlowState::Message => vec![
                Line::from(Span::styled(view.credit.as_str(), self.theme.credit())),
                Line::from(""),
                Line::from(Span::styled(view.revealed(Instant::now()), self.theme.message())),
            ],
            FlowState::End => vec![
                Line::from(""),
                Line::from(Span::styled("Thank you", self.theme.accent())),
            ],
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(self.theme.phase_border(view.phase))
            .title(format!(" {} {} ", icons::phase(view.phase), view.phase).to_uppercase());

        let paragraph = Paragraph::new(lines)
            .block(block)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, area);
    }

    fn scan_lines(&self, view: &KioskView) -> Vec<Line<'static>> {
        let current = view.scan_phase.map(|p| p.index());
        let mut lines = vec![Line::from("")];
        for phase in [ScanPhase::Capturing, ScanPhase::Analyzing, ScanPhase::Generating] {
            lines.push(Line::from(Span::styled(
                format!("{}. {}", phase.index(), phase.label()),
                self.theme.step_style(phase.index(), current),
            )));
        }
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            progress_bar(current.unwrap_or(0) as usize, 3, 24),
            self.theme.accent(),
        )));
        lines
    }

    fn render_status(&self, frame: &mut Frame, area: Rect, view: &KioskView) {
        let width = area.width.saturating_sub(4) as usize;
        let lines = vec![
            Line::from(Span::styled(truncate(&view.status, width), self.theme.text())),
            Line::from(vec![
                Span::styled(format!("{} ", icons::ITEM), self.theme.accent()),
                Span::styled(
                    view.item.clone().unwrap_or_else(|| "-".to_string()),
                    self.theme.text(),
                ),
            ]),
            Line::from(Span::styled(
                view.tokens
                    .map(|t| format!("{} tokens", t))
                    .unwrap_or_default(),
                self.theme.dimmed(),
            )),
            Line::from(Span::styled(truncate(&view.rune, width), self.theme.dimmed())),
        ];

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(self.theme.dimmed())
            .title(" STATUS ");
        frame.render_widget(Paragraph::new(lines).block(block), area);
    }

    fn render_archive(&self, frame: &mut Frame, area: Rect, view: &KioskView) {
        let width = area.width.saturating_sub(4) as usize;
        let lines: Vec<Line> = view
            .archive
            .iter()
            .take(area.height.saturating_sub(2) as usize)
            .enumerate()
            .map(|(i, entry)| {
                let style = if i == 0 {
                    self.theme.accent()
                } else {
                    self.theme.dimmed()
                };
                Line::from(Span::styled(truncate(&entry.message, width), style))
            })
            .collect();

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(self.theme.dimmed())
            .title(" ARCHIVE ");
        frame.render_widget(Paragraph::new(lines).block(block), area);
    }

    fn render_activity(&self, frame: &mut Frame, area: Rect) {
        let events: Vec<Line> = self
            .state
            .events
            .iter()
            .take(area.height.saturating_sub(2) as usize)
            .map(|e| {
                let style = match e.event_type {
                    ActivityEventType::Transition => self.theme.highlight(),
                    ActivityEventType::Capture => self.theme.success(),
                    ActivityEventType::Warning => self.theme.warning(),
                    ActivityEventType::Error => self.theme.error(),
                    ActivityEventType::Info => self.theme.dimmed(),
                };
                Line::from(vec![
                    Span::raw("  "),
                    Span::styled(e.icon(), style),
                    Span::raw(" "),
                    Span::styled(&e.message, self.theme.text()),
                ])
            })
            .collect();

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(self.theme.dimmed())
            .title(" ACTIVITY ");
        frame.render_widget(Paragraph::new(events).block(block), area);
    }

    fn render_footer(&self, frame: &mut Frame, area: Rect) {
        let help = Line::from(vec![
            Span::styled(" [Space]", self.theme.accent()),
            Span::styled(" scan  ", self.theme.dimmed()),
            Span::styled("[q]", self.theme.accent()),
            Span::styled("uit  ", self.theme.dimmed()),
            Span::styled("[F1]", self.theme.accent()),
            Span::styled(" help", self.theme.dimmed()),
        ]);
        frame.render_widget(Paragraph::new(help), area);
    }

    fn render_help(&self, frame: &mut Frame, area: Rect) {
        let popup = centered(area, 44, 9);
        let lines = vec![
            Line::from(""),
            Line::from("  Space / Enter   capture a frame"),
            Line::from("  q / Esc         quit"),
            Line::from("  F1 / ?          toggle this help"),
            Line::from(""),
            Line::from(Span::styled(
                "  Logs go to the file given by --log-file",
                self.theme.dimmed(),
            )),
        ];
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(self.theme.highlight())
            .title(" HELP ");
        frame.render_widget(Clear, popup);
        frame.render_widget(Paragraph::new(lines).block(block), popup);
    }
}

/// Rect of at most `width` x `height` centered in `area`
fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centered_fits_inside() {
        let area = Rect::new(0, 0, 100, 40);
        let popup = centered(area, 44, 9);
        assert_eq!(popup, Rect::new(28, 15, 44, 9));

        let tiny = centered(Rect::new(0, 0, 10, 4), 44, 9);
        assert_eq!(tiny, Rect::new(0, 0, 10, 4));
    }
}
