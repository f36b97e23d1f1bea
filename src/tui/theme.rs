//! Hyperspace Theme - Visual Design System
//!
//! Space violet/blue + amber/gold palette, one accent per kiosk phase.

use ratatui::style::{Color, Modifier, Style};

use crate::flow::FlowState;

/// Hyperspace color palette
pub struct HyperspaceTheme {
    // Primary palette
    pub space_violet: Color,
    pub amber_gold: Color,
    pub cyan_teal: Color,
    pub deep_space: Color,
    pub star_white: Color,

    // Status colors
    pub success_green: Color,
    pub warning_orange: Color,
    pub error_red: Color,

    // Dimmed versions
    pub dim_violet: Color,
    pub dim_amber: Color,
    pub dim_cyan: Color,
}

impl Default for HyperspaceTheme {
    fn default() -> Self {
        Self {
            space_violet: Color::Rgb(138, 43, 226), // #8A2BE2
            amber_gold: Color::Rgb(255, 191, 0),    // #FFBF00
            cyan_teal: Color::Rgb(0, 255, 255),     // #00FFFF
            deep_space: Color::Rgb(13, 17, 23),     // #0D1117
            star_white: Color::Rgb(230, 237, 243),  // #E6EDF3

            success_green: Color::Rgb(63, 185, 80),   // #3FB950
            warning_orange: Color::Rgb(210, 153, 34), // #D29922
            error_red: Color::Rgb(248, 81, 73),       // #F85149

            dim_violet: Color::Rgb(88, 28, 143),
            dim_amber: Color::Rgb(153, 115, 0),
            dim_cyan: Color::Rgb(0, 153, 153),
        }
    }
}

impl HyperspaceTheme {
    /// Create a new theme instance
    pub fn new() -> Self {
        Self::default()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Phase Colors
    // ─────────────────────────────────────────────────────────────────────

    /// Accent color for a kiosk phase
    pub fn phase_color(&self, phase: FlowState) -> Color {
        match phase {
            FlowState::Waiting => self.dim_cyan,
            FlowState::Scanning => self.space_violet,
            FlowState::ScanComplete => self.cyan_teal,
            FlowState::Message => self.amber_gold,
            FlowState::End => self.dim_amber,
        }
    }

    /// Border of the main stage, bold while an interaction is running
    pub fn phase_border(&self, phase: FlowState) -> Style {
        let style = Style::default().fg(self.phase_color(phase));
        if phase == FlowState::Waiting {
            style
        } else {
            style.add_modifier(Modifier::BOLD)
        }
    }

    /// Scan step: done, current, or still ahead
    pub fn step_style(&self, step: u8, current: Option<u8>) -> Style {
        match current {
            Some(c) if step < c => self.success(),
            Some(c) if step == c => self.highlight(),
            _ => self.dimmed(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Styles
    // ─────────────────────────────────────────────────────────────────────

    /// Default text style
    pub fn text(&self) -> Style {
        Style::default().fg(self.star_white)
    }

    /// Dimmed text style
    pub fn dimmed(&self) -> Style {
        Style::default().fg(Color::Rgb(128, 128, 128))
    }

    /// Bold header style
    pub fn header(&self) -> Style {
        Style::default()
            .fg(self.space_violet)
            .add_modifier(Modifier::BOLD)
    }

    /// Accent style (amber)
    pub fn accent(&self) -> Style {
        Style::default().fg(self.amber_gold)
    }

    /// Highlight style (cyan)
    pub fn highlight(&self) -> Style {
        Style::default()
            .fg(self.cyan_teal)
            .add_modifier(Modifier::BOLD)
    }

    /// Success style
    pub fn success(&self) -> Style {
        Style::default().fg(self.success_green)
    }

    /// Warning style
    pub fn warning(&self) -> Style {
        Style::default().fg(self.warning_orange)
    }

    /// Error style
    pub fn error(&self) -> Style {
        Style::default()
            .fg(self.error_red)
            .add_modifier(Modifier::BOLD)
    }

    /// Message text on the main stage
    pub fn message(&self) -> Style {
        Style::default()
            .fg(self.star_white)
            .add_modifier(Modifier::BOLD)
    }

    /// Credit line under the message (italic amber)
    pub fn credit(&self) -> Style {
        Style::default()
            .fg(self.amber_gold)
            .add_modifier(Modifier::ITALIC)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Icons and Symbols
// ─────────────────────────────────────────────────────────────────────────────

/// UI Icons used throughout the TUI
pub mod icons {
    use crate::flow::FlowState;

    pub const KIOSK: &str = "◉";
    pub const WAITING: &str = "◎";
    pub const SCANNING: &str = "◌";
    pub const COMPLETE: &str = "◆";
    pub const MESSAGE: &str = "✦";
    pub const END: &str = "○";
    pub const ITEM: &str = "▣";

    pub const BAR_FULL: char = '█';
    pub const BAR_EMPTY: char = '░';

    pub fn phase(phase: FlowState) -> &'static str {
        match phase {
            FlowState::Waiting => WAITING,
            FlowState::Scanning => SCANNING,
            FlowState::ScanComplete => COMPLETE,
            FlowState::Message => MESSAGE,
            FlowState::End => END,
        }
    }
}
