//! TUI Module - Kiosk Dashboard
//!
//! Hyperspace-themed terminal front end for the kiosk.
//!
//! Architecture:
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                        UI LAYER (app.rs, widgets/)                  │
//! │  Pure rendering. No business logic. Reads KioskView.                │
//! └─────────────────────────────────────────────────────────────────────┘
//!                               ▲
//!                               │ KioskView (shared)
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      DOMAIN LAYER (state.rs)                        │
//! │  ViewSink implements the presentation traits, writes KioskView.     │
//! └─────────────────────────────────────────────────────────────────────┘
//!                               ▲
//!                               │ sink calls
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         CORE (crate::kiosk)                         │
//! │  Supervisor, router and flow, driven once per UI tick.              │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

mod app;
mod events;
mod state;
mod theme;

pub mod widgets;

pub use app::TuiApp;
pub use state::{AppState, KioskView, ViewSink};
pub use theme::HyperspaceTheme;

use crate::config::KioskConfig;

/// Run the TUI dashboard
pub async fn run(config: &KioskConfig) -> anyhow::Result<()> {
    let app = TuiApp::new(config)?;
    app.run().await
}
