//! Event Handling - Keyboard input processing

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::time::Duration;

use super::state::AppState;

/// Actions that can be triggered by user input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    Capture,
    Help,
    None,
}

/// Handle keyboard events
pub fn handle_key_event(key: KeyEvent, state: &mut AppState) -> Action {
    // Key release events (Windows) would double every press
    if key.kind == KeyEventKind::Release {
        return Action::None;
    }

    match (key.modifiers, key.code) {
        // Quit: q, Esc or Ctrl+C
        (KeyModifiers::NONE, KeyCode::Char('q')) | (_, KeyCode::Esc) => Action::Quit,
        (KeyModifiers::CONTROL, KeyCode::Char('c')) => Action::Quit,

        // Help: F1 or ?
        (_, KeyCode::F(1)) | (_, KeyCode::Char('?')) => {
            state.show_help = !state.show_help;
            Action::Help
        }

        // The capture button
        (KeyModifiers::NONE, KeyCode::Char(' ')) | (KeyModifiers::NONE, KeyCode::Enter) => {
            Action::Capture
        }

        _ => Action::None,
    }
}

/// Poll for keyboard events with timeout
pub fn poll_event(timeout: Duration) -> std::io::Result<Option<KeyEvent>> {
    if event::poll(timeout)? {
        if let Event::Key(key) = event::read()? {
            return Ok(Some(key));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quit_action() {
        let mut state = AppState::default();
        let key = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE);
        assert_eq!(handle_key_event(key, &mut state), Action::Quit);
        let key = KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE);
        assert_eq!(handle_key_event(key, &mut state), Action::Quit);
    }

    #[test]
    fn test_ctrl_c_quit() {
        let mut state = AppState::default();
        let key = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(handle_key_event(key, &mut state), Action::Quit);
    }

    #[test]
    fn test_space_captures() {
        let mut state = AppState::default();
        let key = KeyEvent::new(KeyCode::Char(' '), KeyModifiers::NONE);
        assert_eq!(handle_key_event(key, &mut state), Action::Capture);
    }

    #[test]
    fn test_help_toggles() {
        let mut state = AppState::default();
        let key = KeyEvent::new(KeyCode::F(1), KeyModifiers::NONE);
        handle_key_event(key, &mut state);
        assert!(state.show_help);
        handle_key_event(key, &mut state);
        assert!(!state.show_help);
    }
}
