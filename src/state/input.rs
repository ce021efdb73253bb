//! Input Module - crossterm bridge
//!
//! Converts crossterm key events into [`KeyboardEvent`]s and feeds them to a
//! [`Keyboard`] registry. Mouse input is left to the host: the overlay only
//! traps the keyboard.
//!
//! # Example
//!
//! ```ignore
//! use spark_blockui::state::input::{poll_event, route_event};
//! use std::time::Duration;
//!
//! loop {
//!     if let Ok(Some(event)) = poll_event(Duration::from_millis(16)) {
//!         let consumed = route_event(&keyboard, event);
//!     }
//!     scheduler.tick(Duration::from_millis(16));
//! }
//! ```

use crossterm::event::{
    poll, read, Event as CrosstermEvent, KeyCode, KeyEvent as CrosstermKeyEvent, KeyEventKind,
    KeyModifiers,
};
use std::time::Duration;

use super::keyboard::{Keyboard, KeyboardEvent, KeyState, Modifiers};

// =============================================================================
// INPUT EVENT ENUM
// =============================================================================

/// Events the host loop cares about.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Key(KeyboardEvent),
    /// Terminal resize event (new width, height)
    Resize(u16, u16),
    /// Mouse, focus, paste, ...
    None,
}

// =============================================================================
// KEY EVENT CONVERSION
// =============================================================================

/// Convert crossterm KeyEvent to our KeyboardEvent
pub fn convert_key_event(event: CrosstermKeyEvent) -> KeyboardEvent {
    let mut modifiers = convert_modifiers(event.modifiers);
    let key = match event.code {
        KeyCode::Char(c) => c.to_string(),
        KeyCode::Enter => "Enter".to_string(),
        KeyCode::Tab => "Tab".to_string(),
        KeyCode::BackTab => {
            modifiers.shift = true;
            "Tab".to_string()
        }
        KeyCode::Backspace => "Backspace".to_string(),
        KeyCode::Delete => "Delete".to_string(),
        KeyCode::Esc => "Escape".to_string(),
        KeyCode::Up => "ArrowUp".to_string(),
        KeyCode::Down => "ArrowDown".to_string(),
        KeyCode::Left => "ArrowLeft".to_string(),
        KeyCode::Right => "ArrowRight".to_string(),
        KeyCode::Home => "Home".to_string(),
        KeyCode::End => "End".to_string(),
        KeyCode::PageUp => "PageUp".to_string(),
        KeyCode::PageDown => "PageDown".to_string(),
        KeyCode::F(n) => format!("F{}", n),
        KeyCode::Insert => "Insert".to_string(),
        _ => String::new(),
    };

    let state = match event.kind {
        KeyEventKind::Press => KeyState::Press,
        KeyEventKind::Repeat => KeyState::Repeat,
        KeyEventKind::Release => KeyState::Release,
    };

    KeyboardEvent {
        key,
        modifiers,
        state,
    }
}

/// Convert crossterm KeyModifiers to our Modifiers
fn convert_modifiers(mods: KeyModifiers) -> Modifiers {
    Modifiers {
        ctrl: mods.contains(KeyModifiers::CONTROL),
        alt: mods.contains(KeyModifiers::ALT),
        shift: mods.contains(KeyModifiers::SHIFT),
        meta: mods.contains(KeyModifiers::SUPER) || mods.contains(KeyModifiers::META),
    }
}

/// Convert any crossterm event.
pub fn convert_event(event: CrosstermEvent) -> InputEvent {
    match event {
        CrosstermEvent::Key(key) => InputEvent::Key(convert_key_event(key)),
        CrosstermEvent::Resize(w, h) => InputEvent::Resize(w, h),
        _ => InputEvent::None,
    }
}

// =============================================================================
// EVENT POLLING
// =============================================================================

/// Poll for an event with timeout.
/// Returns None if no event within timeout.
pub fn poll_event(timeout: Duration) -> std::io::Result<Option<InputEvent>> {
    if poll(timeout)? {
        Ok(Some(read_event()?))
    } else {
        Ok(None)
    }
}

/// Read the next event (blocking).
pub fn read_event() -> std::io::Result<InputEvent> {
    Ok(convert_event(read()?))
}

// =============================================================================
// EVENT ROUTING
// =============================================================================

/// Route an event into `keyboard`. Returns true if a handler consumed it.
pub fn route_event(keyboard: &Keyboard, event: InputEvent) -> bool {
    match event {
        InputEvent::Key(key) => keyboard.dispatch(key),
        InputEvent::Resize(..) | InputEvent::None => false,
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::trap::{InputTrap, TrapPolicy};

    #[test]
    fn test_convert_escape_and_chars() {
        let event = convert_key_event(CrosstermKeyEvent::new(KeyCode::Esc, KeyModifiers::NONE));
        assert_eq!(event.key, "Escape");
        assert!(event.is_press());

        let event = convert_key_event(CrosstermKeyEvent::new(KeyCode::Char('q'), KeyModifiers::CONTROL));
        assert_eq!(event.key, "q");
        assert!(event.modifiers.ctrl);
        assert!(!event.modifiers.shift);
    }

    #[test]
    fn test_convert_backtab_is_shift_tab() {
        let event = convert_key_event(CrosstermKeyEvent::new(KeyCode::BackTab, KeyModifiers::NONE));
        assert_eq!(event.key, "Tab");
        assert!(event.modifiers.shift);
    }

    #[test]
    fn test_convert_kind() {
        let event = convert_key_event(CrosstermKeyEvent::new_with_kind(
            KeyCode::Enter,
            KeyModifiers::NONE,
            KeyEventKind::Release,
        ));
        assert_eq!(event.key, "Enter");
        assert_eq!(event.state, KeyState::Release);
    }

    #[test]
    fn test_convert_non_key_events() {
        assert_eq!(convert_event(CrosstermEvent::Resize(80, 24)), InputEvent::Resize(80, 24));
        assert_eq!(convert_event(CrosstermEvent::FocusGained), InputEvent::None);
    }

    #[test]
    fn test_route_through_trap() {
        let keyboard = Keyboard::new();
        let trap = InputTrap::new(keyboard.clone());
        trap.activate(TrapPolicy::escape_and(false));

        let a = convert_event(CrosstermEvent::Key(CrosstermKeyEvent::new(
            KeyCode::Char('a'),
            KeyModifiers::NONE,
        )));
        let esc = convert_event(CrosstermEvent::Key(CrosstermKeyEvent::new(
            KeyCode::Esc,
            KeyModifiers::NONE,
        )));

        assert!(route_event(&keyboard, a));
        assert!(!route_event(&keyboard, esc));
        assert!(!route_event(&keyboard, InputEvent::Resize(1, 1)));
    }
}
