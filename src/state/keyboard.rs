//! Keyboard Module - Keyboard event state and handler registry
//!
//! The registry is the "document scope" every key event passes through.
//! Does NOT own stdin (see the input module for the crossterm bridge).
//!
//! # Dispatch order
//!
//! 1. Capture handlers (`on_capture`) - see every non-release event first
//! 2. Key-specific handlers (`on_key`) - press events only
//! 3. Global handlers (`on`) - press events only
//!
//! A handler returning `true` consumes the event: later handlers do not see
//! it and the host should skip its default handling.
//!
//! # Example
//!
//! ```
//! use spark_blockui::state::keyboard::{Keyboard, KeyboardEvent};
//!
//! let keyboard = Keyboard::new();
//!
//! let cleanup = keyboard.on_key("Enter", || {
//!     println!("Enter pressed!");
//!     true // Consume event
//! });
//!
//! assert!(keyboard.dispatch(KeyboardEvent::new("Enter")));
//! cleanup();
//! assert!(!keyboard.dispatch(KeyboardEvent::new("Enter")));
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use spark_signals::{signal, Signal};

// =============================================================================
// TYPES
// =============================================================================

/// Keyboard modifier state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
}

impl Modifiers {
    /// Create modifiers with ctrl
    pub fn ctrl() -> Self {
        Self { ctrl: true, ..Self::default() }
    }

    /// Create modifiers with shift
    pub fn shift() -> Self {
        Self { shift: true, ..Self::default() }
    }
}

/// Key event state (press, repeat, release)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KeyState {
    #[default]
    Press,
    Repeat,
    Release,
}

/// Keyboard event
#[derive(Clone, Debug, PartialEq)]
pub struct KeyboardEvent {
    /// The key that was pressed (e.g., "a", "Enter", "Escape", "Tab")
    pub key: String,
    pub modifiers: Modifiers,
    pub state: KeyState,
}

impl KeyboardEvent {
    /// Create a simple key press event
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            modifiers: Modifiers::default(),
            state: KeyState::Press,
        }
    }

    /// Create a key press with modifiers
    pub fn with_modifiers(key: impl Into<String>, modifiers: Modifiers) -> Self {
        Self {
            key: key.into(),
            modifiers,
            state: KeyState::Press,
        }
    }

    /// Same key, different state
    pub fn with_state(mut self, state: KeyState) -> Self {
        self.state = state;
        self
    }

    pub fn is_press(&self) -> bool {
        self.state == KeyState::Press
    }

    /// Key-down in the DOM sense: press or auto-repeat.
    pub fn is_key_down(&self) -> bool {
        self.state != KeyState::Release
    }
}

/// Handler for keyboard events. Return true to consume the event.
pub type KeyHandler = Rc<dyn Fn(&KeyboardEvent) -> bool>;

/// Handler for a specific key. Return true to consume the event.
pub type KeySpecificHandler = Rc<dyn Fn() -> bool>;

// =============================================================================
// HANDLER REGISTRY
// =============================================================================

#[derive(Default)]
struct HandlerRegistry {
    capture_handlers: Vec<(usize, KeyHandler)>,
    global_handlers: Vec<(usize, KeyHandler)>,
    key_handlers: HashMap<String, Vec<(usize, KeySpecificHandler)>>,
    next_id: usize,
}

impl HandlerRegistry {
    fn next_id(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// Clonable handle to a keyboard handler registry.
#[derive(Clone)]
pub struct Keyboard {
    registry: Rc<RefCell<HandlerRegistry>>,
    last_event: Signal<Option<KeyboardEvent>>,
}

impl Default for Keyboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Keyboard {
    pub fn new() -> Self {
        Self {
            registry: Rc::new(RefCell::new(HandlerRegistry::default())),
            last_event: signal(None),
        }
    }

    // =========================================================================
    // STATE
    // =========================================================================

    /// Get the last keyboard event
    pub fn last_event(&self) -> Option<KeyboardEvent> {
        self.last_event.get()
    }

    /// Get the last key pressed
    pub fn last_key(&self) -> String {
        self.last_event().map(|e| e.key).unwrap_or_default()
    }

    /// Number of installed capture handlers.
    pub fn capture_count(&self) -> usize {
        self.registry.borrow().capture_handlers.len()
    }

    /// Number of installed handlers of any kind.
    pub fn handler_count(&self) -> usize {
        let reg = self.registry.borrow();
        reg.capture_handlers.len()
            + reg.global_handlers.len()
            + reg.key_handlers.values().map(Vec::len).sum::<usize>()
    }

    // =========================================================================
    // EVENT DISPATCH
    // =========================================================================

    /// Dispatch a keyboard event. Returns true if any handler consumed it.
    ///
    /// Handlers are cloned out of the registry first, so a handler may
    /// register or remove handlers while running.
    pub fn dispatch(&self, event: KeyboardEvent) -> bool {
        self.last_event.set(Some(event.clone()));

        if event.is_key_down() {
            let capture: Vec<KeyHandler> = self
                .registry
                .borrow()
                .capture_handlers
                .iter()
                .map(|(_, h)| h.clone())
                .collect();
            if capture.iter().any(|handler| handler(&event)) {
                return true;
            }
        }

        if !event.is_press() {
            return false;
        }

        let (key_specific, global): (Vec<KeySpecificHandler>, Vec<KeyHandler>) = {
            let reg = self.registry.borrow();
            let key_specific = reg
                .key_handlers
                .get(&event.key)
                .map(|handlers| handlers.iter().map(|(_, h)| h.clone()).collect())
                .unwrap_or_default();
            let global = reg.global_handlers.iter().map(|(_, h)| h.clone()).collect();
            (key_specific, global)
        };

        if key_specific.iter().any(|handler| handler()) {
            return true;
        }
        global.iter().any(|handler| handler(&event))
    }

    // =========================================================================
    // SUBSCRIPTION
    // =========================================================================

    /// Subscribe ahead of every other handler, for key-down and repeat events.
    /// Returns cleanup function.
    pub fn on_capture<F>(&self, handler: F) -> impl FnOnce() + 'static
    where
        F: Fn(&KeyboardEvent) -> bool + 'static,
    {
        let id = {
            let mut reg = self.registry.borrow_mut();
            let id = reg.next_id();
            reg.capture_handlers.push((id, Rc::new(handler)));
            id
        };

        let registry = Rc::downgrade(&self.registry);
        move || {
            if let Some(registry) = registry.upgrade() {
                registry
                    .borrow_mut()
                    .capture_handlers
                    .retain(|(handler_id, _)| *handler_id != id);
            }
        }
    }

    /// Subscribe to all keyboard press events.
    /// Returns cleanup function.
    pub fn on<F>(&self, handler: F) -> impl FnOnce() + 'static
    where
        F: Fn(&KeyboardEvent) -> bool + 'static,
    {
        let id = {
            let mut reg = self.registry.borrow_mut();
            let id = reg.next_id();
            reg.global_handlers.push((id, Rc::new(handler)));
            id
        };

        let registry = Rc::downgrade(&self.registry);
        move || {
            if let Some(registry) = registry.upgrade() {
                registry
                    .borrow_mut()
                    .global_handlers
                    .retain(|(handler_id, _)| *handler_id != id);
            }
        }
    }

    /// Subscribe to a specific key.
    /// Returns cleanup function.
    pub fn on_key<F>(&self, key: &str, handler: F) -> impl FnOnce() + 'static
    where
        F: Fn() -> bool + 'static,
    {
        let key = key.to_string();
        let id = {
            let mut reg = self.registry.borrow_mut();
            let id = reg.next_id();
            reg.key_handlers
                .entry(key.clone())
                .or_default()
                .push((id, Rc::new(handler)));
            id
        };

        let registry = Rc::downgrade(&self.registry);
        move || {
            if let Some(registry) = registry.upgrade() {
                let mut reg = registry.borrow_mut();
                if let Some(handlers) = reg.key_handlers.get_mut(&key) {
                    handlers.retain(|(handler_id, _)| *handler_id != id);
                    if handlers.is_empty() {
                        reg.key_handlers.remove(&key);
                    }
                }
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
