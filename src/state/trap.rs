//! Input Trap - Swallow keyboard input while the UI is blocked
//!
//! Installs one capture handler on a [`Keyboard`] that consumes every
//! key-down event except the keys its [`TrapPolicy`] lets through.
//!
//! - `activate` twice installs one handler, not two
//! - `deactivate` when inactive does nothing
//! - after `deactivate` the registry is exactly as before `activate`

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use bitflags::bitflags;
use tracing::trace;

use super::keyboard::{Keyboard, KeyboardEvent};

bitflags! {
    /// Keys the trap lets through.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct TrapPolicy: u8 {
        const ALLOW_ESCAPE = 0b01;
        /// Tab and Shift+Tab.
        const ALLOW_TAB = 0b10;
    }
}

impl TrapPolicy {
    /// Escape always passes; Tab only when `allow_tab`.
    pub fn escape_and(allow_tab: bool) -> Self {
        let mut policy = Self::ALLOW_ESCAPE;
        policy.set(Self::ALLOW_TAB, allow_tab);
        policy
    }

    /// Whether `event` gets through the trap.
    pub fn passes(self, event: &KeyboardEvent) -> bool {
        match event.key.as_str() {
            "Escape" => self.contains(Self::ALLOW_ESCAPE),
            "Tab" => self.contains(Self::ALLOW_TAB),
            _ => false,
        }
    }
}

/// Idempotent keyboard trap.
pub struct InputTrap {
    keyboard: Keyboard,
    cleanup: RefCell<Option<Box<dyn FnOnce()>>>,
    policy: Cell<Option<TrapPolicy>>,
    suppressed: Rc<Cell<u64>>,
}

impl InputTrap {
    pub fn new(keyboard: Keyboard) -> Self {
        Self {
            keyboard,
            cleanup: RefCell::new(None),
            policy: Cell::new(None),
            suppressed: Rc::new(Cell::new(0)),
        }
    }

    /// Install the trap. Returns false if it was already active.
    pub fn activate(&self, policy: TrapPolicy) -> bool {
        if self.is_active() {
            return false;
        }

        let suppressed = self.suppressed.clone();
        let cleanup = self.keyboard.on_capture(move |event| {
            if policy.passes(event) {
                return false;
            }
            suppressed.set(suppressed.get() + 1);
            trace!(key = %event.key, "key suppressed by input trap");
            true
        });

        *self.cleanup.borrow_mut() = Some(Box::new(cleanup));
        self.policy.set(Some(policy));
        true
    }

    /// Remove the trap. Returns false if it was not active.
    pub fn deactivate(&self) -> bool {
        let cleanup = self.cleanup.borrow_mut().take();
        self.policy.set(None);
        match cleanup {
            Some(cleanup) => {
                cleanup();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.cleanup.borrow().is_some()
    }

    /// Policy of the installed trap, if any.
    pub fn policy(&self) -> Option<TrapPolicy> {
        self.policy.get()
    }

    /// Events swallowed since creation.
    pub fn suppressed_count(&self) -> u64 {
        self.suppressed.get()
    }
}

impl Drop for InputTrap {
    fn drop(&mut self) {
        self.deactivate();
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::keyboard::Modifiers;

    fn setup() -> (Keyboard, InputTrap) {
        let keyboard = Keyboard::new();
        let trap = InputTrap::new(keyboard.clone());
        (keyboard, trap)
    }

    #[test]
    fn test_suppresses_everything_but_escape() {
        let (keyboard, trap) = setup();
        assert!(trap.activate(TrapPolicy::escape_and(false)));

        assert!(keyboard.dispatch(KeyboardEvent::new("a")));
        assert!(keyboard.dispatch(KeyboardEvent::new("Enter")));
        assert!(keyboard.dispatch(KeyboardEvent::new("Tab")));
        assert!(!keyboard.dispatch(KeyboardEvent::new("Escape")));
        assert_eq!(trap.suppressed_count(), 3);
    }

    #[test]
    fn test_tab_allowed_when_unconstrained() {
        let (keyboard, trap) = setup();
        trap.activate(TrapPolicy::escape_and(true));

        assert!(!keyboard.dispatch(KeyboardEvent::new("Tab")));
        assert!(!keyboard.dispatch(KeyboardEvent::with_modifiers("Tab", Modifiers::shift())));
        assert!(keyboard.dispatch(KeyboardEvent::new("x")));
    }

    #[test]
    fn test_activate_is_idempotent() {
        let (keyboard, trap) = setup();

        assert!(trap.activate(TrapPolicy::ALLOW_ESCAPE));
        assert!(!trap.activate(TrapPolicy::ALLOW_ESCAPE));
        assert_eq!(keyboard.capture_count(), 1);
    }

    #[test]
    fn test_deactivate_restores_registry() {
        let (keyboard, trap) = setup();
        let _other = keyboard.on(|_| false);
        let before = keyboard.handler_count();

        trap.activate(TrapPolicy::ALLOW_ESCAPE);
        assert!(trap.deactivate());
        assert!(!trap.deactivate());

        assert_eq!(keyboard.handler_count(), before);
        assert!(!keyboard.dispatch(KeyboardEvent::new("a")));
        assert!(trap.policy().is_none());
    }

    #[test]
    fn test_empty_policy_blocks_escape() {
        let (keyboard, trap) = setup();
        trap.activate(TrapPolicy::empty());
        assert!(keyboard.dispatch(KeyboardEvent::new("Escape")));
    }

    #[test]
    fn test_drop_removes_handler() {
        let (keyboard, trap) = setup();
        trap.activate(TrapPolicy::ALLOW_ESCAPE);
        drop(trap);
        assert_eq!(keyboard.capture_count(), 0);
    }
}
