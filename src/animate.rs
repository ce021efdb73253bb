//! Fade Animation - Cancelable opacity ramps driven by frames
//!
//! An [`AnimationStepper`] moves a value between 0 and 1, one step per
//! frame of the shared [`Scheduler`], calling `on_frame` with every new
//! value and `on_complete` when the ramp lands on its terminal value.
//!
//! # Pattern
//!
//! - Step size is `FRAME_INCREMENT_MS / duration_ms`, so a ramp lasts about
//!   `duration_ms` at 60 Hz. It counts frames, not timestamps: on a faster
//!   display it finishes sooner.
//! - The ramp continues from the current value. Call [`jump_to`] first for
//!   a fresh start.
//! - Starting a ramp cancels the one in flight. The cancelled ramp never
//!   reports completion.
//! - `duration_ms == 0` snaps to the terminal value and completes inside
//!   `start`.
//!
//! [`jump_to`]: AnimationStepper::jump_to
//!
//! # Example
//!
//! ```
//! use spark_blockui::{AnimationStepper, Direction, Scheduler, FRAME_INTERVAL};
//!
//! let scheduler = Scheduler::new();
//! let stepper = AnimationStepper::new(scheduler.clone());
//!
//! stepper.start(Direction::In, 200, |value| println!("opacity {value:.2}"), || println!("shown"));
//! scheduler.run_until_idle(FRAME_INTERVAL, 100);
//! assert_eq!(stepper.value(), 1.0);
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use tracing::trace;

use crate::scheduler::Scheduler;
use crate::types::Direction;

/// Approximate duration of one display refresh, in milliseconds.
pub const FRAME_INCREMENT_MS: f64 = 16.7;

// =============================================================================
// STATE
// =============================================================================

struct StepperState {
    value: f64,
    /// Bumped on every start/cancel. A ramp only runs while it holds the
    /// current generation.
    generation: u64,
    running: bool,
}

struct Ramp {
    direction: Direction,
    increment: f64,
    generation: u64,
    on_frame: Box<dyn FnMut(f64)>,
    on_complete: Box<dyn FnOnce()>,
}

// =============================================================================
// STEPPER
// =============================================================================

/// Cancel-on-restart opacity ramp.
#[derive(Clone)]
pub struct AnimationStepper {
    scheduler: Scheduler,
    state: Rc<RefCell<StepperState>>,
}

impl AnimationStepper {
    pub fn new(scheduler: Scheduler) -> Self {
        Self {
            scheduler,
            state: Rc::new(RefCell::new(StepperState {
                value: 0.0,
                generation: 0,
                running: false,
            })),
        }
    }

    /// Last value produced.
    pub fn value(&self) -> f64 {
        self.state.borrow().value
    }

    pub fn is_running(&self) -> bool {
        self.state.borrow().running
    }

    /// Drop the ramp in flight, if any, without completing it.
    pub fn cancel(&self) {
        let mut state = self.state.borrow_mut();
        state.generation += 1;
        state.running = false;
    }

    /// Cancel and set the value directly.
    pub fn jump_to(&self, value: f64) {
        self.cancel();
        self.state.borrow_mut().value = value.clamp(0.0, 1.0);
    }

    /// Start a ramp toward `direction`'s terminal value.
    ///
    /// The first step runs before this returns; the rest run one per frame.
    pub fn start<F, C>(&self, direction: Direction, duration_ms: u32, on_frame: F, on_complete: C)
    where
        F: FnMut(f64) + 'static,
        C: FnOnce() + 'static,
    {
        let generation = {
            let mut state = self.state.borrow_mut();
            state.generation += 1;
            state.running = true;
            state.generation
        };

        // Zero duration: one step covering the whole range
        let increment = if duration_ms == 0 {
            1.0
        } else {
            FRAME_INCREMENT_MS / duration_ms as f64
        };

        trace!(?direction, duration_ms, increment, "fade ramp start");

        step(
            self.state.clone(),
            self.scheduler.clone(),
            Ramp {
                direction,
                increment,
                generation,
                on_frame: Box::new(on_frame),
                on_complete: Box::new(on_complete),
            },
        );
    }
}

/// Advance `ramp` by one increment, then either finish it or queue the next frame.
fn step(state: Rc<RefCell<StepperState>>, scheduler: Scheduler, mut ramp: Ramp) {
    let terminal = ramp.direction.terminal();
    let value = {
        let mut s = state.borrow_mut();
        if s.generation != ramp.generation {
            return;
        }
        let next = (s.value + ramp.direction.sign() * ramp.increment).clamp(0.0, 1.0);
        s.value = next;
        next
    };

    (ramp.on_frame)(value);

    // on_frame may have restarted or cancelled the stepper
    if state.borrow().generation != ramp.generation {
        return;
    }

    if value == terminal {
        state.borrow_mut().running = false;
        trace!(direction = ?ramp.direction, "fade ramp complete");
        (ramp.on_complete)();
    } else {
        let next_scheduler = scheduler.clone();
        scheduler.request_frame(move || step(state, next_scheduler, ramp));
    }
}

// =============================================================================
// TESTS
// =============================================================================
