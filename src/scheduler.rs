//! Scheduler - Cooperative frame and timer queue
//!
//! The host's event loop owns time. Nothing here sleeps or spawns threads:
//! work is queued and runs when the host calls [`Scheduler::run_frame`]
//! (once per display refresh) or [`Scheduler::advance`] (as wall-clock time
//! passes).
//!
//! # Pattern
//!
//! - `request_frame` - run once on the next refresh
//! - `set_timeout` / `clear_timeout` - run once after a delay
//! - Callbacks run with no internal borrow held, so they may schedule more
//!   work or re-enter the block manager.
//!
//! # Example
//!
//! ```
//! use spark_blockui::Scheduler;
//! use std::time::Duration;
//!
//! let scheduler = Scheduler::new();
//! scheduler.set_timeout(Duration::from_millis(100), || println!("fired"));
//!
//! // Host loop, ~60 Hz
//! for _ in 0..10 {
//!     scheduler.tick(Duration::from_millis(16));
//! }
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

/// One display refresh at 60 Hz.
pub const FRAME_INTERVAL: Duration = Duration::from_micros(16_667);

/// Handle returned by [`Scheduler::set_timeout`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

type Task = Box<dyn FnOnce()>;

struct Timer {
    deadline: Duration,
    task: Task,
}

#[derive(Default)]
struct SchedulerState {
    now: Duration,
    frames: Vec<Task>,
    timers: HashMap<TimerId, Timer>,
    next_timer: u64,
}

impl SchedulerState {
    /// Earliest timer due at or before `until`. Ties go to the older timer.
    fn next_due(&self, until: Duration) -> Option<TimerId> {
        self.timers
            .iter()
            .filter(|(_, timer)| timer.deadline <= until)
            .min_by_key(|(id, timer)| (timer.deadline, **id))
            .map(|(id, _)| *id)
    }
}

// =============================================================================
// SCHEDULER
// =============================================================================

/// Clonable handle to a single-threaded task queue.
#[derive(Clone, Default)]
pub struct Scheduler {
    state: Rc<RefCell<SchedulerState>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time elapsed since creation.
    pub fn now(&self) -> Duration {
        self.state.borrow().now
    }

    /// Queue `task` for the next frame.
    pub fn request_frame<F>(&self, task: F)
    where
        F: FnOnce() + 'static,
    {
        self.state.borrow_mut().frames.push(Box::new(task));
    }

    /// Run `task` once `delay` has elapsed.
    pub fn set_timeout<F>(&self, delay: Duration, task: F) -> TimerId
    where
        F: FnOnce() + 'static,
    {
        let mut state = self.state.borrow_mut();
        let id = TimerId(state.next_timer);
        state.next_timer += 1;
        let deadline = state.now + delay;
        state.timers.insert(
            id,
            Timer {
                deadline,
                task: Box::new(task),
            },
        );
        id
    }

    /// Cancel a pending timer. Returns false if it already fired or never existed.
    pub fn clear_timeout(&self, id: TimerId) -> bool {
        self.state.borrow_mut().timers.remove(&id).is_some()
    }

    /// Run the callbacks queued before this call.
    ///
    /// Callbacks queued while the frame runs wait for the next frame.
    /// Returns how many ran.
    pub fn run_frame(&self) -> usize {
        let tasks = std::mem::take(&mut self.state.borrow_mut().frames);
        let count = tasks.len();
        for task in tasks {
            task();
        }
        count
    }

    /// Move the clock forward, firing due timers in deadline order.
    pub fn advance(&self, elapsed: Duration) {
        let until = self.now() + elapsed;
        loop {
            let due = {
                let mut state = self.state.borrow_mut();
                let Some(id) = state.next_due(until) else {
                    break;
                };
                let Some(timer) = state.timers.remove(&id) else {
                    break;
                };
                state.now = timer.deadline;
                timer.task
            };
            due();
        }
        self.state.borrow_mut().now = until;
    }

    /// One host loop iteration: advance by `frame`, then run a frame.
    pub fn tick(&self, frame: Duration) -> usize {
        self.advance(frame);
        self.run_frame()
    }

    /// Tick until nothing is queued or `max_ticks` is reached.
    /// Returns the number of ticks taken.
    pub fn run_until_idle(&self, frame: Duration, max_ticks: usize) -> usize {
        let mut ticks = 0;
        while self.is_busy() && ticks < max_ticks {
            self.tick(frame);
            ticks += 1;
        }
        ticks
    }

    pub fn pending_frames(&self) -> usize {
        self.state.borrow().frames.len()
    }

    pub fn pending_timers(&self) -> usize {
        self.state.borrow().timers.len()
    }

    /// Anything queued at all.
    pub fn is_busy(&self) -> bool {
        let state = self.state.borrow();
        !state.frames.is_empty() || !state.timers.is_empty()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_frame_runs_once() {
        let scheduler = Scheduler::new();
        let count = Rc::new(Cell::new(0));
        let count_clone = count.clone();

        scheduler.request_frame(move || count_clone.set(count_clone.get() + 1));
        assert_eq!(scheduler.pending_frames(), 1);

        assert_eq!(scheduler.run_frame(), 1);
        assert_eq!(count.get(), 1);

        assert_eq!(scheduler.run_frame(), 0);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_frame_requested_during_frame_waits() {
        let scheduler = Scheduler::new();
        let count = Rc::new(Cell::new(0));

        let inner_scheduler = scheduler.clone();
        let count_clone = count.clone();
        scheduler.request_frame(move || {
            count_clone.set(count_clone.get() + 1);
            let count_inner = count_clone.clone();
            inner_scheduler.request_frame(move || count_inner.set(count_inner.get() + 10));
        });

        scheduler.run_frame();
        assert_eq!(count.get(), 1);
        assert_eq!(scheduler.pending_frames(), 1);

        scheduler.run_frame();
        assert_eq!(count.get(), 11);
    }

    #[test]
    fn test_timeout_fires_at_deadline() {
        let scheduler = Scheduler::new();
        let fired_at = Rc::new(Cell::new(None));

        let fired_clone = fired_at.clone();
        let clock = scheduler.clone();
        scheduler.set_timeout(Duration::from_millis(100), move || {
            fired_clone.set(Some(clock.now()));
        });

        scheduler.advance(Duration::from_millis(99));
        assert!(fired_at.get().is_none());

        scheduler.advance(Duration::from_millis(50));
        assert_eq!(fired_at.get(), Some(Duration::from_millis(100)));
        assert_eq!(scheduler.now(), Duration::from_millis(149));
    }

    #[test]
    fn test_timeouts_fire_in_order() {
        let scheduler = Scheduler::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        for (label, ms) in [("c", 30u64), ("a", 10), ("b", 20), ("a2", 10)] {
            let order = order.clone();
            scheduler.set_timeout(Duration::from_millis(ms), move || {
                order.borrow_mut().push(label);
            });
        }

        scheduler.advance(Duration::from_millis(100));
        assert_eq!(*order.borrow(), vec!["a", "a2", "b", "c"]);
    }

    #[test]
    fn test_clear_timeout() {
        let scheduler = Scheduler::new();
        let fired = Rc::new(Cell::new(false));
        let fired_clone = fired.clone();

        let id = scheduler.set_timeout(Duration::from_millis(5), move || fired_clone.set(true));
        assert!(scheduler.clear_timeout(id));
        assert!(!scheduler.clear_timeout(id));

        scheduler.advance(Duration::from_millis(10));
        assert!(!fired.get());
    }

    #[test]
    fn test_nested_timeout_uses_fire_time() {
        let scheduler = Scheduler::new();
        let fired = Rc::new(Cell::new(false));

        let outer = scheduler.clone();
        let fired_clone = fired.clone();
        scheduler.set_timeout(Duration::from_millis(10), move || {
            let fired_inner = fired_clone.clone();
            outer.set_timeout(Duration::from_millis(10), move || fired_inner.set(true));
        });

        // Inner deadline is 20ms, inside this single advance
        scheduler.advance(Duration::from_millis(25));
        assert!(fired.get());
        assert!(!scheduler.is_busy());
    }

    #[test]
    fn test_run_until_idle_bounded() {
        let scheduler = Scheduler::new();

        fn forever(scheduler: Scheduler) {
            let next = scheduler.clone();
            scheduler.request_frame(move || forever(next));
        }
        forever(scheduler.clone());

        assert_eq!(scheduler.run_until_idle(FRAME_INTERVAL, 5), 5);
        assert!(scheduler.is_busy());
    }
}
