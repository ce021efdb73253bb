//! Block Manager - Reentrant block/unblock entry points
//!
//! The block count is the only thing that decides visibility:
//!
//! ```text
//!            block (count 0 → 1)              fade-out lands
//!  Hidden ─────────────────────────▶ Showing ──────────────┐
//!    ▲                                 │  ▲                │
//!    │           unblock (count → 0)   │  │ block (0 → 1)  │
//!    │                                 ▼  │                │
//!    └──────────────────────────────── Hiding ◀────────────┘
//! ```
//!
//! Nested `block` calls only count. Only the call that takes the count from
//! 0 to 1 opens a session, and only the `unblock` that brings it back to 0
//! closes it, with that `unblock` call's own config.
//!
//! # Example
//!
//! ```
//! use spark_blockui::{BlockConfig, BlockManager, MemorySurface, FRAME_INTERVAL};
//!
//! let manager = BlockManager::new(MemorySurface::new());
//!
//! manager.block(BlockConfig::new().message("<h1>Saving...</h1>"));
//! manager.block(BlockConfig::new()); // nested, just counts
//! assert_eq!(manager.block_count(), 2);
//!
//! manager.unblock(BlockConfig::new());
//! assert!(manager.is_blocked());
//! manager.unblock(BlockConfig::new().fade_out_ms(0));
//! assert!(!manager.is_blocked());
//!
//! manager.scheduler().run_until_idle(FRAME_INTERVAL, 1_000);
//! ```

use std::cell::{Cell, Ref, RefCell};
use std::rc::{Rc, Weak};

use spark_signals::{signal, Signal};
use tracing::{debug, trace, warn};

use crate::animate::AnimationStepper;
use crate::config::{BlockConfig, BlockDefaults};
use crate::scheduler::Scheduler;
use crate::session::{BlockSession, SessionContext, SurfaceLayout};
use crate::state::keyboard::Keyboard;
use crate::state::trap::InputTrap;
use crate::surface::Surface;
use crate::types::{BlockState, ElementId};

struct ManagerInner<S: Surface> {
    defaults: BlockDefaults,
    surface: Rc<RefCell<S>>,
    scheduler: Scheduler,
    keyboard: Keyboard,
    stepper: AnimationStepper,
    trap: Rc<InputTrap>,
    layout: Cell<Option<SurfaceLayout>>,
    session: RefCell<Option<Rc<BlockSession<S>>>>,
    state: Cell<BlockState>,
    block_count: Signal<usize>,
    opacity: Signal<f64>,
}

/// Reference-counted overlay coordinator.
///
/// Construct one per host and hand out clones; clones share all state.
pub struct BlockManager<S: Surface + 'static> {
    inner: Rc<ManagerInner<S>>,
}

impl<S: Surface + 'static> Clone for BlockManager<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: Surface + 'static> BlockManager<S> {
    /// Manager with built-in defaults and its own scheduler and keyboard.
    pub fn new(surface: S) -> Self {
        Self::with_defaults(surface, BlockDefaults::default())
    }

    pub fn with_defaults(surface: S, defaults: BlockDefaults) -> Self {
        Self::with_runtime(surface, defaults, Scheduler::new(), Keyboard::new())
    }

    /// Manager sharing the host's scheduler and keyboard registry.
    pub fn with_runtime(
        surface: S,
        defaults: BlockDefaults,
        scheduler: Scheduler,
        keyboard: Keyboard,
    ) -> Self {
        Self {
            inner: Rc::new(ManagerInner {
                defaults,
                surface: Rc::new(RefCell::new(surface)),
                stepper: AnimationStepper::new(scheduler.clone()),
                trap: Rc::new(InputTrap::new(keyboard.clone())),
                scheduler,
                keyboard,
                layout: Cell::new(None),
                session: RefCell::new(None),
                state: Cell::new(BlockState::Hidden),
                block_count: signal(0),
                opacity: signal(0.0),
            }),
        }
    }

    // =========================================================================
    // PUBLIC API
    // =========================================================================

    /// Begin a block cycle, or nest inside the current one.
    pub fn block(&self, config: BlockConfig) {
        let inner = &self.inner;
        let opts = config.resolve(&inner.defaults);
        let count = inner.block_count.get();

        if opts.ignore_if_already_blocked && count > 0 {
            trace!(count, "already blocked, ignoring block");
            return;
        }

        inner.block_count.set(count + 1);
        if count > 0 {
            trace!(count = count + 1, "nested block");
            return;
        }

        debug!("blocking");
        inner.state.set(BlockState::Showing);

        let Some(layout) = self.layout() else {
            warn!("overlay elements unavailable, block is counted but not shown");
            return;
        };

        let session = Rc::new(BlockSession::new(self.session_context(layout)));
        let previous = inner.session.borrow_mut().replace(session.clone());
        if let Some(previous) = previous {
            // Its fade-out never landed
            previous.discard();
        }

        let weak = Rc::downgrade(inner);
        let auto_unblock: Box<dyn FnOnce()> = Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                trace!("auto-unblock timeout fired");
                BlockManager { inner }.unblock(config);
            }
        });

        session.open(&opts, auto_unblock);
    }

    /// End a block cycle, or step out of one nesting level.
    ///
    /// Unmatched calls (count already 0) are ignored.
    pub fn unblock(&self, config: BlockConfig) {
        let inner = &self.inner;
        let count = inner.block_count.get();

        if count == 0 {
            trace!("unblock with nothing blocked, ignoring");
            return;
        }

        inner.block_count.set(count - 1);
        if count > 1 {
            trace!(count = count - 1, "nested unblock");
            return;
        }

        debug!("unblocking");
        let opts = config.resolve(&inner.defaults);
        let session = inner.session.borrow().clone();
        let Some(session) = session else {
            inner.state.set(BlockState::Hidden);
            return;
        };

        inner.state.set(BlockState::Hiding);
        let on_hidden = Self::release_session(Rc::downgrade(inner), Rc::downgrade(&session));
        session.close(&opts, on_hidden);
    }

    /// Drops the session once its fade-out lands, unless another took its place.
    fn release_session(
        inner: Weak<ManagerInner<S>>,
        session: Weak<BlockSession<S>>,
    ) -> Box<dyn FnOnce()> {
        Box::new(move || {
            let Some(inner) = inner.upgrade() else {
                return;
            };
            let mut slot = inner.session.borrow_mut();
            let current = slot
                .as_ref()
                .is_some_and(|s| Weak::ptr_eq(&Rc::downgrade(s), &session));
            if current {
                *slot = None;
                inner.state.set(BlockState::Hidden);
                debug!("block session released");
            }
        })
    }

    // =========================================================================
    // STATE
    // =========================================================================

    /// Outstanding `block` calls.
    pub fn block_count(&self) -> usize {
        self.inner.block_count.get()
    }

    /// Count above zero: visible or fading in.
    pub fn is_blocked(&self) -> bool {
        self.block_count() > 0
    }

    pub fn state(&self) -> BlockState {
        self.inner.state.get()
    }

    /// Current overlay opacity.
    pub fn opacity(&self) -> f64 {
        self.inner.opacity.get()
    }

    pub fn block_count_signal(&self) -> Signal<usize> {
        self.inner.block_count.clone()
    }

    pub fn opacity_signal(&self) -> Signal<f64> {
        self.inner.opacity.clone()
    }

    /// Message element of the live session.
    pub fn message(&self) -> Option<ElementId> {
        self.inner.session.borrow().as_ref().and_then(|s| s.message())
    }

    /// Root, backdrop and message slot, once created.
    pub fn surface_layout(&self) -> Option<SurfaceLayout> {
        self.inner.layout.get()
    }

    pub fn defaults(&self) -> &BlockDefaults {
        &self.inner.defaults
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    pub fn keyboard(&self) -> &Keyboard {
        &self.inner.keyboard
    }

    pub fn trap(&self) -> &InputTrap {
        &self.inner.trap
    }

    /// Borrow the surface (for rendering).
    pub fn surface(&self) -> Ref<'_, S> {
        self.inner.surface.borrow()
    }

    /// Run `f` with mutable access to the surface, e.g. to build content.
    pub fn with_surface<T>(&self, f: impl FnOnce(&mut S) -> T) -> T {
        f(&mut self.inner.surface.borrow_mut())
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    /// Root/backdrop/slot, built on first use.
    fn layout(&self) -> Option<SurfaceLayout> {
        if let Some(layout) = self.inner.layout.get() {
            return Some(layout);
        }
        match SurfaceLayout::build(&mut *self.inner.surface.borrow_mut()) {
            Ok(layout) => {
                self.inner.layout.set(Some(layout));
                Some(layout)
            }
            Err(error) => {
                warn!(%error, "failed to create overlay elements");
                None
            }
        }
    }

    fn session_context(&self, layout: SurfaceLayout) -> SessionContext<S> {
        SessionContext {
            surface: self.inner.surface.clone(),
            layout,
            scheduler: self.inner.scheduler.clone(),
            stepper: self.inner.stepper.clone(),
            trap: self.inner.trap.clone(),
            opacity: self.inner.opacity.clone(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
