//! Block Session - One show → hide cycle
//!
//! A session is created when the block count goes 0 → 1 and released when
//! its fade-out lands. It owns the message it put on screen, the pending
//! auto-unblock timer, and the keyboard trap it installed. Messages it
//! synthesized are removed from the surface when it is done; caller content
//! is only detached.
//!
//! Surface failures are logged and skipped: a broken surface may leave the
//! overlay looking wrong, but it never stops the lifecycle from advancing.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use spark_signals::Signal;
use tracing::{debug, warn};

use crate::animate::AnimationStepper;
use crate::config::BlockOptions;
use crate::error::SurfaceError;
use crate::scheduler::{Scheduler, TimerId};
use crate::state::trap::{InputTrap, TrapPolicy};
use crate::surface::{MessageBody, Surface};
use crate::types::{style_map, Direction, ElementId, Message};

/// The three structural elements, created once per manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SurfaceLayout {
    pub root: ElementId,
    pub backdrop: ElementId,
    pub slot: ElementId,
}

impl SurfaceLayout {
    /// Create the root, backdrop and message slot and wire them together.
    pub(crate) fn build<S: Surface>(surface: &mut S) -> Result<Self, SurfaceError> {
        let root = surface.create_overlay_container()?;
        let backdrop = surface.create_backdrop()?;
        let slot = surface.create_message_slot()?;
        surface.set_visible(root, false)?;
        surface.append_child(root, backdrop)?;
        surface.append_child(root, slot)?;
        Ok(Self {
            root,
            backdrop,
            slot,
        })
    }
}

/// Run one surface operation, logging instead of failing.
fn apply<S, T, F>(surface: &RefCell<S>, op: &'static str, f: F) -> Option<T>
where
    S: Surface,
    F: FnOnce(&mut S) -> Result<T, SurfaceError>,
{
    match f(&mut surface.borrow_mut()) {
        Ok(value) => Some(value),
        Err(error) => {
            warn!(op, %error, "surface operation failed");
            None
        }
    }
}

// =============================================================================
// CONTEXT
// =============================================================================

/// Shared collaborators a session drives.
pub(crate) struct SessionContext<S: Surface> {
    pub surface: Rc<RefCell<S>>,
    pub layout: SurfaceLayout,
    pub scheduler: Scheduler,
    pub stepper: AnimationStepper,
    pub trap: Rc<InputTrap>,
    pub opacity: Signal<f64>,
}

impl<S: Surface> Clone for SessionContext<S> {
    fn clone(&self) -> Self {
        Self {
            surface: self.surface.clone(),
            layout: self.layout,
            scheduler: self.scheduler.clone(),
            stepper: self.stepper.clone(),
            trap: self.trap.clone(),
            opacity: self.opacity.clone(),
        }
    }
}

impl<S: Surface + 'static> SessionContext<S> {
    /// Per-frame opacity writer shared by both fades.
    fn frame_writer(&self) -> impl FnMut(f64) + 'static {
        let surface = self.surface.clone();
        let root = self.layout.root;
        let opacity = self.opacity.clone();
        move |value| {
            apply(&surface, "set_opacity", |s| s.set_opacity(root, value));
            opacity.set(value);
        }
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// Message on screen, and whether the session created it.
#[derive(Clone, Copy, Debug, Default)]
struct ShownMessage {
    element: Option<ElementId>,
    owned: bool,
}

impl ShownMessage {
    /// Forget the shown message, removing it from the surface if owned.
    fn release<S: Surface>(slot: &Cell<ShownMessage>, surface: &RefCell<S>) {
        let shown = slot.take();
        if let (Some(element), true) = (shown.element, shown.owned) {
            apply(surface, "remove_element", |s| s.remove_element(element));
        }
    }
}

pub(crate) struct BlockSession<S: Surface> {
    ctx: SessionContext<S>,
    message: Rc<Cell<ShownMessage>>,
    timeout: Rc<Cell<Option<TimerId>>>,
    /// Set by `close`; nothing scheduled afterwards may outlive the session.
    closed: Rc<Cell<bool>>,
    trap_installed: Cell<bool>,
}

impl<S: Surface + 'static> BlockSession<S> {
    pub fn new(ctx: SessionContext<S>) -> Self {
        Self {
            ctx,
            message: Rc::new(Cell::new(ShownMessage::default())),
            timeout: Rc::new(Cell::new(None)),
            closed: Rc::new(Cell::new(false)),
            trap_installed: Cell::new(false),
        }
    }

    /// Message element currently shown.
    pub fn message(&self) -> Option<ElementId> {
        self.message.get().element
    }

    /// Drop a session whose fade-out was cut short by a new block: remove
    /// the message it synthesized.
    pub fn discard(&self) {
        self.closed.set(true);
        if let Some(id) = self.timeout.take() {
            self.ctx.scheduler.clear_timeout(id);
        }
        ShownMessage::release(&self.message, &self.ctx.surface);
    }

    /// Put the message on screen and start the fade-in.
    ///
    /// `auto_unblock` runs once `opts.timeout_ms` after the fade-in lands,
    /// unless the session is closed first.
    pub fn open(&self, opts: &BlockOptions, auto_unblock: Box<dyn FnOnce()>) {
        let ctx = &self.ctx;
        let layout = ctx.layout;
        debug!(?opts, "block session open");

        let message = self.resolve_message(opts);
        self.message.set(ShownMessage {
            element: message,
            owned: message.is_some() && !matches!(opts.message, Message::Content(_)),
        });

        apply(&ctx.surface, "clear_children", |s| s.clear_children(layout.slot));
        if let Some(message) = message {
            let style = opts.message_style();
            apply(&ctx.surface, "apply_style", |s| s.apply_style(message, &style));
            apply(&ctx.surface, "append_child", |s| s.append_child(layout.slot, message));
        }

        apply(&ctx.surface, "set_visible", |s| {
            s.set_visible(layout.backdrop, opts.show_overlay)
        });
        apply(&ctx.surface, "apply_style", |s| {
            s.apply_style(layout.backdrop, &opts.overlay_style)
        });
        let z = style_map([("z-index", opts.base_z.to_string())]);
        apply(&ctx.surface, "apply_style", |s| s.apply_style(layout.root, &z));

        // Trap before the fade: a zero-length fade runs on_blocked inline,
        // and on_blocked may already unblock.
        if opts.bind_keyboard_trap {
            let installed = ctx.trap.activate(TrapPolicy::escape_and(!opts.constrain_tab_key));
            self.trap_installed.set(installed || ctx.trap.is_active());
        }

        apply(&ctx.surface, "set_visible", |s| s.set_visible(layout.root, true));
        apply(&ctx.surface, "set_opacity", |s| s.set_opacity(layout.root, 0.0));
        ctx.opacity.set(0.0);
        ctx.stepper.jump_to(0.0);

        let on_shown = {
            let surface = ctx.surface.clone();
            let scheduler = ctx.scheduler.clone();
            let timeout = self.timeout.clone();
            let closed = self.closed.clone();
            let focus = opts.focus_first_input;
            let on_blocked = opts.on_blocked.clone();
            let timeout_ms = opts.timeout_ms;
            move || {
                if focus {
                    if let Some(message) = message {
                        let target = surface.borrow().query_focusable(message);
                        if let Some(target) = target {
                            apply(&surface, "focus", |s| s.focus(target));
                        }
                    }
                }
                if let Some(on_blocked) = on_blocked {
                    on_blocked();
                }
                // on_blocked may have unblocked already
                if timeout_ms > 0 && !closed.get() {
                    let slot = timeout.clone();
                    let id = scheduler.set_timeout(Duration::from_millis(timeout_ms as u64), move || {
                        slot.set(None);
                        auto_unblock();
                    });
                    timeout.set(Some(id));
                }
            }
        };

        ctx.stepper
            .start(Direction::In, opts.fade_in_ms, ctx.frame_writer(), on_shown);
    }

    /// Release the trap and start the fade-out.
    ///
    /// `on_hidden` runs when the fade-out lands, after the overlay is hidden
    /// and before `opts.on_unblocked`. It never runs if a new fade starts first.
    pub fn close(&self, opts: &BlockOptions, on_hidden: Box<dyn FnOnce()>) {
        let ctx = &self.ctx;
        let layout = ctx.layout;
        debug!(?opts, from = ctx.stepper.value(), "block session close");

        self.closed.set(true);
        if let Some(id) = self.timeout.take() {
            ctx.scheduler.clear_timeout(id);
        }

        // Released whatever this unblock's config says
        if self.trap_installed.replace(false) || opts.bind_keyboard_trap {
            ctx.trap.deactivate();
        }

        let finish = {
            let surface = ctx.surface.clone();
            let message = self.message.clone();
            let on_unblocked = opts.on_unblocked.clone();
            move || {
                apply(&surface, "set_visible", |s| s.set_visible(layout.root, false));
                apply(&surface, "clear_children", |s| s.clear_children(layout.slot));
                ShownMessage::release(&message, &surface);
                on_hidden();
                if let Some(on_unblocked) = on_unblocked {
                    on_unblocked();
                }
            }
        };

        ctx.stepper
            .start(Direction::Out, opts.fade_out_ms, ctx.frame_writer(), finish);
    }

    fn resolve_message(&self, opts: &BlockOptions) -> Option<ElementId> {
        let class = opts.message_class.as_str();
        match &opts.message {
            Message::Markup(text) => apply(&self.ctx.surface, "create_message_container", |s| {
                s.create_message_container(class, MessageBody::Markup(text))
            }),
            Message::Content(id) => Some(*id),
            Message::Spinner => apply(&self.ctx.surface, "create_message_container", |s| {
                s.create_message_container(class, MessageBody::Spinner)
            }),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BlockConfig, BlockDefaults};
    use crate::scheduler::FRAME_INTERVAL;
    use crate::state::keyboard::{Keyboard, KeyboardEvent};
    use crate::surface::{ElementKind, MemorySurface};
    use spark_signals::signal;

    struct Fixture {
        surface: Rc<RefCell<MemorySurface>>,
        scheduler: Scheduler,
        keyboard: Keyboard,
        ctx: SessionContext<MemorySurface>,
    }

    fn setup() -> Fixture {
        let surface = Rc::new(RefCell::new(MemorySurface::new()));
        let layout = SurfaceLayout::build(&mut *surface.borrow_mut()).unwrap();
        let scheduler = Scheduler::new();
        let keyboard = Keyboard::new();
        let ctx = SessionContext {
            surface: surface.clone(),
            layout,
            scheduler: scheduler.clone(),
            stepper: AnimationStepper::new(scheduler.clone()),
            trap: Rc::new(InputTrap::new(keyboard.clone())),
            opacity: signal(0.0),
        };
        Fixture {
            surface,
            scheduler,
            keyboard,
            ctx,
        }
    }

    fn opts(config: BlockConfig) -> BlockOptions {
        config.resolve(&BlockDefaults::default())
    }

    #[test]
    fn test_layout_wiring() {
        let fx = setup();
        let surface = fx.surface.borrow();
        let root = surface.element(fx.ctx.layout.root).unwrap();
        assert!(!root.visible);
        assert_eq!(root.children, vec![fx.ctx.layout.backdrop, fx.ctx.layout.slot]);
    }

    #[test]
    fn test_open_shows_markup_with_style_and_theme() {
        let fx = setup();
        let session = BlockSession::new(fx.ctx.clone());

        session.open(
            &opts(
                BlockConfig::new()
                    .message("<p>Saving</p>")
                    .style(style_map([("width", "50%"), ("color", "red")]))
                    .theme(true)
                    .fade_in_ms(0),
            ),
            Box::new(|| {}),
        );

        let surface = fx.surface.borrow();
        let message = session.message().unwrap();
        let el = surface.element(message).unwrap();
        assert_eq!(el.class, "blockui-message");
        assert_eq!(el.style["width"], "30%");
        assert_eq!(el.style["color"], "red");
        assert_eq!(el.parent, Some(fx.ctx.layout.slot));

        let root = surface.element(fx.ctx.layout.root).unwrap();
        assert!(root.visible);
        assert_eq!(root.opacity, 1.0);
        assert_eq!(root.style["z-index"], "1000");
    }

    #[test]
    fn test_open_spinner_and_hidden_backdrop() {
        let fx = setup();
        let session = BlockSession::new(fx.ctx.clone());

        session.open(
            &opts(
                BlockConfig::new()
                    .message(Message::Spinner)
                    .show_overlay(false)
                    .overlay_style(style_map([("background", "#000")])),
            ),
            Box::new(|| {}),
        );

        let surface = fx.surface.borrow();
        let message = surface.element(session.message().unwrap()).unwrap();
        let spinner = surface.element(message.children[0]).unwrap();
        assert_eq!(spinner.kind, ElementKind::Spinner);

        let backdrop = surface.element(fx.ctx.layout.backdrop).unwrap();
        assert!(!backdrop.visible);
        assert_eq!(backdrop.style["background"], "#000");
    }

    #[test]
    fn test_open_uses_prebuilt_content() {
        let fx = setup();
        let content = fx.surface.borrow_mut().create_container("dialog");
        let input = fx.surface.borrow_mut().create_input("name");
        fx.surface.borrow_mut().append_child(content, input).unwrap();

        let session = BlockSession::new(fx.ctx.clone());
        session.open(&opts(BlockConfig::new().message(content)), Box::new(|| {}));

        assert_eq!(session.message(), Some(content));
        // Focus waits for the fade-in
        assert_eq!(fx.surface.borrow().focused(), None);

        fx.scheduler.run_until_idle(FRAME_INTERVAL, 100);
        assert_eq!(fx.surface.borrow().focused(), Some(input));
    }

    #[test]
    fn test_focus_disabled() {
        let fx = setup();
        let session = BlockSession::new(fx.ctx.clone());
        session.open(
            &opts(
                BlockConfig::new()
                    .message("<input>")
                    .focus_first_input(false)
                    .fade_in_ms(0),
            ),
            Box::new(|| {}),
        );
        assert_eq!(fx.surface.borrow().focused(), None);
    }

    #[test]
    fn test_open_replaces_previous_message() {
        let fx = setup();
        let first = BlockSession::new(fx.ctx.clone());
        first.open(&opts(BlockConfig::new().message("one").fade_in_ms(0)), Box::new(|| {}));
        let second = BlockSession::new(fx.ctx.clone());
        second.open(&opts(BlockConfig::new().message("two").fade_in_ms(0)), Box::new(|| {}));

        let surface = fx.surface.borrow();
        let slot = surface.element(fx.ctx.layout.slot).unwrap();
        assert_eq!(slot.children, vec![second.message().unwrap()]);
    }

    #[test]
    fn test_trap_follows_session() {
        let fx = setup();
        let session = BlockSession::new(fx.ctx.clone());
        session.open(&opts(BlockConfig::new().constrain_tab_key(false)), Box::new(|| {}));

        assert!(fx.keyboard.dispatch(KeyboardEvent::new("a")));
        assert!(!fx.keyboard.dispatch(KeyboardEvent::new("Tab")));

        // Unblock config without the trap flag still releases it
        session.close(&opts(BlockConfig::new().bind_keyboard_trap(false)), Box::new(|| {}));
        assert!(!fx.keyboard.dispatch(KeyboardEvent::new("a")));
        assert_eq!(fx.keyboard.capture_count(), 0);
    }

    #[test]
    fn test_no_trap_when_unbound() {
        let fx = setup();
        let session = BlockSession::new(fx.ctx.clone());
        session.open(&opts(BlockConfig::new().bind_keyboard_trap(false)), Box::new(|| {}));
        assert!(!fx.keyboard.dispatch(KeyboardEvent::new("a")));
    }

    #[test]
    fn test_close_hides_and_releases_message() {
        let fx = setup();
        let session = BlockSession::new(fx.ctx.clone());
        session.open(&opts(BlockConfig::new().fade_in_ms(0)), Box::new(|| {}));

        let hidden = Rc::new(Cell::new(0));
        let hidden_clone = hidden.clone();
        session.close(
            &opts(BlockConfig::new().fade_out_ms(100)),
            Box::new(move || hidden_clone.set(hidden_clone.get() + 1)),
        );
        assert_eq!(hidden.get(), 0);
        assert!(fx.surface.borrow().element(fx.ctx.layout.root).unwrap().visible);

        fx.scheduler.run_until_idle(FRAME_INTERVAL, 100);

        assert_eq!(hidden.get(), 1);
        let surface = fx.surface.borrow();
        let root = surface.element(fx.ctx.layout.root).unwrap();
        assert!(!root.visible);
        assert_eq!(root.opacity, 0.0);
        assert!(surface.element(fx.ctx.layout.slot).unwrap().children.is_empty());
        assert_eq!(fx.ctx.opacity.get(), 0.0);
    }

    #[test]
    fn test_close_during_fade_in_starts_from_current_opacity() {
        let fx = setup();
        let session = BlockSession::new(fx.ctx.clone());
        let shown = Rc::new(Cell::new(false));
        let shown_clone = shown.clone();

        session.open(
            &opts(
                BlockConfig::new()
                    .fade_in_ms(400)
                    .on_blocked(move || shown_clone.set(true)),
            ),
            Box::new(|| {}),
        );
        fx.scheduler.run_frame();
        let partial = fx.ctx.opacity.get();
        assert!(partial > 0.0 && partial < 1.0);

        session.close(&opts(BlockConfig::new().fade_out_ms(400)), Box::new(|| {}));
        assert!(fx.ctx.opacity.get() < partial);

        fx.scheduler.run_until_idle(FRAME_INTERVAL, 100);
        assert!(!shown.get());
    }

    #[test]
    fn test_timeout_scheduled_after_fade_in_and_cleared_on_close() {
        let fx = setup();
        let session = BlockSession::new(fx.ctx.clone());
        let fired = Rc::new(Cell::new(false));
        let fired_clone = fired.clone();

        session.open(
            &opts(BlockConfig::new().fade_in_ms(0).timeout_ms(100)),
            Box::new(move || fired_clone.set(true)),
        );
        assert_eq!(fx.scheduler.pending_timers(), 1);

        session.close(&opts(BlockConfig::new().fade_out_ms(0)), Box::new(|| {}));
        assert_eq!(fx.scheduler.pending_timers(), 0);

        fx.scheduler.advance(Duration::from_millis(500));
        assert!(!fired.get());
    }

    struct BrokenSurface;

    impl Surface for BrokenSurface {
        fn create_overlay_container(&mut self) -> Result<ElementId, SurfaceError> {
            Ok(ElementId(0))
        }
        fn create_backdrop(&mut self) -> Result<ElementId, SurfaceError> {
            Ok(ElementId(1))
        }
        fn create_message_slot(&mut self) -> Result<ElementId, SurfaceError> {
            Ok(ElementId(2))
        }
        fn create_message_container(
            &mut self,
            _class: &str,
            _body: MessageBody<'_>,
        ) -> Result<ElementId, SurfaceError> {
            Err(SurfaceError::UnknownElement(ElementId(3)))
        }
        fn set_visible(&mut self, element: ElementId, _visible: bool) -> Result<(), SurfaceError> {
            Err(SurfaceError::UnknownElement(element))
        }
        fn set_opacity(&mut self, element: ElementId, _opacity: f64) -> Result<(), SurfaceError> {
            Err(SurfaceError::UnknownElement(element))
        }
        fn apply_style(&mut self, element: ElementId, _style: &crate::StyleMap) -> Result<(), SurfaceError> {
            Err(SurfaceError::Rejected {
                element,
                reason: "no styles".to_string(),
            })
        }
        fn append_child(&mut self, _parent: ElementId, child: ElementId) -> Result<(), SurfaceError> {
            Err(SurfaceError::UnknownElement(child))
        }
        fn clear_children(&mut self, element: ElementId) -> Result<(), SurfaceError> {
            Err(SurfaceError::UnknownElement(element))
        }
        fn remove_element(&mut self, element: ElementId) -> Result<(), SurfaceError> {
            Err(SurfaceError::UnknownElement(element))
        }
        fn query_focusable(&self, _element: ElementId) -> Option<ElementId> {
            None
        }
        fn focus(&mut self, element: ElementId) -> Result<(), SurfaceError> {
            Err(SurfaceError::UnknownElement(element))
        }
    }

    #[test]
    fn test_broken_surface_still_completes_cycle() {
        let scheduler = Scheduler::new();
        let keyboard = Keyboard::new();
        let ctx = SessionContext {
            surface: Rc::new(RefCell::new(BrokenSurface)),
            layout: SurfaceLayout {
                root: ElementId(0),
                backdrop: ElementId(1),
                slot: ElementId(2),
            },
            scheduler: scheduler.clone(),
            stepper: AnimationStepper::new(scheduler.clone()),
            trap: Rc::new(InputTrap::new(keyboard.clone())),
            opacity: signal(0.0),
        };

        let events = Rc::new(RefCell::new(Vec::new()));
        let session = BlockSession::new(ctx);

        let blocked = events.clone();
        session.open(
            &opts(BlockConfig::new().on_blocked(move || blocked.borrow_mut().push("blocked"))),
            Box::new(|| {}),
        );
        scheduler.run_until_idle(FRAME_INTERVAL, 100);
        assert!(session.message().is_none());

        let unblocked = events.clone();
        session.close(
            &opts(BlockConfig::new().on_unblocked(move || unblocked.borrow_mut().push("unblocked"))),
            Box::new(|| {}),
        );
        scheduler.run_until_idle(FRAME_INTERVAL, 100);

        assert_eq!(*events.borrow(), vec!["blocked", "unblocked"]);
        assert_eq!(keyboard.capture_count(), 0);
    }
}
