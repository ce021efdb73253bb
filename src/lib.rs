//! # spark-blockui
//!
//! Reentrant UI-blocking overlay for spark-tui hosts.
//!
//! While a long-running operation proceeds, the overlay covers the
//! interface, fades in, and swallows keyboard input; when the last
//! outstanding `block` is matched by an `unblock`, it fades out and hands
//! the keyboard back.
//!
//! ## Architecture
//!
//! ```text
//! BlockManager ── count 0 → 1 ──▶ BlockSession::open ──▶ Surface (elements, style)
//!      │                              │                 AnimationStepper (fade in)
//!      │                              └───────────────▶ InputTrap (Keyboard capture)
//!      └────── count 1 → 0 ──▶ BlockSession::close ───▶ AnimationStepper (fade out)
//! ```
//!
//! Everything runs on one thread. The host drives time through the shared
//! [`Scheduler`]: one [`Scheduler::tick`] per display refresh.
//!
//! ## Modules
//!
//! - [`types`] - Element handles, style maps, message variant
//! - [`config`] - Defaults, per-call overrides, resolved options
//! - [`scheduler`] - Cooperative frame/timer queue
//! - [`animate`] - Cancelable fade ramps
//! - [`state`] - Keyboard registry, input trap, crossterm bridge
//! - [`surface`] - Surface trait and in-memory implementation
//! - [`manager`] - The block/unblock entry points

pub mod animate;
pub mod config;
pub mod error;
pub mod manager;
pub mod scheduler;
mod session;
pub mod state;
pub mod surface;
pub mod types;

// Re-export commonly used items
pub use types::*;

pub use animate::{AnimationStepper, FRAME_INCREMENT_MS};
pub use config::{BlockConfig, BlockDefaults, BlockOptions, Callback, DefaultMessage};
pub use error::{ConfigError, SurfaceError};
pub use manager::BlockManager;
pub use scheduler::{Scheduler, TimerId, FRAME_INTERVAL};
pub use session::SurfaceLayout;
pub use state::{
    InputTrap, KeyState, Keyboard, KeyboardEvent, Modifiers, TrapPolicy,
};
pub use surface::{Element, ElementKind, MemorySurface, MessageBody, Surface};
