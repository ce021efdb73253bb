//! State Module - Runtime input state
//!
//! - **Keyboard** - Event types, dispatch, handler registry
//! - **Trap** - Keyboard trap installed while blocked
//! - **Input** - crossterm conversion and polling

pub mod input;
pub mod keyboard;
pub mod trap;

pub use keyboard::*;
pub use trap::*;
