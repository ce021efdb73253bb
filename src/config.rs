//! Block configuration.
//!
//! Three layers:
//!
//! - [`BlockDefaults`] - process constants, loadable from TOML
//! - [`BlockConfig`] - per-call overrides (builder, every field optional)
//! - [`BlockOptions`] - the shallow merge of the two, fixed for one call
//!
//! Merging is shallow: a style map given at call time replaces the default
//! map for that field wholesale, it is never merged property by property.
//!
//! # Example
//!
//! ```
//! use spark_blockui::{BlockConfig, BlockDefaults, Message};
//!
//! let defaults = BlockDefaults::default();
//! let opts = BlockConfig::new()
//!     .message(Message::Spinner)
//!     .fade_in_ms(0)
//!     .timeout_ms(500)
//!     .resolve(&defaults);
//!
//! assert_eq!(opts.fade_in_ms, 0);
//! assert_eq!(opts.fade_out_ms, defaults.fade_out_ms);
//! ```

use std::fmt;
use std::path::Path;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{style_map, Message, StyleMap};

/// Zero-argument lifecycle callback.
pub type Callback = Rc<dyn Fn()>;

// =============================================================================
// DEFAULTS
// =============================================================================

/// Message used when a call does not name one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultMessage {
    Markup(String),
    Spinner,
}

impl From<&DefaultMessage> for Message {
    fn from(message: &DefaultMessage) -> Self {
        match message {
            DefaultMessage::Markup(text) => Message::Markup(text.clone()),
            DefaultMessage::Spinner => Message::Spinner,
        }
    }
}

/// Process-wide defaults every call is merged over.
///
/// ```toml
/// fade_in_ms = 150
/// constrain_tab_key = false
/// message = { markup = "<h2>Saving...</h2>" }
///
/// [overlay_style]
/// background = "#000"
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockDefaults {
    pub message: DefaultMessage,
    pub style: StyleMap,
    pub overlay_style: StyleMap,
    pub fade_in_ms: u32,
    pub fade_out_ms: u32,
    /// 0 = never auto-unblock
    pub timeout_ms: u32,
    pub show_overlay: bool,
    pub focus_first_input: bool,
    pub ignore_if_already_blocked: bool,
    pub bind_keyboard_trap: bool,
    pub constrain_tab_key: bool,
    pub theme: bool,
    /// Preset applied after `style` when `theme` is set.
    pub theme_style: StyleMap,
    /// Class given to synthesized message containers.
    pub message_class: String,
    /// Stacking order applied to the overlay root.
    pub base_z: u32,
}

impl Default for BlockDefaults {
    fn default() -> Self {
        Self {
            message: DefaultMessage::Markup("<h1>Please wait...</h1>".to_string()),
            style: StyleMap::new(),
            overlay_style: StyleMap::new(),
            fade_in_ms: 200,
            fade_out_ms: 400,
            timeout_ms: 0,
            show_overlay: true,
            focus_first_input: true,
            ignore_if_already_blocked: false,
            bind_keyboard_trap: true,
            constrain_tab_key: true,
            theme: false,
            theme_style: style_map([("width", "30%"), ("top", "40%"), ("left", "35%")]),
            message_class: "blockui-message".to_string(),
            base_z: 1000,
        }
    }
}

impl BlockDefaults {
    /// Parse defaults from TOML. Missing keys keep their built-in value.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Read and parse a TOML defaults file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
            path: path.to_path_buf(),
            error,
        })?;
        Self::from_toml_str(&source)
    }
}

// =============================================================================
// PER-CALL OVERRIDES
// =============================================================================

/// Overrides for one `block`/`unblock` call. Unset fields fall back to the
/// manager's [`BlockDefaults`].
#[derive(Clone, Default)]
pub struct BlockConfig {
    pub message: Option<Message>,
    pub style: Option<StyleMap>,
    pub overlay_style: Option<StyleMap>,
    pub fade_in_ms: Option<u32>,
    pub fade_out_ms: Option<u32>,
    pub timeout_ms: Option<u32>,
    pub show_overlay: Option<bool>,
    pub focus_first_input: Option<bool>,
    pub ignore_if_already_blocked: Option<bool>,
    pub bind_keyboard_trap: Option<bool>,
    pub constrain_tab_key: Option<bool>,
    pub theme: Option<bool>,
    pub theme_style: Option<StyleMap>,
    pub message_class: Option<String>,
    pub base_z: Option<u32>,
    pub on_blocked: Option<Callback>,
    pub on_unblocked: Option<Callback>,
}

impl BlockConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message(mut self, message: impl Into<Message>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn style(mut self, style: StyleMap) -> Self {
        self.style = Some(style);
        self
    }

    pub fn overlay_style(mut self, style: StyleMap) -> Self {
        self.overlay_style = Some(style);
        self
    }

    pub fn fade_in_ms(mut self, ms: u32) -> Self {
        self.fade_in_ms = Some(ms);
        self
    }

    pub fn fade_out_ms(mut self, ms: u32) -> Self {
        self.fade_out_ms = Some(ms);
        self
    }

    /// Both fades at once.
    pub fn fades_ms(self, fade_in: u32, fade_out: u32) -> Self {
        self.fade_in_ms(fade_in).fade_out_ms(fade_out)
    }

    pub fn timeout_ms(mut self, ms: u32) -> Self {
        self.timeout_ms = Some(ms);
        self
    }

    pub fn show_overlay(mut self, show: bool) -> Self {
        self.show_overlay = Some(show);
        self
    }

    pub fn focus_first_input(mut self, focus: bool) -> Self {
        self.focus_first_input = Some(focus);
        self
    }

    pub fn ignore_if_already_blocked(mut self, ignore: bool) -> Self {
        self.ignore_if_already_blocked = Some(ignore);
        self
    }

    pub fn bind_keyboard_trap(mut self, bind: bool) -> Self {
        self.bind_keyboard_trap = Some(bind);
        self
    }

    pub fn constrain_tab_key(mut self, constrain: bool) -> Self {
        self.constrain_tab_key = Some(constrain);
        self
    }

    pub fn theme(mut self, theme: bool) -> Self {
        self.theme = Some(theme);
        self
    }

    pub fn theme_style(mut self, style: StyleMap) -> Self {
        self.theme_style = Some(style);
        self
    }

    pub fn message_class(mut self, class: impl Into<String>) -> Self {
        self.message_class = Some(class.into());
        self
    }

    pub fn base_z(mut self, z: u32) -> Self {
        self.base_z = Some(z);
        self
    }

    pub fn on_blocked<F>(mut self, callback: F) -> Self
    where
        F: Fn() + 'static,
    {
        self.on_blocked = Some(Rc::new(callback));
        self
    }

    pub fn on_unblocked<F>(mut self, callback: F) -> Self
    where
        F: Fn() + 'static,
    {
        self.on_unblocked = Some(Rc::new(callback));
        self
    }

    /// Shallow merge over `defaults`.
    pub fn resolve(&self, defaults: &BlockDefaults) -> BlockOptions {
        BlockOptions {
            message: self
                .message
                .clone()
                .unwrap_or_else(|| Message::from(&defaults.message)),
            style: self.style.clone().unwrap_or_else(|| defaults.style.clone()),
            overlay_style: self
                .overlay_style
                .clone()
                .unwrap_or_else(|| defaults.overlay_style.clone()),
            fade_in_ms: self.fade_in_ms.unwrap_or(defaults.fade_in_ms),
            fade_out_ms: self.fade_out_ms.unwrap_or(defaults.fade_out_ms),
            timeout_ms: self.timeout_ms.unwrap_or(defaults.timeout_ms),
            show_overlay: self.show_overlay.unwrap_or(defaults.show_overlay),
            focus_first_input: self.focus_first_input.unwrap_or(defaults.focus_first_input),
            ignore_if_already_blocked: self
                .ignore_if_already_blocked
                .unwrap_or(defaults.ignore_if_already_blocked),
            bind_keyboard_trap: self.bind_keyboard_trap.unwrap_or(defaults.bind_keyboard_trap),
            constrain_tab_key: self.constrain_tab_key.unwrap_or(defaults.constrain_tab_key),
            theme: self.theme.unwrap_or(defaults.theme),
            theme_style: self
                .theme_style
                .clone()
                .unwrap_or_else(|| defaults.theme_style.clone()),
            message_class: self
                .message_class
                .clone()
                .unwrap_or_else(|| defaults.message_class.clone()),
            base_z: self.base_z.unwrap_or(defaults.base_z),
            on_blocked: self.on_blocked.clone(),
            on_unblocked: self.on_unblocked.clone(),
        }
    }
}

impl fmt::Debug for BlockConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockConfig")
            .field("message", &self.message)
            .field("fade_in_ms", &self.fade_in_ms)
            .field("fade_out_ms", &self.fade_out_ms)
            .field("timeout_ms", &self.timeout_ms)
            .field("ignore_if_already_blocked", &self.ignore_if_already_blocked)
            .field("bind_keyboard_trap", &self.bind_keyboard_trap)
            .field("on_blocked", &self.on_blocked.is_some())
            .field("on_unblocked", &self.on_unblocked.is_some())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// RESOLVED OPTIONS
// =============================================================================

/// Fully resolved configuration for one call.
#[derive(Clone)]
pub struct BlockOptions {
    pub message: Message,
    pub style: StyleMap,
    pub overlay_style: StyleMap,
    pub fade_in_ms: u32,
    pub fade_out_ms: u32,
    pub timeout_ms: u32,
    pub show_overlay: bool,
    pub focus_first_input: bool,
    pub ignore_if_already_blocked: bool,
    pub bind_keyboard_trap: bool,
    pub constrain_tab_key: bool,
    pub theme: bool,
    pub theme_style: StyleMap,
    pub message_class: String,
    pub base_z: u32,
    pub on_blocked: Option<Callback>,
    pub on_unblocked: Option<Callback>,
}

impl BlockOptions {
    /// Style for the message container: `style`, then the theme preset on top.
    pub fn message_style(&self) -> StyleMap {
        let mut style = self.style.clone();
        if self.theme {
            style.extend(self.theme_style.clone());
        }
        style
    }
}

impl fmt::Debug for BlockOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockOptions")
            .field("message", &self.message)
            .field("fade_in_ms", &self.fade_in_ms)
            .field("fade_out_ms", &self.fade_out_ms)
            .field("timeout_ms", &self.timeout_ms)
            .field("show_overlay", &self.show_overlay)
            .field("bind_keyboard_trap", &self.bind_keyboard_trap)
            .field("constrain_tab_key", &self.constrain_tab_key)
            .field("theme", &self.theme)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// TESTS
// =============================================================================
