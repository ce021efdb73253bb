//! Core types for spark-blockui.
//!
//! Surface element handles, style maps, the message variant and the
//! lifecycle enums shared by the stepper, session and manager.

use std::collections::BTreeMap;
use std::fmt;

// =============================================================================
// ELEMENT HANDLES
// =============================================================================

/// Opaque handle to an element owned by a [`Surface`](crate::Surface).
///
/// The surface decides what the number means (an index into an arena, a
/// node id in a retained tree, ...). The core only passes it back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub usize);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// =============================================================================
// STYLE MAPS
// =============================================================================

/// Style property → value. Passed through to the surface unvalidated.
pub type StyleMap = BTreeMap<String, String>;

/// Build a [`StyleMap`] from `(property, value)` pairs.
///
/// ```
/// use spark_blockui::style_map;
///
/// let style = style_map([("width", "30%"), ("top", "40%")]);
/// assert_eq!(style.get("width").map(String::as_str), Some("30%"));
/// ```
pub fn style_map<I, K, V>(pairs: I) -> StyleMap
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

// =============================================================================
// MESSAGE
// =============================================================================

/// What to show inside the overlay while blocked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    /// Markup text, wrapped in a container carrying the message class.
    Markup(String),
    /// Pre-built content, appended as-is.
    Content(ElementId),
    /// The built-in spinner.
    Spinner,
}

impl Message {
    /// Markup message from anything string-like.
    pub fn markup(text: impl Into<String>) -> Self {
        Self::Markup(text.into())
    }
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Self::Markup(text.to_string())
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Self::Markup(text)
    }
}

impl From<ElementId> for Message {
    fn from(id: ElementId) -> Self {
        Self::Content(id)
    }
}

// =============================================================================
// LIFECYCLE ENUMS
// =============================================================================

/// Direction of a fade ramp.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// 0 → 1
    In,
    /// 1 → 0
    Out,
}

impl Direction {
    /// The value a ramp in this direction ends on.
    pub fn terminal(self) -> f64 {
        match self {
            Self::In => 1.0,
            Self::Out => 0.0,
        }
    }

    pub(crate) fn sign(self) -> f64 {
        match self {
            Self::In => 1.0,
            Self::Out => -1.0,
        }
    }
}

/// Visual state of the block manager.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BlockState {
    /// Count is zero and the overlay is hidden.
    #[default]
    Hidden,
    /// Count is at least one; fade-in in flight or complete.
    Showing,
    /// Count dropped to zero; fade-out in flight.
    Hiding,
}
