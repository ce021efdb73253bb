//! Surface - The visual collaborator the overlay draws through
//!
//! The block lifecycle never touches pixels or terminal cells. It asks a
//! [`Surface`] to create elements, toggle visibility, set opacity and apply
//! style maps, and leaves rendering to the implementation.
//!
//! # Element layout
//!
//! ```text
//! overlay container (root: display + opacity + z-index)
//! ├── backdrop        (dimming layer, toggled by show_overlay)
//! └── message slot    (holds the current message)
//!     └── message container (markup / spinner / caller content)
//! ```
//!
//! [`MemorySurface`] is a complete in-memory implementation: an element
//! arena with classes, styles, visibility, opacity and focus. Removed
//! elements return their slot to a free list. Hosts can render from it
//! directly or use it in tests.

use tracing::trace;

use crate::error::SurfaceError;
use crate::types::{ElementId, StyleMap};

/// Body of a synthesized message container.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageBody<'a> {
    Markup(&'a str),
    Spinner,
}

/// Element operations the block lifecycle needs from its host.
///
/// Style maps are passed through unvalidated; an implementation may ignore
/// unknown properties or reject them with [`SurfaceError::Rejected`].
pub trait Surface {
    /// Root element wrapping the backdrop and the message slot.
    fn create_overlay_container(&mut self) -> Result<ElementId, SurfaceError>;

    /// Full-viewport dimming layer.
    fn create_backdrop(&mut self) -> Result<ElementId, SurfaceError>;

    /// Holder the current message is appended to.
    fn create_message_slot(&mut self) -> Result<ElementId, SurfaceError>;

    /// Message container with the given class and body.
    fn create_message_container(
        &mut self,
        class: &str,
        body: MessageBody<'_>,
    ) -> Result<ElementId, SurfaceError>;

    /// Display on/off.
    fn set_visible(&mut self, element: ElementId, visible: bool) -> Result<(), SurfaceError>;

    fn set_opacity(&mut self, element: ElementId, opacity: f64) -> Result<(), SurfaceError>;

    /// Apply every property in `style`; properties not named keep their value.
    fn apply_style(&mut self, element: ElementId, style: &StyleMap) -> Result<(), SurfaceError>;

    fn append_child(&mut self, parent: ElementId, child: ElementId) -> Result<(), SurfaceError>;

    /// Detach every child of `element`. The children stay alive.
    fn clear_children(&mut self, element: ElementId) -> Result<(), SurfaceError>;

    /// Destroy `element` and its descendants, detaching it first.
    /// Handles to destroyed elements are invalid afterwards.
    fn remove_element(&mut self, element: ElementId) -> Result<(), SurfaceError>;

    /// First input-like descendant of `element`, in document order.
    fn query_focusable(&self, element: ElementId) -> Option<ElementId>;

    fn focus(&mut self, element: ElementId) -> Result<(), SurfaceError>;
}

// =============================================================================
// MEMORY SURFACE
// =============================================================================

/// What an element is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ElementKind {
    Container,
    Markup(String),
    Spinner,
    /// Focusable input-like element (input, select, textarea).
    Input,
}

/// One node of the [`MemorySurface`] arena.
#[derive(Clone, Debug, PartialEq)]
pub struct Element {
    pub class: String,
    pub kind: ElementKind,
    pub style: StyleMap,
    pub visible: bool,
    pub opacity: f64,
    pub parent: Option<ElementId>,
    pub children: Vec<ElementId>,
}

impl Element {
    fn new(class: &str, kind: ElementKind) -> Self {
        Self {
            class: class.to_string(),
            kind,
            style: StyleMap::new(),
            visible: true,
            opacity: 1.0,
            parent: None,
            children: Vec::new(),
        }
    }
}

const INPUT_TAGS: [&str; 3] = ["<input", "<select", "<textarea"];

/// Input-like tags in `markup`, in order of appearance.
fn input_tags(markup: &str) -> Vec<&'static str> {
    let lower = markup.to_ascii_lowercase();
    let lower = lower.as_str();
    let mut found: Vec<(usize, &'static str)> = INPUT_TAGS
        .iter()
        .flat_map(|&tag| {
            lower
                .match_indices(tag)
                .filter(move |(pos, _)| {
                    // "<input" must not match "<inputs"
                    lower[pos + tag.len()..]
                        .chars()
                        .next()
                        .is_none_or(|c| c.is_whitespace() || c == '>' || c == '/')
                })
                .map(move |(pos, _)| (pos, &tag[1..]))
        })
        .collect();
    found.sort_by_key(|(pos, _)| *pos);
    found.into_iter().map(|(_, tag)| tag).collect()
}

/// In-memory element tree.
#[derive(Clone, Debug, Default)]
pub struct MemorySurface {
    elements: Vec<Option<Element>>,
    /// Pool of freed slots for reuse.
    free: Vec<usize>,
    focused: Option<ElementId>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(id.0).and_then(Option::as_ref)
    }

    /// Live elements.
    pub fn len(&self) -> usize {
        self.elements.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slots ever allocated, live or free.
    pub fn capacity(&self) -> usize {
        self.elements.len()
    }

    pub fn focused(&self) -> Option<ElementId> {
        self.focused
    }

    /// Detached container, for building pre-built message content.
    pub fn create_container(&mut self, class: &str) -> ElementId {
        self.push(Element::new(class, ElementKind::Container))
    }

    /// Detached focusable input.
    pub fn create_input(&mut self, class: &str) -> ElementId {
        self.push(Element::new(class, ElementKind::Input))
    }

    /// Visible means this element and every ancestor are displayed.
    pub fn is_rendered(&self, id: ElementId) -> bool {
        let mut current = Some(id);
        while let Some(id) = current {
            match self.element(id) {
                Some(el) if el.visible => current = el.parent,
                _ => return false,
            }
        }
        true
    }

    fn push(&mut self, element: Element) -> ElementId {
        // Reuse free slot or allocate new
        if let Some(index) = self.free.pop() {
            self.elements[index] = Some(element);
            return ElementId(index);
        }
        self.elements.push(Some(element));
        ElementId(self.elements.len() - 1)
    }

    fn slot_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.elements.get_mut(id.0).and_then(Option::as_mut)
    }

    fn get_mut(&mut self, id: ElementId) -> Result<&mut Element, SurfaceError> {
        self.slot_mut(id).ok_or(SurfaceError::UnknownElement(id))
    }

    fn detach(&mut self, child: ElementId) {
        let parent = self.element(child).and_then(|el| el.parent);
        if let Some(parent) = parent {
            if let Some(el) = self.slot_mut(parent) {
                el.children.retain(|c| *c != child);
            }
        }
        if let Some(el) = self.slot_mut(child) {
            el.parent = None;
        }
    }

    /// Drop focus if it sits inside the subtree rooted at `root`.
    fn blur_within(&mut self, root: ElementId) {
        if self.focused.is_some_and(|focused| self.is_ancestor(root, focused)) {
            trace!(%root, "focus left the tree");
            self.focused = None;
        }
    }

    fn is_ancestor(&self, ancestor: ElementId, of: ElementId) -> bool {
        let mut current = Some(of);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.element(id).and_then(|el| el.parent);
        }
        false
    }
}

impl Surface for MemorySurface {
    fn create_overlay_container(&mut self) -> Result<ElementId, SurfaceError> {
        let mut root = Element::new("blockui", ElementKind::Container);
        root.visible = false;
        Ok(self.push(root))
    }

    fn create_backdrop(&mut self) -> Result<ElementId, SurfaceError> {
        Ok(self.push(Element::new("blockui-overlay", ElementKind::Container)))
    }

    fn create_message_slot(&mut self) -> Result<ElementId, SurfaceError> {
        Ok(self.push(Element::new("blockui-container", ElementKind::Container)))
    }

    fn create_message_container(
        &mut self,
        class: &str,
        body: MessageBody<'_>,
    ) -> Result<ElementId, SurfaceError> {
        let message = self.push(Element::new(class, ElementKind::Container));
        match body {
            MessageBody::Markup(markup) => {
                let text = self.push(Element::new("", ElementKind::Markup(markup.to_string())));
                self.append_child(message, text)?;
                for tag in input_tags(markup) {
                    let input = self.create_input(tag);
                    self.append_child(message, input)?;
                }
            }
            MessageBody::Spinner => {
                let spinner = self.push(Element::new("blockui-spinner", ElementKind::Spinner));
                self.append_child(message, spinner)?;
            }
        }
        Ok(message)
    }

    fn set_visible(&mut self, element: ElementId, visible: bool) -> Result<(), SurfaceError> {
        self.get_mut(element)?.visible = visible;
        Ok(())
    }

    fn set_opacity(&mut self, element: ElementId, opacity: f64) -> Result<(), SurfaceError> {
        self.get_mut(element)?.opacity = opacity;
        Ok(())
    }

    fn apply_style(&mut self, element: ElementId, style: &StyleMap) -> Result<(), SurfaceError> {
        let el = self.get_mut(element)?;
        for (property, value) in style {
            el.style.insert(property.clone(), value.clone());
        }
        Ok(())
    }

    fn append_child(&mut self, parent: ElementId, child: ElementId) -> Result<(), SurfaceError> {
        self.get_mut(parent)?;
        self.get_mut(child)?;
        if self.is_ancestor(child, parent) {
            return Err(SurfaceError::Rejected {
                element: child,
                reason: format!("cannot append an ancestor of {parent}"),
            });
        }
        self.detach(child);
        self.get_mut(child)?.parent = Some(parent);
        self.get_mut(parent)?.children.push(child);
        Ok(())
    }

    fn clear_children(&mut self, element: ElementId) -> Result<(), SurfaceError> {
        let children = std::mem::take(&mut self.get_mut(element)?.children);
        for child in children {
            if let Some(el) = self.slot_mut(child) {
                el.parent = None;
            }
            self.blur_within(child);
        }
        Ok(())
    }

    fn remove_element(&mut self, element: ElementId) -> Result<(), SurfaceError> {
        self.get_mut(element)?;
        self.blur_within(element);
        self.detach(element);

        let mut stack = vec![element];
        while let Some(id) = stack.pop() {
            if let Some(el) = self.elements.get_mut(id.0).and_then(Option::take) {
                stack.extend(el.children);
                self.free.push(id.0);
            }
        }
        trace!(%element, "element removed");
        Ok(())
    }

    fn query_focusable(&self, element: ElementId) -> Option<ElementId> {
        let root = self.element(element)?;
        let mut stack: Vec<ElementId> = root.children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let el = self.element(id)?;
            if el.kind == ElementKind::Input {
                return Some(id);
            }
            stack.extend(el.children.iter().rev().copied());
        }
        None
    }

    fn focus(&mut self, element: ElementId) -> Result<(), SurfaceError> {
        self.get_mut(element)?;
        trace!(%element, "focus");
        self.focused = Some(element);
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
