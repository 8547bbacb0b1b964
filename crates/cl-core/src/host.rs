//! Host collaborator traits.
//!
//! The lock engine does not own the canvas it defends. Everything it knows
//! about the host (open views, DOM elements, the canvas object graph) is
//! reached through these traits, implemented once per environment:
//! - WASM: live JS objects and DOM elements (`cl-wasm`)
//! - Tests and headless tooling: `memory::MemoryHost`, behind the `memory` feature
//!
//! Every accessor is total. A missing field, a detached element or an
//! unexpected value shape is reported as `None`/`false`, never as an error.

use std::fmt::Debug;

/// Selector forms the resolver needs. Kept structural so hosts without a
/// CSS engine can answer them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector<'a> {
    /// `[name="value"]`
    Attr { name: &'a str, value: &'a str },
    /// `#value`
    Id(&'a str),
    /// `.name`
    Class(&'a str),
}

impl Selector<'_> {
    /// Render as a CSS selector string.
    pub fn to_css(&self) -> String {
        match self {
            Selector::Attr { name, value } => format!("[{name}=\"{}\"]", css_escape(value)),
            Selector::Id(value) => format!("#{}", css_escape(value)),
            Selector::Class(name) => format!(".{}", css_escape(name)),
        }
    }
}

/// Minimal `CSS.escape` equivalent: backslash-escape anything that is not
/// an identifier character.
fn css_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for (i, c) in s.chars().enumerate() {
        let ident = c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii();
        if i == 0 && c.is_ascii_digit() {
            out.push_str(&format!("\\{:x} ", c as u32));
        } else if ident {
            out.push(c);
        } else {
            out.push('\\');
            out.push(c);
        }
    }
    out
}

/// Class carried by every canvas node element.
pub const NODE_CLASS: &str = "canvas-node";

/// DOM surface of a canvas view.
pub trait Dom {
    /// Element handle. Equality must mean "same live element".
    type Element: Clone + PartialEq + Debug;

    fn parent(&self, el: &Self::Element) -> Option<Self::Element>;

    fn has_class(&self, el: &Self::Element, class: &str) -> bool;

    fn set_class(&mut self, el: &Self::Element, class: &str, on: bool);

    fn attribute(&self, el: &Self::Element, name: &str) -> Option<String>;

    /// Raw inline `style` attribute text (empty when absent).
    fn inline_style(&self, el: &Self::Element) -> String;

    /// Set (`Some`) or remove (`None`) one inline style property.
    fn set_style_property(&mut self, el: &Self::Element, name: &str, value: Option<&str>);

    /// First descendant of `root` (excluding `root`) matching `selector`.
    fn find(&self, root: &Self::Element, selector: Selector<'_>) -> Option<Self::Element>;

    /// All descendants of `root` matching `selector`, in document order.
    fn find_all(&self, root: &Self::Element, selector: Selector<'_>) -> Vec<Self::Element>;

    /// `true` if `el` is `ancestor` or lies beneath it.
    fn contains(&self, ancestor: &Self::Element, el: &Self::Element) -> bool;

    /// Nearest ancestor-or-self carrying `class`.
    fn closest_with_class(&self, el: &Self::Element, class: &str) -> Option<Self::Element> {
        let mut cur = Some(el.clone());
        while let Some(e) = cur {
            if self.has_class(&e, class) {
                return Some(e);
            }
            cur = self.parent(&e);
        }
        None
    }
}

/// Structural access to the host's canvas object graph.
///
/// Object handles are opaque; the engine never assumes a class hierarchy and
/// only asks "does this field exist, and is it a number / object / element".
pub trait ObjectModel: Dom {
    type Object: Clone + Debug;

    /// Nested object stored under `name`, if it is an object.
    fn field(&self, obj: &Self::Object, name: &str) -> Option<Self::Object>;

    /// Finite number stored under `name`.
    fn number(&self, obj: &Self::Object, name: &str) -> Option<f64>;

    /// Overwrite a numeric field. Returns `false` when the field is absent or
    /// not a number, leaving the object untouched.
    fn set_number(&mut self, obj: &Self::Object, name: &str, value: f64) -> bool;

    /// String stored under `name`.
    fn string(&self, obj: &Self::Object, name: &str) -> Option<String>;

    /// The object itself, when it is a bare string.
    fn as_string(&self, obj: &Self::Object) -> Option<String>;

    /// Element stored under `name`.
    fn element_field(&self, obj: &Self::Object, name: &str) -> Option<Self::Element>;

    /// Keyed lookup in a map-like collection (a map, or plain object keys).
    fn lookup(&self, collection: &Self::Object, key: &str) -> Option<Self::Object>;

    /// Members of a set, an array, or any iterable. `None` if not iterable.
    fn members(&self, collection: &Self::Object) -> Option<Vec<Self::Object>>;

    /// Call a zero-argument method. `None` when no such method exists,
    /// `Some(Err(_))` when it threw.
    fn invoke(&mut self, obj: &Self::Object, method: &str) -> Option<Result<(), String>>;
}

/// Open canvas views known to the host.
pub trait Workspace: ObjectModel {
    /// Opaque view handle.
    type View: Clone + PartialEq + Debug;

    fn canvas_views(&self) -> Vec<Self::View>;

    /// The most recently focused canvas view.
    fn most_recent_view(&self) -> Option<Self::View>;

    fn view_path(&self, view: &Self::View) -> Option<String>;

    fn view_container(&self, view: &Self::View) -> Option<Self::Element>;

    /// The view's internal canvas object (node registry, selection, redraw).
    fn view_canvas(&self, view: &Self::View) -> Option<Self::Object>;
}

/// Side effects the engine asks the host to perform on its behalf.
pub trait Session: Dom {
    /// Start observing style-attribute changes anywhere under `container`.
    fn attach_observer(&mut self, container: &Self::Element);

    fn detach_observer(&mut self);

    /// Register pointer/keyboard listeners (capture phase) on `container`.
    fn attach_input_guard(&mut self, container: &Self::Element);

    fn detach_input_guard(&mut self);

    /// Schedule one `on_frame` call on the next display refresh.
    fn request_frame(&mut self);

    fn cancel_frame(&mut self);
}

/// Everything the lock engine needs from its host.
pub trait CanvasHost: Workspace + Session {}

impl<T: Workspace + Session> CanvasHost for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectors_render_as_css() {
        assert_eq!(
            Selector::Attr {
                name: "data-node-id",
                value: "a1"
            }
            .to_css(),
            "[data-node-id=\"a1\"]"
        );
        assert_eq!(Selector::Class("canvas-node").to_css(), ".canvas-node");
    }

    #[test]
    fn ids_are_escaped() {
        assert_eq!(Selector::Id("9f.x").to_css(), "#\\39 f\\.x");
        assert_eq!(Selector::Id("plain_id").to_css(), "#plain_id");
    }
}
