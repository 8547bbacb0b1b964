//! Identity resolver: node id → live element, node id → live record.
//!
//! Host versions disagree on where things live, so every lookup walks a
//! fixed list of known conventions and returns `None` when none applies.
//! `None` is never an error: the canvas may be mid-render or the node may
//! have been deleted, and the caller simply skips the node this pass.

use cl_core::host::{Dom, ObjectModel, Selector, Workspace};
use cl_core::{CanvasPath, InlineStyle, NODE_CLASS, NodeId};
use std::fmt;

/// Record fields that may hold the node's element, in probe order.
pub const ELEMENT_FIELDS: [&str; 4] = ["nodeEl", "containerEl", "contentEl", "el"];

/// Attributes that may carry a node id on its element, in probe order.
pub const ID_ATTRIBUTES: [&str; 3] = ["data-node-id", "data-id", "data-canvas-node-id"];

/// Ancestors inspected above the node element when looking for the element
/// that carries positioning style.
pub const MOVE_ELEMENT_DEPTH: usize = 3;

/// Nested selection fields tried when the selection is not itself iterable.
const SELECTION_FIELDS: [&str; 3] = ["nodes", "items", "selection"];

/// One open canvas, as seen by the engine.
pub struct CanvasContext<H: Workspace> {
    pub view: H::View,
    pub path: CanvasPath,
    pub container: H::Element,
    /// The view's internal canvas object; absent while the view is loading.
    pub canvas: Option<H::Object>,
}

impl<H: Workspace> Clone for CanvasContext<H> {
    fn clone(&self) -> Self {
        Self {
            view: self.view.clone(),
            path: self.path,
            container: self.container.clone(),
            canvas: self.canvas.clone(),
        }
    }
}

impl<H: Workspace> fmt::Debug for CanvasContext<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CanvasContext")
            .field("path", &self.path)
            .field("view", &self.view)
            .field("container", &self.container)
            .finish_non_exhaustive()
    }
}

impl<H: Workspace> CanvasContext<H> {
    /// Context of a view. `None` when the view has no path or container yet.
    pub fn of_view(host: &H, view: H::View) -> Option<Self> {
        let path = host.view_path(&view)?;
        let container = host.view_container(&view)?;
        let canvas = host.view_canvas(&view);
        Some(Self {
            view,
            path: CanvasPath::intern(&path),
            container,
            canvas,
        })
    }

    /// Context of the most recently focused canvas view.
    pub fn active(host: &H) -> Option<Self> {
        Self::of_view(host, host.most_recent_view()?)
    }

    /// Context of the open view showing `path`.
    pub fn find(host: &H, path: CanvasPath) -> Option<Self> {
        host.canvas_views()
            .into_iter()
            .filter(|view| host.view_path(view).as_deref() == Some(path.as_str()))
            .find_map(|view| Self::of_view(host, view))
    }

    /// Same view, same container element.
    pub fn same_session(&self, other: &Self) -> bool {
        self.path == other.path && self.view == other.view && self.container == other.container
    }
}

/// The canvas node element for `el`: itself or an ancestor carrying
/// [`NODE_CLASS`], else the first such descendant.
pub fn nearest_node<H: Dom>(host: &H, el: &H::Element) -> Option<H::Element> {
    host.closest_with_class(el, NODE_CLASS)
        .or_else(|| host.find(el, Selector::Class(NODE_CLASS)))
}

/// Like [`nearest_node`], but keep `el` when no node element is around it.
fn narrow<H: Dom>(host: &H, el: H::Element) -> H::Element {
    nearest_node(host, &el).unwrap_or(el)
}

/// Backing object of a node from the canvas registry.
pub fn node_object<H: Workspace>(host: &H, ctx: &CanvasContext<H>, id: NodeId) -> Option<H::Object> {
    let registry = host.field(ctx.canvas.as_ref()?, "nodes")?;
    if let Some(obj) = host.lookup(&registry, id.as_str()) {
        return Some(obj);
    }
    host.members(&registry)?
        .into_iter()
        .find(|obj| host.string(obj, "id").as_deref() == Some(id.as_str()))
}

/// Element of a node held by its record.
fn element_from_record<H: ObjectModel>(host: &H, obj: &H::Object) -> Option<H::Element> {
    ELEMENT_FIELDS
        .iter()
        .find_map(|field| host.element_field(obj, field))
        .map(|el| narrow(host, el))
}

/// Live element of a node: registry first, then DOM conventions.
pub fn node_element<H: Workspace>(host: &H, ctx: &CanvasContext<H>, id: NodeId) -> Option<H::Element> {
    if let Some(el) = node_object(host, ctx, id).and_then(|obj| element_from_record(host, &obj)) {
        return Some(el);
    }
    let value = id.as_str();
    ID_ATTRIBUTES
        .iter()
        .find_map(|name| host.find(&ctx.container, Selector::Attr { name, value }))
        .or_else(|| host.find(&ctx.container, Selector::Id(value)))
        .map(|el| narrow(host, el))
}

/// Node id of a node element: attribute conventions, then a registry scan.
pub fn node_id_of<H: Workspace>(host: &H, ctx: &CanvasContext<H>, node_el: &H::Element) -> Option<NodeId> {
    let from_attr = ID_ATTRIBUTES
        .iter()
        .chain(std::iter::once(&"id"))
        .find_map(|name| host.attribute(node_el, name))
        .filter(|v| !v.is_empty());
    if let Some(id) = from_attr {
        return Some(NodeId::intern(&id));
    }
    let registry = host.field(ctx.canvas.as_ref()?, "nodes")?;
    host.members(&registry)?.into_iter().find_map(|obj| {
        let el = element_from_record(host, &obj)?;
        if el != *node_el {
            return None;
        }
        host.string(&obj, "id").map(|id| NodeId::intern(&id))
    })
}

/// Element whose inline style actually positions `node_el`: the node element
/// or one of its first [`MOVE_ELEMENT_DEPTH`] ancestors, whichever first
/// declares `transform`, `left`, `top`, `width` or `height`. Falls back to the
/// node element.
pub fn move_element<H: Dom>(host: &H, node_el: &H::Element, container: &H::Element) -> H::Element {
    let mut cur = Some(node_el.clone());
    for _ in 0..=MOVE_ELEMENT_DEPTH {
        let Some(el) = cur else {
            break;
        };
        if el == *container {
            break;
        }
        if InlineStyle::parse(&host.inline_style(&el)).has_positional() {
            return el;
        }
        cur = host.parent(&el);
    }
    node_el.clone()
}

/// Ids of the currently selected nodes, whatever shape the selection has.
pub fn selected_ids<H: Workspace>(host: &H, ctx: &CanvasContext<H>) -> Vec<NodeId> {
    let Some(selection) = ctx.canvas.as_ref().and_then(|c| host.field(c, "selection")) else {
        return Vec::new();
    };
    let members = host.members(&selection).or_else(|| {
        SELECTION_FIELDS
            .iter()
            .filter_map(|f| host.field(&selection, f))
            .find_map(|nested| host.members(&nested))
    });
    let mut ids: Vec<NodeId> = Vec::new();
    for member in members.unwrap_or_default() {
        let id = host
            .as_string(&member)
            .or_else(|| host.string(&member, "id"));
        if let Some(id) = id.filter(|s| !s.is_empty()).map(|s| NodeId::intern(&s))
            && !ids.contains(&id)
        {
            ids.push(id);
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use cl_core::memory::{IdConvention, MemoryHost, NodeLayout, SelectionShape};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn host_with(layout: NodeLayout) -> (MemoryHost, CanvasContext<MemoryHost>) {
        let mut host = MemoryHost::new();
        let view = host.add_canvas("r.canvas");
        host.add_node(view, "a", json!({"x": 0.0, "y": 0.0, "width": 10.0, "height": 10.0}), layout);
        host.add_node(view, "b", json!({"pos": {"x": 5.0, "y": 5.0}}), layout);
        let ctx = CanvasContext::active(&host).unwrap();
        (host, ctx)
    }

    #[test]
    fn views_are_found_by_path() {
        let mut host = MemoryHost::new();
        let first = host.add_canvas("one.canvas");
        host.add_canvas("two.canvas");
        let ctx = CanvasContext::find(&host, CanvasPath::intern("one.canvas")).unwrap();
        assert_eq!(ctx.view, first);
        assert!(CanvasContext::find(&host, CanvasPath::intern("three.canvas")).is_none());
    }

    #[test]
    fn registry_element_fields_win() {
        let (host, ctx) = host_with(NodeLayout::default());
        let view = ctx.view;
        let el = node_element(&host, &ctx, NodeId::intern("a")).unwrap();
        assert_eq!(Some(el), host.node_element(view, "a"));
    }

    #[test]
    fn dom_conventions_cover_hidden_registries() {
        for ids in [IdConvention::DataNodeId, IdConvention::DataId, IdConvention::ElementId] {
            let (mut host, ctx) = host_with(NodeLayout { ids, wrapped: false });
            host.set_registry_visible(ctx.view, false);
            let el = node_element(&host, &ctx, NodeId::intern("b"));
            assert_eq!(el, host.node_element(ctx.view, "b"), "{ids:?}");
            assert_eq!(node_id_of(&host, &ctx, &el.unwrap()), Some(NodeId::intern("b")));
        }
    }

    #[test]
    fn unknown_nodes_resolve_to_none() {
        let (mut host, ctx) = host_with(NodeLayout {
            ids: IdConvention::None,
            wrapped: false,
        });
        assert!(node_element(&host, &ctx, NodeId::intern("zzz")).is_none());

        host.set_registry_visible(ctx.view, false);
        assert!(node_element(&host, &ctx, NodeId::intern("a")).is_none());
    }

    #[test]
    fn reverse_lookup_falls_back_to_registry_scan() {
        let (host, ctx) = host_with(NodeLayout {
            ids: IdConvention::None,
            wrapped: false,
        });
        let el = host.node_element(ctx.view, "b").unwrap();
        assert_eq!(node_id_of(&host, &ctx, &el), Some(NodeId::intern("b")));
    }

    #[test]
    fn move_element_prefers_positioned_wrapper() {
        let (host, ctx) = host_with(NodeLayout {
            ids: IdConvention::DataNodeId,
            wrapped: true,
        });
        let el = host.node_element(ctx.view, "a").unwrap();
        let moving = move_element(&host, &el, &ctx.container);
        assert_ne!(moving, el);
        assert_eq!(moving, host.positioned_element(el));
        assert_eq!(nearest_node(&host, &moving), Some(el));
    }

    #[test]
    fn move_element_falls_back_to_node_element() {
        let mut host = MemoryHost::new();
        let view = host.add_canvas("bare.canvas");
        let el = host.add_node(view, "n", json!({"id": "n"}), NodeLayout::default());
        let ctx = CanvasContext::active(&host).unwrap();
        assert_eq!(move_element(&host, &el, &ctx.container), el);
    }

    #[test]
    fn selection_shapes_all_yield_ids() {
        for shape in [SelectionShape::Set, SelectionShape::Nested, SelectionShape::Ids] {
            let (mut host, ctx) = host_with(NodeLayout::default());
            host.set_selection(ctx.view, &["b", "a", "b"]);
            host.set_selection_shape(ctx.view, shape);
            let selected = selected_ids(&host, &ctx);
            let ids: Vec<&str> = selected.iter().map(|id| id.as_str()).collect();
            assert_eq!(ids, vec!["b", "a"], "{shape:?}");
        }
    }
}
