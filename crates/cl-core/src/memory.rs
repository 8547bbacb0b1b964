//! In-memory host.
//!
//! A small DOM tree (a petgraph `StableDiGraph` of elements) plus a canvas
//! object model backed by `serde_json` records. It implements every host
//! trait, so the engine runs headless: integration tests, fixtures, and
//! replaying recorded sessions all go through it.
//!
//! Host-side edits (`move_node`, `set_style`) record style mutations the same
//! way a browser `MutationObserver` would; drain them with
//! [`MemoryHost::take_mutations`] and feed them to the engine.

use crate::host::{Dom, NODE_CLASS, ObjectModel, Selector, Session, Workspace};
use crate::id::NodeId;
use crate::style::InlineStyle;
use petgraph::Direction;
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;
use serde::Deserialize;
use serde_json::{Map, Value};
use smallvec::SmallVec;

/// Handle to an element of a [`MemoryHost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementRef(NodeIndex);

/// Handle to an open canvas view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewRef(usize);

/// Handle to an object of the canvas model.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectRef {
    Canvas(ViewRef),
    Registry(ViewRef),
    Selection(ViewRef),
    /// The nested collection of a [`SelectionShape::Nested`] selection.
    SelectionItems(ViewRef),
    /// A node record, or a record nested inside it.
    Record {
        view: ViewRef,
        node: NodeId,
        path: SmallVec<[String; 2]>,
    },
    /// A bare string (selection members that are plain ids).
    Str(String),
}

#[derive(Debug, Clone, Default)]
struct ElementData {
    classes: SmallVec<[String; 2]>,
    attrs: SmallVec<[(String, String); 2]>,
    style: String,
}

/// How a view exposes its selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionShape {
    /// `canvas.selection` is itself a set of node objects.
    #[default]
    Set,
    /// `canvas.selection.nodes` holds the node objects.
    Nested,
    /// `canvas.selection` iterates plain id strings.
    Ids,
}

/// How a node element names its node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdConvention {
    #[default]
    DataNodeId,
    DataId,
    ElementId,
    /// No attribute at all; only the registry knows.
    None,
}

/// DOM layout of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeLayout {
    pub ids: IdConvention,
    /// Put the positioning style on a wrapper above the node element
    /// instead of on the node element itself.
    pub wrapped: bool,
}

#[derive(Debug, Clone)]
struct MemoryNode {
    id: NodeId,
    record: Value,
    element: ElementRef,
    /// Element-holding fields exposed on the record (`nodeEl`, ...).
    element_fields: SmallVec<[(String, ElementRef); 2]>,
    /// Numeric writes made through [`ObjectModel::set_number`].
    writes: u32,
}

#[derive(Debug, Clone)]
struct MemoryCanvas {
    path: String,
    container: ElementRef,
    nodes: Vec<MemoryNode>,
    selection: Vec<NodeId>,
    selection_shape: SelectionShape,
    registry_visible: bool,
    redraw: Option<(String, bool)>,
    redraw_calls: u32,
    /// The view's canvas object exists (views expose it once loaded).
    loaded: bool,
}

/// Session side effects requested by the engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionLog {
    pub observing: Option<ElementRef>,
    pub guarding: Option<ElementRef>,
    pub frame_requested: bool,
    pub attaches: u32,
    pub detaches: u32,
}

/// JSON Canvas document (`.canvas`), as far as locking cares.
#[derive(Debug, Deserialize)]
struct CanvasDocument {
    #[serde(default)]
    nodes: Vec<Map<String, Value>>,
}

#[derive(Debug, Clone)]
pub struct MemoryHost {
    dom: StableDiGraph<ElementData, ()>,
    body: NodeIndex,
    canvases: Vec<MemoryCanvas>,
    active: Option<ViewRef>,
    mutations: Vec<ElementRef>,
    pub session: SessionLog,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    pub fn new() -> Self {
        let mut dom = StableDiGraph::new();
        let body = dom.add_node(ElementData::default());
        Self {
            dom,
            body,
            canvases: Vec::new(),
            active: None,
            mutations: Vec::new(),
            session: SessionLog::default(),
        }
    }

    // ─── Building ───────────────────────────────────────────────────────

    fn add_element(&mut self, parent: NodeIndex, classes: &[&str], style: &str) -> ElementRef {
        let data = ElementData {
            classes: classes.iter().map(|c| c.to_string()).collect(),
            attrs: SmallVec::new(),
            style: style.to_string(),
        };
        let idx = self.dom.add_node(data);
        self.dom.add_edge(parent, idx, ());
        ElementRef(idx)
    }

    /// Open a new canvas view and make it the most recent one.
    pub fn add_canvas(&mut self, path: &str) -> ViewRef {
        let body = self.body;
        let wrapper = self.add_element(body, &["canvas-wrapper"], "");
        let container = self.add_element(wrapper.0, &["canvas"], "");
        let view = ViewRef(self.canvases.len());
        self.canvases.push(MemoryCanvas {
            path: path.to_string(),
            container,
            nodes: Vec::new(),
            selection: Vec::new(),
            selection_shape: SelectionShape::default(),
            registry_visible: true,
            redraw: Some(("requestFrame".to_string(), true)),
            redraw_calls: 0,
            loaded: true,
        });
        self.active = Some(view);
        view
    }

    /// Add a node whose record is `record` (any JSON object; its geometry
    /// may sit at the top level or under `pos`/`rect`/`data`).
    pub fn add_node(&mut self, view: ViewRef, id: &str, record: Value, layout: NodeLayout) -> ElementRef {
        let node_id = NodeId::intern(id);
        let style = style_for(&record);
        let container = self.canvases[view.0].container;
        let element = if layout.wrapped {
            let wrapper = self.add_element(container.0, &["canvas-node-wrapper"], &style);
            self.add_element(wrapper.0, &[NODE_CLASS], "")
        } else {
            self.add_element(container.0, &[NODE_CLASS], &style)
        };
        self.add_element(element.0, &["canvas-node-content"], "");
        let attr = match layout.ids {
            IdConvention::DataNodeId => Some("data-node-id"),
            IdConvention::DataId => Some("data-id"),
            IdConvention::ElementId => Some("id"),
            IdConvention::None => None,
        };
        if let Some(attr) = attr {
            self.dom[element.0]
                .attrs
                .push((attr.to_string(), id.to_string()));
        }
        let mut record = record;
        if let Value::Object(map) = &mut record {
            map.entry("id").or_insert_with(|| Value::String(id.to_string()));
        }
        self.canvases[view.0].nodes.push(MemoryNode {
            id: node_id,
            record,
            element,
            element_fields: smallvec::smallvec![("nodeEl".to_string(), element)],
            writes: 0,
        });
        element
    }

    /// Open a JSON Canvas document: one primary-shaped record per node.
    pub fn open_canvas_json(&mut self, path: &str, json: &str) -> Result<ViewRef, String> {
        let doc: CanvasDocument =
            serde_json::from_str(json).map_err(|e| format!("invalid canvas \"{path}\": {e}"))?;
        let view = self.add_canvas(path);
        for node in doc.nodes {
            let id = node
                .get("id")
                .and_then(Value::as_str)
                .ok_or_else(|| format!("canvas \"{path}\": node without id"))?
                .to_string();
            self.add_node(view, &id, Value::Object(node), NodeLayout::default());
        }
        Ok(view)
    }

    // ─── Host-side behaviour ────────────────────────────────────────────

    pub fn set_active(&mut self, view: Option<ViewRef>) {
        self.active = view;
    }

    pub fn set_selection(&mut self, view: ViewRef, ids: &[&str]) {
        self.canvases[view.0].selection = ids.iter().map(|id| NodeId::intern(id)).collect();
    }

    pub fn set_selection_shape(&mut self, view: ViewRef, shape: SelectionShape) {
        self.canvases[view.0].selection_shape = shape;
    }

    /// Hide the id → node registry, forcing DOM lookups.
    pub fn set_registry_visible(&mut self, view: ViewRef, visible: bool) {
        self.canvases[view.0].registry_visible = visible;
    }

    /// Redraw method exposed on the canvas object, and whether it succeeds.
    pub fn set_redraw_hook(&mut self, view: ViewRef, hook: Option<(&str, bool)>) {
        self.canvases[view.0].redraw = hook.map(|(name, ok)| (name.to_string(), ok));
    }

    /// Move a node the way the host's own drag handler does: model first,
    /// then the positioning style, recording a style mutation.
    pub fn move_node(&mut self, view: ViewRef, id: &str, dx: f64, dy: f64) {
        let node_id = NodeId::intern(id);
        let Some(node) = self.node_mut(view, node_id) else {
            return;
        };
        if let Some(record) = geometry_record_mut(&mut node.record) {
            bump(record, "x", dx);
            bump(record, "y", dy);
        }
        let style = style_for(&node.record);
        let element = node.element;
        let target = self.positioned_element(element);
        self.set_style(target, &style);
    }

    /// Resize a node in the model and in its positioning style.
    pub fn resize_node(&mut self, view: ViewRef, id: &str, width: f64, height: f64) {
        let node_id = NodeId::intern(id);
        let Some(node) = self.node_mut(view, node_id) else {
            return;
        };
        if let Some(record) = geometry_record_mut(&mut node.record) {
            for (keys, v) in [(["width", "w"], width), (["height", "h"], height)] {
                if let Some(key) = keys.into_iter().find(|k| record.contains_key(*k)) {
                    record.insert(key.to_string(), Value::from(v));
                }
            }
        }
        let style = style_for(&node.record);
        let element = node.element;
        let target = self.positioned_element(element);
        self.set_style(target, &style);
    }

    /// Change only the model, without touching any style.
    pub fn move_model_only(&mut self, view: ViewRef, id: &str, dx: f64, dy: f64) {
        if let Some(node) = self.node_mut(view, NodeId::intern(id))
            && let Some(record) = geometry_record_mut(&mut node.record)
        {
            bump(record, "x", dx);
            bump(record, "y", dy);
        }
    }

    /// Remove a top-level field from a node's record, the way a host update
    /// reshapes its model. No style mutation is recorded.
    pub fn drop_record_field(&mut self, view: ViewRef, id: &str, field: &str) {
        if let Some(node) = self.node_mut(view, NodeId::intern(id))
            && let Some(record) = node.record.as_object_mut()
        {
            record.remove(field);
        }
    }

    /// Hide or expose the view's canvas object, as during view loading.
    pub fn set_canvas_loaded(&mut self, view: ViewRef, loaded: bool) {
        self.canvases[view.0].loaded = loaded;
    }

    /// Replace an element's inline style, recording a mutation.
    pub fn set_style(&mut self, el: ElementRef, text: &str) {
        self.dom[el.0].style = text.to_string();
        self.mutations.push(el);
    }

    /// Delete a node from the registry and the DOM.
    pub fn remove_node(&mut self, view: ViewRef, id: &str) {
        let node_id = NodeId::intern(id);
        let canvas = &mut self.canvases[view.0];
        let Some(pos) = canvas.nodes.iter().position(|n| n.id == node_id) else {
            return;
        };
        let node = canvas.nodes.remove(pos);
        canvas.selection.retain(|s| *s != node_id);
        let top = self.positioned_element(node.element);
        self.remove_subtree(top.0);
    }

    fn remove_subtree(&mut self, idx: NodeIndex) {
        let children: Vec<NodeIndex> = self
            .dom
            .neighbors_directed(idx, Direction::Outgoing)
            .collect();
        for child in children {
            self.remove_subtree(child);
        }
        self.dom.remove_node(idx);
    }

    /// Re-render every node's positioning style from its record, as the
    /// host does on its next frame.
    fn rerender(&mut self, view: ViewRef) {
        let Some(canvas) = self.canvases.get(view.0) else {
            return;
        };
        let pending: Vec<(ElementRef, String)> = canvas
            .nodes
            .iter()
            .map(|n| (self.positioned_element(n.element), style_for(&n.record)))
            .collect();
        for (el, style) in pending {
            if self.dom.contains_node(el.0) && self.dom[el.0].style != style {
                self.set_style(el, &style);
            }
        }
    }

    /// Pending style mutation targets, in order; clears the queue.
    pub fn take_mutations(&mut self) -> Vec<ElementRef> {
        std::mem::take(&mut self.mutations)
    }

    // ─── Inspection ─────────────────────────────────────────────────────

    pub fn container(&self, view: ViewRef) -> ElementRef {
        self.canvases[view.0].container
    }

    pub fn node_element(&self, view: ViewRef, id: &str) -> Option<ElementRef> {
        self.node(view, NodeId::intern(id)).map(|n| n.element)
    }

    /// Element carrying the node's positioning style.
    pub fn positioned_element(&self, element: ElementRef) -> ElementRef {
        match self.parent(&element) {
            Some(p) if self.has_class(&p, "canvas-node-wrapper") => p,
            _ => element,
        }
    }

    /// `(x, y, width, height)` as currently stored in the node's record.
    pub fn geometry(&self, view: ViewRef, id: &str) -> Option<(f64, f64, Option<f64>, Option<f64>)> {
        let node = self.node(view, NodeId::intern(id))?;
        let record = geometry_record(&node.record)?;
        let num = |k: &str| record.get(k).and_then(Value::as_f64);
        Some((
            num("x")?,
            num("y")?,
            num("width").or_else(|| num("w")),
            num("height").or_else(|| num("h")),
        ))
    }

    /// Numeric writes the engine made to a node's records.
    pub fn writes(&self, view: ViewRef, id: &str) -> u32 {
        self.node(view, NodeId::intern(id)).map_or(0, |n| n.writes)
    }

    pub fn redraw_calls(&self, view: ViewRef) -> u32 {
        self.canvases[view.0].redraw_calls
    }

    pub fn style(&self, el: ElementRef) -> &str {
        &self.dom[el.0].style
    }

    fn node(&self, view: ViewRef, id: NodeId) -> Option<&MemoryNode> {
        self.canvases.get(view.0)?.nodes.iter().find(|n| n.id == id)
    }

    fn node_mut(&mut self, view: ViewRef, id: NodeId) -> Option<&mut MemoryNode> {
        self.canvases
            .get_mut(view.0)?
            .nodes
            .iter_mut()
            .find(|n| n.id == id)
    }

    fn record(&self, view: ViewRef, node: NodeId, path: &[String]) -> Option<&Value> {
        let mut value = &self.node(view, node)?.record;
        for segment in path {
            value = value.get(segment)?;
        }
        Some(value)
    }

    /// Children in insertion order.
    fn children(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut children: Vec<NodeIndex> = self
            .dom
            .neighbors_directed(idx, Direction::Outgoing)
            .collect();
        children.sort();
        children
    }

    fn matches(&self, idx: NodeIndex, selector: Selector<'_>) -> bool {
        let data = &self.dom[idx];
        match selector {
            Selector::Attr { name, value } => data.attrs.iter().any(|(n, v)| n == name && v == value),
            Selector::Id(value) => data.attrs.iter().any(|(n, v)| n == "id" && v == value),
            Selector::Class(class) => data.classes.iter().any(|c| c == class),
        }
    }

    fn descendants(&self, root: NodeIndex, out: &mut Vec<NodeIndex>) {
        for child in self.children(root) {
            out.push(child);
            self.descendants(child, out);
        }
    }
}

/// The JSON object holding `x`/`y`: the record itself or `pos`/`rect`/`data`.
fn geometry_record(record: &Value) -> Option<&Map<String, Value>> {
    let has_xy = |m: &Map<String, Value>| m.get("x").is_some_and(Value::is_number);
    if let Some(map) = record.as_object().filter(|m| has_xy(m)) {
        return Some(map);
    }
    ["pos", "rect", "data"]
        .into_iter()
        .filter_map(|k| record.get(k).and_then(Value::as_object))
        .find(|m| has_xy(m))
}

fn geometry_record_mut(record: &mut Value) -> Option<&mut Map<String, Value>> {
    let key = {
        let top = record.as_object()?;
        if top.get("x").is_some_and(Value::is_number) {
            None
        } else {
            Some(["pos", "rect", "data"].into_iter().find(|k| {
                top.get(*k)
                    .and_then(|v| v.get("x"))
                    .is_some_and(Value::is_number)
            })?)
        }
    };
    match key {
        None => record.as_object_mut(),
        Some(k) => record.get_mut(k)?.as_object_mut(),
    }
}

fn bump(record: &mut Map<String, Value>, key: &str, delta: f64) {
    if let Some(v) = record.get(key).and_then(Value::as_f64) {
        record.insert(key.to_string(), Value::from(v + delta));
    }
}

/// Positioning style the host would render for a record.
fn style_for(record: &Value) -> String {
    let Some(map) = geometry_record(record) else {
        return String::new();
    };
    let num = |k: &str| map.get(k).and_then(Value::as_f64);
    let mut style = InlineStyle::default();
    if let (Some(x), Some(y)) = (num("x"), num("y")) {
        style.set("transform", Some(format!("translate({x}px, {y}px)").as_str()));
    }
    if let Some(w) = num("width").or_else(|| num("w")) {
        style.set("width", Some(format!("{w}px").as_str()));
    }
    if let Some(h) = num("height").or_else(|| num("h")) {
        style.set("height", Some(format!("{h}px").as_str()));
    }
    style.to_css_text()
}

impl Dom for MemoryHost {
    type Element = ElementRef;

    fn parent(&self, el: &ElementRef) -> Option<ElementRef> {
        self.dom
            .neighbors_directed(el.0, Direction::Incoming)
            .next()
            .map(ElementRef)
    }

    fn has_class(&self, el: &ElementRef, class: &str) -> bool {
        self.dom
            .node_weight(el.0)
            .is_some_and(|d| d.classes.iter().any(|c| c == class))
    }

    fn set_class(&mut self, el: &ElementRef, class: &str, on: bool) {
        let Some(data) = self.dom.node_weight_mut(el.0) else {
            return;
        };
        let present = data.classes.iter().any(|c| c == class);
        if on && !present {
            data.classes.push(class.to_string());
        } else if !on && present {
            data.classes.retain(|c| c != class);
        }
    }

    fn attribute(&self, el: &ElementRef, name: &str) -> Option<String> {
        let data = self.dom.node_weight(el.0)?;
        if name == "style" {
            return Some(data.style.clone());
        }
        data.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    fn inline_style(&self, el: &ElementRef) -> String {
        self.dom
            .node_weight(el.0)
            .map(|d| d.style.clone())
            .unwrap_or_default()
    }

    fn set_style_property(&mut self, el: &ElementRef, name: &str, value: Option<&str>) {
        let Some(data) = self.dom.node_weight_mut(el.0) else {
            return;
        };
        let mut style = InlineStyle::parse(&data.style);
        if style.get(name) == value {
            return;
        }
        style.set(name, value);
        data.style = style.to_css_text();
        self.mutations.push(*el);
    }

    fn find(&self, root: &ElementRef, selector: Selector<'_>) -> Option<ElementRef> {
        let mut all = Vec::new();
        self.descendants(root.0, &mut all);
        all.into_iter()
            .find(|idx| self.matches(*idx, selector))
            .map(ElementRef)
    }

    fn find_all(&self, root: &ElementRef, selector: Selector<'_>) -> Vec<ElementRef> {
        let mut all = Vec::new();
        self.descendants(root.0, &mut all);
        all.into_iter()
            .filter(|idx| self.matches(*idx, selector))
            .map(ElementRef)
            .collect()
    }

    fn contains(&self, ancestor: &ElementRef, el: &ElementRef) -> bool {
        let mut cur = Some(*el);
        while let Some(e) = cur {
            if e == *ancestor {
                return true;
            }
            cur = self.parent(&e);
        }
        false
    }
}

impl ObjectModel for MemoryHost {
    type Object = ObjectRef;

    fn field(&self, obj: &ObjectRef, name: &str) -> Option<ObjectRef> {
        match obj {
            ObjectRef::Canvas(view) => {
                let canvas = self.canvases.get(view.0)?;
                match name {
                    "nodes" if canvas.registry_visible => Some(ObjectRef::Registry(*view)),
                    "selection" => Some(ObjectRef::Selection(*view)),
                    _ => None,
                }
            }
            ObjectRef::Selection(view) => {
                let nested = self.canvases.get(view.0)?.selection_shape == SelectionShape::Nested;
                (nested && name == "nodes").then_some(ObjectRef::SelectionItems(*view))
            }
            ObjectRef::Record { view, node, path } => {
                let value = self.record(*view, *node, path)?.get(name)?;
                value.is_object().then(|| {
                    let mut path = path.clone();
                    path.push(name.to_string());
                    ObjectRef::Record {
                        view: *view,
                        node: *node,
                        path,
                    }
                })
            }
            _ => None,
        }
    }

    fn number(&self, obj: &ObjectRef, name: &str) -> Option<f64> {
        let ObjectRef::Record { view, node, path } = obj else {
            return None;
        };
        self.record(*view, *node, path)?
            .get(name)?
            .as_f64()
            .filter(|v| v.is_finite())
    }

    fn set_number(&mut self, obj: &ObjectRef, name: &str, value: f64) -> bool {
        let ObjectRef::Record { view, node, path } = obj else {
            return false;
        };
        let Some(n) = self.node_mut(*view, *node) else {
            return false;
        };
        let mut target = &mut n.record;
        for segment in path {
            match target.get_mut(segment) {
                Some(next) => target = next,
                None => return false,
            }
        }
        match target.get_mut(name) {
            Some(slot) if slot.is_number() => {
                *slot = Value::from(value);
                n.writes += 1;
                true
            }
            _ => false,
        }
    }

    fn string(&self, obj: &ObjectRef, name: &str) -> Option<String> {
        let ObjectRef::Record { view, node, path } = obj else {
            return None;
        };
        self.record(*view, *node, path)?
            .get(name)?
            .as_str()
            .map(str::to_string)
    }

    fn as_string(&self, obj: &ObjectRef) -> Option<String> {
        match obj {
            ObjectRef::Str(s) => Some(s.clone()),
            _ => None,
        }
    }

    fn element_field(&self, obj: &ObjectRef, name: &str) -> Option<ElementRef> {
        let ObjectRef::Record { view, node, path } = obj else {
            return None;
        };
        if !path.is_empty() {
            return None;
        }
        let n = self.node(*view, *node)?;
        n.element_fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, el)| *el)
            .filter(|el| self.dom.contains_node(el.0))
    }

    fn lookup(&self, collection: &ObjectRef, key: &str) -> Option<ObjectRef> {
        let ObjectRef::Registry(view) = collection else {
            return None;
        };
        let id = NodeId::intern(key);
        self.node(*view, id).map(|_| ObjectRef::Record {
            view: *view,
            node: id,
            path: SmallVec::new(),
        })
    }

    fn members(&self, collection: &ObjectRef) -> Option<Vec<ObjectRef>> {
        let record = |view: ViewRef, node: NodeId| ObjectRef::Record {
            view,
            node,
            path: SmallVec::new(),
        };
        match collection {
            ObjectRef::Registry(view) => Some(
                self.canvases
                    .get(view.0)?
                    .nodes
                    .iter()
                    .map(|n| record(*view, n.id))
                    .collect(),
            ),
            ObjectRef::Selection(view) => {
                let canvas = self.canvases.get(view.0)?;
                match canvas.selection_shape {
                    SelectionShape::Set => {
                        Some(canvas.selection.iter().map(|id| record(*view, *id)).collect())
                    }
                    SelectionShape::Ids => Some(
                        canvas
                            .selection
                            .iter()
                            .map(|id| ObjectRef::Str(id.as_str().to_string()))
                            .collect(),
                    ),
                    SelectionShape::Nested => None,
                }
            }
            ObjectRef::SelectionItems(view) => Some(
                self.canvases
                    .get(view.0)?
                    .selection
                    .iter()
                    .map(|id| record(*view, *id))
                    .collect(),
            ),
            _ => None,
        }
    }

    fn invoke(&mut self, obj: &ObjectRef, method: &str) -> Option<Result<(), String>> {
        let ObjectRef::Canvas(view) = obj else {
            return None;
        };
        let canvas = self.canvases.get_mut(view.0)?;
        let (name, ok) = canvas.redraw.as_ref()?;
        if name != method {
            return None;
        }
        canvas.redraw_calls += 1;
        if !*ok {
            return Some(Err(format!("{method} failed")));
        }
        let view = *view;
        self.rerender(view);
        Some(Ok(()))
    }
}

impl Workspace for MemoryHost {
    type View = ViewRef;

    fn canvas_views(&self) -> Vec<ViewRef> {
        (0..self.canvases.len()).map(ViewRef).collect()
    }

    fn most_recent_view(&self) -> Option<ViewRef> {
        self.active
    }

    fn view_path(&self, view: &ViewRef) -> Option<String> {
        self.canvases.get(view.0).map(|c| c.path.clone())
    }

    fn view_container(&self, view: &ViewRef) -> Option<ElementRef> {
        self.canvases.get(view.0).map(|c| c.container)
    }

    fn view_canvas(&self, view: &ViewRef) -> Option<ObjectRef> {
        self.canvases
            .get(view.0)
            .filter(|c| c.loaded)
            .map(|_| ObjectRef::Canvas(*view))
    }
}

impl Session for MemoryHost {
    fn attach_observer(&mut self, container: &ElementRef) {
        self.session.observing = Some(*container);
        self.session.attaches += 1;
    }

    fn detach_observer(&mut self) {
        if self.session.observing.take().is_some() {
            self.session.detaches += 1;
        }
    }

    fn attach_input_guard(&mut self, container: &ElementRef) {
        self.session.guarding = Some(*container);
    }

    fn detach_input_guard(&mut self) {
        self.session.guarding = None;
    }

    fn request_frame(&mut self) {
        self.session.frame_requested = true;
    }

    fn cancel_frame(&mut self) {
        self.session.frame_requested = false;
    }
}
