//! Snapshot capture and restore.

use crate::resolve::{self, CanvasContext};
use cl_core::host::{Dom, ObjectModel, Workspace};
use cl_core::model::write_record;
use cl_core::{CanvasPath, Geometry, InlineStyle, NodeId, probe_geometry};
use std::collections::HashMap;
use std::time::Duration;

/// Minimum spacing between two geometry restores of the same node.
pub const MIN_RESTORE_INTERVAL: Duration = Duration::from_millis(50);

/// Canvas methods that trigger a re-render, in preference order.
pub const REDRAW_METHODS: [&str; 4] = ["requestFrame", "requestRender", "render", "redraw"];

/// Everything captured for one locked node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeSnapshot {
    /// Inline style of the node element.
    pub element_style: Option<String>,
    /// Inline style of the move element.
    pub move_style: Option<String>,
    pub geometry: Option<Geometry>,
    /// Host time of the last geometry restore.
    pub last_restore: Option<Duration>,
}

impl NodeSnapshot {
    pub fn is_empty(&self) -> bool {
        self.element_style.is_none() && self.move_style.is_none() && self.geometry.is_none()
    }
}

/// Snapshots of every locked node, keyed by canvas and node.
#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    nodes: HashMap<(CanvasPath, NodeId), NodeSnapshot>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, canvas: CanvasPath, id: NodeId) -> Option<&NodeSnapshot> {
        self.nodes.get(&(canvas, id))
    }

    pub fn contains(&self, canvas: CanvasPath, id: NodeId) -> bool {
        self.nodes.contains_key(&(canvas, id))
    }

    /// Store a fresh snapshot. Overwrites, including the throttle stamp.
    pub fn insert(&mut self, canvas: CanvasPath, id: NodeId, snapshot: NodeSnapshot) {
        self.nodes.insert((canvas, id), snapshot);
    }

    pub fn remove(&mut self, canvas: CanvasPath, id: NodeId) -> Option<NodeSnapshot> {
        self.nodes.remove(&(canvas, id))
    }

    /// Drop every snapshot of a canvas, returning how many went.
    pub fn clear_canvas(&mut self, canvas: CanvasPath) -> usize {
        let before = self.nodes.len();
        self.nodes.retain(|(c, _), _| *c != canvas);
        before - self.nodes.len()
    }

    /// Whether a geometry restore of the node may run at `now`. Records the
    /// attempt when it may.
    pub fn try_begin_restore(&mut self, canvas: CanvasPath, id: NodeId, now: Duration) -> bool {
        let Some(snap) = self.nodes.get_mut(&(canvas, id)) else {
            return false;
        };
        if let Some(last) = snap.last_restore
            && now.saturating_sub(last) < MIN_RESTORE_INTERVAL
        {
            return false;
        }
        snap.last_restore = Some(now);
        true
    }

    /// Earliest time the next geometry restore of the node may run.
    pub fn next_restore(&self, canvas: CanvasPath, id: NodeId) -> Option<Duration> {
        self.get(canvas, id)?
            .last_restore
            .map(|last| last + MIN_RESTORE_INTERVAL)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Capture a node as it is now. `None` when neither its element nor its
/// record can be found.
pub fn capture<H: Workspace>(host: &H, ctx: &CanvasContext<H>, id: NodeId) -> Option<NodeSnapshot> {
    let node_el = resolve::node_element(host, ctx, id);
    let move_el = node_el
        .as_ref()
        .map(|el| resolve::move_element(host, el, &ctx.container));
    let geometry = resolve::node_object(host, ctx, id)
        .and_then(|obj| probe_geometry(host, &obj).geometry());
    let snapshot = NodeSnapshot {
        element_style: node_el.as_ref().map(|el| host.inline_style(el)),
        move_style: move_el.as_ref().map(|el| host.inline_style(el)),
        geometry,
        last_restore: None,
    };
    (!snapshot.is_empty()).then_some(snapshot)
}

/// Write `saved` back into the node's record: the recorded shape first, the
/// other shapes only if that write fails structurally. Asks the canvas to
/// redraw after a successful write.
pub fn restore_model<H: ObjectModel>(
    host: &mut H,
    canvas: Option<&H::Object>,
    node: &H::Object,
    saved: &Geometry,
) -> bool {
    for shape in saved.shape.write_order() {
        let Some(record) = shape.locate(host, node) else {
            continue;
        };
        if write_record(host, &record, saved) {
            if let Some(canvas) = canvas {
                request_redraw(host, canvas);
            }
            return true;
        }
    }
    false
}

/// Invoke the first redraw method the canvas exposes. Failures are
/// swallowed.
pub fn request_redraw<H: ObjectModel>(host: &mut H, canvas: &H::Object) {
    for method in REDRAW_METHODS {
        match host.invoke(canvas, method) {
            None => continue,
            Some(Ok(())) => return,
            Some(Err(e)) => {
                log::trace!("canvas.{method}() failed: {e}");
                return;
            }
        }
    }
}

/// Copy the positional declarations of `saved` onto `el`, leaving every
/// other inline property alone. Returns whether anything was written.
pub fn restore_style<H: Dom>(host: &mut H, el: &H::Element, saved: &str) -> bool {
    let saved = InlineStyle::parse(saved);
    let live = InlineStyle::parse(&host.inline_style(el));
    if !saved.positional_differs(&live) {
        return false;
    }
    let mut changed = false;
    for (name, value) in saved.positional() {
        if live.get(name) != value {
            host.set_style_property(el, name, value);
            changed = true;
        }
    }
    changed
}
