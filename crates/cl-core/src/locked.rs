//! Locked-node membership, per canvas.

use crate::id::{CanvasPath, NodeId};
use smallvec::SmallVec;
use std::collections::HashMap;

type IdList = SmallVec<[NodeId; 8]>;

/// Canvas path → locked node ids, in lock order. Membership is idempotent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockedSet {
    by_canvas: HashMap<CanvasPath, IdList>,
}

impl LockedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, canvas: CanvasPath, id: NodeId) -> bool {
        self.by_canvas
            .get(&canvas)
            .is_some_and(|ids| ids.contains(&id))
    }

    /// Add `id`. Returns `false` if it was already locked.
    pub fn insert(&mut self, canvas: CanvasPath, id: NodeId) -> bool {
        let ids = self.by_canvas.entry(canvas).or_default();
        if ids.contains(&id) {
            return false;
        }
        ids.push(id);
        true
    }

    /// Remove `id`. Returns `false` if it was not locked.
    pub fn remove(&mut self, canvas: CanvasPath, id: NodeId) -> bool {
        let Some(ids) = self.by_canvas.get_mut(&canvas) else {
            return false;
        };
        let Some(pos) = ids.iter().position(|x| *x == id) else {
            return false;
        };
        ids.remove(pos);
        if ids.is_empty() {
            self.by_canvas.remove(&canvas);
        }
        true
    }

    /// Locked ids of one canvas, in lock order.
    pub fn ids(&self, canvas: CanvasPath) -> &[NodeId] {
        self.by_canvas
            .get(&canvas)
            .map(|ids| ids.as_slice())
            .unwrap_or(&[])
    }

    /// Drop every id of `canvas`, returning them.
    pub fn take_canvas(&mut self, canvas: CanvasPath) -> Vec<NodeId> {
        self.by_canvas
            .remove(&canvas)
            .map(|ids| ids.into_vec())
            .unwrap_or_default()
    }

    pub fn canvases(&self) -> impl Iterator<Item = CanvasPath> + '_ {
        self.by_canvas.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.by_canvas.is_empty()
    }
}
