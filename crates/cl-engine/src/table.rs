//! Element side table.
//!
//! Host elements cannot be hashed and must not be kept alive by the engine
//! beyond their usefulness, so associations (element → node, node element →
//! move element, "restore in flight") live in slots addressed by an
//! engine-assigned [`ElementKey`]. Slots are dropped explicitly when a node is
//! unlocked or confirmed gone; losing one only costs a re-resolution.

use cl_core::{CanvasPath, NodeId};
use std::collections::HashMap;

/// Engine-assigned handle for a host element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementKey(u32);

#[derive(Debug, Clone)]
struct Slot<E> {
    element: E,
    /// Node this element belongs to (node element or its move element).
    owner: Option<(CanvasPath, NodeId)>,
    restoring: bool,
}

/// Cached association of one locked node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeElements {
    pub node: ElementKey,
    pub moving: ElementKey,
}

#[derive(Debug, Clone)]
pub struct ElementTable<E> {
    slots: Vec<Option<Slot<E>>>,
    free: Vec<u32>,
    nodes: HashMap<(CanvasPath, NodeId), NodeElements>,
}

impl<E> Default for ElementTable<E> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            nodes: HashMap::new(),
        }
    }
}

impl<E: Clone + PartialEq> ElementTable<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key of an element already in the table.
    pub fn key_of(&self, el: &E) -> Option<ElementKey> {
        self.slots.iter().enumerate().find_map(|(i, slot)| {
            slot.as_ref()
                .filter(|s| s.element == *el)
                .map(|_| ElementKey(i as u32))
        })
    }

    /// Key of `el`, allocating a slot if needed.
    pub fn intern(&mut self, el: &E) -> ElementKey {
        if let Some(key) = self.key_of(el) {
            return key;
        }
        let slot = Slot {
            element: el.clone(),
            owner: None,
            restoring: false,
        };
        match self.free.pop() {
            Some(i) => {
                self.slots[i as usize] = Some(slot);
                ElementKey(i)
            }
            None => {
                self.slots.push(Some(slot));
                ElementKey((self.slots.len() - 1) as u32)
            }
        }
    }

    pub fn element(&self, key: ElementKey) -> Option<&E> {
        self.slot(key).map(|s| &s.element)
    }

    /// Node owning the element behind `key`.
    pub fn owner(&self, key: ElementKey) -> Option<(CanvasPath, NodeId)> {
        self.slot(key).and_then(|s| s.owner)
    }

    /// Cached node element and move element of a node.
    pub fn node_elements(&self, canvas: CanvasPath, id: NodeId) -> Option<NodeElements> {
        self.nodes.get(&(canvas, id)).copied()
    }

    /// Record the elements of a node, replacing any stale association.
    pub fn bind(&mut self, canvas: CanvasPath, id: NodeId, node_el: &E, move_el: &E) -> NodeElements {
        if let Some(old) = self.node_elements(canvas, id) {
            let same = self.element(old.node) == Some(node_el)
                && self.element(old.moving) == Some(move_el);
            if same {
                return old;
            }
            self.release(canvas, id);
        }
        let node = self.intern(node_el);
        let moving = self.intern(move_el);
        for key in [node, moving] {
            if let Some(slot) = self.slot_mut(key) {
                slot.owner = Some((canvas, id));
            }
        }
        let bound = NodeElements { node, moving };
        self.nodes.insert((canvas, id), bound);
        bound
    }

    /// Forget everything about a node's elements.
    pub fn release(&mut self, canvas: CanvasPath, id: NodeId) {
        if self.nodes.remove(&(canvas, id)).is_none() {
            return;
        }
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.as_ref().is_some_and(|s| s.owner == Some((canvas, id))) {
                *slot = None;
                self.free.push(i as u32);
            }
        }
    }

    /// Drop every slot and association.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.nodes.clear();
    }

    pub fn set_restoring(&mut self, key: ElementKey, on: bool) {
        if let Some(slot) = self.slot_mut(key) {
            slot.restoring = on;
        }
    }

    pub fn is_restoring(&self, key: ElementKey) -> bool {
        self.slot(key).is_some_and(|s| s.restoring)
    }

    /// Clear every restoring flag, returning how many were set.
    pub fn release_restoring(&mut self) -> usize {
        let mut n = 0;
        for slot in self.slots.iter_mut().flatten() {
            if slot.restoring {
                slot.restoring = false;
                n += 1;
            }
        }
        n
    }

    /// Drop unowned slots (elements interned only for a lookup).
    pub fn sweep(&mut self) {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.as_ref().is_some_and(|s| s.owner.is_none() && !s.restoring) {
                *slot = None;
                self.free.push(i as u32);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, key: ElementKey) -> Option<&Slot<E>> {
        self.slots.get(key.0 as usize).and_then(Option::as_ref)
    }

    fn slot_mut(&mut self, key: ElementKey) -> Option<&mut Slot<E>> {
        self.slots.get_mut(key.0 as usize).and_then(Option::as_mut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str) -> (CanvasPath, NodeId) {
        (CanvasPath::intern("t.canvas"), NodeId::intern(id))
    }

    #[test]
    fn interning_reuses_keys() {
        let mut table: ElementTable<&str> = ElementTable::new();
        let a = table.intern(&"a");
        assert_eq!(table.intern(&"a"), a);
        assert_ne!(table.intern(&"b"), a);
        assert_eq!(table.element(a), Some(&"a"));
    }

    #[test]
    fn release_frees_owned_slots_for_reuse() {
        let mut table: ElementTable<&str> = ElementTable::new();
        let (canvas, id) = node("n1");
        let bound = table.bind(canvas, id, &"node", &"wrapper");
        assert_eq!(table.owner(bound.moving), Some((canvas, id)));
        assert_eq!(table.len(), 2);

        table.release(canvas, id);
        assert!(table.is_empty());
        assert!(table.node_elements(canvas, id).is_none());

        let reused = table.intern(&"other");
        assert!(reused == bound.node || reused == bound.moving);
    }

    #[test]
    fn rebinding_to_new_elements_drops_the_old_ones() {
        let mut table: ElementTable<&str> = ElementTable::new();
        let (canvas, id) = node("n2");
        table.bind(canvas, id, &"old", &"old");
        let fresh = table.bind(canvas, id, &"new", &"new-wrapper");
        assert_eq!(table.element(fresh.node), Some(&"new"));
        assert!(table.key_of(&"old").is_none());
    }

    #[test]
    fn restoring_flags_clear_in_bulk() {
        let mut table: ElementTable<&str> = ElementTable::new();
        let a = table.intern(&"a");
        let b = table.intern(&"b");
        table.set_restoring(a, true);
        table.set_restoring(b, true);
        assert!(table.is_restoring(a));
        assert_eq!(table.release_restoring(), 2);
        assert!(!table.is_restoring(b));

        table.sweep();
        assert!(table.is_empty());
    }
}
