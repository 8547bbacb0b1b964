//! Lock commands acting on the selection.
//!
//! Each command pairs the locked-set change with its snapshot bookkeeping and
//! re-marks the canvas afterwards. Callers persist [`LockEngine::lock_file`]
//! when a command reports a change.

use crate::engine::LockEngine;
use crate::resolve::CanvasContext;
use cl_core::NodeId;
use cl_core::host::CanvasHost;

/// Direction a toggle went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockDirection {
    Lock,
    Unlock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Toggle {
    pub direction: LockDirection,
    /// Nodes whose lock state actually changed.
    pub changed: usize,
}

impl<H: CanvasHost> LockEngine<H> {
    /// Lock `ids`, snapshotting each newly locked node. Returns how many
    /// were not locked before.
    pub fn lock_nodes(&mut self, host: &mut H, ctx: &CanvasContext<H>, ids: &[NodeId]) -> usize {
        let mut changed = 0;
        for &id in ids {
            if self.set_locked(ctx.path, id, true) {
                self.snapshot_on_lock(host, ctx, id);
                changed += 1;
            }
        }
        self.apply_locked_classes(host, ctx);
        log::debug!("locked {changed} node(s) in {}", ctx.path);
        changed
    }

    /// Unlock `ids`, forgetting their snapshots. Returns how many were
    /// locked before.
    pub fn unlock_nodes(&mut self, host: &mut H, ctx: &CanvasContext<H>, ids: &[NodeId]) -> usize {
        let changed = ids
            .iter()
            .filter(|id| self.set_locked(ctx.path, **id, false))
            .count();
        self.apply_locked_classes(host, ctx);
        log::debug!("unlocked {changed} node(s) in {}", ctx.path);
        changed
    }

    /// Lock the whole selection if any of it is unlocked; otherwise unlock
    /// it. `None` when nothing is selected.
    pub fn toggle_lock_selection(&mut self, host: &mut H, ctx: &CanvasContext<H>) -> Option<Toggle> {
        let ids = self.get_selected_node_ids(host, ctx);
        if ids.is_empty() {
            return None;
        }
        let any_unlocked = ids.iter().any(|id| !self.is_locked(ctx.path, *id));
        let toggle = if any_unlocked {
            Toggle {
                direction: LockDirection::Lock,
                changed: self.lock_nodes(host, ctx, &ids),
            }
        } else {
            Toggle {
                direction: LockDirection::Unlock,
                changed: self.unlock_nodes(host, ctx, &ids),
            }
        };
        Some(toggle)
    }
}
