//! Divergence detectors.
//!
//! Two producers feed one FIFO queue, drained synchronously by the entry
//! point that filled it:
//! - **Mutation batches** from the style observer ([`Task::Reconcile`]).
//! - **Frame ticks** of the enforcement loop ([`Task::Enforce`]).
//!
//! Both run every locked node through the same check. Writes made by a
//! restore come back as fresh mutations; the elements involved carry a
//! restoring flag until the next frame ([`Task::Release`]) and, failing
//! that, a restored node compares equal to its snapshot anyway.

use crate::engine::LockEngine;
use crate::resolve::{self, CanvasContext};
use crate::snapshot::{self, MIN_RESTORE_INTERVAL};
use cl_core::host::{CanvasHost, Dom};
use cl_core::{NodeId, Probe, probe_geometry};
use smallvec::SmallVec;
use std::time::Duration;

#[derive(Debug, Clone)]
pub(crate) enum Task<E> {
    /// Elements whose inline style changed.
    Reconcile(Vec<E>),
    /// One enforcement-loop tick over every locked node.
    Enforce,
    /// Clear restoring flags set by earlier restores.
    Release,
}

/// What one check did to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Check {
    /// Neither element nor record resolved.
    Missing,
    /// No snapshot yet; one was taken now.
    Captured,
    /// Bypass held; nothing written.
    Bypassed,
    /// Live geometry equals the snapshot.
    Unchanged,
    /// Diverged, but restored too recently.
    Throttled,
    /// Snapshot written back into the record.
    RestoredModel,
    /// Saved positional style written back.
    RestoredStyle,
}

impl<H: CanvasHost> LockEngine<H> {
    pub(crate) fn drain(&mut self, host: &mut H, now: Duration) {
        while let Some(task) = self.tasks.pop_front() {
            let Some(ctx) = self.session.clone() else {
                self.tasks.clear();
                return;
            };
            match task {
                Task::Reconcile(targets) => self.reconcile(host, &ctx, &targets, now),
                Task::Enforce => self.enforce_tick(host, &ctx, now),
                Task::Release => {
                    let n = self.elements.release_restoring();
                    self.elements.sweep();
                    self.restoring_pending = false;
                    log::trace!("released {n} restoring element(s)");
                }
            }
        }
        self.schedule(host, now);
    }

    /// Observer path: map each changed element to its locked node.
    fn reconcile(&mut self, host: &mut H, ctx: &CanvasContext<H>, targets: &[H::Element], now: Duration) {
        if self.bypass_active() || self.locked.ids(ctx.path).is_empty() {
            return;
        }
        let mut seen: SmallVec<[NodeId; 8]> = SmallVec::new();
        for target in targets {
            if self.restoring(target) || !host.contains(&ctx.container, target) {
                continue;
            }
            let Some(node_el) = resolve::nearest_node(&*host, target) else {
                continue;
            };
            if self.restoring(&node_el) {
                continue;
            }
            let Some(id) = self.node_id(&*host, ctx, &node_el) else {
                log::trace!("mutation on unidentified node element {node_el:?}");
                continue;
            };
            if seen.contains(&id) || !self.locked.contains(ctx.path, id) {
                continue;
            }
            seen.push(id);
            self.check_node(host, ctx, id, now);
        }
    }

    /// Loop path: re-resolve every locked node.
    fn enforce_tick(&mut self, host: &mut H, ctx: &CanvasContext<H>, now: Duration) {
        if self.bypass_active() {
            return;
        }
        let ids = self.locked.ids(ctx.path).to_vec();
        let restored = ids
            .into_iter()
            .filter(|id| {
                matches!(
                    self.check_node(host, ctx, *id, now),
                    Check::RestoredModel | Check::RestoredStyle
                )
            })
            .count();
        if restored > 0 {
            log::trace!("enforcement tick restored {restored} node(s) in {}", ctx.path);
        }
    }

    fn restoring(&self, el: &H::Element) -> bool {
        self.elements
            .key_of(el)
            .is_some_and(|k| self.elements.is_restoring(k))
    }

    /// Node id of a node element, from the side table when already bound.
    fn node_id(&self, host: &H, ctx: &CanvasContext<H>, node_el: &H::Element) -> Option<NodeId> {
        let cached = self
            .elements
            .key_of(node_el)
            .and_then(|k| self.elements.owner(k))
            .filter(|(canvas, _)| *canvas == ctx.path)
            .map(|(_, id)| id);
        cached.or_else(|| resolve::node_id_of(host, ctx, node_el))
    }

    /// Compare one locked node against its snapshot and restore it on
    /// divergence.
    pub(crate) fn check_node(&mut self, host: &mut H, ctx: &CanvasContext<H>, id: NodeId, now: Duration) -> Check {
        let node_el = resolve::node_element(&*host, ctx, id);
        let move_el = node_el
            .as_ref()
            .map(|el| resolve::move_element(&*host, el, &ctx.container));
        let bound = match (&node_el, &move_el) {
            (Some(node), Some(moving)) => Some(self.elements.bind(ctx.path, id, node, moving)),
            _ => None,
        };

        if !self.snapshots.contains(ctx.path, id) {
            return if self.snapshot_on_lock(&*host, ctx, id) {
                Check::Captured
            } else {
                log::trace!("skip {id:?}: not resolvable");
                Check::Missing
            };
        }
        if self.bypass_active() {
            return Check::Bypassed;
        }
        let Some(snap) = self.snapshots.get(ctx.path, id).cloned() else {
            return Check::Missing;
        };

        if let Some(saved) = snap.geometry
            && let Some(obj) = resolve::node_object(&*host, ctx, id)
            && let Probe::Found { geometry, .. } = probe_geometry(&*host, &obj)
        {
            if geometry.approx_eq(&saved) {
                return Check::Unchanged;
            }
            if !self.snapshots.try_begin_restore(ctx.path, id, now) {
                // Tick again once the interval has passed.
                if let Some(next) = self.snapshots.next_restore(ctx.path, id) {
                    self.window.keep_until(next + MIN_RESTORE_INTERVAL);
                }
                log::trace!("skip {id:?}: restored less than 50ms ago");
                return Check::Throttled;
            }
            if let Some(bound) = bound {
                self.elements.set_restoring(bound.node, true);
                self.elements.set_restoring(bound.moving, true);
                self.restoring_pending = true;
            }
            if snapshot::restore_model(host, ctx.canvas.as_ref(), &obj, &saved) {
                log::trace!("restore {id:?}: {geometry:?} -> {saved:?}");
                return Check::RestoredModel;
            }
            log::trace!("restore {id:?}: record not writable, falling back to style");
        }

        let (Some(node_el), Some(move_el), Some(bound)) = (node_el, move_el, bound) else {
            return Check::Missing;
        };
        let mut changed = false;
        if let Some(saved) = &snap.element_style {
            changed |= snapshot::restore_style(host, &node_el, saved);
        }
        if move_el != node_el
            && let Some(saved) = &snap.move_style
        {
            changed |= snapshot::restore_style(host, &move_el, saved);
        }
        if !changed {
            return Check::Unchanged;
        }
        self.elements.set_restoring(bound.node, true);
        self.elements.set_restoring(bound.moving, true);
        self.restoring_pending = true;
        log::trace!("restore {id:?}: positional style");
        Check::RestoredStyle
    }
}
