//! Lock engine: the state behind node locking and its host-facing API.
//!
//! The engine owns the locked set, the snapshots and the session state of the
//! canvas it currently defends. It never owns the host: every call that needs
//! to read or write the canvas borrows it.
//!
//! - **Lock state**: which nodes are locked, persisted through [`LockFile`].
//! - **Snapshots**: what a locked node must look like (see [`crate::snapshot`]).
//! - **Session**: the one canvas whose container carries our observer and
//!   input listeners. Switching canvas detaches before attaching.
//! - **Events**: style mutations, frame ticks and input events feed the
//!   detectors in [`crate::reconcile`].

use crate::enforce::EnforcementWindow;
use crate::guard::{InputGuard, Modifiers, Verdict, is_nudge_key};
use crate::reconcile::Task;
use crate::resolve::{self, CanvasContext};
use crate::snapshot::{self, NodeSnapshot, SnapshotStore};
use crate::table::ElementTable;
use cl_core::host::{CanvasHost, Dom, Selector, Session};
use cl_core::{CanvasPath, LOCKED_CLASS, LockFile, LockSettings, LockedSet, NODE_CLASS, NodeId};
use std::collections::VecDeque;
use std::time::Duration;

pub struct LockEngine<H: CanvasHost> {
    pub(crate) locked: LockedSet,
    pub(crate) settings: LockSettings,
    pub(crate) snapshots: SnapshotStore,
    pub(crate) elements: ElementTable<H::Element>,

    /// Canvas carrying our observer and input listeners.
    pub(crate) session: Option<CanvasContext<H>>,
    pub(crate) guard: InputGuard,
    pub(crate) window: EnforcementWindow,
    pub(crate) tasks: VecDeque<Task<H::Element>>,

    /// A frame has been requested and not yet delivered.
    frame_pending: bool,
    /// Some element carries a restoring flag.
    pub(crate) restoring_pending: bool,
    /// Last observed bypass state, for logging transitions.
    bypass_held: bool,
}

impl<H: CanvasHost> LockEngine<H> {
    /// Engine over persisted state.
    pub fn new(file: &LockFile) -> Self {
        Self {
            locked: file.locked_set(),
            settings: file.settings.clone(),
            snapshots: SnapshotStore::new(),
            elements: ElementTable::new(),
            session: None,
            guard: InputGuard::new(),
            window: EnforcementWindow::new(),
            tasks: VecDeque::new(),
            frame_pending: false,
            restoring_pending: false,
            bypass_held: false,
        }
    }

    // ─── State ───────────────────────────────────────────────────────────

    pub fn settings(&self) -> &LockSettings {
        &self.settings
    }

    /// Replace the settings, re-marking the session canvas if needed.
    pub fn set_settings(&mut self, host: &mut H, settings: LockSettings) {
        let remark = settings.mark_locked_nodes != self.settings.mark_locked_nodes;
        self.settings = settings;
        if !self.settings.block_pointer_drag {
            self.guard.reset();
        }
        if remark && let Some(ctx) = self.session.clone() {
            self.apply_locked_classes(host, &ctx);
        }
    }

    pub fn locked(&self) -> &LockedSet {
        &self.locked
    }

    /// Copy of the persisted state, ready to save.
    pub fn lock_file(&self) -> LockFile {
        LockFile::from_state(&self.locked, &self.settings)
    }

    pub fn snapshot(&self, canvas: CanvasPath, id: NodeId) -> Option<&NodeSnapshot> {
        self.snapshots.get(canvas, id)
    }

    /// Canvas currently carrying our listeners.
    pub fn session(&self) -> Option<&CanvasContext<H>> {
        self.session.as_ref()
    }

    pub fn is_locked(&self, canvas: CanvasPath, id: NodeId) -> bool {
        self.locked.contains(canvas, id)
    }

    /// Add or remove a node from the locked set. Unlocking also forgets the
    /// node's snapshots. Returns whether the set changed.
    pub fn set_locked(&mut self, canvas: CanvasPath, id: NodeId, locked: bool) -> bool {
        if locked {
            return self.locked.insert(canvas, id);
        }
        let changed = self.locked.remove(canvas, id);
        self.forget_on_unlock(canvas, id);
        changed
    }

    // ─── Canvas ──────────────────────────────────────────────────────────

    /// Context of the most recently focused canvas view.
    pub fn get_active_canvas_context(&self, host: &H) -> Option<CanvasContext<H>> {
        CanvasContext::active(host)
    }

    /// Move our observer and input listeners onto `ctx`, detaching them from
    /// any previous canvas first. When `ctx` already has them, only picks up
    /// a canvas object that has loaded since.
    pub fn ensure_guard_attached(&mut self, host: &mut H, ctx: &CanvasContext<H>) {
        if let Some(session) = self.session.as_mut()
            && session.same_session(ctx)
        {
            if session.canvas.is_none() && ctx.canvas.is_some() {
                log::debug!("canvas object of {} loaded", ctx.path);
                session.canvas = ctx.canvas.clone();
            }
            return;
        }
        self.detach_session(host);
        host.attach_observer(&ctx.container);
        host.attach_input_guard(&ctx.container);
        log::debug!("attached to {}", ctx.path);
        self.session = Some(ctx.clone());
        self.prime_locked_snapshots(host, ctx);
        self.apply_locked_classes(host, ctx);
    }

    /// Attach to whichever canvas is active now.
    pub fn attach_active(&mut self, host: &mut H) -> Option<CanvasContext<H>> {
        let ctx = self.get_active_canvas_context(host)?;
        self.ensure_guard_attached(host, &ctx);
        Some(ctx)
    }

    /// Detach from the host entirely.
    pub fn dispose(&mut self, host: &mut H) {
        if let Some(ctx) = self.session.clone() {
            for el in host.find_all(&ctx.container, Selector::Class(NODE_CLASS)) {
                host.set_class(&el, LOCKED_CLASS, false);
            }
        }
        self.detach_session(host);
    }

    fn detach_session(&mut self, host: &mut H) {
        let Some(old) = self.session.take() else {
            return;
        };
        host.detach_observer();
        host.detach_input_guard();
        if self.frame_pending {
            host.cancel_frame();
            self.frame_pending = false;
        }
        self.tasks.clear();
        self.elements.clear();
        self.guard.reset();
        self.window.reset();
        self.restoring_pending = false;
        self.bypass_held = false;
        log::debug!("detached from {}", old.path);
    }

    /// Mark every locked node element of `ctx` (when marking is enabled) and
    /// unmark the rest.
    pub fn apply_locked_classes(&mut self, host: &mut H, ctx: &CanvasContext<H>) {
        let mark = self.settings.mark_locked_nodes;
        for el in host.find_all(&ctx.container, Selector::Class(NODE_CLASS)) {
            let locked = resolve::node_id_of(host, ctx, &el)
                .is_some_and(|id| self.locked.contains(ctx.path, id));
            host.set_class(&el, LOCKED_CLASS, mark && locked);
        }
    }

    pub fn get_selected_node_ids(&self, host: &H, ctx: &CanvasContext<H>) -> Vec<NodeId> {
        resolve::selected_ids(host, ctx)
    }

    // ─── Snapshots ───────────────────────────────────────────────────────

    /// Capture the node as it is now, overwriting any earlier snapshot.
    /// Returns `false` when the node cannot be found.
    pub fn snapshot_on_lock(&mut self, host: &H, ctx: &CanvasContext<H>, id: NodeId) -> bool {
        match snapshot::capture(host, ctx, id) {
            Some(snap) => {
                log::trace!("snapshot {id:?} in {}: {:?}", ctx.path, snap.geometry);
                self.snapshots.insert(ctx.path, id, snap);
                true
            }
            None => {
                log::trace!("snapshot {id:?} in {}: node not found", ctx.path);
                false
            }
        }
    }

    /// Drop every snapshot, throttle stamp and cached element of a node.
    pub fn forget_on_unlock(&mut self, canvas: CanvasPath, id: NodeId) {
        self.snapshots.remove(canvas, id);
        self.elements.release(canvas, id);
    }

    /// Unlock every node of a canvas. Returns how many were locked.
    pub fn unlock_all_in_canvas(&mut self, host: &mut H, ctx: &CanvasContext<H>) -> usize {
        let ids = self.locked.take_canvas(ctx.path);
        for id in &ids {
            self.forget_on_unlock(ctx.path, *id);
        }
        self.snapshots.clear_canvas(ctx.path);
        self.apply_locked_classes(host, ctx);
        log::debug!("unlocked {} node(s) in {}", ids.len(), ctx.path);
        ids.len()
    }

    /// Snapshot every locked node of `ctx` that has none yet. Returns how
    /// many were captured.
    pub fn prime_locked_snapshots(&mut self, host: &H, ctx: &CanvasContext<H>) -> usize {
        let pending: Vec<NodeId> = self
            .locked
            .ids(ctx.path)
            .iter()
            .copied()
            .filter(|id| !self.snapshots.contains(ctx.path, *id))
            .collect();
        let captured = pending
            .into_iter()
            .filter(|id| self.snapshot_on_lock(host, ctx, *id))
            .count();
        if captured > 0 {
            log::debug!("primed {captured} snapshot(s) in {}", ctx.path);
        }
        captured
    }

    // ─── Events ──────────────────────────────────────────────────────────

    /// A batch of elements whose `style` attribute changed.
    pub fn on_style_mutations(&mut self, host: &mut H, targets: &[H::Element], now: Duration) {
        if self.session.is_none() || targets.is_empty() {
            return;
        }
        self.tasks.push_back(Task::Reconcile(targets.to_vec()));
        self.drain(host, now);
    }

    /// Display refresh requested through [`cl_core::Session::request_frame`].
    pub fn on_frame(&mut self, host: &mut H, now: Duration) {
        self.frame_pending = false;
        if self.session.is_none() {
            return;
        }
        if self.restoring_pending {
            self.tasks.push_back(Task::Release);
        }
        if self.window.settle(now) {
            self.tasks.push_back(Task::Enforce);
        }
        self.drain(host, now);
        self.schedule(host, now);
    }

    /// Pointer pressed anywhere under the session container. Never
    /// suppressed.
    pub fn on_pointer_down(
        &mut self,
        host: &mut H,
        target: &H::Element,
        pointer_id: i32,
        modifiers: Modifiers,
        now: Duration,
    ) -> Verdict {
        self.guard.observe_modifiers(modifiers);
        self.note_bypass();
        let Some(ctx) = self.session.clone() else {
            return Verdict::Pass;
        };
        if self.bypass_active() || self.locked.ids(ctx.path).is_empty() {
            return Verdict::Pass;
        }
        if self.on_locked_node(host, &ctx, target) && self.settings.block_pointer_drag {
            log::trace!("blocking pointer {pointer_id} on locked node");
            self.guard.block(pointer_id);
        }
        self.window.hold();
        self.schedule(host, now);
        Verdict::Pass
    }

    pub fn on_pointer_move(&mut self, pointer_id: i32, modifiers: Modifiers) -> Verdict {
        self.guard.observe_modifiers(modifiers);
        self.note_bypass();
        self.guard.verdict_for_move(pointer_id, &self.settings)
    }

    /// Pointer released or cancelled.
    pub fn on_pointer_up(&mut self, host: &mut H, pointer_id: i32, modifiers: Modifiers, now: Duration) {
        self.guard.observe_modifiers(modifiers);
        self.note_bypass();
        self.guard.unblock(pointer_id);
        if self.window.pointer_down() {
            self.window.release(now);
            self.schedule(host, now);
        }
    }

    pub fn on_key_down(&mut self, host: &mut H, key: &str, modifiers: Modifiers, now: Duration) -> Verdict {
        self.guard.observe_modifiers(modifiers);
        self.guard.observe_key(key, true);
        self.note_bypass();
        let has_locked = self
            .session
            .as_ref()
            .is_some_and(|ctx| !self.locked.ids(ctx.path).is_empty());
        if is_nudge_key(key) && has_locked && !self.bypass_active() {
            self.window.nudge(now);
            self.schedule(host, now);
        }
        Verdict::Pass
    }

    pub fn on_key_up(&mut self, key: &str, modifiers: Modifiers) {
        self.guard.observe_modifiers(modifiers);
        self.guard.observe_key(key, false);
        self.note_bypass();
    }

    /// Window lost focus.
    pub fn on_blur(&mut self) {
        self.guard.blur();
        self.note_bypass();
    }

    // ─── Internals ───────────────────────────────────────────────────────

    fn on_locked_node(&self, host: &H, ctx: &CanvasContext<H>, target: &H::Element) -> bool {
        host.closest_with_class(target, NODE_CLASS)
            .and_then(|el| resolve::node_id_of(host, ctx, &el))
            .is_some_and(|id| self.locked.contains(ctx.path, id))
    }

    pub(crate) fn bypass_active(&self) -> bool {
        self.guard.bypass_active(&self.settings)
    }

    fn note_bypass(&mut self) {
        let held = self.bypass_active();
        if held != self.bypass_held {
            self.bypass_held = held;
            let key = self.settings.bypass_modifier.name();
            if held {
                log::debug!("bypass ({key}) held: enforcement suspended");
            } else {
                log::debug!("bypass ({key}) released");
            }
        }
    }

    /// Request a frame if the loop is alive or flags await release.
    pub(crate) fn schedule(&mut self, host: &mut H, now: Duration) {
        let wanted = self.restoring_pending || self.window.is_active(now);
        if wanted && !self.frame_pending && self.session.is_some() {
            self.frame_pending = true;
            host.request_frame();
        }
    }

    /// Whether a frame is outstanding.
    pub fn frame_pending(&self) -> bool {
        self.frame_pending
    }

    /// Whether the enforcement loop is alive at `now`.
    pub fn enforcing(&self, now: Duration) -> bool {
        self.window.is_active(now)
    }
}
