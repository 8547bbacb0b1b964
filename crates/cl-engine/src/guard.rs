//! Input guard state: modifier tracking and the blocked pointer.
//!
//! The guard decides; the host acts. A [`Verdict::Suppress`] asks the host
//! to `preventDefault()` and stop propagation of the event at capture phase.

use cl_core::{LockSettings, ModifierKey};

/// Modifier state as last reported by the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub alt: bool,
    pub shift: bool,
    pub ctrl: bool,
    pub meta: bool,
}

impl Modifiers {
    pub fn new(alt: bool, shift: bool, ctrl: bool, meta: bool) -> Self {
        Self {
            alt,
            shift,
            ctrl,
            meta,
        }
    }

    pub fn is_down(&self, key: ModifierKey) -> bool {
        match key {
            ModifierKey::Alt => self.alt,
            ModifierKey::Shift => self.shift,
            ModifierKey::Ctrl => self.ctrl,
            ModifierKey::Meta => self.meta,
        }
    }

    fn set(&mut self, key: ModifierKey, down: bool) {
        match key {
            ModifierKey::Alt => self.alt = down,
            ModifierKey::Shift => self.shift = down,
            ModifierKey::Ctrl => self.ctrl = down,
            ModifierKey::Meta => self.meta = down,
        }
    }
}

/// What the host should do with an input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Suppress,
}

impl Verdict {
    pub fn suppressed(self) -> bool {
        self == Verdict::Suppress
    }
}

/// `KeyboardEvent.key` values that nudge a selection.
pub fn is_nudge_key(key: &str) -> bool {
    matches!(key, "ArrowUp" | "ArrowDown" | "ArrowLeft" | "ArrowRight")
}

#[derive(Debug, Clone, Default)]
pub struct InputGuard {
    modifiers: Modifiers,
    blocked_pointer: Option<i32>,
}

impl InputGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// Take modifier flags carried by a pointer or key event.
    pub fn observe_modifiers(&mut self, modifiers: Modifiers) {
        self.modifiers = modifiers;
    }

    /// A modifier key went down or up.
    pub fn observe_key(&mut self, key: &str, down: bool) {
        if let Some(m) = ModifierKey::from_key(key) {
            self.modifiers.set(m, down);
        }
    }

    /// Window lost focus: key-up events will never arrive.
    pub fn blur(&mut self) {
        self.modifiers = Modifiers::default();
    }

    /// Enforcement is suspended while the configured modifier is held.
    pub fn bypass_active(&self, settings: &LockSettings) -> bool {
        settings.allow_edit_with_modifier && self.modifiers.is_down(settings.bypass_modifier)
    }

    pub fn block(&mut self, pointer_id: i32) {
        self.blocked_pointer = Some(pointer_id);
    }

    pub fn blocked_pointer(&self) -> Option<i32> {
        self.blocked_pointer
    }

    /// Pointer released or cancelled. Returns whether it was blocked.
    pub fn unblock(&mut self, pointer_id: i32) -> bool {
        if self.blocked_pointer == Some(pointer_id) {
            self.blocked_pointer = None;
            return true;
        }
        false
    }

    pub fn verdict_for_move(&self, pointer_id: i32, settings: &LockSettings) -> Verdict {
        if self.bypass_active(settings) || self.blocked_pointer != Some(pointer_id) {
            Verdict::Pass
        } else {
            Verdict::Suppress
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
