//! Enforcement window: how long the per-frame loop stays alive.

use std::time::Duration;

/// Tail kept after the last pointer is released.
pub const POINTER_TAIL: Duration = Duration::from_millis(250);

/// Tail kept after an arrow-key nudge.
pub const NUDGE_TAIL: Duration = Duration::from_millis(400);

/// Alive while a pointer is held or until the deadline passes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnforcementWindow {
    pointer_down: bool,
    deadline: Option<Duration>,
}

impl EnforcementWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pointer pressed: alive until released.
    pub fn hold(&mut self) {
        self.pointer_down = true;
    }

    /// Pointer released at `now`: alive for [`POINTER_TAIL`] more.
    pub fn release(&mut self, now: Duration) {
        self.pointer_down = false;
        self.keep_until(now + POINTER_TAIL);
    }

    /// Arrow-key nudge at `now`: alive for [`NUDGE_TAIL`] more.
    pub fn nudge(&mut self, now: Duration) {
        self.keep_until(now + NUDGE_TAIL);
    }

    /// Alive at least until `until`. Never shortens an existing deadline.
    pub fn keep_until(&mut self, until: Duration) {
        self.deadline = Some(self.deadline.map_or(until, |d| d.max(until)));
    }

    pub fn is_active(&self, now: Duration) -> bool {
        self.pointer_down || self.deadline.is_some_and(|d| now < d)
    }

    /// Drop an expired deadline. Returns whether the window is still alive.
    pub fn settle(&mut self, now: Duration) -> bool {
        if self.is_active(now) {
            return true;
        }
        self.deadline = None;
        false
    }

    pub fn pointer_down(&self) -> bool {
        self.pointer_down
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn held_pointer_keeps_window_open_indefinitely() {
        let mut w = EnforcementWindow::new();
        assert!(!w.is_active(ms(0)));
        w.hold();
        assert!(w.is_active(ms(60_000)));
    }

    #[test]
    fn release_leaves_a_short_tail() {
        let mut w = EnforcementWindow::new();
        w.hold();
        w.release(ms(1_000));
        assert!(w.is_active(ms(1_249)));
        assert!(!w.is_active(ms(1_250)));
        assert!(!w.settle(ms(1_300)));
        assert_eq!(w, EnforcementWindow::new());
    }

    #[test]
    fn nudges_extend_but_never_shorten() {
        let mut w = EnforcementWindow::new();
        w.nudge(ms(0));
        w.hold();
        w.release(ms(10));
        assert!(w.is_active(ms(399)));
        assert!(!w.is_active(ms(400)));
    }

    #[test]
    fn keep_until_opens_a_closed_window() {
        let mut w = EnforcementWindow::new();
        w.keep_until(ms(100));
        assert!(w.is_active(ms(99)));
        w.keep_until(ms(50));
        assert!(!w.settle(ms(100)));
    }
}
