//! WASM bridge for Canvas Lock: exposes the lock engine to the plugin shell.
//!
//! Compiled via `wasm-pack build --target web`. The shell forwards observer
//! batches, animation frames and input events; every entry point takes the
//! event's `performance.now()` timestamp in milliseconds.

mod host;
mod logger;

use cl_core::{CanvasPath, LockFile, LockSettings, NodeId};
use cl_engine::{CanvasContext, LockDirection, LockEngine, Modifiers};
use host::JsHost;
use serde::Serialize;
use std::time::Duration;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::Element;

/// Lock controller for one plugin instance.
#[wasm_bindgen]
pub struct CanvasLock {
    host: JsHost,
    engine: LockEngine<JsHost>,
}

#[derive(Serialize)]
struct ToggleReport {
    direction: &'static str,
    changed: usize,
}

#[wasm_bindgen]
impl CanvasLock {
    /// Create a controller over `bridge` (see the host module) and the saved
    /// lock file text (empty for a fresh install).
    #[wasm_bindgen(constructor)]
    pub fn new(bridge: JsValue, lock_file: &str) -> Result<CanvasLock, JsValue> {
        console_error_panic_hook_setup();
        let file = LockFile::from_json(lock_file).map_err(|e| JsValue::from_str(&e))?;
        Ok(Self {
            host: JsHost::new(bridge),
            engine: LockEngine::new(&file),
        })
    }

    /// Attach to the active canvas. Returns `false` when none is open.
    pub fn attach(&mut self) -> bool {
        self.engine.attach_active(&mut self.host).is_some()
    }

    pub fn dispose(&mut self) {
        self.engine.dispose(&mut self.host);
    }

    /// Current lock file as JSON, to be saved by the shell.
    pub fn lock_file(&self) -> Result<String, JsValue> {
        self.engine.lock_file().to_json().map_err(|e| JsValue::from_str(&e))
    }

    /// Replace the settings from a JSON record.
    pub fn set_settings(&mut self, json: &str) -> Result<(), JsValue> {
        let settings = LockSettings::from_json(json).map_err(|e| JsValue::from_str(&e))?;
        self.engine.set_settings(&mut self.host, settings);
        Ok(())
    }

    pub fn settings(&self) -> String {
        serde_json::to_string(self.engine.settings()).unwrap_or_else(|_| "{}".to_string())
    }

    // ─── Commands ────────────────────────────────────────────────────────

    /// Toggle the selection. Returns `{"direction":"lock"|"unlock","changed":n}`
    /// or `null` when nothing is selected.
    pub fn toggle_lock_selection(&mut self) -> String {
        let toggle = self
            .active()
            .and_then(|ctx| self.engine.toggle_lock_selection(&mut self.host, &ctx));
        let report = toggle.map(|t| ToggleReport {
            direction: match t.direction {
                LockDirection::Lock => "lock",
                LockDirection::Unlock => "unlock",
            },
            changed: t.changed,
        });
        serde_json::to_string(&report).unwrap_or_else(|_| "null".to_string())
    }

    /// Lock the given node ids on the active canvas.
    pub fn lock_nodes(&mut self, ids: Vec<String>) -> usize {
        let ids: Vec<NodeId> = ids.iter().map(|s| NodeId::intern(s)).collect();
        match self.active() {
            Some(ctx) => self.engine.lock_nodes(&mut self.host, &ctx, &ids),
            None => 0,
        }
    }

    pub fn unlock_nodes(&mut self, ids: Vec<String>) -> usize {
        let ids: Vec<NodeId> = ids.iter().map(|s| NodeId::intern(s)).collect();
        match self.active() {
            Some(ctx) => self.engine.unlock_nodes(&mut self.host, &ctx, &ids),
            None => 0,
        }
    }

    /// Unlock every node of the canvas at `path`, or of the active canvas
    /// when `path` is omitted.
    pub fn unlock_all(&mut self, path: Option<String>) -> usize {
        let ctx = match path {
            Some(path) => CanvasContext::find(&self.host, CanvasPath::intern(&path)),
            None => self.active(),
        };
        match ctx {
            Some(ctx) => self.engine.unlock_all_in_canvas(&mut self.host, &ctx),
            None => 0,
        }
    }

    /// Whether `id` is locked on the active canvas.
    pub fn is_locked(&self, id: &str) -> bool {
        self.engine
            .get_active_canvas_context(&self.host)
            .is_some_and(|ctx| self.engine.is_locked(ctx.path, NodeId::intern(id)))
    }

    /// Selected node ids of the active canvas, as a JSON array.
    pub fn selected_ids(&self) -> String {
        let ids: Vec<NodeId> = self
            .engine
            .get_active_canvas_context(&self.host)
            .map(|ctx| self.engine.get_selected_node_ids(&self.host, &ctx))
            .unwrap_or_default();
        serde_json::to_string(&ids).unwrap_or_else(|_| "[]".to_string())
    }

    // ─── Events ──────────────────────────────────────────────────────────

    /// MutationObserver batch: the `target` of every `style` record.
    pub fn on_style_mutations(&mut self, targets: js_sys::Array, now_ms: f64) {
        let targets: Vec<Element> = targets
            .iter()
            .filter_map(|t| t.dyn_into::<Element>().ok())
            .collect();
        self.engine
            .on_style_mutations(&mut self.host, &targets, timestamp(now_ms));
    }

    pub fn on_frame(&mut self, now_ms: f64) {
        self.engine.on_frame(&mut self.host, timestamp(now_ms));
    }

    /// Returns `true` when the shell should suppress the event.
    #[allow(clippy::too_many_arguments)]
    pub fn on_pointer_down(
        &mut self,
        target: Element,
        pointer_id: i32,
        alt: bool,
        shift: bool,
        ctrl: bool,
        meta: bool,
        now_ms: f64,
    ) -> bool {
        let modifiers = Modifiers::new(alt, shift, ctrl, meta);
        self.engine
            .on_pointer_down(&mut self.host, &target, pointer_id, modifiers, timestamp(now_ms))
            .suppressed()
    }

    pub fn on_pointer_move(&mut self, pointer_id: i32, alt: bool, shift: bool, ctrl: bool, meta: bool) -> bool {
        let modifiers = Modifiers::new(alt, shift, ctrl, meta);
        self.engine.on_pointer_move(pointer_id, modifiers).suppressed()
    }

    /// Pointer up or cancel.
    pub fn on_pointer_up(&mut self, pointer_id: i32, alt: bool, shift: bool, ctrl: bool, meta: bool, now_ms: f64) {
        let modifiers = Modifiers::new(alt, shift, ctrl, meta);
        self.engine
            .on_pointer_up(&mut self.host, pointer_id, modifiers, timestamp(now_ms));
    }

    pub fn on_key_down(&mut self, key: &str, alt: bool, shift: bool, ctrl: bool, meta: bool, now_ms: f64) -> bool {
        let modifiers = Modifiers::new(alt, shift, ctrl, meta);
        self.engine
            .on_key_down(&mut self.host, key, modifiers, timestamp(now_ms))
            .suppressed()
    }

    pub fn on_key_up(&mut self, key: &str, alt: bool, shift: bool, ctrl: bool, meta: bool) {
        self.engine
            .on_key_up(key, Modifiers::new(alt, shift, ctrl, meta));
    }

    pub fn on_blur(&mut self) {
        self.engine.on_blur();
    }
}

impl CanvasLock {
    /// Active canvas, attaching to it first if needed.
    fn active(&mut self) -> Option<CanvasContext<JsHost>> {
        self.engine.attach_active(&mut self.host)
    }
}

/// Set the console log level (`"off"`, `"error"` ... `"trace"`).
#[wasm_bindgen]
pub fn set_log_level(level: &str) {
    logger::init(logger::parse_level(level));
}

/// Validate lock file text without creating a controller. Returns an empty
/// string when valid, else the error.
#[wasm_bindgen]
pub fn validate_lock_file(text: &str) -> String {
    match LockFile::from_json(text) {
        Ok(_) => String::new(),
        Err(e) => e,
    }
}

/// Host timestamp in milliseconds → engine time.
fn timestamp(now_ms: f64) -> Duration {
    if now_ms.is_finite() && now_ms > 0.0 {
        Duration::from_secs_f64(now_ms / 1000.0)
    } else {
        Duration::ZERO
    }
}

fn console_error_panic_hook_setup() {
    #[cfg(target_arch = "wasm32")]
    {
        use std::sync::Once;
        static SET_HOOK: Once = Once::new();
        SET_HOOK.call_once(|| {
            std::panic::set_hook(Box::new(|info| {
                let msg = format!("Canvas Lock WASM panic: {info}");
                web_sys::console::error_1(&msg.into());
            }));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn timestamps_clamp_to_zero() {
        assert_eq!(timestamp(1500.0), Duration::from_millis(1500));
        assert_eq!(timestamp(-3.0), Duration::ZERO);
        assert_eq!(timestamp(f64::NAN), Duration::ZERO);
    }

    #[test]
    fn lock_files_validate_without_a_controller() {
        assert_eq!(validate_lock_file(r#"{"version":1,"locked":{}}"#), "");
        assert!(validate_lock_file(r#"{"version":9}"#).contains("unsupported"));
    }

    #[test]
    fn toggle_reports_serialize_for_the_shell() {
        let report = ToggleReport {
            direction: "lock",
            changed: 2,
        };
        assert_eq!(
            serde_json::to_string(&Some(report)).unwrap(),
            r#"{"direction":"lock","changed":2}"#
        );
        assert_eq!(serde_json::to_string(&None::<ToggleReport>).unwrap(), "null");
    }
}
