//! Integration tests: lock enforcement against the in-memory host.
//!
//! Each test opens `fixtures/board.canvas`, locks some nodes, lets the host
//! move them the way its drag handlers would, and drives the detectors with
//! the resulting mutation batches and frame ticks.

use cl_core::memory::{IdConvention, MemoryHost, NodeLayout, ViewRef};
use cl_core::{Dom, LockFile, LockSettings, ModifierKey, NodeId};
use cl_engine::{CanvasContext, LockEngine, Modifiers, Verdict};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;

type Geometry = (f64, f64, Option<f64>, Option<f64>);

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn id(s: &str) -> NodeId {
    NodeId::intern(s)
}

fn open_board(settings: LockSettings) -> (MemoryHost, LockEngine<MemoryHost>, CanvasContext<MemoryHost>) {
    init_logging();
    let mut host = MemoryHost::new();
    host.open_canvas_json("board.canvas", include_str!("fixtures/board.canvas"))
        .unwrap();
    let file = LockFile {
        settings,
        ..LockFile::default()
    };
    let mut engine = LockEngine::new(&file);
    let ctx = engine.attach_active(&mut host).unwrap();
    (host, engine, ctx)
}

/// Deliver pending style mutations to the engine, as the observer would.
fn flush(host: &mut MemoryHost, engine: &mut LockEngine<MemoryHost>, now: Duration) {
    let batch = host.take_mutations();
    engine.on_style_mutations(host, &batch, now);
}

fn geometry(host: &MemoryHost, view: ViewRef, node: &str) -> Geometry {
    host.geometry(view, node).unwrap()
}

fn bypass_settings() -> LockSettings {
    LockSettings {
        allow_edit_with_modifier: true,
        bypass_modifier: ModifierKey::Alt,
        ..LockSettings::default()
    }
}

const ALT: Modifiers = Modifiers {
    alt: true,
    shift: false,
    ctrl: false,
    meta: false,
};

// ─── Observer path ──────────────────────────────────────────────────────

#[test]
fn locked_geometry_survives_drags_and_resizes() {
    let (mut host, mut engine, ctx) = open_board(LockSettings::default());
    engine.lock_nodes(&mut host, &ctx, &[id("a"), id("c")]);
    let before_a = geometry(&host, ctx.view, "a");
    let before_c = geometry(&host, ctx.view, "c");

    host.move_node(ctx.view, "a", 40.0, -12.5);
    host.move_node(ctx.view, "a", 3.0, 3.0);
    host.resize_node(ctx.view, "c", 10.0, 10.0);
    flush(&mut host, &mut engine, ms(0));

    assert_eq!(geometry(&host, ctx.view, "a"), before_a);
    assert_eq!(geometry(&host, ctx.view, "c"), before_c);
    let el = host.node_element(ctx.view, "a").unwrap();
    assert!(host.style(el).contains("translate(0px, 0px)"));
}

#[test]
fn unlocked_nodes_move_freely() {
    let (mut host, mut engine, ctx) = open_board(LockSettings::default());
    engine.lock_nodes(&mut host, &ctx, &[id("a")]);
    host.move_node(ctx.view, "b", 10.0, 0.0);
    flush(&mut host, &mut engine, ms(0));
    assert_eq!(geometry(&host, ctx.view, "b"), (310.0, 0.0, Some(240.0), Some(120.0)));
    assert_eq!(host.writes(ctx.view, "b"), 0);
}

#[test]
fn lock_then_unlock_leaves_no_trace() {
    let (mut host, mut engine, ctx) = open_board(LockSettings::default());
    let before = geometry(&host, ctx.view, "b");
    engine.lock_nodes(&mut host, &ctx, &[id("b")]);
    assert!(engine.snapshot(ctx.path, id("b")).is_some());

    engine.unlock_nodes(&mut host, &ctx, &[id("b")]);
    assert_eq!(geometry(&host, ctx.view, "b"), before);
    assert!(engine.snapshot(ctx.path, id("b")).is_none());
    assert!(!engine.is_locked(ctx.path, id("b")));
}

#[test]
fn relocking_after_a_move_keeps_the_new_position() {
    let (mut host, mut engine, ctx) = open_board(LockSettings::default());
    engine.lock_nodes(&mut host, &ctx, &[id("a")]);
    engine.unlock_nodes(&mut host, &ctx, &[id("a")]);

    host.move_node(ctx.view, "a", 100.0, 50.0);
    flush(&mut host, &mut engine, ms(0));
    engine.lock_nodes(&mut host, &ctx, &[id("a")]);

    let snap = engine.snapshot(ctx.path, id("a")).unwrap().geometry.unwrap();
    assert_eq!((snap.x, snap.y), (100.0, 50.0));

    host.move_node(ctx.view, "a", 1.0, 1.0);
    flush(&mut host, &mut engine, ms(100));
    assert_eq!(geometry(&host, ctx.view, "a"), (100.0, 50.0, Some(240.0), Some(120.0)));
}

#[test]
fn bypass_suspends_reversion_until_released() {
    let (mut host, mut engine, ctx) = open_board(bypass_settings());
    engine.lock_nodes(&mut host, &ctx, &[id("a")]);

    engine.on_key_down(&mut host, "Alt", ALT, ms(0));
    host.move_node(ctx.view, "a", 25.0, 0.0);
    flush(&mut host, &mut engine, ms(10));
    assert_eq!(geometry(&host, ctx.view, "a").0, 25.0);

    engine.on_key_up("Alt", Modifiers::default());
    host.move_node(ctx.view, "a", 5.0, 0.0);
    flush(&mut host, &mut engine, ms(20));
    assert_eq!(geometry(&host, ctx.view, "a"), (0.0, 0.0, Some(240.0), Some(120.0)));
}

#[test]
fn bypass_is_ignored_when_disabled() {
    let (mut host, mut engine, ctx) = open_board(LockSettings::default());
    engine.lock_nodes(&mut host, &ctx, &[id("a")]);
    engine.on_key_down(&mut host, "Alt", ALT, ms(0));
    host.move_node(ctx.view, "a", 25.0, 0.0);
    flush(&mut host, &mut engine, ms(10));
    assert_eq!(geometry(&host, ctx.view, "a").0, 0.0);
}

#[test]
fn second_restore_within_interval_is_throttled() {
    let (mut host, mut engine, ctx) = open_board(LockSettings::default());
    engine.lock_nodes(&mut host, &ctx, &[id("a")]);

    host.move_node(ctx.view, "a", 10.0, 0.0);
    flush(&mut host, &mut engine, ms(1_000));
    let after_first = host.writes(ctx.view, "a");
    assert_eq!(after_first, 4);

    // Drop the restore's own echo and release the restoring flags.
    host.take_mutations();
    engine.on_frame(&mut host, ms(1_016));

    host.move_node(ctx.view, "a", 10.0, 0.0);
    flush(&mut host, &mut engine, ms(1_030));
    assert_eq!(host.writes(ctx.view, "a"), after_first);
    assert_eq!(geometry(&host, ctx.view, "a").0, 10.0);

    host.move_node(ctx.view, "a", 1.0, 0.0);
    flush(&mut host, &mut engine, ms(1_050));
    assert_eq!(geometry(&host, ctx.view, "a").0, 0.0);
}

#[test]
fn throttled_restore_lands_once_the_interval_passes() {
    let (mut host, mut engine, ctx) = open_board(LockSettings::default());
    engine.lock_nodes(&mut host, &ctx, &[id("a")]);

    host.move_node(ctx.view, "a", 10.0, 0.0);
    flush(&mut host, &mut engine, ms(1_000));
    host.take_mutations();
    engine.on_frame(&mut host, ms(1_016));
    assert!(!engine.frame_pending());

    // Moved again inside the interval, then nothing else happens.
    host.move_node(ctx.view, "a", 10.0, 0.0);
    flush(&mut host, &mut engine, ms(1_030));
    assert_eq!(geometry(&host, ctx.view, "a").0, 10.0);
    assert!(engine.frame_pending());

    let mut now = 1_030;
    while engine.frame_pending() && now < 10_000 {
        now += 16;
        engine.on_frame(&mut host, ms(now));
        host.take_mutations();
    }
    assert_eq!(geometry(&host, ctx.view, "a"), (0.0, 0.0, Some(240.0), Some(120.0)));
    assert!(!engine.frame_pending());
    assert!(now < 1_200);
}

#[test]
fn wrapped_nodes_are_found_through_their_positioned_wrapper() {
    init_logging();
    let mut host = MemoryHost::new();
    let view = host.add_canvas("wrapped.canvas");
    let layout = NodeLayout {
        ids: IdConvention::DataId,
        wrapped: true,
    };
    let el = host.add_node(view, "w", json!({"pos": {"x": 5.0, "y": 5.0}}), layout);
    let mut engine = LockEngine::new(&LockFile::default());
    let ctx = engine.attach_active(&mut host).unwrap();
    engine.lock_nodes(&mut host, &ctx, &[id("w")]);

    host.move_node(view, "w", 60.0, 0.0);
    let batch = host.take_mutations();
    assert_eq!(batch, vec![host.positioned_element(el)]);
    engine.on_style_mutations(&mut host, &batch, ms(0));
    assert_eq!(host.geometry(view, "w"), Some((5.0, 5.0, None, None)));
}

#[test]
fn nodes_without_geometry_fall_back_to_style() {
    init_logging();
    let mut host = MemoryHost::new();
    let view = host.add_canvas("styled.canvas");
    let el = host.add_node(view, "s", json!({"label": "opaque"}), NodeLayout::default());
    host.set_style(el, "left: 10px; top: 20px; color: red");
    host.take_mutations();
    let mut engine = LockEngine::new(&LockFile::default());
    let ctx = engine.attach_active(&mut host).unwrap();
    engine.lock_nodes(&mut host, &ctx, &[id("s")]);

    host.set_style(el, "left: 400px; top: 20px; color: blue; transform: scale(2)");
    flush(&mut host, &mut engine, ms(0));
    assert_eq!(host.style(el), "left: 10px; top: 20px; color: blue;");
}

// ─── Enforcement loop and input guard ───────────────────────────────────

#[test]
fn pointer_on_locked_node_is_blocked_and_loop_restores_silent_moves() {
    let (mut host, mut engine, ctx) = open_board(LockSettings::default());
    engine.lock_nodes(&mut host, &ctx, &[id("a")]);
    let el = host.node_element(ctx.view, "a").unwrap();
    let content = host.find(&el, cl_core::Selector::Class("canvas-node-content")).unwrap();

    let down = engine.on_pointer_down(&mut host, &content, 1, Modifiers::default(), ms(0));
    assert_eq!(down, Verdict::Pass);
    assert!(engine.frame_pending());
    assert_eq!(engine.on_pointer_move(1, Modifiers::default()), Verdict::Suppress);
    assert_eq!(engine.on_pointer_move(2, Modifiers::default()), Verdict::Pass);

    host.move_model_only(ctx.view, "a", 30.0, 30.0);
    engine.on_frame(&mut host, ms(16));
    assert_eq!(geometry(&host, ctx.view, "a"), (0.0, 0.0, Some(240.0), Some(120.0)));

    engine.on_pointer_up(&mut host, 1, Modifiers::default(), ms(100));
    assert_eq!(engine.on_pointer_move(1, Modifiers::default()), Verdict::Pass);
}

#[test]
fn loop_ends_after_the_pointer_tail() {
    let (mut host, mut engine, ctx) = open_board(LockSettings::default());
    engine.lock_nodes(&mut host, &ctx, &[id("a")]);
    let el = host.node_element(ctx.view, "b").unwrap();

    engine.on_pointer_down(&mut host, &el, 3, Modifiers::default(), ms(0));
    engine.on_frame(&mut host, ms(16));
    engine.on_pointer_up(&mut host, 3, Modifiers::default(), ms(100));
    engine.on_frame(&mut host, ms(200));
    assert!(engine.enforcing(ms(200)));
    assert!(engine.frame_pending());

    engine.on_frame(&mut host, ms(360));
    assert!(!engine.enforcing(ms(360)));
    assert!(!engine.frame_pending());
}

#[test]
fn pointer_on_unlocked_node_is_never_suppressed() {
    let (mut host, mut engine, ctx) = open_board(LockSettings::default());
    engine.lock_nodes(&mut host, &ctx, &[id("a")]);
    let el = host.node_element(ctx.view, "b").unwrap();
    engine.on_pointer_down(&mut host, &el, 4, Modifiers::default(), ms(0));
    assert_eq!(engine.on_pointer_move(4, Modifiers::default()), Verdict::Pass);
}

#[test]
fn drag_blocking_can_be_turned_off() {
    let settings = LockSettings {
        block_pointer_drag: false,
        ..LockSettings::default()
    };
    let (mut host, mut engine, ctx) = open_board(settings);
    engine.lock_nodes(&mut host, &ctx, &[id("a")]);
    let el = host.node_element(ctx.view, "a").unwrap();
    engine.on_pointer_down(&mut host, &el, 1, Modifiers::default(), ms(0));
    assert_eq!(engine.on_pointer_move(1, Modifiers::default()), Verdict::Pass);
    assert!(engine.enforcing(ms(5_000)));
}

#[test]
fn held_bypass_lets_drags_through() {
    let (mut host, mut engine, ctx) = open_board(bypass_settings());
    engine.lock_nodes(&mut host, &ctx, &[id("a")]);
    let el = host.node_element(ctx.view, "a").unwrap();
    engine.on_pointer_down(&mut host, &el, 1, ALT, ms(0));
    assert_eq!(engine.on_pointer_move(1, ALT), Verdict::Pass);
    assert!(!engine.frame_pending());
}

#[test]
fn arrow_nudges_are_reverted_within_the_nudge_tail() {
    let (mut host, mut engine, ctx) = open_board(LockSettings::default());
    engine.lock_nodes(&mut host, &ctx, &[id("c")]);

    engine.on_key_down(&mut host, "ArrowDown", Modifiers::default(), ms(0));
    host.move_model_only(ctx.view, "c", 0.0, 10.0);
    engine.on_frame(&mut host, ms(16));
    assert_eq!(geometry(&host, ctx.view, "c"), (0.0, 200.0, Some(540.0), Some(300.0)));

    engine.on_frame(&mut host, ms(420));
    assert!(!engine.frame_pending());
}

#[test]
fn deleted_nodes_are_skipped_not_forgotten() {
    let (mut host, mut engine, ctx) = open_board(LockSettings::default());
    engine.lock_nodes(&mut host, &ctx, &[id("a"), id("b")]);
    host.remove_node(ctx.view, "a");

    engine.on_key_down(&mut host, "ArrowUp", Modifiers::default(), ms(0));
    host.move_model_only(ctx.view, "b", 7.0, 0.0);
    engine.on_frame(&mut host, ms(16));

    assert_eq!(geometry(&host, ctx.view, "b").0, 300.0);
    assert!(engine.is_locked(ctx.path, id("a")));
    assert!(engine.snapshot(ctx.path, id("a")).is_some());
}

#[test]
fn blur_releases_stuck_bypass() {
    let (mut host, mut engine, ctx) = open_board(bypass_settings());
    engine.lock_nodes(&mut host, &ctx, &[id("a")]);
    engine.on_key_down(&mut host, "Alt", ALT, ms(0));
    engine.on_blur();

    host.move_node(ctx.view, "a", 9.0, 0.0);
    flush(&mut host, &mut engine, ms(10));
    assert_eq!(geometry(&host, ctx.view, "a").0, 0.0);
    let el = host.node_element(ctx.view, "a").unwrap();
    assert!(host.has_class(&el, cl_core::LOCKED_CLASS));
}
