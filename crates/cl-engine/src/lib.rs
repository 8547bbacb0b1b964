pub mod commands;
pub mod engine;
pub mod enforce;
pub mod guard;
pub mod reconcile;
pub mod resolve;
pub mod snapshot;
pub mod table;

pub use commands::{LockDirection, Toggle};
pub use engine::LockEngine;
pub use enforce::{EnforcementWindow, NUDGE_TAIL, POINTER_TAIL};
pub use guard::{InputGuard, Modifiers, Verdict};
pub use resolve::CanvasContext;
pub use snapshot::{MIN_RESTORE_INTERVAL, NodeSnapshot, SnapshotStore};

// Re-export the core crate so hosts need only one dependency
pub use cl_core;
