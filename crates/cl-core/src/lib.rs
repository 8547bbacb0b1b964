pub mod host;
pub mod id;
pub mod locked;
#[cfg(any(test, feature = "memory"))]
pub mod memory;
pub mod model;
pub mod persist;
pub mod settings;
pub mod style;

pub use host::{CanvasHost, Dom, NODE_CLASS, ObjectModel, Selector, Session, Workspace};
pub use id::{CanvasPath, NodeId};
pub use locked::LockedSet;
pub use model::{GEOMETRY_EPSILON, Geometry, GeometryShape, Probe, probe_geometry};
pub use persist::{LOCK_FILE_VERSION, LockFile};
pub use settings::{LOCKED_CLASS, LockSettings, ModifierKey};
pub use style::{InlineStyle, POSITIONAL_PROPERTIES};
