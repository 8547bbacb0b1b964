//! Geometry model and the structural probe over host node objects.
//!
//! A node's position may live on the node object itself or on one of a few
//! nested records, depending on the host version. [`probe_geometry`] tries
//! the known shapes in a fixed order and reports which one matched, so a
//! later restore can write back through the same shape first.

use crate::host::ObjectModel;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Absolute tolerance for "geometry unchanged".
pub const GEOMETRY_EPSILON: f64 = 1e-4;

/// Where a node's geometry was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryShape {
    /// Fields directly on the node object.
    Primary,
    /// Nested under `pos`.
    Pos,
    /// Nested under `rect`.
    Rect,
    /// Nested under `data`.
    Data,
    /// Not read structurally.
    Unknown,
}

impl GeometryShape {
    /// Probe order for structural reads.
    pub const PROBE_ORDER: [GeometryShape; 4] = [
        GeometryShape::Primary,
        GeometryShape::Pos,
        GeometryShape::Rect,
        GeometryShape::Data,
    ];

    /// Field holding the nested record, `None` for the node object itself.
    pub fn field(self) -> Option<&'static str> {
        match self {
            GeometryShape::Primary | GeometryShape::Unknown => None,
            GeometryShape::Pos => Some("pos"),
            GeometryShape::Rect => Some("rect"),
            GeometryShape::Data => Some("data"),
        }
    }

    /// Write order starting from `self`, then the remaining probe shapes.
    pub fn write_order(self) -> SmallVec<[GeometryShape; 4]> {
        let mut order = SmallVec::new();
        if self != GeometryShape::Unknown {
            order.push(self);
        }
        order.extend(Self::PROBE_ORDER.into_iter().filter(|s| *s != self));
        order
    }

    /// Locate the record for this shape on `node`.
    pub fn locate<H: ObjectModel>(self, host: &H, node: &H::Object) -> Option<H::Object> {
        match self {
            GeometryShape::Primary => Some(node.clone()),
            GeometryShape::Unknown => None,
            shape => shape.field().and_then(|f| host.field(node, f)),
        }
    }
}

/// Captured position/size of a node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub shape: GeometryShape,
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
}

impl Geometry {
    pub const fn at(shape: GeometryShape, x: f64, y: f64) -> Self {
        Self {
            shape,
            x,
            y,
            width: None,
            height: None,
        }
    }

    #[must_use]
    pub const fn with_size(mut self, width: f64, height: f64) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Position and size agree within [`GEOMETRY_EPSILON`]. The shape is
    /// provenance only and does not take part.
    pub fn approx_eq(&self, other: &Geometry) -> bool {
        near(self.x, other.x)
            && near(self.y, other.y)
            && opt_near(self.width, other.width)
            && opt_near(self.height, other.height)
    }
}

fn near(a: f64, b: f64) -> bool {
    (a - b).abs() <= GEOMETRY_EPSILON
}

fn opt_near(a: Option<f64>, b: Option<f64>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => near(a, b),
        _ => false,
    }
}

/// Result of probing a host object for geometry.
#[derive(Debug, Clone)]
pub enum Probe<O> {
    Found {
        shape: GeometryShape,
        /// The record the numbers were read from.
        target: O,
        geometry: Geometry,
    },
    NotFound,
}

impl<O> Probe<O> {
    pub fn geometry(&self) -> Option<Geometry> {
        match self {
            Probe::Found { geometry, .. } => Some(*geometry),
            Probe::NotFound => None,
        }
    }
}

/// Read geometry from one record: numeric `x`/`y` required, size from
/// `width`/`height` or `w`/`h`.
pub fn read_record<H: ObjectModel>(
    host: &H,
    record: &H::Object,
    shape: GeometryShape,
) -> Option<Geometry> {
    let x = host.number(record, "x")?;
    let y = host.number(record, "y")?;
    let width = host.number(record, "width").or_else(|| host.number(record, "w"));
    let height = host
        .number(record, "height")
        .or_else(|| host.number(record, "h"));
    Some(Geometry {
        shape,
        x,
        y,
        width,
        height,
    })
}

/// Try each known shape in [`GeometryShape::PROBE_ORDER`].
pub fn probe_geometry<H: ObjectModel>(host: &H, node: &H::Object) -> Probe<H::Object> {
    for shape in GeometryShape::PROBE_ORDER {
        let Some(target) = shape.locate(host, node) else {
            continue;
        };
        if let Some(geometry) = read_record(host, &target, shape) {
            return Probe::Found {
                shape,
                target,
                geometry,
            };
        }
    }
    Probe::NotFound
}

/// Write `geometry` into one record: position, then size when the snapshot
/// carries it, through `width`/`height` else `w`/`h`. Every target field is
/// checked before the first write, so a structural failure (field absent or
/// not a number) returns `false` with the record untouched.
pub fn write_record<H: ObjectModel>(host: &mut H, record: &H::Object, geometry: &Geometry) -> bool {
    let numeric = |name: &&str| host.number(record, name).is_some();
    if !["x", "y"].iter().all(numeric) {
        return false;
    }
    let mut writes: SmallVec<[(&str, f64); 4]> = SmallVec::new();
    writes.push(("x", geometry.x));
    writes.push(("y", geometry.y));
    for (names, value) in [(["width", "w"], geometry.width), (["height", "h"], geometry.height)] {
        let Some(value) = value else {
            continue;
        };
        let Some(name) = names.into_iter().find(numeric) else {
            return false;
        };
        writes.push((name, value));
    }
    writes
        .into_iter()
        .fold(true, |ok, (name, value)| host.set_number(record, name, value) && ok)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Workspace;
    use crate::memory::{MemoryHost, NodeLayout};
    use serde_json::json;

    #[test]
    fn equality_within_tolerance() {
        let a = Geometry::at(GeometryShape::Primary, 10.0, 20.0).with_size(100.0, 50.0);
        let b = Geometry::at(GeometryShape::Pos, 10.00005, 19.99995).with_size(100.0, 50.0);
        assert!(a.approx_eq(&b));

        let moved = Geometry::at(GeometryShape::Primary, 10.001, 20.0).with_size(100.0, 50.0);
        assert!(!a.approx_eq(&moved));
    }

    #[test]
    fn missing_size_on_one_side_is_divergence() {
        let sized = Geometry::at(GeometryShape::Primary, 0.0, 0.0).with_size(1.0, 1.0);
        let bare = Geometry::at(GeometryShape::Primary, 0.0, 0.0);
        assert!(!sized.approx_eq(&bare));
        assert!(bare.approx_eq(&Geometry::at(GeometryShape::Data, 0.0, 0.0)));
    }

    #[test]
    fn write_order_starts_with_recorded_shape() {
        let order = GeometryShape::Rect.write_order();
        assert_eq!(
            order.as_slice(),
            &[
                GeometryShape::Rect,
                GeometryShape::Primary,
                GeometryShape::Pos,
                GeometryShape::Data
            ]
        );
        assert_eq!(
            GeometryShape::Unknown.write_order().as_slice(),
            &GeometryShape::PROBE_ORDER
        );
    }

    #[test]
    fn size_write_failure_leaves_record_untouched() {
        let mut host = MemoryHost::new();
        let view = host.add_canvas("m.canvas");
        host.add_node(view, "n", json!({"rect": {"x": 3.0, "y": 4.0}}), NodeLayout::default());
        let canvas = host.view_canvas(&view).unwrap();
        let registry = host.field(&canvas, "nodes").unwrap();
        let node = host.lookup(&registry, "n").unwrap();
        let Probe::Found { shape, target, .. } = probe_geometry(&host, &node) else {
            panic!("rect record not found");
        };
        assert_eq!(shape, GeometryShape::Rect);

        let sized = Geometry::at(GeometryShape::Rect, 0.0, 0.0).with_size(10.0, 10.0);
        assert!(!write_record(&mut host, &target, &sized));
        assert_eq!(host.writes(view, "n"), 0);
        assert_eq!(host.geometry(view, "n"), Some((3.0, 4.0, None, None)));

        let bare = Geometry::at(GeometryShape::Rect, 0.0, 0.0);
        assert!(write_record(&mut host, &target, &bare));
        assert_eq!(host.geometry(view, "n"), Some((0.0, 0.0, None, None)));
    }
}
