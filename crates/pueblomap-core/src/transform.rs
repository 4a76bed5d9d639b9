//! World/pixel coordinate transforms and world-space rectangle geometry.
//!
//! Everything here is a pure function of its arguments. The map is a 2D
//! projection of the world's horizontal plane: `world_x` maps to the pixel
//! X axis, `world_z` to the pixel Y axis, and the elevation `world_y` is
//! carried along but never projected.

use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// A position on the rendering surface, in pixels.
pub type PixelPoint = Point;

/// Tolerance used when deciding whether a snap actually moved a coordinate.
const SNAP_EPSILON: f64 = 1e-9;

/// A position in the world's horizontal plane.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldPoint {
    pub world_x: f64,
    pub world_z: f64,
    /// Elevation. Ignored by the 2D projection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub world_y: Option<f64>,
}

impl WorldPoint {
    pub const ORIGIN: WorldPoint = WorldPoint {
        world_x: 0.0,
        world_z: 0.0,
        world_y: None,
    };

    pub fn new(world_x: f64, world_z: f64) -> Self {
        Self {
            world_x,
            world_z,
            world_y: None,
        }
    }

    /// Attach an elevation to this point.
    pub fn with_elevation(mut self, world_y: f64) -> Self {
        self.world_y = Some(world_y);
        self
    }

    /// Offset the point on the horizontal plane, keeping its elevation.
    pub fn translate(self, dx: f64, dz: f64) -> Self {
        Self {
            world_x: self.world_x + dx,
            world_z: self.world_z + dz,
            world_y: self.world_y,
        }
    }

    /// Whether two points coincide on the horizontal plane within `tolerance`.
    pub fn approx_eq(&self, other: &WorldPoint, tolerance: f64) -> bool {
        (self.world_x - other.world_x).abs() <= tolerance
            && (self.world_z - other.world_z).abs() <= tolerance
    }
}

/// Scale and offset of a projection from world space to pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformOptions {
    pub scale: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl TransformOptions {
    pub fn new(scale: f64, offset_x: f64, offset_y: f64) -> Self {
        Self {
            scale,
            offset_x,
            offset_y,
        }
    }
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self::new(1.0, 0.0, 0.0)
    }
}

/// Project a world point onto the rendering surface.
pub fn world_to_pixel(world: WorldPoint, opts: TransformOptions) -> PixelPoint {
    Point::new(
        world.world_x * opts.scale + opts.offset_x,
        world.world_z * opts.scale + opts.offset_y,
    )
}

/// Inverse of [`world_to_pixel`]. `opts.scale` must be strictly positive.
pub fn pixel_to_world(pixel: PixelPoint, opts: TransformOptions) -> WorldPoint {
    WorldPoint::new(
        (pixel.x - opts.offset_x) / opts.scale,
        (pixel.y - opts.offset_y) / opts.scale,
    )
}

/// Result of snapping a world point to the grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridSnap {
    pub snapped_x: f64,
    pub snapped_z: f64,
    /// True if either axis moved.
    pub snapped: bool,
}

impl GridSnap {
    /// The snapped position, keeping the elevation of `original`.
    pub fn point(&self, original: WorldPoint) -> WorldPoint {
        WorldPoint {
            world_x: self.snapped_x,
            world_z: self.snapped_z,
            world_y: original.world_y,
        }
    }
}

/// Round both axes of a world point to the nearest multiple of `grid_size`.
///
/// A non-positive or non-finite grid size leaves the point untouched.
pub fn snap_to_grid(world: WorldPoint, grid_size: f64) -> GridSnap {
    if !(grid_size.is_finite() && grid_size > 0.0) {
        return GridSnap {
            snapped_x: world.world_x,
            snapped_z: world.world_z,
            snapped: false,
        };
    }

    let snapped_x = (world.world_x / grid_size).round() * grid_size;
    let snapped_z = (world.world_z / grid_size).round() * grid_size;

    GridSnap {
        snapped_x,
        snapped_z,
        snapped: (snapped_x - world.world_x).abs() > SNAP_EPSILON
            || (snapped_z - world.world_z).abs() > SNAP_EPSILON,
    }
}

/// Euclidean distance on the horizontal plane.
pub fn distance(a: WorldPoint, b: WorldPoint) -> f64 {
    let dx = b.world_x - a.world_x;
    let dz = b.world_z - a.world_z;
    (dx * dx + dz * dz).sqrt()
}

/// A world-space rectangle given by two opposite corners, in any order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldBounds {
    pub start: WorldPoint,
    pub end: WorldPoint,
}

impl WorldBounds {
    pub fn new(start: WorldPoint, end: WorldPoint) -> Self {
        Self { start, end }
    }

    pub fn from_xz(x0: f64, z0: f64, x1: f64, z1: f64) -> Self {
        Self::new(WorldPoint::new(x0, z0), WorldPoint::new(x1, z1))
    }

    /// A zero-area rectangle at a single point.
    pub fn from_point(point: WorldPoint) -> Self {
        Self::new(point, point)
    }

    /// Extent along the X axis (always non-negative).
    pub fn width(&self) -> f64 {
        (self.end.world_x - self.start.world_x).abs()
    }

    /// Extent along the Z axis (always non-negative).
    pub fn depth(&self) -> f64 {
        (self.end.world_z - self.start.world_z).abs()
    }

    pub fn center(&self) -> WorldPoint {
        WorldPoint::new(
            (self.start.world_x + self.end.world_x) / 2.0,
            (self.start.world_z + self.end.world_z) / 2.0,
        )
    }

    pub fn normalized(&self) -> Self {
        normalize_rect(*self)
    }

    /// Move the rectangle so its minimum corner sits at `origin`, keeping its size.
    pub fn moved_to(&self, origin: WorldPoint) -> Self {
        let n = self.normalized();
        let dx = origin.world_x - n.start.world_x;
        let dz = origin.world_z - n.start.world_z;
        Self::new(n.start.translate(dx, dz), n.end.translate(dx, dz))
    }

    /// Smallest rectangle containing both.
    pub fn union(&self, other: &WorldBounds) -> Self {
        let a = self.normalized();
        let b = other.normalized();
        Self::from_xz(
            a.start.world_x.min(b.start.world_x),
            a.start.world_z.min(b.start.world_z),
            a.end.world_x.max(b.end.world_x),
            a.end.world_z.max(b.end.world_z),
        )
    }
}

/// Reorder corners so that `start <= end` on both axes.
pub fn normalize_rect(bounds: WorldBounds) -> WorldBounds {
    let WorldBounds { start, end } = bounds;
    WorldBounds {
        start: WorldPoint {
            world_x: start.world_x.min(end.world_x),
            world_z: start.world_z.min(end.world_z),
            world_y: start.world_y,
        },
        end: WorldPoint {
            world_x: start.world_x.max(end.world_x),
            world_z: start.world_z.max(end.world_z),
            world_y: end.world_y,
        },
    }
}

/// Closed-interval containment; corner order of `bounds` does not matter.
pub fn point_in_rect(point: WorldPoint, bounds: WorldBounds) -> bool {
    let b = normalize_rect(bounds);
    point.world_x >= b.start.world_x
        && point.world_x <= b.end.world_x
        && point.world_z >= b.start.world_z
        && point.world_z <= b.end.world_z
}

/// Closed-interval overlap; touching edges count as intersecting.
pub fn rects_intersect(a: WorldBounds, b: WorldBounds) -> bool {
    let a = normalize_rect(a);
    let b = normalize_rect(b);
    a.start.world_x <= b.end.world_x
        && b.start.world_x <= a.end.world_x
        && a.start.world_z <= b.end.world_z
        && b.start.world_z <= a.end.world_z
}

/// Min/max envelope of a set of points, or `None` when the set is empty.
pub fn get_bounding_box(points: &[WorldPoint]) -> Option<WorldBounds> {
    let first = points.first()?;
    let mut min_x = first.world_x;
    let mut min_z = first.world_z;
    let mut max_x = first.world_x;
    let mut max_z = first.world_z;

    for p in &points[1..] {
        min_x = min_x.min(p.world_x);
        min_z = min_z.min(p.world_z);
        max_x = max_x.max(p.world_x);
        max_z = max_z.max(p.world_z);
    }

    Some(WorldBounds::from_xz(min_x, min_z, max_x, max_z))
}

/// Midpoint of a rectangle.
pub fn bounds_center(bounds: WorldBounds) -> WorldPoint {
    bounds.center()
}

/// Offset a point on the horizontal plane.
pub fn translate_point(point: WorldPoint, dx: f64, dz: f64) -> WorldPoint {
    point.translate(dx, dz)
}

/// Even-odd point-in-polygon test on the horizontal plane.
pub fn point_in_polygon(point: WorldPoint, polygon: &[WorldPoint]) -> bool {
    if polygon.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let pi = polygon[i];
        let pj = polygon[j];
        if (pi.world_z > point.world_z) != (pj.world_z > point.world_z) {
            let cross_x = (pj.world_x - pi.world_x) * (point.world_z - pi.world_z)
                / (pj.world_z - pi.world_z)
                + pi.world_x;
            if point.world_x < cross_x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Project a world rectangle to a (normalized) pixel rectangle.
pub fn world_bounds_to_pixel_rect(bounds: WorldBounds, opts: TransformOptions) -> Rect {
    Rect::from_points(
        world_to_pixel(bounds.start, opts),
        world_to_pixel(bounds.end, opts),
    )
}

/// Unproject a pixel rectangle to a normalized world rectangle.
pub fn pixel_rect_to_world_bounds(rect: Rect, opts: TransformOptions) -> WorldBounds {
    normalize_rect(WorldBounds::new(
        pixel_to_world(Point::new(rect.x0, rect.y0), opts),
        pixel_to_world(Point::new(rect.x1, rect.y1), opts),
    ))
}
