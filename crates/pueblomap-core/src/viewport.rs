//! Viewport module for pan/zoom state.

use crate::transform::{
    PixelPoint, TransformOptions, WorldBounds, WorldPoint, pixel_to_world, world_to_pixel,
};
use kurbo::{Affine, Point, Size, Vec2};
use serde::{Deserialize, Serialize};

/// Multiplicative step used by `zoom_in`/`zoom_out`.
pub const DEFAULT_ZOOM_STEP: f64 = 1.1;
/// Padding (world units) added around a rectangle by `fit_to_rect`.
pub const DEFAULT_FIT_PADDING: f64 = 50.0;
/// Minimum time between two accepted wheel events.
pub const DEFAULT_WHEEL_DEBOUNCE_MS: f64 = 50.0;
/// Additive scale change applied per accepted wheel event.
pub const DEFAULT_WHEEL_STEP: f64 = 0.1;

/// Scale bounds and defaults for a viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewportLimits {
    pub min_scale: f64,
    pub max_scale: f64,
    pub default_scale: f64,
    pub zoom_step: f64,
}

impl Default for ViewportLimits {
    fn default() -> Self {
        Self {
            min_scale: 0.1,
            max_scale: 10.0,
            default_scale: 1.0,
            zoom_step: DEFAULT_ZOOM_STEP,
        }
    }
}

impl ViewportLimits {
    /// Clamp a requested scale into `[min_scale, max_scale]`.
    pub fn clamp(&self, scale: f64) -> f64 {
        scale.clamp(self.min_scale, self.max_scale)
    }
}

/// Read-only snapshot of the viewport.
///
/// `center_x`/`center_y` are `size / 2 - offset / scale`, recomputed whenever
/// any other field changes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewportState {
    pub scale: f64,
    pub offset_x: f64,
    pub offset_y: f64,
    pub width: f64,
    pub height: f64,
    pub center_x: f64,
    pub center_y: f64,
}

impl ViewportState {
    pub fn transform(&self) -> TransformOptions {
        TransformOptions::new(self.scale, self.offset_x, self.offset_y)
    }

    pub fn world_to_pixel(&self, world: WorldPoint) -> PixelPoint {
        world_to_pixel(world, self.transform())
    }

    pub fn pixel_to_world(&self, pixel: PixelPoint) -> WorldPoint {
        pixel_to_world(pixel, self.transform())
    }

    pub fn center(&self) -> WorldPoint {
        WorldPoint::new(self.center_x, self.center_y)
    }
}

/// Partial update for [`Viewport::set_viewport`]. `None` fields are kept.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ViewportPatch {
    pub scale: Option<f64>,
    pub offset_x: Option<f64>,
    pub offset_y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
}

impl ViewportPatch {
    pub fn scale(scale: f64) -> Self {
        Self {
            scale: Some(scale),
            ..Self::default()
        }
    }

    pub fn offset(offset_x: f64, offset_y: f64) -> Self {
        Self {
            offset_x: Some(offset_x),
            offset_y: Some(offset_y),
            ..Self::default()
        }
    }

    pub fn size(width: f64, height: f64) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            ..Self::default()
        }
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn with_offset(mut self, offset_x: f64, offset_y: f64) -> Self {
        self.offset_x = Some(offset_x);
        self.offset_y = Some(offset_y);
        self
    }
}

/// Viewport manages the view transform of the map surface.
///
/// It handles panning (offset) and zooming (scale), converting between
/// pixel coordinates and world coordinates.
#[derive(Debug, Clone)]
pub struct Viewport {
    state: ViewportState,
    limits: ViewportLimits,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(0.0, 0.0, ViewportLimits::default())
    }
}

impl Viewport {
    /// Create a viewport of the given surface size at the default scale.
    pub fn new(width: f64, height: f64, limits: ViewportLimits) -> Self {
        let mut viewport = Self {
            state: ViewportState {
                scale: limits.clamp(limits.default_scale),
                offset_x: 0.0,
                offset_y: 0.0,
                width,
                height,
                center_x: 0.0,
                center_y: 0.0,
            },
            limits,
        };
        viewport.sync_center();
        viewport
    }

    pub fn state(&self) -> ViewportState {
        self.state
    }

    pub fn limits(&self) -> ViewportLimits {
        self.limits
    }

    pub fn scale(&self) -> f64 {
        self.state.scale
    }

    pub fn offset(&self) -> Vec2 {
        Vec2::new(self.state.offset_x, self.state.offset_y)
    }

    pub fn size(&self) -> Size {
        Size::new(self.state.width, self.state.height)
    }

    pub fn center(&self) -> WorldPoint {
        self.state.center()
    }

    pub fn transform_options(&self) -> TransformOptions {
        self.state.transform()
    }

    /// Affine transform from world (x, z) to pixel coordinates, for renderers.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.offset()) * Affine::scale(self.state.scale)
    }

    pub fn world_to_pixel(&self, world: WorldPoint) -> PixelPoint {
        self.state.world_to_pixel(world)
    }

    pub fn pixel_to_world(&self, pixel: PixelPoint) -> WorldPoint {
        self.state.pixel_to_world(pixel)
    }

    /// Merge `patch` into the state, clamp the scale and refresh the center.
    ///
    /// Non-finite values in the patch are ignored.
    pub fn set_viewport(&mut self, patch: ViewportPatch) {
        fn merge(target: &mut f64, value: Option<f64>) {
            if let Some(v) = value.filter(|v| v.is_finite()) {
                *target = v;
            }
        }

        merge(&mut self.state.scale, patch.scale);
        merge(&mut self.state.offset_x, patch.offset_x);
        merge(&mut self.state.offset_y, patch.offset_y);
        merge(&mut self.state.width, patch.width.map(|w| w.max(0.0)));
        merge(&mut self.state.height, patch.height.map(|h| h.max(0.0)));
        self.state.scale = self.limits.clamp(self.state.scale);
        self.sync_center();
    }

    /// Resize the surface, keeping scale and offset.
    pub fn set_size(&mut self, width: f64, height: f64) {
        self.set_viewport(ViewportPatch::size(width, height));
    }

    /// Replace the scale limits, re-clamping the current scale.
    pub fn set_limits(&mut self, limits: ViewportLimits) {
        self.limits = limits;
        self.set_viewport(ViewportPatch::default());
    }

    /// Back to the default scale with no offset.
    pub fn reset_viewport(&mut self) {
        self.set_viewport(
            ViewportPatch::scale(self.limits.default_scale).with_offset(0.0, 0.0),
        );
    }

    pub fn zoom_in(&mut self) {
        self.set_viewport(ViewportPatch::scale(self.state.scale * self.limits.zoom_step));
    }

    pub fn zoom_out(&mut self) {
        self.set_viewport(ViewportPatch::scale(self.state.scale / self.limits.zoom_step));
    }

    /// Move the offset by a delta in pixels.
    pub fn pan_by(&mut self, delta: Vec2) {
        self.set_viewport(ViewportPatch::offset(
            self.state.offset_x + delta.x,
            self.state.offset_y + delta.y,
        ));
    }

    /// Zoom to `new_scale`, keeping the world point under `point` fixed on screen.
    pub fn zoom_to_point(&mut self, point: PixelPoint, new_scale: f64) {
        if !new_scale.is_finite() {
            return;
        }

        let old_scale = self.state.scale;
        let clamped = self.limits.clamp(new_scale);
        let ratio = clamped / old_scale;

        let offset_x = point.x - (point.x - self.state.offset_x) * ratio;
        let offset_y = point.y - (point.y - self.state.offset_y) * ratio;

        self.set_viewport(ViewportPatch::scale(clamped).with_offset(offset_x, offset_y));
    }

    /// Fit a world rectangle into the surface with `padding` world units around it.
    pub fn fit_to_rect(&mut self, rect: WorldBounds, padding: f64) {
        let rect = rect.normalized();
        let padded_width = rect.width() + 2.0 * padding;
        let padded_depth = rect.depth() + 2.0 * padding;

        let scale_x = self.state.width / padded_width;
        let scale_y = self.state.height / padded_depth;
        let raw = scale_x.min(scale_y);
        let scale = if raw.is_nan() {
            self.limits.default_scale
        } else {
            raw
        };
        let scale = self.limits.clamp(scale);

        let mid = rect.center();
        self.set_viewport(ViewportPatch::scale(scale).with_offset(
            self.state.width / 2.0 - mid.world_x * scale,
            self.state.height / 2.0 - mid.world_z * scale,
        ));
    }

    /// World rectangle currently visible on the surface.
    pub fn visible_bounds(&self) -> WorldBounds {
        WorldBounds::new(
            self.pixel_to_world(Point::ZERO),
            self.pixel_to_world(Point::new(self.state.width, self.state.height)),
        )
    }

    fn sync_center(&mut self) {
        let s = &mut self.state;
        s.center_x = s.width / 2.0 - s.offset_x / s.scale;
        s.center_y = s.height / 2.0 - s.offset_y / s.scale;
    }
}

/// Wheel-driven zoom with a minimum interval between accepted events.
#[derive(Debug, Clone)]
pub struct WheelZoom {
    min_interval_ms: f64,
    step: f64,
    last_accepted_ms: Option<f64>,
}

impl Default for WheelZoom {
    fn default() -> Self {
        Self::new(DEFAULT_WHEEL_DEBOUNCE_MS, DEFAULT_WHEEL_STEP)
    }
}

impl WheelZoom {
    pub fn new(min_interval_ms: f64, step: f64) -> Self {
        Self {
            min_interval_ms,
            step,
            last_accepted_ms: None,
        }
    }

    /// Apply one wheel event at `point` (surface-relative pixels).
    ///
    /// `delta_y < 0` is a scroll up and zooms in. Returns false when the
    /// event fell inside the debounce window and was dropped.
    pub fn apply(
        &mut self,
        viewport: &mut Viewport,
        point: PixelPoint,
        delta_y: f64,
        timestamp_ms: f64,
    ) -> bool {
        if let Some(last) = self.last_accepted_ms {
            if timestamp_ms - last < self.min_interval_ms {
                return false;
            }
        }
        self.last_accepted_ms = Some(timestamp_ms);

        let delta = if delta_y < 0.0 { self.step } else { -self.step };
        viewport.zoom_to_point(point, viewport.scale() + delta);
        log::debug!("Wheel zoom to {:.2} at ({:.1}, {:.1})", viewport.scale(), point.x, point.y);
        true
    }
}

/// Click-and-drag panning of the viewport.
#[derive(Debug, Clone, Default)]
pub struct PanGesture {
    drag_start: Option<Vec2>,
}

impl PanGesture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start panning with the pointer at `pointer` (surface-relative pixels).
    pub fn begin(&mut self, pointer: PixelPoint, viewport: &Viewport) {
        self.drag_start = Some(pointer.to_vec2() - viewport.offset());
    }

    /// Follow the pointer. Returns false when no pan is active.
    pub fn update(&mut self, pointer: PixelPoint, viewport: &mut Viewport) -> bool {
        let Some(start) = self.drag_start else {
            return false;
        };
        let offset = pointer.to_vec2() - start;
        viewport.set_viewport(ViewportPatch::offset(offset.x, offset.y));
        true
    }

    /// End the pan. Returns true if one was active.
    pub fn end(&mut self) -> bool {
        self.drag_start.take().is_some()
    }

    pub fn is_active(&self) -> bool {
        self.drag_start.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-9;

    fn viewport() -> Viewport {
        Viewport::new(1000.0, 800.0, ViewportLimits::default())
    }

    #[test]
    fn test_default_viewport() {
        let vp = viewport();
        assert_eq!(vp.offset(), Vec2::ZERO);
        assert!((vp.scale() - 1.0).abs() < f64::EPSILON);
        assert!((vp.state().center_x - 500.0).abs() < TOLERANCE);
        assert!((vp.state().center_y - 400.0).abs() < TOLERANCE);
    }

    #[test]
    fn test_scale_clamp() {
        let mut vp = viewport();
        for requested in [-5.0, 0.0, 0.05, 0.5, 3.0, 10.0, 1e9] {
            vp.set_viewport(ViewportPatch::scale(requested));
            let s = vp.scale();
            assert!((0.1..=10.0).contains(&s), "scale {s} out of range");
        }
        vp.zoom_to_point(Point::ZERO, 1e9);
        assert!((vp.scale() - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_center_tracks_every_change() {
        let mut vp = viewport();
        vp.set_viewport(ViewportPatch::offset(100.0, -200.0).with_scale(2.0));
        let s = vp.state();
        assert!((s.center_x - 450.0).abs() < TOLERANCE);
        assert!((s.center_y - 500.0).abs() < TOLERANCE);

        vp.set_size(400.0, 300.0);
        assert!(vp.center().approx_eq(&WorldPoint::new(150.0, 250.0), TOLERANCE));

        vp.pan_by(Vec2::new(-20.0, 40.0));
        assert!(vp.center().approx_eq(&WorldPoint::new(160.0, 230.0), TOLERANCE));
    }

    #[test]
    fn test_reset_viewport() {
        let mut vp = viewport();
        vp.set_viewport(ViewportPatch::offset(12.0, 34.0).with_scale(4.0));
        vp.reset_viewport();
        assert_eq!(vp.offset(), Vec2::ZERO);
        assert!((vp.scale() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zoom_in_out() {
        let mut vp = viewport();
        vp.zoom_in();
        assert!((vp.scale() - 1.1).abs() < TOLERANCE);
        vp.zoom_out();
        assert!((vp.scale() - 1.0).abs() < TOLERANCE);

        vp.set_viewport(ViewportPatch::scale(10.0));
        vp.zoom_in();
        assert!((vp.scale() - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zoom_to_point_keeps_pointer_anchor() {
        let mut vp = viewport();
        let pointer = Point::new(100.0, 50.0);
        let before = vp.pixel_to_world(pointer);

        vp.zoom_to_point(pointer, 2.0);

        assert!((vp.offset().x + 100.0).abs() < TOLERANCE);
        assert!((vp.offset().y + 50.0).abs() < TOLERANCE);
        let after = vp.pixel_to_world(pointer);
        assert!(after.approx_eq(&before, 1e-6));
    }

    #[test]
    fn test_zoom_to_point_anchor_when_clamped() {
        let mut vp = viewport();
        vp.set_viewport(ViewportPatch::offset(37.0, -12.0).with_scale(3.0));
        let pointer = Point::new(640.0, 210.0);
        let before = vp.pixel_to_world(pointer);

        vp.zoom_to_point(pointer, 500.0);

        assert!((vp.scale() - 10.0).abs() < f64::EPSILON);
        let after = vp.pixel_to_world(pointer);
        assert!(after.approx_eq(&before, 1e-6));
    }

    #[test]
    fn test_end_to_end_scenario() {
        let mut vp = viewport();
        let world = WorldPoint::new(100.0, 50.0);
        assert_eq!(vp.world_to_pixel(world), Point::new(100.0, 50.0));

        vp.zoom_to_point(Point::new(100.0, 50.0), 2.0);
        assert!((vp.offset().x + 100.0).abs() < TOLERANCE);
        assert!((vp.offset().y + 50.0).abs() < TOLERANCE);

        let same = vp.pixel_to_world(Point::new(100.0, 50.0));
        assert!(same.approx_eq(&world, 1e-6));
        let moved = vp.pixel_to_world(Point::new(200.0, 100.0));
        assert!(moved.approx_eq(&WorldPoint::new(150.0, 75.0), 1e-6));
    }

    #[test]
    fn test_fit_to_rect() {
        let mut vp = viewport();
        let rect = WorldBounds::from_xz(0.0, 0.0, 400.0, 200.0);
        vp.fit_to_rect(rect, DEFAULT_FIT_PADDING);

        // min(1000 / 500, 800 / 300) = 2
        assert!((vp.scale() - 2.0).abs() < TOLERANCE);
        let mid = vp.world_to_pixel(rect.center());
        assert!((mid.x - 500.0).abs() < TOLERANCE);
        assert!((mid.y - 400.0).abs() < TOLERANCE);
        // offset (100, 200) at scale 2
        assert!(vp.center().approx_eq(&WorldPoint::new(450.0, 300.0), TOLERANCE));
    }

    #[test]
    fn test_fit_to_degenerate_rect_clamps() {
        let mut vp = viewport();
        vp.fit_to_rect(WorldBounds::from_point(WorldPoint::new(5.0, 5.0)), 0.0);
        assert!((vp.scale() - 10.0).abs() < f64::EPSILON);
        let anchor = vp.world_to_pixel(WorldPoint::new(5.0, 5.0));
        assert!((anchor.x - 500.0).abs() < TOLERANCE);
        assert!((anchor.y - 400.0).abs() < TOLERANCE);
    }

    #[test]
    fn test_visible_bounds() {
        let mut vp = viewport();
        vp.set_viewport(ViewportPatch::scale(2.0).with_offset(-100.0, -50.0));
        let visible = vp.visible_bounds().normalized();
        assert!(visible.start.approx_eq(&WorldPoint::new(50.0, 25.0), TOLERANCE));
        assert!(visible.end.approx_eq(&WorldPoint::new(550.0, 425.0), TOLERANCE));
    }

    #[test]
    fn test_affine_matches_projection() {
        let mut vp = viewport();
        vp.set_viewport(ViewportPatch::scale(1.5).with_offset(30.0, -20.0));
        let world = WorldPoint::new(123.0, 456.0);
        let via_affine = vp.transform() * Point::new(world.world_x, world.world_z);
        let direct = vp.world_to_pixel(world);
        assert!((via_affine.x - direct.x).abs() < TOLERANCE);
        assert!((via_affine.y - direct.y).abs() < TOLERANCE);
    }

    #[test]
    fn test_wheel_debounce() {
        let mut vp = viewport();
        let mut wheel = WheelZoom::default();
        let pointer = Point::new(500.0, 400.0);

        assert!(wheel.apply(&mut vp, pointer, -120.0, 1000.0));
        assert!((vp.scale() - 1.1).abs() < TOLERANCE);

        // Within 50 ms: dropped.
        assert!(!wheel.apply(&mut vp, pointer, -120.0, 1030.0));
        assert!((vp.scale() - 1.1).abs() < TOLERANCE);

        // Scroll down after the window.
        assert!(wheel.apply(&mut vp, pointer, 120.0, 1050.0));
        assert!((vp.scale() - 1.0).abs() < TOLERANCE);
    }

    #[test]
    fn test_wheel_zoom_is_pointer_centered() {
        let mut vp = viewport();
        let mut wheel = WheelZoom::default();
        let pointer = Point::new(250.0, 125.0);
        let before = vp.pixel_to_world(pointer);
        wheel.apply(&mut vp, pointer, -1.0, 0.0);
        assert!(vp.pixel_to_world(pointer).approx_eq(&before, 1e-6));
    }

    #[test]
    fn test_pan_gesture() {
        let mut vp = viewport();
        vp.set_viewport(ViewportPatch::offset(10.0, 20.0));
        let mut pan = PanGesture::new();

        assert!(!pan.update(Point::new(5.0, 5.0), &mut vp));

        pan.begin(Point::new(100.0, 100.0), &vp);
        assert!(pan.is_active());
        assert!(pan.update(Point::new(130.0, 90.0), &mut vp));
        assert_eq!(vp.offset(), Vec2::new(40.0, 10.0));

        assert!(pan.end());
        assert!(!pan.is_active());
        assert!(!pan.update(Point::new(500.0, 500.0), &mut vp));
        assert_eq!(vp.offset(), Vec2::new(40.0, 10.0));
    }
}
