//! Per-element drag lifecycle.
//!
//! Every drag in progress lives in one [`DragCoordinator`], keyed by element.
//! Moves only produce preview positions; persisting a finished drag is the
//! editor's job.

use crate::elements::ElementKey;
use crate::transform::{PixelPoint, TransformOptions, WorldPoint, pixel_to_world, snap_to_grid};
use serde::Serialize;
use std::collections::HashMap;

/// Snapshot of one element's drag, in the shape the renderer reports it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DragState {
    pub is_dragging: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_id: Option<ElementKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_position: Option<WorldPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drag_start: Option<PixelPoint>,
}

/// Emitted by [`DragCoordinator`] on every transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DragEvent {
    Started {
        id: ElementKey,
    },
    Moved {
        id: ElementKey,
        position: WorldPoint,
    },
    Ended {
        id: ElementKey,
        origin: WorldPoint,
        position: WorldPoint,
    },
    Cancelled {
        id: ElementKey,
        origin: WorldPoint,
    },
}

impl DragEvent {
    pub fn id(&self) -> &ElementKey {
        match self {
            DragEvent::Started { id }
            | DragEvent::Moved { id, .. }
            | DragEvent::Ended { id, .. }
            | DragEvent::Cancelled { id, .. } => id,
        }
    }
}

#[derive(Debug, Clone)]
struct DragSession {
    origin: WorldPoint,
    position: WorldPoint,
    start_pointer: PixelPoint,
    /// Set once the pointer leaves `start_pointer`.
    moved: bool,
    /// Pointer world position minus element position at start.
    grab_dx: f64,
    grab_dz: f64,
}

/// Tracks all drags in progress.
#[derive(Debug, Clone, Default)]
pub struct DragCoordinator {
    sessions: HashMap<ElementKey, DragSession>,
    grid_size: Option<f64>,
}

impl DragCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snap every dragged position to `grid_size` world units, or stop
    /// snapping with `None`.
    pub fn set_grid_snap(&mut self, grid_size: Option<f64>) {
        self.grid_size = grid_size.filter(|g| g.is_finite() && *g > 0.0);
    }

    pub fn grid_snap(&self) -> Option<f64> {
        self.grid_size
    }

    /// Begin dragging `id`, currently at `position`. Refused when the element
    /// is already being dragged.
    pub fn drag_start(
        &mut self,
        id: ElementKey,
        position: WorldPoint,
        pointer: PixelPoint,
        opts: TransformOptions,
    ) -> Option<DragEvent> {
        if self.sessions.contains_key(&id) {
            log::debug!("Drag refused, {} is already dragging", id);
            return None;
        }
        let grab = pixel_to_world(pointer, opts);
        self.sessions.insert(
            id.clone(),
            DragSession {
                origin: position,
                position,
                start_pointer: pointer,
                moved: false,
                grab_dx: grab.world_x - position.world_x,
                grab_dz: grab.world_z - position.world_z,
            },
        );
        log::debug!("Drag started: {}", id);
        Some(DragEvent::Started { id })
    }

    /// Preview the element under the pointer.
    pub fn drag_move(
        &mut self,
        id: &ElementKey,
        pointer: PixelPoint,
        opts: TransformOptions,
    ) -> Option<DragEvent> {
        let grid_size = self.grid_size;
        let session = self.sessions.get_mut(id)?;
        session.moved |= pointer != session.start_pointer;
        session.position = session.target(pointer, opts, grid_size);
        Some(DragEvent::Moved {
            id: id.clone(),
            position: session.position,
        })
    }

    /// Finish the drag with a final pointer position. A press and release
    /// without pointer motion ends at the origin, even with grid snap on.
    pub fn drag_end(
        &mut self,
        id: &ElementKey,
        pointer: PixelPoint,
        opts: TransformOptions,
    ) -> Option<DragEvent> {
        let mut session = self.sessions.remove(id)?;
        session.moved |= pointer != session.start_pointer;
        let position = session.target(pointer, opts, self.grid_size);
        log::debug!("Drag ended: {}", id);
        Some(DragEvent::Ended {
            id: id.clone(),
            origin: session.origin,
            position,
        })
    }

    /// Abort a drag. The element returns to where it started.
    pub fn cancel_drag(&mut self, id: &ElementKey) -> Option<DragEvent> {
        let session = self.sessions.remove(id)?;
        log::debug!("Drag cancelled: {}", id);
        Some(DragEvent::Cancelled {
            id: id.clone(),
            origin: session.origin,
        })
    }

    pub fn cancel_all(&mut self) -> Vec<DragEvent> {
        let mut events: Vec<DragEvent> = self
            .sessions
            .drain()
            .map(|(id, session)| DragEvent::Cancelled {
                id,
                origin: session.origin,
            })
            .collect();
        events.sort_by(|a, b| a.id().cmp(b.id()));
        events
    }

    pub fn is_dragging(&self, id: &ElementKey) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn is_any_dragging(&self) -> bool {
        !self.sessions.is_empty()
    }

    /// Preview position of a dragged element.
    pub fn position(&self, id: &ElementKey) -> Option<WorldPoint> {
        self.sessions.get(id).map(|s| s.position)
    }

    /// Position the element had when the drag started.
    pub fn origin(&self, id: &ElementKey) -> Option<WorldPoint> {
        self.sessions.get(id).map(|s| s.origin)
    }

    /// Elements being dragged with their preview positions.
    pub fn positions(&self) -> impl Iterator<Item = (&ElementKey, WorldPoint)> {
        self.sessions.iter().map(|(id, s)| (id, s.position))
    }

    pub fn state(&self, id: &ElementKey) -> DragState {
        match self.sessions.get(id) {
            Some(session) => DragState {
                is_dragging: true,
                element_id: Some(id.clone()),
                element_position: Some(session.position),
                drag_start: Some(session.start_pointer),
            },
            None => DragState::default(),
        }
    }
}

impl DragSession {
    fn target(&self, pointer: PixelPoint, opts: TransformOptions, grid_size: Option<f64>) -> WorldPoint {
        if !self.moved {
            return self.origin;
        }
        let world = pixel_to_world(pointer, opts);
        let position = WorldPoint {
            world_x: world.world_x - self.grab_dx,
            world_z: world.world_z - self.grab_dz,
            world_y: self.origin.world_y,
        };
        match grid_size {
            Some(grid) => snap_to_grid(position, grid).point(position),
            None => position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Point;

    fn identity() -> TransformOptions {
        TransformOptions::default()
    }

    #[test]
    fn test_drag_move_then_cancel_restores_origin() {
        let mut drags = DragCoordinator::new();
        let id = ElementKey::building("1");
        let start = drags.drag_start(id.clone(), WorldPoint::new(10.0, 10.0), Point::new(10.0, 10.0), identity());
        assert_eq!(start, Some(DragEvent::Started { id: id.clone() }));

        let moved = drags.drag_move(&id, Point::new(50.0, 80.0), identity());
        assert_eq!(
            moved,
            Some(DragEvent::Moved {
                id: id.clone(),
                position: WorldPoint::new(50.0, 80.0)
            })
        );
        assert_eq!(drags.position(&id), Some(WorldPoint::new(50.0, 80.0)));

        let cancelled = drags.cancel_drag(&id);
        assert_eq!(
            cancelled,
            Some(DragEvent::Cancelled {
                id: id.clone(),
                origin: WorldPoint::new(10.0, 10.0)
            })
        );
        assert!(!drags.is_dragging(&id));
        assert_eq!(drags.state(&id), DragState::default());
    }

    #[test]
    fn test_grab_offset_prevents_jump() {
        let mut drags = DragCoordinator::new();
        let id = ElementKey::zone("z");
        // Grab the element 5 units right of its anchor at scale 2.
        let opts = TransformOptions::new(2.0, 0.0, 0.0);
        drags.drag_start(id.clone(), WorldPoint::new(100.0, 100.0), Point::new(210.0, 200.0), opts);
        drags.drag_move(&id, Point::new(230.0, 220.0), opts);
        assert_eq!(drags.position(&id), Some(WorldPoint::new(110.0, 110.0)));

        let ended = drags.drag_end(&id, Point::new(250.0, 200.0), opts);
        assert_eq!(
            ended,
            Some(DragEvent::Ended {
                id,
                origin: WorldPoint::new(100.0, 100.0),
                position: WorldPoint::new(120.0, 100.0)
            })
        );
        assert!(!drags.is_any_dragging());
    }

    #[test]
    fn test_second_start_refused() {
        let mut drags = DragCoordinator::new();
        let id = ElementKey::npc("n");
        assert!(drags.drag_start(id.clone(), WorldPoint::ORIGIN, Point::ZERO, identity()).is_some());
        drags.drag_move(&id, Point::new(5.0, 5.0), identity());
        assert!(drags.drag_start(id.clone(), WorldPoint::ORIGIN, Point::ZERO, identity()).is_none());
        // The running drag is untouched.
        assert_eq!(drags.position(&id), Some(WorldPoint::new(5.0, 5.0)));
    }

    #[test]
    fn test_move_without_start_is_noop() {
        let mut drags = DragCoordinator::new();
        let id = ElementKey::npc("n");
        assert_eq!(drags.drag_move(&id, Point::new(1.0, 1.0), identity()), None);
        assert_eq!(drags.drag_end(&id, Point::new(1.0, 1.0), identity()), None);
        assert_eq!(drags.cancel_drag(&id), None);
    }

    #[test]
    fn test_grid_snap() {
        let mut drags = DragCoordinator::new();
        drags.set_grid_snap(Some(10.0));
        let id = ElementKey::building("b");
        drags.drag_start(id.clone(), WorldPoint::ORIGIN, Point::ZERO, identity());
        drags.drag_move(&id, Point::new(14.0, 26.0), identity());
        assert_eq!(drags.position(&id), Some(WorldPoint::new(10.0, 30.0)));

        drags.set_grid_snap(Some(-1.0));
        assert_eq!(drags.grid_snap(), None);
    }

    #[test]
    fn test_click_with_grid_snap_stays_at_origin() {
        let mut drags = DragCoordinator::new();
        drags.set_grid_snap(Some(30.0));
        let id = ElementKey::building("b");
        let origin = WorldPoint::new(100.0, 100.0);
        drags.drag_start(id.clone(), origin, Point::new(105.0, 105.0), identity());

        // A move event without motion is not a drag yet.
        drags.drag_move(&id, Point::new(105.0, 105.0), identity());
        assert_eq!(drags.position(&id), Some(origin));

        let ended = drags.drag_end(&id, Point::new(105.0, 105.0), identity());
        assert_eq!(
            ended,
            Some(DragEvent::Ended {
                id,
                origin,
                position: origin
            })
        );
    }

    #[test]
    fn test_snap_applies_once_pointer_moves() {
        let mut drags = DragCoordinator::new();
        drags.set_grid_snap(Some(30.0));
        let id = ElementKey::building("b");
        drags.drag_start(id.clone(), WorldPoint::new(100.0, 100.0), Point::new(105.0, 105.0), identity());
        drags.drag_move(&id, Point::new(106.0, 105.0), identity());
        // Returning to the press point still counts as a drag.
        let ended = drags.drag_end(&id, Point::new(105.0, 105.0), identity());
        assert!(matches!(
            ended,
            Some(DragEvent::Ended { position, .. }) if position == WorldPoint::new(90.0, 90.0)
        ));
    }

    #[test]
    fn test_cancel_all() {
        let mut drags = DragCoordinator::new();
        drags.drag_start(ElementKey::npc("b"), WorldPoint::new(1.0, 1.0), Point::ZERO, identity());
        drags.drag_start(ElementKey::npc("a"), WorldPoint::new(2.0, 2.0), Point::ZERO, identity());
        assert!(drags.is_dragging(&ElementKey::npc("a")));

        let events = drags.cancel_all();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id(), &ElementKey::npc("a"));
        assert!(events.iter().all(|e| matches!(e, DragEvent::Cancelled { .. })));
        assert!(!drags.is_any_dragging());
    }

    #[test]
    fn test_state_serializes_camel_case() {
        let mut drags = DragCoordinator::new();
        let id = ElementKey::building("7");
        drags.drag_start(id.clone(), WorldPoint::new(1.0, 2.0), Point::new(3.0, 4.0), identity());
        let json = serde_json::to_value(drags.state(&id)).unwrap();
        assert_eq!(json["isDragging"], true);
        assert_eq!(json["elementPosition"]["worldX"], 1.0);
        assert_eq!(json["dragStart"]["x"], 3.0);
    }
}
