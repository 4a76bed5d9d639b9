//! The map editor: routes input to the viewport, drags, marquee and
//! selection, and commits finished moves through the orchestrator.

use crate::config::EditorConfig;
use crate::drag::{DragCoordinator, DragEvent};
use crate::editing::{EditingOrchestrator, SaveStatus};
use crate::elements::{
    ElementCoords, ElementKey, ElementKind, ElementSnapshot, ElementTrait, MapDocument,
    MapElement,
};
use crate::gateway::{ElementSource, PersistenceGateway, SourceResult};
use crate::input::{ClickTracker, EventTarget, InputEvent, Modifiers, MouseButton, client_to_surface};
use crate::layers::{LayerError, LayerRegistry, LayerType};
use crate::selection::{SelectionBox, SelectionSet};
use crate::transform::{PixelPoint, WorldPoint, pixel_rect_to_world_bounds};
use crate::update::ElementUpdate;
use crate::viewport::{PanGesture, Viewport, ViewportState, WheelZoom};
use kurbo::{Rect, Size};
use serde::Serialize;
use std::sync::Arc;

/// What the editor reports back after handling input or a command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum EditorEvent {
    ViewportChanged(ViewportState),
    Drag(DragEvent),
    SelectionChanged(Vec<ElementKey>),
    HoverChanged(Option<ElementKey>),
    EditingStarted(ElementKey),
    EditingCancelled,
    LayersChanged { revision: u64 },
    DocumentRefreshed { removed: Vec<ElementKey> },
}

/// Result of persisting one finished drag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommitOutcome {
    pub id: ElementKey,
    pub saved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A finished drag waiting to be persisted.
#[derive(Debug, Clone)]
struct PendingCommit {
    id: ElementKey,
    origin: WorldPoint,
    coords: ElementCoords,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Gesture {
    Idle,
    Panning,
    Dragging(ElementKey),
    Marquee,
}

/// Interactive 2D map editor state.
pub struct MapEditor<G: PersistenceGateway> {
    config: EditorConfig,
    viewport: Viewport,
    wheel: WheelZoom,
    pan: PanGesture,
    layers: LayerRegistry,
    document: MapDocument,
    drags: DragCoordinator,
    marquee: SelectionBox,
    selection: SelectionSet,
    clicks: ClickTracker,
    orchestrator: EditingOrchestrator<G>,
    /// Map surface in client pixels.
    surface: Rect,
    gesture: Gesture,
    pending: Vec<PendingCommit>,
}

impl<G: PersistenceGateway> MapEditor<G> {
    pub fn new(config: EditorConfig, gateway: Arc<G>, size: Size) -> Self {
        let mut drags = DragCoordinator::new();
        drags.set_grid_snap(config.drag_grid());
        Self {
            viewport: Viewport::new(size.width, size.height, config.viewport),
            wheel: WheelZoom::new(config.wheel_debounce_ms, config.wheel_step),
            pan: PanGesture::new(),
            layers: LayerRegistry::new(),
            document: MapDocument::new(),
            drags,
            marquee: SelectionBox::new(),
            selection: SelectionSet::new(),
            clicks: ClickTracker::new(),
            orchestrator: EditingOrchestrator::new(gateway),
            surface: Rect::from_origin_size((0.0, 0.0), size),
            gesture: Gesture::Idle,
            pending: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    pub fn layers(&self) -> &LayerRegistry {
        &self.layers
    }

    pub fn document(&self) -> &MapDocument {
        &self.document
    }

    pub fn drags(&self) -> &DragCoordinator {
        &self.drags
    }

    pub fn marquee(&self) -> &SelectionBox {
        &self.marquee
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn orchestrator(&self) -> &EditingOrchestrator<G> {
        &self.orchestrator
    }

    /// Map surface position and size in client pixels.
    pub fn surface(&self) -> Rect {
        self.surface
    }

    /// Handle to poll while [`flush_commits`](Self::flush_commits) or a save
    /// is running.
    pub fn save_status(&self) -> SaveStatus {
        self.orchestrator.save_status()
    }

    pub fn has_pending_commits(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn is_panning(&self) -> bool {
        self.gesture == Gesture::Panning
    }

    /// Replace all elements with `snapshot`.
    pub fn load_snapshot(&mut self, snapshot: ElementSnapshot) -> Vec<EditorEvent> {
        let removed = self.document.replace_snapshot(snapshot);
        let mut events = Vec::new();
        for id in &removed {
            self.forget_element(id, &mut events);
        }
        log::info!(
            "Loaded {} elements ({} removed)",
            self.document.len(),
            removed.len()
        );
        events.push(EditorEvent::DocumentRefreshed { removed });
        events
    }

    /// Re-read every element from `source`.
    pub async fn refresh<S>(&mut self, source: &S) -> SourceResult<Vec<EditorEvent>>
    where
        S: ElementSource + ?Sized,
    {
        let snapshot = source.fetch_snapshot().await?;
        Ok(self.load_snapshot(snapshot))
    }

    fn forget_element(&mut self, id: &ElementKey, events: &mut Vec<EditorEvent>) {
        if self.selection.is_selected(id) {
            self.selection.remove(id);
            events.push(self.selection_event());
        } else {
            self.selection.remove(id);
        }
        if let Some(event) = self.drags.cancel_drag(id) {
            events.push(EditorEvent::Drag(event));
        }
        if self.gesture == Gesture::Dragging(id.clone()) {
            self.gesture = Gesture::Idle;
        }
        self.orchestrator.forget(id);
        self.pending.retain(|p| &p.id != id);
    }

    /// Handle one input event.
    pub fn handle_event(&mut self, event: InputEvent) -> Vec<EditorEvent> {
        match event {
            InputEvent::PointerDown {
                position,
                button,
                modifiers,
                timestamp_ms,
            } => self.pointer_down(position, button, modifiers, timestamp_ms),
            InputEvent::PointerMove { position } => self.pointer_move(position),
            InputEvent::PointerUp {
                position, target, ..
            } => {
                let position = match target {
                    EventTarget::Surface => position,
                    EventTarget::Window => client_to_surface(position, self.surface),
                };
                self.pointer_up(position)
            }
            InputEvent::PointerLeave => self.set_hovered(None).into_iter().collect(),
            InputEvent::Wheel {
                position,
                delta_y,
                timestamp_ms,
            } => {
                let position = client_to_surface(position, self.surface);
                if self
                    .wheel
                    .apply(&mut self.viewport, position, delta_y, timestamp_ms)
                {
                    vec![self.viewport_event()]
                } else {
                    Vec::new()
                }
            }
            InputEvent::KeyDown { key, .. } => self.key_down(&key),
            InputEvent::SurfaceResized {
                x,
                y,
                width,
                height,
            } => {
                self.surface = Rect::new(x, y, x + width.max(0.0), y + height.max(0.0));
                self.viewport.set_size(width, height);
                vec![self.viewport_event()]
            }
        }
    }

    fn pointer_down(
        &mut self,
        position: PixelPoint,
        button: MouseButton,
        modifiers: Modifiers,
        timestamp_ms: f64,
    ) -> Vec<EditorEvent> {
        let mut events = Vec::new();
        if self.gesture != Gesture::Idle {
            log::debug!("Pointer down ignored, gesture {:?} in progress", self.gesture);
            return events;
        }

        match button {
            MouseButton::Middle => self.begin_pan(position),
            MouseButton::Secondary => {}
            MouseButton::Primary => {
                let double_click = self.clicks.press(position, timestamp_ms);
                match self.element_at(position) {
                    Some(id) if double_click => {
                        self.orchestrator.start_editing(id.kind, id.id.clone());
                        events.push(EditorEvent::EditingStarted(id));
                    }
                    Some(id) if modifiers.shift => {
                        self.selection.toggle(id);
                        events.push(self.selection_event());
                    }
                    Some(id) => {
                        if !self.selection.is_selected(&id) {
                            self.selection.select(id.clone());
                            events.push(self.selection_event());
                        }
                        if let Some(event) = self.start_drag(id.clone(), position) {
                            self.gesture = Gesture::Dragging(id);
                            events.push(EditorEvent::Drag(event));
                        }
                    }
                    None if modifiers.shift => {
                        self.marquee.start(position);
                        self.gesture = Gesture::Marquee;
                    }
                    None => {
                        if !self.selection.is_empty() {
                            self.selection.clear();
                            events.push(self.selection_event());
                        }
                        self.begin_pan(position);
                    }
                }
            }
        }
        events
    }

    fn pointer_move(&mut self, position: PixelPoint) -> Vec<EditorEvent> {
        match self.gesture.clone() {
            Gesture::Panning => {
                if self.pan.update(position, &mut self.viewport) {
                    vec![self.viewport_event()]
                } else {
                    Vec::new()
                }
            }
            Gesture::Dragging(id) => {
                let opts = self.viewport.transform_options();
                self.drags
                    .drag_move(&id, position, opts)
                    .map(EditorEvent::Drag)
                    .into_iter()
                    .collect()
            }
            Gesture::Marquee => {
                self.marquee.update(position);
                Vec::new()
            }
            Gesture::Idle => {
                let hovered = self.element_at(position);
                self.set_hovered(hovered).into_iter().collect()
            }
        }
    }

    fn pointer_up(&mut self, position: PixelPoint) -> Vec<EditorEvent> {
        let mut events = Vec::new();
        match std::mem::replace(&mut self.gesture, Gesture::Idle) {
            Gesture::Idle => {}
            Gesture::Panning => {
                self.pan.end();
            }
            Gesture::Dragging(id) => {
                let opts = self.viewport.transform_options();
                if let Some(event) = self.drags.drag_end(&id, position, opts) {
                    if let DragEvent::Ended {
                        origin, position, ..
                    } = &event
                    {
                        self.finish_drag(&id, *origin, *position);
                    }
                    events.push(EditorEvent::Drag(event));
                }
            }
            Gesture::Marquee => {
                self.marquee.update(position);
                if let Some(rect) = self
                    .marquee
                    .finish_with_threshold(self.config.marquee_min_size)
                {
                    let bounds = pixel_rect_to_world_bounds(rect, self.viewport.transform_options());
                    let found = self.document.elements_in_bounds(bounds, &self.layers);
                    log::debug!("Marquee selected {} elements", found.len());
                    self.selection.replace(found);
                    events.push(self.selection_event());
                }
            }
        }
        events
    }

    fn key_down(&mut self, key: &str) -> Vec<EditorEvent> {
        match key {
            "Escape" => self.escape(),
            "+" | "=" => {
                self.viewport.zoom_in();
                vec![self.viewport_event()]
            }
            "-" => {
                self.viewport.zoom_out();
                vec![self.viewport_event()]
            }
            "0" => {
                self.viewport.reset_viewport();
                vec![self.viewport_event()]
            }
            "f" | "F" => self.fit_to_content().into_iter().collect(),
            _ => Vec::new(),
        }
    }

    /// Cancel the innermost thing in progress: drags, then the marquee, then
    /// the edit session, then the selection.
    fn escape(&mut self) -> Vec<EditorEvent> {
        if self.drags.is_any_dragging() {
            self.gesture = Gesture::Idle;
            return self.drags.cancel_all().into_iter().map(EditorEvent::Drag).collect();
        }
        if self.marquee.is_active() {
            self.marquee.cancel();
            self.gesture = Gesture::Idle;
            return Vec::new();
        }
        if self.orchestrator.session().is_editing() {
            self.orchestrator.cancel_editing();
            return vec![EditorEvent::EditingCancelled];
        }
        if !self.selection.is_empty() {
            self.selection.clear();
            return vec![self.selection_event()];
        }
        Vec::new()
    }

    fn begin_pan(&mut self, position: PixelPoint) {
        self.pan.begin(position, &self.viewport);
        self.gesture = Gesture::Panning;
    }

    /// Topmost interactive element under a surface pixel.
    pub fn element_at(&self, position: PixelPoint) -> Option<ElementKey> {
        let world = self.viewport.pixel_to_world(position);
        let tolerance = self.config.hit_tolerance_px / self.viewport.scale();
        self.document.element_at_point(world, tolerance, &self.layers)
    }

    /// Start dragging `id` with the pointer at `pointer`. Refused when the
    /// element is unknown or its layer is hidden or locked.
    pub fn start_drag(&mut self, id: ElementKey, pointer: PixelPoint) -> Option<DragEvent> {
        if !self.layers.is_interactive(id.kind.layer()) {
            log::debug!("Drag of {} refused, layer {} is not interactive", id, id.kind.layer());
            return None;
        }
        let Some(position) = self.document.position_of(&id) else {
            log::debug!("Drag of {} refused, element has no position", id);
            return None;
        };
        let opts = self.viewport.transform_options();
        self.drags.drag_start(id, position, pointer, opts)
    }

    fn finish_drag(&mut self, id: &ElementKey, origin: WorldPoint, position: WorldPoint) {
        if origin.approx_eq(&position, f64::EPSILON) {
            log::debug!("{} dropped where it started", id);
            return;
        }
        if !self.document.move_element(id, position) {
            return;
        }
        if let Some(coords) = self.document.coords_of(id) {
            self.pending.retain(|p| &p.id != id);
            self.pending.push(PendingCommit {
                id: id.clone(),
                origin,
                coords,
            });
        }
    }

    /// Persist every finished drag. Moves the service rejects are rolled
    /// back to where the drag started.
    pub async fn flush_commits(&mut self) -> Vec<CommitOutcome> {
        let pending = std::mem::take(&mut self.pending);
        let mut outcomes = Vec::with_capacity(pending.len());
        for commit in pending {
            let saved = self
                .orchestrator
                .save_element_coords(&commit.id.id, commit.coords)
                .await;
            let error = if saved {
                None
            } else {
                log::warn!("Rolling back {}", commit.id);
                self.document.move_element(&commit.id, commit.origin);
                self.orchestrator.save_error().map(str::to_string)
            };
            outcomes.push(CommitOutcome {
                id: commit.id,
                saved,
                error,
            });
        }
        outcomes
    }

    /// Save `update` and mirror it locally when the service accepts it.
    pub async fn save(&mut self, id: &str, update: ElementUpdate) -> bool {
        let saved = self.orchestrator.save(id, update.clone()).await;
        if saved {
            self.document.apply_update(id, &update);
        }
        saved
    }

    pub async fn save_element_name(&mut self, kind: ElementKind, id: &str, name: &str) -> bool {
        self.save(id, ElementUpdate::name(kind, name)).await
    }

    pub fn start_editing(&mut self, kind: ElementKind, id: &str) -> Vec<EditorEvent> {
        let key = ElementKey::new(kind, id);
        if !self.document.contains(&key) {
            log::debug!("Cannot edit unknown element {}", key);
            return Vec::new();
        }
        self.orchestrator.start_editing(kind, id);
        vec![EditorEvent::EditingStarted(key)]
    }

    pub fn cancel_editing(&mut self) -> Vec<EditorEvent> {
        self.orchestrator.cancel_editing();
        vec![EditorEvent::EditingCancelled]
    }

    pub fn toggle_layer(&mut self, layer: LayerType) -> Vec<EditorEvent> {
        self.layers.toggle_layer(layer);
        self.layers_changed(layer)
    }

    pub fn toggle_lock(&mut self, layer: LayerType) -> Vec<EditorEvent> {
        self.layers.toggle_lock(layer);
        self.layers_changed(layer)
    }

    pub fn change_opacity(&mut self, layer: LayerType, opacity: f64) -> Vec<EditorEvent> {
        self.layers.change_opacity(layer, opacity);
        vec![self.layers_event()]
    }

    pub fn set_z_index(&mut self, layer: LayerType, z_index: i32) -> Vec<EditorEvent> {
        self.layers.set_z_index(layer, z_index);
        vec![self.layers_event()]
    }

    pub fn activate_layer(&mut self, layer: LayerType) -> Vec<EditorEvent> {
        self.layers.activate_layer(layer);
        vec![self.layers_event()]
    }

    pub fn activate_preset(&mut self, name: &str) -> Result<Vec<EditorEvent>, LayerError> {
        self.layers.activate_preset_named(name)?;
        let mut events = Vec::new();
        for layer in LayerType::ALL {
            events.extend(self.cancel_drags_in(layer));
        }
        events.push(self.layers_event());
        Ok(events)
    }

    fn layers_changed(&mut self, layer: LayerType) -> Vec<EditorEvent> {
        let mut events = self.cancel_drags_in(layer);
        events.push(self.layers_event());
        events
    }

    /// Cancel drags of elements on `layer` once it stops being interactive.
    fn cancel_drags_in(&mut self, layer: LayerType) -> Vec<EditorEvent> {
        if self.layers.is_interactive(layer) {
            return Vec::new();
        }
        let dragged: Vec<ElementKey> = self
            .drags
            .positions()
            .map(|(id, _)| id.clone())
            .filter(|id| id.kind.layer() == layer)
            .collect();
        let mut events = Vec::new();
        for id in dragged {
            if let Some(event) = self.drags.cancel_drag(&id) {
                events.push(EditorEvent::Drag(event));
            }
            if self.gesture == Gesture::Dragging(id) {
                self.gesture = Gesture::Idle;
            }
        }
        events
    }

    /// Fit all elements on screen. Does nothing for an empty map.
    pub fn fit_to_content(&mut self) -> Option<EditorEvent> {
        let bounds = self.document.bounds()?;
        self.viewport.fit_to_rect(bounds, self.config.fit_padding);
        Some(self.viewport_event())
    }

    /// Current position of an element, including a drag in progress. An NPC
    /// standing at its building's center follows that building's drag.
    pub fn display_position(&self, id: &ElementKey) -> Option<WorldPoint> {
        if let Some(position) = self.drags.position(id) {
            return Some(position);
        }
        let anchor = self.document.position_of(id)?;
        let Some(MapElement::Npc(npc)) = self.document.get(id) else {
            return Some(anchor);
        };
        if npc.position.is_some() {
            return Some(anchor);
        }
        let Some(building) = npc.building_id.as_deref().map(ElementKey::building) else {
            return Some(anchor);
        };
        match (self.drags.position(&building), self.document.position_of(&building)) {
            (Some(shown), Some(start)) => Some(anchor.translate(
                shown.world_x - start.world_x,
                shown.world_z - start.world_z,
            )),
            _ => Some(anchor),
        }
    }

    fn set_hovered(&mut self, id: Option<ElementKey>) -> Option<EditorEvent> {
        if self.selection.hovered() == id.as_ref() {
            return None;
        }
        self.selection.set_hovered(id.clone());
        Some(EditorEvent::HoverChanged(id))
    }

    fn selection_event(&self) -> EditorEvent {
        EditorEvent::SelectionChanged(self.selection.selected().cloned().collect())
    }

    fn viewport_event(&self) -> EditorEvent {
        EditorEvent::ViewportChanged(self.viewport.state())
    }

    fn layers_event(&self) -> EditorEvent {
        EditorEvent::LayersChanged {
            revision: self.layers.revision(),
        }
    }

    /// Names of the selected elements, for status display.
    pub fn selected_names(&self) -> Vec<&str> {
        self.selection
            .selected()
            .filter_map(|id| self.document.get(id))
            .map(|e| e.name())
            .collect()
    }
}
