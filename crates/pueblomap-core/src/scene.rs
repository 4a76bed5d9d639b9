//! Per-frame data handed to a renderer.

use crate::editing::LastSaved;
use crate::editor::MapEditor;
use crate::elements::{ElementKey, ElementTrait, MapElement};
use crate::gateway::PersistenceGateway;
use crate::layers::{LayerColor, LayerType};
use crate::transform::{PixelPoint, world_bounds_to_pixel_rect};
use crate::viewport::ViewportState;
use kurbo::Rect;
use serde::Serialize;

/// NPC marker radius in screen pixels.
pub const NPC_MARKER_RADIUS: f64 = 6.0;

/// Screen-space geometry of an element.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Geometry {
    Rect { rect: Rect },
    Polygon { points: Vec<PixelPoint> },
    Marker { center: PixelPoint, radius: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementFrame {
    pub id: ElementKey,
    pub name: String,
    pub geometry: Geometry,
    pub selected: bool,
    pub hovered: bool,
    pub dragging: bool,
    pub editing: bool,
}

/// One visible layer, with the opacity to paint it at.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerFrame {
    pub layer: LayerType,
    pub opacity: f64,
    pub locked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<LayerColor>,
    pub elements: Vec<ElementFrame>,
}

/// Everything a renderer needs to draw the editor once.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    pub viewport: ViewportState,
    /// Bottom to top.
    pub layers: Vec<LayerFrame>,
    pub marquee: Option<Rect>,
    pub editing: Option<ElementKey>,
    pub selected: Vec<ElementKey>,
    pub hovered: Option<ElementKey>,
    /// Saves in flight when the frame was built. Poll
    /// [`MapEditor::save_status`] to watch a running save.
    pub is_saving: bool,
    pub save_error: Option<String>,
    pub last_saved: Option<LastSaved>,
}

impl Frame {
    pub fn layer(&self, layer: LayerType) -> Option<&LayerFrame> {
        self.layers.iter().find(|l| l.layer == layer)
    }

    pub fn element(&self, id: &ElementKey) -> Option<&ElementFrame> {
        self.layers
            .iter()
            .flat_map(|l| l.elements.iter())
            .find(|e| &e.id == id)
    }
}

/// Snapshot the editor for painting.
pub fn build_frame<G: PersistenceGateway>(editor: &MapEditor<G>) -> Frame {
    let editing = editor.orchestrator().session().current().cloned();
    let layers = editor
        .layers()
        .visible_layers()
        .into_iter()
        .map(|config| LayerFrame {
            layer: config.layer_type,
            opacity: config.effective_opacity(),
            locked: config.locked,
            color: config.color,
            elements: editor
                .document()
                .elements_in_layer(config.layer_type)
                .filter_map(|element| element_frame(editor, element, editing.as_ref()))
                .collect(),
        })
        .collect();

    let marquee = editor.marquee();
    Frame {
        viewport: editor.viewport().state(),
        layers,
        marquee: marquee.is_active().then(|| marquee.rect()),
        editing,
        selected: editor.selection().selected().cloned().collect(),
        hovered: editor.selection().hovered().cloned(),
        is_saving: editor.orchestrator().is_saving(),
        save_error: editor.orchestrator().save_error().map(str::to_string),
        last_saved: editor.orchestrator().last_saved().cloned(),
    }
}

fn element_frame<G: PersistenceGateway>(
    editor: &MapEditor<G>,
    element: &MapElement,
    editing: Option<&ElementKey>,
) -> Option<ElementFrame> {
    let id = element.key();
    let geometry = geometry(editor, &id, element)?;
    Some(ElementFrame {
        selected: editor.selection().is_selected(&id),
        hovered: editor.selection().hovered() == Some(&id),
        dragging: editor.drags().is_dragging(&id),
        editing: editing == Some(&id),
        name: element.name().to_string(),
        geometry,
        id,
    })
}

/// Pixel geometry, shifted to the drag preview position when one is running.
/// NPCs placed by their building move with that building's drag.
fn geometry<G: PersistenceGateway>(
    editor: &MapEditor<G>,
    id: &ElementKey,
    element: &MapElement,
) -> Option<Geometry> {
    let document = editor.document();
    let viewport = editor.viewport();
    let anchor = document.position_of(id)?;
    let shown = editor.display_position(id).unwrap_or(anchor);
    let (dx, dz) = (shown.world_x - anchor.world_x, shown.world_z - anchor.world_z);

    let geometry = match element {
        MapElement::Building(b) => Geometry::Rect {
            rect: world_bounds_to_pixel_rect(b.area.moved_to(shown), viewport.transform_options()),
        },
        MapElement::Zone(z) => Geometry::Polygon {
            points: z
                .polygon
                .iter()
                .map(|p| viewport.world_to_pixel(p.translate(dx, dz)))
                .collect(),
        },
        MapElement::Npc(_) => Geometry::Marker {
            center: viewport.world_to_pixel(shown),
            radius: NPC_MARKER_RADIUS,
        },
    };
    Some(geometry)
}
