//! Map elements and the document snapshot the editor works on.

use crate::layers::{LayerRegistry, LayerType};
use crate::transform::{
    WorldBounds, WorldPoint, distance, get_bounding_box, point_in_polygon, point_in_rect,
    rects_intersect,
};
use crate::update::{BuildingUpdate, ElementUpdate, NpcUpdate, ZoneUpdate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Server-assigned element identifier.
pub type ElementId = String;

/// Free-form element metadata.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Element variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Building,
    Zone,
    Npc,
}

impl ElementKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ElementKind::Building => "building",
            ElementKind::Zone => "zone",
            ElementKind::Npc => "npc",
        }
    }

    /// Resource name used by the persistence service.
    pub fn resource(self) -> &'static str {
        match self {
            ElementKind::Building => "building",
            ElementKind::Zone => "pueblo",
            ElementKind::Npc => "npc",
        }
    }

    /// The layer elements of this kind are painted on.
    pub fn layer(self) -> LayerType {
        match self {
            ElementKind::Building => LayerType::Buildings,
            ElementKind::Zone => LayerType::Zones,
            ElementKind::Npc => LayerType::Npcs,
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies an element across kinds (ids are only unique per kind).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementKey {
    pub kind: ElementKind,
    pub id: ElementId,
}

impl ElementKey {
    pub fn new(kind: ElementKind, id: impl Into<ElementId>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    pub fn building(id: impl Into<ElementId>) -> Self {
        Self::new(ElementKind::Building, id)
    }

    pub fn zone(id: impl Into<ElementId>) -> Self {
        Self::new(ElementKind::Zone, id)
    }

    pub fn npc(id: impl Into<ElementId>) -> Self {
        Self::new(ElementKind::Npc, id)
    }
}

impl fmt::Display for ElementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Common capabilities of every map element.
pub trait ElementTrait {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn kind(&self) -> ElementKind;
    fn metadata(&self) -> &Metadata;

    fn key(&self) -> ElementKey {
        ElementKey::new(self.kind(), self.id())
    }
}

/// A building occupying a rectangular area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Building {
    pub id: ElementId,
    pub name: String,
    pub area: WorldBounds,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pueblo_id: Option<ElementId>,
    #[serde(default)]
    pub metadata: Metadata,
}

/// A zone ("pueblo") outlined by a polygon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    pub id: ElementId,
    pub name: String,
    pub polygon: Vec<WorldPoint>,
    #[serde(default)]
    pub metadata: Metadata,
}

/// A character. Placed at its building's center unless `position` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Npc {
    pub id: ElementId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub building_id: Option<ElementId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<WorldPoint>,
    #[serde(default)]
    pub metadata: Metadata,
}

macro_rules! impl_element_trait {
    ($ty:ty, $kind:expr) => {
        impl ElementTrait for $ty {
            fn id(&self) -> &str {
                &self.id
            }
            fn name(&self) -> &str {
                &self.name
            }
            fn kind(&self) -> ElementKind {
                $kind
            }
            fn metadata(&self) -> &Metadata {
                &self.metadata
            }
        }
    };
}

impl_element_trait!(Building, ElementKind::Building);
impl_element_trait!(Zone, ElementKind::Zone);
impl_element_trait!(Npc, ElementKind::Npc);

/// Any map element.
#[derive(Debug, Clone, PartialEq)]
pub enum MapElement {
    Building(Building),
    Zone(Zone),
    Npc(Npc),
}

impl ElementTrait for MapElement {
    fn id(&self) -> &str {
        match self {
            MapElement::Building(b) => b.id(),
            MapElement::Zone(z) => z.id(),
            MapElement::Npc(n) => n.id(),
        }
    }

    fn name(&self) -> &str {
        match self {
            MapElement::Building(b) => b.name(),
            MapElement::Zone(z) => z.name(),
            MapElement::Npc(n) => n.name(),
        }
    }

    fn kind(&self) -> ElementKind {
        match self {
            MapElement::Building(_) => ElementKind::Building,
            MapElement::Zone(_) => ElementKind::Zone,
            MapElement::Npc(_) => ElementKind::Npc,
        }
    }

    fn metadata(&self) -> &Metadata {
        match self {
            MapElement::Building(b) => b.metadata(),
            MapElement::Zone(z) => z.metadata(),
            MapElement::Npc(n) => n.metadata(),
        }
    }
}

/// Geometry an element would be persisted with after a move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ElementCoords {
    /// Building area.
    Area(WorldBounds),
    /// Zone outline.
    Polygon(Vec<WorldPoint>),
    /// NPC position.
    Point(WorldPoint),
}

impl ElementCoords {
    pub fn kind(&self) -> ElementKind {
        match self {
            ElementCoords::Area(_) => ElementKind::Building,
            ElementCoords::Polygon(_) => ElementKind::Zone,
            ElementCoords::Point(_) => ElementKind::Npc,
        }
    }
}

/// Element records as delivered by the element source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementSnapshot {
    #[serde(default)]
    pub buildings: Vec<Building>,
    #[serde(default, alias = "pueblos")]
    pub zones: Vec<Zone>,
    #[serde(default)]
    pub npcs: Vec<Npc>,
}

impl ElementSnapshot {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// All elements currently loaded into the editor.
#[derive(Debug, Clone, Default)]
pub struct MapDocument {
    elements: HashMap<ElementKey, MapElement>,
    /// Load order; iteration follows it.
    order: Vec<ElementKey>,
}

impl MapDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: ElementSnapshot) -> Self {
        let mut doc = Self::new();
        doc.replace_snapshot(snapshot);
        doc
    }

    /// Replace all elements. Returns the keys that disappeared.
    pub fn replace_snapshot(&mut self, snapshot: ElementSnapshot) -> Vec<ElementKey> {
        let previous: Vec<ElementKey> = std::mem::take(&mut self.order);
        self.elements.clear();

        let incoming = snapshot
            .zones
            .into_iter()
            .map(MapElement::Zone)
            .chain(snapshot.buildings.into_iter().map(MapElement::Building))
            .chain(snapshot.npcs.into_iter().map(MapElement::Npc));
        for element in incoming {
            self.insert(element);
        }

        previous
            .into_iter()
            .filter(|key| !self.elements.contains_key(key))
            .collect()
    }

    /// Export the current elements.
    pub fn to_snapshot(&self) -> ElementSnapshot {
        let mut snapshot = ElementSnapshot::default();
        for element in self.iter() {
            match element.clone() {
                MapElement::Building(b) => snapshot.buildings.push(b),
                MapElement::Zone(z) => snapshot.zones.push(z),
                MapElement::Npc(n) => snapshot.npcs.push(n),
            }
        }
        snapshot
    }

    /// Insert or replace an element.
    pub fn insert(&mut self, element: MapElement) {
        let key = element.key();
        if self.elements.insert(key.clone(), element).is_none() {
            self.order.push(key);
        }
    }

    pub fn remove(&mut self, key: &ElementKey) -> Option<MapElement> {
        self.order.retain(|k| k != key);
        self.elements.remove(key)
    }

    pub fn get(&self, key: &ElementKey) -> Option<&MapElement> {
        self.elements.get(key)
    }

    pub fn contains(&self, key: &ElementKey) -> bool {
        self.elements.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Elements in load order.
    pub fn iter(&self) -> impl Iterator<Item = &MapElement> {
        self.order.iter().filter_map(|key| self.elements.get(key))
    }

    pub fn elements_in_layer(&self, layer: LayerType) -> impl Iterator<Item = &MapElement> {
        self.iter().filter(move |e| e.kind().layer() == layer)
    }

    fn building(&self, id: &str) -> Option<&Building> {
        match self.elements.get(&ElementKey::building(id)) {
            Some(MapElement::Building(b)) => Some(b),
            _ => None,
        }
    }

    /// Anchor point used for dragging: the minimum corner for areas and
    /// polygons, the resolved position for NPCs.
    pub fn position_of(&self, key: &ElementKey) -> Option<WorldPoint> {
        match self.elements.get(key)? {
            MapElement::Building(b) => Some(b.area.normalized().start),
            MapElement::Zone(z) => get_bounding_box(&z.polygon).map(|b| b.start),
            MapElement::Npc(n) => self.npc_position(n),
        }
    }

    /// Where an NPC stands: its own position, else its building's center.
    pub fn npc_position(&self, npc: &Npc) -> Option<WorldPoint> {
        npc.position.or_else(|| {
            npc.building_id
                .as_deref()
                .and_then(|id| self.building(id))
                .map(|b| b.area.center())
        })
    }

    /// World bounding box. NPCs yield a zero-area box at their position.
    pub fn bounds_of(&self, key: &ElementKey) -> Option<WorldBounds> {
        match self.elements.get(key)? {
            MapElement::Building(b) => Some(b.area.normalized()),
            MapElement::Zone(z) => get_bounding_box(&z.polygon),
            MapElement::Npc(n) => self.npc_position(n).map(WorldBounds::from_point),
        }
    }

    /// Envelope of every element, if any has geometry.
    pub fn bounds(&self) -> Option<WorldBounds> {
        self.order
            .iter()
            .filter_map(|key| self.bounds_of(key))
            .reduce(|acc, b| acc.union(&b))
    }

    /// Persistable geometry of an element.
    pub fn coords_of(&self, key: &ElementKey) -> Option<ElementCoords> {
        match self.elements.get(key)? {
            MapElement::Building(b) => Some(ElementCoords::Area(b.area)),
            MapElement::Zone(z) => Some(ElementCoords::Polygon(z.polygon.clone())),
            MapElement::Npc(n) => self.npc_position(n).map(ElementCoords::Point),
        }
    }

    /// Move an element so its anchor sits at `position`. Returns false if
    /// the element is unknown or has no geometry.
    pub fn move_element(&mut self, key: &ElementKey, position: WorldPoint) -> bool {
        let Some(anchor) = self.position_of(key) else {
            return false;
        };
        let dx = position.world_x - anchor.world_x;
        let dz = position.world_z - anchor.world_z;

        match self.elements.get_mut(key) {
            Some(MapElement::Building(b)) => {
                b.area = b.area.moved_to(position);
                true
            }
            Some(MapElement::Zone(z)) => {
                for p in &mut z.polygon {
                    *p = p.translate(dx, dz);
                }
                true
            }
            Some(MapElement::Npc(n)) => {
                n.position = Some(position);
                true
            }
            None => false,
        }
    }

    /// Mirror a persisted update locally. Returns false on a kind mismatch
    /// or unknown element.
    pub fn apply_update(&mut self, id: &str, update: &ElementUpdate) -> bool {
        let key = ElementKey::new(update.kind(), id);
        match (self.elements.get_mut(&key), update) {
            (Some(MapElement::Building(b)), ElementUpdate::Building(u)) => {
                apply_building_update(b, u);
                true
            }
            (Some(MapElement::Zone(z)), ElementUpdate::Zone(u)) => {
                apply_zone_update(z, u);
                true
            }
            (Some(MapElement::Npc(n)), ElementUpdate::Npc(u)) => {
                apply_npc_update(n, u);
                true
            }
            _ => false,
        }
    }

    /// Topmost interactive element under `point`.
    ///
    /// Layers are searched from the top of the paint order down; hidden and
    /// locked layers are skipped. NPCs are hit within `tolerance` world units.
    pub fn element_at_point(
        &self,
        point: WorldPoint,
        tolerance: f64,
        layers: &LayerRegistry,
    ) -> Option<ElementKey> {
        for config in layers.ordered_layers().into_iter().rev() {
            if !config.is_interactive() {
                continue;
            }
            let hit = self
                .elements_in_layer(config.layer_type)
                .filter(|e| self.hit_test(e, point, tolerance))
                .last();
            if let Some(element) = hit {
                return Some(element.key());
            }
        }
        None
    }

    fn hit_test(&self, element: &MapElement, point: WorldPoint, tolerance: f64) -> bool {
        match element {
            MapElement::Building(b) => point_in_rect(point, b.area),
            MapElement::Zone(z) => point_in_polygon(point, &z.polygon),
            MapElement::Npc(n) => self
                .npc_position(n)
                .is_some_and(|p| distance(p, point) <= tolerance),
        }
    }

    /// Interactive elements whose bounding box overlaps `bounds`.
    pub fn elements_in_bounds(
        &self,
        bounds: WorldBounds,
        layers: &LayerRegistry,
    ) -> Vec<ElementKey> {
        self.order
            .iter()
            .filter(|key| layers.is_interactive(key.kind.layer()))
            .filter(|key| match self.bounds_of(key) {
                Some(b) if key.kind == ElementKind::Npc => point_in_rect(b.start, bounds),
                Some(b) => rects_intersect(b, bounds),
                None => false,
            })
            .cloned()
            .collect()
    }
}

fn apply_building_update(building: &mut Building, update: &BuildingUpdate) {
    if let Some(name) = &update.name {
        building.name = name.clone();
    }
    if let Some(area) = update.area {
        building.area = area;
    }
    if let Some(pueblo_id) = &update.pueblo_id {
        building.pueblo_id = Some(pueblo_id.clone());
    }
    if let Some(metadata) = &update.metadata {
        building.metadata = metadata.clone();
    }
}

fn apply_zone_update(zone: &mut Zone, update: &ZoneUpdate) {
    if let Some(name) = &update.name {
        zone.name = name.clone();
    }
    if let Some(polygon) = &update.polygon {
        zone.polygon = polygon.clone();
    }
    if let Some(metadata) = &update.metadata {
        zone.metadata = metadata.clone();
    }
}

fn apply_npc_update(npc: &mut Npc, update: &NpcUpdate) {
    if let Some(name) = &update.name {
        npc.name = name.clone();
    }
    if let Some(building_id) = &update.building_id {
        npc.building_id = Some(building_id.clone());
    }
    if let Some(position) = update.position {
        npc.position = Some(position);
    }
    if let Some(metadata) = &update.metadata {
        npc.metadata = metadata.clone();
    }
}
