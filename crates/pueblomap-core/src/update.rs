//! Partial element updates sent to the persistence service.
//!
//! Each payload is a closed set of optional fields. Unknown fields are
//! rejected when decoding so a typo never reaches the server silently.

use crate::elements::{ElementCoords, ElementKind, Metadata};
use crate::transform::{WorldBounds, WorldPoint};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors decoding an update payload.
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("invalid {kind} update: {source}")]
    Invalid {
        kind: ElementKind,
        #[source]
        source: serde_json::Error,
    },
    #[error("{0} update must be a JSON object")]
    NotAnObject(ElementKind),
    #[error("{0} update has no fields")]
    Empty(ElementKind),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct BuildingUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<WorldBounds>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pueblo_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ZoneUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polygon: Option<Vec<WorldPoint>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct NpcUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub building_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<WorldPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl BuildingUpdate {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

impl ZoneUpdate {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

impl NpcUpdate {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// An update for one element of a known kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementUpdate {
    Building(BuildingUpdate),
    Zone(ZoneUpdate),
    Npc(NpcUpdate),
}

impl ElementUpdate {
    pub fn kind(&self) -> ElementKind {
        match self {
            ElementUpdate::Building(_) => ElementKind::Building,
            ElementUpdate::Zone(_) => ElementKind::Zone,
            ElementUpdate::Npc(_) => ElementKind::Npc,
        }
    }

    /// Rename only.
    pub fn name(kind: ElementKind, name: impl Into<String>) -> Self {
        let name = Some(name.into());
        match kind {
            ElementKind::Building => ElementUpdate::Building(BuildingUpdate {
                name,
                ..Default::default()
            }),
            ElementKind::Zone => ElementUpdate::Zone(ZoneUpdate {
                name,
                ..Default::default()
            }),
            ElementKind::Npc => ElementUpdate::Npc(NpcUpdate {
                name,
                ..Default::default()
            }),
        }
    }

    /// Geometry only.
    pub fn coords(coords: ElementCoords) -> Self {
        match coords {
            ElementCoords::Area(area) => ElementUpdate::Building(BuildingUpdate {
                area: Some(area),
                ..Default::default()
            }),
            ElementCoords::Polygon(polygon) => ElementUpdate::Zone(ZoneUpdate {
                polygon: Some(polygon),
                ..Default::default()
            }),
            ElementCoords::Point(position) => ElementUpdate::Npc(NpcUpdate {
                position: Some(position),
                ..Default::default()
            }),
        }
    }

    /// Decode a JSON object as an update for `kind`.
    pub fn from_json(kind: ElementKind, value: Value) -> Result<Self, UpdateError> {
        if !value.is_object() {
            return Err(UpdateError::NotAnObject(kind));
        }
        let invalid = |source: serde_json::Error| UpdateError::Invalid { kind, source };
        let update = match kind {
            ElementKind::Building => {
                ElementUpdate::Building(serde_json::from_value(value).map_err(invalid)?)
            }
            ElementKind::Zone => ElementUpdate::Zone(serde_json::from_value(value).map_err(invalid)?),
            ElementKind::Npc => ElementUpdate::Npc(serde_json::from_value(value).map_err(invalid)?),
        };
        if update.is_empty() {
            return Err(UpdateError::Empty(kind));
        }
        Ok(update)
    }

    /// Request body for the persistence service.
    pub fn to_json(&self) -> Value {
        let result = match self {
            ElementUpdate::Building(u) => serde_json::to_value(u),
            ElementUpdate::Zone(u) => serde_json::to_value(u),
            ElementUpdate::Npc(u) => serde_json::to_value(u),
        };
        result.unwrap_or(Value::Null)
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ElementUpdate::Building(u) => u.is_empty(),
            ElementUpdate::Zone(u) => u.is_empty(),
            ElementUpdate::Npc(u) => u.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_building_update() {
        let update = ElementUpdate::from_json(
            ElementKind::Building,
            json!({ "name": "Granary", "puebloId": "4" }),
        )
        .unwrap();
        let ElementUpdate::Building(u) = update else {
            panic!("expected building update");
        };
        assert_eq!(u.name.as_deref(), Some("Granary"));
        assert_eq!(u.pueblo_id.as_deref(), Some("4"));
        assert!(u.area.is_none());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = ElementUpdate::from_json(ElementKind::Npc, json!({ "nmae": "typo" })).unwrap_err();
        assert!(matches!(
            err,
            UpdateError::Invalid {
                kind: ElementKind::Npc,
                ..
            }
        ));
    }

    #[test]
    fn test_zone_rejects_building_fields() {
        let err =
            ElementUpdate::from_json(ElementKind::Zone, json!({ "puebloId": "1" })).unwrap_err();
        assert!(matches!(err, UpdateError::Invalid { .. }));
    }

    #[test]
    fn test_non_object_and_empty() {
        assert!(matches!(
            ElementUpdate::from_json(ElementKind::Zone, json!([1, 2])),
            Err(UpdateError::NotAnObject(ElementKind::Zone))
        ));
        assert!(matches!(
            ElementUpdate::from_json(ElementKind::Zone, json!({})),
            Err(UpdateError::Empty(ElementKind::Zone))
        ));
    }

    #[test]
    fn test_coords_body() {
        let update = ElementUpdate::coords(ElementCoords::Point(WorldPoint::new(3.0, 4.0)));
        assert_eq!(update.kind(), ElementKind::Npc);
        assert_eq!(
            update.to_json(),
            json!({ "position": { "worldX": 3.0, "worldZ": 4.0 } })
        );
    }

    #[test]
    fn test_name_body_omits_unset_fields() {
        let update = ElementUpdate::name(ElementKind::Building, "Mill");
        assert_eq!(update.to_json(), json!({ "name": "Mill" }));
    }
}
