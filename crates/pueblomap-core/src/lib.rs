//! PuebloMap Core Library
//!
//! Platform-agnostic logic for the PuebloMap editor: coordinate transforms,
//! viewport, layers, element drags, marquee selection and persistence.

pub mod config;
pub mod drag;
pub mod editing;
pub mod editor;
pub mod elements;
pub mod gateway;
pub mod input;
pub mod layers;
pub mod scene;
pub mod selection;
pub mod transform;
pub mod update;
pub mod viewport;

pub use config::{ConfigError, ConfigResult, EditorConfig};
pub use drag::{DragCoordinator, DragEvent, DragState};
pub use editing::{EditingOrchestrator, EditingSession, LastSaved, SaveStatus};
pub use editor::{CommitOutcome, EditorEvent, MapEditor};
pub use elements::{
    Building, ElementCoords, ElementKey, ElementKind, ElementSnapshot, ElementTrait, MapDocument,
    MapElement, Npc, Zone,
};
pub use gateway::{
    ElementSource, GatewayError, GatewayResponse, HttpGateway, MemoryGateway, PersistenceGateway,
    SourceError, SourceResult,
};
pub use input::{EventTarget, InputEvent, Modifiers, MouseButton};
pub use layers::{LayerConfig, LayerError, LayerPreset, LayerRegistry, LayerType};
pub use scene::{Frame, build_frame};
pub use selection::{SelectionBox, SelectionSet};
pub use transform::{PixelPoint, TransformOptions, WorldBounds, WorldPoint};
pub use update::{BuildingUpdate, ElementUpdate, NpcUpdate, UpdateError, ZoneUpdate};
pub use viewport::{Viewport, ViewportLimits, ViewportPatch, ViewportState};
