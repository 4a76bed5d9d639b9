//! Recorded editor sessions.

use kurbo::Size;
use pueblomap_core::{ElementKind, ElementSnapshot, InputEvent, LayerType};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use crate::AppError;

/// Where the map surface sits in the window, in client pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Surface {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Default for Surface {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 1000.0,
            height: 800.0,
        }
    }
}

impl Surface {
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// The event that places the editor's surface here.
    pub fn resize_event(&self) -> InputEvent {
        InputEvent::SurfaceResized {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
        }
    }
}

/// Editor operations that do not come from a pointer or the keyboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    ToggleLayer { layer: LayerType },
    ToggleLock { layer: LayerType },
    ChangeOpacity { layer: LayerType, opacity: f64 },
    ActivatePreset { preset: String },
    StartEditing { kind: ElementKind, id: String },
    Rename { kind: ElementKind, id: String, name: String },
    /// Raw partial update, validated before it is sent.
    Update { kind: ElementKind, id: String, fields: Value },
    /// Persist finished drags now.
    Flush,
    /// Re-read elements from the source.
    Refresh,
    FitToContent,
}

/// One recorded step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Step {
    Input(InputEvent),
    Command(Command),
}

/// A recorded session: surface geometry, optional elements and the steps
/// to replay.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Session {
    pub surface: Surface,
    pub elements: Option<ElementSnapshot>,
    pub steps: Vec<Step>,
}

impl Session {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn load(path: &Path) -> Result<Self, AppError> {
        let json = std::fs::read_to_string(path).map_err(|source| AppError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json).map_err(|source| AppError::Session {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Read an element snapshot file.
pub fn load_elements(path: &Path) -> Result<ElementSnapshot, AppError> {
    let json = std::fs::read_to_string(path).map_err(|source| AppError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    ElementSnapshot::from_json(&json).map_err(|source| AppError::Session {
        path: path.to_path_buf(),
        source,
    })
}
