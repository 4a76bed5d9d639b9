//! Layer registry: visibility, lock, opacity and paint order per layer.
//!
//! The set of layers is closed. Locked layers are still painted (at reduced
//! opacity) but interaction handlers must ignore their elements; the registry
//! only answers the `is_layer_visible`/`is_layer_locked` questions.

use peniko::Color;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Opacity multiplier applied to locked layers when painting.
pub const LOCKED_OPACITY_FACTOR: f64 = 0.5;

/// Layer registry errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayerError {
    #[error("Unknown layer: {0}")]
    UnknownLayer(String),
    #[error("Unknown layer preset: {0}")]
    UnknownPreset(String),
}

/// The fixed set of map layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerType {
    Background,
    Zones,
    Buildings,
    Npcs,
    Routes,
    Activity,
    Ui,
}

impl LayerType {
    /// All layer types, in default paint order.
    pub const ALL: [LayerType; 7] = [
        LayerType::Background,
        LayerType::Zones,
        LayerType::Buildings,
        LayerType::Npcs,
        LayerType::Routes,
        LayerType::Activity,
        LayerType::Ui,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LayerType::Background => "background",
            LayerType::Zones => "zones",
            LayerType::Buildings => "buildings",
            LayerType::Npcs => "npcs",
            LayerType::Routes => "routes",
            LayerType::Activity => "activity",
            LayerType::Ui => "ui",
        }
    }

    fn index(self) -> usize {
        self as usize
    }

    fn default_color(self) -> Option<LayerColor> {
        let rgba = match self {
            LayerType::Background => return None,
            LayerType::Zones => (34, 197, 94, 96),
            LayerType::Buildings => (59, 130, 246, 255),
            LayerType::Npcs => (234, 179, 8, 255),
            LayerType::Routes => (168, 85, 247, 255),
            LayerType::Activity => (239, 68, 68, 255),
            LayerType::Ui => (15, 23, 42, 255),
        };
        Some(LayerColor::new(rgba.0, rgba.1, rgba.2, rgba.3))
    }
}

impl fmt::Display for LayerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayerType {
    type Err = LayerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LayerType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| LayerError::UnknownLayer(s.to_string()))
    }
}

/// Serializable layer tint (RGBA8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl LayerColor {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

impl From<Color> for LayerColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self::new(rgba.r, rgba.g, rgba.b, rgba.a)
    }
}

impl From<LayerColor> for Color {
    fn from(color: LayerColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

/// Display settings of one layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerConfig {
    pub id: String,
    #[serde(rename = "type")]
    pub layer_type: LayerType,
    pub visible: bool,
    pub locked: bool,
    /// In `[0, 1]`.
    pub opacity: f64,
    pub z_index: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<LayerColor>,
}

impl LayerConfig {
    fn default_for(layer_type: LayerType) -> Self {
        Self {
            id: format!("layer-{}", layer_type.as_str()),
            layer_type,
            visible: true,
            locked: false,
            opacity: 1.0,
            z_index: layer_type.index() as i32,
            color: layer_type.default_color(),
        }
    }

    /// Opacity the renderer should paint with.
    pub fn effective_opacity(&self) -> f64 {
        if self.locked {
            self.opacity * LOCKED_OPACITY_FACTOR
        } else {
            self.opacity
        }
    }

    /// Visible and unlocked.
    pub fn is_interactive(&self) -> bool {
        self.visible && !self.locked
    }
}

/// Named bulk visibility assignments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayerPreset {
    All,
    BuildingsOnly,
    MapOnly,
}

impl LayerPreset {
    pub fn as_str(self) -> &'static str {
        match self {
            LayerPreset::All => "all",
            LayerPreset::BuildingsOnly => "buildings-only",
            LayerPreset::MapOnly => "map-only",
        }
    }

    /// Visibility this preset assigns to `layer`.
    pub fn visibility(self, layer: LayerType) -> bool {
        use LayerType::*;
        match self {
            LayerPreset::All => true,
            LayerPreset::BuildingsOnly => matches!(layer, Background | Buildings | Ui),
            LayerPreset::MapOnly => matches!(layer, Background | Zones | Routes | Ui),
        }
    }
}

impl FromStr for LayerPreset {
    type Err = LayerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(LayerPreset::All),
            "buildings-only" => Ok(LayerPreset::BuildingsOnly),
            "map-only" => Ok(LayerPreset::MapOnly),
            other => Err(LayerError::UnknownPreset(other.to_string())),
        }
    }
}

/// Owns the configuration of every layer.
#[derive(Debug, Clone)]
pub struct LayerRegistry {
    layers: [LayerConfig; 7],
    active: Option<LayerType>,
    revision: u64,
}

impl Default for LayerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerRegistry {
    pub fn new() -> Self {
        Self {
            layers: LayerType::ALL.map(LayerConfig::default_for),
            active: None,
            revision: 0,
        }
    }

    pub fn get(&self, layer: LayerType) -> &LayerConfig {
        &self.layers[layer.index()]
    }

    /// Incremented once per mutation; renderers compare it to skip redraws.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// The layer whose controls are focused in the UI, if any.
    pub fn active_layer(&self) -> Option<LayerType> {
        self.active
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    pub fn toggle_layer(&mut self, layer: LayerType) {
        let config = &mut self.layers[layer.index()];
        config.visible = !config.visible;
        log::debug!("Layer {} visible={}", layer, config.visible);
        self.touch();
    }

    pub fn toggle_lock(&mut self, layer: LayerType) {
        let config = &mut self.layers[layer.index()];
        config.locked = !config.locked;
        log::debug!("Layer {} locked={}", layer, config.locked);
        self.touch();
    }

    /// Set a layer's opacity, clamped to `[0, 1]`. NaN is ignored.
    pub fn change_opacity(&mut self, layer: LayerType, opacity: f64) {
        if opacity.is_nan() {
            return;
        }
        self.layers[layer.index()].opacity = opacity.clamp(0.0, 1.0);
        self.touch();
    }

    /// Move a layer in the paint order. Ties are broken by the default order.
    pub fn set_z_index(&mut self, layer: LayerType, z_index: i32) {
        self.layers[layer.index()].z_index = z_index;
        self.touch();
    }

    /// Make `layer` visible and focus it in the UI. Paint order is unchanged.
    pub fn activate_layer(&mut self, layer: LayerType) {
        self.layers[layer.index()].visible = true;
        self.active = Some(layer);
        self.touch();
    }

    /// Assign visibility of every layer from `preset` in one step.
    pub fn activate_preset(&mut self, preset: LayerPreset) {
        let visibility = LayerType::ALL.map(|t| preset.visibility(t));
        for (config, visible) in self.layers.iter_mut().zip(visibility) {
            config.visible = visible;
        }
        log::debug!("Applied layer preset {}", preset.as_str());
        self.touch();
    }

    /// [`activate_preset`](Self::activate_preset) by name.
    pub fn activate_preset_named(&mut self, name: &str) -> Result<(), LayerError> {
        let preset = name.parse::<LayerPreset>()?;
        self.activate_preset(preset);
        Ok(())
    }

    /// All layers sorted by ascending z-index (paint order, bottom first).
    pub fn ordered_layers(&self) -> Vec<&LayerConfig> {
        let mut ordered: Vec<&LayerConfig> = self.layers.iter().collect();
        ordered.sort_by_key(|c| (c.z_index, c.layer_type.index()));
        ordered
    }

    /// Visible layers in paint order.
    pub fn visible_layers(&self) -> Vec<&LayerConfig> {
        self.ordered_layers()
            .into_iter()
            .filter(|c| c.visible)
            .collect()
    }

    pub fn is_layer_visible(&self, layer: LayerType) -> bool {
        self.get(layer).visible
    }

    pub fn is_layer_locked(&self, layer: LayerType) -> bool {
        self.get(layer).locked
    }

    /// Whether elements of `layer` may be hovered, clicked or dragged.
    pub fn is_interactive(&self, layer: LayerType) -> bool {
        self.get(layer).is_interactive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_sorted(layers: &[&LayerConfig]) -> bool {
        layers.windows(2).all(|w| w[0].z_index <= w[1].z_index)
    }

    #[test]
    fn test_default_registry() {
        let registry = LayerRegistry::new();
        for t in LayerType::ALL {
            let config = registry.get(t);
            assert_eq!(config.layer_type, t);
            assert!(config.visible);
            assert!(!config.locked);
            assert!((config.opacity - 1.0).abs() < f64::EPSILON);
        }
        let order: Vec<_> = registry.ordered_layers().iter().map(|c| c.layer_type).collect();
        assert_eq!(order, LayerType::ALL.to_vec());
    }

    #[test]
    fn test_toggle_layer_and_lock() {
        let mut registry = LayerRegistry::new();
        registry.toggle_layer(LayerType::Npcs);
        assert!(!registry.is_layer_visible(LayerType::Npcs));
        registry.toggle_layer(LayerType::Npcs);
        assert!(registry.is_layer_visible(LayerType::Npcs));

        registry.toggle_lock(LayerType::Buildings);
        assert!(registry.is_layer_locked(LayerType::Buildings));
        assert!(registry.is_layer_visible(LayerType::Buildings));
        assert!(!registry.is_interactive(LayerType::Buildings));
    }

    #[test]
    fn test_change_opacity_clamps() {
        let mut registry = LayerRegistry::new();
        registry.change_opacity(LayerType::Zones, 1.7);
        assert!((registry.get(LayerType::Zones).opacity - 1.0).abs() < f64::EPSILON);
        registry.change_opacity(LayerType::Zones, -0.3);
        assert!(registry.get(LayerType::Zones).opacity.abs() < f64::EPSILON);
        registry.change_opacity(LayerType::Zones, 0.4);
        assert!((registry.get(LayerType::Zones).opacity - 0.4).abs() < f64::EPSILON);
        registry.change_opacity(LayerType::Zones, f64::NAN);
        assert!((registry.get(LayerType::Zones).opacity - 0.4).abs() < f64::EPSILON);
    }

    #[test]
    fn test_locked_layer_paints_dimmed() {
        let mut registry = LayerRegistry::new();
        registry.change_opacity(LayerType::Routes, 0.8);
        registry.toggle_lock(LayerType::Routes);
        let config = registry.get(LayerType::Routes);
        assert!((config.effective_opacity() - 0.4).abs() < 1e-12);
        assert!(registry.visible_layers().iter().any(|c| c.layer_type == LayerType::Routes));
    }

    #[test]
    fn test_order_stable_under_toggles() {
        let mut registry = LayerRegistry::new();
        let ops: [(LayerType, f64); 5] = [
            (LayerType::Ui, 0.2),
            (LayerType::Background, 0.9),
            (LayerType::Npcs, 0.0),
            (LayerType::Zones, 0.5),
            (LayerType::Activity, 1.0),
        ];
        for (t, opacity) in ops {
            registry.toggle_layer(t);
            registry.change_opacity(t, opacity);
            assert!(is_sorted(&registry.ordered_layers()));
            assert!(is_sorted(&registry.visible_layers()));
        }
    }

    #[test]
    fn test_set_z_index_reorders() {
        let mut registry = LayerRegistry::new();
        registry.set_z_index(LayerType::Background, 100);
        let ordered = registry.ordered_layers();
        assert!(is_sorted(&ordered));
        assert_eq!(ordered.last().unwrap().layer_type, LayerType::Background);
    }

    #[test]
    fn test_activate_layer() {
        let mut registry = LayerRegistry::new();
        registry.toggle_layer(LayerType::Routes);
        let before: Vec<_> = registry.ordered_layers().iter().map(|c| c.layer_type).collect();

        registry.activate_layer(LayerType::Routes);

        assert!(registry.is_layer_visible(LayerType::Routes));
        assert_eq!(registry.active_layer(), Some(LayerType::Routes));
        let after: Vec<_> = registry.ordered_layers().iter().map(|c| c.layer_type).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_presets() {
        let mut registry = LayerRegistry::new();
        registry.activate_preset(LayerPreset::BuildingsOnly);
        assert!(registry.is_layer_visible(LayerType::Buildings));
        assert!(!registry.is_layer_visible(LayerType::Zones));
        assert!(!registry.is_layer_visible(LayerType::Npcs));

        registry.activate_preset(LayerPreset::MapOnly);
        assert!(registry.is_layer_visible(LayerType::Zones));
        assert!(!registry.is_layer_visible(LayerType::Buildings));

        registry.activate_preset(LayerPreset::All);
        assert!(LayerType::ALL.iter().all(|&t| registry.is_layer_visible(t)));
    }

    #[test]
    fn test_preset_is_a_single_revision() {
        let mut registry = LayerRegistry::new();
        let before = registry.revision();
        registry.activate_preset(LayerPreset::MapOnly);
        assert_eq!(registry.revision(), before + 1);
    }

    #[test]
    fn test_unknown_preset() {
        let mut registry = LayerRegistry::new();
        let err = registry.activate_preset_named("roads-only").unwrap_err();
        assert_eq!(err, LayerError::UnknownPreset("roads-only".to_string()));
        assert!(LayerType::ALL.iter().all(|&t| registry.is_layer_visible(t)));
        assert!(registry.activate_preset_named("buildings-only").is_ok());
    }

    #[test]
    fn test_layer_type_parse() {
        assert_eq!("npcs".parse::<LayerType>(), Ok(LayerType::Npcs));
        assert!("terrain".parse::<LayerType>().is_err());
    }

    #[test]
    fn test_layer_color_roundtrip() {
        let color = LayerColor::new(10, 20, 30, 40);
        let back: LayerColor = Color::from(color).into();
        assert_eq!(back, color);
    }
}
