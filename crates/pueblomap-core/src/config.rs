//! Editor tunables loaded from JSON.

use crate::selection::MARQUEE_MIN_SIZE;
use crate::viewport::{
    DEFAULT_FIT_PADDING, DEFAULT_WHEEL_DEBOUNCE_MS, DEFAULT_WHEEL_STEP, ViewportLimits,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

pub const DEFAULT_GATEWAY_URL: &str = "http://localhost:3000/api/";
pub const DEFAULT_GRID_SIZE: f64 = 10.0;
pub const DEFAULT_HIT_TOLERANCE_PX: f64 = 8.0;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid gateway URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Editor settings. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorConfig {
    pub viewport: ViewportLimits,
    /// Minimum time between accepted wheel zoom steps.
    pub wheel_debounce_ms: f64,
    /// Scale change per wheel notch.
    pub wheel_step: f64,
    /// Pixels kept free around content when fitting.
    pub fit_padding: f64,
    pub marquee_min_size: f64,
    pub grid_size: f64,
    pub snap_to_grid: bool,
    /// NPC hit radius, in screen pixels.
    pub hit_tolerance_px: f64,
    pub gateway_url: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            viewport: ViewportLimits::default(),
            wheel_debounce_ms: DEFAULT_WHEEL_DEBOUNCE_MS,
            wheel_step: DEFAULT_WHEEL_STEP,
            fit_padding: DEFAULT_FIT_PADDING,
            marquee_min_size: MARQUEE_MIN_SIZE,
            grid_size: DEFAULT_GRID_SIZE,
            snap_to_grid: false,
            hit_tolerance_px: DEFAULT_HIT_TOLERANCE_PX,
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
        }
    }
}

impl EditorConfig {
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> ConfigResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        std::fs::write(path, self.to_json()?).map_err(io_error)
    }

    /// `<config dir>/pueblomap/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("pueblomap").join("config.json"))
    }

    /// Load `path` if given, else the default location if it exists, else
    /// defaults.
    pub fn load_or_default(path: Option<&Path>) -> ConfigResult<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => {
                log::debug!("No config file, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Parsed gateway base URL.
    pub fn gateway_url(&self) -> ConfigResult<Url> {
        Url::parse(&self.gateway_url).map_err(|source| ConfigError::InvalidUrl {
            url: self.gateway_url.clone(),
            source,
        })
    }

    /// Grid size drags snap to, if snapping is on.
    pub fn drag_grid(&self) -> Option<f64> {
        self.snap_to_grid.then_some(self.grid_size)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let v = &self.viewport;
        let positive = |name: &str, value: f64| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::Invalid(format!("{name} must be positive, got {value}")))
            }
        };
        let non_negative = |name: &str, value: f64| {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(ConfigError::Invalid(format!("{name} must not be negative, got {value}")))
            }
        };

        positive("viewport.minScale", v.min_scale)?;
        positive("viewport.maxScale", v.max_scale)?;
        if v.min_scale > v.max_scale {
            return Err(ConfigError::Invalid(format!(
                "viewport.minScale {} exceeds maxScale {}",
                v.min_scale, v.max_scale
            )));
        }
        if !(v.min_scale..=v.max_scale).contains(&v.default_scale) {
            return Err(ConfigError::Invalid(format!(
                "viewport.defaultScale {} is outside [{}, {}]",
                v.default_scale, v.min_scale, v.max_scale
            )));
        }
        if !(v.zoom_step.is_finite() && v.zoom_step > 1.0) {
            return Err(ConfigError::Invalid(format!(
                "viewport.zoomStep must be greater than 1, got {}",
                v.zoom_step
            )));
        }
        non_negative("wheelDebounceMs", self.wheel_debounce_ms)?;
        positive("wheelStep", self.wheel_step)?;
        non_negative("fitPadding", self.fit_padding)?;
        non_negative("marqueeMinSize", self.marquee_min_size)?;
        positive("gridSize", self.grid_size)?;
        non_negative("hitTolerancePx", self.hit_tolerance_px)?;
        self.gateway_url()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EditorConfig::default();
        assert_eq!(config.viewport.min_scale, 0.1);
        assert_eq!(config.viewport.max_scale, 10.0);
        assert_eq!(config.wheel_debounce_ms, 50.0);
        assert_eq!(config.fit_padding, 50.0);
        assert_eq!(config.marquee_min_size, 5.0);
        assert_eq!(config.drag_grid(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let config = EditorConfig::from_json(
            r#"{ "viewport": { "maxScale": 4.0 }, "snapToGrid": true, "gridSize": 25 }"#,
        )
        .unwrap();
        assert_eq!(config.viewport.max_scale, 4.0);
        assert_eq!(config.viewport.min_scale, 0.1);
        assert_eq!(config.drag_grid(), Some(25.0));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            EditorConfig::from_json(r#"{ "viewport": { "minScale": 5.0, "maxScale": 2.0 } }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EditorConfig::from_json(r#"{ "gridSize": 0 }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EditorConfig::from_json(r#"{ "gatewayUrl": "::nope" }"#),
            Err(ConfigError::InvalidUrl { .. })
        ));
        assert!(matches!(
            EditorConfig::from_json("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = EditorConfig {
            fit_padding: 12.0,
            gateway_url: "https://maps.example.com/api/".to_string(),
            ..Default::default()
        };
        config.save(&path).unwrap();

        let loaded = EditorConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = EditorConfig::load_or_default(Some(&dir.path().join("absent.json")));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
