//! Engine configuration.
//!
//! Every field has a default reproducing the stock two-model catalog, so a
//! partial JSON file only needs to name what it changes.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use vista_core::CatalogEntry;

use crate::host::{Feature, SessionInit, SessionMode};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub mode: SessionMode,
    pub required_features: Vec<Feature>,
    pub optional_features: Vec<Feature>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: SessionMode::ImmersiveAr,
            required_features: vec![Feature::HitTest, Feature::DepthSensing],
            optional_features: vec![Feature::LightEstimation, Feature::Anchors],
        }
    }
}

impl SessionConfig {
    pub fn init(&self) -> SessionInit {
        SessionInit {
            required_features: self.required_features.clone(),
            optional_features: self.optional_features.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_y_degrees: 60.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReticleConfig {
    pub inner_radius: f32,
    pub outer_radius: f32,
    pub segments: u32,
    pub color: [f32; 3],
    pub opacity: f32,
}

impl Default for ReticleConfig {
    fn default() -> Self {
        Self {
            inner_radius: 0.15,
            outer_radius: 0.2,
            segments: 32,
            color: [0.0, 1.0, 0.0],
            opacity: 0.5,
        }
    }
}

/// Hit-test source retry policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Give up after this many failed attempts per session. `None` retries
    /// every frame for the lifetime of the session.
    pub max_init_attempts: Option<u32>,

    /// Log every Nth consecutive failure at warn level; the rest at debug.
    pub log_every_n_failures: u32,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            max_init_attempts: None,
            log_every_n_failures: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub catalog: Vec<CatalogEntry>,
    pub session: SessionConfig,
    pub camera: CameraConfig,
    pub reticle: ReticleConfig,
    pub tracking: TrackingConfig,
    /// Ticks slower than this are logged
    pub frame_budget_ms: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            catalog: vec![
                CatalogEntry::new("coffee_pot_on_table", "models/coffee_pot_on_table.obj"),
                CatalogEntry::new("sofa", "models/sofa.obj"),
            ],
            session: SessionConfig::default(),
            camera: CameraConfig::default(),
            reticle: ReticleConfig::default(),
            tracking: TrackingConfig::default(),
            frame_budget_ms: 11.0,
        }
    }
}

impl EngineConfig {
    /// Load and validate a JSON config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json_str(&content)?;
        log::info!("Loaded engine config from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.catalog.is_empty() {
            return Err(ConfigError::Invalid("catalog must name at least one model".into()));
        }

        let mut seen = HashSet::new();
        for entry in &self.catalog {
            if !seen.insert(entry.id.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate catalog id '{}'", entry.id)));
            }
        }

        let r = &self.reticle;
        if !(r.inner_radius >= 0.0 && r.inner_radius < r.outer_radius) {
            return Err(ConfigError::Invalid(format!(
                "reticle radii must satisfy 0 <= inner < outer (got {} / {})",
                r.inner_radius, r.outer_radius
            )));
        }

        let c = &self.camera;
        if !(c.fov_y_degrees > 0.0 && c.fov_y_degrees < 180.0) || !(c.near > 0.0 && c.near < c.far) {
            return Err(ConfigError::Invalid("camera needs 0 < fov < 180 and 0 < near < far".into()));
        }

        Ok(())
    }
}
