//! Core configuration.
//!
//! One [`CoreConfig`] bundles generation, vision, pathing and tracing
//! settings. Files are RON or JSON, chosen by extension. Every section has
//! defaults, so a file only needs the fields it changes. A config is always
//! validated before it is handed out.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::constants::{MAX_SIGHT_RANGE, MIN_ROOM_SIDE};
use crate::generation::LevelParams;
use crate::logging::TracingConfig;
use crate::visibility::VisionConfig;
use crate::world::PathingConfig;

/// Error type for config loading and validation
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("RON write error: {0}")]
    RonWrite(#[from] ron::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub generation: LevelParams,
    pub vision: VisionConfig,
    pub pathing: PathingConfig,
    pub tracing: TracingConfig,
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(message.into())
}

fn check_chance(name: &str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be in [0, 1], got {value}")))
    }
}

impl CoreConfig {
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a `.ron` or `.json` file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("ron") => Self::from_ron_str(&text)?,
            Some("json") => Self::from_json_str(&text)?,
            other => {
                return Err(ConfigError::UnsupportedFormat(
                    other.unwrap_or("<none>").to_string(),
                ))
            }
        };
        info!(path = %path.display(), "config loaded");
        Ok(config)
    }

    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write to `path`, format by extension.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let text = match path.extension().and_then(|e| e.to_str()) {
            Some("ron") => self.to_ron_string()?,
            Some("json") => self.to_json_string()?,
            other => {
                return Err(ConfigError::UnsupportedFormat(
                    other.unwrap_or("<none>").to_string(),
                ))
            }
        };
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Reject values the generator or engines cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let g = &self.generation;
        if g.target_room_count == 0 {
            return Err(invalid("generation.target_room_count must be at least 1"));
        }
        if g.min_room_size < MIN_ROOM_SIDE {
            return Err(invalid(format!(
                "generation.min_room_size must be at least {MIN_ROOM_SIDE}, got {}",
                g.min_room_size
            )));
        }
        if g.max_room_size < g.min_room_size {
            return Err(invalid(format!(
                "generation.max_room_size ({}) is below min_room_size ({})",
                g.max_room_size, g.min_room_size
            )));
        }
        check_chance("generation.multiple_connection_chance", g.multiple_connection_chance)?;
        check_chance("generation.blood_chance", g.blood_chance)?;
        if g.monster_count > 0 && g.monster_pool.iter().all(|k| k.weight == 0) {
            return Err(invalid("generation.monster_pool needs a positive weight"));
        }

        if !(1..=MAX_SIGHT_RANGE).contains(&self.vision.range) {
            return Err(invalid(format!(
                "vision.range must be in 1..={MAX_SIGHT_RANGE}, got {}",
                self.vision.range
            )));
        }
        let min_light = self.vision.min_light;
        if min_light.is_nan() || min_light <= 0.0 || min_light > 1.0 {
            return Err(invalid("vision.min_light must be in (0, 1]"));
        }

        if self.pathing.max_expansions == 0 {
            return Err(invalid("pathing.max_expansions must be at least 1"));
        }
        let occupied = self.pathing.occupied_step_cost;
        if occupied.is_nan() || occupied < 1.0 {
            return Err(invalid("pathing.occupied_step_cost must be at least 1"));
        }
        Ok(())
    }
}
