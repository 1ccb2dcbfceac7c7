//! Configuration management for ubicuidado.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::fix::Coordinates;
use crate::location::FixOptions;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "ubicuidado";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "ubicuidado.db";

/// Key the check-in collection is stored under.
pub const DEFAULT_CHECKIN_KEY: &str = "ubicuidado_user_locations";

/// Highest zoom level a map surface accepts.
const MAX_ZOOM: u8 = 21;

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `UBICUIDADO_`)
/// 2. TOML config file at `~/.config/ubicuidado/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Position acquisition configuration.
    pub tracking: TrackingConfig,
    /// Map view configuration.
    pub map: MapConfig,
    /// Direction marker configuration.
    pub marker: MarkerConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/ubicuidado/ubicuidado.db`
    pub database_path: Option<PathBuf>,
    /// Key the check-in collection is persisted under.
    pub checkin_key: String,
}

/// Position acquisition configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Ask the provider for its most accurate source.
    pub high_accuracy: bool,
    /// Maximum age of a cached fix in milliseconds.
    pub max_fix_age_ms: u64,
    /// Maximum wait for a fix in milliseconds.
    pub timeout_ms: u64,
    /// GPX track to replay when no live source is available.
    pub replay_path: Option<PathBuf>,
    /// Interval between replayed fixes in milliseconds.
    pub replay_interval_ms: u64,
}

/// Map view configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Latitude shown when the position cannot be determined.
    pub fallback_latitude: f64,
    /// Longitude shown when the position cannot be determined.
    pub fallback_longitude: f64,
    /// Zoom level used for the fallback view.
    pub fallback_zoom: u8,
    /// Zoom level used while following the user.
    pub tracking_zoom: u8,
    /// Accuracy circle radius when the provider reports none.
    pub default_accuracy_radius_m: f64,
}

/// Direction marker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    /// Scale of the marker when first placed.
    pub initial_scale: f64,
    /// Scale of the marker while tracking.
    pub tracking_scale: f64,
    /// Fill color as `#RRGGBB`.
    pub fill_color: String,
    /// Stroke color as `#RRGGBB`.
    pub stroke_color: String,
    /// Stroke width in pixels.
    pub stroke_weight: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None, // Resolved at runtime
            checkin_key: DEFAULT_CHECKIN_KEY.to_string(),
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            max_fix_age_ms: 10_000,
            timeout_ms: 5_000,
            replay_path: None,
            replay_interval_ms: 1_000,
        }
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        // Mexico City
        Self {
            fallback_latitude: 19.4326,
            fallback_longitude: -99.1332,
            fallback_zoom: 10,
            tracking_zoom: 17,
            default_accuracy_radius_m: 50.0,
        }
    }
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            initial_scale: 8.0,
            tracking_scale: 7.0,
            fill_color: "#FF0000".to_string(),
            stroke_color: "#FFFFFF".to_string(),
            stroke_weight: 2,
        }
    }
}

impl TrackingConfig {
    /// Acquisition options for the provider.
    #[must_use]
    pub fn fix_options(&self) -> FixOptions {
        FixOptions {
            high_accuracy: self.high_accuracy,
            max_fix_age_ms: self.max_fix_age_ms,
            timeout_ms: self.timeout_ms,
        }
    }

    /// The replay interval as a Duration.
    #[must_use]
    pub fn replay_interval(&self) -> Duration {
        Duration::from_millis(self.replay_interval_ms)
    }
}

impl MapConfig {
    /// The fallback reference point.
    #[must_use]
    pub fn fallback(&self) -> Coordinates {
        Coordinates::new(self.fallback_latitude, self.fallback_longitude)
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("UBICUIDADO_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.tracking.timeout_ms == 0 {
            return Err(invalid("timeout_ms must be greater than 0"));
        }

        if !self.map.fallback().is_valid() {
            return Err(invalid(format!(
                "fallback coordinate ({}) is out of range",
                self.map.fallback()
            )));
        }

        for (name, zoom) in [
            ("fallback_zoom", self.map.fallback_zoom),
            ("tracking_zoom", self.map.tracking_zoom),
        ] {
            if zoom > MAX_ZOOM {
                return Err(invalid(format!(
                    "{name} ({zoom}) cannot be greater than {MAX_ZOOM}"
                )));
            }
        }

        if self.map.default_accuracy_radius_m <= 0.0 {
            return Err(invalid("default_accuracy_radius_m must be greater than 0"));
        }

        if self.marker.initial_scale <= 0.0 || self.marker.tracking_scale <= 0.0 {
            return Err(invalid("marker scales must be greater than 0"));
        }

        let color = Regex::new(r"^#[0-9A-Fa-f]{6}$").map_err(|e| invalid(e.to_string()))?;
        for (name, value) in [
            ("fill_color", &self.marker.fill_color),
            ("stroke_color", &self.marker.stroke_color),
        ] {
            if !color.is_match(value) {
                return Err(invalid(format!("{name} must be #RRGGBB, got {value}")));
            }
        }

        if self.storage.checkin_key.trim().is_empty() {
            return Err(invalid("checkin_key cannot be empty"));
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::ConfigValidation {
        message: message.into(),
    }
}
