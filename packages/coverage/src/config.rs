//! Engine configuration.
//!
//! Settings come from TOML: the embedded `config/default.toml`, or a user
//! file in which any omitted key keeps its default. Credentials and
//! deployment-specific locations are then taken from the environment:
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `OPENCELLID_API_KEY` | `towers.api_key` |
//! | `PROVIDER_API_BASE_URL` | `fallback.base_url` |
//! | `COVERAGE_WHITELIST_PATH` | `whitelist.path` |
//!
//! Empty variables are treated as unset.

use std::path::{Path, PathBuf};
use std::time::Duration;

use cell_coverage_providers::ProviderDirectoryConfig;
use cell_coverage_spatial::tile_side_for_area;
use cell_coverage_towers::FetchOptions;
use cell_coverage_towers::opencellid::{DEFAULT_BASE_URL, OpenCellIdConfig};
use cell_coverage_towers::retry::RetryPolicy;
use cell_coverage_whitelist::{PlmnWhitelist, WhitelistError, WhitelistOptions};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classifier::ClassifierConfig;

/// The embedded default configuration.
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../config/default.toml");

/// Tower lookup API key.
pub const API_KEY_ENV: &str = "OPENCELLID_API_KEY";
/// Provider directory base URL.
pub const PROVIDER_BASE_URL_ENV: &str = "PROVIDER_API_BASE_URL";
/// Whitelist dataset path.
pub const WHITELIST_PATH_ENV: &str = "COVERAGE_WHITELIST_PATH";

/// Errors from loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config {path}: {source}")]
    Io {
        /// Path that was being read.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The TOML is malformed or has wrongly typed values.
    #[error("Invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of its allowed range.
    #[error("Invalid config value: {message}")]
    Invalid {
        /// Which value and why.
        message: String,
    },
}

/// Search area settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Radius of the tower search.
    pub radius_km: f64,
    /// Largest area a single tower query may cover.
    pub max_tile_area_km2: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            radius_km: 5.0,
            max_tile_area_km2: 4.0,
        }
    }
}

impl GridConfig {
    /// Side of a square tile at the area cap.
    #[must_use]
    pub fn tile_side_km(&self) -> f64 {
        tile_side_for_area(self.max_tile_area_km2)
    }
}

/// Tower lookup settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TowerConfig {
    /// API key. Normally supplied through `OPENCELLID_API_KEY`.
    pub api_key: Option<String>,
    /// Lookup endpoint.
    pub base_url: String,
    /// Timeout for each attempt at one tile.
    pub per_tile_timeout_secs: u64,
    /// Attempts per tile, including the first.
    pub max_attempts: u32,
    /// Backoff unit between attempts.
    pub backoff_base_ms: u64,
    /// Tile queries in flight at once.
    pub concurrency: usize,
    /// Maximum towers requested per tile.
    pub limit: u32,
    /// Deadline for the whole fan-out.
    pub request_timeout_secs: u64,
}

impl Default for TowerConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            per_tile_timeout_secs: 20,
            max_attempts: 3,
            backoff_base_ms: 400,
            concurrency: 4,
            limit: 50,
            request_timeout_secs: 60,
        }
    }
}

impl TowerConfig {
    /// Client settings, or `None` when no API key is configured.
    #[must_use]
    pub fn client_config(&self) -> Option<OpenCellIdConfig> {
        let api_key = self.api_key.as_ref().filter(|k| !k.trim().is_empty())?;
        Some(OpenCellIdConfig {
            base_url: self.base_url.clone(),
            api_key: api_key.clone(),
            limit: self.limit,
            per_tile_timeout: Duration::from_secs(self.per_tile_timeout_secs),
            retry: RetryPolicy {
                max_attempts: self.max_attempts,
                base_delay: Duration::from_millis(self.backoff_base_ms),
            },
        })
    }

    /// Fan-out settings.
    #[must_use]
    pub const fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            concurrency: self.concurrency,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

/// Whitelist dataset settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WhitelistConfig {
    /// Dataset location.
    pub path: Option<PathBuf>,
    /// Group tags accepted by the device profile.
    pub accepted_groups: Vec<String>,
    /// Header name of the identifier column.
    pub identifier_column: Option<String>,
    /// Header name of the group column.
    pub group_column: Option<String>,
}

impl Default for WhitelistConfig {
    fn default() -> Self {
        let options = WhitelistOptions::default();
        Self {
            path: None,
            accepted_groups: options.accepted_groups,
            identifier_column: options.identifier_column,
            group_column: options.group_column,
        }
    }
}

impl WhitelistConfig {
    /// Loader options.
    #[must_use]
    pub fn options(&self) -> WhitelistOptions {
        WhitelistOptions {
            accepted_groups: self.accepted_groups.clone(),
            identifier_column: self.identifier_column.clone(),
            group_column: self.group_column.clone(),
        }
    }

    /// Loads the configured dataset, or an empty whitelist when no path is
    /// configured.
    ///
    /// # Errors
    ///
    /// Returns [`WhitelistError`] if the dataset cannot be read.
    pub fn load(&self) -> Result<PlmnWhitelist, WhitelistError> {
        let Some(path) = &self.path else {
            log::warn!("No whitelist path configured; every tower will be rejected");
            return Ok(PlmnWhitelist::empty());
        };
        PlmnWhitelist::from_path(path, &self.options())
    }
}

/// Geocoding settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    /// Timeout for each geocoding request.
    pub timeout_secs: u64,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

impl GeocoderConfig {
    /// Request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Fallback provider directory settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Whether to consult the directory on negative verdicts.
    pub enabled: bool,
    /// Directory base URL. Normally supplied through `PROVIDER_API_BASE_URL`.
    pub base_url: Option<String>,
    /// `source` query parameter.
    pub source: String,
    /// Optional `q` filter.
    pub query: Option<String>,
    /// Timeout for the lookup.
    pub timeout_secs: u64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: None,
            source: "unique".to_string(),
            query: None,
            timeout_secs: 15,
        }
    }
}

impl FallbackConfig {
    /// Directory client settings, or `None` when disabled or no base URL
    /// is configured.
    #[must_use]
    pub fn directory_config(&self) -> Option<ProviderDirectoryConfig> {
        if !self.enabled {
            return None;
        }
        let base_url = self.base_url.as_ref().filter(|u| !u.trim().is_empty())?;
        Some(ProviderDirectoryConfig {
            base_url: base_url.clone(),
            source: self.source.clone(),
            query: self.query.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        })
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageConfig {
    /// `[grid]`
    pub grid: GridConfig,
    /// `[towers]`
    pub towers: TowerConfig,
    /// `[classifier]`
    pub classifier: ClassifierConfig,
    /// `[whitelist]`
    pub whitelist: WhitelistConfig,
    /// `[geocoder]`
    pub geocoder: GeocoderConfig,
    /// `[fallback]`
    pub fallback: FallbackConfig,
}

impl CoverageConfig {
    /// Loads `path` (or the embedded defaults), applies environment
    /// overrides and validates the result.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, or a
    /// value is out of range.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                log::info!("Loading config from {}", path.display());
                let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
                    path: path.display().to_string(),
                    source: e,
                })?;
                Self::from_toml(&text)?
            }
            None => Self::from_toml(DEFAULT_CONFIG_TOML)?,
        };
        config.apply_env_from(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parses TOML; omitted keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::de::from_str(text)?)
    }

    /// Applies overrides from `lookup` (normally the process environment).
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = get(API_KEY_ENV) {
            self.towers.api_key = Some(key);
        }
        if let Some(url) = get(PROVIDER_BASE_URL_ENV) {
            self.fallback.base_url = Some(url);
        }
        if let Some(path) = get(WHITELIST_PATH_ENV) {
            self.whitelist.path = Some(PathBuf::from(path));
        }
    }

    /// Checks that every numeric setting is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = |name: &str, value: f64| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::Invalid {
                    message: format!("{name} must be a positive number, got {value}"),
                })
            }
        };
        let nonzero = |name: &str, value: u64| {
            if value > 0 {
                Ok(())
            } else {
                Err(ConfigError::Invalid {
                    message: format!("{name} must be at least 1"),
                })
            }
        };

        positive("grid.radius_km", self.grid.radius_km)?;
        positive("grid.max_tile_area_km2", self.grid.max_tile_area_km2)?;
        positive("classifier.max_distance_km", self.classifier.max_distance_km)?;
        nonzero("towers.max_attempts", u64::from(self.towers.max_attempts))?;
        nonzero("towers.concurrency", self.towers.concurrency as u64)?;
        nonzero("towers.limit", u64::from(self.towers.limit))?;
        nonzero("towers.per_tile_timeout_secs", self.towers.per_tile_timeout_secs)?;
        nonzero("towers.request_timeout_secs", self.towers.request_timeout_secs)?;
        nonzero("geocoder.timeout_secs", self.geocoder.timeout_secs)?;
        nonzero("fallback.timeout_secs", self.fallback.timeout_secs)?;

        if self.classifier.modern_radios.is_empty() {
            return Err(ConfigError::Invalid {
                message: "classifier.modern_radios must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
