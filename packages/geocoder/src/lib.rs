#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Postal code geocoding for coverage checks.
//!
//! Resolves a postal code to the coordinate a tower search is centered on,
//! using a multi-provider strategy configured via TOML files in `services/`:
//!
//! 1. **Zippopotam.us** (priority 1): free, no API key, one place per
//!    postal code.
//! 2. **Nominatim / OpenStreetMap** (priority 2): free, 1 req/sec rate
//!    limit, requires an identifying `User-Agent`.
//!
//! Providers are loaded from the [`service_registry`] and tried in priority
//! order by [`resolver::ServiceChainResolver`]. The first match wins.

pub mod nominatim;
pub mod resolver;
pub mod service_registry;
pub mod zippopotam;

use async_trait::async_trait;
use cell_coverage_models::Coordinate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use resolver::ServiceChainResolver;

/// A resolved postal code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZipLocation {
    /// Search center for the postal code.
    pub coordinate: Coordinate,
    /// Place name reported by the provider, if any.
    pub place_name: Option<String>,
    /// Which provider resolved the postal code.
    pub provider: GeocodingProvider,
}

/// Which geocoding provider resolved a postal code.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GeocodingProvider {
    /// Zippopotam.us postal code API.
    Zippopotam,
    /// Nominatim / `OpenStreetMap`.
    Nominatim,
}

/// Errors from a single geocoding provider.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with an unexpected status.
    #[error("Unexpected HTTP status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimited,
}

/// Why a postal code could not be resolved.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// A provider answered and none had a match.
    #[error("No location found for postal code {zip}")]
    NotFound {
        /// The postal code.
        zip: String,
    },

    /// No provider could be reached.
    #[error("Geocoding unavailable for postal code {zip}: {message}")]
    Unavailable {
        /// The postal code.
        zip: String,
        /// Per-provider failure summary.
        message: String,
    },
}

/// Resolves a postal code to a coordinate.
#[async_trait]
pub trait ZipResolver: Send + Sync {
    /// Resolves `zip`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::NotFound`] for unknown postal codes and
    /// [`ResolveError::Unavailable`] when the lookup could not be performed.
    async fn resolve(&self, zip: &str) -> Result<ZipLocation, ResolveError>;
}

/// Parses a coordinate that providers send as strings (or numbers).
pub(crate) fn parse_coordinate(
    lat: &serde_json::Value,
    lon: &serde_json::Value,
    provider: &str,
) -> Result<Coordinate, GeocodeError> {
    let number = |v: &serde_json::Value| match v {
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        serde_json::Value::Number(n) => n.as_f64(),
        _ => None,
    };

    let latitude = number(lat).ok_or_else(|| GeocodeError::Parse {
        message: format!("Missing lat in {provider} response"),
    })?;
    let longitude = number(lon).ok_or_else(|| GeocodeError::Parse {
        message: format!("Missing lon in {provider} response"),
    })?;

    Coordinate::new(latitude, longitude).map_err(|e| GeocodeError::Parse {
        message: format!("{provider} returned {e}"),
    })
}
