#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Cell coverage determination engine.
//!
//! Answers "is there usable cellular coverage at this postal code for the
//! device profile?" in one pass:
//!
//! 1. Resolve the postal code to a search center.
//! 2. Plan a grid of tiles small enough for the tower database's area cap.
//! 3. Fetch towers for every tile concurrently, tolerating failed tiles.
//! 4. Drop towers seen by more than one tile.
//! 5. Classify the towers against the network whitelist.
//! 6. On a negative verdict, list the providers filed for the area.
//!
//! The entry point is [`engine::CoverageEngine::check_coverage`].

pub mod classifier;
pub mod config;
pub mod engine;

pub use classifier::{ClassifierConfig, classify};
pub use config::{ConfigError, CoverageConfig};
pub use engine::{CoverageEngine, EngineError, EngineSettings};

use cell_coverage_geocoder::ResolveError;
use cell_coverage_spatial::GridError;
use thiserror::Error;

/// Why a coverage check produced no verdict.
///
/// Tile fetch failures and an unreachable fallback source are not errors;
/// they are reported in the result's diagnostics.
#[derive(Debug, Error)]
pub enum CoverageError {
    /// No geocoding service knows the postal code.
    #[error("Could not resolve location: no match for postal code {zip}")]
    GeocodeNotFound {
        /// The postal code.
        zip: String,
    },

    /// Geocoding could not be performed.
    #[error("Could not resolve location for {zip}: {message}")]
    GeocodeUnavailable {
        /// The postal code.
        zip: String,
        /// Failure summary.
        message: String,
    },

    /// No tile grid can be planned around the resolved location.
    #[error("Could not plan tower search: {0}")]
    DegenerateGrid(#[from] GridError),
}

impl CoverageError {
    /// Whether the postal code could not be turned into a location.
    #[must_use]
    pub const fn is_location_failure(&self) -> bool {
        matches!(
            self,
            Self::GeocodeNotFound { .. } | Self::GeocodeUnavailable { .. }
        )
    }
}

impl From<ResolveError> for CoverageError {
    fn from(value: ResolveError) -> Self {
        match value {
            ResolveError::NotFound { zip } => Self::GeocodeNotFound { zip },
            ResolveError::Unavailable { zip, message } => Self::GeocodeUnavailable { zip, message },
        }
    }
}
