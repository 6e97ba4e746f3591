#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Tower lookup for coverage checks.
//!
//! The tower database only answers bounding-box queries up to a fixed
//! area, so a search is a fan-out of one query per grid tile:
//!
//! 1. [`TowerSource`] fetches the towers inside one tile. The production
//!    implementation is [`opencellid::OpenCellIdClient`], which retries
//!    transient transport failures via [`retry`].
//! 2. [`fetcher::fetch_grid`] runs the per-tile queries with bounded
//!    concurrency and a whole-request deadline, tolerating failed tiles.
//! 3. [`dedup::dedup_towers`] collapses towers reported by more than one
//!    tile.

pub mod dedup;
pub mod fetcher;
pub mod opencellid;
pub mod progress;
pub mod retry;

pub use dedup::dedup_towers;
pub use fetcher::{FetchOptions, GridFetch, TileFailure, fetch_grid};

use async_trait::async_trait;
use cell_coverage_models::{BoundingBox, TowerRecord};

/// Errors from tower lookups.
#[derive(Debug, thiserror::Error)]
pub enum TowerError {
    /// Every attempt for the tile timed out.
    #[error("Tile fetch timed out after {attempts} attempt(s)")]
    Timeout {
        /// Attempts made before giving up.
        attempts: u32,
    },

    /// The upstream answered with a non-success status. Never retried.
    #[error("Upstream rejected the request with HTTP {status}: {body_snippet}")]
    UpstreamRejected {
        /// HTTP status code.
        status: u16,
        /// Leading part of the response body.
        body_snippet: String,
    },

    /// The upstream answered 200 with an error document.
    #[error("Upstream returned an error: {message}")]
    Api {
        /// Error message from the response body.
        message: String,
    },

    /// Connection-level failure after all attempts.
    #[error("Transport error after {attempts} attempt(s): {source}")]
    Transport {
        /// Attempts made before giving up.
        attempts: u32,
        /// The last underlying error (URL stripped).
        source: reqwest::Error,
    },

    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    /// The response body could not be parsed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// No API credential configured for the tower lookup service.
    #[error("Tower lookup API key is not configured")]
    MissingApiKey,
}

impl TowerError {
    /// Whether this is the per-tile timeout failure.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// HTTP status for upstream rejections.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::UpstreamRejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A source of tower records for a single bounding box.
///
/// Implementations handle their own timeouts and retries; a returned error
/// is final for that tile.
#[async_trait]
pub trait TowerSource: Send + Sync {
    /// Short identifier used in logs (e.g. `"opencellid"`).
    fn name(&self) -> &str;

    /// Fetches all towers inside `bbox`.
    ///
    /// # Errors
    ///
    /// Returns [`TowerError`] if the tile could not be fetched after the
    /// implementation's retry policy is exhausted.
    async fn fetch_tile(&self, bbox: &BoundingBox) -> Result<Vec<TowerRecord>, TowerError>;
}
