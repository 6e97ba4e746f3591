#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Fallback provider lookup.
//!
//! When no supported tower is found, the coverage engine asks a directory of
//! regulatory-filed service providers which carriers serve the postal code.
//! The answer is informational only: a failed lookup never fails a coverage
//! check.

pub mod directory;

use async_trait::async_trait;
use cell_coverage_models::ProviderRecord;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use directory::{ProviderDirectoryClient, ProviderDirectoryConfig, parse_listing};

/// Errors from provider lookups.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The directory answered with a non-success status.
    #[error("Provider directory responded with HTTP {status}: {body_snippet}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Leading part of the response body.
        body_snippet: String,
    },

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// No directory base URL is configured.
    #[error("Provider directory base URL is not configured")]
    NotConfigured,
}

/// Providers and counties filed for one postal code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderListing {
    /// Filed providers, in directory order.
    pub providers: Vec<ProviderRecord>,
    /// Counties the postal code spans.
    pub counties: Vec<String>,
}

/// A directory of service providers by postal code.
#[async_trait]
pub trait ProviderLookup: Send + Sync {
    /// Lists the providers filed for `zip`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if the directory cannot be reached or its
    /// answer cannot be parsed.
    async fn providers_for_zip(&self, zip: &str) -> Result<ProviderListing, ProviderError>;
}
