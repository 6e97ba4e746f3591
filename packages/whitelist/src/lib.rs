#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Whitelist of network identifiers the device profile can attach to.
//!
//! The reference dataset is delimited text (CSV or TSV) with an identifier
//! column (`MCCMNC`) and a group column naming the device profile that
//! supports the network. [`PlmnWhitelist`] keeps only the rows tagged with
//! an accepted group, keyed by canonical [`Plmn`](cell_coverage_models::Plmn).
//!
//! The whitelist is immutable once built. [`SharedWhitelist`] holds the
//! current one behind an `Arc` and reloads by swapping in a new value.

pub mod delimiter;
pub mod shared;
pub mod whitelist;

pub use delimiter::{Delimiter, detect_delimiter};
pub use shared::SharedWhitelist;
pub use whitelist::{LoadStats, PlmnWhitelist, WhitelistOptions};

/// Errors from loading a whitelist.
#[derive(Debug, thiserror::Error)]
pub enum WhitelistError {
    /// The dataset file could not be read.
    #[error("Failed to read whitelist {path}: {source}")]
    Io {
        /// Path that was being read.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The dataset could not be tokenized.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Loading succeeded but no row matched an accepted group.
    #[error("Whitelist is empty ({rows_read} rows read, none in an accepted group)")]
    Empty {
        /// Rows read from the dataset.
        rows_read: u64,
    },
}
