//! Progress hooks for the tile fan-out.
//!
//! [`fetch_grid`](crate::fetcher::fetch_grid) reports one unit per finished
//! tile. The CLI draws these with `indicatif`; the engine defaults to
//! [`NullProgress`].

use std::sync::Arc;

/// Receives tile fan-out progress.
///
/// Shared through an `Arc` with the concurrently running tile fetches.
pub trait ProgressCallback: Send + Sync {
    /// Number of tiles about to be fetched.
    fn set_total(&self, total: u64);

    /// `delta` more tiles finished, successfully or not.
    fn inc(&self, delta: u64);

    /// Replaces the status text.
    fn set_message(&self, msg: String);

    /// The fan-out is over; `msg` summarizes it.
    fn finish(&self, msg: String);
}

/// Discards all progress.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// A [`NullProgress`] ready to hand to [`fetch_grid`](crate::fetcher::fetch_grid).
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
