#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal plumbing shared by the cell coverage binaries.
//!
//! [`init_logger`] routes `log` output through the same [`MultiProgress`]
//! that draws the tile fan-out, and [`TileProgressBar`] renders the
//! fan-out's [`ProgressCallback`] events.

use std::sync::Arc;
use std::time::Duration;

use cell_coverage_towers::progress::ProgressCallback;
use indicatif::{ProgressBar, ProgressStyle};

pub use indicatif::MultiProgress;

const SPINNER_TEMPLATE: &str = "{spinner:.cyan} {msg}";
const TILES_TEMPLATE: &str = "  {msg} {wide_bar:.cyan/dim} {pos}/{len} tiles [{elapsed_precise}]";

/// Spinner while the postal code is geocoded, then a tile counter.
pub struct TileProgressBar {
    bar: ProgressBar,
    tiles_style: ProgressStyle,
}

impl TileProgressBar {
    /// Adds a bar to `multi` showing `message` until the grid is planned.
    #[must_use]
    pub fn start(multi: &MultiProgress, message: &str) -> Arc<dyn ProgressCallback> {
        let spinner_style = ProgressStyle::with_template(SPINNER_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        let tiles_style = ProgressStyle::with_template(TILES_TEMPLATE)
            .map_or_else(|_| ProgressStyle::default_bar(), |s| s.progress_chars("=> "));

        let bar = multi.add(ProgressBar::new_spinner().with_style(spinner_style));
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(120));

        Arc::new(Self { bar, tiles_style })
    }
}

impl ProgressCallback for TileProgressBar {
    fn set_total(&self, total: u64) {
        self.bar.set_style(self.tiles_style.clone());
        self.bar.set_length(total);
        self.bar.reset();
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn set_message(&self, msg: String) {
        self.bar.set_message(msg);
    }

    fn finish(&self, msg: String) {
        self.bar.finish_with_message(msg);
    }
}

/// Installs `pretty_env_logger` (filtered by `RUST_LOG`) behind
/// `indicatif-log-bridge`, so log lines print above the progress bars
/// instead of through them.
///
/// Every bar must be added to the returned [`MultiProgress`].
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();
    let logger = pretty_env_logger::formatted_builder()
        .parse_env("RUST_LOG")
        .build();
    let max_level = logger.filter();

    // Errors only when a logger is already set, e.g. under test harnesses.
    if indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .is_ok()
    {
        log::set_max_level(max_level);
    }

    multi
}
