#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geometry for tower searches.
//!
//! The tower lookup service caps the area of a single bounding-box query,
//! so a search radius around a postal code is split into a square grid of
//! tiles ([`grid::plan_grid`]). Also provides the kilometer/degree
//! conversions the planner uses and great-circle distance for the
//! classifier's distance filter.

pub mod grid;

pub use grid::{GridError, Tile, TileGrid, plan_grid, tile_side_for_area};

use cell_coverage_models::Coordinate;
use geo::{Distance as _, Haversine, Point};

/// Kilometers per degree of latitude.
pub const KM_PER_DEG_LAT: f64 = 111.32;

/// Equatorial circumference of the Earth in kilometers.
pub const EARTH_CIRCUMFERENCE_KM: f64 = 40075.0;

/// Below this `cos(latitude)` the longitude scale is treated as
/// degenerate (within ~0.2 m of a pole).
pub const MIN_LONGITUDE_SCALE: f64 = 1e-6;

/// Kilometers per degree of longitude at `latitude`.
///
/// Returns `None` when the scale collapses near the poles, so callers never
/// divide by (almost) zero.
#[must_use]
pub fn km_per_deg_lon(latitude: f64) -> Option<f64> {
    let scale = latitude.to_radians().cos();
    if scale.is_finite() && scale >= MIN_LONGITUDE_SCALE {
        Some(EARTH_CIRCUMFERENCE_KM * scale / 360.0)
    } else {
        None
    }
}

/// Great-circle (haversine) distance between two coordinates in
/// kilometers.
#[must_use]
pub fn haversine_km(from: &Coordinate, to: &Coordinate) -> f64 {
    let from = Point::new(from.longitude, from.latitude);
    let to = Point::new(to.longitude, to.latitude);
    Haversine.distance(from, to) / 1000.0
}
