//! Tile grid planner.
//!
//! Splits a square search area around a center point into an odd-sized
//! N×N grid of bounding boxes, each at most `tile_side_km` on a side so no
//! single query exceeds the upstream area cap.
//!
//! Latitude edges are shared between rows and longitude edges between the
//! tiles of a row, so adjacent tiles meet exactly with no seams. The
//! longitude span of a row is computed at that row's own center latitude
//! rather than the grid center, which keeps tiles near the northern and
//! southern edges of the grid at their nominal size.

use cell_coverage_models::{BoundingBox, Coordinate};

use crate::{KM_PER_DEG_LAT, km_per_deg_lon};

/// Largest grid side the planner will produce.
pub const MAX_GRID_SIZE: usize = 41;

/// Tolerance applied before rounding the grid size up, so an exact fit
/// (e.g. 10 km / 2 km) is not bumped to the next odd size by float noise.
const SIZE_EPSILON: f64 = 1e-9;

/// Errors from grid planning.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    /// The longitude scale collapses at this latitude (near a pole).
    #[error("Degenerate grid: longitude scale collapses at latitude {latitude}")]
    Degenerate {
        /// Latitude of the offending row.
        latitude: f64,
    },

    /// Radius or tile side is not a positive finite number.
    #[error("Invalid grid parameters: {message}")]
    InvalidParameters {
        /// Description of the problem.
        message: String,
    },

    /// The requested radius needs more tiles than allowed.
    #[error("Grid of {size}x{size} tiles exceeds the maximum of {max}x{max}")]
    TooManyTiles {
        /// Required grid side.
        size: usize,
        /// Maximum grid side.
        max: usize,
    },

    /// A tile edge would leave the valid latitude/longitude range.
    #[error("Grid leaves the valid coordinate range: {message}")]
    OutOfRange {
        /// Description of the problem.
        message: String,
    },
}

/// One tile of a planned grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tile {
    /// Row index, 0 is the southernmost row.
    pub row: usize,
    /// Column index, 0 is the westernmost column.
    pub col: usize,
    /// The tile's bounds.
    pub bbox: BoundingBox,
}

/// A planned search grid.
#[derive(Debug, Clone, PartialEq)]
pub struct TileGrid {
    /// Search center.
    pub center: Coordinate,
    /// Tiles per row (and rows per grid). Always odd.
    pub size: usize,
    /// Nominal tile side in kilometers.
    pub tile_side_km: f64,
    /// Tiles in row-major order starting at the southwest corner.
    pub tiles: Vec<Tile>,
}

impl TileGrid {
    /// The tile bounding boxes in query order.
    #[must_use]
    pub fn bounding_boxes(&self) -> Vec<BoundingBox> {
        self.tiles.iter().map(|t| t.bbox).collect()
    }

    /// Half the width of the grid in kilometers (the radius it is
    /// guaranteed to cover).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn half_extent_km(&self) -> f64 {
        self.size as f64 * self.tile_side_km / 2.0
    }
}

/// Side length of the largest square tile whose area does not exceed
/// `max_area_km2`.
#[must_use]
pub fn tile_side_for_area(max_area_km2: f64) -> f64 {
    max_area_km2.sqrt()
}

/// Smallest odd `n` such that `n * tile_side_km >= 2 * radius_km`.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn grid_size(radius_km: f64, tile_side_km: f64) -> Result<usize, GridError> {
    let ratio = 2.0 * radius_km / tile_side_km;
    if !ratio.is_finite() {
        return Err(GridError::InvalidParameters {
            message: format!("radius {radius_km} km / tile side {tile_side_km} km is not finite"),
        });
    }

    let needed = (ratio - SIZE_EPSILON).ceil().max(1.0);
    if needed > MAX_GRID_SIZE as f64 {
        return Err(GridError::TooManyTiles {
            size: needed.min(usize::MAX as f64) as usize,
            max: MAX_GRID_SIZE,
        });
    }

    let mut size = needed as usize;
    if size % 2 == 0 {
        size += 1;
    }
    if size > MAX_GRID_SIZE {
        return Err(GridError::TooManyTiles {
            size,
            max: MAX_GRID_SIZE,
        });
    }
    Ok(size)
}

/// Plans the tile grid covering `radius_km` around `center`.
///
/// # Errors
///
/// * [`GridError::InvalidParameters`] if the radius or tile side is not
///   positive and finite, or the center is not a valid coordinate.
/// * [`GridError::Degenerate`] if any row sits where the longitude scale
///   collapses (near a pole).
/// * [`GridError::TooManyTiles`] if more than [`MAX_GRID_SIZE`] tiles per
///   side would be needed.
/// * [`GridError::OutOfRange`] if the grid would cross a pole or the
///   antimeridian.
#[allow(clippy::cast_precision_loss)]
pub fn plan_grid(
    center: Coordinate,
    radius_km: f64,
    tile_side_km: f64,
) -> Result<TileGrid, GridError> {
    if !(radius_km.is_finite() && radius_km > 0.0) {
        return Err(GridError::InvalidParameters {
            message: format!("radius must be positive, got {radius_km} km"),
        });
    }
    if !(tile_side_km.is_finite() && tile_side_km > 0.0) {
        return Err(GridError::InvalidParameters {
            message: format!("tile side must be positive, got {tile_side_km} km"),
        });
    }
    if !center.is_valid() {
        return Err(GridError::InvalidParameters {
            message: format!("center {center:?} is not a valid coordinate"),
        });
    }

    let size = grid_size(radius_km, tile_side_km)?;
    let half = size as f64 / 2.0;
    let lat_step = tile_side_km / KM_PER_DEG_LAT;

    let lat_edges: Vec<f64> = (0..=size)
        .map(|i| (i as f64 - half).mul_add(lat_step, center.latitude))
        .collect();

    if lat_edges[0] < -90.0 || lat_edges[size] > 90.0 {
        return Err(GridError::OutOfRange {
            message: format!(
                "latitude span {:.5}..{:.5} crosses a pole",
                lat_edges[0], lat_edges[size]
            ),
        });
    }

    let mut tiles = Vec::with_capacity(size * size);

    for row in 0..size {
        let (min_lat, max_lat) = (lat_edges[row], lat_edges[row + 1]);
        let row_latitude = f64::midpoint(min_lat, max_lat);
        let km_per_deg = km_per_deg_lon(row_latitude).ok_or(GridError::Degenerate {
            latitude: row_latitude,
        })?;
        let lon_step = tile_side_km / km_per_deg;

        let lon_edges: Vec<f64> = (0..=size)
            .map(|i| (i as f64 - half).mul_add(lon_step, center.longitude))
            .collect();

        if lon_edges[0] < -180.0 || lon_edges[size] > 180.0 {
            return Err(GridError::OutOfRange {
                message: format!(
                    "longitude span {:.5}..{:.5} crosses the antimeridian",
                    lon_edges[0], lon_edges[size]
                ),
            });
        }

        for col in 0..size {
            tiles.push(Tile {
                row,
                col,
                bbox: BoundingBox {
                    min_lat,
                    min_lon: lon_edges[col],
                    max_lat,
                    max_lon: lon_edges[col + 1],
                },
            });
        }
    }

    log::debug!(
        "Planned {size}x{size} grid ({} tiles of {tile_side_km:.3} km) around {center}",
        tiles.len()
    );

    Ok(TileGrid {
        center,
        size,
        tile_side_km,
        tiles,
    })
}
