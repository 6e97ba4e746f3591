#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared types for the cell coverage engine.
//!
//! Geographic primitives ([`Coordinate`], [`BoundingBox`]), raw tower
//! observations ([`TowerRecord`]), canonical network identifiers
//! ([`Plmn`]) and the verdict/result types produced by a coverage check.
//! Every other crate in the workspace speaks in terms of these types.

pub mod coverage;
pub mod plmn;

pub use coverage::{
    ClassifierStats, CoverageResult, CoverageVerdict, ProviderRecord, SearchDiagnostics,
    VerdictReason,
};
pub use plmn::{InvalidPlmnError, Plmn};

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// A WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinate {
    /// Latitude, -90 to 90.
    pub latitude: f64,
    /// Longitude, -180 to 180.
    pub longitude: f64,
}

impl Coordinate {
    /// Creates a coordinate, rejecting values outside the valid lat/lon
    /// ranges (and NaN).
    ///
    /// # Errors
    ///
    /// Returns [`InvalidCoordinateError`] if either component is out of
    /// range or not finite.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, InvalidCoordinateError> {
        let coordinate = Self {
            latitude,
            longitude,
        };
        if coordinate.is_valid() {
            Ok(coordinate)
        } else {
            Err(InvalidCoordinateError {
                latitude,
                longitude,
            })
        }
    }

    /// Whether both components are finite and within range.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.5}, {:.5}", self.latitude, self.longitude)
    }
}

/// Error returned when a latitude/longitude pair is out of range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvalidCoordinateError {
    /// The rejected latitude.
    pub latitude: f64,
    /// The rejected longitude.
    pub longitude: f64,
}

impl std::fmt::Display for InvalidCoordinateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid coordinate ({}, {}): latitude must be in [-90, 90] and longitude in [-180, 180]",
            self.latitude, self.longitude
        )
    }
}

impl std::error::Error for InvalidCoordinateError {}

/// An axis-aligned lat/lon search rectangle.
///
/// Tiles produced by the grid planner always satisfy `min <= max` on both
/// axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    /// Southern edge.
    pub min_lat: f64,
    /// Western edge.
    pub min_lon: f64,
    /// Northern edge.
    pub max_lat: f64,
    /// Eastern edge.
    pub max_lon: f64,
}

impl BoundingBox {
    /// Returns `true` if the coordinate lies inside or on the edge of the
    /// box.
    #[must_use]
    pub fn contains(&self, point: &Coordinate) -> bool {
        (self.min_lat..=self.max_lat).contains(&point.latitude)
            && (self.min_lon..=self.max_lon).contains(&point.longitude)
    }

    /// Geometric center of the box.
    #[must_use]
    pub fn center(&self) -> Coordinate {
        Coordinate {
            latitude: f64::midpoint(self.min_lat, self.max_lat),
            longitude: f64::midpoint(self.min_lon, self.max_lon),
        }
    }

    /// Formats the box as `latMin,lonMin,latMax,lonMax`, the ordering the
    /// tower lookup API expects for its `BBOX` parameter.
    #[must_use]
    pub fn to_query_param(&self) -> String {
        format!(
            "{},{},{},{}",
            self.min_lat, self.min_lon, self.max_lat, self.max_lon
        )
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{:.5}, {:.5}] -> [{:.5}, {:.5}]",
            self.min_lat, self.min_lon, self.max_lat, self.max_lon
        )
    }
}

/// Radio access technology reported for a tower.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum RadioType {
    /// 2G.
    #[serde(rename = "GSM")]
    #[strum(serialize = "GSM")]
    Gsm,
    /// 3G.
    #[serde(rename = "UMTS")]
    #[strum(serialize = "UMTS")]
    Umts,
    /// 4G.
    #[serde(rename = "LTE")]
    #[strum(serialize = "LTE")]
    Lte,
    /// LTE Cat-M1.
    #[serde(rename = "LTE-M")]
    #[strum(to_string = "LTE-M", serialize = "LTEM", serialize = "CAT-M1", serialize = "CATM1")]
    LteM,
    /// 5G New Radio.
    #[serde(rename = "NR")]
    #[strum(serialize = "NR", serialize = "5G")]
    Nr,
    /// Anything the upstream reports that is not one of the above.
    #[serde(rename = "UNKNOWN")]
    #[strum(serialize = "UNKNOWN")]
    Unknown,
}

impl RadioType {
    /// Parses an upstream radio label, mapping anything unrecognized to
    /// [`RadioType::Unknown`].
    #[must_use]
    pub fn from_api(raw: &str) -> Self {
        raw.trim().parse().unwrap_or(Self::Unknown)
    }
}

/// Dedup identity of a tower: `(mcc, mnc, lac-or-tac, cell id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TowerKey {
    /// Mobile country code.
    pub mcc: u16,
    /// Mobile network code.
    pub mnc: u16,
    /// Location area code or tracking area code.
    pub area_code: u32,
    /// Cell identifier.
    pub cell_id: u64,
}

/// A single crowd-sourced tower observation returned by the tower lookup
/// service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TowerRecord {
    /// Mobile country code.
    pub mcc: u16,
    /// Mobile network code.
    pub mnc: u16,
    /// LAC for 2G/3G cells, TAC for LTE/NR cells.
    pub area_code: u32,
    /// Cell identifier.
    pub cell_id: u64,
    /// Radio technology.
    pub radio: RadioType,
    /// Estimated tower latitude.
    pub latitude: f64,
    /// Estimated tower longitude.
    pub longitude: f64,
    /// Number of measurements behind the position estimate.
    pub sample_count: u32,
    /// When the tower was last observed, if reported.
    pub last_seen: Option<chrono::DateTime<chrono::Utc>>,
}

impl TowerRecord {
    /// Identity used for deduplication across overlapping tiles.
    #[must_use]
    pub const fn key(&self) -> TowerKey {
        TowerKey {
            mcc: self.mcc,
            mnc: self.mnc,
            area_code: self.area_code,
            cell_id: self.cell_id,
        }
    }

    /// The tower's estimated position.
    #[must_use]
    pub const fn coordinate(&self) -> Coordinate {
        Coordinate {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }

    /// Canonical network identifier, or `None` if the codes are out of
    /// range.
    #[must_use]
    pub fn plmn(&self) -> Option<Plmn> {
        Plmn::from_parts(self.mcc, self.mnc)
    }
}
