//! `OpenCelliD` tower lookup client.
//!
//! Queries the `cell/getInArea` endpoint with a `BBOX` of
//! `latMin,lonMin,latMax,lonMax`. The service rejects boxes larger than its
//! area quota, which is why callers split searches into tiles first.
//!
//! See <https://wiki.opencellid.org/wiki/API>

use std::time::Duration;

use async_trait::async_trait;
use cell_coverage_models::{BoundingBox, Coordinate, RadioType, TowerRecord};

use crate::retry::{self, RetryPolicy};
use crate::{TowerError, TowerSource};

/// Default `getInArea` endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.opencellid.org/cell/getInArea";

/// `User-Agent` sent with every lookup.
pub const USER_AGENT: &str = "cell-coverage/0.1 (tower-lookup)";

/// Settings for [`OpenCellIdClient`].
#[derive(Debug, Clone)]
pub struct OpenCellIdConfig {
    /// Endpoint URL.
    pub base_url: String,
    /// API key sent as the `key` query parameter.
    pub api_key: String,
    /// Maximum towers requested per tile.
    pub limit: u32,
    /// Timeout applied to each individual attempt.
    pub per_tile_timeout: Duration,
    /// Retry policy for transient failures.
    pub retry: RetryPolicy,
}

impl OpenCellIdConfig {
    /// Config with default endpoint and limits for `api_key`.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            limit: 50,
            per_tile_timeout: Duration::from_secs(20),
            retry: RetryPolicy::default(),
        }
    }
}

/// [`TowerSource`] backed by the `OpenCelliD` HTTP API.
pub struct OpenCellIdClient {
    client: reqwest::Client,
    config: OpenCellIdConfig,
}

impl OpenCellIdClient {
    /// Builds a client with its own connection pool.
    ///
    /// # Errors
    ///
    /// Returns [`TowerError::MissingApiKey`] if the key is blank, or
    /// [`TowerError::Client`] if the HTTP client cannot be built.
    pub fn new(config: OpenCellIdConfig) -> Result<Self, TowerError> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Self::with_client(client, config)
    }

    /// Builds a client around an existing [`reqwest::Client`].
    ///
    /// # Errors
    ///
    /// Returns [`TowerError::MissingApiKey`] if the key is blank.
    pub fn with_client(
        client: reqwest::Client,
        config: OpenCellIdConfig,
    ) -> Result<Self, TowerError> {
        if config.api_key.trim().is_empty() {
            return Err(TowerError::MissingApiKey);
        }
        log::debug!(
            "OpenCelliD client for {} (key {})",
            config.base_url,
            mask_key(&config.api_key)
        );
        Ok(Self { client, config })
    }
}

#[async_trait]
impl TowerSource for OpenCellIdClient {
    fn name(&self) -> &str {
        "opencellid"
    }

    async fn fetch_tile(&self, bbox: &BoundingBox) -> Result<Vec<TowerRecord>, TowerError> {
        let bbox_param = bbox.to_query_param();
        let limit = self.config.limit.to_string();
        let label = format!(
            "OpenCelliD BBOX={bbox_param} (key {})",
            mask_key(&self.config.api_key)
        );

        let body = retry::send_text(
            || {
                self.client
                    .get(&self.config.base_url)
                    .timeout(self.config.per_tile_timeout)
                    .query(&[
                        ("key", self.config.api_key.as_str()),
                        ("BBOX", bbox_param.as_str()),
                        ("limit", limit.as_str()),
                        ("format", "json"),
                    ])
            },
            &self.config.retry,
            &label,
        )
        .await?;

        let value: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| TowerError::Parse {
                message: format!(
                    "{label} returned non-JSON ({e}): {}",
                    retry::snippet(&body)
                ),
            })?;

        let towers = parse_response(&value)?;
        log::debug!("{label}: {} towers", towers.len());
        Ok(towers)
    }
}

/// Parses a lookup response.
///
/// Accepts either `{"cells": [...]}` or a bare array. Cells that lack an
/// identity or a valid position are skipped.
///
/// # Errors
///
/// Returns [`TowerError::Api`] when the body is an error document, or
/// [`TowerError::Parse`] when it has no recognizable cell list.
pub fn parse_response(body: &serde_json::Value) -> Result<Vec<TowerRecord>, TowerError> {
    let cells = match body {
        serde_json::Value::Array(cells) => cells,
        serde_json::Value::Object(map) => {
            if let Some(cells) = map.get("cells").and_then(serde_json::Value::as_array) {
                cells
            } else if let Some(error) = map.get("error") {
                return Err(TowerError::Api {
                    message: error
                        .as_str()
                        .map_or_else(|| error.to_string(), String::from),
                });
            } else {
                return Err(TowerError::Parse {
                    message: "tower response has no 'cells' array".to_string(),
                });
            }
        }
        _ => {
            return Err(TowerError::Parse {
                message: "tower response is neither an object nor an array".to_string(),
            });
        }
    };

    let mut towers = Vec::with_capacity(cells.len());
    let mut skipped = 0usize;
    for cell in cells {
        if let Some(tower) = parse_cell(cell) {
            towers.push(tower);
        } else {
            skipped += 1;
        }
    }
    if skipped > 0 {
        log::debug!("Skipped {skipped} malformed cells");
    }

    Ok(towers)
}

fn parse_cell(cell: &serde_json::Value) -> Option<TowerRecord> {
    let mcc = u16::try_from(uint_field(cell, &["mcc"])?).ok()?;
    let mnc = u16::try_from(uint_field(cell, &["mnc", "net"])?).ok()?;
    let area_code = u32::try_from(uint_field(cell, &["lac", "tac", "area"])?).ok()?;
    let cell_id = uint_field(cell, &["cellid", "cid", "cell"])?;

    let latitude = float_field(cell, &["lat"])?;
    let longitude = float_field(cell, &["lon", "lng"])?;
    Coordinate::new(latitude, longitude).ok()?;

    let radio = cell
        .get("radio")
        .and_then(serde_json::Value::as_str)
        .map_or(RadioType::Unknown, RadioType::from_api);

    let sample_count = uint_field(cell, &["samples"])
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(0);

    let last_seen = uint_field(cell, &["updated"])
        .and_then(|secs| i64::try_from(secs).ok())
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0));

    Some(TowerRecord {
        mcc,
        mnc,
        area_code,
        cell_id,
        radio,
        latitude,
        longitude,
        sample_count,
        last_seen,
    })
}

/// First of `names` present as an unsigned integer (or numeric string).
fn uint_field(cell: &serde_json::Value, names: &[&str]) -> Option<u64> {
    names.iter().find_map(|name| match cell.get(*name)? {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// First of `names` present as a number (or numeric string).
fn float_field(cell: &serde_json::Value, names: &[&str]) -> Option<f64> {
    names.iter().find_map(|name| match cell.get(*name)? {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Masks an API key for logs: `abc…xyz`, or `***` for short keys.
#[must_use]
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() > 7 {
        let head: String = chars[..3].iter().collect();
        let tail: String = chars[chars.len() - 3..].iter().collect();
        format!("{head}…{tail}")
    } else {
        "***".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cells_object() {
        let body = serde_json::json!({
            "cells": [{
                "lat": 42.3601,
                "lon": -71.0589,
                "mcc": 310,
                "mnc": 410,
                "lac": 11012,
                "cellid": 34_521_345,
                "averageSignalStrength": -85,
                "range": 1200,
                "samples": 27,
                "changeable": 1,
                "radio": "LTE",
                "updated": 1_700_000_000
            }],
            "count": 1
        });
        let towers = parse_response(&body).unwrap();
        assert_eq!(towers.len(), 1);
        let t = &towers[0];
        assert_eq!((t.mcc, t.mnc, t.area_code, t.cell_id), (310, 410, 11012, 34_521_345));
        assert_eq!(t.radio, RadioType::Lte);
        assert_eq!(t.sample_count, 27);
        assert_eq!(t.last_seen.unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn parses_bare_array_with_string_numbers() {
        let body = serde_json::json!([{
            "lat": "40.7128",
            "lon": "-74.0060",
            "mcc": "310",
            "mnc": "260",
            "tac": "5000",
            "cid": "77",
            "radio": "NR"
        }]);
        let towers = parse_response(&body).unwrap();
        assert_eq!(towers.len(), 1);
        assert_eq!(towers[0].area_code, 5000);
        assert_eq!(towers[0].cell_id, 77);
        assert_eq!(towers[0].radio, RadioType::Nr);
        assert_eq!(towers[0].sample_count, 0);
        assert!(towers[0].last_seen.is_none());
    }

    #[test]
    fn skips_malformed_cells() {
        let body = serde_json::json!({"cells": [
            {"lat": 1.0, "lon": 1.0, "mcc": 310},
            {"lat": 95.0, "lon": 1.0, "mcc": 310, "mnc": 1, "lac": 1, "cellid": 1},
            {"lat": 1.0, "lon": 1.0, "mcc": 310, "mnc": 1, "lac": 1, "cellid": 2, "radio": "GSM"}
        ]});
        let towers = parse_response(&body).unwrap();
        assert_eq!(towers.len(), 1);
        assert_eq!(towers[0].cell_id, 2);
    }

    #[test]
    fn empty_cells_is_ok() {
        let towers = parse_response(&serde_json::json!({"cells": []})).unwrap();
        assert!(towers.is_empty());
    }

    #[test]
    fn error_document_is_api_error() {
        let err = parse_response(&serde_json::json!({"error": "API key is invalid", "code": 2}))
            .unwrap_err();
        assert!(matches!(err, TowerError::Api { message } if message == "API key is invalid"));
    }

    #[test]
    fn unknown_shape_is_parse_error() {
        assert!(matches!(
            parse_response(&serde_json::json!({"foo": 1})),
            Err(TowerError::Parse { .. })
        ));
        assert!(matches!(
            parse_response(&serde_json::json!("nope")),
            Err(TowerError::Parse { .. })
        ));
    }

    #[test]
    fn masks_keys() {
        assert_eq!(mask_key("pk.abcdef123456"), "pk.…456");
        assert_eq!(mask_key("short"), "***");
        assert_eq!(mask_key(""), "***");
    }

    #[test]
    fn blank_key_is_rejected() {
        let err = OpenCellIdClient::with_client(reqwest::Client::new(), OpenCellIdConfig::new(" "))
            .err()
            .unwrap();
        assert!(matches!(err, TowerError::MissingApiKey));
    }
}
