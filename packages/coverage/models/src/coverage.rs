//! Verdict and result types returned by a coverage check.

use serde::{Deserialize, Deserializer, Serialize};

use crate::{Coordinate, TowerRecord};

/// Why a verdict came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerdictReason {
    /// A tower passed every filter stage.
    Matched,
    /// No tower survived the filter pipeline (including the empty-set and
    /// empty-whitelist cases).
    NoMatchingTower,
}

/// Per-stage rejection counters from one classifier pass.
///
/// Counters only cover towers scanned before the classifier stopped; a
/// match short-circuits the scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifierStats {
    /// Towers examined.
    pub scanned: u64,
    /// Rejected for a legacy or unknown radio type.
    pub rejected_radio: u64,
    /// Rejected for too few samples.
    pub rejected_samples: u64,
    /// Rejected for being too far from the search center.
    pub rejected_distance: u64,
    /// Rejected because the network is not whitelisted.
    pub rejected_whitelist: u64,
}

/// Outcome of classifying a tower set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageVerdict {
    /// Whether a supported tower was found.
    pub supported: bool,
    /// The first tower that passed every stage.
    pub matched_tower: Option<TowerRecord>,
    /// Great-circle distance from the search center to the matched tower.
    pub matched_distance_km: Option<f64>,
    /// Why the verdict was reached.
    pub reason: VerdictReason,
    /// Rejection counters.
    pub stats: ClassifierStats,
}

impl CoverageVerdict {
    /// A negative verdict.
    #[must_use]
    pub const fn no_match(stats: ClassifierStats) -> Self {
        Self {
            supported: false,
            matched_tower: None,
            matched_distance_km: None,
            reason: VerdictReason::NoMatchingTower,
            stats,
        }
    }

    /// A positive verdict for `tower`.
    #[must_use]
    pub const fn matched(tower: TowerRecord, distance_km: f64, stats: ClassifierStats) -> Self {
        Self {
            supported: true,
            matched_tower: Some(tower),
            matched_distance_km: Some(distance_km),
            reason: VerdictReason::Matched,
            stats,
        }
    }
}

/// A service provider filed for an area, as returned by the fallback
/// provider directory.
///
/// Only the fields needed for display are typed; everything else the
/// directory returns is preserved in [`ProviderRecord::extra`]. Typed
/// fields never reject an entry: values of an unexpected shape read as
/// absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRecord {
    /// Regulatory filer identifier (string or number upstream).
    #[serde(default, deserialize_with = "string_or_number")]
    pub provider_id: Option<String>,
    /// Provider brand name.
    #[serde(default, deserialize_with = "string_or_number")]
    pub provider_name: Option<String>,
    /// Parent company, used when no brand name is filed.
    #[serde(default, deserialize_with = "string_or_number")]
    pub holding_company: Option<String>,
    /// Counties the provider is filed in. A single string upstream becomes
    /// a one-element list.
    #[serde(default, deserialize_with = "string_list")]
    pub counties: Vec<String>,
    /// Unrecognized upstream fields, passed through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ProviderRecord {
    /// Name to show a user: brand name, then holding company, then
    /// `"Unknown"`.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.provider_name
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| {
                self.holding_company
                    .as_deref()
                    .filter(|s| !s.trim().is_empty())
            })
            .unwrap_or("Unknown")
    }
}

fn scalar_text(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(scalar_text))
}

fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Array(items)) => items.into_iter().filter_map(scalar_text).collect(),
        Some(other) => scalar_text(other).into_iter().collect(),
        None => Vec::new(),
    })
}

/// Search bookkeeping attached to a [`CoverageResult`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchDiagnostics {
    /// Grid side length (tiles per row).
    pub grid_size: usize,
    /// Tiles planned.
    pub tiles_planned: usize,
    /// Tiles whose fetch failed after retries.
    pub tiles_failed: usize,
    /// Tiles still in flight when the request deadline expired.
    pub tiles_abandoned: usize,
    /// Towers returned across all tiles, before dedup.
    pub towers_fetched: usize,
    /// Unique towers after dedup.
    pub towers_unique: usize,
    /// Whether the whole-request deadline cut the fan-out short.
    pub request_timed_out: bool,
    /// Classifier rejection counters.
    pub classifier: ClassifierStats,
}

/// The answer to "is there usable coverage at this postal code?".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageResult {
    /// Postal code that was checked.
    pub zip: String,
    /// Search center the postal code resolved to.
    pub location: Coordinate,
    /// Whether a supported tower was found.
    pub supported: bool,
    /// Why the verdict was reached.
    pub reason: VerdictReason,
    /// The tower that produced a positive verdict.
    pub matched_tower: Option<TowerRecord>,
    /// Distance to the matched tower.
    pub matched_distance_km: Option<f64>,
    /// Providers serving the area, present only for negative verdicts
    /// where the fallback was consulted.
    pub fallback_providers: Option<Vec<ProviderRecord>>,
    /// County names for the area, alongside `fallback_providers`.
    pub fallback_counties: Option<Vec<String>>,
    /// Set when the fallback source could not be reached.
    pub fallback_unavailable: bool,
    /// Search bookkeeping.
    pub diagnostics: SearchDiagnostics,
}

impl CoverageResult {
    /// One-line human readable summary of the result.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.supported {
            if let Some(tower) = &self.matched_tower {
                return format!(
                    "Found a supported {} tower ({}/{}) {:.1} km from {}.",
                    tower.radio,
                    tower.mcc,
                    tower.mnc,
                    self.matched_distance_km.unwrap_or_default(),
                    self.zip
                );
            }
            return format!("Found a supported tower near {}.", self.zip);
        }

        if self.fallback_unavailable {
            return format!(
                "No supported towers near {}, and the fallback provider source could not be reached.",
                self.zip
            );
        }

        match &self.fallback_providers {
            Some(providers) if !providers.is_empty() => format!(
                "No supported towers near {}. These providers serve the area:",
                self.zip
            ),
            _ => format!(
                "No supported towers near {}, and no fallback providers were found.",
                self.zip
            ),
        }
    }
}
