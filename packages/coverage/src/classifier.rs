//! Tower classification.
//!
//! Each tower passes through four filters in a fixed order: radio
//! technology, sample count, distance from the search center, whitelist
//! membership. A tower rejected by one stage is not examined by later
//! stages. The first tower to pass all four decides the verdict and ends
//! the scan.

use cell_coverage_models::{ClassifierStats, Coordinate, CoverageVerdict, RadioType, TowerRecord};
use cell_coverage_spatial::haversine_km;
use cell_coverage_whitelist::PlmnWhitelist;
use serde::{Deserialize, Serialize};

/// Filter thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Radio technologies the device can use for data.
    pub modern_radios: Vec<RadioType>,
    /// Minimum number of measurements behind a tower's position.
    pub min_samples: u32,
    /// Maximum great-circle distance from the search center.
    pub max_distance_km: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            modern_radios: vec![RadioType::Lte, RadioType::LteM, RadioType::Nr],
            min_samples: 2,
            max_distance_km: 5.0,
        }
    }
}

/// Classifies `towers` around `center` against `whitelist`.
#[must_use]
pub fn classify(
    towers: &[TowerRecord],
    center: &Coordinate,
    whitelist: &PlmnWhitelist,
    config: &ClassifierConfig,
) -> CoverageVerdict {
    let mut stats = ClassifierStats::default();

    for tower in towers {
        stats.scanned += 1;

        if !config.modern_radios.contains(&tower.radio) {
            stats.rejected_radio += 1;
            continue;
        }

        if tower.sample_count < config.min_samples {
            stats.rejected_samples += 1;
            continue;
        }

        let distance_km = haversine_km(center, &tower.coordinate());
        if distance_km > config.max_distance_km {
            stats.rejected_distance += 1;
            continue;
        }

        if !whitelist.is_supported_parts(tower.mcc, tower.mnc) {
            stats.rejected_whitelist += 1;
            continue;
        }

        log::info!(
            "Matched {} tower {}/{} cell {} at {distance_km:.2} km after scanning {} towers",
            tower.radio,
            tower.mcc,
            tower.mnc,
            tower.cell_id,
            stats.scanned
        );
        return CoverageVerdict::matched(tower.clone(), distance_km, stats);
    }

    log::info!(
        "No matching tower among {}: rejected radio={} samples={} distance={} whitelist={}",
        stats.scanned,
        stats.rejected_radio,
        stats.rejected_samples,
        stats.rejected_distance,
        stats.rejected_whitelist
    );
    CoverageVerdict::no_match(stats)
}
