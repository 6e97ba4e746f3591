//! Collapses towers reported by more than one tile.
//!
//! Adjacent tiles share their edges, so a tower sitting on a boundary comes
//! back from both queries. Identity is the full
//! [`TowerKey`](cell_coverage_models::TowerKey); the first occurrence wins.

use std::collections::BTreeSet;

use cell_coverage_models::TowerRecord;

/// Removes towers whose key has already been seen, keeping first-seen order.
#[must_use]
pub fn dedup_towers(towers: Vec<TowerRecord>) -> Vec<TowerRecord> {
    let before = towers.len();
    let mut seen = BTreeSet::new();
    let unique: Vec<TowerRecord> = towers
        .into_iter()
        .filter(|tower| seen.insert(tower.key()))
        .collect();

    if unique.len() < before {
        log::debug!(
            "Dropped {} duplicate towers ({before} -> {})",
            before - unique.len(),
            unique.len()
        );
    }

    unique
}

#[cfg(test)]
mod tests {
    use cell_coverage_models::RadioType;

    use super::*;

    fn tower(mnc: u16, cell_id: u64, samples: u32) -> TowerRecord {
        TowerRecord {
            mcc: 310,
            mnc,
            area_code: 100,
            cell_id,
            radio: RadioType::Lte,
            latitude: 42.0,
            longitude: -71.0,
            sample_count: samples,
            last_seen: None,
        }
    }

    #[test]
    fn keeps_first_occurrence() {
        let towers = vec![tower(410, 1, 5), tower(410, 2, 5), tower(410, 1, 99)];
        let unique = dedup_towers(towers);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].cell_id, 1);
        assert_eq!(unique[0].sample_count, 5);
        assert_eq!(unique[1].cell_id, 2);
    }

    #[test]
    fn same_cell_id_on_other_network_is_distinct() {
        let unique = dedup_towers(vec![tower(410, 1, 5), tower(260, 1, 5)]);
        assert_eq!(unique.len(), 2);
    }

    #[test]
    fn is_idempotent() {
        let once = dedup_towers(vec![tower(410, 1, 5), tower(410, 1, 6), tower(410, 3, 1)]);
        let twice = dedup_towers(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn empty_input() {
        assert!(dedup_towers(Vec::new()).is_empty());
    }
}
