//! Grid fan-out: one tower query per tile.
//!
//! Tiles are fetched concurrently up to [`FetchOptions::concurrency`]. A
//! failed tile is logged and recorded in [`GridFetch::failures`] but never
//! aborts the others. When the whole-request deadline expires, the tiles
//! already collected are kept and the in-flight ones are dropped, which
//! cancels their requests.

use std::sync::Arc;
use std::time::Duration;

use cell_coverage_models::{BoundingBox, TowerRecord};
use futures::stream::{self, StreamExt as _};

use crate::progress::ProgressCallback;
use crate::{TowerError, TowerSource};

/// Concurrency and deadline for one fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// Maximum tile requests in flight at once.
    pub concurrency: usize,
    /// Deadline for the whole fan-out, independent of per-tile timeouts.
    pub request_timeout: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// A tile whose fetch failed.
#[derive(Debug)]
pub struct TileFailure {
    /// Position of the tile in the input slice.
    pub tile_index: usize,
    /// The tile's bounds.
    pub bbox: BoundingBox,
    /// Final error for the tile.
    pub error: TowerError,
}

/// Combined result of a fan-out.
#[derive(Debug, Default)]
pub struct GridFetch {
    /// Towers from all successful tiles, grouped in tile order.
    pub towers: Vec<TowerRecord>,
    /// Tiles that failed.
    pub failures: Vec<TileFailure>,
    /// Tiles that returned successfully (possibly with zero towers).
    pub tiles_succeeded: usize,
    /// Tiles still in flight (or not yet started) when the deadline hit.
    pub tiles_abandoned: usize,
    /// Whether the whole-request deadline expired.
    pub timed_out: bool,
}

impl GridFetch {
    /// Number of tiles that failed.
    #[must_use]
    pub fn tiles_failed(&self) -> usize {
        self.failures.len()
    }
}

/// Fetches every tile from `source` and concatenates the results.
///
/// Results are reassembled in tile order regardless of completion order,
/// so the output is deterministic for a deterministic source.
pub async fn fetch_grid(
    source: &dyn TowerSource,
    tiles: &[BoundingBox],
    options: &FetchOptions,
    progress: &Arc<dyn ProgressCallback>,
) -> GridFetch {
    progress.set_total(tiles.len() as u64);
    progress.set_message(format!("Querying {} tiles via {}", tiles.len(), source.name()));

    let deadline = tokio::time::Instant::now().checked_add(options.request_timeout);

    let mut pending = std::pin::pin!(
        stream::iter(tiles.iter().enumerate().map(|(index, bbox)| async move {
            (index, source.fetch_tile(bbox).await)
        }))
        .buffer_unordered(options.concurrency.max(1))
    );

    let mut per_tile: Vec<(usize, Vec<TowerRecord>)> = Vec::with_capacity(tiles.len());
    let mut failures = Vec::new();
    let mut timed_out = false;

    loop {
        let next = match deadline {
            Some(deadline) => {
                if let Ok(next) = tokio::time::timeout_at(deadline, pending.next()).await {
                    next
                } else {
                    timed_out = true;
                    break;
                }
            }
            None => pending.next().await,
        };

        let Some((index, result)) = next else {
            break;
        };

        match result {
            Ok(towers) => {
                log::debug!("Tile {index}: {} towers", towers.len());
                per_tile.push((index, towers));
            }
            Err(error) => {
                log::warn!("Tile {index} {} failed: {error}", tiles[index]);
                failures.push(TileFailure {
                    tile_index: index,
                    bbox: tiles[index],
                    error,
                });
            }
        }
        progress.inc(1);
    }

    let tiles_succeeded = per_tile.len();
    let tiles_abandoned = tiles.len() - tiles_succeeded - failures.len();

    if timed_out {
        log::warn!(
            "Tower search deadline of {:?} expired with {tiles_abandoned} of {} tiles outstanding; \
             using the {tiles_succeeded} tiles collected so far",
            options.request_timeout,
            tiles.len()
        );
    }

    per_tile.sort_by_key(|(index, _)| *index);
    failures.sort_by_key(|f| f.tile_index);
    let towers: Vec<TowerRecord> = per_tile.into_iter().flat_map(|(_, t)| t).collect();

    progress.finish(format!(
        "{} towers from {tiles_succeeded}/{} tiles",
        towers.len(),
        tiles.len()
    ));

    GridFetch {
        towers,
        failures,
        tiles_succeeded,
        tiles_abandoned,
        timed_out,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use cell_coverage_models::RadioType;

    use super::*;
    use crate::progress::null_progress;

    fn tile(i: usize) -> BoundingBox {
        #[allow(clippy::cast_precision_loss)]
        let base = i as f64;
        BoundingBox {
            min_lat: base,
            min_lon: 0.0,
            max_lat: base + 0.5,
            max_lon: 0.5,
        }
    }

    fn tower(cell_id: u64) -> TowerRecord {
        TowerRecord {
            mcc: 310,
            mnc: 410,
            area_code: 1,
            cell_id,
            radio: RadioType::Lte,
            latitude: 0.0,
            longitude: 0.0,
            sample_count: 10,
            last_seen: None,
        }
    }

    enum Behavior {
        Towers(Vec<TowerRecord>),
        Fail,
        Hang,
    }

    /// Serves canned responses keyed by tile `min_lat`.
    struct FakeSource {
        behaviors: BTreeMap<usize, Behavior>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl FakeSource {
        fn new(behaviors: BTreeMap<usize, Behavior>) -> Self {
            Self {
                behaviors,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TowerSource for FakeSource {
        fn name(&self) -> &str {
            "fake"
        }

        async fn fetch_tile(&self, bbox: &BoundingBox) -> Result<Vec<TowerRecord>, TowerError> {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let key = bbox.min_lat as usize;
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;

            let result = match self.behaviors.get(&key) {
                Some(Behavior::Towers(t)) => Ok(t.clone()),
                Some(Behavior::Fail) => Err(TowerError::Timeout { attempts: 3 }),
                Some(Behavior::Hang) => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(Vec::new())
                }
                None => Ok(Vec::new()),
            };
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    #[tokio::test]
    async fn failed_tile_does_not_abort_grid() {
        let source = FakeSource::new(BTreeMap::from([
            (0, Behavior::Towers(vec![tower(1)])),
            (1, Behavior::Fail),
            (2, Behavior::Towers(vec![tower(2), tower(3)])),
        ]));
        let tiles: Vec<_> = (0..3).map(tile).collect();

        let fetch = fetch_grid(&source, &tiles, &FetchOptions::default(), &null_progress()).await;

        assert_eq!(fetch.tiles_succeeded, 2);
        assert_eq!(fetch.tiles_failed(), 1);
        assert_eq!(fetch.failures[0].tile_index, 1);
        assert!(fetch.failures[0].error.is_timeout());
        assert!(!fetch.timed_out);
        let ids: Vec<u64> = fetch.towers.iter().map(|t| t.cell_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn results_are_in_tile_order() {
        let behaviors = (0..9)
            .map(|i| (i, Behavior::Towers(vec![tower(i as u64)])))
            .collect();
        let source = FakeSource::new(behaviors);
        let tiles: Vec<_> = (0..9).map(tile).collect();

        let fetch = fetch_grid(&source, &tiles, &FetchOptions::default(), &null_progress()).await;

        let ids: Vec<u64> = fetch.towers.iter().map(|t| t.cell_id).collect();
        assert_eq!(ids, (0..9).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let source = FakeSource::new(BTreeMap::new());
        let tiles: Vec<_> = (0..12).map(tile).collect();
        let options = FetchOptions {
            concurrency: 3,
            request_timeout: Duration::from_secs(10),
        };

        let fetch = fetch_grid(&source, &tiles, &options, &null_progress()).await;

        assert_eq!(fetch.tiles_succeeded, 12);
        assert!(source.max_in_flight.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn deadline_keeps_collected_tiles() {
        let source = FakeSource::new(BTreeMap::from([
            (0, Behavior::Towers(vec![tower(1)])),
            (1, Behavior::Hang),
            (2, Behavior::Towers(vec![tower(2)])),
        ]));
        let tiles: Vec<_> = (0..3).map(tile).collect();
        let options = FetchOptions {
            concurrency: 3,
            request_timeout: Duration::from_millis(500),
        };

        let fetch = fetch_grid(&source, &tiles, &options, &null_progress()).await;

        assert!(fetch.timed_out);
        assert_eq!(fetch.tiles_succeeded, 2);
        assert_eq!(fetch.tiles_abandoned, 1);
        assert_eq!(fetch.towers.len(), 2);
    }

    #[tokio::test]
    async fn empty_grid_completes() {
        let source = FakeSource::new(BTreeMap::new());
        let fetch = fetch_grid(&source, &[], &FetchOptions::default(), &null_progress()).await;
        assert!(fetch.towers.is_empty());
        assert_eq!(fetch.tiles_succeeded, 0);
        assert!(!fetch.timed_out);
    }
}
