//! End-to-end coverage checks against in-process collaborators.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use cell_coverage::{CoverageEngine, CoverageError, EngineSettings};
use cell_coverage_geocoder::{GeocodingProvider, ResolveError, ZipLocation, ZipResolver};
use cell_coverage_models::{
    BoundingBox, Coordinate, Plmn, ProviderRecord, RadioType, TowerRecord, VerdictReason,
};
use cell_coverage_providers::{ProviderError, ProviderListing, ProviderLookup};
use cell_coverage_towers::{FetchOptions, TowerError, TowerSource};
use cell_coverage_whitelist::{PlmnWhitelist, SharedWhitelist};

const CAMBRIDGE: Coordinate = Coordinate {
    latitude: 42.3647,
    longitude: -71.1042,
};

struct FixedResolver(Coordinate);

#[async_trait]
impl ZipResolver for FixedResolver {
    async fn resolve(&self, zip: &str) -> Result<ZipLocation, ResolveError> {
        if zip == "00000" {
            return Err(ResolveError::NotFound {
                zip: zip.to_string(),
            });
        }
        if zip == "99999" {
            return Err(ResolveError::Unavailable {
                zip: zip.to_string(),
                message: "connection refused".to_string(),
            });
        }
        Ok(ZipLocation {
            coordinate: self.0,
            place_name: None,
            provider: GeocodingProvider::Zippopotam,
        })
    }
}

type TileFn = dyn Fn(&BoundingBox) -> Result<Vec<TowerRecord>, TowerError> + Send + Sync;

/// Answers every tile with the towers `respond` returns for it.
struct FakeTowers {
    respond: Box<TileFn>,
    hang_on_center: bool,
    calls: AtomicUsize,
}

impl FakeTowers {
    fn new(
        respond: impl Fn(&BoundingBox) -> Result<Vec<TowerRecord>, TowerError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            respond: Box::new(respond),
            hang_on_center: false,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TowerSource for FakeTowers {
    fn name(&self) -> &str {
        "fake"
    }

    async fn fetch_tile(&self, bbox: &BoundingBox) -> Result<Vec<TowerRecord>, TowerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hang_on_center && bbox.contains(&CAMBRIDGE) {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        (self.respond)(bbox)
    }
}

enum FakeDirectory {
    Listing(ProviderListing),
    Down,
}

#[async_trait]
impl ProviderLookup for FakeDirectory {
    async fn providers_for_zip(&self, _zip: &str) -> Result<ProviderListing, ProviderError> {
        match self {
            Self::Listing(listing) => Ok(listing.clone()),
            Self::Down => Err(ProviderError::Status {
                status: 502,
                body_snippet: "bad gateway".to_string(),
            }),
        }
    }
}

fn tower(mnc: u16, radio: RadioType, samples: u32, at: Coordinate) -> TowerRecord {
    TowerRecord {
        mcc: 310,
        mnc,
        area_code: 7,
        cell_id: 1000 + u64::from(mnc),
        radio,
        latitude: at.latitude,
        longitude: at.longitude,
        sample_count: samples,
        last_seen: None,
    }
}

/// A point about 2 km north of the center.
const fn two_km_north() -> Coordinate {
    Coordinate {
        latitude: CAMBRIDGE.latitude + 0.018,
        longitude: CAMBRIDGE.longitude,
    }
}

fn whitelist(ids: &[&str]) -> Arc<SharedWhitelist> {
    Arc::new(SharedWhitelist::new(PlmnWhitelist::from_entries(
        ids.iter()
            .map(|id| (Plmn::canonicalize(id).unwrap(), "US 2".to_string())),
    )))
}

fn engine(towers: FakeTowers, wl: Arc<SharedWhitelist>) -> CoverageEngine {
    CoverageEngine::new(Arc::new(FixedResolver(CAMBRIDGE)), Arc::new(towers), wl)
}

/// Source that reports `record` from whichever tile contains it.
fn located(record: TowerRecord) -> FakeTowers {
    FakeTowers::new(move |bbox| {
        if bbox.contains(&record.coordinate()) {
            Ok(vec![record.clone()])
        } else {
            Ok(Vec::new())
        }
    })
}

fn providers(names: &[&str]) -> ProviderListing {
    ProviderListing {
        providers: names
            .iter()
            .map(|name| {
                serde_json::from_value::<ProviderRecord>(
                    serde_json::json!({ "provider_name": name }),
                )
                .unwrap()
            })
            .collect(),
        counties: vec!["Middlesex".to_string()],
    }
}

#[tokio::test]
async fn whitelisted_lte_tower_is_supported() {
    let t = tower(410, RadioType::Lte, 20, two_km_north());
    let engine = engine(located(t.clone()), whitelist(&["310410"]))
        .with_fallback(Arc::new(FakeDirectory::Listing(providers(&["Unused"]))));

    let result = engine.check_coverage("02139").await.unwrap();

    assert!(result.supported);
    assert_eq!(result.reason, VerdictReason::Matched);
    assert_eq!(result.matched_tower, Some(t));
    assert!((result.matched_distance_km.unwrap() - 2.0).abs() < 0.1);
    assert!(result.fallback_providers.is_none());
    assert_eq!(result.diagnostics.grid_size, 5);
    assert_eq!(result.diagnostics.tiles_planned, 25);
    assert_eq!(result.diagnostics.tiles_failed, 0);
    assert!(result.summary().starts_with("Found a supported LTE tower (310/410)"));
}

#[tokio::test]
async fn duplicate_towers_across_tiles_are_collapsed() {
    let t = tower(410, RadioType::Lte, 20, two_km_north());
    let every_tile = {
        let t = t.clone();
        FakeTowers::new(move |_| Ok(vec![t.clone()]))
    };
    let result = engine(every_tile, whitelist(&["310410"]))
        .check_coverage("02139")
        .await
        .unwrap();

    assert_eq!(result.diagnostics.towers_fetched, 25);
    assert_eq!(result.diagnostics.towers_unique, 1);
    assert!(result.supported);
}

#[tokio::test]
async fn empty_whitelist_falls_back_to_providers() {
    let t = tower(410, RadioType::Lte, 20, two_km_north());
    let engine = engine(located(t), whitelist(&[])).with_fallback(Arc::new(
        FakeDirectory::Listing(providers(&["Carrier One", "Carrier Two"])),
    ));

    let result = engine.check_coverage("02139").await.unwrap();

    assert!(!result.supported);
    assert_eq!(result.reason, VerdictReason::NoMatchingTower);
    assert!(!result.fallback_unavailable);
    let names: Vec<&str> = result
        .fallback_providers
        .as_ref()
        .unwrap()
        .iter()
        .map(ProviderRecord::display_name)
        .collect();
    assert_eq!(names, vec!["Carrier One", "Carrier Two"]);
    assert_eq!(result.fallback_counties, Some(vec!["Middlesex".to_string()]));
    assert_eq!(result.diagnostics.classifier.rejected_whitelist, 1);
}

#[tokio::test]
async fn gsm_only_is_unsupported() {
    let t = tower(410, RadioType::Gsm, 50, two_km_north());
    let result = engine(located(t), whitelist(&["310410"]))
        .check_coverage("02139")
        .await
        .unwrap();

    assert!(!result.supported);
    assert_eq!(result.diagnostics.classifier.rejected_radio, 1);
    assert!(result.fallback_providers.is_none());
}

#[tokio::test]
async fn unreachable_fallback_does_not_fail_check() {
    let engine = engine(FakeTowers::new(|_| Ok(Vec::new())), whitelist(&["310410"]))
        .with_fallback(Arc::new(FakeDirectory::Down));

    let result = engine.check_coverage("02139").await.unwrap();

    assert!(!result.supported);
    assert!(result.fallback_unavailable);
    assert_eq!(result.fallback_providers, Some(Vec::new()));
    assert_eq!(result.fallback_counties, Some(Vec::new()));
    assert!(result.summary().contains("could not be reached"));
}

#[tokio::test]
async fn timed_out_tile_does_not_abort_check() {
    let t = tower(410, RadioType::Lte, 20, two_km_north());
    let source = FakeTowers::new(move |bbox| {
        if bbox.contains(&CAMBRIDGE) {
            Err(TowerError::Timeout { attempts: 3 })
        } else if bbox.contains(&t.coordinate()) {
            Ok(vec![t.clone()])
        } else {
            Ok(Vec::new())
        }
    });

    let result = engine(source, whitelist(&["310410"]))
        .check_coverage("02139")
        .await
        .unwrap();

    assert!(result.supported);
    assert_eq!(result.diagnostics.tiles_failed, 1);
    assert!(!result.diagnostics.request_timed_out);
}

#[tokio::test]
async fn request_deadline_keeps_collected_towers() {
    let t = tower(410, RadioType::Lte, 20, two_km_north());
    let mut source = located(t);
    source.hang_on_center = true;

    let settings = EngineSettings {
        fetch: FetchOptions {
            concurrency: 25,
            request_timeout: Duration::from_millis(300),
        },
        ..EngineSettings::default()
    };
    let result = engine(source, whitelist(&["310410"]))
        .with_settings(settings)
        .check_coverage("02139")
        .await
        .unwrap();

    assert!(result.diagnostics.request_timed_out);
    assert_eq!(result.diagnostics.tiles_abandoned, 1);
    assert!(result.supported);
}

#[tokio::test]
async fn unknown_zip_is_location_failure() {
    let source = Arc::new(FakeTowers::new(|_| Ok(Vec::new())));
    let engine = CoverageEngine::new(
        Arc::new(FixedResolver(CAMBRIDGE)),
        source.clone(),
        whitelist(&["310410"]),
    );

    let err = engine.check_coverage("00000").await.unwrap_err();
    assert!(matches!(err, CoverageError::GeocodeNotFound { ref zip } if zip == "00000"));
    assert!(err.is_location_failure());

    let err = engine.check_coverage("99999").await.unwrap_err();
    assert!(matches!(err, CoverageError::GeocodeUnavailable { .. }));

    assert_eq!(source.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn polar_location_is_degenerate_grid() {
    let pole = Coordinate {
        latitude: 89.99,
        longitude: 0.0,
    };
    let engine = CoverageEngine::new(
        Arc::new(FixedResolver(pole)),
        Arc::new(FakeTowers::new(|_| Ok(Vec::new()))),
        whitelist(&["310410"]),
    );

    let err = engine.check_coverage("02139").await.unwrap_err();
    assert!(matches!(err, CoverageError::DegenerateGrid(_)));
    assert!(!err.is_location_failure());
}

#[tokio::test]
async fn whitelist_swap_applies_to_next_check() {
    let t = tower(260, RadioType::Nr, 20, two_km_north());
    let wl = whitelist(&["310410"]);
    let engine = engine(located(t), Arc::clone(&wl));

    assert!(!engine.check_coverage("02139").await.unwrap().supported);

    wl.replace(PlmnWhitelist::from_entries([(
        Plmn::canonicalize("310260").unwrap(),
        "US 2".to_string(),
    )]));

    assert!(engine.check_coverage("02139").await.unwrap().supported);
}
