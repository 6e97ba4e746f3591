//! The coverage check pipeline.

use std::sync::Arc;

use cell_coverage_geocoder::{GeocodeError, ServiceChainResolver, ZipResolver};
use cell_coverage_models::{CoverageResult, SearchDiagnostics};
use cell_coverage_providers::{ProviderDirectoryClient, ProviderError, ProviderLookup};
use cell_coverage_spatial::plan_grid;
use cell_coverage_towers::opencellid::OpenCellIdClient;
use cell_coverage_towers::progress::{ProgressCallback, null_progress};
use cell_coverage_towers::{FetchOptions, TowerError, TowerSource, dedup_towers, fetch_grid};
use cell_coverage_whitelist::SharedWhitelist;
use thiserror::Error;

use crate::CoverageError;
use crate::classifier::{ClassifierConfig, classify};
use crate::config::CoverageConfig;

/// Errors from building an engine out of a [`CoverageConfig`].
#[derive(Debug, Error)]
pub enum EngineError {
    /// The geocoder could not be set up.
    #[error("Geocoder setup failed: {0}")]
    Geocoder(#[from] GeocodeError),

    /// The tower client could not be set up.
    #[error("Tower client setup failed: {0}")]
    Towers(#[from] TowerError),

    /// The provider directory client could not be set up.
    #[error("Provider directory setup failed: {0}")]
    Providers(#[from] ProviderError),
}

/// Per-check tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// Radius of the tower search.
    pub radius_km: f64,
    /// Side of one search tile.
    pub tile_side_km: f64,
    /// Fan-out concurrency and deadline.
    pub fetch: FetchOptions,
    /// Classifier thresholds.
    pub classifier: ClassifierConfig,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&CoverageConfig::default())
    }
}

impl EngineSettings {
    /// Settings taken from `config`.
    #[must_use]
    pub fn from_config(config: &CoverageConfig) -> Self {
        Self {
            radius_km: config.grid.radius_km,
            tile_side_km: config.grid.tile_side_km(),
            fetch: config.towers.fetch_options(),
            classifier: config.classifier.clone(),
        }
    }
}

/// Runs coverage checks against a fixed set of collaborators.
///
/// The engine holds no per-request state; one instance can serve
/// concurrent checks.
pub struct CoverageEngine {
    resolver: Arc<dyn ZipResolver>,
    towers: Arc<dyn TowerSource>,
    fallback: Option<Arc<dyn ProviderLookup>>,
    whitelist: Arc<SharedWhitelist>,
    settings: EngineSettings,
    progress: Arc<dyn ProgressCallback>,
}

impl CoverageEngine {
    /// Engine with default settings, no fallback and no progress output.
    #[must_use]
    pub fn new(
        resolver: Arc<dyn ZipResolver>,
        towers: Arc<dyn TowerSource>,
        whitelist: Arc<SharedWhitelist>,
    ) -> Self {
        Self {
            resolver,
            towers,
            fallback: None,
            whitelist,
            settings: EngineSettings::default(),
            progress: null_progress(),
        }
    }

    /// Builds the production collaborators described by `config`.
    ///
    /// The fallback lookup is left out (with a warning) when it is enabled
    /// but has no base URL.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if a client cannot be built, including
    /// [`TowerError::MissingApiKey`] when no tower API key is configured.
    pub fn from_config(
        config: &CoverageConfig,
        whitelist: Arc<SharedWhitelist>,
    ) -> Result<Self, EngineError> {
        let resolver = ServiceChainResolver::new(config.geocoder.timeout())?;
        let client_config = config
            .towers
            .client_config()
            .ok_or(TowerError::MissingApiKey)?;
        let towers = OpenCellIdClient::new(client_config)?;

        let mut engine = Self::new(Arc::new(resolver), Arc::new(towers), whitelist)
            .with_settings(EngineSettings::from_config(config));

        match config.fallback.directory_config() {
            Some(directory) => {
                engine = engine.with_fallback(Arc::new(ProviderDirectoryClient::new(directory)?));
            }
            None if config.fallback.enabled => {
                log::warn!(
                    "Fallback provider lookup is enabled but no base URL is configured; skipping it"
                );
            }
            None => {}
        }

        Ok(engine)
    }

    /// Consults `lookup` on negative verdicts.
    #[must_use]
    pub fn with_fallback(mut self, lookup: Arc<dyn ProviderLookup>) -> Self {
        self.fallback = Some(lookup);
        self
    }

    /// Replaces the tuning.
    #[must_use]
    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Reports tile fan-out progress to `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Current tuning.
    #[must_use]
    pub const fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Determines whether there is supported coverage at `zip`.
    ///
    /// The caller is responsible for validating the postal code format.
    /// Failed tiles, an expired fan-out deadline and an unreachable fallback
    /// source all still produce a result; see
    /// [`CoverageResult::diagnostics`] and
    /// [`CoverageResult::fallback_unavailable`].
    ///
    /// # Errors
    ///
    /// Returns [`CoverageError`] if the postal code cannot be resolved or no
    /// search grid can be planned around it.
    pub async fn check_coverage(&self, zip: &str) -> Result<CoverageResult, CoverageError> {
        let location = self.resolver.resolve(zip).await?;
        let center = location.coordinate;

        let grid = plan_grid(center, self.settings.radius_km, self.settings.tile_side_km)?;
        log::info!(
            "Searching {:.1} km around {zip} ({center}) with a {}x{} grid of {:.2} km tiles",
            self.settings.radius_km,
            grid.size,
            grid.size,
            grid.tile_side_km
        );

        let tiles = grid.bounding_boxes();
        let fetch = fetch_grid(
            self.towers.as_ref(),
            &tiles,
            &self.settings.fetch,
            &self.progress,
        )
        .await;

        let tiles_failed = fetch.tiles_failed();
        let towers_fetched = fetch.towers.len();
        let towers = dedup_towers(fetch.towers);

        let whitelist = self.whitelist.snapshot();
        let verdict = classify(&towers, &center, &whitelist, &self.settings.classifier);

        let mut fallback_providers = None;
        let mut fallback_counties = None;
        let mut fallback_unavailable = false;

        if !verdict.supported
            && let Some(lookup) = &self.fallback
        {
            match lookup.providers_for_zip(zip).await {
                Ok(listing) => {
                    log::info!(
                        "Fallback lists {} providers for {zip}",
                        listing.providers.len()
                    );
                    fallback_providers = Some(listing.providers);
                    fallback_counties = Some(listing.counties);
                }
                Err(e) => {
                    log::warn!("Fallback provider lookup for {zip} unavailable: {e}");
                    fallback_providers = Some(Vec::new());
                    fallback_counties = Some(Vec::new());
                    fallback_unavailable = true;
                }
            }
        }

        Ok(CoverageResult {
            zip: zip.to_string(),
            location: center,
            supported: verdict.supported,
            reason: verdict.reason,
            matched_tower: verdict.matched_tower,
            matched_distance_km: verdict.matched_distance_km,
            fallback_providers,
            fallback_counties,
            fallback_unavailable,
            diagnostics: SearchDiagnostics {
                grid_size: grid.size,
                tiles_planned: tiles.len(),
                tiles_failed,
                tiles_abandoned: fetch.tiles_abandoned,
                towers_fetched,
                towers_unique: towers.len(),
                request_timed_out: fetch.timed_out,
                classifier: verdict.stats,
            },
        })
    }
}
