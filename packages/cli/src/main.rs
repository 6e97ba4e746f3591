#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line front end for the cell coverage engine.
//!
//! ```text
//! cell_coverage_cli check 02139 [--config coverage.toml] [--whitelist plmn.csv] [--json]
//! cell_coverage_cli whitelist plmn.csv [--groups "US 2" --groups "EU 2"]
//! cell_coverage_cli grid 42.3647 -71.1042 [--radius-km 5] [--max-tile-area-km2 4]
//! ```
//!
//! The tower API key is read from `OPENCELLID_API_KEY` and the provider
//! directory from `PROVIDER_API_BASE_URL` unless set in the config file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cell_coverage::{CoverageConfig, CoverageEngine};
use cell_coverage_cli_utils::TileProgressBar;
use cell_coverage_models::{Coordinate, CoverageResult};
use cell_coverage_spatial::{plan_grid, tile_side_for_area};
use cell_coverage_whitelist::{PlmnWhitelist, SharedWhitelist, WhitelistError, WhitelistOptions};
use clap::{Parser, Subcommand};

/// Most fallback providers printed for a negative verdict.
const MAX_PROVIDERS_SHOWN: usize = 30;

#[derive(Parser)]
#[command(
    name = "cell_coverage_cli",
    about = "Check cellular coverage for a postal code"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check coverage at a postal code
    Check {
        /// Five-digit postal code
        zip: String,
        /// Config file (defaults to the built-in settings)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Whitelist dataset, overriding the config file
        #[arg(long)]
        whitelist: Option<PathBuf>,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Load a whitelist dataset and print what was accepted
    Whitelist {
        /// Dataset file (comma or tab separated)
        file: PathBuf,
        /// Accepted group tags (repeatable)
        #[arg(long)]
        groups: Vec<String>,
    },
    /// Print the tile plan around a point
    Grid {
        /// Center latitude
        #[arg(allow_hyphen_values = true)]
        lat: f64,
        /// Center longitude
        #[arg(allow_hyphen_values = true)]
        lon: f64,
        /// Search radius
        #[arg(long, default_value = "5.0")]
        radius_km: f64,
        /// Upstream area cap per query
        #[arg(long, default_value = "4.0")]
        max_tile_area_km2: f64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = cell_coverage_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            zip,
            config,
            whitelist,
            json,
        } => {
            if !is_valid_zip(&zip) {
                return Err(format!("'{zip}' is not a five-digit postal code").into());
            }

            let mut config = CoverageConfig::load(config.as_deref())?;
            if let Some(path) = whitelist {
                config.whitelist.path = Some(path);
            }

            let shared = Arc::new(SharedWhitelist::new(startup_whitelist(&config)?));
            let progress = TileProgressBar::start(&multi, &format!("Checking {zip}"));
            let engine = CoverageEngine::from_config(&config, shared)?.with_progress(progress);

            let result = engine.check_coverage(&zip).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_result(&result);
            }
        }
        Commands::Whitelist { file, groups } => {
            print_whitelist(&file, groups)?;
        }
        Commands::Grid {
            lat,
            lon,
            radius_km,
            max_tile_area_km2,
        } => {
            let center = Coordinate::new(lat, lon)?;
            let grid = plan_grid(center, radius_km, tile_side_for_area(max_tile_area_km2))?;

            println!(
                "{}x{} grid of {:.3} km tiles around {center} (covers ±{:.2} km)",
                grid.size,
                grid.size,
                grid.tile_side_km,
                grid.half_extent_km()
            );
            for tile in &grid.tiles {
                println!("  [{:>2},{:>2}] {}", tile.row, tile.col, tile.bbox);
            }
        }
    }

    Ok(())
}

/// Whether `zip` is exactly five ASCII digits.
fn is_valid_zip(zip: &str) -> bool {
    zip.len() == 5 && zip.bytes().all(|b| b.is_ascii_digit())
}

/// Loads the configured whitelist. An empty one is reported but still
/// used, so every check comes back negative.
fn startup_whitelist(config: &CoverageConfig) -> Result<PlmnWhitelist, WhitelistError> {
    let whitelist = config.whitelist.load()?;
    if let Err(e) = whitelist.ensure_populated() {
        log::warn!("{e}; no tower can match until the dataset is fixed");
    }
    Ok(whitelist)
}

fn print_result(result: &CoverageResult) {
    println!("{}", result.summary());

    if let Some(tower) = &result.matched_tower {
        println!(
            "  {} cell {} (area {}) at {:.5}, {:.5} from {} samples",
            tower.radio,
            tower.cell_id,
            tower.area_code,
            tower.latitude,
            tower.longitude,
            tower.sample_count
        );
    }

    if let Some(providers) = &result.fallback_providers {
        for provider in providers.iter().take(MAX_PROVIDERS_SHOWN) {
            println!("  - {}", provider.display_name());
        }
        if providers.len() > MAX_PROVIDERS_SHOWN {
            println!("  ... and {} more", providers.len() - MAX_PROVIDERS_SHOWN);
        }
    }

    if let Some(counties) = result.fallback_counties.as_ref().filter(|c| !c.is_empty()) {
        println!("  Counties: {}", counties.join(", "));
    }

    let diagnostics = &result.diagnostics;
    log::info!(
        "{} tiles searched ({} failed, {} abandoned), {} towers fetched, {} unique",
        diagnostics.tiles_planned,
        diagnostics.tiles_failed,
        diagnostics.tiles_abandoned,
        diagnostics.towers_fetched,
        diagnostics.towers_unique
    );
}

fn print_whitelist(path: &Path, groups: Vec<String>) -> Result<(), Box<dyn std::error::Error>> {
    let mut options = WhitelistOptions::default();
    if !groups.is_empty() {
        options.accepted_groups = groups;
    }

    let whitelist = PlmnWhitelist::from_path(path, &options)?;
    let stats = whitelist.stats();

    println!(
        "{}: {} rows read, {} skipped, {} entries ({}-delimited)",
        path.display(),
        stats.rows_read,
        stats.rows_skipped,
        stats.entries,
        stats.delimiter
    );
    for (plmn, group) in whitelist.iter() {
        println!("  {}/{}  {group}", plmn.mcc(), plmn.mnc());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zip_must_be_five_digits() {
        assert!(is_valid_zip("02139"));
        assert!(!is_valid_zip("2139"));
        assert!(!is_valid_zip("021390"));
        assert!(!is_valid_zip("0213a"));
        assert!(!is_valid_zip(" 2139"));
        assert!(!is_valid_zip("０２１３９"));
    }

    #[test]
    fn empty_whitelist_is_not_fatal_at_startup() {
        let path = std::env::temp_dir().join(format!(
            "cell_coverage_cli_whitelist_{}.csv",
            std::process::id()
        ));
        std::fs::write(&path, "310410,US 1\n").unwrap();

        let mut config = CoverageConfig::default();
        config.whitelist.path = Some(path.clone());
        let whitelist = startup_whitelist(&config);
        std::fs::remove_file(&path).unwrap();

        let whitelist = whitelist.unwrap();
        assert!(whitelist.is_empty());
        assert!(matches!(
            whitelist.ensure_populated(),
            Err(WhitelistError::Empty { rows_read: 1 })
        ));

        config.whitelist.path = Some(PathBuf::from("/nonexistent/plmn.csv"));
        assert!(matches!(
            startup_whitelist(&config),
            Err(WhitelistError::Io { .. })
        ));
    }

    #[test]
    fn parses_check_flags() {
        let cli = Cli::try_parse_from([
            "cell_coverage_cli",
            "check",
            "02139",
            "--whitelist",
            "plmn.csv",
            "--json",
        ])
        .unwrap();

        match cli.command {
            Commands::Check {
                zip,
                config,
                whitelist,
                json,
            } => {
                assert_eq!(zip, "02139");
                assert!(config.is_none());
                assert_eq!(whitelist, Some(PathBuf::from("plmn.csv")));
                assert!(json);
            }
            _ => panic!("expected check"),
        }
    }

    #[test]
    fn grid_accepts_negative_longitude() {
        let cli =
            Cli::try_parse_from(["cell_coverage_cli", "grid", "42.36", "-71.10", "--radius-km", "3"])
                .unwrap();

        match cli.command {
            Commands::Grid {
                lat,
                lon,
                radius_km,
                max_tile_area_km2,
            } => {
                assert!((lat - 42.36).abs() < f64::EPSILON);
                assert!((lon + 71.10).abs() < f64::EPSILON);
                assert!((radius_km - 3.0).abs() < f64::EPSILON);
                assert!((max_tile_area_km2 - 4.0).abs() < f64::EPSILON);
            }
            _ => panic!("expected grid"),
        }
    }

    #[test]
    fn repeated_groups_are_collected() {
        let cli = Cli::try_parse_from([
            "cell_coverage_cli",
            "whitelist",
            "plmn.tsv",
            "--groups",
            "US 2",
            "--groups",
            "EU 2",
        ])
        .unwrap();

        match cli.command {
            Commands::Whitelist { groups, .. } => assert_eq!(groups, vec!["US 2", "EU 2"]),
            _ => panic!("expected whitelist"),
        }
    }
}
