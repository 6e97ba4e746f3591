//! Postal code lookup services known to the resolver.
//!
//! One TOML file per service lives in `services/` and is baked into the
//! binary, so the chain order can change without touching resolver code.
//! [`enabled_services`] is what [`ServiceChainResolver`] walks.
//!
//! [`ServiceChainResolver`]: crate::ServiceChainResolver

use serde::Deserialize;

/// One entry of the service chain.
#[derive(Debug, Clone, Deserialize)]
pub struct GeocodingService {
    /// Identifier used in logs and failure summaries.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Disabled services are skipped by the resolver.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Position in the chain; lowest first.
    pub priority: u32,
    /// Endpoint details.
    pub provider: ProviderConfig,
}

/// Endpoint details, selected by the `type` key.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Zippopotam.us postal code API.
    Zippopotam {
        /// API base URL (e.g., `"https://api.zippopotam.us"`).
        base_url: String,
        /// Country path segment (e.g., `"us"`).
        country_code: String,
    },
    /// Nominatim / `OpenStreetMap` search.
    Nominatim {
        /// Search endpoint (e.g., `"https://nominatim.openstreetmap.org/search"`).
        base_url: String,
        /// Value of the `country` query parameter.
        country_code: String,
    },
}

const fn default_true() -> bool {
    true
}

impl GeocodingService {
    /// Endpoint URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        match &self.provider {
            ProviderConfig::Zippopotam { base_url, .. }
            | ProviderConfig::Nominatim { base_url, .. } => base_url,
        }
    }

    /// Points the service at `url`, e.g. a local mock server.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        match &mut self.provider {
            ProviderConfig::Zippopotam { base_url, .. }
            | ProviderConfig::Nominatim { base_url, .. } => *base_url = url.into(),
        }
        self
    }
}

const SERVICE_TOMLS: &[(&str, &str)] = &[
    ("zippopotam", include_str!("../services/zippopotam.toml")),
    ("nominatim", include_str!("../services/nominatim.toml")),
];

#[cfg(test)]
const EXPECTED_SERVICE_COUNT: usize = 2;

/// Every embedded service, enabled or not, in file order.
///
/// # Panics
///
/// Panics if an embedded service file does not parse.
#[must_use]
pub fn all_services() -> Vec<GeocodingService> {
    SERVICE_TOMLS
        .iter()
        .map(|(name, toml_str)| {
            toml::de::from_str(toml_str)
                .unwrap_or_else(|e| panic!("Invalid embedded geocoding service '{name}': {e}"))
        })
        .collect()
}

/// Enabled services in chain order.
#[must_use]
pub fn enabled_services() -> Vec<GeocodingService> {
    let mut services: Vec<GeocodingService> =
        all_services().into_iter().filter(|s| s.enabled).collect();
    services.sort_by_key(|s| s.priority);
    services
}
