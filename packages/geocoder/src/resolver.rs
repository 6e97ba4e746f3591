//! Priority-ordered geocoding across the registered services.

use std::time::Duration;

use async_trait::async_trait;

use crate::service_registry::{GeocodingService, ProviderConfig, enabled_services};
use crate::{GeocodeError, ResolveError, ZipLocation, ZipResolver, nominatim, zippopotam};

/// `User-Agent` for geocoding requests. Nominatim rejects anonymous clients.
pub const USER_AGENT: &str = "cell-coverage/0.1 (postal-code-geocoder)";

/// Tries each service in priority order until one returns a match.
///
/// The outcome distinguishes "nobody knows this postal code" from "nobody
/// could be asked":
///
/// * any service matches: that location.
/// * at least one service answered without a match: [`ResolveError::NotFound`].
/// * every service failed: [`ResolveError::Unavailable`].
pub struct ServiceChainResolver {
    client: reqwest::Client,
    services: Vec<GeocodingService>,
}

impl ServiceChainResolver {
    /// Resolver over the enabled embedded services.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Http`] if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self::with_services(client, enabled_services()))
    }

    /// Resolver over an explicit service list, tried in the given order.
    #[must_use]
    pub fn with_services(client: reqwest::Client, services: Vec<GeocodingService>) -> Self {
        Self { client, services }
    }

    /// Services this resolver will try.
    #[must_use]
    pub fn services(&self) -> &[GeocodingService] {
        &self.services
    }

    async fn query(
        &self,
        service: &GeocodingService,
        zip: &str,
    ) -> Result<Option<ZipLocation>, GeocodeError> {
        match &service.provider {
            ProviderConfig::Zippopotam {
                base_url,
                country_code,
            } => zippopotam::lookup(&self.client, base_url, country_code, zip).await,
            ProviderConfig::Nominatim {
                base_url,
                country_code,
            } => nominatim::geocode_postal_code(&self.client, base_url, country_code, zip).await,
        }
    }
}

#[async_trait]
impl ZipResolver for ServiceChainResolver {
    async fn resolve(&self, zip: &str) -> Result<ZipLocation, ResolveError> {
        let mut answered = false;
        let mut failures = Vec::new();

        for service in &self.services {
            match self.query(service, zip).await {
                Ok(Some(location)) => {
                    log::info!(
                        "Geocoded {zip} via {} -> {}",
                        service.name,
                        location.coordinate
                    );
                    return Ok(location);
                }
                Ok(None) => {
                    log::debug!("{} has no match for {zip}", service.name);
                    answered = true;
                }
                Err(e) => {
                    log::warn!("{} failed to geocode {zip}: {e}", service.name);
                    failures.push(format!("{}: {e}", service.id));
                }
            }
        }

        if answered {
            return Err(ResolveError::NotFound {
                zip: zip.to_string(),
            });
        }

        Err(ResolveError::Unavailable {
            zip: zip.to_string(),
            message: if failures.is_empty() {
                "no geocoding services enabled".to_string()
            } else {
                failures.join("; ")
            },
        })
    }
}
