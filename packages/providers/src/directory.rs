//! HTTP client for the provider directory.
//!
//! `GET {base}/api/providers/by-zip?zip=02139&source=unique` answers
//! `{"providers": [...], "counties": [...]}`. Provider objects are kept with
//! all their fields; counties may be plain names or objects with a `name`.

use std::time::Duration;

use async_trait::async_trait;
use cell_coverage_models::ProviderRecord;

use crate::{ProviderError, ProviderListing, ProviderLookup};

/// Environment variable holding the directory base URL.
pub const BASE_URL_ENV: &str = "PROVIDER_API_BASE_URL";

const BODY_SNIPPET_LEN: usize = 300;

/// Settings for [`ProviderDirectoryClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderDirectoryConfig {
    /// Base URL; `/api/providers/by-zip` is appended.
    pub base_url: String,
    /// Value of the `source` query parameter.
    pub source: String,
    /// Optional free-text filter sent as `q`.
    pub query: Option<String>,
    /// Timeout for the whole lookup.
    pub timeout: Duration,
}

impl ProviderDirectoryConfig {
    /// Config with default source and timeout for `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            source: "unique".to_string(),
            query: None,
            timeout: Duration::from_secs(15),
        }
    }

    /// Config with the base URL from `PROVIDER_API_BASE_URL`, or `None` if
    /// it is unset or empty.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        std::env::var(BASE_URL_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(Self::new)
    }
}

/// [`ProviderLookup`] backed by the provider directory HTTP API.
pub struct ProviderDirectoryClient {
    client: reqwest::Client,
    config: ProviderDirectoryConfig,
}

impl ProviderDirectoryClient {
    /// Builds a client with its own connection pool.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::NotConfigured`] if the base URL is blank, or
    /// [`ProviderError::Http`] if the HTTP client cannot be built.
    pub fn new(config: ProviderDirectoryConfig) -> Result<Self, ProviderError> {
        if config.base_url.trim().is_empty() {
            return Err(ProviderError::NotConfigured);
        }
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/api/providers/by-zip",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl ProviderLookup for ProviderDirectoryClient {
    async fn providers_for_zip(&self, zip: &str) -> Result<ProviderListing, ProviderError> {
        let mut params = vec![("zip", zip), ("source", self.config.source.as_str())];
        if let Some(q) = self.config.query.as_deref() {
            params.push(("q", q));
        }

        let resp = self.client.get(self.endpoint()).query(&params).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body_snippet: body.chars().take(BODY_SNIPPET_LEN).collect(),
            });
        }

        let body: serde_json::Value = resp.json().await?;
        let listing = parse_listing(&body)?;
        log::debug!(
            "Provider directory: {} providers, {} counties for {zip}",
            listing.providers.len(),
            listing.counties.len()
        );
        Ok(listing)
    }
}

/// Parses a directory response.
///
/// Missing `providers` or `counties` keys are treated as empty. Provider
/// entries that are not objects are skipped; every object entry is kept,
/// whatever the shape of its fields.
///
/// # Errors
///
/// Returns [`ProviderError::Parse`] if the body is not a JSON object.
pub fn parse_listing(body: &serde_json::Value) -> Result<ProviderListing, ProviderError> {
    let map = body.as_object().ok_or_else(|| ProviderError::Parse {
        message: "provider directory response is not an object".to_string(),
    })?;

    let providers = map
        .get("providers")
        .and_then(serde_json::Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    serde_json::from_value::<ProviderRecord>(item.clone())
                        .map_err(|e| log::debug!("Skipping provider entry: {e}"))
                        .ok()
                })
                .collect()
        })
        .unwrap_or_default();

    let counties = map
        .get("counties")
        .and_then(serde_json::Value::as_array)
        .map(|items| items.iter().filter_map(county_name).collect())
        .unwrap_or_default();

    Ok(ProviderListing {
        providers,
        counties,
    })
}

fn county_name(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        serde_json::Value::Object(obj) => ["name", "county", "county_name"]
            .iter()
            .find_map(|key| obj.get(*key).and_then(serde_json::Value::as_str))
            .map(String::from),
        _ => None,
    }
}
