//! Zippopotam.us postal code lookup.
//!
//! `GET {base}/{country}/{zip}` returns the places sharing the postal code;
//! an unknown code is a 404.
//!
//! See <https://www.zippopotam.us/>

use crate::{GeocodeError, GeocodingProvider, ZipLocation, parse_coordinate};

/// Looks up `zip` in `country_code`.
///
/// Returns `Ok(None)` for unknown postal codes.
///
/// # Errors
///
/// Returns [`GeocodeError`] if the HTTP request or response parsing fails.
pub async fn lookup(
    client: &reqwest::Client,
    base_url: &str,
    country_code: &str,
    zip: &str,
) -> Result<Option<ZipLocation>, GeocodeError> {
    let url = format!(
        "{}/{}/{zip}",
        base_url.trim_end_matches('/'),
        country_code.to_ascii_lowercase()
    );
    let resp = client.get(&url).send().await?;

    match resp.status() {
        reqwest::StatusCode::NOT_FOUND => return Ok(None),
        reqwest::StatusCode::TOO_MANY_REQUESTS => return Err(GeocodeError::RateLimited),
        status if !status.is_success() => {
            return Err(GeocodeError::Status {
                status: status.as_u16(),
            });
        }
        _ => {}
    }

    let body: serde_json::Value = resp.json().await?;
    parse_response(&body)
}

fn parse_response(body: &serde_json::Value) -> Result<Option<ZipLocation>, GeocodeError> {
    let places = body["places"]
        .as_array()
        .ok_or_else(|| GeocodeError::Parse {
            message: "Zippopotam response has no places".to_string(),
        })?;

    let Some(first) = places.first() else {
        return Ok(None);
    };

    let coordinate = parse_coordinate(&first["latitude"], &first["longitude"], "Zippopotam")?;
    let place_name = match (
        first["place name"].as_str(),
        first["state abbreviation"].as_str(),
    ) {
        (Some(place), Some(state)) => Some(format!("{place}, {state}")),
        (Some(place), None) => Some(place.to_string()),
        _ => None,
    };

    Ok(Some(ZipLocation {
        coordinate,
        place_name,
        provider: GeocodingProvider::Zippopotam,
    }))
}
