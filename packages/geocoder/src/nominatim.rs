//! Nominatim / OpenStreetMap postal code search.
//!
//! Used when Zippopotam has no answer. Nominatim has strict rate limits:
//! **1 request per second** maximum, and requests must carry an
//! identifying `User-Agent` (set on the shared client).
//!
//! See <https://nominatim.org/release-docs/develop/api/Search/>

use crate::{GeocodeError, GeocodingProvider, ZipLocation, parse_coordinate};

/// Geocodes a postal code using the structured `postalcode` search.
///
/// Returns `Ok(None)` when Nominatim knows no such postal code.
///
/// # Errors
///
/// Returns [`GeocodeError`] if the HTTP request or response parsing fails.
pub async fn geocode_postal_code(
    client: &reqwest::Client,
    base_url: &str,
    country_code: &str,
    zip: &str,
) -> Result<Option<ZipLocation>, GeocodeError> {
    let resp = client
        .get(base_url)
        .query(&[
            ("postalcode", zip),
            ("country", country_code),
            ("format", "json"),
            ("limit", "1"),
        ])
        .send()
        .await?;

    if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(GeocodeError::RateLimited);
    }
    if !resp.status().is_success() {
        return Err(GeocodeError::Status {
            status: resp.status().as_u16(),
        });
    }

    let body: serde_json::Value = resp.json().await?;
    parse_response(&body)
}

/// Parses Nominatim JSON response.
fn parse_response(body: &serde_json::Value) -> Result<Option<ZipLocation>, GeocodeError> {
    let results = body.as_array().ok_or_else(|| GeocodeError::Parse {
        message: "Nominatim response is not an array".to_string(),
    })?;

    let Some(first) = results.first() else {
        return Ok(None);
    };

    let coordinate = parse_coordinate(&first["lat"], &first["lon"], "Nominatim")?;
    let place_name = first["display_name"].as_str().map(String::from);

    Ok(Some(ZipLocation {
        coordinate,
        place_name,
        provider: GeocodingProvider::Nominatim,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nominatim_result() {
        let body = serde_json::json!([{
            "lat": "42.3656",
            "lon": "-71.1040",
            "display_name": "Cambridge, Middlesex County, Massachusetts, 02139, United States"
        }]);
        let result = parse_response(&body).unwrap().unwrap();
        assert!((result.coordinate.latitude - 42.3656).abs() < 1e-4);
        assert!((result.coordinate.longitude - -71.1040).abs() < 1e-4);
        assert_eq!(result.provider, GeocodingProvider::Nominatim);
        assert!(result.place_name.unwrap().contains("Cambridge"));
    }

    #[test]
    fn parses_nominatim_empty() {
        let body = serde_json::json!([]);
        assert!(parse_response(&body).unwrap().is_none());
    }

    #[test]
    fn rejects_out_of_range() {
        let body = serde_json::json!([{"lat": "142.0", "lon": "0"}]);
        assert!(matches!(
            parse_response(&body),
            Err(GeocodeError::Parse { .. })
        ));
    }
}
