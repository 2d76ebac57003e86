//! GeoNames geocoder client.
//!
//! Resolves a configured city/country pair to coordinates using the
//! `searchJSON` endpoint. An empty result list means the place is unknown,
//! which the search stage treats as "skip this location".
//!
//! See <https://www.geonames.org/export/geonames-search.html>

use std::time::Duration;

use async_trait::async_trait;
use group_scout_config::GeocoderSettings;
use group_scout_group_models::{Coordinates, Location};

use crate::retry::{self, RetryPolicy};
use crate::{Geocoder, RemoteError};

/// [`Geocoder`] backed by GeoNames.
pub struct GeoNamesGeocoder {
    client: reqwest::Client,
    base_url: String,
    username: String,
    retry: RetryPolicy,
}

impl GeoNamesGeocoder {
    /// Creates a geocoder for the configured account.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Http`] if the HTTP client cannot be built.
    pub fn new(settings: &GeocoderSettings, retry: RetryPolicy) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("group-scout/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
            username: settings.username.clone(),
            retry,
        })
    }
}

#[async_trait]
impl Geocoder for GeoNamesGeocoder {
    async fn resolve(&self, location: &Location) -> Result<Option<Coordinates>, RemoteError> {
        let body = retry::send_json(
            || {
                self.client.get(&self.base_url).query(&[
                    ("q", location.city.as_str()),
                    ("country", location.country.as_str()),
                    ("maxRows", "1"),
                    ("username", self.username.as_str()),
                ])
            },
            self.retry,
        )
        .await?;

        parse_response(&body)
    }
}

/// Parses a GeoNames `searchJSON` response.
fn parse_response(body: &serde_json::Value) -> Result<Option<Coordinates>, RemoteError> {
    // GeoNames reports account and quota problems with HTTP 200 and a
    // `status` object instead of results.
    if let Some(status) = body.get("status") {
        let message = status["message"].as_str().unwrap_or("unknown error");
        return Err(RemoteError::parse(format!("GeoNames: {message}")));
    }

    let results = body["geonames"]
        .as_array()
        .ok_or_else(|| RemoteError::parse("GeoNames response has no geonames array"))?;

    let Some(first) = results.first() else {
        return Ok(None);
    };

    let coordinate = |key: &str| {
        first[key]
            .as_str()
            .and_then(|s| s.parse::<f64>().ok())
            .or_else(|| first[key].as_f64())
            .ok_or_else(|| RemoteError::parse(format!("Missing {key} in GeoNames response")))
    };

    Ok(Some(Coordinates {
        latitude: coordinate("lat")?,
        longitude: coordinate("lng")?,
    }))
}
