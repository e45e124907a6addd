//! Geocoding: free-text place queries to coordinates
//!
//! Each plan waypoint carries a geocodable query string; this module turns
//! those into coordinates via a provider behind the [`PlaceResolver`] trait.
//! The production implementation talks to Geoapify's autocomplete endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::GeocodeConfig;

/// Geocoding errors
#[derive(Error, Debug)]
pub enum GeocodeError {
    #[error("Empty geocoding query")]
    EmptyQuery,

    #[error("No match found for '{0}'")]
    NoMatch(String),

    #[error("Geocoding API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid geocoding response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// A geographic coordinate pair in degrees
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

/// A place resolved from a free-text query
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPlace {
    /// Provider's formatted display name (may be empty)
    pub name: String,

    /// Resolved coordinates
    pub coords: LatLon,
}

/// Resolver from free-text place queries to coordinates
#[async_trait]
pub trait PlaceResolver: Send + Sync {
    /// Resolve one query to its best-match place
    async fn resolve(&self, query: &str) -> Result<ResolvedPlace, GeocodeError>;
}

/// Resolve all queries concurrently, preserving input order
///
/// Fails as a whole if any single query fails; partial results are never
/// returned.
pub async fn resolve_all(
    resolver: &dyn PlaceResolver,
    queries: &[String],
) -> Result<Vec<ResolvedPlace>, GeocodeError> {
    debug!(query_count = %queries.len(), "resolve_all: called");
    let futures = queries.iter().map(|query| resolver.resolve(query));
    futures::future::try_join_all(futures).await
}

/// Geocoder backed by the Geoapify autocomplete API
pub struct GeoapifyGeocoder {
    base_url: String,
    api_key: String,
    lang: String,
    http: Client,
}

impl GeoapifyGeocoder {
    /// Create a new geocoder from configuration
    pub fn from_config(config: &GeocodeConfig) -> Result<Self, GeocodeError> {
        debug!(base_url = %config.base_url, "from_config: called");
        let api_key = config.get_api_key().map_err(|e| GeocodeError::Config(e.to_string()))?;

        let timeout = Duration::from_millis(config.timeout_ms);
        let http = Client::builder().timeout(timeout).build().map_err(GeocodeError::Network)?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            lang: config.lang.clone(),
            http,
        })
    }
}

#[async_trait]
impl PlaceResolver for GeoapifyGeocoder {
    async fn resolve(&self, query: &str) -> Result<ResolvedPlace, GeocodeError> {
        debug!(query = %query, "resolve: called");
        let query = query.trim();
        if query.is_empty() {
            return Err(GeocodeError::EmptyQuery);
        }

        let url = format!("{}/v1/geocode/autocomplete", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("text", query),
                ("limit", "1"),
                ("lang", &self.lang),
                ("apiKey", &self.api_key),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            debug!(status = %status, "resolve: API error");
            let text = response.text().await.unwrap_or_default();
            return Err(GeocodeError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        let text = response.text().await?;
        let wire: AutocompleteResponse =
            serde_json::from_str(&text).map_err(|e| GeocodeError::InvalidResponse(e.to_string()))?;

        let feature = wire
            .features
            .into_iter()
            .next()
            .ok_or_else(|| GeocodeError::NoMatch(query.to_string()))?;

        debug!(name = %feature.properties.formatted, "resolve: matched");
        Ok(ResolvedPlace {
            name: feature.properties.formatted,
            coords: LatLon {
                lat: feature.properties.lat,
                lon: feature.properties.lon,
            },
        })
    }
}

// Geoapify autocomplete wire types

#[derive(Deserialize)]
struct AutocompleteResponse {
    #[serde(default)]
    features: Vec<AutocompleteFeature>,
}

#[derive(Deserialize)]
struct AutocompleteFeature {
    properties: AutocompleteProperties,
}

#[derive(Deserialize)]
struct AutocompleteProperties {
    #[serde(default)]
    formatted: String,
    lat: f64,
    lon: f64,
}
