//! Route computation between resolved coordinates
//!
//! Takes an ordered list of coordinates and produces drawable route geometry
//! via a provider behind the [`RouteResolver`] trait. The production
//! implementation talks to Geoapify's routing endpoint and returns the
//! provider's GeoJSON feature collection parsed into typed geometry.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::RoutingConfig;
use crate::geocode::LatLon;

/// Routing errors
#[derive(Error, Debug)]
pub enum RouteError {
    #[error("Routing requires at least 2 waypoints, got {0}")]
    TooFewWaypoints(usize),

    #[error("Unknown travel mode '{0}' (expected drive, truck, bicycle, walk, or transit)")]
    InvalidMode(String),

    #[error("Unknown avoid flag '{0}' (expected highways, tolls, or ferries)")]
    InvalidAvoid(String),

    #[error("Routing API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid routing response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Travel mode for route computation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TravelMode {
    #[default]
    Drive,
    Truck,
    Bicycle,
    Walk,
    Transit,
}

impl TravelMode {
    /// Parse a mode string as used in config and CLI flags
    pub fn parse(s: &str) -> Result<Self, RouteError> {
        match s.trim().to_lowercase().as_str() {
            "drive" => Ok(Self::Drive),
            "truck" => Ok(Self::Truck),
            "bicycle" => Ok(Self::Bicycle),
            "walk" => Ok(Self::Walk),
            "transit" => Ok(Self::Transit),
            other => Err(RouteError::InvalidMode(other.to_string())),
        }
    }

    /// Wire value for the routing API
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Drive => "drive",
            Self::Truck => "truck",
            Self::Bicycle => "bicycle",
            Self::Walk => "walk",
            Self::Transit => "transit",
        }
    }
}

/// Route feature to avoid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Avoid {
    Highways,
    Tolls,
    Ferries,
}

impl Avoid {
    /// Parse an avoid flag as used in config and CLI flags
    pub fn parse(s: &str) -> Result<Self, RouteError> {
        match s.trim().to_lowercase().as_str() {
            "highways" => Ok(Self::Highways),
            "tolls" => Ok(Self::Tolls),
            "ferries" => Ok(Self::Ferries),
            other => Err(RouteError::InvalidAvoid(other.to_string())),
        }
    }

    /// Wire value for the routing API
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Highways => "highways",
            Self::Tolls => "tolls",
            Self::Ferries => "ferries",
        }
    }
}

/// Route geometry as returned by the provider
///
/// Kept close to GeoJSON so the renderer can draw it directly. The first
/// feature is the primary route; any further features are alternates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteGeometry {
    #[serde(default)]
    pub features: Vec<RouteFeature>,
}

impl RouteGeometry {
    /// Iterate all coordinates across every feature, as lat/lon pairs
    pub fn coordinate_pairs(&self) -> impl Iterator<Item = LatLon> + '_ {
        self.features.iter().flat_map(|f| f.geometry.coordinate_pairs())
    }
}

/// One routed leg or alternative, with its provider metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteFeature {
    pub geometry: Geometry,

    /// Provider metadata (distance, time, instructions) passed through as-is
    #[serde(default)]
    pub properties: serde_json::Value,
}

/// GeoJSON line geometry; coordinates are [lon, lat] per the GeoJSON spec
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    LineString { coordinates: Vec<[f64; 2]> },
    MultiLineString { coordinates: Vec<Vec<[f64; 2]>> },
}

impl Geometry {
    fn coordinate_pairs(&self) -> Box<dyn Iterator<Item = LatLon> + '_> {
        match self {
            Self::LineString { coordinates } => Box::new(coordinates.iter().map(to_latlon)),
            Self::MultiLineString { coordinates } => {
                Box::new(coordinates.iter().flatten().map(to_latlon))
            }
        }
    }
}

fn to_latlon(pair: &[f64; 2]) -> LatLon {
    LatLon {
        lat: pair[1],
        lon: pair[0],
    }
}

/// Resolver from ordered coordinates to route geometry
#[async_trait]
pub trait RouteResolver: Send + Sync {
    /// Compute a route visiting the coordinates in order
    async fn route(
        &self,
        coords: &[LatLon],
        mode: TravelMode,
        avoid: &[Avoid],
    ) -> Result<RouteGeometry, RouteError>;
}

/// Router backed by the Geoapify routing API
pub struct GeoapifyRouter {
    base_url: String,
    api_key: String,
    http: Client,
}

impl GeoapifyRouter {
    /// Create a new router from configuration
    pub fn from_config(config: &RoutingConfig) -> Result<Self, RouteError> {
        debug!(base_url = %config.base_url, "from_config: called");
        let api_key = config.get_api_key().map_err(|e| RouteError::Config(e.to_string()))?;

        let timeout = Duration::from_millis(config.timeout_ms);
        let http = Client::builder().timeout(timeout).build().map_err(RouteError::Network)?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            http,
        })
    }
}

/// Format coordinates as the pipe-separated waypoints parameter
fn format_waypoints(coords: &[LatLon]) -> String {
    coords
        .iter()
        .map(|c| format!("{},{}", c.lat, c.lon))
        .collect::<Vec<_>>()
        .join("|")
}

#[async_trait]
impl RouteResolver for GeoapifyRouter {
    async fn route(
        &self,
        coords: &[LatLon],
        mode: TravelMode,
        avoid: &[Avoid],
    ) -> Result<RouteGeometry, RouteError> {
        debug!(waypoint_count = %coords.len(), mode = %mode.as_str(), "route: called");
        if coords.len() < 2 {
            return Err(RouteError::TooFewWaypoints(coords.len()));
        }

        let url = format!("{}/v1/routing", self.base_url);
        let waypoints = format_waypoints(coords);

        let mut params = vec![
            ("waypoints", waypoints),
            ("mode", mode.as_str().to_string()),
            ("apiKey", self.api_key.clone()),
        ];
        if !avoid.is_empty() {
            let avoid = avoid.iter().map(Avoid::as_str).collect::<Vec<_>>().join("|");
            params.push(("avoid", avoid));
        }

        let response = self.http.get(&url).query(&params).send().await?;

        let status = response.status();
        if !status.is_success() {
            debug!(status = %status, "route: API error");
            let text = response.text().await.unwrap_or_default();
            return Err(RouteError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        let text = response.text().await?;
        let geometry: RouteGeometry =
            serde_json::from_str(&text).map_err(|e| RouteError::InvalidResponse(e.to_string()))?;

        debug!(feature_count = %geometry.features.len(), "route: success");
        Ok(geometry)
    }
}
