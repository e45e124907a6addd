//! Map-view helpers: bounds fitting and primary/alternate route split
//!
//! These are pure functions over the shared route state so any front end
//! (the REPL map view, a JSON dump) derives the same view.

use tracing::debug;

use crate::geocode::LatLon;
use crate::routing::{RouteFeature, RouteGeometry};
use crate::state::Waypoint;

/// Fraction of the bounds span added as padding on each side
pub const DEFAULT_PADDING_RATIO: f64 = 0.05;

/// A lat/lon bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingBox {
    fn from_point(point: LatLon) -> Self {
        Self {
            south: point.lat,
            west: point.lon,
            north: point.lat,
            east: point.lon,
        }
    }

    /// Grow the box to include a point
    pub fn include(&mut self, point: LatLon) {
        self.south = self.south.min(point.lat);
        self.west = self.west.min(point.lon);
        self.north = self.north.max(point.lat);
        self.east = self.east.max(point.lon);
    }

    /// Center of the box
    pub fn center(&self) -> LatLon {
        LatLon {
            lat: (self.south + self.north) / 2.0,
            lon: (self.west + self.east) / 2.0,
        }
    }

    /// Expand each side by `ratio` of the span, at least 0.01 degrees
    ///
    /// The floor keeps a single-point box from collapsing to zero area.
    pub fn expanded(&self, ratio: f64) -> Self {
        let lat_pad = ((self.north - self.south) * ratio).max(0.01);
        let lon_pad = ((self.east - self.west) * ratio).max(0.01);
        Self {
            south: self.south - lat_pad,
            west: self.west - lon_pad,
            north: self.north + lat_pad,
            east: self.east + lon_pad,
        }
    }
}

/// Compute padded bounds covering all waypoints and route coordinates
///
/// Returns `None` when there is nothing to fit.
pub fn fit_bounds(waypoints: &[Waypoint], route: Option<&RouteGeometry>) -> Option<BoundingBox> {
    debug!(waypoint_count = %waypoints.len(), "fit_bounds: called");
    let mut points = waypoints.iter().map(|w| w.coords).collect::<Vec<_>>();
    if let Some(route) = route {
        points.extend(route.coordinate_pairs());
    }

    let mut iter = points.into_iter();
    let mut bounds = BoundingBox::from_point(iter.next()?);
    for point in iter {
        bounds.include(point);
    }

    Some(bounds.expanded(DEFAULT_PADDING_RATIO))
}

/// Split route geometry into the primary route and the alternates
///
/// The provider returns the recommended route as the first feature; any
/// remaining features are alternative routes drawn dimmer.
pub fn split_routes(route: &RouteGeometry) -> (Option<RouteFeature>, Vec<RouteFeature>) {
    debug!(feature_count = %route.features.len(), "split_routes: called");
    let mut features = route.features.iter().cloned();
    let primary = features.next();
    let alternates = features.collect();
    (primary, alternates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::WaypointRole;
    use crate::routing::Geometry;

    fn waypoint(lat: f64, lon: f64) -> Waypoint {
        Waypoint {
            name: "stop".to_string(),
            coords: LatLon { lat, lon },
            role: WaypointRole::Via,
        }
    }

    fn line(points: Vec<[f64; 2]>) -> RouteGeometry {
        RouteGeometry {
            features: vec![RouteFeature {
                geometry: Geometry::LineString { coordinates: points },
                properties: serde_json::Value::Null,
            }],
        }
    }

    #[test]
    fn test_fit_bounds_empty_is_none() {
        assert!(fit_bounds(&[], None).is_none());
    }

    #[test]
    fn test_fit_bounds_single_point_gets_minimum_padding() {
        let bounds = fit_bounds(&[waypoint(38.58, -121.49)], None).unwrap();

        assert!(bounds.north > bounds.south);
        assert!(bounds.east > bounds.west);
        assert!((bounds.north - bounds.south - 0.02).abs() < 1e-9);
    }

    #[test]
    fn test_fit_bounds_covers_waypoints_and_route() {
        let waypoints = vec![waypoint(38.58, -121.49), waypoint(37.77, -122.41)];
        // Route bulges south of both endpoints
        let route = line(vec![[-121.49, 38.58], [-122.0, 37.0], [-122.41, 37.77]]);

        let bounds = fit_bounds(&waypoints, Some(&route)).unwrap();

        assert!(bounds.south < 37.0);
        assert!(bounds.north > 38.58);
        assert!(bounds.west < -122.41);
        assert!(bounds.east > -121.49);
    }

    #[test]
    fn test_bounding_box_center() {
        let bounds = BoundingBox {
            south: 37.0,
            west: -122.0,
            north: 39.0,
            east: -120.0,
        };
        let center = bounds.center();
        assert!((center.lat - 38.0).abs() < 1e-9);
        assert!((center.lon - (-121.0)).abs() < 1e-9);
    }

    #[test]
    fn test_split_routes_first_is_primary() {
        let mut route = line(vec![[0.0, 0.0], [1.0, 1.0]]);
        route.features.push(RouteFeature {
            geometry: Geometry::LineString {
                coordinates: vec![[0.0, 0.0], [2.0, 2.0]],
            },
            properties: serde_json::Value::Null,
        });

        let (primary, alternates) = split_routes(&route);

        assert!(primary.is_some());
        assert_eq!(alternates.len(), 1);
    }

    #[test]
    fn test_split_routes_empty() {
        let route = RouteGeometry { features: vec![] };
        let (primary, alternates) = split_routes(&route);
        assert!(primary.is_none());
        assert!(alternates.is_empty());
    }
}
