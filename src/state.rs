//! Shared route state
//!
//! Single-writer store for the current waypoints and route geometry, published
//! through a watch channel so any number of read-only views (REPL map view,
//! renderers) observe replacements without holding locks across awaits.
//!
//! State changes are whole-object replacements guarded by a generation
//! counter: a turn captures the generation up front and its final write is
//! dropped if a reset bumped the generation in the meantime.

use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use crate::geocode::{LatLon, ResolvedPlace};
use crate::plan::{PlanWaypoint, WaypointRole};
use crate::routing::RouteGeometry;

/// A resolved, displayable waypoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Waypoint {
    /// Display label shown on the map
    pub name: String,

    /// Resolved coordinates
    pub coords: LatLon,

    /// Structural role within the route
    pub role: WaypointRole,
}

/// Snapshot of the shared route state
#[derive(Debug, Clone, Default, Serialize)]
pub struct RouteSnapshot {
    pub waypoints: Vec<Waypoint>,
    pub route: Option<RouteGeometry>,

    /// Bumped on every reset; successful turns must match it to publish
    pub generation: u64,
}

/// Single-writer store for the shared route state
pub struct RouteStore {
    tx: watch::Sender<RouteSnapshot>,
}

impl Default for RouteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(RouteSnapshot::default());
        Self { tx }
    }

    /// Get a copy of the current state
    pub fn snapshot(&self) -> RouteSnapshot {
        self.tx.borrow().clone()
    }

    /// Current generation, captured by turns before any async work
    pub fn generation(&self) -> u64 {
        self.tx.borrow().generation
    }

    /// Subscribe to state replacements
    pub fn subscribe(&self) -> watch::Receiver<RouteSnapshot> {
        self.tx.subscribe()
    }

    /// Replace the state if the generation still matches
    ///
    /// Returns false without touching the state when a reset happened after
    /// `generation` was captured.
    pub fn replace_if_current(
        &self,
        generation: u64,
        waypoints: Vec<Waypoint>,
        route: Option<RouteGeometry>,
    ) -> bool {
        debug!(generation = %generation, waypoint_count = %waypoints.len(), "replace_if_current: called");
        let mut applied = false;
        self.tx.send_modify(|snapshot| {
            if snapshot.generation == generation {
                snapshot.waypoints = waypoints;
                snapshot.route = route;
                applied = true;
            }
        });
        if !applied {
            debug!("replace_if_current: stale generation, replacement dropped");
        }
        applied
    }

    /// Clear the state and invalidate in-flight turns
    pub fn reset(&self) {
        debug!("reset: called");
        self.tx.send_modify(|snapshot| {
            snapshot.waypoints.clear();
            snapshot.route = None;
            snapshot.generation += 1;
        });
    }
}

/// Merge plan waypoints with their geocoding results, positionally
///
/// Label priority: the plan's label, then the provider's formatted name, then
/// the raw query. Callers must pass slices of equal length.
pub fn merge_waypoints(plan: &[PlanWaypoint], resolved: &[ResolvedPlace]) -> Vec<Waypoint> {
    debug!(waypoint_count = %plan.len(), "merge_waypoints: called");
    plan.iter()
        .zip(resolved.iter())
        .map(|(planned, place)| {
            let label = planned.label.trim();
            let name = if !label.is_empty() {
                label.to_string()
            } else if !place.name.trim().is_empty() {
                place.name.clone()
            } else {
                planned.query.clone()
            };
            Waypoint {
                name,
                coords: place.coords,
                role: planned.role,
            }
        })
        .collect()
}
