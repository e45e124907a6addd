//! RouteCause - conversational route planner
//!
//! RouteCause turns free-form chat ("to San Francisco from Sacramento, avoid
//! tolls") into a drawn route: an external LLM agent extracts a structured
//! plan, every stop is geocoded, a routing provider computes the geometry,
//! and the result is published as shared map state.
//!
//! # Core Concepts
//!
//! - **Turns, not streams**: each user message runs one pipeline to completion
//! - **Supersession**: a newer turn or a reset cancels whatever is in flight
//! - **Atomic map state**: the map only ever shows a fully-resolved route
//! - **Fails open**: a malformed plan degrades to a plain chat reply
//!
//! # Modules
//!
//! - [`agent`] - Agent client trait and HTTP implementation
//! - [`plan`] - Plan extraction from agent transcripts
//! - [`geocode`] - Place resolution via the geocoding provider
//! - [`routing`] - Route computation via the routing provider
//! - [`chat`] - Turn orchestration over a session
//! - [`state`] - Shared route state with watch-based subscription
//! - [`render`] - Bounds fitting and route split for map views
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod agent;
pub mod chat;
pub mod cli;
pub mod config;
pub mod geocode;
pub mod plan;
pub mod render;
pub mod repl;
pub mod routing;
pub mod state;

// Re-export commonly used types
pub use agent::{AgentClient, AgentError, AgentRunResult, ChatMessage, ChatRole, HttpAgentClient, TranscriptItem};
pub use chat::{ChatSession, TurnOptions, TurnOutcome, TurnStage};
pub use config::{AgentConfig, ChatConfig, Config, GeocodeConfig, RoutingConfig};
pub use geocode::{GeoapifyGeocoder, GeocodeError, LatLon, PlaceResolver, ResolvedPlace, resolve_all};
pub use plan::{extract_plan, last_assistant_text, PlanWaypoint, WaypointRole, PLAN_TOOL_NAME};
pub use render::{fit_bounds, split_routes, BoundingBox};
pub use routing::{Avoid, GeoapifyRouter, RouteError, RouteGeometry, RouteResolver, TravelMode};
pub use state::{merge_waypoints, RouteSnapshot, RouteStore, Waypoint};
