//! Turn orchestration
//!
//! One turn runs nine steps: append the user message, show a progress
//! placeholder, run the agent, surface tool activity, extract the plan,
//! geocode every stop, fetch the route, publish the new map state, and
//! finalize the placeholder with the agent's summary. Each awaited stage is
//! raced against a cancellation token so a reset or a newer turn stops the
//! pipeline at the next await point.

use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::agent::{AgentClient, AgentError, AgentRunResult, ChatMessage};
use crate::config::ChatConfig;
use crate::geocode::{resolve_all, GeocodeError, PlaceResolver};
use crate::plan::{extract_plan, last_assistant_text};
use crate::routing::{Avoid, RouteError, RouteResolver, TravelMode};
use crate::state::{merge_waypoints, RouteSnapshot, RouteStore};

/// Assistant greeting shown when a session starts or is cleared
pub const GREETING: &str =
    "Tell me where you want to go. For example: 'to San Francisco from Sacramento'.";

const THINKING: &str = "Thinking…";
const AGENT_FAILED: &str = "I hit a snag talking to the agent. Please try again.";
const GEOCODE_FAILED: &str = "I couldn't resolve those stops. Could you be more specific?";
const ROUTE_FAILED: &str = "I couldn't fetch a route between those places. Please try again.";
const DONE_FALLBACK: &str = "Done.";

/// Pipeline stage where a turn failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStage {
    Agent,
    Geocode,
    Route,
}

/// How a submitted turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The turn ran to completion; `route_updated` is true when the map
    /// state was replaced
    Completed { route_updated: bool },

    /// A stage failed; the conversation shows the stage's error message
    Failed(TurnStage),

    /// A reset or a newer turn took over; nothing was changed
    Superseded,
}

#[derive(Error, Debug)]
enum TurnError {
    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error(transparent)]
    Geocode(#[from] GeocodeError),

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error("Turn superseded")]
    Cancelled,
}

/// Routing options applied to every turn
#[derive(Debug, Clone, Default)]
pub struct TurnOptions {
    pub mode: TravelMode,
    pub avoid: Vec<Avoid>,
}

impl TurnOptions {
    /// Build from chat config; assumes `Config::validate` already passed
    pub fn from_config(config: &ChatConfig) -> Result<Self, RouteError> {
        let mode = TravelMode::parse(&config.mode)?;
        let avoid = config.avoid.iter().map(|s| Avoid::parse(s)).collect::<Result<_, _>>()?;
        Ok(Self { mode, avoid })
    }
}

struct SessionInner {
    conversation: Vec<ChatMessage>,
    busy: bool,
    inflight: Option<CancellationToken>,
}

/// A conversational route-planning session
///
/// Cheap to share behind an `Arc`; `submit` and `reset` take `&self`.
pub struct ChatSession {
    agent: Arc<dyn AgentClient>,
    places: Arc<dyn PlaceResolver>,
    routes: Arc<dyn RouteResolver>,
    store: RouteStore,
    options: TurnOptions,
    inner: Mutex<SessionInner>,
}

impl ChatSession {
    pub fn new(
        agent: Arc<dyn AgentClient>,
        places: Arc<dyn PlaceResolver>,
        routes: Arc<dyn RouteResolver>,
        options: TurnOptions,
    ) -> Self {
        debug!(mode = %options.mode.as_str(), "new: called");
        Self {
            agent,
            places,
            routes,
            store: RouteStore::new(),
            options,
            inner: Mutex::new(SessionInner {
                conversation: vec![ChatMessage::assistant(GREETING)],
                busy: false,
                inflight: None,
            }),
        }
    }

    /// Copy of the conversation for display
    pub async fn conversation(&self) -> Vec<ChatMessage> {
        self.inner.lock().await.conversation.clone()
    }

    /// Whether a turn is currently in flight
    pub async fn is_busy(&self) -> bool {
        self.inner.lock().await.busy
    }

    /// Copy of the current map state
    pub fn snapshot(&self) -> RouteSnapshot {
        self.store.snapshot()
    }

    /// Subscribe to map state replacements
    pub fn subscribe(&self) -> watch::Receiver<RouteSnapshot> {
        self.store.subscribe()
    }

    /// Submit one user message and run the turn pipeline
    ///
    /// A new submission cancels any turn still in flight. Returns once this
    /// turn completed, failed at a stage, or was itself superseded.
    pub async fn submit(&self, input: &str) -> TurnOutcome {
        let turn_id = Uuid::now_v7();
        debug!(turn_id = %turn_id, "submit: called");

        let token = CancellationToken::new();
        let (placeholder, generation) = {
            let mut inner = self.inner.lock().await;
            if let Some(previous) = inner.inflight.take() {
                debug!(turn_id = %turn_id, "submit: cancelling previous turn");
                previous.cancel();
            }
            inner.inflight = Some(token.clone());
            inner.busy = true;
            inner.conversation.push(ChatMessage::user(input));
            inner.conversation.push(ChatMessage::assistant(THINKING));
            (inner.conversation.len() - 1, self.store.generation())
        };

        let conversation = self.conversation().await;
        let run = match self
            .guarded(&token, generation, self.agent.run(&conversation))
            .await
        {
            Ok(run) => run,
            Err(TurnError::Cancelled) => {
                debug!(turn_id = %turn_id, "submit: superseded during agent run");
                return TurnOutcome::Superseded;
            }
            Err(e) => {
                warn!(turn_id = %turn_id, error = %e, "submit: agent stage failed");
                self.set_placeholder(&token, generation, placeholder, AGENT_FAILED).await;
                self.finish_turn(&token).await;
                return TurnOutcome::Failed(TurnStage::Agent);
            }
        };

        if let Some(name) = first_tool_name(&run) {
            self.set_placeholder(&token, generation, placeholder, &format!("Calling {name}…"))
                .await;
        }

        let Some(plan) = extract_plan(&run.transcript) else {
            debug!(turn_id = %turn_id, "submit: no plan, conversational turn");
            self.finalize(&token, generation, placeholder, &run).await;
            self.finish_turn(&token).await;
            return TurnOutcome::Completed { route_updated: false };
        };

        let queries: Vec<String> = plan.iter().map(|w| w.query.clone()).collect();
        let resolved = match self
            .guarded(&token, generation, resolve_all(self.places.as_ref(), &queries))
            .await
        {
            Ok(resolved) => resolved,
            Err(TurnError::Cancelled) => {
                debug!(turn_id = %turn_id, "submit: superseded during geocoding");
                return TurnOutcome::Superseded;
            }
            Err(e) => {
                warn!(turn_id = %turn_id, error = %e, "submit: geocode stage failed");
                self.set_placeholder(&token, generation, placeholder, GEOCODE_FAILED).await;
                self.finish_turn(&token).await;
                return TurnOutcome::Failed(TurnStage::Geocode);
            }
        };

        if resolved.len() != plan.len() {
            warn!(turn_id = %turn_id, "submit: geocode result count mismatch");
            self.set_placeholder(&token, generation, placeholder, GEOCODE_FAILED).await;
            self.finish_turn(&token).await;
            return TurnOutcome::Failed(TurnStage::Geocode);
        }

        let coords: Vec<_> = resolved.iter().map(|p| p.coords).collect();
        let route = match self
            .guarded(
                &token,
                generation,
                self.routes.route(&coords, self.options.mode, &self.options.avoid),
            )
            .await
        {
            Ok(route) => route,
            Err(TurnError::Cancelled) => {
                debug!(turn_id = %turn_id, "submit: superseded during routing");
                return TurnOutcome::Superseded;
            }
            Err(e) => {
                warn!(turn_id = %turn_id, error = %e, "submit: route stage failed");
                self.set_placeholder(&token, generation, placeholder, ROUTE_FAILED).await;
                self.finish_turn(&token).await;
                return TurnOutcome::Failed(TurnStage::Route);
            }
        };

        let waypoints = merge_waypoints(&plan, &resolved);
        if !self.store.replace_if_current(generation, waypoints, Some(route)) {
            // A reset landed between the route result and the publish
            debug!(turn_id = %turn_id, "submit: superseded before publish");
            return TurnOutcome::Superseded;
        }
        debug!(turn_id = %turn_id, "submit: turn complete");

        self.finalize(&token, generation, placeholder, &run).await;
        self.finish_turn(&token).await;
        TurnOutcome::Completed { route_updated: true }
    }

    /// Clear the conversation and the map, superseding any in-flight turn
    pub async fn reset(&self) {
        debug!("reset: called");
        {
            let mut inner = self.inner.lock().await;
            if let Some(previous) = inner.inflight.take() {
                previous.cancel();
            }
            inner.busy = false;
            inner.conversation.clear();
            inner.conversation.push(ChatMessage::assistant(GREETING));
        }
        self.store.reset();
    }

    /// Race a stage against cancellation, then re-check before returning
    ///
    /// The re-check closes the late-arrival race: a result that lands in the
    /// same poll as a cancellation must still be discarded.
    async fn guarded<T, E, F>(
        &self,
        token: &CancellationToken,
        generation: u64,
        fut: F,
    ) -> Result<T, TurnError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<TurnError>,
    {
        let result = tokio::select! {
            _ = token.cancelled() => return Err(TurnError::Cancelled),
            result = fut => result.map_err(Into::into),
        };
        if token.is_cancelled() || self.store.generation() != generation {
            return Err(TurnError::Cancelled);
        }
        result
    }

    /// Update this turn's placeholder bubble, unless superseded
    async fn set_placeholder(
        &self,
        token: &CancellationToken,
        generation: u64,
        index: usize,
        text: &str,
    ) {
        if token.is_cancelled() || self.store.generation() != generation {
            return;
        }
        let mut inner = self.inner.lock().await;
        if let Some(message) = inner.conversation.get_mut(index) {
            message.content = text.to_string();
        }
    }

    /// Replace the placeholder with the agent's user-facing summary
    async fn finalize(
        &self,
        token: &CancellationToken,
        generation: u64,
        index: usize,
        run: &AgentRunResult,
    ) {
        let text = last_assistant_text(&run.transcript)
            .or_else(|| run.final_text.clone())
            .unwrap_or_else(|| DONE_FALLBACK.to_string());
        self.set_placeholder(token, generation, index, &text).await;
    }

    /// Clear the busy flag, unless a newer turn or a reset owns the session
    async fn finish_turn(&self, token: &CancellationToken) {
        let mut inner = self.inner.lock().await;
        if !token.is_cancelled() {
            inner.busy = false;
            inner.inflight = None;
        }
    }
}

fn first_tool_name(run: &AgentRunResult) -> Option<&str> {
    run.transcript.iter().find_map(|item| match item {
        crate::agent::TranscriptItem::ToolInvocation { name } => Some(name.as_str()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{ChatRole, TranscriptItem};
    use crate::geocode::{LatLon, ResolvedPlace};
    use crate::plan::PLAN_TOOL_NAME;
    use crate::routing::{Geometry, RouteFeature, RouteGeometry};
    use async_trait::async_trait;
    use tokio::sync::Notify;

    fn plan_run() -> AgentRunResult {
        let output = serde_json::json!([
            { "query": "Sacramento, CA", "label": "Sacramento", "role": "start" },
            { "query": "San Francisco, CA", "label": "San Francisco", "role": "end" }
        ])
        .to_string();
        AgentRunResult {
            transcript: vec![
                TranscriptItem::tool_invocation(PLAN_TOOL_NAME),
                TranscriptItem::tool_result(PLAN_TOOL_NAME, output),
                TranscriptItem::assistant_text("Routing you from Sacramento to San Francisco."),
            ],
            final_text: Some("Routing you from Sacramento to San Francisco.".to_string()),
        }
    }

    fn chat_run(text: &str) -> AgentRunResult {
        AgentRunResult {
            transcript: vec![TranscriptItem::assistant_text(text)],
            final_text: Some(text.to_string()),
        }
    }

    struct FixedAgent {
        run: Result<AgentRunResult, ()>,
    }

    #[async_trait]
    impl AgentClient for FixedAgent {
        async fn run(&self, _messages: &[ChatMessage]) -> Result<AgentRunResult, AgentError> {
            self.run
                .clone()
                .map_err(|_| AgentError::InvalidResponse("test failure".to_string()))
        }
    }

    /// Agent that blocks until released, for supersession tests
    struct GatedAgent {
        gate: Arc<Notify>,
        run: AgentRunResult,
    }

    #[async_trait]
    impl AgentClient for GatedAgent {
        async fn run(&self, _messages: &[ChatMessage]) -> Result<AgentRunResult, AgentError> {
            self.gate.notified().await;
            Ok(self.run.clone())
        }
    }

    struct FixedResolver {
        fail: bool,
    }

    #[async_trait]
    impl PlaceResolver for FixedResolver {
        async fn resolve(&self, query: &str) -> Result<ResolvedPlace, GeocodeError> {
            if self.fail {
                return Err(GeocodeError::NoMatch(query.to_string()));
            }
            Ok(ResolvedPlace {
                name: format!("{query}, USA"),
                coords: LatLon { lat: 38.0, lon: -121.0 },
            })
        }
    }

    /// Router that blocks until released, for supersession tests
    struct GatedRouter {
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl RouteResolver for GatedRouter {
        async fn route(
            &self,
            coords: &[LatLon],
            _mode: TravelMode,
            _avoid: &[Avoid],
        ) -> Result<RouteGeometry, RouteError> {
            self.gate.notified().await;
            Ok(RouteGeometry {
                features: vec![RouteFeature {
                    geometry: Geometry::LineString {
                        coordinates: coords.iter().map(|c| [c.lon, c.lat]).collect(),
                    },
                    properties: serde_json::Value::Null,
                }],
            })
        }
    }

    struct FixedRouter {
        fail: bool,
    }

    #[async_trait]
    impl RouteResolver for FixedRouter {
        async fn route(
            &self,
            coords: &[LatLon],
            _mode: TravelMode,
            _avoid: &[Avoid],
        ) -> Result<RouteGeometry, RouteError> {
            if self.fail {
                return Err(RouteError::Api {
                    status: 500,
                    message: "test failure".to_string(),
                });
            }
            Ok(RouteGeometry {
                features: vec![RouteFeature {
                    geometry: Geometry::LineString {
                        coordinates: coords.iter().map(|c| [c.lon, c.lat]).collect(),
                    },
                    properties: serde_json::Value::Null,
                }],
            })
        }
    }

    fn session(agent: impl AgentClient + 'static, geocode_fail: bool, route_fail: bool) -> ChatSession {
        ChatSession::new(
            Arc::new(agent),
            Arc::new(FixedResolver { fail: geocode_fail }),
            Arc::new(FixedRouter { fail: route_fail }),
            TurnOptions::default(),
        )
    }

    #[tokio::test]
    async fn test_session_starts_with_greeting() {
        let session = session(FixedAgent { run: Ok(chat_run("hi")) }, false, false);

        let conversation = session.conversation().await;
        assert_eq!(conversation.len(), 1);
        assert_eq!(conversation[0].role, ChatRole::Assistant);
        assert_eq!(conversation[0].content, GREETING);
    }

    #[tokio::test]
    async fn test_route_turn_updates_state_and_conversation() {
        let session = session(FixedAgent { run: Ok(plan_run()) }, false, false);

        let outcome = session.submit("from Sacramento to SF").await;

        assert_eq!(outcome, TurnOutcome::Completed { route_updated: true });

        let snapshot = session.snapshot();
        assert_eq!(snapshot.waypoints.len(), 2);
        assert_eq!(snapshot.waypoints[0].name, "Sacramento");
        assert!(snapshot.route.is_some());

        let conversation = session.conversation().await;
        let last = conversation.last().unwrap();
        assert_eq!(last.role, ChatRole::Assistant);
        assert_eq!(last.content, "Routing you from Sacramento to San Francisco.");
        assert!(!session.is_busy().await);
    }

    #[tokio::test]
    async fn test_conversational_turn_leaves_state_untouched() {
        let session = session(
            FixedAgent { run: Ok(chat_run("Could you tell me where you're starting from?")) },
            false,
            false,
        );

        let outcome = session.submit("plan me a trip").await;

        assert_eq!(outcome, TurnOutcome::Completed { route_updated: false });
        assert!(session.snapshot().waypoints.is_empty());

        let conversation = session.conversation().await;
        assert_eq!(
            conversation.last().unwrap().content,
            "Could you tell me where you're starting from?"
        );
    }

    #[tokio::test]
    async fn test_agent_failure_shows_error_and_clears_busy() {
        let session = session(FixedAgent { run: Err(()) }, false, false);

        let outcome = session.submit("from A to B").await;

        assert_eq!(outcome, TurnOutcome::Failed(TurnStage::Agent));
        let conversation = session.conversation().await;
        assert_eq!(conversation.last().unwrap().content, AGENT_FAILED);
        assert!(!session.is_busy().await);
    }

    #[tokio::test]
    async fn test_geocode_failure_leaves_state_unchanged() {
        let session = session(FixedAgent { run: Ok(plan_run()) }, true, false);

        let outcome = session.submit("from Sacramento to SF").await;

        assert_eq!(outcome, TurnOutcome::Failed(TurnStage::Geocode));
        assert!(session.snapshot().waypoints.is_empty());
        let conversation = session.conversation().await;
        assert_eq!(conversation.last().unwrap().content, GEOCODE_FAILED);
    }

    #[tokio::test]
    async fn test_route_failure_is_atomic() {
        let session = session(FixedAgent { run: Ok(plan_run()) }, false, true);

        let outcome = session.submit("from Sacramento to SF").await;

        assert_eq!(outcome, TurnOutcome::Failed(TurnStage::Route));
        // Geocoding succeeded but nothing is published without a route
        let snapshot = session.snapshot();
        assert!(snapshot.waypoints.is_empty());
        assert!(snapshot.route.is_none());
    }

    #[tokio::test]
    async fn test_reset_supersedes_inflight_turn() {
        let gate = Arc::new(Notify::new());
        let session = Arc::new(session(
            GatedAgent { gate: gate.clone(), run: plan_run() },
            false,
            false,
        ));

        let task = {
            let session = session.clone();
            tokio::spawn(async move { session.submit("from Sacramento to SF").await })
        };
        tokio::task::yield_now().await;

        session.reset().await;
        gate.notify_one();

        let outcome = task.await.unwrap();
        assert_eq!(outcome, TurnOutcome::Superseded);

        // Superseded turn left the cleared conversation and empty map alone
        let conversation = session.conversation().await;
        assert_eq!(conversation.len(), 1);
        assert_eq!(conversation[0].content, GREETING);
        assert!(session.snapshot().waypoints.is_empty());
        assert!(!session.is_busy().await);
    }

    #[tokio::test]
    async fn test_reset_during_routing_stage_is_superseded() {
        let gate = Arc::new(Notify::new());
        let session = Arc::new(ChatSession::new(
            Arc::new(FixedAgent { run: Ok(plan_run()) }),
            Arc::new(FixedResolver { fail: false }),
            Arc::new(GatedRouter { gate: gate.clone() }),
            TurnOptions::default(),
        ));

        let task = {
            let session = session.clone();
            tokio::spawn(async move { session.submit("from Sacramento to SF").await })
        };
        tokio::task::yield_now().await;

        // Agent and geocoding already succeeded; the reset lands while the
        // route result is pending, so nothing may be published
        session.reset().await;
        gate.notify_one();

        let outcome = task.await.unwrap();
        assert_eq!(outcome, TurnOutcome::Superseded);
        assert!(session.snapshot().waypoints.is_empty());
        assert!(session.snapshot().route.is_none());
        assert!(!session.is_busy().await);
    }

    #[tokio::test]
    async fn test_new_turn_supersedes_previous() {
        let gate = Arc::new(Notify::new());
        let session = Arc::new(session(
            GatedAgent { gate: gate.clone(), run: plan_run() },
            false,
            false,
        ));

        let first = {
            let session = session.clone();
            tokio::spawn(async move { session.submit("from Sacramento to SF").await })
        };
        tokio::task::yield_now().await;

        let second = {
            let session = session.clone();
            tokio::spawn(async move { session.submit("actually, from Davis to SF").await })
        };
        tokio::task::yield_now().await;

        // Release both agent calls
        gate.notify_one();
        gate.notify_one();

        let first_outcome = first.await.unwrap();
        let second_outcome = second.await.unwrap();

        assert_eq!(first_outcome, TurnOutcome::Superseded);
        assert_eq!(second_outcome, TurnOutcome::Completed { route_updated: true });
        assert!(!session.is_busy().await);
    }

    #[tokio::test]
    async fn test_turn_options_from_config() {
        let config = ChatConfig {
            mode: "bicycle".to_string(),
            avoid: vec!["tolls".to_string(), "ferries".to_string()],
        };

        let options = TurnOptions::from_config(&config).unwrap();
        assert_eq!(options.mode, TravelMode::Bicycle);
        assert_eq!(options.avoid, vec![Avoid::Tolls, Avoid::Ferries]);
    }

    #[tokio::test]
    async fn test_finalize_falls_back_to_done() {
        let run = AgentRunResult {
            transcript: vec![TranscriptItem::tool_invocation(PLAN_TOOL_NAME)],
            final_text: None,
        };
        let session = session(FixedAgent { run: Ok(run) }, false, false);

        session.submit("hello").await;

        let conversation = session.conversation().await;
        assert_eq!(conversation.last().unwrap().content, DONE_FALLBACK);
    }
}
