//! Interactive REPL for RouteCause
//!
//! Provides a chat loop over the route-planning session with slash commands
//! and a text map view of the current route state.

mod session;

pub use session::ReplSession;

use std::sync::Arc;

use eyre::Result;

use crate::agent::{AgentClient, HttpAgentClient};
use crate::chat::{ChatSession, TurnOptions};
use crate::config::Config;
use crate::geocode::{GeoapifyGeocoder, PlaceResolver};
use crate::routing::{GeoapifyRouter, RouteResolver};

/// Run the interactive REPL
///
/// This is the main entry point for `rca chat`.
pub async fn run_interactive(config: &Config, initial: Option<String>) -> Result<()> {
    let agent: Arc<dyn AgentClient> = Arc::new(
        HttpAgentClient::from_config(&config.agent)
            .map_err(|e| eyre::eyre!("Failed to create agent client: {}", e))?,
    );
    let places: Arc<dyn PlaceResolver> = Arc::new(
        GeoapifyGeocoder::from_config(&config.geocode)
            .map_err(|e| eyre::eyre!("Failed to create geocoder: {}", e))?,
    );
    let routes: Arc<dyn RouteResolver> = Arc::new(
        GeoapifyRouter::from_config(&config.routing)
            .map_err(|e| eyre::eyre!("Failed to create router: {}", e))?,
    );
    let options =
        TurnOptions::from_config(&config.chat).map_err(|e| eyre::eyre!("Invalid chat options: {}", e))?;

    let chat = Arc::new(ChatSession::new(agent, places, routes, options));

    let mut session = ReplSession::new(chat);
    session.run(initial).await
}
