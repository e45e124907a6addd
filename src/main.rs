//! RouteCause - conversational route planner
//!
//! CLI entry point: interactive chat or one-shot route requests.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use eyre::{Context, Result};
use tracing::info;

use routecause::agent::{AgentClient, HttpAgentClient};
use routecause::chat::{ChatSession, TurnOptions, TurnOutcome};
use routecause::cli::{Cli, Command, OutputFormat};
use routecause::config::Config;
use routecause::geocode::{GeoapifyGeocoder, PlaceResolver};
use routecause::render::fit_bounds;
use routecause::repl;
use routecause::routing::{Avoid, GeoapifyRouter, RouteResolver, TravelMode};

fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("routecause")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Setup tracing subscriber - write to log file, not stdout/stderr
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let log_file = fs::File::create(log_dir.join("routecause.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (verbose: {})", verbose);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!(
        "RouteCause loaded config: agent={}, geocode={}",
        config.agent.base_url, config.geocode.base_url
    );

    match cli.command {
        Some(Command::Chat { initial }) => cmd_chat(&config, initial).await,
        Some(Command::Route {
            text,
            mode,
            avoid,
            format,
        }) => cmd_route(&config, &text, mode.as_deref(), &avoid, format).await,
        Some(Command::Config) => cmd_config(&config),
        None => cmd_chat(&config, None).await,
    }
}

/// Start the interactive chat session
async fn cmd_chat(config: &Config, initial: Option<String>) -> Result<()> {
    config.validate()?;
    repl::run_interactive(config, initial).await
}

/// Run one route request and print the resulting state
async fn cmd_route(
    config: &Config,
    text: &str,
    mode: Option<&str>,
    avoid: &[String],
    format: OutputFormat,
) -> Result<()> {
    config.validate()?;

    let mut options = TurnOptions::from_config(&config.chat).map_err(|e| eyre::eyre!("Invalid chat options: {}", e))?;
    if let Some(mode) = mode {
        options.mode = TravelMode::parse(mode).map_err(|e| eyre::eyre!("{}", e))?;
    }
    if !avoid.is_empty() {
        options.avoid = avoid
            .iter()
            .map(|s| Avoid::parse(s))
            .collect::<Result<_, _>>()
            .map_err(|e| eyre::eyre!("{}", e))?;
    }

    let agent: Arc<dyn AgentClient> = Arc::new(
        HttpAgentClient::from_config(&config.agent).map_err(|e| eyre::eyre!("Failed to create agent client: {}", e))?,
    );
    let places: Arc<dyn PlaceResolver> = Arc::new(
        GeoapifyGeocoder::from_config(&config.geocode).map_err(|e| eyre::eyre!("Failed to create geocoder: {}", e))?,
    );
    let routes: Arc<dyn RouteResolver> = Arc::new(
        GeoapifyRouter::from_config(&config.routing).map_err(|e| eyre::eyre!("Failed to create router: {}", e))?,
    );

    let session = ChatSession::new(agent, places, routes, options);
    let outcome = session.submit(text).await;

    let conversation = session.conversation().await;
    let reply = conversation.last().map(|m| m.content.clone()).unwrap_or_default();
    let snapshot = session.snapshot();

    match format {
        OutputFormat::Json => {
            let out = serde_json::json!({
                "reply": reply,
                "waypoints": snapshot.waypoints,
                "route": snapshot.route,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => {
            println!("{}", reply);
            for waypoint in &snapshot.waypoints {
                println!("  {} ({:.4}, {:.4})", waypoint.name, waypoint.coords.lat, waypoint.coords.lon);
            }
            if let Some(bounds) = fit_bounds(&snapshot.waypoints, snapshot.route.as_ref()) {
                println!(
                    "  bounds ({:.4}, {:.4}) to ({:.4}, {:.4})",
                    bounds.south, bounds.west, bounds.north, bounds.east
                );
            }
        }
    }

    if matches!(outcome, TurnOutcome::Failed(_)) {
        std::process::exit(1);
    }
    Ok(())
}

/// Print the effective configuration
fn cmd_config(config: &Config) -> Result<()> {
    let yaml = serde_yaml::to_string(config).context("Failed to serialize config")?;
    print!("{}", yaml);
    Ok(())
}
