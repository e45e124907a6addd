//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// RouteCause - conversational route planner
#[derive(Parser)]
#[command(
    name = "rca",
    about = "Conversational route planner: chat, geocode, route, map",
    version,
    after_help = "Logs are written to: ~/.local/share/routecause/logs/routecause.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Start an interactive chat session
    Chat {
        /// Initial message to send before the prompt appears
        initial: Option<String>,
    },

    /// Run one route request and print the result
    Route {
        /// What to route, in natural language (e.g. "from Sacramento to SF")
        text: String,

        /// Travel mode (drive, truck, bicycle, walk, transit)
        #[arg(short, long)]
        mode: Option<String>,

        /// Route features to avoid (highways, tolls, ferries); repeatable
        #[arg(short, long)]
        avoid: Vec<String>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the effective configuration
    Config,
}

/// Output format for one-shot commands
#[derive(Clone, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}
