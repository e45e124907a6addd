//! RouteCause configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main RouteCause configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// External agent endpoint configuration
    pub agent: AgentConfig,

    /// Geocoding provider configuration
    pub geocode: GeocodeConfig,

    /// Routing provider configuration
    pub routing: RoutingConfig,

    /// Chat session defaults
    pub chat: ChatConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Checks that required environment variables are set and that the chat
    /// defaults parse. Call this early in startup to fail fast with clear
    /// error messages.
    pub fn validate(&self) -> Result<()> {
        if std::env::var(&self.agent.api_key_env).is_err() {
            return Err(eyre::eyre!(
                "Agent API key not found. Set the {} environment variable.",
                self.agent.api_key_env
            ));
        }
        if std::env::var(&self.geocode.api_key_env).is_err() {
            return Err(eyre::eyre!(
                "Geocoding API key not found. Set the {} environment variable.",
                self.geocode.api_key_env
            ));
        }
        if std::env::var(&self.routing.api_key_env).is_err() {
            return Err(eyre::eyre!(
                "Routing API key not found. Set the {} environment variable.",
                self.routing.api_key_env
            ));
        }

        crate::routing::TravelMode::parse(&self.chat.mode)
            .map_err(|e| eyre::eyre!("Invalid chat.mode: {}", e))?;
        for flag in &self.chat.avoid {
            crate::routing::Avoid::parse(flag).map_err(|e| eyre::eyre!("Invalid chat.avoid entry: {}", e))?;
        }

        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .routecause.yml
        let local_config = PathBuf::from(".routecause.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/routecause/routecause.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("routecause").join("routecause.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// External agent endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Agent-run endpoint base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8787/api/agent".to_string(),
            api_key_env: "ROUTE_AGENT_API_KEY".to_string(),
            timeout_ms: 60_000,
        }
    }
}

impl AgentConfig {
    /// Read the API key from the configured environment variable
    pub fn get_api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env)
            .map_err(|_| eyre::eyre!("Environment variable {} is not set", self.api_key_env))
    }
}

/// Geocoding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodeConfig {
    /// Provider API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// Result language
    pub lang: String,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for GeocodeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.geoapify.com".to_string(),
            api_key_env: "GEOAPIFY_API_KEY".to_string(),
            lang: "en".to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl GeocodeConfig {
    /// Read the API key from the configured environment variable
    pub fn get_api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env)
            .map_err(|_| eyre::eyre!("Environment variable {} is not set", self.api_key_env))
    }
}

/// Routing provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Provider API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.geoapify.com".to_string(),
            api_key_env: "GEOAPIFY_API_KEY".to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl RoutingConfig {
    /// Read the API key from the configured environment variable
    pub fn get_api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env)
            .map_err(|_| eyre::eyre!("Environment variable {} is not set", self.api_key_env))
    }
}

/// Chat session defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Travel mode for routing requests
    pub mode: String,

    /// Route features to avoid (highways, tolls, ferries)
    pub avoid: Vec<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            mode: "drive".to_string(),
            avoid: Vec::new(),
        }
    }
}
