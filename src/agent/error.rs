//! Agent invocation error types

use thiserror::Error;

/// Errors that can occur when invoking the external agent
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Agent API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid agent response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
