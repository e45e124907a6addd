//! Agent invocation module
//!
//! Treats the LLM agent/tool-calling runtime as a black box behind the
//! [`AgentClient`] trait: given the conversation so far, it returns a
//! transcript plus an overall response text.

mod client;
mod error;
mod http;
mod types;

pub use client::AgentClient;
pub use error::AgentError;
pub use http::HttpAgentClient;
pub use types::{AgentRunResult, ChatMessage, ChatRole, ContentPart, TranscriptItem, TranscriptRole};
