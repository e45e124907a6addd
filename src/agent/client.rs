//! AgentClient trait - the seam between the orchestrator and the agent runtime

use async_trait::async_trait;

use super::error::AgentError;
use super::types::{AgentRunResult, ChatMessage};

/// Client for the external conversational agent
///
/// The agent runtime (model, tool loop, prompts) is a black box: given the
/// full conversation so far, it returns a transcript that may contain a
/// structured plan-submission tool result, plus an overall response text.
#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Run one agent turn over the full conversation
    ///
    /// Fails the whole call on transport errors or non-success status.
    async fn run(&self, messages: &[ChatMessage]) -> Result<AgentRunResult, AgentError>;
}
