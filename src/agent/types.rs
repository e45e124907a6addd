//! Conversation and transcript types
//!
//! These model the external agent runtime's history format but are
//! provider-agnostic: the orchestrator only ever sees the typed forms.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Role of a message in the user-facing conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// A message in the user-facing conversation
///
/// Append-only within a turn; the whole list is cleared on reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    /// Create a user message
    pub fn user(text: impl Into<String>) -> Self {
        debug!("ChatMessage::user: called");
        Self {
            role: ChatRole::User,
            content: text.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(text: impl Into<String>) -> Self {
        debug!("ChatMessage::assistant: called");
        Self {
            role: ChatRole::Assistant,
            content: text.into(),
        }
    }
}

/// Role of a message item inside an agent transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptRole {
    User,
    Assistant,
    System,
}

/// One content part of a transcript message
///
/// Only text-bearing parts matter downstream; everything else is kept as
/// `Other` so part counts survive the conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ContentPart {
    Text(String),
    Other,
}

/// One item of an agent run transcript
///
/// Read-only input to the plan extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TranscriptItem {
    /// A conversational message produced during the run
    Message {
        role: TranscriptRole,
        parts: Vec<ContentPart>,
    },

    /// The agent invoked a tool
    ToolInvocation { name: String },

    /// A tool produced output
    ToolResult { name: String, output: Option<String> },
}

impl TranscriptItem {
    /// Create an assistant message with a single text part
    pub fn assistant_text(text: impl Into<String>) -> Self {
        TranscriptItem::Message {
            role: TranscriptRole::Assistant,
            parts: vec![ContentPart::Text(text.into())],
        }
    }

    /// Create a user message with a single text part
    pub fn user_text(text: impl Into<String>) -> Self {
        TranscriptItem::Message {
            role: TranscriptRole::User,
            parts: vec![ContentPart::Text(text.into())],
        }
    }

    /// Create a tool invocation item
    pub fn tool_invocation(name: impl Into<String>) -> Self {
        TranscriptItem::ToolInvocation { name: name.into() }
    }

    /// Create a tool result item with text output
    pub fn tool_result(name: impl Into<String>, output: impl Into<String>) -> Self {
        TranscriptItem::ToolResult {
            name: name.into(),
            output: Some(output.into()),
        }
    }
}

/// Result of one agent run
#[derive(Debug, Clone, Default)]
pub struct AgentRunResult {
    /// Ordered transcript of everything the run produced
    pub transcript: Vec<TranscriptItem>,

    /// The agent's overall response text, if any
    pub final_text: Option<String>,
}
