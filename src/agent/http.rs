//! HTTP implementation of AgentClient
//!
//! Posts the conversation to an agent-run endpoint and validates the returned
//! history into typed transcript items. Unknown history item kinds are skipped
//! rather than failing the run: the transcript format grows over time and a
//! new item kind must not break plan extraction.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::client::AgentClient;
use super::error::AgentError;
use super::types::{AgentRunResult, ChatMessage, ChatRole, ContentPart, TranscriptItem, TranscriptRole};
use crate::config::AgentConfig;

/// Agent client talking to an external agent-run HTTP endpoint
pub struct HttpAgentClient {
    endpoint: String,
    api_key: String,
    http: Client,
}

impl HttpAgentClient {
    /// Create a new client from configuration
    ///
    /// Reads the API key from the environment variable named in config.
    pub fn from_config(config: &AgentConfig) -> Result<Self, AgentError> {
        debug!(base_url = %config.base_url, "from_config: called");
        let api_key = config.get_api_key().map_err(|e| AgentError::Config(e.to_string()))?;

        let timeout = Duration::from_millis(config.timeout_ms);
        let http = Client::builder().timeout(timeout).build().map_err(AgentError::Network)?;

        Ok(Self {
            endpoint: format!("{}/run", config.base_url.trim_end_matches('/')),
            api_key,
            http,
        })
    }

    /// Build the wire request from the conversation
    ///
    /// Only user messages are forwarded; assistant bubbles (including the
    /// in-progress placeholder) are client-side presentation.
    fn build_request_body<'a>(&self, messages: &'a [ChatMessage]) -> RunRequest<'a> {
        debug!(message_count = %messages.len(), "build_request_body: called");
        RunRequest {
            messages: messages
                .iter()
                .filter(|m| m.role == ChatRole::User)
                .map(|m| WireMessage {
                    role: "user",
                    content: &m.content,
                })
                .collect(),
        }
    }
}

#[async_trait]
impl AgentClient for HttpAgentClient {
    async fn run(&self, messages: &[ChatMessage]) -> Result<AgentRunResult, AgentError> {
        debug!(message_count = %messages.len(), "run: called");
        let body = self.build_request_body(messages);

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            debug!(status = %status, "run: API error");
            let text = response.text().await.unwrap_or_default();
            return Err(AgentError::ApiError {
                status: status.as_u16(),
                message: text,
            });
        }

        let text = response.text().await?;
        let wire: RunResponse =
            serde_json::from_str(&text).map_err(|e| AgentError::InvalidResponse(e.to_string()))?;

        debug!(history_len = %wire.history.len(), "run: success");
        Ok(AgentRunResult {
            transcript: convert_history(wire.history),
            final_text: wire.response.filter(|s| !s.trim().is_empty()),
        })
    }
}

/// Convert validated wire history items into transcript items
///
/// Items with an unknown kind or an unrecognized role are dropped.
fn convert_history(items: Vec<WireHistoryItem>) -> Vec<TranscriptItem> {
    debug!(item_count = %items.len(), "convert_history: called");
    items
        .into_iter()
        .filter_map(|item| match item {
            WireHistoryItem::Message { role, content } => {
                let role = match role.as_str() {
                    "user" => TranscriptRole::User,
                    "assistant" => TranscriptRole::Assistant,
                    "system" => TranscriptRole::System,
                    other => {
                        debug!(role = %other, "convert_history: unknown message role, skipping");
                        return None;
                    }
                };
                let parts = match content {
                    Some(WireContent::Text(text)) => vec![ContentPart::Text(text)],
                    Some(WireContent::Parts(parts)) => parts.into_iter().map(convert_part).collect(),
                    None => Vec::new(),
                };
                Some(TranscriptItem::Message { role, parts })
            }
            WireHistoryItem::FunctionCall { name } => Some(TranscriptItem::ToolInvocation { name }),
            WireHistoryItem::FunctionCallResult { name, output } => Some(TranscriptItem::ToolResult {
                name,
                output: output.and_then(|o| if o.kind == "text" { o.text } else { None }),
            }),
            WireHistoryItem::Unknown => {
                debug!("convert_history: unknown item kind, skipping");
                None
            }
        })
        .collect()
}

fn convert_part(part: WirePart) -> ContentPart {
    match (part.kind.as_str(), part.text) {
        ("output_text" | "input_text", Some(text)) => ContentPart::Text(text),
        _ => ContentPart::Other,
    }
}

// Agent-run wire types

#[derive(Serialize)]
struct RunRequest<'a> {
    messages: Vec<WireMessage<'a>>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct RunResponse {
    #[serde(default)]
    history: Vec<WireHistoryItem>,
    response: Option<String>,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum WireHistoryItem {
    #[serde(rename = "message")]
    Message {
        role: String,
        #[serde(default)]
        content: Option<WireContent>,
    },

    #[serde(rename = "function_call")]
    FunctionCall { name: String },

    #[serde(rename = "function_call_result")]
    FunctionCallResult { name: String, output: Option<WireOutput> },

    #[serde(other)]
    Unknown,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireContent {
    Text(String),
    Parts(Vec<WirePart>),
}

#[derive(Deserialize)]
struct WirePart {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[derive(Deserialize)]
struct WireOutput {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_history_message_with_string_content() {
        let json = r#"{
            "history": [
                { "type": "message", "role": "assistant", "content": "Where to?" }
            ],
            "response": "Where to?"
        }"#;

        let wire: RunResponse = serde_json::from_str(json).unwrap();
        let transcript = convert_history(wire.history);

        assert_eq!(transcript.len(), 1);
        match &transcript[0] {
            TranscriptItem::Message { role, parts } => {
                assert_eq!(*role, TranscriptRole::Assistant);
                assert_eq!(parts, &vec![ContentPart::Text("Where to?".to_string())]);
            }
            _ => panic!("Expected Message"),
        }
    }

    #[test]
    fn test_convert_history_message_with_parts() {
        let json = r#"{
            "history": [
                {
                    "type": "message",
                    "role": "assistant",
                    "content": [
                        { "type": "output_text", "text": "Here is your route." },
                        { "type": "refusal" }
                    ]
                }
            ]
        }"#;

        let wire: RunResponse = serde_json::from_str(json).unwrap();
        let transcript = convert_history(wire.history);

        match &transcript[0] {
            TranscriptItem::Message { parts, .. } => {
                assert_eq!(parts.len(), 2);
                assert_eq!(parts[0], ContentPart::Text("Here is your route.".to_string()));
                assert_eq!(parts[1], ContentPart::Other);
            }
            _ => panic!("Expected Message"),
        }
    }

    #[test]
    fn test_convert_history_tool_items() {
        let json = r#"{
            "history": [
                { "type": "function_call", "name": "submit_route_plan" },
                {
                    "type": "function_call_result",
                    "name": "submit_route_plan",
                    "output": { "type": "text", "text": "[]" }
                }
            ]
        }"#;

        let wire: RunResponse = serde_json::from_str(json).unwrap();
        let transcript = convert_history(wire.history);

        assert_eq!(transcript.len(), 2);
        assert!(matches!(
            &transcript[0],
            TranscriptItem::ToolInvocation { name } if name == "submit_route_plan"
        ));
        match &transcript[1] {
            TranscriptItem::ToolResult { name, output } => {
                assert_eq!(name, "submit_route_plan");
                assert_eq!(output.as_deref(), Some("[]"));
            }
            _ => panic!("Expected ToolResult"),
        }
    }

    #[test]
    fn test_convert_history_skips_unknown_item_kinds() {
        let json = r#"{
            "history": [
                { "type": "reasoning", "content": "thinking hard" },
                { "type": "message", "role": "assistant", "content": "Done." }
            ]
        }"#;

        let wire: RunResponse = serde_json::from_str(json).unwrap();
        let transcript = convert_history(wire.history);

        assert_eq!(transcript.len(), 1);
        assert!(matches!(&transcript[0], TranscriptItem::Message { .. }));
    }

    #[test]
    fn test_convert_history_non_text_tool_output_dropped() {
        let json = r#"{
            "history": [
                {
                    "type": "function_call_result",
                    "name": "submit_route_plan",
                    "output": { "type": "image", "text": "ignored" }
                }
            ]
        }"#;

        let wire: RunResponse = serde_json::from_str(json).unwrap();
        let transcript = convert_history(wire.history);

        match &transcript[0] {
            TranscriptItem::ToolResult { output, .. } => assert!(output.is_none()),
            _ => panic!("Expected ToolResult"),
        }
    }

    #[test]
    fn test_build_request_body_filters_to_user_messages() {
        let client = HttpAgentClient {
            endpoint: "http://localhost/run".to_string(),
            api_key: "test-key".to_string(),
            http: Client::new(),
        };

        let messages = vec![
            ChatMessage::assistant("Tell me where you want to go."),
            ChatMessage::user("from Sacramento to SF"),
            ChatMessage::assistant("Thinking…"),
        ];

        let body = client.build_request_body(&messages);
        assert_eq!(body.messages.len(), 1);
        assert_eq!(body.messages[0].content, "from Sacramento to SF");

        // The body borrows from the conversation, not from the client
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "from Sacramento to SF");
    }
}
