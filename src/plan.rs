//! Plan extraction from agent transcripts
//!
//! The agent signals a completed route plan by calling the
//! `submit_route_plan` tool; its result output is a JSON array of waypoints.
//! Extraction fails open: malformed tool output is treated as "no plan" so a
//! bad transcript degrades to showing the agent's text response instead of
//! failing the turn.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::agent::{ContentPart, TranscriptItem, TranscriptRole};

/// Name of the plan-submission tool the agent is instructed to call
pub const PLAN_TOOL_NAME: &str = "submit_route_plan";

/// Maximum length of a waypoint display label
pub const MAX_LABEL_CHARS: usize = 25;

/// Minimum number of waypoints in a usable plan
pub const MIN_PLAN_WAYPOINTS: usize = 2;

/// Structural role of a waypoint within a plan
///
/// Convention is one `start` first and one `end` last, but the extractor does
/// not enforce ordering by role; waypoints are consumed positionally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaypointRole {
    Start,
    Via,
    End,
}

/// A waypoint as submitted by the agent: a geocodable query plus a short label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanWaypoint {
    /// Normalized, geocodable place text (e.g. "San Jose, CA")
    pub query: String,

    /// Concise human-readable label, at most [`MAX_LABEL_CHARS`] characters
    pub label: String,

    /// Structural role of this stop
    pub role: WaypointRole,
}

/// Extract a validated route plan from a transcript
///
/// Scans in transcript order for a result of the plan-submission tool whose
/// output parses as an array of at least two well-formed waypoints. Returns
/// the first valid plan found, or `None`. Never an error.
pub fn extract_plan(transcript: &[TranscriptItem]) -> Option<Vec<PlanWaypoint>> {
    debug!(item_count = %transcript.len(), "extract_plan: called");
    for item in transcript {
        if let TranscriptItem::ToolResult {
            name,
            output: Some(output),
        } = item
            && name == PLAN_TOOL_NAME
        {
            if let Some(plan) = parse_plan(output) {
                debug!(waypoint_count = %plan.len(), "extract_plan: found valid plan");
                return Some(plan);
            }
            debug!("extract_plan: tool result failed validation, continuing scan");
        }
    }
    debug!("extract_plan: no plan found");
    None
}

/// Parse and validate one tool output as a plan
fn parse_plan(output: &str) -> Option<Vec<PlanWaypoint>> {
    let waypoints: Vec<PlanWaypoint> = serde_json::from_str(output).ok()?;

    if waypoints.len() < MIN_PLAN_WAYPOINTS {
        return None;
    }
    for waypoint in &waypoints {
        if waypoint.query.trim().is_empty() {
            return None;
        }
        if waypoint.label.chars().count() > MAX_LABEL_CHARS {
            return None;
        }
    }

    Some(waypoints)
}

/// Get the most recent assistant text from a transcript
///
/// Scans in reverse for the last assistant message and joins its text-bearing
/// parts. Returns `None` if the trimmed result is empty. This is the
/// user-facing fallback summary when no plan is present.
pub fn last_assistant_text(transcript: &[TranscriptItem]) -> Option<String> {
    debug!(item_count = %transcript.len(), "last_assistant_text: called");
    for item in transcript.iter().rev() {
        if let TranscriptItem::Message {
            role: TranscriptRole::Assistant,
            parts,
        } = item
        {
            let text = parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text(text) => Some(text.as_str()),
                    ContentPart::Other => None,
                })
                .collect::<Vec<_>>()
                .join("\n");

            let trimmed = text.trim();
            return if trimmed.is_empty() {
                debug!("last_assistant_text: last assistant message is empty");
                None
            } else {
                Some(trimmed.to_string())
            };
        }
    }
    None
}
