//! Conversational route-planning session
//!
//! [`ChatSession`] owns the conversation, drives one turn through the agent,
//! plan extraction, geocoding, and routing stages, and publishes the result
//! to the shared route state. A newer turn or a session reset supersedes any
//! in-flight turn; superseded turns never touch the conversation or the map.

mod session;

pub use session::{ChatSession, TurnOptions, TurnOutcome, TurnStage, GREETING};
