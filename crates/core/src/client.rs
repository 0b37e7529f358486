//! ModelClient trait — the consumed interface over the model-serving backend.
//!
//! The agent loop calls `next_turn` with the current transcript and the tool
//! catalog and gets back exactly one of a closed set of turn shapes. The loop
//! never branches on raw upstream payloads; the client is responsible for
//! normalizing them into [`Turn`] and for retrying transient transport
//! failures (rate limits, timeouts, malformed bodies) with bounded backoff
//! before returning. Any error surfaced past that point is terminal for the
//! step.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::message::{Message, ToolCallRequest};

/// A tool catalog entry sent to the model so it knows what it can call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// How the model is allowed to use tools for one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    /// The model decides freely
    Auto,
    /// The model must call a tool
    Required,
    /// Tool use disabled for this turn
    None,
}

/// Sampling options for one model turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnOptions {
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub tool_choice: ToolChoice,
}

impl Default for TurnOptions {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: Some(512),
            tool_choice: ToolChoice::Auto,
        }
    }
}

/// One model response, normalized into a closed set of variants so the
/// loop's branching is exhaustive.
#[derive(Debug, Clone, PartialEq)]
pub enum Turn {
    /// A final answer with non-empty text
    Final { text: String },

    /// One or more tool invocation requests, possibly with partial text.
    /// The loop preserves the text in the transcript but does not treat it
    /// as the answer.
    ToolCalls {
        text: Option<String>,
        calls: Vec<ToolCallRequest>,
    },

    /// A degenerate turn: no tool calls and empty text. The loop must still
    /// count it against the step budget.
    Empty,
}

impl Turn {
    /// Normalize raw content + calls into the right variant.
    ///
    /// Guards the loop against upstream responses that are technically valid
    /// but carry nothing: whitespace-only text with no calls becomes
    /// [`Turn::Empty`].
    pub fn from_parts(content: Option<String>, calls: Vec<ToolCallRequest>) -> Self {
        if !calls.is_empty() {
            return Turn::ToolCalls {
                text: content.filter(|c| !c.trim().is_empty()),
                calls,
            };
        }
        match content {
            Some(text) if !text.trim().is_empty() => Turn::Final { text },
            _ => Turn::Empty,
        }
    }
}

/// The narrow interface the agent loop requires of the model backend.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// A human-readable name for this client (e.g., "openai_compat").
    fn name(&self) -> &str;

    /// Request the next model turn for the given transcript and catalog.
    async fn next_turn(
        &self,
        transcript: &[Message],
        tools: &[ToolDefinition],
        options: &TurnOptions,
    ) -> std::result::Result<Turn, ClientError>;
}
