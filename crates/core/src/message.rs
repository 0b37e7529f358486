//! Message and Transcript domain types.
//!
//! The transcript is the full ordered conversation state for one agent run:
//! system instructions, the user task, assistant turns (possibly carrying
//! tool-call requests), and one tool message per request. Transcript order is
//! the only ordering guarantee the loop relies on.

use serde::{Deserialize, Serialize};

/// The role of a message sender in a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Fixed orchestration instructions
    System,
    /// The task submitter
    User,
    /// The model
    Assistant,
    /// A tool invocation result
    Tool,
}

/// A model-issued request to invoke a registered tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Invocation ID, opaque and unique within the turn (matches the
    /// upstream tool_call.id)
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as a raw JSON document; parsed and validated at dispatch
    pub arguments: String,
}

/// A single message in a transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Who produced this message
    pub role: Role,

    /// The text content (may be empty on a tool-calling assistant turn)
    pub content: String,

    /// Tool calls requested by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,

    /// If this is a tool result, which invocation it answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Create an assistant message without tool calls.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Create an assistant message recording the tool calls it requested.
    pub fn assistant_with_calls(
        content: impl Into<String>,
        tool_calls: Vec<ToolCallRequest>,
    ) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls,
            tool_call_id: None,
        }
    }

    /// Create a tool result message answering one invocation.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// The append-only conversation state for one agent run.
///
/// Owned exclusively by the run that created it; never shared across
/// concurrent tasks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    /// Create an empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a transcript with the orchestration system prompt and the task.
    pub fn seeded(system_prompt: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(system_prompt), Message::user(task)],
        }
    }

    /// Append a message. The transcript never reorders or removes entries.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// The ordered messages.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
