//! Error types for the coscientist domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; `Error` is the top-level
//! union the agent loop returns to callers.

use thiserror::Error;

/// The top-level error type for all coscientist operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Model client errors (terminal for the current run) ---
    #[error("Model client error: {0}")]
    Client(#[from] ClientError),

    // --- Tool errors that escape the dispatch path ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Transport/upstream failures from the model client.
///
/// Implementations retry transient cases (rate limits, 5xx, network) with
/// bounded backoff before returning; anything surfaced here is terminal for
/// the step that triggered it.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("API request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Rate limited by upstream, retries exhausted")]
    RateLimited,

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed upstream response: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    /// Registration-time collision. Fatal at startup wiring, never silently
    /// ignored.
    #[error("Tool already registered: {0}")]
    Duplicate(String),

    #[error("Unknown tool: {0}")]
    Unknown(String),

    #[error("Invalid schema for tool {tool_name}: {reason}")]
    InvalidSchema { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool execution failed: {tool_name} — {reason}")]
    Execution { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },
}
