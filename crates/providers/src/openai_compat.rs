//! OpenAI-compatible model client.
//!
//! Works with the internal LLM gateway and any endpoint exposing a
//! `/chat/completions` route (vLLM, Ollama, OpenRouter, ...).
//!
//! Retry discipline: 429, 5xx, and network errors are retried in-place with
//! bounded exponential backoff. 4xx client errors and malformed bodies are
//! surfaced immediately. Whatever comes back to the agent loop is final for
//! that step.

use std::time::Duration;

use async_trait::async_trait;
use coscientist_core::client::{ModelClient, ToolChoice, ToolDefinition, Turn, TurnOptions};
use coscientist_core::error::ClientError;
use coscientist_core::message::{Message, Role, ToolCallRequest};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const MAX_ATTEMPTS: u32 = 3;
const BASE_BACKOFF_MS: u64 = 500;

/// A model client for OpenAI-compatible chat-completions endpoints.
pub struct OpenAiCompatClient {
    base_url: String,
    api_key: Option<String>,
    model: String,
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    /// Create a new client. `base_url` should include the `/v1` prefix.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
            client,
        })
    }

    /// Build a client from the loaded app config.
    pub fn from_config(config: &coscientist_config::LlmConfig) -> Result<Self, ClientError> {
        Self::new(
            config.base_url.clone(),
            config.api_key.clone(),
            config.model.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Convert domain messages to the wire format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: match m.role {
                    Role::System => "system".into(),
                    Role::User => "user".into(),
                    Role::Assistant => "assistant".into(),
                    Role::Tool => "tool".into(),
                },
                content: Some(m.content.clone()),
                tool_calls: if m.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        m.tool_calls
                            .iter()
                            .map(|tc| ApiToolCall {
                                id: tc.id.clone(),
                                r#type: "function".into(),
                                function: ApiFunction {
                                    name: tc.name.clone(),
                                    arguments: tc.arguments.clone(),
                                },
                            })
                            .collect(),
                    )
                },
                tool_call_id: m.tool_call_id.clone(),
            })
            .collect()
    }

    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    /// One request attempt. Errors are classified so the retry loop can tell
    /// transient failures from permanent ones.
    async fn attempt(&self, body: &serde_json::Value) -> Result<Turn, ClientError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ClientError::Timeout(e.to_string())
            } else {
                ClientError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(ClientError::RateLimited);
        }
        if status == 401 || status == 403 {
            return Err(ClientError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Model backend returned error");
            return Err(ClientError::Api {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Malformed(format!("failed to parse response: {e}")))?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::Malformed("no choices in response".into()))?;

        let calls: Vec<ToolCallRequest> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCallRequest {
                id: tc.id,
                name: tc.function.name,
                arguments: tc.function.arguments,
            })
            .collect();

        Ok(Turn::from_parts(choice.message.content, calls))
    }

    fn is_transient(error: &ClientError) -> bool {
        match error {
            ClientError::RateLimited | ClientError::Timeout(_) | ClientError::Network(_) => true,
            ClientError::Api { status_code, .. } => *status_code >= 500,
            _ => false,
        }
    }
}

#[async_trait]
impl ModelClient for OpenAiCompatClient {
    fn name(&self) -> &str {
        "openai_compat"
    }

    async fn next_turn(
        &self,
        transcript: &[Message],
        tools: &[ToolDefinition],
        options: &TurnOptions,
    ) -> Result<Turn, ClientError> {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": Self::to_api_messages(transcript),
            "temperature": options.temperature,
            "stream": false,
        });

        if let Some(max_tokens) = options.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !tools.is_empty() && options.tool_choice != ToolChoice::None {
            body["tools"] = serde_json::json!(Self::to_api_tools(tools));
            body["tool_choice"] = match options.tool_choice {
                ToolChoice::Auto => serde_json::json!("auto"),
                ToolChoice::Required => serde_json::json!("required"),
                ToolChoice::None => unreachable!(),
            };
        }

        let mut last_error = None;
        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                let backoff = Duration::from_millis(BASE_BACKOFF_MS * (1 << (attempt - 1)));
                debug!(attempt, backoff_ms = backoff.as_millis() as u64, "Retrying model request");
                tokio::time::sleep(backoff).await;
            }

            debug!(model = %self.model, messages = transcript.len(), "Sending completion request");
            match self.attempt(&body).await {
                Ok(turn) => return Ok(turn),
                Err(e) if Self::is_transient(&e) => {
                    warn!(attempt, error = %e, "Transient model backend failure");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or(ClientError::Network("retries exhausted".into())))
    }
}

// --- Wire types (OpenAI chat-completions shape) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ApiToolCall>>,
}
