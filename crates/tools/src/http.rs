//! Shared HTTP plumbing for tool adapters.
//!
//! Every adapter is one JSON POST to a sibling service. The client carries
//! the connection config fixed at construction (base URL, optional bearer
//! key, timeout) and performs at most one retry on a transport error before
//! surfacing the failure. Longer retry policies belong to the model-client
//! layer, not here, so the loop's step accounting stays meaningful.

use std::time::Duration;

use coscientist_core::error::ToolError;
use tracing::{debug, warn};

pub(crate) struct ServiceClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl ServiceClient {
    pub(crate) fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ToolError::Execution {
                tool_name: "http".into(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    /// POST a JSON payload to `path`, returning the parsed JSON body.
    ///
    /// One retry on connect/timeout errors; HTTP error statuses are not
    /// retried (the model should see them and adjust).
    pub(crate) async fn post_json(
        &self,
        tool_name: &str,
        path: &str,
        payload: &serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        let url = format!("{}{}", self.base_url, path);

        let mut last_transport = None;
        for attempt in 0..2 {
            let mut request = self.client.post(&url).json(payload);
            if let Some(key) = &self.api_key {
                request = request.header("Authorization", format!("Bearer {key}"));
            }

            debug!(tool = tool_name, %url, attempt, "Calling sibling service");
            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.map_err(|e| ToolError::Execution {
                        tool_name: tool_name.into(),
                        reason: format!("failed to read response body: {e}"),
                    })?;

                    if !status.is_success() {
                        return Err(ToolError::Execution {
                            tool_name: tool_name.into(),
                            reason: format!("upstream returned {status}: {body}"),
                        });
                    }

                    return serde_json::from_str(&body).map_err(|e| ToolError::Execution {
                        tool_name: tool_name.into(),
                        reason: format!("upstream returned non-JSON body: {e}"),
                    });
                }
                Err(e) if e.is_connect() || e.is_timeout() => {
                    warn!(tool = tool_name, attempt, error = %e, "Transport error calling sibling service");
                    last_transport = Some(e);
                }
                Err(e) => {
                    return Err(ToolError::Execution {
                        tool_name: tool_name.into(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        Err(ToolError::Execution {
            tool_name: tool_name.into(),
            reason: last_transport
                .map(|e| e.to_string())
                .unwrap_or_else(|| "transport retries exhausted".into()),
        })
    }
}
