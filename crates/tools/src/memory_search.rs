//! Memory search tool — adapter over the knowledge-graph memory service.
//!
//! Queries `POST {base_url}/concepts/search` and returns the list of memory
//! facts as JSON.

use std::time::Duration;

use async_trait::async_trait;
use coscientist_core::error::ToolError;
use coscientist_core::tool::Tool;

use crate::http::ServiceClient;

pub struct MemorySearchTool {
    service: ServiceClient,
}

impl MemorySearchTool {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ToolError> {
        Ok(Self {
            service: ServiceClient::new(base_url, api_key, timeout)?,
        })
    }
}

#[async_trait]
impl Tool for MemorySearchTool {
    fn name(&self) -> &str {
        "memory_search"
    }

    fn description(&self) -> &str {
        "Search the knowledge-graph memory for facts about a concept. \
         Returns a list of matching facts with their sources."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Concept or free-text query"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of facts to return (default 10)",
                    "default": 10
                }
            },
            "required": ["query"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        self.service
            .post_json(self.name(), "/concepts/search", &arguments)
            .await
    }
}
