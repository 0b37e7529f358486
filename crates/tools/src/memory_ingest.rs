//! Memory ingest tool — writes a research note into the knowledge-graph
//! memory service via `POST {base_url}/paper/notes`.

use std::time::Duration;

use async_trait::async_trait;
use coscientist_core::error::ToolError;
use coscientist_core::tool::Tool;

use crate::http::ServiceClient;

pub struct MemoryIngestNoteTool {
    service: ServiceClient,
}

impl MemoryIngestNoteTool {
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
impl Tool for MemoryIngestNoteTool {
    fn name(&self) -> &str {
        "memory_ingest_note"
    }

    fn description(&self) -> &str {
        "Store a research note about a paper in the knowledge-graph memory. \
         Returns the episode id of the stored note."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "paper_id": {
                    "type": "string",
                    "description": "Identifier of the paper the note is about"
                },
                "note": {
                    "type": "string",
                    "description": "The note text to store"
                }
            },
            "required": ["paper_id", "note"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        self.service
            .post_json(self.name(), "/paper/notes", &arguments)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definition_shape() {
        let tool =
            MemoryIngestNoteTool::new("http://localhost:8003", None, Duration::from_secs(5))
                .unwrap();
        let def = tool.to_definition();
        assert_eq!(def.name, "memory_ingest_note");
        assert_eq!(def.parameters["required"][1], "note");
    }
}
