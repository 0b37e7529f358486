//! OCR extraction tool — adapter over the OCR sibling service.
//!
//! Sends a base64-encoded PDF to `POST {base_url}/extract/ocr` and returns
//! the service's JSON body (sections, tables, page count) unchanged.

use std::time::Duration;

use async_trait::async_trait;
use coscientist_core::error::ToolError;
use coscientist_core::tool::Tool;

use crate::http::ServiceClient;

pub struct OcrExtractTool {
    service: ServiceClient,
}

impl OcrExtractTool {
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
impl Tool for OcrExtractTool {
    fn name(&self) -> &str {
        "ocr_extract"
    }

    fn description(&self) -> &str {
        "Extract text from a base64-encoded PDF document using the OCR service."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "doc_id": {
                    "type": "string",
                    "description": "Document identifier"
                },
                "content_b64": {
                    "type": "string",
                    "description": "Base64-encoded PDF bytes"
                }
            },
            "required": ["doc_id", "content_b64"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        self.service
            .post_json(self.name(), "/extract/ocr", &arguments)
            .await
    }
}
