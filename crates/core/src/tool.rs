//! Tool trait and registry — the catalog of agent capabilities.
//!
//! Tools are what let the model act on the outside world: extract text from a
//! document via the OCR service, query the knowledge-graph memory, and so on.
//! The registry is wired once at startup and read concurrently by every
//! in-flight run afterwards.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::client::ToolDefinition;
use crate::error::ToolError;

/// The core Tool trait.
///
/// Each adapter (ocr_extract, memory_search, ...) implements this trait and is
/// registered in the [`ToolRegistry`]. Adapters are stateless with respect to
/// the conversation; endpoint, credentials, and timeout are fixed at
/// construction.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "ocr_extract").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with already-validated arguments.
    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> std::result::Result<serde_json::Value, ToolError>;

    /// Convert this tool into a ToolDefinition for the model-facing catalog.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

struct RegisteredTool {
    tool: Box<dyn Tool>,
    schema: jsonschema::Validator,
}

/// A registry of available tools.
///
/// The agent loop uses this to:
/// 1. Build the tool catalog sent to the model every turn
/// 2. Look up, validate, and execute tool calls the model requests
///
/// Registration happens once during startup wiring (single writer); after
/// that the registry is shared immutably, so concurrent dispatch needs no
/// locking. Listing order is registration order.
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a tool.
    ///
    /// Fails with [`ToolError::Duplicate`] if a tool with the same name is
    /// already registered, leaving the registry unchanged. A parameter schema
    /// that is not valid JSON Schema is rejected here rather than at first
    /// dispatch.
    pub fn register(&mut self, tool: Box<dyn Tool>) -> std::result::Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            return Err(ToolError::Duplicate(name));
        }

        let schema_doc = tool.parameters_schema();
        let schema = jsonschema::validator_for(&schema_doc).map_err(|e| ToolError::InvalidSchema {
            tool_name: name.clone(),
            reason: e.to_string(),
        })?;

        tracing::info!(tool = %name, "Registered tool");
        self.index.insert(name, self.tools.len());
        self.tools.push(RegisteredTool { tool, schema });
        Ok(())
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.index.get(name).map(|&i| self.tools[i].tool.as_ref())
    }

    /// All tool definitions in registration order (the model-facing catalog).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|r| r.tool.to_definition()).collect()
    }

    /// All registered tool names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|r| r.tool.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Dispatch a tool call.
    ///
    /// Resolves `name`, parses `raw_arguments` as JSON, validates it against
    /// the tool's declared schema, and invokes the handler. Handler failures
    /// are tagged with the tool name so callers can tell transport/tool
    /// errors apart from orchestration errors.
    pub async fn dispatch(
        &self,
        name: &str,
        raw_arguments: &str,
    ) -> std::result::Result<serde_json::Value, ToolError> {
        let registered = self
            .index
            .get(name)
            .map(|&i| &self.tools[i])
            .ok_or_else(|| ToolError::Unknown(name.to_string()))?;

        let arguments: serde_json::Value = serde_json::from_str(raw_arguments)
            .map_err(|e| ToolError::InvalidArguments(format!("not valid JSON: {e}")))?;

        let violations: Vec<String> = registered
            .schema
            .iter_errors(&arguments)
            .map(|e| format!("{} at {}", e, e.instance_path))
            .collect();
        if !violations.is_empty() {
            return Err(ToolError::InvalidArguments(violations.join("; ")));
        }

        registered.tool.execute(arguments).await.map_err(|e| match e {
            err @ ToolError::Execution { .. } | err @ ToolError::Timeout { .. } => err,
            other => ToolError::Execution {
                tool_name: name.to_string(),
                reason: other.to_string(),
            },
        })
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
