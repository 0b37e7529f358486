//! Tool adapters for coscientist.
//!
//! Each adapter wraps one JSON-over-HTTP call to a sibling service and
//! normalizes the response into plain JSON for the registry. Adapters are
//! stateless with respect to the conversation; endpoint, credentials, and
//! timeout are fixed at construction.

pub mod memory_ingest;
pub mod memory_search;
pub mod ocr_extract;

mod http;

use std::time::Duration;

use coscientist_config::AppConfig;
use coscientist_core::error::ToolError;
use coscientist_core::tool::ToolRegistry;
use tracing::info;

pub use memory_ingest::MemoryIngestNoteTool;
pub use memory_search::MemorySearchTool;
pub use ocr_extract::OcrExtractTool;

/// Build the tool registry from the loaded config.
///
/// Registration is explicit and happens once at process start; a duplicate
/// name here is a wiring bug and aborts startup. Services without a
/// configured base URL are skipped, so a deployment can run with a subset of
/// tools.
pub fn build_registry(config: &AppConfig) -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::new();

    if config.ocr.base_url.is_empty() {
        info!("OCR base URL not configured, skipping ocr_extract");
    } else {
        registry.register(Box::new(OcrExtractTool::new(
            config.ocr.base_url.clone(),
            config.ocr.api_key.clone(),
            Duration::from_secs(config.ocr.timeout_secs),
        )?))?;
    }

    if config.memory.base_url.is_empty() {
        info!("Memory base URL not configured, skipping memory tools");
    } else {
        let timeout = Duration::from_secs(config.memory.timeout_secs);
        registry.register(Box::new(MemorySearchTool::new(
            config.memory.base_url.clone(),
            config.memory.api_key.clone(),
            timeout,
        )?))?;
        registry.register(Box::new(MemoryIngestNoteTool::new(
            config.memory.base_url.clone(),
            config.memory.api_key.clone(),
            timeout,
        )?))?;
    }

    info!(tools = ?registry.names(), "Tool registry wired");
    Ok(registry)
}
