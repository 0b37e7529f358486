//! # coscientist Core
//!
//! Domain types, traits, and error definitions for the coscientist agent
//! orchestrator. This crate has **zero framework dependencies** — it defines
//! the domain model the other crates implement against.
//!
//! ## Design Philosophy
//!
//! The seams of the system are traits defined here: [`client::ModelClient`]
//! for the model backend and [`tool::Tool`] for adapters to sibling services.
//! Implementations live in their own crates, which keeps the dependency graph
//! pointing inward and makes the loop trivially testable with in-module
//! mocks.

pub mod client;
pub mod error;
pub mod message;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use client::{ModelClient, ToolChoice, ToolDefinition, Turn, TurnOptions};
pub use error::{ClientError, Error, Result, ToolError};
pub use message::{Message, Role, ToolCallRequest, Transcript};
pub use tool::{Tool, ToolRegistry};
