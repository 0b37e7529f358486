//! The agent control loop — the heart of coscientist.
//!
//! One run follows a fixed cycle:
//!
//! 1. **Seed** a transcript with the orchestration system prompt and the task
//! 2. **Request a turn** from the model client, passing the tool catalog
//! 3. **If tool calls**: dispatch them through the registry, append one tool
//!    message per request, loop back to step 2
//! 4. **If final text**: terminate with the answer
//!
//! The cycle is bounded by a step budget; exhausting it produces an explicit
//! outcome distinct from a normal answer.

pub mod loop_runner;

pub use loop_runner::{AgentLoop, RunOutcome};
