//! Model client implementations for coscientist.
//!
//! All clients implement the `coscientist_core::ModelClient` trait. The agent
//! loop stays ignorant of which backend is in use; transient transport
//! failures are retried here, never in the loop, so step-budget accounting is
//! never confused with retry attempts.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatClient;
