//! LLM-backed structured extraction.

pub mod client;

pub use client::{LlmClient, LlmConfig, LlmError, LlmProvider};
