//! Model client and prompt templates for LLM-backed agents.
//!
//! - [`api::LlmClient`] -- OpenAI-compatible chat completion client.
//! - [`prompt`] -- per-game prompt templates.

pub mod api;
pub mod prompt;

pub use api::{ChatMessage, ChatResponse, Choice, LlmClient, Usage};
pub use prompt::{action_prompt, PromptHistory};
