//! Talking to the language model.
//!
//! - `prompt`: system and user messages for one question
//! - `client`: the completion service seam and its OpenAI-compatible client

pub mod client;
pub mod prompt;

pub use client::{CompletionService, OpenAiClient};
pub use prompt::{Prompt, PromptBuilder};
