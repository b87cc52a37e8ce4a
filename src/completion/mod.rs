//! Completion Service
//!
//! Free-text questions from `!ask` / `/gpt` are answered by a language model
//! behind this trait.

mod openai;

pub use openai::OpenAiCompletion;

use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Complete a single user prompt. An empty string means the model
    /// returned no text.
    async fn complete(&self, prompt: &str) -> Result<String>;
}
