//! Completion client module.
//!
//! `LlmProvider` abstracts one outbound call to a hosted chat-completion
//! endpoint. Implementations make exactly one attempt per call; retrying is
//! the job of [`crate::retry::RetryPolicy`].

pub mod openai_compatible;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::types::{ChatRequest, ChatResponse};

/// Trait that all completion providers must implement.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a chat completion request and return the assistant's reply.
    async fn chat_completion(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError>;

    /// Return the provider's display name (for logging).
    fn name(&self) -> &str;
}
