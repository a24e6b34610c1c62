//! Core data types used throughout milenai.
//!
//! This module defines the message types and the request/response formats
//! that flow between the session, the retry policy and the provider adapter.

use serde::{Deserialize, Serialize};

// --- Message Roles ---

/// The role of a message in the conversation.
///
/// - `System`: instructions to the model (never shown in the transcript)
/// - `User`: the clinician's question
/// - `Assistant`: the model's answer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

// --- Messages ---

/// A single message in the conversation transcript.
///
/// Messages are immutable once appended; the transcript is a `Vec<Message>`
/// that only ever grows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a system message (sets the model's behavior/instructions).
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// --- Chat Request / Response ---

/// A request to send to the provider.
///
/// This is our internal representation; the adapter converts it into the
/// provider's wire format.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// The model to use (e.g. "deepseek/deepseek-r1:free")
    pub model: String,
    /// The conversation messages, oldest first
    pub messages: Vec<Message>,
}

/// The reply from one successful completion call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatResponse {
    /// The assistant's reply text
    pub content: String,
    /// Model the provider reports having served, when it says so
    pub model: Option<String>,
}
