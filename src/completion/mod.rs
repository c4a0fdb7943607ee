//! Client side of the external chat-completion service.
//!
//! The rest of the crate only sees [`CompletionClient`]: a prompt goes in,
//! free-form text or an error comes out.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

mod error;
#[cfg(test)]
pub mod fake;
mod openai;

pub use error::CompletionError;
pub use openai::OpenAiClient;

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(alias = "developer")]
    System,
    User,
    Assistant,
}

/// One role-tagged turn of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: text.into(),
        }
    }
}

/// Everything needed for one completion call.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Fixed instruction sent ahead of the conversation.
    pub system_prompt: String,
    /// Conversation turns, oldest first. Never contains system messages.
    pub messages: Vec<ChatMessage>,
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Returns the text of the first choice, or an error when the call fails
    /// or yields nothing usable.
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError>;
}
