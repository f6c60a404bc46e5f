pub mod fallback;
pub mod gemini;
pub mod openai;
pub mod responder;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::ReplyProvider;

pub use responder::{AiReply, AiResponder};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A generative-AI vendor reachable through several models.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn kind(&self) -> ReplyProvider;

    /// Models to try, preferred first.
    fn models(&self) -> &[String];

    async fn chat(
        &self,
        model: &str,
        system_prompt: &str,
        messages: &[Message],
    ) -> anyhow::Result<String>;
}
