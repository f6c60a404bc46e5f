use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;

use super::fallback::model_chain;
use super::{LlmProvider, Message};
use crate::models::ReplyProvider;

const OPENAI_FALLBACK_MODELS: [&str; 2] = ["gpt-4.1-mini", "gpt-3.5-turbo"];

pub struct OpenAiProvider {
    api_key: String,
    models: Vec<String>,
    max_output_tokens: u32,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(
        api_key: String,
        preferred_model: &str,
        max_output_tokens: u32,
        client: reqwest::Client,
    ) -> Self {
        Self {
            api_key,
            models: model_chain(preferred_model, &OPENAI_FALLBACK_MODELS),
            max_output_tokens,
            client,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn kind(&self) -> ReplyProvider {
        ReplyProvider::Openai
    }

    fn models(&self) -> &[String] {
        &self.models
    }

    async fn chat(
        &self,
        model: &str,
        system_prompt: &str,
        messages: &[Message],
    ) -> anyhow::Result<String> {
        let mut chat_messages = vec![json!({
            "role": "system",
            "content": system_prompt,
        })];

        for msg in messages {
            chat_messages.push(json!({
                "role": msg.role,
                "content": msg.content,
            }));
        }

        let body = json!({
            "model": model,
            "messages": chat_messages,
            "temperature": 0.6,
            "max_tokens": self.max_output_tokens,
        });

        let resp = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("failed to call OpenAI API")?;

        let status = resp.status();
        let data: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse OpenAI response")?;

        if !status.is_success() {
            anyhow::bail!("OpenAI API error ({}): {}", status, data["error"]["message"]);
        }

        data["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.trim().to_string())
            .ok_or_else(|| anyhow::anyhow!("missing content in OpenAI response"))
    }
}
