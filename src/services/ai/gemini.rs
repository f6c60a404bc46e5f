use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;

use super::fallback::model_chain;
use super::{LlmProvider, Message};
use crate::models::ReplyProvider;

const GEMINI_FALLBACK_MODELS: [&str; 2] = ["gemini-1.5-flash", "gemini-1.5-flash-8b"];

pub struct GeminiProvider {
    api_key: String,
    models: Vec<String>,
    max_output_tokens: u32,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(
        api_key: String,
        preferred_model: &str,
        max_output_tokens: u32,
        client: reqwest::Client,
    ) -> Self {
        Self {
            api_key,
            models: model_chain(preferred_model, &GEMINI_FALLBACK_MODELS),
            max_output_tokens,
            client,
        }
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn kind(&self) -> ReplyProvider {
        ReplyProvider::Gemini
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
        let contents: Vec<_> = messages
            .iter()
            .map(|msg| {
                let role = if msg.role == "assistant" { "model" } else { "user" };
                json!({
                    "role": role,
                    "parts": [{ "text": msg.content }],
                })
            })
            .collect();

        let body = json!({
            "systemInstruction": { "parts": [{ "text": system_prompt }] },
            "contents": contents,
            "generationConfig": {
                "maxOutputTokens": self.max_output_tokens,
                "temperature": 0.6,
            },
        });

        let resp = self
            .client
            .post(format!(
                "https://generativelanguage.googleapis.com/v1beta/models/{model}:generateContent"
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("failed to call Gemini API")?;

        let status = resp.status();
        let data: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse Gemini response")?;

        if !status.is_success() {
            anyhow::bail!("Gemini API error ({}): {}", status, data["error"]["message"]);
        }

        data["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(|s| s.trim().to_string())
            .ok_or_else(|| anyhow::anyhow!("missing content in Gemini response"))
    }
}
