use anyhow::Context;
use async_trait::async_trait;
use base64::Engine;
use serde_json::json;

use super::{Delivery, EmailMessage, NotificationService};

pub struct ResendEmailProvider {
    api_key: String,
    from: String,
    client: reqwest::Client,
}

impl ResendEmailProvider {
    pub fn new(api_key: String, from: String, client: reqwest::Client) -> Self {
        Self {
            api_key,
            from,
            client,
        }
    }
}

#[async_trait]
impl NotificationService for ResendEmailProvider {
    async fn send_email(&self, message: &EmailMessage) -> anyhow::Result<Delivery> {
        let attachments: Vec<_> = message
            .attachments
            .iter()
            .map(|a| {
                json!({
                    "filename": a.filename,
                    "content": base64::engine::general_purpose::STANDARD.encode(&a.content),
                    "content_type": a.content_type,
                })
            })
            .collect();

        let body = json!({
            "from": self.from,
            "to": [message.to],
            "subject": message.subject,
            "html": message.html,
            "text": message.text,
            "attachments": attachments,
        });

        let resp = self
            .client
            .post("https://api.resend.com/emails")
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("failed to call Resend API")?;

        let status = resp.status();
        let data: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse Resend response")?;

        if !status.is_success() {
            anyhow::bail!("Resend API error ({}): {}", status, data);
        }

        Ok(Delivery::Sent(
            data["id"].as_str().unwrap_or_default().to_string(),
        ))
    }
}
