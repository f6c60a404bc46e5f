pub mod resend;
pub mod templates;

use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct EmailAttachment {
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
    pub attachments: Vec<EmailAttachment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Accepted by the provider, with its message id.
    Sent(String),
    /// No provider configured; nothing left the process.
    Skipped,
}

#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn send_email(&self, message: &EmailMessage) -> anyhow::Result<Delivery>;
}

/// Used when no email provider is configured.
pub struct LogNotifier;

#[async_trait]
impl NotificationService for LogNotifier {
    async fn send_email(&self, message: &EmailMessage) -> anyhow::Result<Delivery> {
        tracing::warn!(
            subject = %message.subject,
            attachments = message.attachments.len(),
            "email provider not configured, skipping send"
        );
        Ok(Delivery::Skipped)
    }
}
