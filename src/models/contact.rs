use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub booking_id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub roi_snapshot: Option<serde_json::Value>,
    pub source: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommunicationStatus {
    Sent,
    Failed,
    Skipped,
}

impl CommunicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommunicationStatus::Sent => "sent",
            CommunicationStatus::Failed => "failed",
            CommunicationStatus::Skipped => "skipped",
        }
    }
}
