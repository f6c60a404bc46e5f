use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Server-side record of the ROI calculator inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoiSession {
    pub token: String,
    pub booking_id: Option<String>,
    pub roi_snapshot: serde_json::Value,
    pub expires_at: NaiveDateTime,
}
