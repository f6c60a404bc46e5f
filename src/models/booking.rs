use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Demo booking as held by the booking store. Slot fields (`date`, `time`)
/// are clinic wall-clock values; every timestamp is UTC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub access_token: String,
    pub session_token: Option<String>,
    pub date: NaiveDate,
    pub time: String,
    pub duration_minutes: i64,
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
    pub status: BookingStatus,
    pub demo_expires_at: NaiveDateTime,
    pub form_expires_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Booking {
    /// Pending or confirmed, and the demo has not expired yet.
    pub fn is_active(&self, now: NaiveDateTime) -> bool {
        matches!(self.status, BookingStatus::Pending | BookingStatus::Confirmed)
            && self.demo_expires_at > now
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Expired,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "confirmed" => BookingStatus::Confirmed,
            "cancelled" => BookingStatus::Cancelled,
            "expired" => BookingStatus::Expired,
            _ => BookingStatus::Pending,
        }
    }
}

/// Booking summary returned to the chat client after a successful change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookingSummary {
    pub booking_id: String,
    pub access_token: String,
    pub date: NaiveDate,
    pub time: String,
    pub duration: i64,
}

impl From<&Booking> for BookingSummary {
    fn from(b: &Booking) -> Self {
        Self {
            booking_id: b.id.clone(),
            access_token: b.access_token.clone(),
            date: b.date,
            time: b.time.clone(),
            duration: b.duration_minutes,
        }
    }
}
