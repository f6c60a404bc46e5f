use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::booking::BookingSummary;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatIntent {
    Book,
    Reschedule,
    Cancel,
    #[default]
    None,
}

impl ChatIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatIntent::Book => "book",
            ChatIntent::Reschedule => "reschedule",
            ChatIntent::Cancel => "cancel",
            ChatIntent::None => "none",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChatStep {
    #[default]
    Idle,
    AwaitTimezone,
    AwaitBookingId,
    AwaitSlot,
    AwaitEmail,
    AwaitEmailConfirm,
    AwaitPhone,
    AwaitPhoneConfirm,
    AwaitMoreHelp,
}

impl ChatStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatStep::Idle => "idle",
            ChatStep::AwaitTimezone => "await_timezone",
            ChatStep::AwaitBookingId => "await_booking_id",
            ChatStep::AwaitSlot => "await_slot",
            ChatStep::AwaitEmail => "await_email",
            ChatStep::AwaitEmailConfirm => "await_email_confirm",
            ChatStep::AwaitPhone => "await_phone",
            ChatStep::AwaitPhoneConfirm => "await_phone_confirm",
            ChatStep::AwaitMoreHelp => "await_more_help",
        }
    }

    /// Steps that only make sense inside a scheduling flow, and therefore
    /// require a live ROI session.
    pub fn is_mid_flow(&self) -> bool {
        !matches!(self, ChatStep::Idle | ChatStep::AwaitMoreHelp)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Slot {
    pub date: NaiveDate,
    pub time: String,
    pub label: String,
}

/// Whole conversation memory, echoed back by the client every turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatState {
    pub intent: ChatIntent,
    pub step: ChatStep,
    pub proposed_slots: Vec<Slot>,
    pub selected_slot: Option<Slot>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub target_booking_id: Option<String>,
    pub target_booking_token: Option<String>,
    pub city: Option<String>,
    pub objection_attempts: u8,
    pub qualification_stage: u8,
    pub lead_context: Option<String>,
}

impl ChatState {
    /// Drops every scheduling field but keeps the sales funnel counters.
    pub fn reset_flow(&mut self) {
        self.intent = ChatIntent::None;
        self.step = ChatStep::Idle;
        self.proposed_slots.clear();
        self.selected_slot = None;
        self.email = None;
        self.phone = None;
        self.target_booking_id = None;
        self.target_booking_token = None;
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub state: Option<ChatState>,
    #[serde(default)]
    pub session_token: Option<String>,
    #[serde(default)]
    pub booking_token: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReplyProvider {
    Gemini,
    Openai,
    Fallback,
}

impl ReplyProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplyProvider::Gemini => "gemini",
            ReplyProvider::Openai => "openai",
            ReplyProvider::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub reply: String,
    pub state: ChatState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking: Option<BookingSummary>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub open_roi_calculator: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub open_calendar: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<ReplyProvider>,
}

impl ChatResponse {
    pub fn reply(reply: impl Into<String>, state: ChatState) -> Self {
        Self {
            reply: reply.into(),
            state,
            booking: None,
            open_roi_calculator: false,
            open_calendar: false,
            provider: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_defaults_when_fields_missing() {
        let state: ChatState = serde_json::from_str(r#"{"step":"await_slot"}"#).unwrap();
        assert_eq!(state.step, ChatStep::AwaitSlot);
        assert_eq!(state.intent, ChatIntent::None);
        assert!(state.proposed_slots.is_empty());
        assert_eq!(state.objection_attempts, 0);
    }

    #[test]
    fn test_state_camel_case_round_trip() {
        let json = r#"{"intent":"reschedule","step":"await_email_confirm","email":"a@b.com","targetBookingId":"64b7f0c2a1b2c3d4e5f60718","qualificationStage":2}"#;
        let state: ChatState = serde_json::from_str(json).unwrap();
        assert_eq!(state.intent, ChatIntent::Reschedule);
        assert_eq!(state.email.as_deref(), Some("a@b.com"));
        let out = serde_json::to_value(&state).unwrap();
        assert_eq!(out["targetBookingId"], "64b7f0c2a1b2c3d4e5f60718");
        assert_eq!(out["step"], "await_email_confirm");
    }

    #[test]
    fn test_unknown_step_rejected() {
        assert!(serde_json::from_str::<ChatState>(r#"{"step":"teleport"}"#).is_err());
    }

    #[test]
    fn test_response_omits_false_flags() {
        let out = serde_json::to_value(ChatResponse::reply("hola", ChatState::default())).unwrap();
        assert!(out.get("openRoiCalculator").is_none());
        assert!(out.get("provider").is_none());
        assert_eq!(out["state"]["step"], "idle");
    }
}
