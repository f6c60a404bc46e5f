use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::{AppError, FieldErrors};
use crate::models::{ChatRequest, ChatResponse, ChatState};
use crate::services::conversation;
use crate::services::script::{MAX_OBJECTION_ATTEMPTS, QUALIFICATION_STAGES};
use crate::state::AppState;

const MAX_MESSAGE_CHARS: usize = 1200;
const MAX_PROPOSED_SLOTS: usize = 3;
const MAX_LABEL_CHARS: usize = 120;
const MAX_EMAIL_CHARS: usize = 254;
const MAX_PHONE_CHARS: usize = 40;
const MAX_CITY_CHARS: usize = 80;
const MAX_LEAD_CONTEXT_CHARS: usize = 280;
const MAX_TOKEN_CHARS: usize = 128;

static TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([01]\d|2[0-3]):[0-5]\d$").expect("valid time regex"));

static BOOKING_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-fA-F]{24}$").expect("valid booking id regex"));

static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("valid uuid regex")
});

// POST /api/chat
pub async fn chat(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ChatResponse>, AppError> {
    let request = parse_request(&body)?;

    match conversation::process_turn(&state, request).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => {
            tracing::error!(error = %e, "chat turn failed, resetting conversation");
            Ok(Json(conversation::degraded_reply(&state)))
        }
    }
}

/// JSON -> typed request -> field rules. Every failure is a 400 with
/// per-field details; nothing invalid reaches the state machine.
pub fn parse_request(body: &[u8]) -> Result<ChatRequest, AppError> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| invalid("body", format!("malformed JSON: {e}")))?;

    if !value.is_object() {
        return Err(invalid("body", "expected a JSON object".to_string()));
    }

    let request: ChatRequest =
        serde_json::from_value(value).map_err(|e| invalid("body", e.to_string()))?;

    let errors = validate(&request);
    if errors.is_empty() {
        Ok(request)
    } else {
        Err(AppError::InvalidPayload(errors))
    }
}

fn invalid(field: &str, message: String) -> AppError {
    let mut errors = FieldErrors::new();
    errors.insert(field.to_string(), vec![message]);
    AppError::InvalidPayload(errors)
}

fn validate(request: &ChatRequest) -> FieldErrors {
    let mut errors = FieldErrors::new();
    let mut push = |field: String, message: &str| {
        errors.entry(field).or_default().push(message.to_string());
    };

    let message_chars = request.message.trim().chars().count();
    if message_chars == 0 {
        push("message".into(), "must not be empty");
    } else if message_chars > MAX_MESSAGE_CHARS {
        push("message".into(), "must be at most 1200 characters");
    }

    for (field, token) in [
        ("sessionToken", &request.session_token),
        ("bookingToken", &request.booking_token),
    ] {
        if too_long(token, MAX_TOKEN_CHARS) {
            push(field.into(), "must be at most 128 characters");
        }
    }

    if let Some(state) = &request.state {
        validate_state(state, &mut push);
    }

    errors
}

fn validate_state(state: &ChatState, push: &mut impl FnMut(String, &str)) {
    if state.proposed_slots.len() > MAX_PROPOSED_SLOTS {
        push("state.proposedSlots".into(), "must contain at most 3 slots");
    }

    let selected = state.selected_slot.iter().map(|s| ("state.selectedSlot".to_string(), s));
    let proposed = state
        .proposed_slots
        .iter()
        .enumerate()
        .map(|(i, s)| (format!("state.proposedSlots[{i}]"), s));

    for (path, slot) in proposed.chain(selected) {
        if !TIME_RE.is_match(&slot.time) {
            push(format!("{path}.time"), "must be HH:MM");
        }
        if slot.label.chars().count() > MAX_LABEL_CHARS {
            push(format!("{path}.label"), "must be at most 120 characters");
        }
    }

    if too_long(&state.email, MAX_EMAIL_CHARS) {
        push("state.email".into(), "must be at most 254 characters");
    }
    if too_long(&state.phone, MAX_PHONE_CHARS) {
        push("state.phone".into(), "must be at most 40 characters");
    }
    if too_long(&state.city, MAX_CITY_CHARS) {
        push("state.city".into(), "must be at most 80 characters");
    }
    if too_long(&state.lead_context, MAX_LEAD_CONTEXT_CHARS) {
        push("state.leadContext".into(), "must be at most 280 characters");
    }

    if let Some(id) = &state.target_booking_id {
        if !BOOKING_ID_RE.is_match(id) {
            push("state.targetBookingId".into(), "must be 24 hexadecimal characters");
        }
    }
    if let Some(token) = &state.target_booking_token {
        if !UUID_RE.is_match(token) {
            push("state.targetBookingToken".into(), "must be a UUID");
        }
    }

    if state.objection_attempts > MAX_OBJECTION_ATTEMPTS {
        push("state.objectionAttempts".into(), "must be between 0 and 4");
    }
    if state.qualification_stage as usize > QUALIFICATION_STAGES {
        push("state.qualificationStage".into(), "must be between 0 and 6");
    }
}

fn too_long(value: &Option<String>, max_chars: usize) -> bool {
    value.as_deref().is_some_and(|v| v.chars().count() > max_chars)
}
