//! Dialogue orchestrator. Each turn takes the client-held state plus one
//! message and returns the next state; nothing about the conversation is
//! kept server-side.

use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};

use crate::db::{self, queries};
use crate::models::{
    Booking, BookingSummary, ChatIntent, ChatRequest, ChatResponse, ChatState, ChatStep,
    ReplyProvider, RoiSession,
};
use crate::services::booking_actions::{self, RescheduleOutcome};
use crate::services::extract;
use crate::services::intent::Signals;
use crate::services::scheduling::{self, DEFAULT_SLOT_LIMIT};
use crate::services::script::{render, MAX_OBJECTION_ATTEMPTS, QUALIFICATION_STAGES};
use crate::state::AppState;

const MAX_LEAD_CONTEXT_CHARS: usize = 280;
const CONTINUITY_EXCERPT_CHARS: usize = 60;

struct Turn<'a> {
    message: &'a str,
    signals: Signals,
    session: Option<RoiSession>,
    booking_token: Option<&'a str>,
    session_token: Option<&'a str>,
    now: NaiveDateTime,
}

pub async fn process_turn(
    state: &Arc<AppState>,
    request: ChatRequest,
) -> anyhow::Result<ChatResponse> {
    let now = Utc::now().naive_utc();
    let message = request.message.trim();
    let mut chat = request.state.clone().unwrap_or_default();
    chat.objection_attempts = chat.objection_attempts.min(MAX_OBJECTION_ATTEMPTS);

    let session = {
        let conn = db::lock(&state.db)?;
        resolve_roi_session(
            &conn,
            request.session_token.as_deref(),
            request.booking_token.as_deref(),
            &now,
        )?
    };

    let turn = Turn {
        message,
        signals: state.classifier.signals(message),
        session,
        booking_token: request.booking_token.as_deref(),
        session_token: request.session_token.as_deref(),
        now,
    };

    tracing::info!(
        step = chat.step.as_str(),
        intent = chat.intent.as_str(),
        has_session = turn.session.is_some(),
        "processing chat turn"
    );

    if chat.step.is_mid_flow() && turn.session.is_none() {
        tracing::info!(step = chat.step.as_str(), "no ROI session, resetting flow");
        return Ok(roi_calculator_prompt(state, chat));
    }

    match chat.step {
        ChatStep::Idle => handle_idle(state, &turn, chat).await,
        ChatStep::AwaitTimezone => handle_timezone(state, &turn, chat),
        ChatStep::AwaitBookingId => handle_booking_id(state, &turn, chat),
        ChatStep::AwaitSlot => handle_slot(state, &turn, chat),
        ChatStep::AwaitEmail => Ok(handle_email(state, &turn, chat)),
        ChatStep::AwaitEmailConfirm => Ok(handle_email_confirm(state, &turn, chat)),
        ChatStep::AwaitPhone => Ok(handle_phone(state, &turn, chat)),
        ChatStep::AwaitPhoneConfirm => handle_phone_confirm(state, &turn, chat).await,
        ChatStep::AwaitMoreHelp => Ok(handle_more_help(state, &turn, chat)),
    }
}

/// Reply used whenever a turn fails outright. Progress is dropped so the
/// client can never get stuck in a broken step.
pub fn degraded_reply(state: &AppState) -> ChatResponse {
    ChatResponse::reply(state.script.error_reply.clone(), ChatState::default())
}

/// Only request-level credentials count: the session token itself, or a
/// booking token whose booking links to a live session.
fn resolve_roi_session(
    conn: &rusqlite::Connection,
    session_token: Option<&str>,
    booking_token: Option<&str>,
    now: &NaiveDateTime,
) -> anyhow::Result<Option<RoiSession>> {
    if let Some(token) = session_token.filter(|t| !t.is_empty()) {
        if let Some(session) = queries::find_active_session(conn, token, now)? {
            return Ok(Some(session));
        }
    }

    if let Some(token) = booking_token.filter(|t| !t.is_empty()) {
        let linked = queries::find_active_booking_by_access_token(conn, token, now)?
            .and_then(|b| b.session_token);
        if let Some(session_token) = linked {
            return queries::find_active_session(conn, &session_token, now);
        }
    }

    Ok(None)
}

// ── idle ──

async fn handle_idle(
    state: &Arc<AppState>,
    turn: &Turn<'_>,
    mut chat: ChatState,
) -> anyhow::Result<ChatResponse> {
    let script = &state.script;
    let signals = turn.signals;

    if signals.cancel {
        return handle_cancel(state, turn, chat);
    }

    if signals.reschedule {
        if turn.session.is_none() {
            return Ok(roi_calculator_prompt(state, chat));
        }
        return start_reschedule(state, turn, chat);
    }

    if signals.booking {
        if turn.session.is_none() {
            return Ok(roi_calculator_prompt(state, chat));
        }
        chat.reset_flow();
        let mut response = ChatResponse::reply(script.calendar_handoff.clone(), chat);
        response.open_calendar = true;
        return Ok(response);
    }

    if signals.objection {
        let attempt = chat.objection_attempts;
        let reply = match script.rebuttal(attempt) {
            Some(rebuttal) => rebuttal.to_string(),
            None => script.objection_exhausted.clone(),
        };
        chat.objection_attempts = (attempt + 1).min(MAX_OBJECTION_ATTEMPTS);
        chat.intent = ChatIntent::None;
        return Ok(ChatResponse::reply(reply, chat));
    }

    if signals.greeting && chat.qualification_stage == 0 {
        return Ok(advance_funnel(state, turn, chat));
    }

    if signals.service_question {
        return Ok(ai_reply(state, turn, chat, &script.service_answer).await);
    }

    if (chat.qualification_stage as usize) < QUALIFICATION_STAGES {
        return Ok(advance_funnel(state, turn, chat));
    }

    Ok(ai_reply(state, turn, chat, &script.ai_fallback).await)
}

fn advance_funnel(state: &AppState, turn: &Turn<'_>, mut chat: ChatState) -> ChatResponse {
    let stage = chat.qualification_stage;
    let Some(question) = state.script.qualification_step(stage) else {
        return ChatResponse::reply(state.script.ai_fallback.clone(), chat);
    };

    let mut reply = String::new();
    if stage > 0 && !turn.signals.greeting {
        let context = excerpt(turn.message, CONTINUITY_EXCERPT_CHARS);
        reply.push_str(&render(&state.script.continuity_prefix, &[("context", &context)]));
        chat.lead_context = Some(excerpt(turn.message, MAX_LEAD_CONTEXT_CHARS));
    }
    reply.push_str(question);

    chat.qualification_stage = stage + 1;
    ChatResponse::reply(reply, chat)
}

async fn ai_reply(
    state: &AppState,
    turn: &Turn<'_>,
    chat: ChatState,
    canned: &str,
) -> ChatResponse {
    let (reply, provider) = match state.ai.generate_conversational_reply(turn.message).await {
        Some(ai) => (ai.text, ai.provider),
        None => {
            tracing::warn!("no AI provider answered, using canned reply");
            (canned.to_string(), ReplyProvider::Fallback)
        }
    };

    let mut response = ChatResponse::reply(reply, chat);
    response.provider = Some(provider);
    response
}

fn handle_cancel(
    state: &AppState,
    turn: &Turn<'_>,
    mut chat: ChatState,
) -> anyhow::Result<ChatResponse> {
    chat.reset_flow();

    let cancelled = {
        let mut conn = db::lock(&state.db)?;
        let target = match turn.booking_token.filter(|t| !t.is_empty()) {
            Some(token) => queries::find_active_booking_by_access_token(&conn, token, &turn.now)?,
            None => None,
        };
        let target = match (target, turn.session_token.filter(|t| !t.is_empty())) {
            (Some(booking), _) => Some(booking),
            (None, Some(token)) => queries::find_active_booking_by_session(&conn, token, &turn.now)?,
            (None, None) => None,
        };

        match target {
            Some(booking) => booking_actions::cancel_booking(&mut conn, &booking.id, turn.now)?,
            None => false,
        }
    };

    let reply = if cancelled {
        &state.script.cancelled
    } else {
        &state.script.nothing_to_cancel
    };
    Ok(ChatResponse::reply(reply.clone(), chat))
}

// ── reschedule flow ──

/// Booking named in the message (id or access token), else the one behind
/// the request's booking token.
fn find_target_booking(
    conn: &rusqlite::Connection,
    turn: &Turn<'_>,
) -> anyhow::Result<(bool, Option<Booking>)> {
    if let Some(id) = extract::extract_booking_id(turn.message) {
        return Ok((true, queries::find_active_booking_by_id(conn, &id, &turn.now)?));
    }
    if let Some(token) = extract::extract_booking_token(turn.message) {
        return Ok((true, queries::find_active_booking_by_access_token(conn, &token, &turn.now)?));
    }
    if let Some(token) = turn.booking_token.filter(|t| !t.is_empty()) {
        return Ok((true, queries::find_active_booking_by_access_token(conn, token, &turn.now)?));
    }
    Ok((false, None))
}

fn start_reschedule(
    state: &AppState,
    turn: &Turn<'_>,
    mut chat: ChatState,
) -> anyhow::Result<ChatResponse> {
    chat.reset_flow();
    chat.intent = ChatIntent::Reschedule;

    let (named, booking) = {
        let conn = db::lock(&state.db)?;
        find_target_booking(&conn, turn)?
    };

    match booking {
        Some(booking) => offer_slots_for(state, turn, chat, &booking),
        None => {
            chat.step = ChatStep::AwaitBookingId;
            let reply = if named {
                &state.script.booking_not_found
            } else {
                &state.script.ask_booking_id
            };
            Ok(ChatResponse::reply(reply.clone(), chat))
        }
    }
}

fn handle_booking_id(
    state: &AppState,
    turn: &Turn<'_>,
    mut chat: ChatState,
) -> anyhow::Result<ChatResponse> {
    let booking = {
        let conn = db::lock(&state.db)?;
        match extract::extract_booking_id(turn.message) {
            Some(id) => queries::find_active_booking_by_id(&conn, &id, &turn.now)?,
            None => match extract::extract_booking_token(turn.message) {
                Some(token) => queries::find_active_booking_by_access_token(&conn, &token, &turn.now)?,
                None => None,
            },
        }
    };

    match booking {
        Some(booking) => {
            chat.intent = ChatIntent::Reschedule;
            offer_slots_for(state, turn, chat, &booking)
        }
        None => {
            chat.step = ChatStep::AwaitBookingId;
            Ok(ChatResponse::reply(state.script.booking_not_found.clone(), chat))
        }
    }
}

fn offer_slots_for(
    state: &AppState,
    turn: &Turn<'_>,
    mut chat: ChatState,
    booking: &Booking,
) -> anyhow::Result<ChatResponse> {
    chat.target_booking_id = Some(booking.id.clone());
    chat.target_booking_token = Some(booking.access_token.clone());
    offer_fresh_slots(state, turn, chat, &state.script.offer_slots)
}

/// Rebuilds availability into the state. An empty result ends the flow.
fn offer_fresh_slots(
    state: &AppState,
    turn: &Turn<'_>,
    mut chat: ChatState,
    template: &str,
) -> anyhow::Result<ChatResponse> {
    let slots = {
        let conn = db::lock(&state.db)?;
        scheduling::build_slots(
            &conn,
            scheduling::to_clinic_time(turn.now, state.config.clinic_tz),
            DEFAULT_SLOT_LIMIT,
        )
    };

    if slots.is_empty() {
        chat.reset_flow();
        return Ok(ChatResponse::reply(state.script.no_availability.clone(), chat));
    }

    let reply = render(template, &[("slots", &scheduling::format_slot_list(&slots))]);
    chat.proposed_slots = slots;
    chat.selected_slot = None;
    chat.step = ChatStep::AwaitSlot;
    Ok(ChatResponse::reply(reply, chat))
}

/// Kept for clients that still send this step; the server never emits it.
fn handle_timezone(
    state: &AppState,
    turn: &Turn<'_>,
    mut chat: ChatState,
) -> anyhow::Result<ChatResponse> {
    let Some(city) = extract::extract_city(turn.message) else {
        return Ok(ChatResponse::reply(state.script.ask_city.clone(), chat));
    };

    let ack = render(&state.script.city_ack, &[("city", &city)]);
    chat.city = Some(city);

    let mut response = offer_fresh_slots(state, turn, chat, &state.script.offer_slots)?;
    response.reply = format!("{ack}{}", response.reply);
    Ok(response)
}

fn handle_slot(
    state: &AppState,
    turn: &Turn<'_>,
    mut chat: ChatState,
) -> anyhow::Result<ChatResponse> {
    if chat.proposed_slots.is_empty() {
        return offer_fresh_slots(state, turn, chat, &state.script.offer_slots);
    }

    let Some(index) = extract::extract_slot_choice(turn.message, chat.proposed_slots.len()) else {
        let reply = render(
            &state.script.invalid_slot_choice,
            &[("slots", &scheduling::format_slot_list(&chat.proposed_slots))],
        );
        return Ok(ChatResponse::reply(reply, chat));
    };

    let slot = chat.proposed_slots[index].clone();
    let reply = render(
        &state.script.ask_email,
        &[("date", &scheduling::date_label(&slot.date)), ("time", &slot.time)],
    );
    chat.selected_slot = Some(slot);
    chat.step = ChatStep::AwaitEmail;
    Ok(ChatResponse::reply(reply, chat))
}

fn handle_email(state: &AppState, turn: &Turn<'_>, mut chat: ChatState) -> ChatResponse {
    match extract::extract_email(turn.message) {
        Some(email) => {
            let reply = render(&state.script.confirm_email, &[("email", &email)]);
            chat.email = Some(email);
            chat.step = ChatStep::AwaitEmailConfirm;
            ChatResponse::reply(reply, chat)
        }
        None => ChatResponse::reply(state.script.invalid_email.clone(), chat),
    }
}

fn handle_email_confirm(state: &AppState, turn: &Turn<'_>, mut chat: ChatState) -> ChatResponse {
    // A fresh address replaces the pending one and is confirmed again.
    if let Some(email) = extract::extract_email(turn.message) {
        if chat.email.as_deref() != Some(email.as_str()) {
            chat.step = ChatStep::AwaitEmail;
            return handle_email(state, turn, chat);
        }
    }

    if chat.email.is_none() {
        chat.step = ChatStep::AwaitEmail;
        return ChatResponse::reply(state.script.retry_email.clone(), chat);
    }

    if turn.signals.affirmative {
        chat.step = ChatStep::AwaitPhone;
        return ChatResponse::reply(state.script.ask_phone.clone(), chat);
    }

    if turn.signals.negative {
        chat.email = None;
        chat.step = ChatStep::AwaitEmail;
        return ChatResponse::reply(state.script.retry_email.clone(), chat);
    }

    ChatResponse::reply(state.script.yes_or_no.clone(), chat)
}

fn handle_phone(state: &AppState, turn: &Turn<'_>, mut chat: ChatState) -> ChatResponse {
    match extract::extract_phone(turn.message) {
        Some(phone) => {
            let reply = render(&state.script.confirm_phone, &[("phone", &phone)]);
            chat.phone = Some(phone);
            chat.step = ChatStep::AwaitPhoneConfirm;
            ChatResponse::reply(reply, chat)
        }
        None => ChatResponse::reply(state.script.invalid_phone.clone(), chat),
    }
}

async fn handle_phone_confirm(
    state: &Arc<AppState>,
    turn: &Turn<'_>,
    mut chat: ChatState,
) -> anyhow::Result<ChatResponse> {
    if let Some(phone) = extract::extract_phone(turn.message) {
        if chat.phone.as_deref() != Some(phone.as_str()) {
            chat.step = ChatStep::AwaitPhone;
            return Ok(handle_phone(state, turn, chat));
        }
    }

    if chat.phone.is_none() || turn.signals.negative {
        chat.phone = None;
        chat.step = ChatStep::AwaitPhone;
        return Ok(ChatResponse::reply(state.script.retry_phone.clone(), chat));
    }

    if !turn.signals.affirmative {
        return Ok(ChatResponse::reply(state.script.yes_or_no.clone(), chat));
    }

    complete_reschedule(state, turn, chat).await
}

/// Terminal action of the flow: move the booking, then contact upsert and
/// summary email, neither of which can undo the move.
async fn complete_reschedule(
    state: &Arc<AppState>,
    turn: &Turn<'_>,
    mut chat: ChatState,
) -> anyhow::Result<ChatResponse> {
    let (Some(booking_id), Some(booking_token), Some(slot), Some(email), Some(phone)) = (
        chat.target_booking_id.clone(),
        chat.target_booking_token.clone(),
        chat.selected_slot.clone(),
        chat.email.clone(),
        chat.phone.clone(),
    ) else {
        tracing::warn!(step = chat.step.as_str(), "incomplete reschedule state");
        return Ok(restart_reschedule(state, chat));
    };

    let (outcome, contact) = {
        let conn = db::lock(&state.db)?;

        // The echoed id only counts together with the booking's access token.
        let owned = queries::find_active_booking_by_id(&conn, &booking_id, &turn.now)?
            .is_some_and(|booking| booking.access_token == booking_token);
        if !owned {
            tracing::warn!(booking_id = %booking_id, "reschedule target does not match its token");
            return Ok(restart_reschedule(state, chat));
        }

        let outcome = booking_actions::reschedule_booking(
            &conn,
            &booking_id,
            &slot,
            state.config.clinic_tz,
            turn.now,
        )?;

        let contact = match &outcome {
            RescheduleOutcome::Rescheduled(booking) => {
                match booking_actions::upsert_contact_for_chat(&conn, booking, &email, &phone, turn.now) {
                    Ok(contact) => Some(contact),
                    Err(e) => {
                        tracing::error!(booking_id = %booking.id, error = %e, "failed to upsert contact");
                        None
                    }
                }
            }
            _ => None,
        };
        (outcome, contact)
    };

    match outcome {
        RescheduleOutcome::Rescheduled(booking) => {
            if let Some(contact) = &contact {
                booking_actions::send_booking_summary_email(
                    &state.db,
                    state.notifier.as_ref(),
                    &state.config.public_base_url,
                    &booking,
                    contact,
                )
                .await;
            }

            let reply = render(
                &state.script.rescheduled,
                &[("date", &scheduling::date_label(&booking.date)), ("time", &booking.time)],
            );
            chat.reset_flow();
            chat.step = ChatStep::AwaitMoreHelp;

            let mut response = ChatResponse::reply(reply, chat);
            response.booking = Some(BookingSummary::from(&booking));
            Ok(response)
        }
        RescheduleOutcome::Conflict => {
            chat.selected_slot = None;
            offer_fresh_slots(state, turn, chat, &state.script.slot_taken)
        }
        RescheduleOutcome::NotFound => {
            tracing::info!(booking_id = %booking_id, "reschedule target no longer active");
            Ok(restart_reschedule(state, chat))
        }
    }
}

fn restart_reschedule(state: &AppState, mut chat: ChatState) -> ChatResponse {
    chat.reset_flow();
    chat.intent = ChatIntent::Reschedule;
    chat.step = ChatStep::AwaitBookingId;
    ChatResponse::reply(state.script.booking_not_found.clone(), chat)
}

fn handle_more_help(state: &AppState, turn: &Turn<'_>, mut chat: ChatState) -> ChatResponse {
    chat.reset_flow();
    let reply = if turn.signals.negative {
        &state.script.more_help_close
    } else {
        &state.script.more_help_prompt
    };
    ChatResponse::reply(reply.clone(), chat)
}

fn roi_calculator_prompt(state: &AppState, mut chat: ChatState) -> ChatResponse {
    chat.reset_flow();
    let mut response = ChatResponse::reply(state.script.roi_calculator_prompt.clone(), chat);
    response.open_roi_calculator = true;
    response
}

/// At most `max_chars` characters, ellipsis included.
fn excerpt(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{}…", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BookingStatus, RoiSession};
    use chrono::Duration;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    #[test]
    fn test_excerpt_respects_limit() {
        assert_eq!(excerpt("corto", 10), "corto");
        let cut = excerpt(&"ñ".repeat(300), MAX_LEAD_CONTEXT_CHARS);
        assert_eq!(cut.chars().count(), MAX_LEAD_CONTEXT_CHARS);
        assert!(cut.ends_with('…'));
    }

    #[test]
    fn test_session_resolution_uses_request_credentials_only() {
        let conn = db::init_db(":memory:").unwrap();
        let now = ts("2025-01-03 10:00");
        let start = ts("2025-01-08 09:00");

        queries::insert_roi_session(
            &conn,
            &RoiSession {
                token: "live".to_string(),
                booking_id: None,
                roi_snapshot: serde_json::json!({}),
                expires_at: now + Duration::hours(1),
            },
        )
        .unwrap();
        queries::insert_roi_session(
            &conn,
            &RoiSession {
                token: "stale".to_string(),
                booking_id: None,
                roi_snapshot: serde_json::json!({}),
                expires_at: now - Duration::hours(1),
            },
        )
        .unwrap();
        queries::insert_booking(
            &conn,
            &Booking {
                id: "64b7f0c2a1b2c3d4e5f60718".to_string(),
                access_token: "3f1c2b9a-8d7e-4f60-9a1b-2c3d4e5f6071".to_string(),
                session_token: Some("live".to_string()),
                date: start.date(),
                time: "10:00".to_string(),
                duration_minutes: 30,
                start_at: start,
                end_at: start + Duration::minutes(30),
                status: BookingStatus::Pending,
                demo_expires_at: start + Duration::minutes(30),
                form_expires_at: None,
                created_at: now,
                updated_at: now,
            },
        )
        .unwrap();

        let resolve = |session: Option<&str>, booking: Option<&str>| {
            resolve_roi_session(&conn, session, booking, &now).unwrap().map(|s| s.token)
        };

        assert_eq!(resolve(Some("live"), None).as_deref(), Some("live"));
        assert_eq!(resolve(Some("stale"), None), None);
        assert_eq!(resolve(Some(""), None), None);
        assert_eq!(
            resolve(Some("stale"), Some("3f1c2b9a-8d7e-4f60-9a1b-2c3d4e5f6071")).as_deref(),
            Some("live")
        );
        assert_eq!(resolve(None, Some("unknown-token")), None);
        assert_eq!(resolve(None, None), None);
    }
}
