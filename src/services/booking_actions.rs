use std::sync::Mutex;

use chrono::{Duration, NaiveDateTime};
use chrono_tz::Tz;
use rusqlite::Connection;

use crate::db::{self, queries};
use crate::models::{Booking, CommunicationStatus, Contact, Slot};
use crate::services::calendar;
use crate::services::notify::templates::{booking_summary_email, SummaryLinks};
use crate::services::notify::{Delivery, NotificationService};
use crate::services::scheduling::{is_grid_slot, slot_start_utc, SLOT_DURATION_MINUTES};

/// Lifetime of the follow-up form opened after a reschedule.
pub const FORM_WINDOW_MINUTES: i64 = 10;

#[derive(Debug)]
pub enum RescheduleOutcome {
    Rescheduled(Booking),
    /// The slot is held by another confirmed booking, or is not bookable.
    Conflict,
    /// No pending/confirmed, unexpired booking with that id.
    NotFound,
}

/// Moves an active booking onto `slot` and confirms it. Nothing is written
/// when the slot is taken; the caller re-offers availability.
pub fn reschedule_booking(
    conn: &Connection,
    booking_id: &str,
    slot: &Slot,
    tz: Tz,
    now: NaiveDateTime,
) -> anyhow::Result<RescheduleOutcome> {
    if queries::find_active_booking_by_id(conn, booking_id, &now)?.is_none() {
        return Ok(RescheduleOutcome::NotFound);
    }

    // Echoed slots are client input: off-grid, weekend or past slots are
    // handled like a taken slot.
    let start_at = match slot_start_utc(slot, tz) {
        Some(start) if is_grid_slot(slot) && start > now => start,
        _ => {
            tracing::warn!(booking_id, date = %slot.date, time = %slot.time, "rejected unbookable slot");
            return Ok(RescheduleOutcome::Conflict);
        }
    };

    if queries::has_confirmed_conflict(conn, &slot.date, &slot.time, booking_id)? {
        return Ok(RescheduleOutcome::Conflict);
    }

    let end_at = start_at + Duration::minutes(SLOT_DURATION_MINUTES);
    let written = queries::reschedule_if_free(
        conn,
        &queries::RescheduleWrite {
            id: booking_id,
            date: slot.date,
            time: &slot.time,
            duration_minutes: SLOT_DURATION_MINUTES,
            start_at,
            end_at,
            demo_expires_at: end_at,
            form_expires_at: now + Duration::minutes(FORM_WINDOW_MINUTES),
            now,
        },
    )?;

    if !written {
        tracing::warn!(booking_id, date = %slot.date, time = %slot.time, "slot taken during reschedule");
        return Ok(RescheduleOutcome::Conflict);
    }

    tracing::info!(booking_id, date = %slot.date, time = %slot.time, "booking rescheduled");
    Ok(queries::get_booking_by_id(conn, booking_id)?
        .map(RescheduleOutcome::Rescheduled)
        .unwrap_or(RescheduleOutcome::NotFound))
}

/// Cancels a booking and unlinks its ROI session in one transaction.
pub fn cancel_booking(conn: &mut Connection, booking_id: &str, now: NaiveDateTime) -> anyhow::Result<bool> {
    let cancelled = queries::cancel_booking_and_unlink(conn, booking_id, &now)?;
    if cancelled {
        tracing::info!(booking_id, "booking cancelled");
    }
    Ok(cancelled)
}

/// "ana.garcia+demo@x.es" -> "Ana Garcia".
pub fn display_name_from_email(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    let local = local.split('+').next().unwrap_or_default();

    let words: Vec<String> = local
        .split(|c: char| c == '.' || c == '_' || c == '-' || c.is_ascii_digit())
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect();

    if words.is_empty() {
        "Cliente".to_string()
    } else {
        words.join(" ")
    }
}

/// Creates or refreshes the contact keyed by the booking, carrying over the
/// ROI snapshot of the linked session when there is one.
pub fn upsert_contact_for_chat(
    conn: &Connection,
    booking: &Booking,
    email: &str,
    phone: &str,
    now: NaiveDateTime,
) -> anyhow::Result<Contact> {
    let existing = queries::get_contact_by_booking(conn, &booking.id)?;

    let roi_snapshot = match &booking.session_token {
        Some(token) => queries::find_active_session(conn, token, &now)?.map(|s| s.roi_snapshot),
        None => None,
    };

    let contact = Contact {
        id: existing
            .as_ref()
            .map(|c| c.id.clone())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        booking_id: booking.id.clone(),
        name: display_name_from_email(email),
        email: email.to_string(),
        phone: phone.to_string(),
        roi_snapshot: roi_snapshot.or_else(|| existing.as_ref().and_then(|c| c.roi_snapshot.clone())),
        source: "chat".to_string(),
        created_at: existing.as_ref().map(|c| c.created_at).unwrap_or(now),
        updated_at: now,
    };

    queries::upsert_contact(conn, &contact)?;
    Ok(contact)
}

/// Sends the confirmation email and records the result against the
/// booking. Failures are logged and recorded, never propagated: the
/// booking change is already committed.
pub async fn send_booking_summary_email(
    db: &Mutex<Connection>,
    notifier: &dyn NotificationService,
    public_base_url: &str,
    booking: &Booking,
    contact: &Contact,
) -> CommunicationStatus {
    let meeting_url = calendar::meeting_url(public_base_url, booking);
    let calendar_url = calendar::calendar_url(public_base_url, booking);
    let message = booking_summary_email(
        booking,
        &contact.name,
        &contact.email,
        SummaryLinks {
            meeting_url: &meeting_url,
            calendar_url: &calendar_url,
            ics: calendar::generate_ics(booking, &meeting_url),
        },
    );

    let (status, detail) = match notifier.send_email(&message).await {
        Ok(Delivery::Sent(id)) => {
            tracing::info!(booking_id = %booking.id, "booking summary email sent");
            (CommunicationStatus::Sent, Some(id))
        }
        Ok(Delivery::Skipped) => (CommunicationStatus::Skipped, None),
        Err(e) => {
            tracing::error!(booking_id = %booking.id, error = %e, "failed to send booking summary email");
            (CommunicationStatus::Failed, Some(e.to_string()))
        }
    };

    let recorded = db::lock(db).and_then(|conn| {
        queries::record_communication(
            &conn,
            &booking.id,
            "email",
            "booking_summary",
            status,
            detail.as_deref(),
        )
    });
    if let Err(e) = recorded {
        tracing::error!(booking_id = %booking.id, error = %e, "failed to record communication");
    }

    status
}
