use std::collections::HashSet;

use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::{params, Connection};

use crate::models::{Booking, BookingStatus, CommunicationStatus, Contact, RoiSession};

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

const BOOKING_COLUMNS: &str = "id, access_token, session_token, date, time, duration_minutes, \
     start_at, end_at, status, demo_expires_at, form_expires_at, created_at, updated_at";

fn fmt_ts(dt: &NaiveDateTime) -> String {
    dt.format(TS_FORMAT).to_string()
}

fn parse_ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, TS_FORMAT).unwrap_or_else(|_| Utc::now().naive_utc())
}

// ── Bookings ──

pub fn insert_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO bookings ({BOOKING_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
        ),
        params![
            booking.id,
            booking.access_token,
            booking.session_token,
            booking.date.format(DATE_FORMAT).to_string(),
            booking.time,
            booking.duration_minutes,
            fmt_ts(&booking.start_at),
            fmt_ts(&booking.end_at),
            booking.status.as_str(),
            fmt_ts(&booking.demo_expires_at),
            booking.form_expires_at.as_ref().map(fmt_ts),
            fmt_ts(&booking.created_at),
            fmt_ts(&booking.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
        params![id],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Looks up a pending/confirmed, unexpired booking by one identifying column.
fn find_active_booking_by(
    conn: &Connection,
    column: &str,
    value: &str,
    now: &NaiveDateTime,
) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings
             WHERE {column} = ?1 AND status IN ('pending', 'confirmed') AND demo_expires_at > ?2
             ORDER BY updated_at DESC LIMIT 1"
        ),
        params![value, fmt_ts(now)],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn find_active_booking_by_id(
    conn: &Connection,
    id: &str,
    now: &NaiveDateTime,
) -> anyhow::Result<Option<Booking>> {
    find_active_booking_by(conn, "id", id, now)
}

pub fn find_active_booking_by_access_token(
    conn: &Connection,
    token: &str,
    now: &NaiveDateTime,
) -> anyhow::Result<Option<Booking>> {
    find_active_booking_by(conn, "access_token", token, now)
}

pub fn find_active_booking_by_session(
    conn: &Connection,
    session_token: &str,
    now: &NaiveDateTime,
) -> anyhow::Result<Option<Booking>> {
    find_active_booking_by(conn, "session_token", session_token, now)
}

pub fn confirmed_times_on(conn: &Connection, date: &NaiveDate) -> anyhow::Result<HashSet<String>> {
    let mut stmt =
        conn.prepare("SELECT time FROM bookings WHERE date = ?1 AND status = 'confirmed'")?;
    let rows = stmt.query_map(params![date.format(DATE_FORMAT).to_string()], |row| {
        row.get::<_, String>(0)
    })?;

    let mut times = HashSet::new();
    for row in rows {
        times.insert(row?);
    }
    Ok(times)
}

pub fn has_confirmed_conflict(
    conn: &Connection,
    date: &NaiveDate,
    time: &str,
    exclude_id: &str,
) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bookings
         WHERE date = ?1 AND time = ?2 AND status = 'confirmed' AND id != ?3",
        params![date.format(DATE_FORMAT).to_string(), time, exclude_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub struct RescheduleWrite<'a> {
    pub id: &'a str,
    pub date: NaiveDate,
    pub time: &'a str,
    pub duration_minutes: i64,
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
    pub demo_expires_at: NaiveDateTime,
    pub form_expires_at: NaiveDateTime,
    pub now: NaiveDateTime,
}

/// Moves an active booking to a new slot and confirms it, but only when no
/// other confirmed booking holds that slot. The conflict test and the write
/// are one statement, and the partial unique index backs it up.
pub fn reschedule_if_free(conn: &Connection, write: &RescheduleWrite) -> anyhow::Result<bool> {
    let date = write.date.format(DATE_FORMAT).to_string();
    let result = conn.execute(
        "UPDATE bookings SET
           date = ?2, time = ?3, duration_minutes = ?4, start_at = ?5, end_at = ?6,
           demo_expires_at = ?7, form_expires_at = ?8, status = 'confirmed', updated_at = ?9
         WHERE id = ?1
           AND status IN ('pending', 'confirmed')
           AND NOT EXISTS (
             SELECT 1 FROM bookings other
             WHERE other.date = ?2 AND other.time = ?3
               AND other.status = 'confirmed' AND other.id != ?1
           )",
        params![
            write.id,
            date,
            write.time,
            write.duration_minutes,
            fmt_ts(&write.start_at),
            fmt_ts(&write.end_at),
            fmt_ts(&write.demo_expires_at),
            fmt_ts(&write.form_expires_at),
            fmt_ts(&write.now),
        ],
    );

    match result {
        Ok(count) => Ok(count > 0),
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

/// Cancels a booking and clears any ROI session pointing at it, atomically.
/// Returns false when the booking was not pending/confirmed; the session
/// cleanup still runs, so retries are safe.
pub fn cancel_booking_and_unlink(
    conn: &mut Connection,
    id: &str,
    now: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let tx = conn.transaction()?;
    let count = tx.execute(
        "UPDATE bookings SET status = ?1, updated_at = ?2
         WHERE id = ?3 AND status IN ('pending', 'confirmed')",
        params![BookingStatus::Cancelled.as_str(), fmt_ts(now), id],
    )?;
    tx.execute(
        "UPDATE roi_sessions SET booking_id = NULL WHERE booking_id = ?1",
        params![id],
    )?;
    tx.commit()?;
    Ok(count > 0)
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let date_str: String = row.get(3)?;
    let status_str: String = row.get(8)?;
    let form_expires_at: Option<String> = row.get(10)?;

    Ok(Booking {
        id: row.get(0)?,
        access_token: row.get(1)?,
        session_token: row.get(2)?,
        date: NaiveDate::parse_from_str(&date_str, DATE_FORMAT)?,
        time: row.get(4)?,
        duration_minutes: row.get(5)?,
        start_at: parse_ts(&row.get::<_, String>(6)?),
        end_at: parse_ts(&row.get::<_, String>(7)?),
        status: BookingStatus::parse(&status_str),
        demo_expires_at: parse_ts(&row.get::<_, String>(9)?),
        form_expires_at: form_expires_at.as_deref().map(parse_ts),
        created_at: parse_ts(&row.get::<_, String>(11)?),
        updated_at: parse_ts(&row.get::<_, String>(12)?),
    })
}

// ── ROI Sessions ──

pub fn insert_roi_session(conn: &Connection, session: &RoiSession) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO roi_sessions (token, booking_id, roi_snapshot, expires_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            session.token,
            session.booking_id,
            serde_json::to_string(&session.roi_snapshot)?,
            fmt_ts(&session.expires_at),
        ],
    )?;
    Ok(())
}

pub fn find_active_session(
    conn: &Connection,
    token: &str,
    now: &NaiveDateTime,
) -> anyhow::Result<Option<RoiSession>> {
    let result = conn.query_row(
        "SELECT token, booking_id, roi_snapshot, expires_at FROM roi_sessions
         WHERE token = ?1 AND expires_at > ?2",
        params![token, fmt_ts(now)],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        },
    );

    match result {
        Ok((token, booking_id, snapshot_json, expires_at)) => Ok(Some(RoiSession {
            token,
            booking_id,
            roi_snapshot: serde_json::from_str(&snapshot_json)
                .unwrap_or(serde_json::json!({})),
            expires_at: parse_ts(&expires_at),
        })),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// ── Contacts ──

pub fn get_contact_by_booking(conn: &Connection, booking_id: &str) -> anyhow::Result<Option<Contact>> {
    let result = conn.query_row(
        "SELECT id, booking_id, name, email, phone, roi_snapshot, source, created_at, updated_at
         FROM contacts WHERE booking_id = ?1",
        params![booking_id],
        |row| {
            let snapshot: Option<String> = row.get(5)?;
            Ok(Contact {
                id: row.get(0)?,
                booking_id: row.get(1)?,
                name: row.get(2)?,
                email: row.get(3)?,
                phone: row.get(4)?,
                roi_snapshot: snapshot.and_then(|s| serde_json::from_str(&s).ok()),
                source: row.get(6)?,
                created_at: parse_ts(&row.get::<_, String>(7)?),
                updated_at: parse_ts(&row.get::<_, String>(8)?),
            })
        },
    );

    match result {
        Ok(contact) => Ok(Some(contact)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn upsert_contact(conn: &Connection, contact: &Contact) -> anyhow::Result<()> {
    let snapshot = contact
        .roi_snapshot
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    conn.execute(
        "INSERT INTO contacts (id, booking_id, name, email, phone, roi_snapshot, source, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(booking_id) DO UPDATE SET
           name = excluded.name,
           email = excluded.email,
           phone = excluded.phone,
           roi_snapshot = COALESCE(excluded.roi_snapshot, contacts.roi_snapshot),
           updated_at = excluded.updated_at",
        params![
            contact.id,
            contact.booking_id,
            contact.name,
            contact.email,
            contact.phone,
            snapshot,
            contact.source,
            fmt_ts(&contact.created_at),
            fmt_ts(&contact.updated_at),
        ],
    )?;
    Ok(())
}

// ── Communication Log ──

pub struct CommunicationRecord {
    pub booking_id: String,
    pub channel: String,
    pub kind: String,
    pub status: String,
    pub detail: Option<String>,
}

pub fn record_communication(
    conn: &Connection,
    booking_id: &str,
    channel: &str,
    kind: &str,
    status: CommunicationStatus,
    detail: Option<&str>,
) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO booking_communications (booking_id, channel, kind, status, detail)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![booking_id, channel, kind, status.as_str(), detail],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_communications(
    conn: &Connection,
    booking_id: &str,
) -> anyhow::Result<Vec<CommunicationRecord>> {
    let mut stmt = conn.prepare(
        "SELECT booking_id, channel, kind, status, detail FROM booking_communications
         WHERE booking_id = ?1 ORDER BY id ASC",
    )?;

    let rows = stmt.query_map(params![booking_id], |row| {
        Ok(CommunicationRecord {
            booking_id: row.get(0)?,
            channel: row.get(1)?,
            kind: row.get(2)?,
            status: row.get(3)?,
            detail: row.get(4)?,
        })
    })?;

    let mut records = vec![];
    for row in rows {
        records.push(row?);
    }
    Ok(records)
}
