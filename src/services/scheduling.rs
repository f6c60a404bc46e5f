use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use rusqlite::Connection;

use crate::db::queries;
use crate::models::Slot;

/// Daily demo grid in clinic wall-clock time: 09:00–12:30 and 15:00–17:30.
pub const DAILY_GRID: [&str; 14] = [
    "09:00", "09:30", "10:00", "10:30", "11:00", "11:30", "12:00", "12:30", "15:00", "15:30",
    "16:00", "16:30", "17:00", "17:30",
];

pub const SLOT_DURATION_MINUTES: i64 = 30;
pub const HORIZON_DAYS: i64 = 30;
pub const DEFAULT_SLOT_LIMIT: usize = 3;

const WEEKDAYS_ES: [&str; 7] = [
    "lunes", "martes", "miércoles", "jueves", "viernes", "sábado", "domingo",
];

const MONTHS_ES: [&str; 12] = [
    "enero", "febrero", "marzo", "abril", "mayo", "junio", "julio", "agosto", "septiembre",
    "octubre", "noviembre", "diciembre",
];

/// Clinic wall-clock time for a UTC instant.
pub fn to_clinic_time(utc: NaiveDateTime, tz: Tz) -> NaiveDateTime {
    Utc.from_utc_datetime(&utc).with_timezone(&tz).naive_local()
}

pub fn clinic_now(tz: Tz) -> NaiveDateTime {
    to_clinic_time(Utc::now().naive_utc(), tz)
}

pub fn parse_grid_time(time: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(time, "%H:%M").ok()
}

pub fn is_business_day(date: &NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// True when the slot is a weekday grid slot.
pub fn is_grid_slot(slot: &Slot) -> bool {
    is_business_day(&slot.date) && DAILY_GRID.contains(&slot.time.as_str())
}

/// UTC start of a slot expressed in clinic time. `None` for a local time
/// skipped by a DST transition.
pub fn slot_start_utc(slot: &Slot, tz: Tz) -> Option<NaiveDateTime> {
    let time = parse_grid_time(&slot.time)?;
    tz.from_local_datetime(&slot.date.and_time(time))
        .earliest()
        .map(|start| start.naive_utc())
}

/// "lunes 6 de enero"
pub fn date_label(date: &NaiveDate) -> String {
    let weekday = WEEKDAYS_ES[date.weekday().num_days_from_monday() as usize];
    let month = MONTHS_ES[date.month0() as usize];
    format!("{weekday} {} de {month}", date.day())
}

pub fn slot_label(date: &NaiveDate, time: &str) -> String {
    format!("{} a las {time}", date_label(date))
}

/// Walks business days from `now` (clinic time) across the horizon and
/// collects up to `limit` free grid slots in chronological order. Store
/// failures are logged and reported as no availability.
pub fn build_slots(conn: &Connection, now: NaiveDateTime, limit: usize) -> Vec<Slot> {
    let mut slots = Vec::with_capacity(limit);
    if limit == 0 {
        return slots;
    }

    let today = now.date();
    for offset in 0..HORIZON_DAYS {
        let date = today + Duration::days(offset);
        if !is_business_day(&date) {
            continue;
        }

        let occupied = match queries::confirmed_times_on(conn, &date) {
            Ok(times) => times,
            Err(e) => {
                tracing::error!(error = %e, %date, "failed to load confirmed bookings");
                return Vec::new();
            }
        };

        for time in DAILY_GRID {
            if occupied.contains(time) {
                continue;
            }
            if date == today {
                match parse_grid_time(time) {
                    Some(t) if date.and_time(t) > now => {}
                    _ => continue,
                }
            }
            slots.push(Slot {
                date,
                time: time.to_string(),
                label: slot_label(&date, time),
            });
            if slots.len() >= limit {
                return slots;
            }
        }
    }

    slots
}

/// Numbered list used in chat replies.
pub fn format_slot_list(slots: &[Slot]) -> String {
    slots
        .iter()
        .enumerate()
        .map(|(i, slot)| format!("{}. {}", i + 1, slot.label))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{Booking, BookingStatus};

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn seed(conn: &Connection, id: &str, day: &str, time: &str, status: BookingStatus) {
        let start = dt(&format!("{day} {time}"));
        let booking = Booking {
            id: id.to_string(),
            access_token: uuid::Uuid::new_v4().to_string(),
            session_token: None,
            date: date(day),
            time: time.to_string(),
            duration_minutes: 30,
            start_at: start,
            end_at: start + Duration::minutes(30),
            status,
            demo_expires_at: start + Duration::minutes(30),
            form_expires_at: None,
            created_at: start,
            updated_at: start,
        };
        queries::insert_booking(conn, &booking).unwrap();
    }

    #[test]
    fn test_grid_has_fourteen_slots() {
        assert_eq!(DAILY_GRID.len(), 14);
        assert!(DAILY_GRID.iter().all(|t| parse_grid_time(t).is_some()));
    }

    #[test]
    fn test_first_slots_of_a_free_monday() {
        let conn = setup_db();
        // 2025-01-06 is a Monday
        let slots = build_slots(&conn, dt("2025-01-06 08:00"), 3);
        let times: Vec<_> = slots.iter().map(|s| s.time.as_str()).collect();
        assert_eq!(times, vec!["09:00", "09:30", "10:00"]);
        assert!(slots.iter().all(|s| s.date == date("2025-01-06")));
        assert_eq!(slots[0].label, "lunes 6 de enero a las 09:00");
    }

    #[test]
    fn test_skips_confirmed_but_not_pending() {
        let conn = setup_db();
        seed(&conn, "aaaaaaaaaaaaaaaaaaaaaaa1", "2025-01-06", "09:00", BookingStatus::Confirmed);
        seed(&conn, "aaaaaaaaaaaaaaaaaaaaaaa2", "2025-01-06", "09:30", BookingStatus::Pending);
        seed(&conn, "aaaaaaaaaaaaaaaaaaaaaaa3", "2025-01-06", "10:00", BookingStatus::Cancelled);

        let slots = build_slots(&conn, dt("2025-01-06 08:00"), 3);
        let times: Vec<_> = slots.iter().map(|s| s.time.as_str()).collect();
        assert_eq!(times, vec!["09:30", "10:00", "10:30"]);
    }

    #[test]
    fn test_skips_past_times_today() {
        let conn = setup_db();
        let slots = build_slots(&conn, dt("2025-01-06 12:10"), 2);
        let times: Vec<_> = slots.iter().map(|s| s.time.as_str()).collect();
        assert_eq!(times, vec!["12:30", "15:00"]);
    }

    #[test]
    fn test_friday_evening_rolls_to_monday() {
        let conn = setup_db();
        // 2025-01-10 is a Friday
        let slots = build_slots(&conn, dt("2025-01-10 17:45"), 1);
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].date, date("2025-01-13"));
        assert_eq!(slots[0].time, "09:00");
    }

    #[test]
    fn test_never_exceeds_limit_or_includes_weekends() {
        let conn = setup_db();
        let slots = build_slots(&conn, dt("2025-01-06 08:00"), 50);
        assert_eq!(slots.len(), 50);
        assert!(slots.iter().all(|s| is_business_day(&s.date)));
        assert!(slots.iter().all(is_grid_slot));
        assert!(slots.windows(2).all(|w| (w[0].date, &w[0].time) < (w[1].date, &w[1].time)));
    }

    #[test]
    fn test_zero_limit_is_empty() {
        let conn = setup_db();
        assert!(build_slots(&conn, dt("2025-01-06 08:00"), 0).is_empty());
    }

    fn slot_at(day: &str, time: &str) -> Slot {
        Slot {
            date: date(day),
            time: time.to_string(),
            label: String::new(),
        }
    }

    #[test]
    fn test_slot_start_utc_follows_madrid_dst() {
        let madrid = chrono_tz::Europe::Madrid;
        // CET in winter, CEST in summer
        assert_eq!(slot_start_utc(&slot_at("2025-01-06", "09:00"), madrid), Some(dt("2025-01-06 08:00")));
        assert_eq!(slot_start_utc(&slot_at("2025-07-07", "09:00"), madrid), Some(dt("2025-07-07 07:00")));
        // last Sunday of March skips 02:00-03:00
        assert_eq!(slot_start_utc(&slot_at("2025-03-30", "02:30"), madrid), None);
    }

    #[test]
    fn test_clinic_time_in_summer() {
        let madrid = chrono_tz::Europe::Madrid;
        assert_eq!(to_clinic_time(dt("2025-07-07 06:45"), madrid), dt("2025-07-07 08:45"));
        assert_eq!(to_clinic_time(dt("2025-01-06 06:45"), madrid), dt("2025-01-06 07:45"));
    }

    #[test]
    fn test_format_slot_list() {
        let conn = setup_db();
        let slots = build_slots(&conn, dt("2025-01-06 08:00"), 2);
        assert_eq!(
            format_slot_list(&slots),
            "1. lunes 6 de enero a las 09:00\n2. lunes 6 de enero a las 09:30"
        );
    }
}
