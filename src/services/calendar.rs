use crate::models::Booking;

/// RFC 5545 invite for a demo booking. Times are emitted in UTC.
pub fn generate_ics(booking: &Booking, meeting_url: &str) -> String {
    let dtstart = booking.start_at.format("%Y%m%dT%H%M%SZ").to_string();
    let dtend = booking.end_at.format("%Y%m%dT%H%M%SZ").to_string();
    let dtstamp = booking.updated_at.format("%Y%m%dT%H%M%SZ").to_string();
    let uid = format!("{}@vetchat", booking.id);
    let description = escape_text(&format!("Enlace de la videollamada: {meeting_url}"));

    format!(
        "BEGIN:VCALENDAR\r\n\
         VERSION:2.0\r\n\
         PRODID:-//VetChat//Demo Booking//ES\r\n\
         METHOD:REQUEST\r\n\
         BEGIN:VEVENT\r\n\
         UID:{uid}\r\n\
         DTSTAMP:{dtstamp}\r\n\
         DTSTART:{dtstart}\r\n\
         DTEND:{dtend}\r\n\
         SUMMARY:Demo VetChat\r\n\
         DESCRIPTION:{description}\r\n\
         URL:{meeting_url}\r\n\
         STATUS:CONFIRMED\r\n\
         END:VEVENT\r\n\
         END:VCALENDAR\r\n"
    )
}

pub fn meeting_url(public_base_url: &str, booking: &Booking) -> String {
    format!("{public_base_url}/demo/{}", booking.access_token)
}

pub fn calendar_url(public_base_url: &str, booking: &Booking) -> String {
    format!("{public_base_url}/calendar/{}.ics", booking.access_token)
}

fn escape_text(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BookingStatus;
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn booking() -> Booking {
        Booking {
            id: "64b7f0c2a1b2c3d4e5f60718".to_string(),
            access_token: "3f1c2b9a-8d7e-4f60-9a1b-2c3d4e5f6071".to_string(),
            session_token: None,
            date: NaiveDate::from_ymd_opt(2025, 3, 17).unwrap(),
            time: "10:00".to_string(),
            duration_minutes: 30,
            start_at: ts("2025-03-17 09:00:00"),
            end_at: ts("2025-03-17 09:30:00"),
            status: BookingStatus::Confirmed,
            demo_expires_at: ts("2025-03-17 09:30:00"),
            form_expires_at: None,
            created_at: ts("2025-03-10 10:00:00"),
            updated_at: ts("2025-03-11 12:00:00"),
        }
    }

    #[test]
    fn test_generate_ics() {
        let b = booking();
        let url = meeting_url("https://vetchat.example", &b);
        let ics = generate_ics(&b, &url);
        assert!(ics.starts_with("BEGIN:VCALENDAR\r\n"));
        assert!(ics.contains("DTSTART:20250317T090000Z"));
        assert!(ics.contains("DTEND:20250317T093000Z"));
        assert!(ics.contains("DTSTAMP:20250311T120000Z"));
        assert!(ics.contains("UID:64b7f0c2a1b2c3d4e5f60718@vetchat"));
        assert!(ics.contains(
            "URL:https://vetchat.example/demo/3f1c2b9a-8d7e-4f60-9a1b-2c3d4e5f6071"
        ));
        assert!(ics.ends_with("END:VCALENDAR\r\n"));
    }

    #[test]
    fn test_escape_text() {
        assert_eq!(escape_text("a,b;c\nd"), "a\\,b\\;c\\nd");
    }

    #[test]
    fn test_calendar_url() {
        assert_eq!(
            calendar_url("https://vetchat.example", &booking()),
            "https://vetchat.example/calendar/3f1c2b9a-8d7e-4f60-9a1b-2c3d4e5f6071.ics"
        );
    }
}
