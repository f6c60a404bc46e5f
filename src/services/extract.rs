//! Entity extraction from free-text chat messages.
//!
//! Every extractor is pure and total: arbitrary input yields `Some(value)`
//! or `None`, never a panic.

use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}").expect("valid email regex")
});

// Candidate runs of digits with the usual phone separators.
static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\+?\d[\d\s().\-]*\d").expect("valid phone regex"));

static BOOKING_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b[0-9a-f]{24}\b").expect("valid booking id regex"));

static BOOKING_TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b[0-9a-f]{8}-[0-9a-f]{4}-4[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}\b")
        .expect("valid booking token regex")
});

static SLOT_CHOICE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\D)([1-9])(?:\D|$)").expect("valid slot choice regex"));

const MIN_PHONE_DIGITS: usize = 9;
const MAX_PHONE_DIGITS: usize = 15;
const MAX_CITY_CHARS: usize = 80;

/// First email-shaped substring, lower-cased.
pub fn extract_email(text: &str) -> Option<String> {
    EMAIL_RE.find(text).map(|m| m.as_str().to_lowercase())
}

/// First digit run with at least nine digits, with its spacing collapsed.
pub fn extract_phone(text: &str) -> Option<String> {
    PHONE_RE.find_iter(text).find_map(|m| {
        let candidate = m.as_str();
        let digits = candidate.chars().filter(|c| c.is_ascii_digit()).count();
        if !(MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits) {
            return None;
        }
        let cleaned: String = candidate
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '+' || *c == ' ')
            .collect();
        Some(cleaned.split_whitespace().collect::<Vec<_>>().join(" "))
    })
}

/// 24 hex chars, the booking store's primary key shape.
pub fn extract_booking_id(text: &str) -> Option<String> {
    BOOKING_ID_RE.find(text).map(|m| m.as_str().to_lowercase())
}

/// UUID v4, the shape of a booking access token.
pub fn extract_booking_token(text: &str) -> Option<String> {
    BOOKING_TOKEN_RE.find(text).map(|m| m.as_str().to_lowercase())
}

/// Accepts any short non-empty answer. There is no gazetteer behind this.
pub fn extract_city(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_CITY_CHARS {
        return None;
    }
    Some(trimmed.to_string())
}

/// Zero-based index of the first standalone digit 1..=9, if it falls
/// inside `n` proposed slots.
pub fn extract_slot_choice(text: &str, n: usize) -> Option<usize> {
    let caps = SLOT_CHOICE_RE.captures(text)?;
    let digit: usize = caps.get(1)?.as_str().parse().ok()?;
    (digit <= n).then(|| digit - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_email_lowercases_first_match() {
        assert_eq!(
            extract_email("mi correo es Ana.Vet@Clinica.ES gracias"),
            Some("ana.vet@clinica.es".to_string())
        );
        assert_eq!(
            extract_email("a@b.com y c@d.com"),
            Some("a@b.com".to_string())
        );
    }

    #[test]
    fn test_extract_email_none_without_pattern() {
        assert_eq!(extract_email("no tengo email"), None);
        assert_eq!(extract_email("arroba@"), None);
        assert_eq!(extract_email("user@localhost"), None);
        assert_eq!(extract_email(""), None);
    }

    #[test]
    fn test_extract_phone() {
        assert_eq!(
            extract_phone("llámame al +34 612 345 678"),
            Some("+34 612 345 678".to_string())
        );
        assert_eq!(
            extract_phone("612-345-678"),
            Some("612345678".to_string())
        );
        assert_eq!(
            extract_phone("(612) 34 56 78"),
            Some("612 34 56 78".to_string())
        );
    }

    #[test]
    fn test_extract_phone_requires_nine_digits() {
        assert_eq!(extract_phone("12345678"), None);
        assert_eq!(extract_phone("tel 612 34 56"), None);
        assert_eq!(extract_phone("opción 2"), None);
        assert_eq!(extract_phone("+34 61"), None);
    }

    #[test]
    fn test_extract_booking_identifiers() {
        assert_eq!(
            extract_booking_id("mi reserva es 64B7F0C2A1B2C3D4E5F60718"),
            Some("64b7f0c2a1b2c3d4e5f60718".to_string())
        );
        assert_eq!(extract_booking_id("64b7f0c2a1b2c3d4e5f6071"), None);
        assert_eq!(
            extract_booking_token("token 3f1c2b9a-8d7e-4f60-9a1b-2c3d4e5f6071"),
            Some("3f1c2b9a-8d7e-4f60-9a1b-2c3d4e5f6071".to_string())
        );
        // v1 uuids are not access tokens
        assert_eq!(
            extract_booking_token("3f1c2b9a-8d7e-1f60-9a1b-2c3d4e5f6071"),
            None
        );
    }

    #[test]
    fn test_extract_city() {
        assert_eq!(extract_city("  Valencia "), Some("Valencia".to_string()));
        assert_eq!(extract_city("   "), None);
        assert_eq!(extract_city(&"x".repeat(81)), None);
    }

    #[test]
    fn test_extract_slot_choice() {
        assert_eq!(extract_slot_choice("1", 3), Some(0));
        assert_eq!(extract_slot_choice("la opción 3 por favor", 3), Some(2));
        assert_eq!(extract_slot_choice("prefiero la 2.", 3), Some(1));
        assert_eq!(extract_slot_choice("4", 3), None);
        assert_eq!(extract_slot_choice("0", 3), None);
        assert_eq!(extract_slot_choice("12", 3), None);
        assert_eq!(extract_slot_choice("ninguna", 3), None);
        assert_eq!(extract_slot_choice("1", 0), None);
    }

    #[test]
    fn test_extract_slot_choice_is_idempotent() {
        let text = "me viene bien la 2";
        assert_eq!(extract_slot_choice(text, 3), extract_slot_choice(text, 3));
    }

    #[test]
    fn test_extractors_tolerate_garbage() {
        let garbage = "\u{0}\u{FFFF}🐶🐱@@..--++ ñ ü 漢字 \t\n";
        assert_eq!(extract_email(garbage), None);
        assert_eq!(extract_phone(garbage), None);
        assert_eq!(extract_booking_id(garbage), None);
        assert_eq!(extract_booking_token(garbage), None);
        assert_eq!(extract_slot_choice(garbage, 3), None);
    }
}
