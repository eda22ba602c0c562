//! Order numbers: `SF-<base36 millis>-<4 hex chars>`, e.g. `SF-MF3K2Q1Z-7C2A`.
//!
//! Short, URL-safe and time-ordered. Uniqueness is enforced by the
//! checkout session primary key; the random suffix only makes collisions
//! within the same millisecond unlikely.

use chrono::{DateTime, Utc};
use uuid::Uuid;

const PREFIX: &str = "SF";
const ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Generates a fresh order number for `now`.
pub fn generate(now: DateTime<Utc>) -> String {
    let millis = u64::try_from(now.timestamp_millis()).unwrap_or(0);
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(4)
        .collect::<String>()
        .to_uppercase();

    format!("{}-{}-{}", PREFIX, base36(millis), suffix)
}

fn base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(ALPHABET[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_base36() {
        assert_eq!(base36(0), "0");
        assert_eq!(base36(35), "Z");
        assert_eq!(base36(36), "10");
    }

    #[test]
    fn test_format_is_url_safe() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let number = generate(now);

        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "SF");
        assert_eq!(parts[1], base36(now.timestamp_millis() as u64));
        assert_eq!(parts[2].len(), 4);
        assert!(number.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'));
    }

    #[test]
    fn test_consecutive_numbers_differ() {
        let now = Utc::now();
        assert_ne!(generate(now), generate(now));
    }
}
