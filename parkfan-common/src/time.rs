//! Timestamp utilities

use chrono::{DateTime, Duration, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// True when two timestamps lie within `window` of each other (either order)
pub fn within_window(a: DateTime<Utc>, b: DateTime<Utc>, window: Duration) -> bool {
    (a - b).abs() <= window
}

/// Parse an RFC 3339 timestamp, returning `None` on malformed input
pub fn parse_rfc3339(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // Should be a reasonable timestamp (after year 2000)
        assert!(timestamp.timestamp() > 946_684_800);
    }

    #[test]
    fn test_within_window_is_symmetric() {
        let a = now();
        let b = a + Duration::minutes(9);
        assert!(within_window(a, b, Duration::minutes(10)));
        assert!(within_window(b, a, Duration::minutes(10)));
    }

    #[test]
    fn test_within_window_boundary() {
        let a = now();
        assert!(within_window(a, a + Duration::minutes(10), Duration::minutes(10)));
        assert!(!within_window(a, a + Duration::minutes(11), Duration::minutes(10)));
    }

    #[test]
    fn test_parse_rfc3339_with_offset() {
        let parsed = parse_rfc3339("2024-06-01T10:00:00+02:00").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-06-01T08:00:00+00:00");
    }

    #[test]
    fn test_parse_rfc3339_rejects_garbage() {
        assert!(parse_rfc3339("yesterday").is_none());
    }
}
