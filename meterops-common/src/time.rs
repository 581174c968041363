//! Timestamp utilities
//!
//! Timestamps are stored as Unix epoch milliseconds and exchanged over the
//! API as RFC 3339 strings.

use chrono::{DateTime, LocalResult, NaiveTime, TimeZone, Utc};

use crate::{Error, Result};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current time as Unix epoch milliseconds
pub fn now_millis() -> i64 {
    now().timestamp_millis()
}

/// Convert stored epoch milliseconds back into a UTC timestamp
///
/// Out-of-range values collapse to the Unix epoch.
pub fn from_millis(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).single().unwrap_or_default()
}

/// Parse an RFC 3339 string into a UTC timestamp
pub fn parse_rfc3339(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::InvalidInput(format!("Invalid timestamp '{}': {}", value, e)))
}

/// Midnight at the start of `now`'s calendar day in its own time zone
///
/// Callers pass `chrono::Local::now()` for the server-local cutoff.
/// When midnight does not exist (DST gap), the wall-clock distance from
/// midnight is subtracted from `now` instead.
pub fn start_of_day<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Utc> {
    let midnight = now.date_naive().and_time(NaiveTime::MIN);
    match now.timezone().from_local_datetime(&midnight) {
        LocalResult::Single(t) | LocalResult::Ambiguous(t, _) => t.with_timezone(&Utc),
        LocalResult::None => now.with_timezone(&Utc) - (now.naive_local() - midnight),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // Should be a reasonable timestamp (after year 2000)
        assert!(timestamp.timestamp() > 946_684_800);
    }

    #[test]
    fn test_millis_conversion_preserves_instant() {
        let ts = parse_rfc3339("2025-01-01T12:34:56.789Z").unwrap();
        assert_eq!(from_millis(ts.timestamp_millis()), ts);
    }

    #[test]
    fn test_parse_rfc3339_normalizes_offset() {
        let ts = parse_rfc3339("2025-01-01T02:00:00+02:00").unwrap();
        assert_eq!(ts, parse_rfc3339("2025-01-01T00:00:00Z").unwrap());
    }

    #[test]
    fn test_parse_rfc3339_rejects_garbage() {
        assert!(matches!(parse_rfc3339("yesterday"), Err(Error::InvalidInput(_))));
        assert!(parse_rfc3339("2025-01-01").is_err());
    }

    #[test]
    fn test_start_of_day_in_utc() {
        let now = parse_rfc3339("2025-03-10T15:20:00Z").unwrap();
        assert_eq!(start_of_day(&now), parse_rfc3339("2025-03-10T00:00:00Z").unwrap());
    }

    #[test]
    fn test_start_of_day_uses_local_calendar_day() {
        // 01:30 at UTC+05:00 is still the previous day in UTC
        let offset = FixedOffset::east_opt(5 * 3600).unwrap();
        let now = parse_rfc3339("2025-03-09T20:30:00Z")
            .unwrap()
            .with_timezone(&offset);

        assert_eq!(
            start_of_day(&now),
            parse_rfc3339("2025-03-09T19:00:00Z").unwrap()
        );
    }
}
