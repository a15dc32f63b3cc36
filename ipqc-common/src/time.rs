//! Timestamp utilities

use chrono::{DateTime, Local, SecondsFormat, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// RFC 3339 text with millisecond precision, as sent to the backend
pub fn to_rfc3339(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Today's local date as YYYY-MM-DD
pub fn today() -> String {
    Local::now().date_naive().format(crate::record::DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // Should be a reasonable timestamp (after year 2000)
        assert!(timestamp.timestamp() > 946_684_800); // 2000-01-01 00:00:00 UTC
    }

    #[test]
    fn test_rfc3339_format() {
        let ts = Utc.with_ymd_and_hms(2026, 10, 16, 6, 30, 0).unwrap();
        assert_eq!(to_rfc3339(ts), "2026-10-16T06:30:00.000Z");
    }

    #[test]
    fn test_today_parses_as_date() {
        let text = today();
        assert!(chrono::NaiveDate::parse_from_str(&text, crate::record::DATE_FORMAT).is_ok());
    }
}
