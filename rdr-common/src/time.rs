//! Timestamp utilities
//!
//! Client-supplied timestamps arrive as RFC 3339 strings, sometimes with a
//! non-UTC offset and sometimes offset-naive. Everything is normalized to UTC
//! before storage so that persisted and re-emitted values are identical.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};

use crate::{Error, Result};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Parse a client-supplied timestamp, normalizing to UTC.
///
/// Accepts RFC 3339 with any offset; an offset-naive value is treated as UTC.
pub fn parse_client_timestamp(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    // Offset-naive fallback (with or without fractional seconds)
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    Err(Error::InvalidInput(format!("Invalid timestamp: {}", value)))
}

/// Parse a client-supplied calendar date (YYYY-MM-DD)
pub fn parse_client_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| Error::InvalidInput(format!("Invalid date: {}", value)))
}

/// Format a timestamp for storage and client emission (RFC 3339, UTC, Z suffix)
pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse a stored RFC 3339 UTC timestamp
pub fn parse_stored_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Corrupt stored timestamp {}: {}", value, e)))
}

/// Start of the previous calendar day (UTC midnight)
///
/// Default lower bound for the deceased-report import sweep.
pub fn start_of_previous_day() -> DateTime<Utc> {
    let yesterday = Utc::now().date_naive().pred_opt().expect("date out of range");
    Utc.from_utc_datetime(&yesterday.and_hms_opt(0, 0, 0).expect("valid midnight"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_utc_timestamp() {
        let dt = parse_client_timestamp("2020-01-05T13:43:21Z").unwrap();
        assert_eq!(format_timestamp(dt), "2020-01-05T13:43:21Z");
    }

    #[test]
    fn test_parse_offset_timestamp_normalizes_to_utc() {
        // -06:00 offset becomes the UTC-equivalent instant
        let dt = parse_client_timestamp("2020-01-05T13:43:21-06:00").unwrap();
        assert_eq!(format_timestamp(dt), "2020-01-05T19:43:21Z");
    }

    #[test]
    fn test_parse_naive_timestamp_treated_as_utc() {
        let dt = parse_client_timestamp("2020-01-05T13:43:21").unwrap();
        assert_eq!(format_timestamp(dt), "2020-01-05T13:43:21Z");
    }

    #[test]
    fn test_parse_invalid_timestamp_rejected() {
        assert!(parse_client_timestamp("last Tuesday").is_err());
        assert!(parse_client_timestamp("2020-13-45T99:00:00Z").is_err());
    }

    #[test]
    fn test_parse_client_date() {
        let date = parse_client_date("2020-01-02").unwrap();
        assert_eq!(date.to_string(), "2020-01-02");
        assert!(parse_client_date("01/02/2020").is_err());
    }

    #[test]
    fn test_start_of_previous_day_is_midnight() {
        let start = start_of_previous_day();
        assert_eq!(start.format("%H:%M:%S").to_string(), "00:00:00");
        assert!(start < Utc::now());
    }
}
