// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
///
/// Millisecond precision keeps lexicographic order equal to time order,
/// which the newest-first notification listing relies on.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Current time as an RFC3339 string.
pub fn now_rfc3339() -> String {
    format_utc_rfc3339(Utc::now())
}

/// Parse a user-supplied date.
///
/// Accepts RFC3339, a `datetime-local` value (`2025-03-01T14:30`), or a
/// bare date (midnight UTC).
pub fn parse_user_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_common_shapes() {
        let rfc = parse_user_datetime("2025-03-01T14:30:00Z").unwrap();
        let local = parse_user_datetime("2025-03-01T14:30").unwrap();
        assert_eq!(rfc, local);

        let date_only = parse_user_datetime("2025-03-01").unwrap();
        assert_eq!(format_utc_rfc3339(date_only), "2025-03-01T00:00:00.000Z");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_user_datetime("").is_none());
        assert!(parse_user_datetime("next tuesday").is_none());
        assert!(parse_user_datetime("2025-13-45").is_none());
    }
}
