// Copyright © 2024 Blogsmith. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # Date Formatting
//!
//! Pure helpers turning timestamps into the two strings templates need: a
//! human-readable date and an HTML `datetime` attribute value. Everything is
//! evaluated in UTC so output does not depend on the machine building the
//! site.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Formats a timestamp as `Wednesday, 10 January 2024`.
pub fn readable_date(date: &DateTime<Utc>) -> String {
    date.format("%A, %-d %B %Y").to_string()
}

/// Formats a timestamp as a valid HTML date string, `2024-01-10`.
pub fn html_date_string(date: &DateTime<Utc>) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parses the date formats accepted in front matter.
///
/// Accepts RFC 3339 (`2024-01-10T08:30:00Z`, offsets are converted to UTC),
/// plain dates (`2024-01-10`, midnight UTC), and naive date-times
/// (`2024-01-10 08:30` or `2024-01-10 08:30:00`, taken as UTC).
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(date) = DateTime::parse_from_rfc3339(value) {
        return Some(date.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_readable_date() {
        assert_eq!(readable_date(&ymd(2024, 1, 10)), "Wednesday, 10 January 2024");
        assert_eq!(readable_date(&ymd(2023, 3, 5)), "Sunday, 5 March 2023");
    }

    #[test]
    fn test_html_date_string() {
        assert_eq!(html_date_string(&ymd(2024, 1, 10)), "2024-01-10");
    }

    #[test]
    fn test_offset_is_normalised_to_utc() {
        let date = parse_date("2024-01-10T01:00:00+02:00").unwrap();
        assert_eq!(html_date_string(&date), "2024-01-09");
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("2024-01-10"), Some(ymd(2024, 1, 10)));
        assert_eq!(
            parse_date("2024-01-10 08:30"),
            Some(Utc.with_ymd_and_hms(2024, 1, 10, 8, 30, 0).unwrap())
        );
        assert_eq!(
            parse_date("2024-01-10T08:30:15Z"),
            Some(Utc.with_ymd_and_hms(2024, 1, 10, 8, 30, 15).unwrap())
        );
        assert!(parse_date("January 10th").is_none());
        assert!(parse_date("2024-13-01").is_none());
    }
}
