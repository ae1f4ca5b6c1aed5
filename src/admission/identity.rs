//! Identity comparison primitives shared by every duplicate check.
//!
//! Equality throughout the service: normalized-string equality for names and
//! free text, raw equality for opaque identifiers (NPI, MRN), and UTC
//! calendar-date equality for timestamps.

use chrono::{DateTime, NaiveDate, Utc};

/// Normalize a name for comparison: trim + lowercase.
pub fn normalize_name(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Normalize a free-text identifier, e.g. a medication name. Medication
/// names are identifiers for duplicate purposes, not display strings, and
/// get the same rule as names.
pub fn normalize_identifier(value: &str) -> String {
    value.trim().to_lowercase()
}

/// The UTC calendar date of a timestamp, discarding time-of-day. Two
/// timestamps that differ only in time-of-day are equal under this function;
/// two that span midnight are not, however close.
pub fn date_only(value: DateTime<Utc>) -> NaiveDate {
    value.date_naive()
}

/// Whether two timestamps fall in the same UTC calendar-day bucket.
pub fn same_calendar_day(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    date_only(a) == date_only(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_compare_case_and_whitespace_insensitively() {
        assert_eq!(normalize_name("  DR. ALICE "), normalize_name("dr. alice"));
        assert_ne!(normalize_name("Dr. Alice"), normalize_name("Dr. Bob"));
    }

    #[test]
    fn medication_names_use_the_same_rule() {
        assert_eq!(
            normalize_identifier(" Lisinopril  "),
            normalize_identifier("LISINOPRIL")
        );
    }

    #[test]
    fn same_day_ignores_time_of_day() {
        let morning: DateTime<Utc> = "2024-01-03T09:00:00Z".parse().unwrap();
        let afternoon: DateTime<Utc> = "2024-01-03T10:20:30Z".parse().unwrap();
        assert!(same_calendar_day(morning, afternoon));
    }

    #[test]
    fn seconds_across_midnight_are_different_days() {
        let before: DateTime<Utc> = "2024-01-03T23:59:59Z".parse().unwrap();
        let after: DateTime<Utc> = "2024-01-04T00:00:01Z".parse().unwrap();
        assert!(!same_calendar_day(before, after));
    }
}
