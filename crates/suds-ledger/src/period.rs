//! Accounting period boundary calculator.
//!
//! Maps any timestamp to the half-open `[start, end)` bounds of its
//! enclosing accounting period, always in UTC. Deterministic with no I/O;
//! this determinism is what keeps ledger-entry natural keys stable.
//!
//! - Monthly periods span one UTC calendar month.
//! - Weekly periods start Monday 00:00:00 UTC of the ISO week (a Sunday
//!   timestamp maps to the *previous* Monday) and end seven days later.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use suds_types::status::PeriodType;

/// Compute the enclosing period bounds for a timestamp.
///
/// Returns `(start, end)` with `end` exclusive.
pub fn period_bounds(period_type: PeriodType, anchor: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let date = anchor.date_naive();
    let (start_date, end_date) = match period_type {
        PeriodType::Monthly => {
            let start = first_of_month(date.year(), date.month());
            let end = if date.month() == 12 {
                first_of_month(date.year() + 1, 1)
            } else {
                first_of_month(date.year(), date.month() + 1)
            };
            (start, end)
        }
        PeriodType::Weekly => {
            let days_from_monday = i64::from(date.weekday().num_days_from_monday());
            let start = date - Duration::days(days_from_monday);
            (start, start + Duration::days(7))
        }
    };
    (midnight_utc(start_date), midnight_utc(end_date))
}

/// Parse a `YYYY-MM-DD` anchor date into midnight UTC of that day.
pub fn anchor_from_date_str(raw: &str) -> Option<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()?;
    Some(midnight_utc(date))
}

fn first_of_month(year: i32, month: u32) -> NaiveDate {
    // Day 1 of a valid (year, month) always exists.
    NaiveDate::from_ymd_opt(year, month, 1).expect("first of month is a valid date")
}

fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    DateTime::from_naive_utc_and_offset(
        date.and_hms_opt(0, 0, 0).expect("midnight is a valid time"),
        Utc,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).single().expect("valid datetime")
    }

    #[test]
    fn test_monthly_mid_month() {
        let (start, end) = period_bounds(PeriodType::Monthly, utc(2024, 3, 15, 12, 30, 0));
        assert_eq!(start, utc(2024, 3, 1, 0, 0, 0));
        assert_eq!(end, utc(2024, 4, 1, 0, 0, 0));
    }

    #[test]
    fn test_monthly_first_instant_maps_to_own_month() {
        let (start, end) = period_bounds(PeriodType::Monthly, utc(2024, 3, 1, 0, 0, 0));
        assert_eq!(start, utc(2024, 3, 1, 0, 0, 0));
        assert_eq!(end, utc(2024, 4, 1, 0, 0, 0));
    }

    #[test]
    fn test_monthly_december_rolls_over_year() {
        let (start, end) = period_bounds(PeriodType::Monthly, utc(2023, 12, 31, 23, 59, 59));
        assert_eq!(start, utc(2023, 12, 1, 0, 0, 0));
        assert_eq!(end, utc(2024, 1, 1, 0, 0, 0));
    }

    #[test]
    fn test_monthly_leap_february() {
        let (start, end) = period_bounds(PeriodType::Monthly, utc(2024, 2, 29, 6, 0, 0));
        assert_eq!(start, utc(2024, 2, 1, 0, 0, 0));
        assert_eq!(end, utc(2024, 3, 1, 0, 0, 0));
    }

    #[test]
    fn test_weekly_monday_starts_own_week() {
        // 2024-03-11 is a Monday.
        let (start, end) = period_bounds(PeriodType::Weekly, utc(2024, 3, 11, 0, 0, 0));
        assert_eq!(start, utc(2024, 3, 11, 0, 0, 0));
        assert_eq!(end, utc(2024, 3, 18, 0, 0, 0));
    }

    #[test]
    fn test_weekly_midweek() {
        // 2024-03-14 is a Thursday.
        let (start, end) = period_bounds(PeriodType::Weekly, utc(2024, 3, 14, 18, 0, 0));
        assert_eq!(start, utc(2024, 3, 11, 0, 0, 0));
        assert_eq!(end, utc(2024, 3, 18, 0, 0, 0));
    }

    #[test]
    fn test_weekly_sunday_maps_to_previous_monday() {
        // 2024-03-17 is a Sunday; its week started 2024-03-11.
        let (start, end) = period_bounds(PeriodType::Weekly, utc(2024, 3, 17, 23, 59, 59));
        assert_eq!(start, utc(2024, 3, 11, 0, 0, 0));
        assert_eq!(end, utc(2024, 3, 18, 0, 0, 0));
    }

    #[test]
    fn test_weekly_spans_month_boundary() {
        // 2024-03-30 is a Saturday; its week started Monday 2024-03-25 and
        // ends Monday 2024-04-01.
        let (start, end) = period_bounds(PeriodType::Weekly, utc(2024, 3, 30, 12, 0, 0));
        assert_eq!(start, utc(2024, 3, 25, 0, 0, 0));
        assert_eq!(end, utc(2024, 4, 1, 0, 0, 0));
    }

    #[test]
    fn test_deterministic_for_same_anchor() {
        let anchor = utc(2024, 3, 15, 9, 41, 7);
        assert_eq!(
            period_bounds(PeriodType::Monthly, anchor),
            period_bounds(PeriodType::Monthly, anchor)
        );
        assert_eq!(
            period_bounds(PeriodType::Weekly, anchor),
            period_bounds(PeriodType::Weekly, anchor)
        );
    }

    #[test]
    fn test_anchor_from_date_str() {
        let anchor = anchor_from_date_str("2024-03-15").expect("parse");
        assert_eq!(anchor, utc(2024, 3, 15, 0, 0, 0));
        assert_eq!(anchor_from_date_str(" 2024-03-15 "), Some(anchor));
        assert!(anchor_from_date_str("03/15/2024").is_none());
        assert!(anchor_from_date_str("2024-13-01").is_none());
        assert!(anchor_from_date_str("").is_none());
    }
}
