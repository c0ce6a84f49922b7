//! Calendar Interval Resolver: aligns rate-limit windows to Gregorian calendar
//! boundaries (second/minute/hour/day/week/month/year) instead of a rolling
//! duration from `created_at`.
//!
//! Built on `chrono`'s civil-calendar arithmetic rather than hand-rolled
//! millisecond bookkeeping, since leap years and variable month lengths are
//! exactly what a date library exists to get right.

use crate::error::{CoreError, Result};
use chrono::{DateTime, Datelike, Days, TimeZone, Timelike, Utc};

const MS_PER_SECOND: u64 = 1_000;
const MS_PER_MINUTE: u64 = 60_000;
const MS_PER_HOUR: u64 = 3_600_000;
const MS_PER_DAY: u64 = 86_400_000;
const MS_PER_WEEK: u64 = 604_800_000;
const MS_PER_MONTH_NOMINAL: u64 = 2_629_800_000;
const MS_PER_YEAR_NOMINAL: u64 = 31_557_600_000;

fn ms_to_datetime(ms: u64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms as i64)
        .single()
        .expect("millisecond timestamp out of range")
}

fn datetime_to_ms(dt: DateTime<Utc>) -> u64 {
    dt.timestamp_millis().max(0) as u64
}

fn start_of_second(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt - chrono::Duration::nanoseconds(dt.timestamp_subsec_nanos() as i64)
}

fn start_of_minute(dt: DateTime<Utc>) -> DateTime<Utc> {
    let s = start_of_second(dt);
    s - chrono::Duration::seconds(s.second() as i64)
}

fn start_of_hour(dt: DateTime<Utc>) -> DateTime<Utc> {
    let m = start_of_minute(dt);
    m - chrono::Duration::minutes(m.minute() as i64)
}

fn start_of_day(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.date_naive()
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always valid")
        .and_utc()
}

fn days_in_month(year: i32, month: u32) -> u64 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let first_of_this = Utc
        .with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .expect("valid first-of-month");
    let first_of_next = Utc
        .with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0)
        .single()
        .expect("valid first-of-next-month");
    (first_of_next - first_of_this).num_days() as u64
}

fn days_in_year(year: i32) -> u64 {
    let first_of_this = Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).single().unwrap();
    let first_of_next = Utc.with_ymd_and_hms(year + 1, 1, 1, 0, 0, 0).single().unwrap();
    (first_of_next - first_of_this).num_days() as u64
}

/// Returns the absolute millisecond instant equal to the end of the calendar
/// interval implied by `duration_ms`, as of `now`.
///
/// Fails with [`CoreError::InvalidGregorianDuration`] if `duration_ms` is not
/// one of the seven recognized values.
pub fn gregorian_expiration(now: u64, duration_ms: u64) -> Result<u64> {
    let dt = ms_to_datetime(now);
    let one_ms = chrono::Duration::milliseconds(1);

    let end = match duration_ms {
        MS_PER_SECOND => start_of_second(dt) + chrono::Duration::seconds(1) - one_ms,
        MS_PER_MINUTE => start_of_minute(dt) + chrono::Duration::minutes(1) - one_ms,
        MS_PER_HOUR => start_of_hour(dt) + chrono::Duration::hours(1) - one_ms,
        MS_PER_DAY => start_of_day(dt) + chrono::Duration::days(1) - one_ms,
        MS_PER_WEEK => {
            // Week ends Saturday 23:59:59.999 UTC.
            let today_idx = dt.weekday().num_days_from_monday() as i64; // Mon=0 .. Sun=6
            let saturday_idx = 5i64;
            let days_until = (saturday_idx - today_idx).rem_euclid(7);
            let target_date = dt.date_naive() + Days::new(days_until as u64);
            target_date
                .and_hms_milli_opt(23, 59, 59, 999)
                .expect("valid end-of-day time")
                .and_utc()
        }
        MS_PER_MONTH_NOMINAL => {
            let (year, month) = (dt.year(), dt.month());
            let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
            let first_of_next = Utc
                .with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0)
                .single()
                .expect("valid first-of-next-month");
            first_of_next - one_ms
        }
        MS_PER_YEAR_NOMINAL => {
            let first_of_next_year = Utc
                .with_ymd_and_hms(dt.year() + 1, 1, 1, 0, 0, 0)
                .single()
                .expect("valid first-of-next-year");
            first_of_next_year - one_ms
        }
        other => return Err(CoreError::invalid_gregorian_duration(other)),
    };

    Ok(datetime_to_ms(end))
}

/// Returns the full length, in milliseconds, of the calendar interval implied
/// by `duration_ms` that contains `now`.
///
/// Used by the leaky-bucket engine to compute a leak rate over the whole
/// Gregorian interval rather than the remainder truncated by `now`.
pub fn gregorian_duration(now: u64, duration_ms: u64) -> Result<u64> {
    let dt = ms_to_datetime(now);
    let len = match duration_ms {
        MS_PER_SECOND => MS_PER_SECOND,
        MS_PER_MINUTE => MS_PER_MINUTE,
        MS_PER_HOUR => MS_PER_HOUR,
        MS_PER_DAY => MS_PER_DAY,
        MS_PER_WEEK => MS_PER_WEEK,
        MS_PER_MONTH_NOMINAL => days_in_month(dt.year(), dt.month()) * MS_PER_DAY,
        MS_PER_YEAR_NOMINAL => days_in_year(dt.year()) * MS_PER_DAY,
        other => return Err(CoreError::invalid_gregorian_duration(other)),
    };
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ms(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32, milli: u32) -> u64 {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s)
            .single()
            .unwrap()
            .timestamp_millis() as u64
            + milli as u64
    }

    #[test]
    fn end_of_second() {
        let now = ms(2024, 3, 15, 10, 30, 5, 250);
        let end = gregorian_expiration(now, 1_000).unwrap();
        assert_eq!(end, ms(2024, 3, 15, 10, 30, 5, 999));
    }

    #[test]
    fn end_of_minute() {
        let now = ms(2024, 3, 15, 10, 30, 5, 250);
        let end = gregorian_expiration(now, 60_000).unwrap();
        assert_eq!(end, ms(2024, 3, 15, 10, 30, 59, 999));
    }

    #[test]
    fn end_of_hour() {
        let now = ms(2024, 3, 15, 10, 30, 5, 250);
        let end = gregorian_expiration(now, 3_600_000).unwrap();
        assert_eq!(end, ms(2024, 3, 15, 10, 59, 59, 999));
    }

    #[test]
    fn end_of_day() {
        let now = ms(2024, 3, 15, 10, 30, 5, 250);
        let end = gregorian_expiration(now, 86_400_000).unwrap();
        assert_eq!(end, ms(2024, 3, 15, 23, 59, 59, 999));
    }

    #[test]
    fn end_of_week_from_midweek() {
        // 2024-03-15 is a Friday.
        let now = ms(2024, 3, 15, 10, 30, 5, 250);
        let end = gregorian_expiration(now, 604_800_000).unwrap();
        assert_eq!(end, ms(2024, 3, 16, 23, 59, 59, 999));
    }

    #[test]
    fn end_of_week_when_already_saturday() {
        // 2024-03-16 is a Saturday.
        let now = ms(2024, 3, 16, 10, 0, 0, 0);
        let end = gregorian_expiration(now, 604_800_000).unwrap();
        assert_eq!(end, ms(2024, 3, 16, 23, 59, 59, 999));
    }

    #[test]
    fn end_of_month_and_duration_matches_days_in_month() {
        let now = ms(2024, 2, 10, 0, 0, 0, 0); // 2024 is a leap year: Feb has 29 days.
        let end = gregorian_expiration(now, 2_629_800_000).unwrap();
        assert_eq!(end, ms(2024, 2, 29, 23, 59, 59, 999));
        let dur = gregorian_duration(now, 2_629_800_000).unwrap();
        assert_eq!(dur, 29 * MS_PER_DAY);
    }

    #[test]
    fn end_of_year_and_duration_accounts_for_leap_years() {
        let now = ms(2023, 6, 1, 0, 0, 0, 0); // 2023 is not a leap year.
        let end = gregorian_expiration(now, 31_557_600_000).unwrap();
        assert_eq!(end, ms(2023, 12, 31, 23, 59, 59, 999));
        let dur = gregorian_duration(now, 31_557_600_000).unwrap();
        assert_eq!(dur, 365 * MS_PER_DAY);

        let leap_now = ms(2024, 6, 1, 0, 0, 0, 0);
        let leap_dur = gregorian_duration(leap_now, 31_557_600_000).unwrap();
        assert_eq!(leap_dur, 366 * MS_PER_DAY);
    }

    #[test]
    fn unrecognized_duration_is_rejected() {
        let err = gregorian_expiration(0, 42).unwrap_err();
        assert!(err.is_invalid_gregorian_duration());
        let err = gregorian_duration(0, 42).unwrap_err();
        assert!(err.is_invalid_gregorian_duration());
    }
}
