use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime, Weekday};

/// Kind of day for schedule purposes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayKind {
    /// Monday through Friday
    Weekday,
    /// Saturday and Sunday
    Weekend,
}

/// Current local wall-clock time
pub fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Classify a timestamp as weekday or weekend
pub fn day_kind(now: NaiveDateTime) -> DayKind {
    match now.weekday() {
        Weekday::Sat | Weekday::Sun => DayKind::Weekend,
        _ => DayKind::Weekday,
    }
}

/// Canonical week identifier for usage bucketing
///
/// Weeks start on Sunday at local midnight; the identifier is the date
/// of the most recent Sunday.
pub fn week_id(now: NaiveDateTime) -> NaiveDate {
    let days_back = i64::from(now.weekday().num_days_from_sunday());
    now.date() - Duration::days(days_back)
}

/// Zero-padded "HH:MM" time of day, comparable lexicographically
/// against schedule bounds
pub fn time_of_day(now: NaiveDateTime) -> String {
    now.format("%H:%M").to_string()
}
