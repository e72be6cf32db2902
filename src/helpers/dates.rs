use chrono::{Datelike, Duration, NaiveDate};
use tracing::info;

/// chrono rendering of `dd/MM/yyyy`.
pub const DEFAULT_DATE_FORMAT: &str = "%d/%m/%Y";

/// The Monday on or before `today`.
pub fn week_anchor(today: NaiveDate) -> NaiveDate {
    let days_since_monday = today.weekday().num_days_from_monday();
    let anchor = today - Duration::days(i64::from(days_since_monday));

    info!("Calculated week anchor {} for date {}", anchor, today);
    anchor
}

/// First and last day of the week `offset` weeks after `anchor`.
pub fn week_range(anchor: NaiveDate, offset: u32) -> (NaiveDate, NaiveDate) {
    let start = anchor + Duration::days(7 * i64::from(offset));
    let end = start + Duration::days(6);
    (start, end)
}

/// `start - end` for the week `offset` weeks after `anchor`.
pub fn format_week_range(anchor: NaiveDate, offset: u32, pattern: &str) -> String {
    let (start, end) = week_range(anchor, offset);
    format!("{} - {}", start.format(pattern), end.format(pattern))
}

/// Formatted ranges for weeks `0..count`, in increasing date order.
pub fn week_ranges(anchor: NaiveDate, count: u32, pattern: &str) -> impl Iterator<Item = String> + '_ {
    (0..count).map(move |offset| format_week_range(anchor, offset, pattern))
}

/// Checks that `pattern` formats a calendar date without error.
///
/// Time-of-day or offset fields parse fine but fail when rendered from a
/// `NaiveDate`, so the pattern is tried on a sample date.
pub fn validate_pattern(pattern: &str) -> bool {
    use std::fmt::Write;

    if pattern.is_empty() {
        return false;
    }
    let mut rendered = String::new();
    write!(rendered, "{}", NaiveDate::default().format(pattern)).is_ok()
}
