//! Calendar helpers for removal inference and panel period labels.

use chrono::{Datelike, NaiveDate};

/// Last day of the calendar month after `date`.
pub fn end_of_following_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    last_day_of_month(year, month)
}

fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    // Day 1 of any month in chrono's supported range always exists.
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .unwrap_or(NaiveDate::MAX)
}

/// Removal date for a key last seen at `last_seen` and found absent at `observed_absent_at`.
///
/// The natural removal date is the end of the month following the last
/// sighting. A removal can never be dated after the run that inferred it, so
/// the result is clamped to `observed_absent_at`.
pub fn removal_date_for(last_seen: NaiveDate, observed_absent_at: NaiveDate) -> NaiveDate {
    end_of_following_month(last_seen).min(observed_absent_at)
}

/// Quarter period label, e.g. `2021Q1`.
pub fn quarter_label(date: NaiveDate) -> String {
    format!("{}Q{}", date.year(), (date.month() - 1) / 3 + 1)
}

/// Month period label, e.g. `2021-01`.
pub fn month_label(date: NaiveDate) -> String {
    format!("{}-{:02}", date.year(), date.month())
}
