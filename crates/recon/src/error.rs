use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),
    /// Config validation error (empty file name, conflicting country mapping, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),
    /// Historical reconciliation was given no snapshots.
    #[error("no snapshots to reconcile")]
    EmptyHistory,
    /// Two snapshots carry the same report date.
    #[error("duplicate report date {date}: snapshots must have distinct dates")]
    DuplicateReportDate { date: NaiveDate },
    /// Snapshots are not in ascending report-date order.
    #[error("snapshots out of order: {next} follows {prev}")]
    UnsortedSnapshots { prev: NaiveDate, next: NaiveDate },
    /// Incremental snapshot is older than what the tracked list already covers.
    #[error("snapshot dated {snapshot} is not after latest tracked report date {latest}")]
    StaleSnapshot { snapshot: NaiveDate, latest: NaiveDate },
    /// Snapshot with zero observations would remove every open lifecycle.
    #[error("snapshot dated {date} is empty and would mark {open} open lifecycle(s) as removed")]
    EmptySnapshot { date: NaiveDate, open: usize },
    /// Tracked list violates a lifecycle invariant.
    #[error("tracked list integrity error: {0}")]
    Integrity(String),
    /// Cumulative level dropped below zero.
    #[error("negative level {level} for '{country}' at {date}")]
    NegativeLevel { country: String, date: NaiveDate, level: i64 },
}
