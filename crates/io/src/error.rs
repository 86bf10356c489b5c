use std::path::PathBuf;

use chrono::NaiveDate;
use sanctrack_recon::ReconError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
    /// Source file missing or unreadable.
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    /// CSV structure error (unbalanced quotes, bad UTF-8 after decoding, etc.).
    #[error("{origin}: {source}")]
    Csv { origin: String, source: csv::Error },
    #[error("{origin}: {source}")]
    Json {
        origin: String,
        source: serde_json::Error,
    },
    #[error("{origin}: missing column '{column}'")]
    MissingColumn { origin: String, column: String },
    /// Merged snapshot file name does not end in `_<YYYY-MM-DD>.csv`.
    #[error("cannot take report date from file name '{0}'")]
    BadFileName(String),
    #[error("{origin}: Rep_date '{found}' does not match file date {expected}")]
    MixedReportDates {
        origin: String,
        expected: NaiveDate,
        found: String,
    },
    #[error("bad file pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },
    /// Persisted tracked list is internally inconsistent.
    #[error("{origin} line {line}: {message}")]
    Malformed {
        origin: String,
        line: u64,
        message: String,
    },
    #[error(transparent)]
    Recon(#[from] ReconError),
}
