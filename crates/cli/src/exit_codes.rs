//! CLI Exit Code Registry
//!
//! Single source of truth for `sanctrack` exit codes. Scheduled monthly
//! runs branch on these, so they are part of the shell contract.
//!
//! | Code | Meaning                                                   |
//! |------|-----------------------------------------------------------|
//! | 0    | Success                                                   |
//! | 1    | General error (unspecified)                               |
//! | 2    | Usage error (bad arguments, bad file pattern)             |
//! | 3    | Ingest rejected rows under `--strict`                     |
//! | 4    | Config file invalid                                       |
//! | 5    | Source unavailable or unreadable, write failure           |
//! | 6    | Integrity: duplicate/stale dates, corrupt tracked list, negative level |
//! | 7    | Empty snapshot needs `--allow-empty`                      |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Map the error variant in `exit_code_for_*`

use sanctrack_io::IoError;
use sanctrack_recon::ReconError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

/// `--strict` and the ingest report lists rejected rows. Nothing was written.
pub const EXIT_INGEST_REJECTED: u8 = 3;

/// Config failed to parse or validate.
pub const EXIT_CONFIG_INVALID: u8 = 4;

/// A source file is missing, unreadable or structurally broken, or an
/// output could not be written.
pub const EXIT_SOURCE: u8 = 5;

/// Duplicate or out-of-order report dates, stale snapshot, corrupt tracked
/// list, or a negative panel level.
pub const EXIT_INTEGRITY: u8 = 6;

/// Snapshot has no observations while lifecycles are open.
pub const EXIT_EMPTY_SNAPSHOT: u8 = 7;

pub fn exit_code_for_recon(err: &ReconError) -> u8 {
    match err {
        ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => EXIT_CONFIG_INVALID,
        ReconError::EmptyHistory => EXIT_SOURCE,
        ReconError::DuplicateReportDate { .. }
        | ReconError::UnsortedSnapshots { .. }
        | ReconError::StaleSnapshot { .. }
        | ReconError::Integrity(_)
        | ReconError::NegativeLevel { .. } => EXIT_INTEGRITY,
        ReconError::EmptySnapshot { .. } => EXIT_EMPTY_SNAPSHOT,
    }
}

pub fn exit_code_for_io(err: &IoError) -> u8 {
    match err {
        IoError::Read { .. }
        | IoError::Write { .. }
        | IoError::Csv { .. }
        | IoError::MissingColumn { .. }
        | IoError::BadFileName(_)
        | IoError::MixedReportDates { .. } => EXIT_SOURCE,
        IoError::Json { .. } | IoError::Malformed { .. } => EXIT_INTEGRITY,
        IoError::Pattern { .. } => EXIT_USAGE,
        IoError::Recon(e) => exit_code_for_recon(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn recon_errors_mapped() {
        let date = NaiveDate::from_ymd_opt(2021, 1, 31).unwrap();
        assert_eq!(exit_code_for_recon(&ReconError::ConfigParse("x".into())), EXIT_CONFIG_INVALID);
        assert_eq!(
            exit_code_for_recon(&ReconError::StaleSnapshot { snapshot: date, latest: date }),
            EXIT_INTEGRITY
        );
        assert_eq!(
            exit_code_for_recon(&ReconError::EmptySnapshot { date, open: 3 }),
            EXIT_EMPTY_SNAPSHOT
        );
    }

    #[test]
    fn wrapped_recon_error_keeps_its_code() {
        let err = IoError::Recon(ReconError::Integrity("overlap".into()));
        assert_eq!(exit_code_for_io(&err), EXIT_INTEGRITY);
        assert_eq!(exit_code_for_io(&IoError::BadFileName("x.csv".into())), EXIT_SOURCE);
    }

    #[test]
    fn codes_are_distinct() {
        let codes = [
            EXIT_SUCCESS,
            EXIT_ERROR,
            EXIT_USAGE,
            EXIT_INGEST_REJECTED,
            EXIT_CONFIG_INVALID,
            EXIT_SOURCE,
            EXIT_INTEGRITY,
            EXIT_EMPTY_SNAPSHOT,
        ];
        let unique: std::collections::BTreeSet<_> = codes.iter().collect();
        assert_eq!(unique.len(), codes.len());
    }
}
