//! Merged flat snapshot files (`ofac_full_<YYYY-MM-DD>.csv`): the headered
//! join of both list categories, one row per entity × address × alias × comment.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use sanctrack_recon::model::{EntityRecord, ListCategory, Snapshot};

use crate::error::IoError;
use crate::snapshot::{
    address, alt_name, entity_fields, snapshot_from_entities, IngestReport, ADDRESS_COLUMNS,
    ALT_COLUMNS, MAIN_COLUMNS,
};
use crate::source::{parse_ent_num, read_file_as_utf8};

const REQUIRED: [&str; 4] = ["Ent_num", "Country", "Program_cat", "Rep_date"];

/// Report date encoded in a merged file name: the last `_`-separated part of the stem.
pub fn report_date_from_file_name(path: &Path) -> Result<NaiveDate, IoError> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_string();
    path.file_stem()
        .and_then(|s| s.to_str())
        .and_then(|stem| stem.rsplit('_').next())
        .and_then(|tail| NaiveDate::parse_from_str(tail, "%Y-%m-%d").ok())
        .ok_or(IoError::BadFileName(name))
}

/// Column positions resolved from the header row.
struct Columns {
    index: BTreeMap<String, usize>,
}

impl Columns {
    fn new(origin: &str, headers: &csv::StringRecord) -> Result<Self, IoError> {
        let index: BTreeMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim().to_string(), i))
            .collect();
        for column in REQUIRED {
            if !index.contains_key(column) {
                return Err(IoError::MissingColumn {
                    origin: origin.to_string(),
                    column: column.to_string(),
                });
            }
        }
        Ok(Self { index })
    }

    fn get<'r>(&self, record: &'r csv::StringRecord, column: &str) -> &'r str {
        self.index
            .get(column)
            .and_then(|&i| record.get(i))
            .unwrap_or("")
    }

    /// Values of `columns` after the leading `Ent_num`.
    fn values(&self, record: &csv::StringRecord, columns: &[&str]) -> Vec<String> {
        columns[1..]
            .iter()
            .map(|c| self.get(record, c).to_string())
            .collect()
    }
}

fn all_blank(values: &[String]) -> bool {
    values.iter().all(|v| v.trim().is_empty())
}

/// Fold one merged file back into entities and explode it into a snapshot.
pub fn parse_merged(
    origin: &str,
    text: &str,
    report_date: NaiveDate,
    report: &mut IngestReport,
) -> Result<Snapshot, IoError> {
    let csv_err = |source| IoError::Csv {
        origin: origin.to_string(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());
    let columns = Columns::new(origin, reader.headers().map_err(csv_err)?)?;

    let mut entities: BTreeMap<(u64, ListCategory), EntityRecord> = BTreeMap::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        let raw_date = columns.get(&record, "Rep_date").trim();
        let date_part = raw_date.get(..10).unwrap_or(raw_date);
        if NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok() != Some(report_date) {
            return Err(IoError::MixedReportDates {
                origin: origin.to_string(),
                expected: report_date,
                found: raw_date.to_string(),
            });
        }

        let raw_ent = columns.get(&record, "Ent_num");
        let Some(ent_num) = parse_ent_num(raw_ent) else {
            report.reject(origin, line, format!("non-numeric Ent_num '{raw_ent}'"));
            continue;
        };
        let tag = columns.get(&record, "Program_cat").trim();
        let Some(category) = ListCategory::from_tag(tag) else {
            report.reject(origin, line, format!("unknown Program_cat '{tag}'"));
            continue;
        };
        report.rows_accepted += 1;

        let entity = entities.entry((ent_num, category)).or_insert_with(|| {
            EntityRecord::new(
                ent_num,
                category,
                entity_fields(&columns.values(&record, &MAIN_COLUMNS)),
            )
        });
        // Alias-only rows from the outer join carry no main-table fields.
        if entity.fields.sdn_name.trim().is_empty() {
            let fields = columns.values(&record, &MAIN_COLUMNS);
            if !all_blank(&fields) {
                entity.fields = entity_fields(&fields);
            }
        }

        let add = columns.values(&record, &ADDRESS_COLUMNS);
        if !all_blank(&add) {
            entity.addresses.push(address(&add));
        }
        let alt = columns.values(&record, &ALT_COLUMNS);
        if !all_blank(&alt) {
            entity.alt_names.push(alt_name(&alt));
        }
        let comment = columns.get(&record, "Remarks_cont");
        if !comment.trim().is_empty() {
            entity.comments.push(comment.to_string());
        }
    }

    Ok(snapshot_from_entities(
        report_date,
        entities.into_values().collect(),
        report,
    ))
}

/// Files in `dir` whose name matches `pattern`, with their report dates, oldest first.
pub fn discover_history_files(
    dir: &Path,
    pattern: &str,
) -> Result<Vec<(NaiveDate, PathBuf)>, IoError> {
    let matcher = glob::Pattern::new(pattern).map_err(|e| IoError::Pattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })?;
    let read_err = |source| IoError::Read {
        path: dir.to_path_buf(),
        source,
    };
    let opts = glob::MatchOptions {
        case_sensitive: true,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| matcher.matches_with(n, opts))
            .unwrap_or(false);
        if matches {
            files.push((report_date_from_file_name(&path)?, path));
        }
    }
    files.sort();
    Ok(files)
}

/// Load every merged snapshot in `dir`, oldest first. Any unreadable file fails the run.
pub fn load_history_dir(
    dir: &Path,
    pattern: &str,
) -> Result<(Vec<Snapshot>, IngestReport), IoError> {
    let mut report = IngestReport::default();
    let mut snapshots = Vec::new();
    for (date, path) in discover_history_files(dir, pattern)? {
        let text = read_file_as_utf8(&path)?;
        let origin = path.display().to_string();
        let snapshot = parse_merged(&origin, &text, date, &mut report)?;
        tracing::debug!(file = %origin, %date, observations = snapshot.len(), "merged snapshot loaded");
        snapshots.push(snapshot);
    }
    tracing::info!(
        dir = %dir.display(),
        snapshots = snapshots.len(),
        observations = report.observations,
        rejected = report.rejected.len(),
        "history loaded"
    );
    Ok((snapshots, report))
}
