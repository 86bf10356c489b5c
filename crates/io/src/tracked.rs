//! Tracked-list persistence: one CSV row per distinct record, plus a JSON
//! manifest carrying the report dates that fed the list.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use sanctrack_recon::model::{
    EntityFields, EntityPayload, Lifecycle, ListCategory, PairKey, TrackedList, Variant,
};

use crate::error::IoError;
use crate::source::{commit, parse_ent_num, read_file_as_utf8, stage, write_atomic};

pub const MANIFEST_FORMAT_VERSION: u32 = 1;

/// `Rep_date` and `Rep_date_last` date the record; `last_seen`, `add_date`
/// and `removal_date` repeat on every row of a lifecycle.
pub const TRACKED_COLUMNS: [&str; 22] = [
    "Ent_num", "SDN_name", "SDN_type", "Program", "Title", "Call_sign", "Vess_type", "Tonnage",
    "GRT", "Vess_flag", "Vess_owner", "Remarks", "Country", "Addresses", "Alt_names", "Comments",
    "Program_cat", "Rep_date", "Rep_date_last", "last_seen", "add_date", "removal_date",
];

#[derive(Debug, Serialize, Deserialize)]
struct TrackedRow {
    #[serde(rename = "Ent_num")]
    ent_num: String,
    #[serde(rename = "SDN_name")]
    sdn_name: String,
    #[serde(rename = "SDN_type")]
    sdn_type: String,
    #[serde(rename = "Program")]
    program: String,
    #[serde(rename = "Title")]
    title: String,
    #[serde(rename = "Call_sign")]
    call_sign: String,
    #[serde(rename = "Vess_type")]
    vess_type: String,
    #[serde(rename = "Tonnage")]
    tonnage: String,
    #[serde(rename = "GRT")]
    grt: String,
    #[serde(rename = "Vess_flag")]
    vess_flag: String,
    #[serde(rename = "Vess_owner")]
    vess_owner: String,
    #[serde(rename = "Remarks")]
    remarks: String,
    #[serde(rename = "Country")]
    country: String,
    #[serde(rename = "Addresses")]
    addresses: String,
    #[serde(rename = "Alt_names")]
    alt_names: String,
    #[serde(rename = "Comments")]
    comments: String,
    #[serde(rename = "Program_cat")]
    program_cat: ListCategory,
    #[serde(rename = "Rep_date")]
    rep_date: NaiveDate,
    /// Absent from lists written before records carried their own last sighting.
    #[serde(rename = "Rep_date_last", default)]
    rep_date_last: Option<NaiveDate>,
    last_seen: NaiveDate,
    add_date: NaiveDate,
    removal_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    format_version: u32,
    report_dates: Vec<NaiveDate>,
}

/// `ofac_list.csv` → `ofac_list.manifest.json`
pub fn manifest_path(path: &Path) -> PathBuf {
    path.with_extension("manifest.json")
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

fn json<T: Serialize + ?Sized>(origin: &str, value: &T) -> Result<String, IoError> {
    serde_json::to_string(value).map_err(|source| IoError::Json {
        origin: origin.to_string(),
        source,
    })
}

fn to_row(origin: &str, lc: &Lifecycle, variant: &Variant) -> Result<TrackedRow, IoError> {
    let p = &variant.payload;
    let f = &p.fields;
    Ok(TrackedRow {
        ent_num: lc.key.ent_num.to_string(),
        sdn_name: f.sdn_name.clone(),
        sdn_type: f.sdn_type.clone(),
        program: f.program.clone(),
        title: f.title.clone(),
        call_sign: f.call_sign.clone(),
        vess_type: f.vess_type.clone(),
        tonnage: f.tonnage.clone(),
        grt: f.grt.clone(),
        vess_flag: f.vess_flag.clone(),
        vess_owner: f.vess_owner.clone(),
        remarks: f.remarks.clone(),
        country: lc.key.country.clone(),
        addresses: json(origin, &p.addresses)?,
        alt_names: json(origin, &p.alt_names)?,
        comments: json(origin, &p.comments)?,
        program_cat: p.program_cat,
        rep_date: variant.first_seen,
        rep_date_last: Some(variant.last_seen),
        last_seen: lc.last_seen,
        add_date: lc.add_date,
        removal_date: lc.removal_date,
    })
}

/// Serialize the list to CSV bytes (rows in canonical lifecycle order).
pub fn tracked_to_csv(list: &TrackedList) -> Result<Vec<u8>, IoError> {
    let origin = "tracked list";
    let csv_err = |source| IoError::Csv {
        origin: origin.to_string(),
        source,
    };
    // Header written explicitly so an empty list still has one.
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(TRACKED_COLUMNS).map_err(csv_err)?;
    for lc in &list.lifecycles {
        for variant in &lc.variants {
            writer
                .serialize(to_row(origin, lc, variant)?)
                .map_err(csv_err)?;
        }
    }
    writer
        .into_inner()
        .map_err(|e| csv_err(e.into_error().into()))
}

/// Persist the list and its manifest. Both files are staged before either
/// is renamed into place. The manifest goes first and is put back if the
/// list rename fails, so a failed write leaves the previous pair intact.
pub fn save_tracked(path: &Path, list: &TrackedList) -> Result<(), IoError> {
    let csv_bytes = tracked_to_csv(list)?;
    let manifest = Manifest {
        format_version: MANIFEST_FORMAT_VERSION,
        report_dates: list.report_dates.iter().copied().collect(),
    };
    let manifest_file = manifest_path(path);
    let manifest_bytes = serde_json::to_vec_pretty(&manifest).map_err(|source| IoError::Json {
        origin: manifest_file.display().to_string(),
        source,
    })?;

    let csv_tmp = stage(path, &csv_bytes)?;
    let manifest_tmp = match stage(&manifest_file, &manifest_bytes) {
        Ok(tmp) => tmp,
        Err(e) => {
            let _ = std::fs::remove_file(&csv_tmp);
            return Err(e);
        }
    };
    let previous_manifest = match std::fs::read(&manifest_file) {
        Ok(bytes) => Some(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(source) => {
            let _ = std::fs::remove_file(&csv_tmp);
            let _ = std::fs::remove_file(&manifest_tmp);
            return Err(IoError::Read {
                path: manifest_file,
                source,
            });
        }
    };
    if let Err(e) = commit(&manifest_tmp, &manifest_file) {
        let _ = std::fs::remove_file(&csv_tmp);
        return Err(e);
    }
    if let Err(e) = commit(&csv_tmp, path) {
        let restored = match previous_manifest {
            Some(bytes) => write_atomic(&manifest_file, &bytes),
            None => std::fs::remove_file(&manifest_file).map_err(|source| IoError::Write {
                path: manifest_file.clone(),
                source,
            }),
        };
        if let Err(restore_err) = restored {
            tracing::error!(
                path = %manifest_file.display(),
                error = %restore_err,
                "manifest could not be restored after a failed save"
            );
        }
        return Err(e);
    }

    tracing::info!(
        path = %path.display(),
        lifecycles = list.lifecycles.len(),
        report_dates = list.report_dates.len(),
        "tracked list saved"
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

fn parse_json<T: for<'de> Deserialize<'de>>(
    origin: &str,
    line: u64,
    column: &str,
    text: &str,
) -> Result<T, IoError> {
    let text = if text.trim().is_empty() { "[]" } else { text };
    serde_json::from_str(text).map_err(|e| IoError::Malformed {
        origin: origin.to_string(),
        line,
        message: format!("{column}: {e}"),
    })
}

/// Rows grouped into one lifecycle: `(key, add_date)`.
struct Group {
    last_seen: NaiveDate,
    removal_date: Option<NaiveDate>,
    line: u64,
    variants: Vec<Variant>,
}

/// Parse tracked-list CSV text. `report_dates` comes from the manifest when
/// one exists; otherwise it is rebuilt from the record dates.
pub fn tracked_from_csv(
    origin: &str,
    text: &str,
    report_dates: Option<BTreeSet<NaiveDate>>,
) -> Result<TrackedList, IoError> {
    let csv_err = |source| IoError::Csv {
        origin: origin.to_string(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(text.as_bytes());
    let headers = reader.headers().map_err(csv_err)?.clone();

    let mut groups: BTreeMap<(PairKey, NaiveDate), Group> = BTreeMap::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let row: TrackedRow = record.deserialize(Some(&headers)).map_err(csv_err)?;
        let malformed = |message: String| IoError::Malformed {
            origin: origin.to_string(),
            line,
            message,
        };

        let ent_num = parse_ent_num(&row.ent_num)
            .ok_or_else(|| malformed(format!("non-numeric Ent_num '{}'", row.ent_num)))?;
        let payload = EntityPayload {
            program_cat: row.program_cat,
            fields: EntityFields {
                sdn_name: row.sdn_name,
                sdn_type: row.sdn_type,
                program: row.program,
                title: row.title,
                call_sign: row.call_sign,
                vess_type: row.vess_type,
                tonnage: row.tonnage,
                grt: row.grt,
                vess_flag: row.vess_flag,
                vess_owner: row.vess_owner,
                remarks: row.remarks,
            },
            addresses: parse_json(origin, line, "Addresses", &row.addresses)?,
            alt_names: parse_json(origin, line, "Alt_names", &row.alt_names)?,
            comments: parse_json(origin, line, "Comments", &row.comments)?,
        };
        let variant = Variant {
            payload,
            first_seen: row.rep_date,
            last_seen: row.rep_date_last.unwrap_or(row.rep_date),
        };

        let key = PairKey::new(ent_num, row.country);
        match groups.get_mut(&(key.clone(), row.add_date)) {
            Some(group) => {
                if group.last_seen != row.last_seen || group.removal_date != row.removal_date {
                    return Err(malformed(format!(
                        "{key}: last_seen/removal_date disagree with line {}",
                        group.line
                    )));
                }
                if !group.variants.iter().any(|v| v.payload == variant.payload) {
                    group.variants.push(variant);
                }
            }
            None => {
                groups.insert(
                    (key, row.add_date),
                    Group {
                        last_seen: row.last_seen,
                        removal_date: row.removal_date,
                        line,
                        variants: vec![variant],
                    },
                );
            }
        }
    }

    let lifecycles: Vec<Lifecycle> = groups
        .into_iter()
        .map(|((key, add_date), mut group)| {
            group.variants.sort_by_key(|v| v.first_seen);
            Lifecycle {
                key,
                add_date,
                last_seen: group.last_seen,
                removal_date: group.removal_date,
                variants: group.variants,
            }
        })
        .collect();

    let report_dates = match report_dates {
        Some(dates) => dates,
        None => {
            let dates: BTreeSet<NaiveDate> = lifecycles
                .iter()
                .flat_map(|lc| {
                    [lc.add_date, lc.last_seen]
                        .into_iter()
                        .chain(lc.variants.iter().flat_map(|v| [v.first_seen, v.last_seen]))
                })
                .collect();
            tracing::warn!(
                origin,
                report_dates = dates.len(),
                "no manifest; report dates rebuilt from record dates"
            );
            dates
        }
    };

    let mut list = TrackedList {
        report_dates,
        lifecycles,
    };
    list.sort();
    list.validate()?;
    Ok(list)
}

fn load_manifest(path: &Path) -> Result<Option<BTreeSet<NaiveDate>>, IoError> {
    if !path.exists() {
        return Ok(None);
    }
    let origin = path.display().to_string();
    let text = read_file_as_utf8(path)?;
    let manifest: Manifest = serde_json::from_str(&text).map_err(|source| IoError::Json {
        origin: origin.clone(),
        source,
    })?;
    if manifest.format_version != MANIFEST_FORMAT_VERSION {
        return Err(IoError::Malformed {
            origin,
            line: 0,
            message: format!("unsupported manifest format_version {}", manifest.format_version),
        });
    }
    Ok(Some(manifest.report_dates.into_iter().collect()))
}

/// Load a persisted tracked list and its manifest.
pub fn load_tracked(path: &Path) -> Result<TrackedList, IoError> {
    let text = read_file_as_utf8(path)?;
    let report_dates = load_manifest(&manifest_path(path))?;
    let list = tracked_from_csv(&path.display().to_string(), &text, report_dates)?;
    tracing::debug!(
        path = %path.display(),
        lifecycles = list.lifecycles.len(),
        "tracked list loaded"
    );
    Ok(list)
}

/// Like [`load_tracked`], but a missing file is an empty list (first run).
pub fn load_tracked_or_empty(path: &Path) -> Result<TrackedList, IoError> {
    if path.exists() {
        load_tracked(path)
    } else {
        tracing::info!(path = %path.display(), "no tracked list yet; starting empty");
        Ok(TrackedList::new())
    }
}
