//! Raw list ingestion: headerless main/address/alt/comments tables per list
//! category, assembled into entities with their one-to-many children.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;

use sanctrack_recon::config::{ListFiles, SourcesConfig};
use sanctrack_recon::model::{Address, AltName, EntityFields, EntityRecord, ListCategory, Snapshot};

use crate::error::IoError;
use crate::source::{is_trailer, normalize_id, parse_ent_num, read_file_as_utf8};

pub const MAIN_COLUMNS: [&str; 12] = [
    "Ent_num", "SDN_name", "SDN_type", "Program", "Title", "Call_sign", "Vess_type", "Tonnage",
    "GRT", "Vess_flag", "Vess_owner", "Remarks",
];
pub const ADDRESS_COLUMNS: [&str; 6] =
    ["Ent_num", "Add_num", "Address", "Locality", "Country", "Add_remarks"];
pub const ALT_COLUMNS: [&str; 5] = ["Ent_num", "Alt_num", "Alt_type", "Alt_name", "Alt_remarks"];
pub const COMMENTS_COLUMNS: [&str; 2] = ["Ent_num", "Remarks_cont"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Main,
    Address,
    Alt,
    Comments,
}

impl TableKind {
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Self::Main => &MAIN_COLUMNS,
            Self::Address => &ADDRESS_COLUMNS,
            Self::Alt => &ALT_COLUMNS,
            Self::Comments => &COMMENTS_COLUMNS,
        }
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// A source row that was not ingested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub origin: String,
    pub line: u64,
    pub reason: String,
}

/// What ingestion accepted, skipped and rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub rows_accepted: usize,
    /// End-of-file marker rows.
    pub trailers_skipped: usize,
    pub rejected: Vec<Rejection>,
    /// Child rows whose `Ent_num` has no main-table row.
    pub orphans: usize,
    pub entities: usize,
    /// Entities with no address row, and therefore no country.
    pub entities_without_address: usize,
    /// Address rows with a blank country; they produce no observation.
    pub addresses_without_country: usize,
    pub observations: usize,
}

impl IngestReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }

    pub fn merge(&mut self, other: IngestReport) {
        self.rows_accepted += other.rows_accepted;
        self.trailers_skipped += other.trailers_skipped;
        self.rejected.extend(other.rejected);
        self.orphans += other.orphans;
        self.entities += other.entities;
        self.entities_without_address += other.entities_without_address;
        self.addresses_without_country += other.addresses_without_country;
        self.observations += other.observations;
    }

    pub(crate) fn reject(&mut self, origin: &str, line: u64, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!(origin, line, reason = %reason, "row rejected");
        self.rejected.push(Rejection {
            origin: origin.to_string(),
            line,
            reason,
        });
    }
}

// ---------------------------------------------------------------------------
// Table parsing
// ---------------------------------------------------------------------------

/// One accepted row: entity number plus the remaining fields in schema order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    pub line: u64,
    pub ent_num: u64,
    pub fields: Vec<String>,
}

/// Parse one headerless table. Rows that do not fit the schema are
/// recorded in `report` and skipped; only structural CSV errors fail.
pub fn parse_table(
    kind: TableKind,
    origin: &str,
    text: &str,
    report: &mut IngestReport,
) -> Result<Vec<TableRow>, IoError> {
    let expected = kind.columns().len();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|source| IoError::Csv {
            origin: origin.to_string(),
            source,
        })?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        if is_trailer(&record) {
            report.trailers_skipped += 1;
            continue;
        }
        if record.len() != expected {
            report.reject(
                origin,
                line,
                format!("expected {expected} fields, found {}", record.len()),
            );
            continue;
        }
        let raw_ent = record.get(0).unwrap_or("");
        let Some(ent_num) = parse_ent_num(raw_ent) else {
            report.reject(origin, line, format!("non-numeric Ent_num '{raw_ent}'"));
            continue;
        };

        report.rows_accepted += 1;
        rows.push(TableRow {
            line,
            ent_num,
            fields: record.iter().skip(1).map(str::to_string).collect(),
        });
    }
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

/// Raw text of the four tables of one list category.
#[derive(Debug, Clone, Copy)]
pub struct ListTexts<'a> {
    pub main: &'a str,
    pub address: &'a str,
    pub alt: &'a str,
    pub comments: &'a str,
}

fn field(fields: &[String], idx: usize) -> String {
    fields.get(idx).cloned().unwrap_or_default()
}

pub(crate) fn entity_fields(f: &[String]) -> EntityFields {
    EntityFields {
        sdn_name: field(f, 0),
        sdn_type: field(f, 1),
        program: field(f, 2),
        title: field(f, 3),
        call_sign: field(f, 4),
        vess_type: field(f, 5),
        tonnage: field(f, 6),
        grt: field(f, 7),
        vess_flag: field(f, 8),
        vess_owner: field(f, 9),
        remarks: field(f, 10),
    }
}

pub(crate) fn address(f: &[String]) -> Address {
    Address {
        add_num: normalize_id(&field(f, 0)),
        address: field(f, 1),
        locality: field(f, 2),
        country: field(f, 3),
        add_remarks: field(f, 4),
    }
}

pub(crate) fn alt_name(f: &[String]) -> AltName {
    AltName {
        alt_num: normalize_id(&field(f, 0)),
        alt_type: field(f, 1),
        alt_name: field(f, 2),
        alt_remarks: field(f, 3),
    }
}

/// Parse and join one list category into entities.
pub fn parse_list(
    category: ListCategory,
    names: &ListFiles,
    texts: ListTexts<'_>,
    report: &mut IngestReport,
) -> Result<Vec<EntityRecord>, IoError> {
    let main = parse_table(TableKind::Main, &names.main, texts.main, report)?;
    let addresses = parse_table(TableKind::Address, &names.address, texts.address, report)?;
    let alts = parse_table(TableKind::Alt, &names.alt, texts.alt, report)?;
    let comments = parse_table(TableKind::Comments, &names.comments, texts.comments, report)?;

    let mut entities: BTreeMap<u64, EntityRecord> = BTreeMap::new();
    for row in main {
        if entities.contains_key(&row.ent_num) {
            report.reject(&names.main, row.line, format!("duplicate Ent_num {}", row.ent_num));
            continue;
        }
        entities.insert(
            row.ent_num,
            EntityRecord::new(row.ent_num, category, entity_fields(&row.fields)),
        );
    }

    let mut orphans = 0;
    for row in addresses {
        match entities.get_mut(&row.ent_num) {
            Some(e) => e.addresses.push(address(&row.fields)),
            None => orphans += 1,
        }
    }
    for row in alts {
        match entities.get_mut(&row.ent_num) {
            Some(e) => e.alt_names.push(alt_name(&row.fields)),
            None => orphans += 1,
        }
    }
    for row in comments {
        match entities.get_mut(&row.ent_num) {
            Some(e) => e.comments.push(field(&row.fields, 0)),
            None => orphans += 1,
        }
    }
    if orphans > 0 {
        tracing::warn!(category = %category, orphans, "child rows without a main-table entity");
    }
    report.orphans += orphans;

    Ok(entities
        .into_values()
        .map(|mut e| {
            e.canonicalize();
            e
        })
        .collect())
}

/// Explode entities into a snapshot and record entity/observation counts.
pub fn snapshot_from_entities(
    report_date: NaiveDate,
    entities: Vec<EntityRecord>,
    report: &mut IngestReport,
) -> Snapshot {
    report.entities += entities.len();
    let without = entities.iter().filter(|e| e.addresses.is_empty()).count();
    if without > 0 {
        tracing::warn!(%report_date, entities = without, "entities without an address have no country");
    }
    report.entities_without_address += without;
    let blank: usize = entities.iter().map(|e| e.addresses_without_country()).sum();
    if blank > 0 {
        tracing::warn!(%report_date, addresses = blank, "address rows without a country skipped");
    }
    report.addresses_without_country += blank;
    let snapshot = Snapshot::from_entities(report_date, entities);
    report.observations += snapshot.len();
    snapshot
}

/// Load both list categories from `dir` as one snapshot dated `report_date`.
///
/// Every configured file must be readable: a missing table aborts the load.
pub fn load_snapshot_dir(
    dir: &Path,
    sources: &SourcesConfig,
    report_date: NaiveDate,
) -> Result<(Snapshot, IngestReport), IoError> {
    let mut report = IngestReport::default();
    let mut entities = Vec::new();

    for (category, names) in [
        (ListCategory::Sdn, &sources.sdn),
        (ListCategory::NonSdn, &sources.nsdn),
    ] {
        let main = read_file_as_utf8(&dir.join(&names.main))?;
        let address = read_file_as_utf8(&dir.join(&names.address))?;
        let alt = read_file_as_utf8(&dir.join(&names.alt))?;
        let comments = read_file_as_utf8(&dir.join(&names.comments))?;
        let texts = ListTexts {
            main: &main,
            address: &address,
            alt: &alt,
            comments: &comments,
        };
        entities.extend(parse_list(category, names, texts, &mut report)?);
    }

    let snapshot = snapshot_from_entities(report_date, entities, &mut report);
    tracing::info!(
        dir = %dir.display(),
        %report_date,
        entities = report.entities,
        observations = report.observations,
        rejected = report.rejected.len(),
        "snapshot loaded"
    );
    Ok((snapshot, report))
}
