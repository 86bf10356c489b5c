use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// Reconciliation key: one entity in one country.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PairKey {
    pub ent_num: u64,
    pub country: String,
}

impl PairKey {
    pub fn new(ent_num: u64, country: impl Into<String>) -> Self {
        Self {
            ent_num,
            country: country.into(),
        }
    }
}

impl std::fmt::Display for PairKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.ent_num, self.country)
    }
}

/// List category tag (`Program_cat`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ListCategory {
    #[serde(rename = "SDN")]
    Sdn,
    #[serde(rename = "NSDN")]
    NonSdn,
}

impl ListCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sdn => "SDN",
            Self::NonSdn => "NSDN",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "SDN" => Some(Self::Sdn),
            "NSDN" => Some(Self::NonSdn),
            _ => None,
        }
    }
}

impl std::fmt::Display for ListCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// Descriptive main-table columns (everything except `Ent_num`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityFields {
    pub sdn_name: String,
    pub sdn_type: String,
    pub program: String,
    pub title: String,
    pub call_sign: String,
    pub vess_type: String,
    pub tonnage: String,
    pub grt: String,
    pub vess_flag: String,
    pub vess_owner: String,
    pub remarks: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address {
    pub add_num: String,
    pub address: String,
    pub locality: String,
    pub country: String,
    pub add_remarks: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AltName {
    pub alt_num: String,
    pub alt_type: String,
    pub alt_name: String,
    pub alt_remarks: String,
}

/// One listed entity with its one-to-many children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRecord {
    pub ent_num: u64,
    pub program_cat: ListCategory,
    pub fields: EntityFields,
    pub addresses: Vec<Address>,
    pub alt_names: Vec<AltName>,
    pub comments: Vec<String>,
}

impl EntityRecord {
    pub fn new(ent_num: u64, program_cat: ListCategory, fields: EntityFields) -> Self {
        Self {
            ent_num,
            program_cat,
            fields,
            addresses: Vec::new(),
            alt_names: Vec::new(),
            comments: Vec::new(),
        }
    }

    /// Sort and dedup children so payload equality ignores source row order.
    pub fn canonicalize(&mut self) {
        self.addresses.sort();
        self.addresses.dedup();
        self.alt_names.sort();
        self.alt_names.dedup();
        self.comments.sort();
        self.comments.dedup();
    }

    /// Distinct address countries, in sorted order. Blank countries are not countries.
    pub fn countries(&self) -> BTreeSet<&str> {
        self.addresses
            .iter()
            .map(|a| a.country.as_str())
            .filter(|c| !c.trim().is_empty())
            .collect()
    }

    pub fn addresses_without_country(&self) -> usize {
        self.addresses
            .iter()
            .filter(|a| a.country.trim().is_empty())
            .count()
    }

    /// Payload as observed in one country: only that country's addresses are included.
    pub fn payload_for(&self, country: &str) -> EntityPayload {
        EntityPayload {
            program_cat: self.program_cat,
            fields: self.fields.clone(),
            addresses: self
                .addresses
                .iter()
                .filter(|a| a.country == country)
                .cloned()
                .collect(),
            alt_names: self.alt_names.clone(),
            comments: self.comments.clone(),
        }
    }
}

/// Distinct-record identity for one (entity, country) observation.
///
/// Report dates are never part of the payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityPayload {
    pub program_cat: ListCategory,
    pub fields: EntityFields,
    pub addresses: Vec<Address>,
    pub alt_names: Vec<AltName>,
    pub comments: Vec<String>,
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub key: PairKey,
    pub payload: EntityPayload,
}

/// Full-state listing as of one report date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub report_date: NaiveDate,
    pub observations: Vec<Observation>,
}

impl Snapshot {
    pub fn new(report_date: NaiveDate) -> Self {
        Self {
            report_date,
            observations: Vec::new(),
        }
    }

    /// Explode entities into one observation per distinct address country.
    /// Entities without any address row produce no observation, and
    /// addresses with a blank country are left out.
    pub fn from_entities(report_date: NaiveDate, entities: impl IntoIterator<Item = EntityRecord>) -> Self {
        let mut observations = Vec::new();
        for mut entity in entities {
            entity.canonicalize();
            for country in entity.countries() {
                observations.push(Observation {
                    key: PairKey::new(entity.ent_num, country),
                    payload: entity.payload_for(country),
                });
            }
        }
        Self {
            report_date,
            observations,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Distinct payloads per key, first occurrence first.
    pub(crate) fn presence(&self) -> BTreeMap<&PairKey, Vec<&EntityPayload>> {
        let mut map: BTreeMap<&PairKey, Vec<&EntityPayload>> = BTreeMap::new();
        for obs in &self.observations {
            let payloads = map.entry(&obs.key).or_default();
            if !payloads.contains(&&obs.payload) {
                payloads.push(&obs.payload);
            }
        }
        map
    }
}

// ---------------------------------------------------------------------------
// Lifecycles
// ---------------------------------------------------------------------------

/// A distinct record kept within a lifecycle, with the first and latest
/// report dates it was observed on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    pub payload: EntityPayload,
    pub first_seen: NaiveDate,
    pub last_seen: NaiveDate,
}

/// One continuous spell of presence for a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lifecycle {
    pub key: PairKey,
    pub add_date: NaiveDate,
    pub last_seen: NaiveDate,
    pub removal_date: Option<NaiveDate>,
    pub variants: Vec<Variant>,
}

impl Lifecycle {
    pub(crate) fn open(key: PairKey, date: NaiveDate, payloads: &[&EntityPayload]) -> Self {
        let mut lifecycle = Self {
            key,
            add_date: date,
            last_seen: date,
            removal_date: None,
            variants: Vec::new(),
        };
        lifecycle.observe(date, payloads);
        lifecycle
    }

    /// Record a sighting. New payloads become variants, known ones are
    /// re-dated; `add_date` is untouched.
    pub(crate) fn observe(&mut self, date: NaiveDate, payloads: &[&EntityPayload]) {
        self.last_seen = date;
        for payload in payloads {
            match self.variants.iter_mut().find(|v| &v.payload == *payload) {
                Some(variant) => variant.last_seen = date,
                None => self.variants.push(Variant {
                    payload: (*payload).clone(),
                    first_seen: date,
                    last_seen: date,
                }),
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.removal_date.is_none()
    }

    /// Payload of the most recently observed distinct record. When several
    /// records were seen on the same date, the later one in the list wins.
    pub fn current_payload(&self) -> Option<&EntityPayload> {
        self.variants
            .iter()
            .max_by_key(|v| v.last_seen)
            .map(|v| &v.payload)
    }

    /// Every distinct record present on the lifecycle's latest sighting.
    pub fn latest_variants(&self) -> impl Iterator<Item = &Variant> {
        self.variants.iter().filter(move |v| v.last_seen == self.last_seen)
    }
}

// ---------------------------------------------------------------------------
// Tracked list
// ---------------------------------------------------------------------------

/// Persisted reconciliation state: every lifecycle plus the report dates that produced it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackedList {
    pub report_dates: BTreeSet<NaiveDate>,
    pub lifecycles: Vec<Lifecycle>,
}

impl TrackedList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest_report_date(&self) -> Option<NaiveDate> {
        self.report_dates.last().copied()
    }

    pub fn active(&self) -> impl Iterator<Item = &Lifecycle> {
        self.lifecycles.iter().filter(|l| l.is_active())
    }

    pub fn open_count(&self) -> usize {
        self.active().count()
    }

    /// Canonical order: by key, then by add date.
    pub fn sort(&mut self) {
        self.lifecycles
            .sort_by(|a, b| a.key.cmp(&b.key).then(a.add_date.cmp(&b.add_date)));
    }

    /// Check lifecycle invariants. Expects canonical order (see [`TrackedList::sort`]).
    pub fn validate(&self) -> Result<(), ReconError> {
        let mut prev: Option<&Lifecycle> = None;
        for lc in &self.lifecycles {
            if lc.add_date > lc.last_seen {
                return Err(ReconError::Integrity(format!(
                    "{}: add_date {} after last_seen {}",
                    lc.key, lc.add_date, lc.last_seen
                )));
            }
            if let Some(removal) = lc.removal_date {
                if removal <= lc.last_seen {
                    return Err(ReconError::Integrity(format!(
                        "{}: removal_date {removal} not after last_seen {}",
                        lc.key, lc.last_seen
                    )));
                }
            }
            if lc.variants.is_empty() {
                return Err(ReconError::Integrity(format!("{}: lifecycle without records", lc.key)));
            }
            if let Some(v) = lc.variants.iter().find(|v| {
                v.first_seen < lc.add_date || v.first_seen > v.last_seen || v.last_seen > lc.last_seen
            }) {
                return Err(ReconError::Integrity(format!(
                    "{}: record seen {}..={} outside {}..={}",
                    lc.key, v.first_seen, v.last_seen, lc.add_date, lc.last_seen
                )));
            }
            for date in [lc.add_date, lc.last_seen] {
                if !self.report_dates.contains(&date) {
                    return Err(ReconError::Integrity(format!(
                        "{}: date {date} is not a known report date",
                        lc.key
                    )));
                }
            }
            if let Some(p) = prev.filter(|p| p.key == lc.key) {
                if p.add_date > lc.add_date {
                    return Err(ReconError::Integrity(format!("{}: lifecycles out of order", lc.key)));
                }
                if p.is_active() || p.last_seen >= lc.add_date {
                    return Err(ReconError::Integrity(format!(
                        "{}: overlapping lifecycles starting {} and {}",
                        lc.key, p.add_date, lc.add_date
                    )));
                }
            }
            prev = Some(lc);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn address(num: &str, country: &str) -> Address {
        Address {
            add_num: num.into(),
            address: format!("{num} Main St"),
            country: country.into(),
            ..Address::default()
        }
    }

    fn entity(ent_num: u64, addresses: Vec<Address>) -> EntityRecord {
        let mut e = EntityRecord::new(
            ent_num,
            ListCategory::Sdn,
            EntityFields {
                sdn_name: format!("ENTITY {ent_num}"),
                ..EntityFields::default()
            },
        );
        e.addresses = addresses;
        e
    }

    #[test]
    fn snapshot_explodes_by_country() {
        let e = entity(7, vec![address("1", "Iran"), address("2", "Iraq"), address("3", "Iran")]);
        let snap = Snapshot::from_entities(d("2021-01-31"), vec![e]);
        assert_eq!(snap.len(), 2);
        let iran = snap.observations.iter().find(|o| o.key.country == "Iran").unwrap();
        assert_eq!(iran.payload.addresses.len(), 2);
        let iraq = snap.observations.iter().find(|o| o.key.country == "Iraq").unwrap();
        assert_eq!(iraq.payload.addresses.len(), 1);
    }

    #[test]
    fn blank_country_is_not_a_key() {
        let e = entity(7, vec![address("1", "Iran"), address("2", ""), address("3", "  ")]);
        assert_eq!(e.addresses_without_country(), 2);
        let snap = Snapshot::from_entities(d("2021-01-31"), vec![e]);
        assert_eq!(snap.len(), 1);
        assert_eq!(snap.observations[0].key.country, "Iran");
        assert_eq!(snap.observations[0].payload.addresses.len(), 1);

        let only_blank = entity(8, vec![address("1", "")]);
        assert!(Snapshot::from_entities(d("2021-01-31"), vec![only_blank]).is_empty());
    }

    #[test]
    fn entity_without_address_not_observed() {
        let snap = Snapshot::from_entities(d("2021-01-31"), vec![entity(7, vec![])]);
        assert!(snap.is_empty());
    }

    #[test]
    fn child_order_does_not_change_payload() {
        let a = entity(7, vec![address("1", "Iran"), address("2", "Iran")]);
        let b = entity(7, vec![address("2", "Iran"), address("1", "Iran")]);
        let sa = Snapshot::from_entities(d("2021-01-31"), vec![a]);
        let sb = Snapshot::from_entities(d("2021-01-31"), vec![b]);
        assert_eq!(sa.observations[0].payload, sb.observations[0].payload);
    }

    #[test]
    fn presence_dedups_payloads() {
        let e = entity(7, vec![address("1", "Iran")]);
        let snap = Snapshot::from_entities(d("2021-01-31"), vec![e.clone(), e]);
        let presence = snap.presence();
        assert_eq!(presence.len(), 1);
        assert_eq!(presence.values().next().unwrap().len(), 1);
    }

    #[test]
    fn returning_record_becomes_current_again() {
        let a = entity(7, vec![address("1", "Iran")]).payload_for("Iran");
        let b = entity(7, vec![address("2", "Iran")]).payload_for("Iran");
        let mut lc = Lifecycle::open(PairKey::new(7, "Iran"), d("2021-01-31"), &[&a]);
        lc.observe(d("2021-02-28"), &[&b]);
        assert_eq!(lc.current_payload(), Some(&b));

        lc.observe(d("2021-03-31"), &[&a]);
        assert_eq!(lc.variants.len(), 2);
        assert_eq!(lc.variants[0].first_seen, d("2021-01-31"));
        assert_eq!(lc.variants[0].last_seen, d("2021-03-31"));
        assert_eq!(lc.variants[1].last_seen, d("2021-02-28"));
        assert_eq!(lc.current_payload(), Some(&a));
        assert_eq!(lc.latest_variants().count(), 1);
    }

    #[test]
    fn same_day_records_are_all_latest() {
        let a = entity(7, vec![address("1", "Iran")]).payload_for("Iran");
        let b = entity(7, vec![address("2", "Iran")]).payload_for("Iran");
        let lc = Lifecycle::open(PairKey::new(7, "Iran"), d("2021-01-31"), &[&a, &b]);
        assert_eq!(lc.current_payload(), Some(&b));
        assert_eq!(lc.latest_variants().count(), 2);
    }

    #[test]
    fn validate_rejects_record_seen_after_lifecycle() {
        let payload = entity(7, vec![address("1", "Iran")]).payload_for("Iran");
        let mut lc = Lifecycle::open(PairKey::new(7, "Iran"), d("2021-01-31"), &[&payload]);
        lc.variants[0].last_seen = d("2021-02-28");
        let mut list = TrackedList::new();
        list.report_dates.extend([d("2021-01-31"), d("2021-02-28")]);
        list.lifecycles.push(lc);
        assert!(list.validate().is_err());
    }

    #[test]
    fn validate_rejects_overlap() {
        let e = entity(7, vec![address("1", "Iran")]);
        let payload = e.payload_for("Iran");
        let key = PairKey::new(7, "Iran");
        let mut list = TrackedList::new();
        list.report_dates.extend([d("2021-01-31"), d("2021-02-28")]);
        list.lifecycles.push(Lifecycle::open(key.clone(), d("2021-01-31"), &[&payload]));
        list.lifecycles.push(Lifecycle::open(key, d("2021-02-28"), &[&payload]));
        let err = list.validate().unwrap_err();
        assert!(err.to_string().contains("overlapping"));
    }

    #[test]
    fn validate_rejects_removal_before_last_seen() {
        let e = entity(7, vec![address("1", "Iran")]);
        let payload = e.payload_for("Iran");
        let mut lc = Lifecycle::open(PairKey::new(7, "Iran"), d("2021-02-28"), &[&payload]);
        lc.removal_date = Some(d("2021-01-31"));
        let mut list = TrackedList::new();
        list.report_dates.insert(d("2021-02-28"));
        list.lifecycles.push(lc);
        assert!(list.validate().is_err());
    }
}
