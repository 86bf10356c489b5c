use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::model::{ListCategory, TrackedList};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrackedSummary {
    pub lifecycles: usize,
    pub active: usize,
    pub removed: usize,
    pub distinct_pairs: usize,
    pub distinct_entities: usize,
    pub records: usize,
    /// Active lifecycles per list category, keyed by `Program_cat` tag. A
    /// lifecycle listed under both categories on its latest sighting counts
    /// once in each.
    pub active_by_category: BTreeMap<String, usize>,
    pub first_report_date: Option<String>,
    pub last_report_date: Option<String>,
    pub report_dates: usize,
}

/// Compute summary statistics for a tracked list.
pub fn summarize(list: &TrackedList) -> TrackedSummary {
    let mut active_by_category: BTreeMap<String, usize> = BTreeMap::new();
    let mut pairs = BTreeSet::new();
    let mut entities = BTreeSet::new();
    let mut active = 0;
    let mut records = 0;

    for lc in &list.lifecycles {
        pairs.insert(&lc.key);
        entities.insert(lc.key.ent_num);
        records += lc.variants.len();
        if lc.is_active() {
            active += 1;
            let categories: BTreeSet<ListCategory> =
                lc.latest_variants().map(|v| v.payload.program_cat).collect();
            for category in categories {
                *active_by_category.entry(category.to_string()).or_insert(0) += 1;
            }
        }
    }

    TrackedSummary {
        lifecycles: list.lifecycles.len(),
        active,
        removed: list.lifecycles.len() - active,
        distinct_pairs: pairs.len(),
        distinct_entities: entities.len(),
        records,
        active_by_category,
        first_report_date: list.report_dates.first().map(|d| d.to_string()),
        last_report_date: list.report_dates.last().map(|d| d.to_string()),
        report_dates: list.report_dates.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReconcileOptions;
    use crate::history::reconcile_history;
    use crate::model::{Address, EntityFields, EntityRecord, ListCategory, Snapshot};
    use chrono::NaiveDate;

    fn entity(ent_num: u64, cat: ListCategory, countries: &[&str]) -> EntityRecord {
        let mut e = EntityRecord::new(ent_num, cat, EntityFields::default());
        for (i, c) in countries.iter().enumerate() {
            e.addresses.push(Address {
                add_num: i.to_string(),
                country: c.to_string(),
                ..Address::default()
            });
        }
        e
    }

    #[test]
    fn summary_counts() {
        let d1 = NaiveDate::from_ymd_opt(2021, 1, 31).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2021, 2, 28).unwrap();
        let snaps = vec![
            Snapshot::from_entities(
                d1,
                vec![
                    entity(1, ListCategory::Sdn, &["Iran", "Iraq"]),
                    entity(2, ListCategory::NonSdn, &["Cuba"]),
                ],
            ),
            Snapshot::from_entities(d2, vec![entity(1, ListCategory::Sdn, &["Iran"])]),
        ];
        let list = reconcile_history(&snaps, &ReconcileOptions::default()).unwrap();
        let s = summarize(&list);
        assert_eq!(s.lifecycles, 3);
        assert_eq!(s.active, 1);
        assert_eq!(s.removed, 2);
        assert_eq!(s.distinct_entities, 2);
        assert_eq!(s.active_by_category.get("SDN"), Some(&1));
        assert_eq!(s.active_by_category.get("NSDN"), None);
        assert_eq!(s.first_report_date.as_deref(), Some("2021-01-31"));
        assert_eq!(s.report_dates, 2);

        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["distinct_pairs"], 3);
    }

    fn dated(day: &str) -> NaiveDate {
        NaiveDate::parse_from_str(day, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn category_follows_latest_listing() {
        let snaps = vec![
            Snapshot::from_entities(dated("2021-01-31"), vec![entity(1, ListCategory::NonSdn, &["Iran"])]),
            Snapshot::from_entities(dated("2021-02-28"), vec![entity(1, ListCategory::Sdn, &["Iran"])]),
            Snapshot::from_entities(dated("2021-03-31"), vec![entity(1, ListCategory::NonSdn, &["Iran"])]),
        ];
        let list = reconcile_history(&snaps, &ReconcileOptions::default()).unwrap();
        let s = summarize(&list);
        assert_eq!(s.active, 1);
        assert_eq!(s.active_by_category.get("NSDN"), Some(&1));
        assert_eq!(s.active_by_category.get("SDN"), None);
    }

    #[test]
    fn entity_on_both_lists_counts_in_each() {
        let snaps = vec![Snapshot::from_entities(
            dated("2021-01-31"),
            vec![
                entity(1, ListCategory::Sdn, &["Iran"]),
                entity(1, ListCategory::NonSdn, &["Iran"]),
            ],
        )];
        let list = reconcile_history(&snaps, &ReconcileOptions::default()).unwrap();
        let s = summarize(&list);
        assert_eq!(s.lifecycles, 1);
        assert_eq!(s.active_by_category.get("SDN"), Some(&1));
        assert_eq!(s.active_by_category.get("NSDN"), Some(&1));
    }
}
