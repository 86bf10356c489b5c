//! Incremental reconciliation: merge one new snapshot into a tracked list.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::calendar::removal_date_for;
use crate::config::ReconcileOptions;
use crate::error::ReconError;
use crate::model::{Lifecycle, Snapshot, TrackedList};

/// Counts describing one incremental run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateSummary {
    pub report_date: String,
    /// Keys never tracked before.
    pub added: usize,
    /// Keys with a closed lifecycle that showed up again.
    pub reopened: usize,
    /// Open lifecycles missing from this snapshot.
    pub removed: usize,
    /// Open lifecycles still present.
    pub continued: usize,
    /// New distinct records on continuing lifecycles.
    pub new_variants: usize,
    /// Closed lifecycles passed through untouched.
    pub carried_closed: usize,
}

/// Merge `snapshot` into `tracked`, returning a new tracked list.
///
/// The snapshot's report date is the reference date of the run: new keys
/// are added on it, and removals inferred from absence are never dated
/// after it. The input list is not modified; on error nothing is produced.
pub fn reconcile_incremental(
    tracked: &TrackedList,
    snapshot: &Snapshot,
    options: &ReconcileOptions,
) -> Result<(TrackedList, UpdateSummary), ReconError> {
    let today = snapshot.report_date;

    if let Some(latest) = tracked.latest_report_date() {
        if today == latest {
            return Err(ReconError::DuplicateReportDate { date: today });
        }
        if today < latest {
            return Err(ReconError::StaleSnapshot {
                snapshot: today,
                latest,
            });
        }
    }

    let open = tracked.open_count();
    if snapshot.is_empty() && open > 0 && !options.allow_empty_snapshot {
        return Err(ReconError::EmptySnapshot { date: today, open });
    }

    let mut presence = snapshot.presence();
    let mut summary = UpdateSummary {
        report_date: today.to_string(),
        ..UpdateSummary::default()
    };
    let mut lifecycles = Vec::with_capacity(tracked.lifecycles.len() + presence.len());

    for lc in &tracked.lifecycles {
        let mut lc = lc.clone();
        if !lc.is_active() {
            summary.carried_closed += 1;
        } else if let Some(payloads) = presence.remove(&lc.key) {
            let before = lc.variants.len();
            lc.observe(today, &payloads);
            summary.new_variants += lc.variants.len() - before;
            summary.continued += 1;
        } else {
            lc.removal_date = Some(removal_date_for(lc.last_seen, today));
            summary.removed += 1;
        }
        lifecycles.push(lc);
    }

    // Whatever is left has no open lifecycle: brand-new key or reappearance.
    let known: BTreeSet<_> = tracked.lifecycles.iter().map(|lc| &lc.key).collect();
    for (key, payloads) in presence {
        if known.contains(key) {
            summary.reopened += 1;
        } else {
            summary.added += 1;
        }
        lifecycles.push(Lifecycle::open(key.clone(), today, &payloads));
    }

    let mut report_dates = tracked.report_dates.clone();
    report_dates.insert(today);
    let mut list = TrackedList {
        report_dates,
        lifecycles,
    };
    list.sort();

    tracing::info!(
        report_date = %today,
        added = summary.added,
        reopened = summary.reopened,
        removed = summary.removed,
        continued = summary.continued,
        new_variants = summary.new_variants,
        "incremental reconciliation complete"
    );
    Ok((list, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::reconcile_history;
    use crate::model::{Address, EntityFields, EntityRecord, ListCategory, PairKey};
    use chrono::NaiveDate;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn entity(ent_num: u64, country: &str, address: &str) -> EntityRecord {
        let mut e = EntityRecord::new(
            ent_num,
            ListCategory::NonSdn,
            EntityFields {
                sdn_name: format!("ENTITY {ent_num}"),
                program: "SDGT".into(),
                ..EntityFields::default()
            },
        );
        e.addresses.push(Address {
            add_num: "1".into(),
            address: address.into(),
            country: country.into(),
            ..Address::default()
        });
        e
    }

    fn snap(date: &str, entities: Vec<EntityRecord>) -> Snapshot {
        Snapshot::from_entities(d(date), entities)
    }

    fn run(tracked: &TrackedList, snapshot: &Snapshot) -> TrackedList {
        reconcile_incremental(tracked, snapshot, &ReconcileOptions::default())
            .unwrap()
            .0
    }

    fn only<'a>(list: &'a TrackedList, ent: u64, country: &str) -> &'a Lifecycle {
        let key = PairKey::new(ent, country);
        let found: Vec<_> = list.lifecycles.iter().filter(|l| l.key == key).collect();
        assert_eq!(found.len(), 1, "expected one lifecycle for {key}");
        found[0]
    }

    #[test]
    fn first_run_adds_everything() {
        let (list, summary) = reconcile_incremental(
            &TrackedList::new(),
            &snap("2021-01-31", vec![entity(1, "Iran", "a"), entity(2, "Cuba", "b")]),
            &ReconcileOptions::default(),
        )
        .unwrap();
        assert_eq!(summary.added, 2);
        assert_eq!(list.lifecycles.len(), 2);
        assert!(list.lifecycles.iter().all(|l| l.add_date == d("2021-01-31")));
        assert!(list.report_dates.contains(&d("2021-01-31")));
    }

    #[test]
    fn stability_on_payload_change() {
        let t1 = run(&TrackedList::new(), &snap("2021-01-31", vec![entity(1, "Iran", "old")]));
        let (t2, summary) = reconcile_incremental(
            &t1,
            &snap("2021-02-28", vec![entity(1, "Iran", "new")]),
            &ReconcileOptions::default(),
        )
        .unwrap();
        let lc = only(&t2, 1, "Iran");
        assert_eq!(lc.add_date, d("2021-01-31"));
        assert_eq!(lc.last_seen, d("2021-02-28"));
        assert_eq!(lc.variants.len(), 2);
        assert_eq!(summary.new_variants, 1);
        assert_eq!(summary.added, 0);
    }

    #[test]
    fn returning_payload_is_current() {
        let t1 = run(&TrackedList::new(), &snap("2021-01-31", vec![entity(1, "Iran", "A")]));
        let t2 = run(&t1, &snap("2021-02-28", vec![entity(1, "Iran", "B")]));
        let (t3, summary) = reconcile_incremental(
            &t2,
            &snap("2021-03-31", vec![entity(1, "Iran", "A")]),
            &ReconcileOptions::default(),
        )
        .unwrap();
        assert_eq!(summary.new_variants, 0);
        let lc = only(&t3, 1, "Iran");
        assert_eq!(lc.variants.len(), 2);
        assert_eq!(lc.variants[0].last_seen, d("2021-03-31"));
        assert_eq!(lc.variants[1].last_seen, d("2021-02-28"));
        assert_eq!(lc.current_payload().unwrap().addresses[0].address, "A");
    }

    #[test]
    fn removal_uses_month_end_after_last_seen() {
        // Tracked: entity 100 in Libya, added and last seen 2021-01-01.
        let t1 = run(
            &TrackedList::new(),
            &snap("2021-01-01", vec![entity(100, "Libya", "a"), entity(2, "Cuba", "b")]),
        );
        let t2 = run(&t1, &snap("2021-03-01", vec![entity(2, "Cuba", "b")]));
        let lc = only(&t2, 100, "Libya");
        assert_eq!(lc.add_date, d("2021-01-01"));
        assert_eq!(lc.removal_date, Some(d("2021-02-28")));
    }

    #[test]
    fn removal_clamped_to_run_date() {
        let t1 = run(
            &TrackedList::new(),
            &snap("2021-02-01", vec![entity(100, "Libya", "a"), entity(2, "Cuba", "b")]),
        );
        let t2 = run(&t1, &snap("2021-03-01", vec![entity(2, "Cuba", "b")]));
        assert_eq!(only(&t2, 100, "Libya").removal_date, Some(d("2021-03-01")));
    }

    #[test]
    fn existing_removal_is_not_recomputed() {
        let t1 = run(
            &TrackedList::new(),
            &snap("2021-01-31", vec![entity(1, "Iran", "a"), entity(2, "Cuba", "b")]),
        );
        let t2 = run(&t1, &snap("2021-02-28", vec![entity(2, "Cuba", "b")]));
        let t3 = run(&t2, &snap("2021-03-31", vec![entity(2, "Cuba", "b")]));
        assert_eq!(only(&t3, 1, "Iran").removal_date, Some(d("2021-02-28")));
    }

    #[test]
    fn reappearance_opens_new_lifecycle() {
        let t1 = run(
            &TrackedList::new(),
            &snap("2021-01-31", vec![entity(1, "Iran", "a"), entity(2, "Cuba", "b")]),
        );
        let t2 = run(&t1, &snap("2021-02-28", vec![entity(2, "Cuba", "b")]));
        let (t3, summary) = reconcile_incremental(
            &t2,
            &snap("2021-03-31", vec![entity(1, "Iran", "a"), entity(2, "Cuba", "b")]),
            &ReconcileOptions::default(),
        )
        .unwrap();
        assert_eq!(summary.reopened, 1);
        let lcs: Vec<_> = t3.lifecycles.iter().filter(|l| l.key.ent_num == 1).collect();
        assert_eq!(lcs.len(), 2);
        assert_eq!(lcs[0].removal_date, Some(d("2021-02-28")));
        assert_eq!(lcs[1].add_date, d("2021-03-31"));
        assert!(lcs[1].is_active());
        t3.validate().unwrap();
    }

    #[test]
    fn input_list_untouched() {
        let t1 = run(&TrackedList::new(), &snap("2021-01-31", vec![entity(1, "Iran", "a")]));
        let before = t1.clone();
        let _ = run(&t1, &snap("2021-02-28", vec![entity(2, "Cuba", "b")]));
        assert_eq!(t1, before);
    }

    #[test]
    fn rejects_stale_and_duplicate_dates() {
        let t1 = run(&TrackedList::new(), &snap("2021-02-28", vec![entity(1, "Iran", "a")]));
        let opts = ReconcileOptions::default();
        let err = reconcile_incremental(&t1, &snap("2021-02-28", vec![]), &opts).unwrap_err();
        assert!(matches!(err, ReconError::DuplicateReportDate { .. }));
        let err = reconcile_incremental(&t1, &snap("2021-01-31", vec![]), &opts).unwrap_err();
        assert!(matches!(err, ReconError::StaleSnapshot { .. }));
    }

    #[test]
    fn empty_snapshot_requires_confirmation() {
        let t1 = run(&TrackedList::new(), &snap("2021-01-31", vec![entity(1, "Iran", "a")]));
        let err = reconcile_incremental(&t1, &snap("2021-02-28", vec![]), &ReconcileOptions::default())
            .unwrap_err();
        assert!(matches!(err, ReconError::EmptySnapshot { open: 1, .. }));

        let opts = ReconcileOptions {
            allow_empty_snapshot: true,
        };
        let (t2, summary) = reconcile_incremental(&t1, &snap("2021-02-28", vec![]), &opts).unwrap();
        assert_eq!(summary.removed, 1);
        assert_eq!(t2.open_count(), 0);
    }

    #[test]
    fn fold_matches_history() {
        let snaps = vec![
            snap("2021-01-31", vec![entity(1, "Iran", "a"), entity(2, "Cuba", "b")]),
            snap("2021-02-28", vec![entity(2, "Cuba", "c"), entity(3, "Syria", "d")]),
            snap("2021-03-31", vec![entity(1, "Iran", "a"), entity(3, "Syria", "d")]),
            snap("2021-04-30", vec![entity(1, "Iran", "e")]),
        ];
        let historical = reconcile_history(&snaps, &ReconcileOptions::default()).unwrap();
        let mut folded = TrackedList::new();
        for s in &snaps {
            folded = run(&folded, s);
        }
        assert_eq!(historical, folded);
    }
}
