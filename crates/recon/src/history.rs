//! Historical reconciliation: independent full snapshots -> lifecycle records.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::calendar::removal_date_for;
use crate::config::ReconcileOptions;
use crate::error::ReconError;
use crate::model::{EntityPayload, Lifecycle, PairKey, Snapshot, TrackedList};

/// Reconcile an ascending sequence of snapshots into a tracked list.
///
/// Each maximal run of consecutive snapshots containing a key is one
/// lifecycle. `add_date` is the first report date of the run and
/// `last_seen` the last. A run that ends before the final snapshot gets a
/// removal date: end of the following month, clamped to the report date
/// of the snapshot that first missed the key.
pub fn reconcile_history(
    snapshots: &[Snapshot],
    options: &ReconcileOptions,
) -> Result<TrackedList, ReconError> {
    let dates = check_sequence(snapshots, options)?;
    let last_idx = snapshots.len() - 1;

    // key -> (snapshot index, distinct payloads seen there)
    let mut presence: BTreeMap<&PairKey, Vec<(usize, Vec<&EntityPayload>)>> = BTreeMap::new();
    for (idx, snapshot) in snapshots.iter().enumerate() {
        let seen = snapshot.presence();
        tracing::debug!(
            report_date = %snapshot.report_date,
            observations = snapshot.len(),
            keys = seen.len(),
            "scanned snapshot"
        );
        for (key, payloads) in seen {
            presence.entry(key).or_default().push((idx, payloads));
        }
    }

    let mut list = TrackedList {
        report_dates: dates.iter().copied().collect(),
        lifecycles: Vec::new(),
    };

    for (key, sightings) in presence {
        let mut current: Option<(Lifecycle, usize)> = None;
        for (idx, payloads) in sightings {
            match current.take() {
                Some((mut lc, prev)) if prev + 1 == idx => {
                    lc.observe(dates[idx], &payloads);
                    current = Some((lc, idx));
                }
                Some((mut lc, prev)) => {
                    // Gap: the key was missing at snapshot prev + 1.
                    lc.removal_date = Some(removal_date_for(lc.last_seen, dates[prev + 1]));
                    list.lifecycles.push(lc);
                    current = Some((Lifecycle::open(key.clone(), dates[idx], &payloads), idx));
                }
                None => {
                    current = Some((Lifecycle::open(key.clone(), dates[idx], &payloads), idx));
                }
            }
        }
        if let Some((mut lc, prev)) = current {
            if prev < last_idx {
                lc.removal_date = Some(removal_date_for(lc.last_seen, dates[prev + 1]));
            }
            list.lifecycles.push(lc);
        }
    }

    list.sort();
    tracing::info!(
        snapshots = snapshots.len(),
        lifecycles = list.lifecycles.len(),
        active = list.open_count(),
        "historical reconciliation complete"
    );
    Ok(list)
}

/// Validate ordering and emptiness, returning report dates in order.
fn check_sequence(
    snapshots: &[Snapshot],
    options: &ReconcileOptions,
) -> Result<Vec<NaiveDate>, ReconError> {
    let first = snapshots.first().ok_or(ReconError::EmptyHistory)?;
    let mut dates = vec![first.report_date];
    for pair in snapshots.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if next.report_date == prev.report_date {
            return Err(ReconError::DuplicateReportDate {
                date: next.report_date,
            });
        }
        if next.report_date < prev.report_date {
            return Err(ReconError::UnsortedSnapshots {
                prev: prev.report_date,
                next: next.report_date,
            });
        }
        if next.is_empty() && !prev.is_empty() && !options.allow_empty_snapshot {
            return Err(ReconError::EmptySnapshot {
                date: next.report_date,
                open: prev.presence().len(),
            });
        }
        dates.push(next.report_date);
    }
    Ok(dates)
}
