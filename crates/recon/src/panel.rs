//! Country x date panel: counts, additions, removals, change and levels.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use serde::Serialize;

use crate::calendar::{month_label, quarter_label};
use crate::error::ReconError;
use crate::model::TrackedList;
use crate::normalize::CountryNormalizer;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PanelRow {
    pub country: String,
    pub date: NaiveDate,
    pub yrqtr: String,
    pub yrmon: String,
    /// Pairs whose add date is this period, including the bootstrap stock.
    pub entity_counts: i64,
    pub additions: i64,
    pub removals: i64,
    pub change: i64,
    pub levels: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Panel {
    pub rows: Vec<PanelRow>,
    /// Pairs dropped by the country normalizer.
    pub excluded_pairs: usize,
    /// Add dates that are not report dates and so fall on no cell.
    pub off_grid_additions: usize,
    /// Removal dates that are not report dates and so fall on no cell.
    pub off_grid_removals: usize,
}

impl Panel {
    pub fn row(&self, country: &str, date: NaiveDate) -> Option<&PanelRow> {
        self.rows.iter().find(|r| r.country == country && r.date == date)
    }

    pub fn country<'a>(&'a self, country: &'a str) -> impl Iterator<Item = &'a PanelRow> + 'a {
        self.rows.iter().filter(move |r| r.country == country)
    }

    pub fn countries(&self) -> BTreeSet<&str> {
        self.rows.iter().map(|r| r.country.as_str()).collect()
    }
}

/// Build the full country x date grid from a tracked list.
///
/// Grid dates are the tracked list's report dates. The first date is the
/// bootstrap period: its arrivals are the opening stock, so `additions` is
/// zero there and `levels` starts at `entity_counts`. Every later period
/// advances `levels` by `change`.
pub fn build_panel(tracked: &TrackedList, normalizer: &CountryNormalizer) -> Result<Panel, ReconError> {
    let mut panel = Panel::default();

    // Distinct (entity, country, add, removal) before normalization, so
    // merged territories sum their pairs.
    let base: BTreeSet<(u64, &str, NaiveDate, Option<NaiveDate>)> = tracked
        .lifecycles
        .iter()
        .map(|lc| (lc.key.ent_num, lc.key.country.as_str(), lc.add_date, lc.removal_date))
        .collect();

    let mut countries: BTreeSet<String> = BTreeSet::new();
    let mut entity_counts: HashMap<(String, NaiveDate), i64> = HashMap::new();
    let mut removals: HashMap<(String, NaiveDate), i64> = HashMap::new();

    for (_, raw_country, add_date, removal_date) in base {
        let Some(country) = normalizer.normalize(raw_country) else {
            panel.excluded_pairs += 1;
            continue;
        };
        countries.insert(country.clone());

        if tracked.report_dates.contains(&add_date) {
            *entity_counts.entry((country.clone(), add_date)).or_insert(0) += 1;
        } else {
            panel.off_grid_additions += 1;
        }
        if let Some(removal) = removal_date {
            if tracked.report_dates.contains(&removal) {
                *removals.entry((country, removal)).or_insert(0) += 1;
            } else {
                panel.off_grid_removals += 1;
            }
        }
    }

    if panel.off_grid_additions > 0 || panel.off_grid_removals > 0 {
        tracing::warn!(
            additions = panel.off_grid_additions,
            removals = panel.off_grid_removals,
            "lifecycle dates outside the report-date grid were not counted"
        );
    }

    let Some(&first_date) = tracked.report_dates.first() else {
        return Ok(panel);
    };

    panel.rows.reserve(countries.len() * tracked.report_dates.len());
    for country in countries {
        let mut level = 0i64;
        for &date in &tracked.report_dates {
            let key = (country.clone(), date);
            let counts = entity_counts.get(&key).copied().unwrap_or(0);
            let additions = if date == first_date { 0 } else { counts };
            let removed = removals.get(&key).copied().unwrap_or(0);
            let change = additions - removed;
            level = if date == first_date { counts } else { level + change };

            if level < 0 {
                return Err(ReconError::NegativeLevel {
                    country,
                    date,
                    level,
                });
            }

            panel.rows.push(PanelRow {
                country: country.clone(),
                date,
                yrqtr: quarter_label(date),
                yrmon: month_label(date),
                entity_counts: counts,
                additions,
                removals: removed,
                change,
                levels: level,
            });
        }
    }

    tracing::info!(
        countries = panel.countries().len(),
        dates = tracked.report_dates.len(),
        excluded = panel.excluded_pairs,
        "panel built"
    );
    Ok(panel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReconcileOptions;
    use crate::history::reconcile_history;
    use crate::model::{Address, EntityFields, EntityRecord, ListCategory, Snapshot};

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn entity(ent_num: u64, country: &str) -> EntityRecord {
        let mut e = EntityRecord::new(ent_num, ListCategory::Sdn, EntityFields::default());
        e.addresses.push(Address {
            add_num: "1".into(),
            country: country.into(),
            ..Address::default()
        });
        e
    }

    fn snap(date: &str, entities: Vec<EntityRecord>) -> Snapshot {
        Snapshot::from_entities(d(date), entities)
    }

    fn panel_for(snaps: &[Snapshot]) -> Panel {
        let list = reconcile_history(snaps, &ReconcileOptions::default()).unwrap();
        build_panel(&list, &CountryNormalizer::default()).unwrap()
    }

    #[test]
    fn bootstrap_period() {
        let iran: Vec<_> = (1..=5).map(|n| entity(n, "Iran")).collect();
        let panel = panel_for(&[snap("2021-01-31", iran.clone()), snap("2021-02-28", iran)]);
        let row = panel.row("Iran", d("2021-01-31")).unwrap();
        assert_eq!(row.entity_counts, 5);
        assert_eq!(row.additions, 0);
        assert_eq!(row.levels, 5);
        let row = panel.row("Iran", d("2021-02-28")).unwrap();
        assert_eq!(row.additions, 0);
        assert_eq!(row.levels, 5);
    }

    #[test]
    fn additions_and_removals_flow_into_levels() {
        let panel = panel_for(&[
            snap("2021-01-31", vec![entity(1, "Iran"), entity(2, "Iran")]),
            snap("2021-02-28", vec![entity(1, "Iran"), entity(2, "Iran"), entity(3, "Iran")]),
            snap("2021-03-31", vec![entity(3, "Iran")]),
        ]);
        let rows: Vec<_> = panel.country("Iran").collect();
        assert_eq!(rows.len(), 3);
        assert_eq!((rows[1].additions, rows[1].removals, rows[1].levels), (1, 0, 3));
        assert_eq!((rows[2].additions, rows[2].removals, rows[2].change, rows[2].levels), (0, 2, -2, 1));
    }

    #[test]
    fn grid_is_full_cross_product() {
        let panel = panel_for(&[
            snap("2021-01-31", vec![entity(1, "Iran")]),
            snap("2021-02-28", vec![entity(1, "Iran"), entity(2, "Cuba")]),
        ]);
        assert_eq!(panel.rows.len(), 4);
        let cuba_first = panel.row("Cuba", d("2021-01-31")).unwrap();
        assert_eq!((cuba_first.entity_counts, cuba_first.levels), (0, 0));
        let cuba = panel.row("Cuba", d("2021-02-28")).unwrap();
        assert_eq!((cuba.additions, cuba.levels), (1, 1));
        // Sorted by (country, date).
        assert_eq!(panel.rows[0].country, "Cuba");
        assert_eq!(panel.rows[0].date, d("2021-01-31"));
    }

    #[test]
    fn territories_merge_and_placeholders_vanish() {
        let panel = panel_for(&[snap(
            "2021-01-31",
            vec![entity(1, "Region: Gaza"), entity(2, "West Bank"), entity(3, "-0- ")],
        )]);
        assert_eq!(panel.countries().into_iter().collect::<Vec<_>>(), vec!["West Bank and Gaza"]);
        assert_eq!(panel.row("West Bank and Gaza", d("2021-01-31")).unwrap().levels, 2);
        assert_eq!(panel.excluded_pairs, 1);
    }

    #[test]
    fn calendar_fields() {
        let panel = panel_for(&[snap("2021-05-31", vec![entity(1, "Iran")])]);
        assert_eq!(panel.rows[0].yrqtr, "2021Q2");
        assert_eq!(panel.rows[0].yrmon, "2021-05");
    }

    #[test]
    fn off_grid_removal_reported() {
        let mut list = reconcile_history(
            &[
                snap("2021-01-31", vec![entity(1, "Iran"), entity(2, "Iran")]),
                snap("2021-02-28", vec![entity(2, "Iran")]),
            ],
            &ReconcileOptions::default(),
        )
        .unwrap();
        list.lifecycles[0].removal_date = Some(d("2021-02-15"));
        let panel = build_panel(&list, &CountryNormalizer::default()).unwrap();
        assert_eq!(panel.off_grid_removals, 1);
        assert_eq!(panel.row("Iran", d("2021-02-28")).unwrap().levels, 2);
    }

    #[test]
    fn negative_level_is_an_error() {
        let mut list = reconcile_history(
            &[
                snap("2021-01-31", vec![entity(1, "Iran")]),
                snap("2021-02-28", vec![entity(2, "Cuba")]),
            ],
            &ReconcileOptions::default(),
        )
        .unwrap();
        // Pretend Iran's addition happened off the grid: its removal drives the level negative.
        for lc in list.lifecycles.iter_mut().filter(|l| l.key.country == "Iran") {
            lc.add_date = d("2020-12-15");
        }
        let err = build_panel(&list, &CountryNormalizer::default()).unwrap_err();
        assert!(matches!(err, ReconError::NegativeLevel { level: -1, .. }));
    }

    #[test]
    fn empty_list_gives_empty_panel() {
        let panel = build_panel(&TrackedList::new(), &CountryNormalizer::default()).unwrap();
        assert!(panel.rows.is_empty());
    }
}
