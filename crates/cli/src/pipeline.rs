//! `sanctrack history`, `sanctrack update`, `sanctrack panel`.

use std::path::PathBuf;

use chrono::NaiveDate;
use serde::Serialize;

use sanctrack_io::{
    load_history_dir, load_snapshot_dir, load_tracked, load_tracked_or_empty, save_panel,
    save_tracked, IngestReport,
};
use sanctrack_recon::{
    build_panel, reconcile_history, reconcile_incremental, summarize, Panel, ReconcileOptions,
    TrackedList, TrackedSummary, UpdateSummary,
};

use crate::exit_codes::{EXIT_ERROR, EXIT_INGEST_REJECTED};
use crate::settings::Settings;
use crate::CliError;

pub struct HistoryArgs {
    pub config: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub out: Option<PathBuf>,
    pub panel: bool,
    pub panel_out: Option<PathBuf>,
    pub allow_empty: bool,
    pub json: bool,
}

pub struct UpdateArgs {
    pub snapshot_dir: PathBuf,
    pub date: Option<NaiveDate>,
    pub config: Option<PathBuf>,
    pub tracked: Option<PathBuf>,
    pub panel: bool,
    pub panel_out: Option<PathBuf>,
    pub allow_empty: bool,
    pub strict: bool,
    pub json: bool,
}

#[derive(Serialize)]
struct PanelOutput {
    path: String,
    rows: usize,
    countries: usize,
    excluded_pairs: usize,
    off_grid_additions: usize,
    off_grid_removals: usize,
}

impl PanelOutput {
    fn new(path: &std::path::Path, panel: &Panel) -> Self {
        Self {
            path: path.display().to_string(),
            rows: panel.rows.len(),
            countries: panel.countries().len(),
            excluded_pairs: panel.excluded_pairs,
            off_grid_additions: panel.off_grid_additions,
            off_grid_removals: panel.off_grid_removals,
        }
    }
}

#[derive(Serialize)]
struct RunOutput<'a> {
    command: &'static str,
    tracked_list: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    snapshots: Option<usize>,
    ingest: &'a IngestReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    update: Option<&'a UpdateSummary>,
    summary: TrackedSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    panel: Option<PanelOutput>,
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::new(EXIT_ERROR, format!("JSON serialization error: {e}")))?;
    println!("{text}");
    Ok(())
}

fn print_ingest(report: &IngestReport) {
    eprintln!(
        "ingest: {} rows, {} entities, {} observations, {} rejected, {} orphans, {} without address, {} blank-country addresses",
        report.rows_accepted,
        report.entities,
        report.observations,
        report.rejected.len(),
        report.orphans,
        report.entities_without_address,
        report.addresses_without_country,
    );
}

fn print_panel(out: &PanelOutput) {
    eprintln!(
        "panel: {} rows across {} countries ({} pairs excluded) -> {}",
        out.rows, out.countries, out.excluded_pairs, out.path
    );
    if out.off_grid_additions + out.off_grid_removals > 0 {
        eprintln!(
            "panel: {} addition(s) and {} removal(s) fall on no report date",
            out.off_grid_additions, out.off_grid_removals
        );
    }
}

fn options(settings: &Settings, allow_empty: bool) -> ReconcileOptions {
    let mut options = settings.config.reconcile;
    options.allow_empty_snapshot |= allow_empty;
    options
}

fn panel_for(settings: &Settings, list: &TrackedList) -> Result<Panel, CliError> {
    Ok(build_panel(list, &settings.normalizer())?)
}

// ---------------------------------------------------------------------------
// history
// ---------------------------------------------------------------------------

pub fn cmd_history(args: HistoryArgs) -> Result<(), CliError> {
    let settings = Settings::load(args.config.as_deref())?.with_data_dir(args.data_dir);
    let data_dir = settings.data_dir();

    let (snapshots, report) =
        load_history_dir(&data_dir, &settings.config.sources.history_pattern)?;
    let list = reconcile_history(&snapshots, &options(&settings, args.allow_empty))?;
    // Build before writing anything so a negative level leaves no partial output.
    let panel = if args.panel {
        Some(panel_for(&settings, &list)?)
    } else {
        None
    };

    let tracked_path = settings.tracked_path(args.out);
    save_tracked(&tracked_path, &list)?;
    let panel_out = match panel {
        Some(panel) => {
            let path = settings.panel_path(args.panel_out);
            save_panel(&path, &panel)?;
            Some(PanelOutput::new(&path, &panel))
        }
        None => None,
    };

    let summary = summarize(&list);
    if args.json {
        print_json(&RunOutput {
            command: "history",
            tracked_list: tracked_path.display().to_string(),
            snapshots: Some(snapshots.len()),
            ingest: &report,
            update: None,
            summary,
            panel: panel_out,
        })?;
    } else {
        print_ingest(&report);
        eprintln!(
            "history: {} snapshots -> {} lifecycles ({} active, {} removed) -> {}",
            snapshots.len(),
            summary.lifecycles,
            summary.active,
            summary.removed,
            tracked_path.display()
        );
        if let Some(out) = &panel_out {
            print_panel(out);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// update
// ---------------------------------------------------------------------------

pub fn cmd_update(args: UpdateArgs) -> Result<(), CliError> {
    let settings = Settings::load(args.config.as_deref())?;
    // "Today" is resolved once here and passed down.
    let report_date = args
        .date
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    tracing::info!(dir = %args.snapshot_dir.display(), %report_date, "update started");

    let (snapshot, report) =
        load_snapshot_dir(&args.snapshot_dir, &settings.config.sources, report_date)?;
    if args.strict && !report.is_clean() {
        if args.json {
            print_json(&report)?;
        }
        return Err(CliError::new(
            EXIT_INGEST_REJECTED,
            format!("{} source row(s) rejected; nothing written", report.rejected.len()),
        )
        .with_hint("fix the source files or re-run without --strict"));
    }

    let tracked_path = settings.tracked_path(args.tracked);
    let previous = load_tracked_or_empty(&tracked_path)?;
    let (list, update) =
        reconcile_incremental(&previous, &snapshot, &options(&settings, args.allow_empty))?;
    let panel = if args.panel {
        Some(panel_for(&settings, &list)?)
    } else {
        None
    };

    save_tracked(&tracked_path, &list)?;
    let panel_out = match panel {
        Some(panel) => {
            let path = settings.panel_path(args.panel_out);
            save_panel(&path, &panel)?;
            Some(PanelOutput::new(&path, &panel))
        }
        None => None,
    };

    let summary = summarize(&list);
    if args.json {
        print_json(&RunOutput {
            command: "update",
            tracked_list: tracked_path.display().to_string(),
            snapshots: None,
            ingest: &report,
            update: Some(&update),
            summary,
            panel: panel_out,
        })?;
    } else {
        print_ingest(&report);
        eprintln!(
            "update {}: {} added, {} reopened, {} removed, {} continued ({} new records) -> {}",
            update.report_date,
            update.added,
            update.reopened,
            update.removed,
            update.continued,
            update.new_variants,
            tracked_path.display()
        );
        if let Some(out) = &panel_out {
            print_panel(out);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// panel
// ---------------------------------------------------------------------------

pub fn cmd_panel(
    config: Option<PathBuf>,
    tracked: Option<PathBuf>,
    out: Option<PathBuf>,
    json: bool,
) -> Result<(), CliError> {
    let settings = Settings::load(config.as_deref())?;
    let tracked_path = settings.tracked_path(tracked);
    let list = load_tracked(&tracked_path)?;
    let panel = panel_for(&settings, &list)?;
    let path = settings.panel_path(out);
    save_panel(&path, &panel)?;

    let output = PanelOutput::new(&path, &panel);
    if json {
        print_json(&output)?;
    } else {
        print_panel(&output);
    }
    Ok(())
}
