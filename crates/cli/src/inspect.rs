//! `sanctrack inspect`, `sanctrack validate`.

use std::path::PathBuf;

use sanctrack_io::load_tracked;
use sanctrack_recon::{summarize, TrackedSummary};

use crate::exit_codes::EXIT_ERROR;
use crate::settings::{read_config, Settings};
use crate::CliError;

pub fn cmd_inspect(
    config: Option<PathBuf>,
    tracked: Option<PathBuf>,
    json: bool,
) -> Result<(), CliError> {
    let settings = Settings::load(config.as_deref())?;
    let path = settings.tracked_path(tracked);
    let list = load_tracked(&path)?;
    let summary = summarize(&list);

    if json {
        let text = serde_json::to_string_pretty(&summary)
            .map_err(|e| CliError::new(EXIT_ERROR, format!("JSON serialization error: {e}")))?;
        println!("{text}");
    } else {
        print!("{}", render_summary(&path.display().to_string(), &summary));
    }
    Ok(())
}

fn render_summary(path: &str, s: &TrackedSummary) -> String {
    let mut out = format!("tracked list: {path}\n");
    out.push_str(&format!(
        "report dates: {} ({} .. {})\n",
        s.report_dates,
        s.first_report_date.as_deref().unwrap_or("-"),
        s.last_report_date.as_deref().unwrap_or("-"),
    ));
    out.push_str(&format!(
        "lifecycles:   {} ({} active, {} removed)\n",
        s.lifecycles, s.active, s.removed
    ));
    out.push_str(&format!(
        "pairs:        {} across {} entities, {} distinct records\n",
        s.distinct_pairs, s.distinct_entities, s.records
    ));
    for (category, count) in &s.active_by_category {
        out.push_str(&format!("active {category:<5} {count}\n"));
    }
    out
}

pub fn cmd_validate(config: PathBuf) -> Result<(), CliError> {
    let parsed = read_config(&config)?;
    println!(
        "ok: {} ({} canonical label(s), {} drop prefix(es), {} drop value(s))",
        parsed.name.as_deref().unwrap_or("unnamed config"),
        parsed.normalize.canonical.len(),
        parsed.normalize.drop_prefixes.len(),
        parsed.normalize.drop_values.len(),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn summary_text() {
        let s = TrackedSummary {
            lifecycles: 3,
            active: 2,
            removed: 1,
            distinct_pairs: 2,
            distinct_entities: 2,
            records: 4,
            active_by_category: BTreeMap::from([("SDN".to_string(), 2)]),
            first_report_date: Some("2021-01-31".into()),
            last_report_date: Some("2021-03-31".into()),
            report_dates: 3,
        };
        let text = render_summary("data/ofac_list.csv", &s);
        assert!(text.contains("report dates: 3 (2021-01-31 .. 2021-03-31)"));
        assert!(text.contains("lifecycles:   3 (2 active, 1 removed)"));
        assert!(text.contains("active SDN   2"));
    }
}
