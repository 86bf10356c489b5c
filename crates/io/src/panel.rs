//! Panel CSV export.

use std::path::Path;

use sanctrack_recon::Panel;

use crate::error::IoError;
use crate::source::write_atomic;

pub const PANEL_COLUMNS: [&str; 8] = [
    "Country", "Date", "yrqtr", "yrmon", "levels", "additions", "removals", "change",
];

pub fn panel_to_csv(panel: &Panel) -> Result<Vec<u8>, IoError> {
    let csv_err = |source| IoError::Csv {
        origin: "panel".to_string(),
        source,
    };
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(PANEL_COLUMNS).map_err(csv_err)?;
    for row in &panel.rows {
        writer
            .write_record([
                row.country.clone(),
                row.date.format("%Y-%m-%d").to_string(),
                row.yrqtr.clone(),
                row.yrmon.clone(),
                row.levels.to_string(),
                row.additions.to_string(),
                row.removals.to_string(),
                row.change.to_string(),
            ])
            .map_err(csv_err)?;
    }
    writer
        .into_inner()
        .map_err(|e| csv_err(e.into_error().into()))
}

pub fn save_panel(path: &Path, panel: &Panel) -> Result<(), IoError> {
    write_atomic(path, &panel_to_csv(panel)?)?;
    tracing::info!(
        path = %path.display(),
        rows = panel.rows.len(),
        countries = panel.countries().len(),
        "panel written"
    );
    Ok(())
}
