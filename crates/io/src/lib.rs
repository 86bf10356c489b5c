//! `sanctrack-io` — file formats around the reconciliation engine.
//!
//! Reads raw list tables and merged snapshot files, persists tracked lists
//! with their manifest, and writes panel CSVs.

pub mod error;
pub mod merged;
pub mod panel;
pub mod snapshot;
pub mod source;
pub mod tracked;

pub use error::IoError;
pub use merged::load_history_dir;
pub use panel::save_panel;
pub use snapshot::{load_snapshot_dir, IngestReport, Rejection};
pub use tracked::{load_tracked, load_tracked_or_empty, save_tracked};
