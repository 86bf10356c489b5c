//! `sanctrack-recon` — sanctions-list lifecycle reconciliation engine.
//!
//! Pure engine crate: receives parsed snapshots, returns lifecycle records
//! and country panels. No CLI or IO dependencies.

pub mod calendar;
pub mod config;
pub mod error;
pub mod history;
pub mod incremental;
pub mod model;
pub mod normalize;
pub mod panel;
pub mod summary;

pub use config::{ReconConfig, ReconcileOptions};
pub use error::ReconError;
pub use history::reconcile_history;
pub use incremental::{reconcile_incremental, UpdateSummary};
pub use model::{EntityRecord, Lifecycle, PairKey, Snapshot, TrackedList};
pub use normalize::CountryNormalizer;
pub use panel::{build_panel, Panel, PanelRow};
pub use summary::{summarize, TrackedSummary};
