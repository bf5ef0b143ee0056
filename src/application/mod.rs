//! Application layer - use cases and orchestration.
//!
//! This layer contains change detection, the batched transfer run and
//! output formatting.

pub mod change_detector;
pub mod formatter;
pub mod retry;
pub mod sync_service;

pub use formatter::{
    format_candidates_table, format_ledger_table, format_projects_table, format_runs_table,
};
pub use sync_service::{run_record, SyncOutcome, SyncService};
