// Clearing Reconcile - Core Library
// Fixed-width clearing file ingestion and branch reconciliation

pub mod audit;          // Pre-flight branch checks
pub mod codes;          // Transaction code table + remapping table
pub mod config;         // Explicit settings value
pub mod confirm;        // Operator confirmation capability
pub mod db;             // SQLite store (per-direction table sets + audit trail)
pub mod error;
pub mod ingest;         // File → store, with validation rejections
pub mod parser;         // Dataset segmenter
pub mod reconciliation; // Totals + unknown-code healing state machine
pub mod record;         // Fixed-width record decoder
pub mod totals;         // Credit/debit totals and account hash

#[cfg(test)]
pub(crate) mod fixtures;

// Re-export commonly used types
pub use audit::{audit_branches, AuditReport, BranchAudit, BranchProblem};
pub use codes::{CodeEntry, CodeMapping, CodeMappings, CodeTable, TransactionClass};
pub use config::Settings;
pub use confirm::{AutoApprove, Confirm, ConsoleConfirm};
pub use db::{
    setup_database, BranchHeaderRow, BranchStatus, Event, Tables,
    get_events_for_entity, insert_event, list_branches,
};
pub use error::{ClearingError, ClearingResult};
pub use ingest::{ingest_bytes, ingest_file, write_rejections_csv, IngestSummary, Rejection};
pub use parser::{segment, BranchGroup, FileHeaderGroup};
pub use reconciliation::{
    outstanding_branches, AppliedRemap, ReconciledBranch, ReconciliationCoordinator,
    ReconciliationReport,
};
pub use record::{
    BranchHeaderRecord, Direction, FileHeaderRecord, TransactionRecord, RECORD_LEN,
};
pub use totals::{calculate, BranchTotals, TotalsOutcome, TransactionRow};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
