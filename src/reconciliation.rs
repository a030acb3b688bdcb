// ⚖️ Reconciliation Coordinator - branch totals with unknown-code healing
//
// Per bank/direction, every pending branch gets its credit/debit totals and
// account hash computed and committed. When a branch carries codes the code
// table does not know, the run switches into the healing cycle:
//
//   Calculating ──▶ AwaitingMapping ──▶ Refetching ──▶ Calculating (next attempt)
//        │                 │                 │
//        ▼                 ▼                 ▼
//   Reconciled          Aborted      AwaitingMapping (next attempt)
//
// A pass runs inside one store transaction. If any branch in it needs a remap
// the whole pass is rolled back and restarted after the mapping is applied, so
// every branch of the committed pass saw the same code table state.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, error, info, warn};

use crate::codes::{CodeMapping, CodeMappings, CodeTable};
use crate::config::Settings;
use crate::confirm::Confirm;
use crate::db::{self, BranchHeaderRow, BranchStatus, Event};
use crate::error::{ClearingError, ClearingResult};
use crate::record::Direction;
use crate::totals::{self, BranchTotals, TotalsOutcome};

const ACTOR: &str = "reconciler";

// ============================================================================
// REPORT
// ============================================================================

/// Identity of a branch as observed when its rows were first fetched
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchRef {
    pub id: i64,
    pub bank_code: String,
    pub branch_code: String,
}

impl From<&BranchHeaderRow> for BranchRef {
    fn from(row: &BranchHeaderRow) -> Self {
        BranchRef {
            id: row.id,
            bank_code: row.bank_code.clone(),
            branch_code: row.branch_code.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciledBranch {
    pub branch_id: i64,
    pub branch_code: String,
    pub transaction_count: usize,
    pub totals: BranchTotals,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedRemap {
    pub old_code: String,
    pub new_code: String,
    pub rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
    pub run_id: String,
    pub bank_code: String,
    pub direction: Direction,

    /// Pass that committed
    pub attempts: u32,
    pub branches: Vec<ReconciledBranch>,
    pub remaps: Vec<AppliedRemap>,

    /// Branch codes still pending after the run
    pub outstanding: Vec<String>,
    pub reconciled_at: DateTime<Utc>,
}

impl ReconciliationReport {
    pub fn is_complete(&self) -> bool {
        self.outstanding.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "Reconciliation for bank {} ({}): {} branches reconciled in {} attempt(s), {} remap(s), {} outstanding",
            self.bank_code,
            self.direction,
            self.branches.len(),
            self.attempts,
            self.remaps.len(),
            self.outstanding.len()
        )
    }
}

// ============================================================================
// STATE MACHINE
// ============================================================================

#[derive(Debug)]
enum PassState {
    Calculating {
        attempt: u32,
    },
    AwaitingMapping {
        attempt: u32,
        branch: BranchRef,
        unknown: BTreeSet<String>,
    },
    Refetching {
        attempt: u32,
        branch: BranchRef,
    },
    Reconciled {
        attempt: u32,
        branches: Vec<ReconciledBranch>,
    },
    Aborted(ClearingError),
}

enum PassOutcome {
    Committed(Vec<ReconciledBranch>),
    NeedsMapping {
        branch: BranchRef,
        unknown: BTreeSet<String>,
    },
}

pub struct ReconciliationCoordinator<'a, C: Confirm> {
    settings: &'a Settings,
    codes: &'a CodeTable,
    mappings: &'a CodeMappings,
    confirm: C,
}

impl<'a, C: Confirm> ReconciliationCoordinator<'a, C> {
    pub fn new(
        settings: &'a Settings,
        codes: &'a CodeTable,
        mappings: &'a CodeMappings,
        confirm: C,
    ) -> Self {
        ReconciliationCoordinator {
            settings,
            codes,
            mappings,
            confirm,
        }
    }

    /// Reconcile every pending branch of `bank_code` in one direction.
    ///
    /// Any unresolved code, refused remap, exhausted budget or store failure
    /// aborts the whole run. Branches committed by an earlier completed pass
    /// stay reconciled; everything else stays pending.
    pub fn run(
        &mut self,
        conn: &mut Connection,
        bank_code: &str,
        direction: Direction,
    ) -> ClearingResult<ReconciliationReport> {
        if self.codes.is_empty() {
            return Err(ClearingError::Config(
                "transaction code table is empty".to_string(),
            ));
        }

        let run_id = uuid::Uuid::new_v4().to_string();
        let max_attempts = self.settings.max_attempts.max(1);
        let mut remaps = Vec::new();
        let mut state = PassState::Calculating { attempt: 1 };

        info!(%run_id, bank_code, %direction, max_attempts, "reconciliation run started");

        loop {
            debug!(?state, "reconciliation state");
            state = match state {
                PassState::Calculating { attempt } => {
                    info!(attempt, bank_code, %direction, "reconciliation pass");
                    match self.run_pass(conn, bank_code, direction)? {
                        PassOutcome::Committed(branches) => {
                            PassState::Reconciled { attempt, branches }
                        }
                        PassOutcome::NeedsMapping { branch, unknown } => {
                            PassState::AwaitingMapping {
                                attempt,
                                branch,
                                unknown,
                            }
                        }
                    }
                }

                PassState::AwaitingMapping {
                    attempt,
                    branch,
                    unknown,
                } => match self.request_mapping(&branch, &unknown, attempt, max_attempts) {
                    Ok(mappings) => {
                        remaps.extend(self.apply_mappings(conn, direction, &branch, &mappings, &run_id)?);
                        PassState::Refetching { attempt, branch }
                    }
                    Err(e) => PassState::Aborted(e),
                },

                PassState::Refetching { attempt, branch } => {
                    let delay = self.settings.settle_delay();
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }

                    let rows =
                        db::fetch_branch_rows(conn, direction, &branch.bank_code, &branch.branch_code)?;
                    match totals::calculate(&rows, self.codes) {
                        TotalsOutcome::Totals(_) => {
                            info!(branch = %branch.branch_code, "branch resolved after remap, restarting pass");
                            PassState::Calculating {
                                attempt: attempt + 1,
                            }
                        }
                        TotalsOutcome::Unresolved(unknown) => {
                            warn!(branch = %branch.branch_code, ?unknown, "branch still unresolved after remap");
                            PassState::AwaitingMapping {
                                attempt: attempt + 1,
                                branch,
                                unknown,
                            }
                        }
                    }
                }

                PassState::Reconciled { attempt, branches } => {
                    let outstanding = outstanding_branches(conn, bank_code, direction)?
                        .into_iter()
                        .map(|b| b.branch_code)
                        .collect::<Vec<_>>();

                    let report = ReconciliationReport {
                        run_id,
                        bank_code: bank_code.to_string(),
                        direction,
                        attempts: attempt,
                        branches,
                        remaps,
                        outstanding,
                        reconciled_at: Utc::now(),
                    };
                    info!("{}", report.summary());
                    return Ok(report);
                }

                PassState::Aborted(e) => {
                    error!(%run_id, error = %e, "reconciliation run aborted");
                    return Err(e);
                }
            };
        }
    }

    /// One pass over all pending branches inside a single transaction.
    /// The first branch with unknown codes rolls the whole pass back.
    fn run_pass(
        &self,
        conn: &mut Connection,
        bank_code: &str,
        direction: Direction,
    ) -> ClearingResult<PassOutcome> {
        let tx = conn.transaction()?;
        let pending = db::list_branches(&tx, direction, bank_code, Some(BranchStatus::Pending))?;
        let mut reconciled = Vec::with_capacity(pending.len());

        for branch in &pending {
            let rows = db::fetch_branch_rows(&tx, direction, bank_code, &branch.branch_code)?;

            let totals = if rows.is_empty() {
                BranchTotals::default()
            } else {
                match totals::calculate(&rows, self.codes) {
                    TotalsOutcome::Totals(totals) => totals,
                    TotalsOutcome::Unresolved(unknown) => {
                        warn!(
                            branch = %branch.branch_code,
                            ?unknown,
                            "unknown transaction codes, rolling back pass"
                        );
                        tx.rollback()?;
                        return Ok(PassOutcome::NeedsMapping {
                            branch: BranchRef::from(branch),
                            unknown,
                        });
                    }
                }
            };

            db::mark_reconciled(&tx, direction, branch.id, &totals)?;
            db::insert_event(
                &tx,
                &Event::new(
                    "branch_reconciled",
                    "branch",
                    &branch_entity_id(direction, bank_code, &branch.branch_code),
                    serde_json::json!({
                        "transactions": rows.len(),
                        "credit_total": totals.credit_total,
                        "debit_total": totals.debit_total,
                        "hash_total": totals.hash_total,
                    }),
                    ACTOR,
                ),
            )?;

            debug!(branch = %branch.branch_code, ?totals, "branch reconciled");
            reconciled.push(ReconciledBranch {
                branch_id: branch.id,
                branch_code: branch.branch_code.clone(),
                transaction_count: rows.len(),
                totals,
            });
        }

        tx.commit()?;
        Ok(PassOutcome::Committed(reconciled))
    }

    /// Find applicable mappings and get the operator's go-ahead
    fn request_mapping(
        &mut self,
        branch: &BranchRef,
        unknown: &BTreeSet<String>,
        attempt: u32,
        max_attempts: u32,
    ) -> ClearingResult<Vec<CodeMapping>> {
        let codes: Vec<String> = unknown.iter().cloned().collect();

        let applicable = self.mappings.applicable(unknown);
        if applicable.is_empty() {
            return Err(ClearingError::UnresolvedCodes { codes });
        }

        if attempt >= max_attempts {
            return Err(ClearingError::RetryBudgetExceeded {
                branch_code: branch.branch_code.clone(),
                attempts: attempt,
                codes,
            });
        }

        let listing = applicable
            .iter()
            .map(|m| format!("{} -> {}", m.old_code, m.new_code))
            .collect::<Vec<_>>()
            .join(", ");
        let prompt = format!(
            "Branch {} has unknown transaction codes [{}]. Apply code mapping {}?",
            branch.branch_code,
            codes.join(", "),
            listing
        );

        if self.confirm.confirm(&prompt) {
            Ok(applicable)
        } else {
            Err(ClearingError::MappingDeclined { codes })
        }
    }

    /// Apply confirmed mappings in their own transaction
    fn apply_mappings(
        &self,
        conn: &mut Connection,
        direction: Direction,
        branch: &BranchRef,
        mappings: &[CodeMapping],
        run_id: &str,
    ) -> ClearingResult<Vec<AppliedRemap>> {
        let tx = conn.transaction()?;
        let mut applied = Vec::with_capacity(mappings.len());

        for mapping in mappings {
            let rows = db::remap_code(
                &tx,
                direction,
                &branch.bank_code,
                &mapping.old_code,
                &mapping.new_code,
            )?;
            info!(
                old_code = %mapping.old_code,
                new_code = %mapping.new_code,
                rows,
                "applied code mapping"
            );

            db::insert_event(
                &tx,
                &Event::new(
                    "code_remap_applied",
                    "branch",
                    &branch_entity_id(direction, &branch.bank_code, &branch.branch_code),
                    serde_json::json!({
                        "run_id": run_id,
                        "old_code": mapping.old_code,
                        "new_code": mapping.new_code,
                        "rows": rows,
                    }),
                    ACTOR,
                ),
            )?;

            applied.push(AppliedRemap {
                old_code: mapping.old_code.clone(),
                new_code: mapping.new_code.clone(),
                rows,
            });
        }

        tx.commit()?;
        Ok(applied)
    }
}

/// Branches a run left pending; these are outstanding work
pub fn outstanding_branches(
    conn: &Connection,
    bank_code: &str,
    direction: Direction,
) -> ClearingResult<Vec<BranchHeaderRow>> {
    Ok(db::list_branches(
        conn,
        direction,
        bank_code,
        Some(BranchStatus::Pending),
    )?)
}

pub fn branch_entity_id(direction: Direction, bank_code: &str, branch_code: &str) -> String {
    format!("{}:{}:{}", direction.table_prefix(), bank_code, branch_code)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirm::AutoApprove;
    use crate::fixtures;
    use crate::record::TransactionRecord;
    use std::collections::VecDeque;

    /// Answers from a script; records every prompt it was shown
    struct ScriptedConfirm {
        answers: VecDeque<bool>,
        prompts: Vec<String>,
    }

    impl ScriptedConfirm {
        fn new(answers: &[bool]) -> Self {
            ScriptedConfirm {
                answers: answers.iter().copied().collect(),
                prompts: Vec::new(),
            }
        }
    }

    impl Confirm for ScriptedConfirm {
        fn confirm(&mut self, prompt: &str) -> bool {
            self.prompts.push(prompt.to_string());
            self.answers.pop_front().unwrap_or(false)
        }
    }

    fn test_settings() -> Settings {
        Settings {
            settle_delay_ms: 0,
            ..Settings::default()
        }
    }

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        db::setup_database(&conn).unwrap();
        conn
    }

    /// Outward bank 7010 with the given branches and (branch, code, amount, account) rows
    fn seed(conn: &Connection, branches: &[&str], rows: &[(&str, &str, &str, &str)]) {
        let dir = Direction::Outward;
        db::insert_file_header(conn, dir, &fixtures::file_header(dir, "7010"), "OW.txt").unwrap();
        for branch in branches {
            db::insert_branch_header(conn, dir, &fixtures::branch_header("7010", branch), "OW.txt")
                .unwrap();
        }
        for (branch, code, amount, account) in rows {
            let tx = fixtures::transaction("7010", branch, account, code, amount);
            db::insert_transaction(conn, dir, &tx, "OW.txt").unwrap();
        }
    }

    fn branch(conn: &Connection, code: &str) -> BranchHeaderRow {
        db::get_branch(conn, Direction::Outward, "7010", code)
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_reconciles_credit_and_debit_totals() {
        let mut conn = setup();
        seed(
            &conn,
            &["001"],
            &[
                ("001", "23", "000000010000", "000012345678"),
                ("001", "52", "000000005000", "000012340000"),
            ],
        );

        let settings = test_settings();
        let codes = fixtures::code_table();
        let mappings = CodeMappings::default();
        let mut coordinator =
            ReconciliationCoordinator::new(&settings, &codes, &mappings, AutoApprove(false));

        let report = coordinator.run(&mut conn, "7010", Direction::Outward).unwrap();

        assert_eq!(report.attempts, 1);
        assert!(report.is_complete());
        assert!(report.remaps.is_empty());
        assert_eq!(report.branches.len(), 1);

        let stored = branch(&conn, "001");
        assert_eq!(stored.status, BranchStatus::Reconciled);
        assert_eq!(stored.totals.credit_total, 10000);
        assert_eq!(stored.totals.credit_count, 1);
        assert_eq!(stored.totals.debit_total, 5000);
        assert_eq!(stored.totals.debit_count, 1);
        assert_eq!(stored.totals.hash_total, 12345678 + 12340000);

        let events = db::get_events_for_entity(&conn, "branch", "OW:7010:001").unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "branch_reconciled");
    }

    #[test]
    fn test_branch_without_transactions_reconciles_to_zero() {
        let mut conn = setup();
        seed(&conn, &["001"], &[]);

        let settings = test_settings();
        let codes = fixtures::code_table();
        let mappings = CodeMappings::default();
        let mut coordinator =
            ReconciliationCoordinator::new(&settings, &codes, &mappings, AutoApprove(false));

        let report = coordinator.run(&mut conn, "7010", Direction::Outward).unwrap();

        assert_eq!(report.branches[0].transaction_count, 0);
        let stored = branch(&conn, "001");
        assert_eq!(stored.status, BranchStatus::Reconciled);
        assert_eq!(stored.totals, BranchTotals::default());
    }

    #[test]
    fn test_second_run_is_idempotent() {
        let mut conn = setup();
        seed(
            &conn,
            &["001", "002"],
            &[
                ("001", "23", "000000010000", "000000000001"),
                ("002", "52", "000000000250", "000000000002"),
            ],
        );

        let settings = test_settings();
        let codes = fixtures::code_table();
        let mappings = CodeMappings::default();
        let mut coordinator =
            ReconciliationCoordinator::new(&settings, &codes, &mappings, AutoApprove(false));

        coordinator.run(&mut conn, "7010", Direction::Outward).unwrap();
        let first = db::list_branches(&conn, Direction::Outward, "7010", None).unwrap();

        let second_report = coordinator.run(&mut conn, "7010", Direction::Outward).unwrap();
        let second = db::list_branches(&conn, Direction::Outward, "7010", None).unwrap();

        assert!(second_report.branches.is_empty());
        assert_eq!(first, second);
        assert!(second.iter().all(|b| b.status == BranchStatus::Reconciled));
    }

    #[test]
    fn test_unknown_code_heals_after_confirmed_remap() {
        let settings = test_settings();
        let codes = fixtures::code_table();
        let mappings = CodeMappings::from_json(r#"{"99": "21"}"#).unwrap();

        // Same data, once with the unknown code and once already correct
        let mut healed = setup();
        seed(
            &healed,
            &["001"],
            &[
                ("001", "99", "000000012300", "000000000077"),
                ("001", "52", "000000000300", "000000000023"),
            ],
        );
        let mut clean = setup();
        seed(
            &clean,
            &["001"],
            &[
                ("001", "21", "000000012300", "000000000077"),
                ("001", "52", "000000000300", "000000000023"),
            ],
        );

        let mut confirm = ScriptedConfirm::new(&[true]);
        let report = ReconciliationCoordinator::new(&settings, &codes, &mappings, &mut confirm)
            .run(&mut healed, "7010", Direction::Outward)
            .unwrap();

        ReconciliationCoordinator::new(&settings, &codes, &mappings, AutoApprove(false))
            .run(&mut clean, "7010", Direction::Outward)
            .unwrap();

        assert_eq!(confirm.prompts.len(), 1);
        assert!(confirm.prompts[0].contains("99 -> 21"));
        assert_eq!(report.attempts, 2);
        assert_eq!(
            report.remaps,
            vec![AppliedRemap {
                old_code: "99".to_string(),
                new_code: "21".to_string(),
                rows: 1,
            }]
        );
        assert_eq!(branch(&healed, "001").totals, branch(&clean, "001").totals);
        assert_eq!(branch(&healed, "001").totals.credit_total, 12300);
    }

    #[test]
    fn test_retried_pass_rolls_back_earlier_branches() {
        let mut conn = setup();
        seed(
            &conn,
            &["001", "002"],
            &[
                ("001", "23", "000000000100", "000000000001"),
                ("002", "99", "000000000200", "000000000002"),
            ],
        );

        let settings = test_settings();
        let codes = fixtures::code_table();
        let mappings = CodeMappings::from_json(r#"{"99": "52"}"#).unwrap();
        let mut coordinator =
            ReconciliationCoordinator::new(&settings, &codes, &mappings, AutoApprove(true));

        let report = coordinator.run(&mut conn, "7010", Direction::Outward).unwrap();

        assert_eq!(report.branches.len(), 2);
        assert_eq!(branch(&conn, "002").totals.debit_total, 200);

        // Branch 001 was computed in the rolled-back pass too, but only the
        // committed pass left a trace
        let events = db::get_events_for_entity(&conn, "branch", "OW:7010:001").unwrap();
        assert_eq!(events.len(), 1);

        let remap_events = db::get_events_for_entity(&conn, "branch", "OW:7010:002").unwrap();
        assert!(remap_events.iter().any(|e| e.event_type == "code_remap_applied"));
    }

    #[test]
    fn test_store_failure_mid_pass_rolls_back() {
        let mut conn = setup();
        seed(
            &conn,
            &["001", "002"],
            &[
                ("001", "23", "000000000100", "000000000001"),
                ("002", "52", "000000000200", "000000000002"),
            ],
        );
        // mark_reconciled succeeds, the audit insert right after it fails
        conn.execute_batch("DROP TABLE events").unwrap();

        let settings = test_settings();
        let codes = fixtures::code_table();
        let mappings = CodeMappings::default();

        let err = ReconciliationCoordinator::new(&settings, &codes, &mappings, AutoApprove(false))
            .run(&mut conn, "7010", Direction::Outward)
            .unwrap_err();

        assert!(matches!(err, ClearingError::StoreUnavailable(_)));
        for code in ["001", "002"] {
            let stored = branch(&conn, code);
            assert_eq!(stored.status, BranchStatus::Pending);
            assert_eq!(stored.totals, BranchTotals::default());
        }
    }

    #[test]
    fn test_empty_code_table_is_a_config_error() {
        let mut conn = setup();
        seed(&conn, &["001"], &[("001", "23", "000000000100", "000000000001")]);

        let settings = test_settings();
        let codes = CodeTable::new();
        let mappings = CodeMappings::default();

        let err = ReconciliationCoordinator::new(&settings, &codes, &mappings, AutoApprove(true))
            .run(&mut conn, "7010", Direction::Outward)
            .unwrap_err();

        assert!(matches!(err, ClearingError::Config(_)));
        assert_eq!(branch(&conn, "001").status, BranchStatus::Pending);
    }

    #[test]
    fn test_no_applicable_mapping_aborts_whole_run() {
        let mut conn = setup();
        seed(
            &conn,
            &["001", "002"],
            &[
                ("001", "23", "000000000100", "000000000001"),
                ("002", "77", "000000000200", "000000000002"),
            ],
        );

        let settings = test_settings();
        let codes = fixtures::code_table();
        let mappings = CodeMappings::from_json(r#"{"99": "21"}"#).unwrap();
        let mut confirm = ScriptedConfirm::new(&[true]);

        let err = ReconciliationCoordinator::new(&settings, &codes, &mappings, &mut confirm)
            .run(&mut conn, "7010", Direction::Outward)
            .unwrap_err();

        assert!(matches!(err, ClearingError::UnresolvedCodes { .. }));
        assert_eq!(err.codes(), &["77".to_string()]);
        assert!(confirm.prompts.is_empty());

        let pending = outstanding_branches(&conn, "7010", Direction::Outward).unwrap();
        assert_eq!(pending.len(), 2);
    }

    #[test]
    fn test_declined_remap_aborts_without_touching_rows() {
        let mut conn = setup();
        seed(&conn, &["001"], &[("001", "99", "000000000100", "000000000001")]);

        let settings = test_settings();
        let codes = fixtures::code_table();
        let mappings = CodeMappings::from_json(r#"{"99": "21"}"#).unwrap();
        let mut confirm = ScriptedConfirm::new(&[false]);

        let err = ReconciliationCoordinator::new(&settings, &codes, &mappings, &mut confirm)
            .run(&mut conn, "7010", Direction::Outward)
            .unwrap_err();

        assert!(matches!(err, ClearingError::MappingDeclined { .. }));
        let rows = db::fetch_branch_rows(&conn, Direction::Outward, "7010", "001").unwrap();
        assert_eq!(rows[0].code, "99");
        assert_eq!(branch(&conn, "001").status, BranchStatus::Pending);
    }

    #[test]
    fn test_cyclic_mapping_exhausts_retry_budget() {
        let mut conn = setup();
        seed(&conn, &["001"], &[("001", "99", "000000000100", "000000000001")]);

        let settings = test_settings();
        let codes = fixtures::code_table();
        let mappings = CodeMappings::from_json(r#"{"99": "98", "98": "99"}"#).unwrap();
        let mut coordinator =
            ReconciliationCoordinator::new(&settings, &codes, &mappings, AutoApprove(true));

        let err = coordinator.run(&mut conn, "7010", Direction::Outward).unwrap_err();

        match err {
            ClearingError::RetryBudgetExceeded {
                branch_code,
                attempts,
                ..
            } => {
                assert_eq!(branch_code, "001");
                assert_eq!(attempts, 3);
            }
            other => panic!("expected retry budget error, got {:?}", other),
        }
        assert_eq!(branch(&conn, "001").status, BranchStatus::Pending);
    }

    #[test]
    fn test_remap_leaves_other_banks_alone() {
        let mut conn = setup();
        seed(&conn, &["001"], &[("001", "99", "000000000100", "000000000001")]);
        let other = fixtures::transaction("7135", "001", "000000000001", "99", "000000000100");
        db::insert_transaction(&conn, Direction::Outward, &other, "OW.txt").unwrap();

        let settings = test_settings();
        let codes = fixtures::code_table();
        let mappings = CodeMappings::from_json(r#"{"99": "21"}"#).unwrap();
        ReconciliationCoordinator::new(&settings, &codes, &mappings, AutoApprove(true))
            .run(&mut conn, "7010", Direction::Outward)
            .unwrap();

        let rows = db::fetch_branch_rows(&conn, Direction::Outward, "7135", "001").unwrap();
        assert_eq!(rows[0].code, "99");
    }

    #[test]
    fn test_inward_branches_scoped_by_destination() {
        let mut conn = setup();
        let dir = Direction::Inward;
        db::insert_file_header(&conn, dir, &fixtures::file_header(dir, "7278"), "IW.txt").unwrap();
        db::insert_branch_header(&conn, dir, &fixtures::branch_header("7278", "100"), "IW.txt")
            .unwrap();

        // Sent from two different banks, both received by 7278/100
        for orig_bank in ["7010", "7135"] {
            let tx: TransactionRecord =
                fixtures::transaction(orig_bank, "001", "000000000010", "23", "000000001000");
            db::insert_transaction(&conn, dir, &tx, "IW.txt").unwrap();
        }

        let settings = test_settings();
        let codes = fixtures::code_table();
        let mappings = CodeMappings::default();
        let report = ReconciliationCoordinator::new(&settings, &codes, &mappings, AutoApprove(false))
            .run(&mut conn, "7278", Direction::Inward)
            .unwrap();

        assert_eq!(report.branches[0].transaction_count, 2);
        assert_eq!(report.branches[0].totals.credit_total, 2000);
        assert_eq!(report.branches[0].totals.hash_total, 20);
    }
}
