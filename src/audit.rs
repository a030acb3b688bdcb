// 🔍 Branch Auditor - read-only pre-flight check before reconciliation
//
// Flags branches that have nothing to reconcile: no transactions at all, or
// only zero-amount ones. Never writes to the store.

use rusqlite::Connection;
use serde::Serialize;
use std::fmt;

use crate::db::{self, BranchHeaderRow};
use crate::error::ClearingResult;
use crate::record::Direction;
use crate::totals::parse_amount;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BranchProblem {
    NoTransactions,

    /// Several transactions, every one of them zero
    OnlyZeroAmount { transactions: usize },

    /// Exactly one transaction and it is zero
    SingleZeroAmount,
}

impl BranchProblem {
    /// Both zero-amount variants mean "nothing but zero-amount transactions"
    pub fn is_zero_amount_only(&self) -> bool {
        matches!(
            self,
            BranchProblem::OnlyZeroAmount { .. } | BranchProblem::SingleZeroAmount
        )
    }
}

impl fmt::Display for BranchProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BranchProblem::NoTransactions => write!(f, "zero transactions"),
            BranchProblem::OnlyZeroAmount { transactions } => write!(
                f,
                "only zero-amount transactions ({} transactions)",
                transactions
            ),
            BranchProblem::SingleZeroAmount => {
                write!(f, "only zero-amount transactions (single transaction)")
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BranchAudit {
    pub branch: BranchHeaderRow,
    pub transactions: usize,
    pub non_zero: usize,
    pub problem: Option<BranchProblem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    pub bank_code: String,
    pub direction: Direction,
    pub passed: bool,
    pub problems: Vec<String>,

    /// Branches without problems, ready for downstream processing
    pub ok_branches: Vec<BranchHeaderRow>,
    pub audits: Vec<BranchAudit>,
}

impl AuditReport {
    pub fn summary(&self) -> String {
        format!(
            "Audit for bank {} ({}): {} branches, {} ok, {} problem(s)",
            self.bank_code,
            self.direction,
            self.audits.len(),
            self.ok_branches.len(),
            self.problems.len()
        )
    }
}

pub fn classify(transactions: usize, non_zero: usize) -> Option<BranchProblem> {
    match (transactions, non_zero) {
        (0, _) => Some(BranchProblem::NoTransactions),
        (1, 0) => Some(BranchProblem::SingleZeroAmount),
        (n, 0) => Some(BranchProblem::OnlyZeroAmount { transactions: n }),
        _ => None,
    }
}

/// Audit every branch header of a bank in one direction
pub fn audit_branches(
    conn: &Connection,
    bank_code: &str,
    direction: Direction,
) -> ClearingResult<AuditReport> {
    let branches = db::list_branches(conn, direction, bank_code, None)?;

    let mut audits = Vec::with_capacity(branches.len());
    let mut problems = Vec::new();
    let mut ok_branches = Vec::new();

    for branch in branches {
        let rows = db::fetch_branch_rows(conn, direction, bank_code, &branch.branch_code)?;
        let non_zero = rows.iter().filter(|r| parse_amount(&r.amount) != 0).count();
        let problem = classify(rows.len(), non_zero);

        match problem {
            Some(p) => problems.push(format!("Branch {}: {}", branch.branch_code, p)),
            None => ok_branches.push(branch.clone()),
        }

        audits.push(BranchAudit {
            branch,
            transactions: rows.len(),
            non_zero,
            problem,
        });
    }

    Ok(AuditReport {
        bank_code: bank_code.to_string(),
        direction,
        passed: problems.is_empty(),
        problems,
        ok_branches,
        audits,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    fn seeded(rows: &[(&str, &str)]) -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        db::setup_database(&conn).unwrap();

        let dir = Direction::Outward;
        for branch in ["001", "002", "003", "004"] {
            db::insert_branch_header(&conn, dir, &fixtures::branch_header("7010", branch), "OW.txt")
                .unwrap();
        }
        for (branch, amount) in rows {
            let tx = fixtures::transaction("7010", branch, "000000000001", "23", amount);
            db::insert_transaction(&conn, dir, &tx, "OW.txt").unwrap();
        }
        conn
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(0, 0), Some(BranchProblem::NoTransactions));
        assert_eq!(classify(1, 0), Some(BranchProblem::SingleZeroAmount));
        assert_eq!(
            classify(3, 0),
            Some(BranchProblem::OnlyZeroAmount { transactions: 3 })
        );
        assert_eq!(classify(3, 1), None);
    }

    #[test]
    fn test_flags_problem_branches() {
        let conn = seeded(&[
            ("001", "000000010000"),
            ("001", "000000000000"),
            ("002", "0"),
            ("004", "000000000000"),
            ("004", "000000000000"),
        ]);

        let report = audit_branches(&conn, "7010", Direction::Outward).unwrap();

        assert!(!report.passed);
        assert_eq!(report.problems.len(), 3);
        assert_eq!(report.ok_branches.len(), 1);
        assert_eq!(report.ok_branches[0].branch_code, "001");

        let single = &report.audits[1];
        assert_eq!(single.branch.branch_code, "002");
        assert!(single.problem.unwrap().is_zero_amount_only());
        assert!(report.problems[0].contains("only zero-amount transactions"));

        assert_eq!(report.audits[2].problem, Some(BranchProblem::NoTransactions));
        assert_eq!(
            report.audits[3].problem,
            Some(BranchProblem::OnlyZeroAmount { transactions: 2 })
        );
    }

    #[test]
    fn test_clean_bank_passes() {
        let conn = seeded(&[
            ("001", "000000000100"),
            ("002", "000000000200"),
            ("003", "000000000300"),
            ("004", "000000000400"),
        ]);

        let report = audit_branches(&conn, "7010", Direction::Outward).unwrap();

        assert!(report.passed);
        assert!(report.problems.is_empty());
        assert_eq!(report.ok_branches.len(), 4);
    }

    #[test]
    fn test_audit_does_not_write() {
        let conn = seeded(&[("001", "000000000100")]);
        let before = db::list_branches(&conn, Direction::Outward, "7010", None).unwrap();

        audit_branches(&conn, "7010", Direction::Outward).unwrap();

        let after = db::list_branches(&conn, Direction::Outward, "7010", None).unwrap();
        assert_eq!(before, after);
    }
}
