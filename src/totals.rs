// 🧮 Totals Calculator - credit/debit totals and account hash per branch
//
// Amounts are fixed-width integers in minor units (scale 2 implied), so all
// arithmetic here is on i64 cents. Nothing is converted to floating point.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::codes::{CodeTable, TransactionClass};

/// Amount values that mark a row as a no-op
const NOOP_AMOUNTS: [&str; 2] = ["0", "000000000000"];

/// The three fields totals depend on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRow {
    pub code: String,
    pub amount: String,
    pub destination_account: String,
}

impl TransactionRow {
    pub fn new(code: &str, amount: &str, destination_account: &str) -> Self {
        TransactionRow {
            code: code.to_string(),
            amount: amount.to_string(),
            destination_account: destination_account.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchTotals {
    pub credit_total: i64,
    pub credit_count: i64,
    pub debit_total: i64,
    pub debit_count: i64,
    pub hash_total: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TotalsOutcome {
    Totals(BranchTotals),

    /// Codes missing from the code table; no totals are produced
    Unresolved(BTreeSet<String>),
}

impl TotalsOutcome {
    pub fn totals(&self) -> Option<&BranchTotals> {
        match self {
            TotalsOutcome::Totals(totals) => Some(totals),
            TotalsOutcome::Unresolved(_) => None,
        }
    }
}

/// Amount in minor units; blank or unparseable text counts as zero
pub fn parse_amount(raw: &str) -> i64 {
    raw.trim().parse::<i64>().unwrap_or(0)
}

/// `"0"` and twelve zeros are excluded from totals and the hash
pub fn is_noop_amount(raw: &str) -> bool {
    NOOP_AMOUNTS.contains(&raw.trim())
}

/// Digits of the account number as a number; no digits gives 0
pub fn account_hash_value(account: &str) -> i64 {
    let digits: String = account.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse::<i64>().unwrap_or(0)
}

/// Compute branch totals, or report every code the table does not know
pub fn calculate(rows: &[TransactionRow], codes: &CodeTable) -> TotalsOutcome {
    let mut totals = BranchTotals::default();
    let mut unknown = BTreeSet::new();

    for row in rows {
        if is_noop_amount(&row.amount) {
            continue;
        }

        let amount = parse_amount(&row.amount);
        match codes.class_of(row.code.trim()) {
            Some(TransactionClass::Credit) => {
                totals.credit_total += amount;
                totals.credit_count += 1;
            }
            Some(TransactionClass::Debit) => {
                totals.debit_total += amount;
                totals.debit_count += 1;
            }
            None => {
                unknown.insert(row.code.trim().to_string());
                continue;
            }
        }

        totals.hash_total += account_hash_value(&row.destination_account);
    }

    if unknown.is_empty() {
        TotalsOutcome::Totals(totals)
    } else {
        TotalsOutcome::Unresolved(unknown)
    }
}
