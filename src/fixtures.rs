// Test fixtures: well-formed clearing lines and a small code table

use crate::codes::{CodeTable, TransactionClass};
use crate::record::{BranchHeaderRecord, Direction, FileHeaderRecord, TransactionRecord};

pub const DEST_BANK: &str = "7278";
pub const DEST_BRANCH: &str = "100";
pub const FILE_DATE: &str = "250114";

pub fn code_table() -> CodeTable {
    CodeTable::new()
        .with_code("21", "Salary credit", TransactionClass::Credit)
        .with_code("23", "Fund transfer", TransactionClass::Credit)
        .with_code("52", "Direct debit", TransactionClass::Debit)
}

pub fn file_header(direction: Direction, bank_code: &str) -> FileHeaderRecord {
    FileHeaderRecord {
        control_id: "5555".to_string(),
        field_id: direction.field_id().to_string(),
        date: FILE_DATE.to_string(),
        bank_code: bank_code.to_string(),
        batch_count: "0001".to_string(),
        transaction_count: "000002".to_string(),
        reserved: String::new(),
    }
}

pub fn file_header_line(direction: Direction, bank_code: &str) -> String {
    file_header(direction, bank_code).encode()
}

pub fn branch_header(bank_code: &str, branch_code: &str) -> BranchHeaderRecord {
    BranchHeaderRecord {
        control_id: "4444".to_string(),
        field_id: "OWD".to_string(),
        date: FILE_DATE.to_string(),
        bank_code: bank_code.to_string(),
        branch_code: branch_code.to_string(),
        credit_total: "0".repeat(15),
        credit_count: "0".repeat(6),
        debit_total: "0".repeat(15),
        debit_count: "0".repeat(6),
        hash_total: "0".repeat(18),
        reserved: String::new(),
    }
}

pub fn branch_header_line(bank_code: &str, branch_code: &str) -> String {
    branch_header(bank_code, branch_code).encode()
}

/// Outward-style transaction: originating bank/branch identify the branch
pub fn transaction(
    orig_bank: &str,
    orig_branch: &str,
    dest_account: &str,
    code: &str,
    amount: &str,
) -> TransactionRecord {
    TransactionRecord {
        transaction_id: "0000".to_string(),
        destination_bank: DEST_BANK.to_string(),
        destination_branch: DEST_BRANCH.to_string(),
        destination_account: dest_account.to_string(),
        destination_name: "K PERERA".to_string(),
        transaction_code: code.to_string(),
        return_code: "00".to_string(),
        return_date: "000000".to_string(),
        amount: amount.to_string(),
        currency: "LKR".to_string(),
        originating_bank: orig_bank.to_string(),
        originating_branch: orig_branch.to_string(),
        originating_account: "000087654321".to_string(),
        originating_name: "ACME HOLDINGS".to_string(),
        particulars: "SALARY JAN".to_string(),
        reference: "REF0001".to_string(),
        value_date: FILE_DATE.to_string(),
        security_check: "000000".to_string(),
        reserved: String::new(),
        description: String::new(),
    }
}

pub fn transaction_line(
    orig_bank: &str,
    orig_branch: &str,
    dest_account: &str,
    code: &str,
    amount: &str,
) -> String {
    transaction(orig_bank, orig_branch, dest_account, code, amount).encode()
}
