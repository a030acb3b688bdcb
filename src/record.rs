// 📐 Record Decoder - fixed-width 180-character positional records
//
// Three record kinds, told apart by their leading 4-character marker:
//   5555 = file header, 4444 = branch header, 0000 = transaction
//
// Decoding only slices. Offsets count characters, not bytes, so a name with
// an accented letter does not shift the fields after it. Numeric fields stay
// as the raw zero-padded text so a decoded record encodes back to the exact
// same line.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::codes::CodeTable;

pub const RECORD_LEN: usize = 180;

pub const FILE_HEADER_MARKER: &str = "5555";
pub const BRANCH_HEADER_MARKER: &str = "4444";
pub const TRANSACTION_MARKER: &str = "0000";

// ============================================================================
// DIRECTION
// ============================================================================

/// Inward (received) or outward (sent) clearing file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inward,
    Outward,
}

impl Direction {
    /// Derive the direction from the file header's 3-character field id
    pub fn from_field_id(field_id: &str) -> Option<Self> {
        match field_id.trim() {
            "IWD" => Some(Direction::Inward),
            "OWD" => Some(Direction::Outward),
            _ => None,
        }
    }

    pub fn field_id(&self) -> &'static str {
        match self {
            Direction::Inward => "IWD",
            Direction::Outward => "OWD",
        }
    }

    /// Two-letter prefix selecting the table set
    pub fn table_prefix(&self) -> &'static str {
        match self {
            Direction::Inward => "IW",
            Direction::Outward => "OW",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Inward => "inward",
            Direction::Outward => "outward",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "inward" | "iw" | "iwd" => Ok(Direction::Inward),
            "outward" | "ow" | "owd" => Ok(Direction::Outward),
            other => Err(format!("unknown direction '{}' (expected inward or outward)", other)),
        }
    }
}

// ============================================================================
// FIELD TABLES
// ============================================================================

/// One named slice of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub start: usize,
    pub width: usize,
}

impl Field {
    pub const fn new(name: &'static str, start: usize, width: usize) -> Self {
        Field { name, start, width }
    }

    pub const fn end(&self) -> usize {
        self.start + self.width
    }

    fn slice(&self, chars: &[char]) -> String {
        chars[self.start..self.end()].iter().collect()
    }
}

pub mod layout {
    use super::Field;

    pub mod file_header {
        use super::Field;

        pub const CONTROL_ID: Field = Field::new("control_id", 0, 4);
        pub const FIELD_ID: Field = Field::new("field_id", 4, 3);
        pub const DATE: Field = Field::new("date", 7, 6);
        pub const BANK_CODE: Field = Field::new("bank_code", 13, 4);
        pub const BATCH_COUNT: Field = Field::new("batch_count", 17, 4);
        pub const TRANSACTION_COUNT: Field = Field::new("transaction_count", 21, 6);
        pub const RESERVED: Field = Field::new("reserved", 27, 153);

        pub const FIELDS: &[Field] = &[
            CONTROL_ID,
            FIELD_ID,
            DATE,
            BANK_CODE,
            BATCH_COUNT,
            TRANSACTION_COUNT,
            RESERVED,
        ];
    }

    pub mod branch_header {
        use super::Field;

        pub const CONTROL_ID: Field = Field::new("control_id", 0, 4);
        pub const FIELD_ID: Field = Field::new("field_id", 4, 3);
        pub const DATE: Field = Field::new("date", 7, 6);
        pub const BANK_CODE: Field = Field::new("bank_code", 13, 4);
        pub const BRANCH_CODE: Field = Field::new("branch_code", 17, 3);
        pub const CREDIT_TOTAL: Field = Field::new("credit_total", 20, 15);
        pub const CREDIT_COUNT: Field = Field::new("credit_count", 35, 6);
        pub const DEBIT_TOTAL: Field = Field::new("debit_total", 41, 15);
        pub const DEBIT_COUNT: Field = Field::new("debit_count", 56, 6);
        pub const HASH_TOTAL: Field = Field::new("hash_total", 62, 18);
        pub const RESERVED: Field = Field::new("reserved", 80, 100);

        pub const FIELDS: &[Field] = &[
            CONTROL_ID,
            FIELD_ID,
            DATE,
            BANK_CODE,
            BRANCH_CODE,
            CREDIT_TOTAL,
            CREDIT_COUNT,
            DEBIT_TOTAL,
            DEBIT_COUNT,
            HASH_TOTAL,
            RESERVED,
        ];
    }

    pub mod transaction {
        use super::Field;

        pub const TRANSACTION_ID: Field = Field::new("transaction_id", 0, 4);
        pub const DESTINATION_BANK: Field = Field::new("destination_bank", 4, 4);
        pub const DESTINATION_BRANCH: Field = Field::new("destination_branch", 8, 3);
        pub const DESTINATION_ACCOUNT: Field = Field::new("destination_account", 11, 12);
        pub const DESTINATION_NAME: Field = Field::new("destination_name", 23, 20);
        pub const TRANSACTION_CODE: Field = Field::new("transaction_code", 43, 2);
        pub const RETURN_CODE: Field = Field::new("return_code", 45, 2);
        pub const RETURN_DATE: Field = Field::new("return_date", 47, 6);
        pub const AMOUNT: Field = Field::new("amount", 53, 12);
        pub const CURRENCY: Field = Field::new("currency", 65, 3);
        pub const ORIGINATING_BANK: Field = Field::new("originating_bank", 68, 4);
        pub const ORIGINATING_BRANCH: Field = Field::new("originating_branch", 72, 3);
        pub const ORIGINATING_ACCOUNT: Field = Field::new("originating_account", 75, 12);
        pub const ORIGINATING_NAME: Field = Field::new("originating_name", 87, 20);
        pub const PARTICULARS: Field = Field::new("particulars", 107, 15);
        pub const REFERENCE: Field = Field::new("reference", 122, 15);
        pub const VALUE_DATE: Field = Field::new("value_date", 137, 6);
        pub const SECURITY_CHECK: Field = Field::new("security_check", 143, 6);
        pub const RESERVED: Field = Field::new("reserved", 149, 31);

        pub const FIELDS: &[Field] = &[
            TRANSACTION_ID,
            DESTINATION_BANK,
            DESTINATION_BRANCH,
            DESTINATION_ACCOUNT,
            DESTINATION_NAME,
            TRANSACTION_CODE,
            RETURN_CODE,
            RETURN_DATE,
            AMOUNT,
            CURRENCY,
            ORIGINATING_BANK,
            ORIGINATING_BRANCH,
            ORIGINATING_ACCOUNT,
            ORIGINATING_NAME,
            PARTICULARS,
            REFERENCE,
            VALUE_DATE,
            SECURITY_CHECK,
            RESERVED,
        ];
    }
}

/// Slice a line into (name, value) pairs using a field table.
///
/// Returns `None` only when the line is shorter than a full record.
pub fn decode_fields(line: &str, fields: &[Field]) -> Option<Vec<(&'static str, String)>> {
    let line = record_chars(line)?;
    Some(fields.iter().map(|f| (f.name, f.slice(&line))).collect())
}

/// Lay values back into a fixed-width line. Short values are space padded,
/// long ones truncated, gaps stay blank.
fn encode_fields(values: &[(Field, &str)]) -> String {
    let mut line = vec![' '; RECORD_LEN];
    for (field, value) in values {
        for (slot, c) in line[field.start..field.end()].iter_mut().zip(value.chars()) {
            *slot = c;
        }
    }
    line.into_iter().collect()
}

/// The first `RECORD_LEN` characters, or `None` for a short line
fn record_chars(line: &str) -> Option<Vec<char>> {
    let chars: Vec<char> = line.chars().take(RECORD_LEN).collect();
    (chars.len() == RECORD_LEN).then_some(chars)
}

// ============================================================================
// TYPED RECORDS
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHeaderRecord {
    pub control_id: String,
    pub field_id: String,
    pub date: String,
    pub bank_code: String,
    pub batch_count: String,
    pub transaction_count: String,
    pub reserved: String,
}

impl FileHeaderRecord {
    pub fn decode(line: &str) -> Option<Self> {
        use layout::file_header::*;

        let line = record_chars(line)?;

        Some(FileHeaderRecord {
            control_id: CONTROL_ID.slice(&line),
            field_id: FIELD_ID.slice(&line),
            date: DATE.slice(&line),
            bank_code: BANK_CODE.slice(&line),
            batch_count: BATCH_COUNT.slice(&line),
            transaction_count: TRANSACTION_COUNT.slice(&line),
            reserved: RESERVED.slice(&line),
        })
    }

    pub fn encode(&self) -> String {
        use layout::file_header::*;

        encode_fields(&[
            (CONTROL_ID, self.control_id.as_str()),
            (FIELD_ID, self.field_id.as_str()),
            (DATE, self.date.as_str()),
            (BANK_CODE, self.bank_code.as_str()),
            (BATCH_COUNT, self.batch_count.as_str()),
            (TRANSACTION_COUNT, self.transaction_count.as_str()),
            (RESERVED, self.reserved.as_str()),
        ])
    }

    pub fn direction(&self) -> Option<Direction> {
        Direction::from_field_id(&self.field_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchHeaderRecord {
    pub control_id: String,
    pub field_id: String,
    pub date: String,
    pub bank_code: String,
    pub branch_code: String,
    pub credit_total: String,
    pub credit_count: String,
    pub debit_total: String,
    pub debit_count: String,
    pub hash_total: String,
    pub reserved: String,
}

impl BranchHeaderRecord {
    pub fn decode(line: &str) -> Option<Self> {
        use layout::branch_header::*;

        let line = record_chars(line)?;

        Some(BranchHeaderRecord {
            control_id: CONTROL_ID.slice(&line),
            field_id: FIELD_ID.slice(&line),
            date: DATE.slice(&line),
            bank_code: BANK_CODE.slice(&line),
            branch_code: BRANCH_CODE.slice(&line),
            credit_total: CREDIT_TOTAL.slice(&line),
            credit_count: CREDIT_COUNT.slice(&line),
            debit_total: DEBIT_TOTAL.slice(&line),
            debit_count: DEBIT_COUNT.slice(&line),
            hash_total: HASH_TOTAL.slice(&line),
            reserved: RESERVED.slice(&line),
        })
    }

    pub fn encode(&self) -> String {
        use layout::branch_header::*;

        encode_fields(&[
            (CONTROL_ID, self.control_id.as_str()),
            (FIELD_ID, self.field_id.as_str()),
            (DATE, self.date.as_str()),
            (BANK_CODE, self.bank_code.as_str()),
            (BRANCH_CODE, self.branch_code.as_str()),
            (CREDIT_TOTAL, self.credit_total.as_str()),
            (CREDIT_COUNT, self.credit_count.as_str()),
            (DEBIT_TOTAL, self.debit_total.as_str()),
            (DEBIT_COUNT, self.debit_count.as_str()),
            (HASH_TOTAL, self.hash_total.as_str()),
            (RESERVED, self.reserved.as_str()),
        ])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub transaction_id: String,
    pub destination_bank: String,
    pub destination_branch: String,
    pub destination_account: String,
    pub destination_name: String,
    pub transaction_code: String,
    pub return_code: String,
    pub return_date: String,
    pub amount: String,
    pub currency: String,
    pub originating_bank: String,
    pub originating_branch: String,
    pub originating_account: String,
    pub originating_name: String,
    pub particulars: String,
    pub reference: String,
    pub value_date: String,
    pub security_check: String,
    pub reserved: String,

    /// Resolved from the code table, not part of the line
    #[serde(default)]
    pub description: String,
}

impl TransactionRecord {
    /// Decode a transaction line and resolve its code description.
    /// An unknown code still decodes; it is described as "Unknown".
    pub fn decode(line: &str, codes: &CodeTable) -> Option<Self> {
        use layout::transaction::*;

        let line = record_chars(line)?;

        let transaction_code = TRANSACTION_CODE.slice(&line);
        let description = codes.describe(&transaction_code).to_string();

        Some(TransactionRecord {
            transaction_id: TRANSACTION_ID.slice(&line),
            destination_bank: DESTINATION_BANK.slice(&line),
            destination_branch: DESTINATION_BRANCH.slice(&line),
            destination_account: DESTINATION_ACCOUNT.slice(&line),
            destination_name: DESTINATION_NAME.slice(&line),
            transaction_code,
            return_code: RETURN_CODE.slice(&line),
            return_date: RETURN_DATE.slice(&line),
            amount: AMOUNT.slice(&line),
            currency: CURRENCY.slice(&line),
            originating_bank: ORIGINATING_BANK.slice(&line),
            originating_branch: ORIGINATING_BRANCH.slice(&line),
            originating_account: ORIGINATING_ACCOUNT.slice(&line),
            originating_name: ORIGINATING_NAME.slice(&line),
            particulars: PARTICULARS.slice(&line),
            reference: REFERENCE.slice(&line),
            value_date: VALUE_DATE.slice(&line),
            security_check: SECURITY_CHECK.slice(&line),
            reserved: RESERVED.slice(&line),
            description,
        })
    }

    pub fn encode(&self) -> String {
        use layout::transaction::*;

        encode_fields(&[
            (TRANSACTION_ID, self.transaction_id.as_str()),
            (DESTINATION_BANK, self.destination_bank.as_str()),
            (DESTINATION_BRANCH, self.destination_branch.as_str()),
            (DESTINATION_ACCOUNT, self.destination_account.as_str()),
            (DESTINATION_NAME, self.destination_name.as_str()),
            (TRANSACTION_CODE, self.transaction_code.as_str()),
            (RETURN_CODE, self.return_code.as_str()),
            (RETURN_DATE, self.return_date.as_str()),
            (AMOUNT, self.amount.as_str()),
            (CURRENCY, self.currency.as_str()),
            (ORIGINATING_BANK, self.originating_bank.as_str()),
            (ORIGINATING_BRANCH, self.originating_branch.as_str()),
            (ORIGINATING_ACCOUNT, self.originating_account.as_str()),
            (ORIGINATING_NAME, self.originating_name.as_str()),
            (PARTICULARS, self.particulars.as_str()),
            (REFERENCE, self.reference.as_str()),
            (VALUE_DATE, self.value_date.as_str()),
            (SECURITY_CHECK, self.security_check.as_str()),
            (RESERVED, self.reserved.as_str()),
        ])
    }

    /// Bank/branch pair a branch header is matched against
    pub fn branch_key(&self, direction: Direction) -> (&str, &str) {
        match direction {
            Direction::Outward => (self.originating_bank.as_str(), self.originating_branch.as_str()),
            Direction::Inward => (self.destination_bank.as_str(), self.destination_branch.as_str()),
        }
    }
}
