use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::record::{BranchHeaderRecord, Direction, FileHeaderRecord, TransactionRecord};
use crate::totals::{BranchTotals, TransactionRow};

// ============================================================================
// TABLE SETS
// ============================================================================

/// Each direction has its own three tables; rows are never mixed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tables {
    pub file_header: &'static str,
    pub branch_header: &'static str,
    pub transaction: &'static str,
}

impl Tables {
    pub fn for_direction(direction: Direction) -> Self {
        match direction {
            Direction::Inward => Tables {
                file_header: "IW_FILE_HEADER",
                branch_header: "IW_BRANCH_HEADER",
                transaction: "IW_TRANSACTION",
            },
            Direction::Outward => Tables {
                file_header: "OW_FILE_HEADER",
                branch_header: "OW_BRANCH_HEADER",
                transaction: "OW_TRANSACTION",
            },
        }
    }
}

/// Transaction columns that tie a row to a branch header.
/// Outward files are scoped by the sending branch, inward by the receiving one.
pub fn branch_columns(direction: Direction) -> (&'static str, &'static str) {
    match direction {
        Direction::Outward => ("originating_bank", "originating_branch"),
        Direction::Inward => ("destination_bank", "destination_branch"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BranchStatus {
    Pending,
    Reconciled,
}

impl BranchStatus {
    pub fn as_i64(&self) -> i64 {
        match self {
            BranchStatus::Pending => 0,
            BranchStatus::Reconciled => 1,
        }
    }

    pub fn from_i64(value: i64) -> Self {
        if value == 1 {
            BranchStatus::Reconciled
        } else {
            BranchStatus::Pending
        }
    }
}

/// Branch header as stored, with reconciliation status and totals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchHeaderRow {
    pub id: i64,
    pub control_id: String,
    pub field_id: String,
    pub date: String,
    pub bank_code: String,
    pub branch_code: String,
    pub totals: BranchTotals,
    pub status: BranchStatus,
    pub source_file: String,
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    for direction in [Direction::Inward, Direction::Outward] {
        let tables = Tables::for_direction(direction);

        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {file_header} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                control_id TEXT NOT NULL,
                field_id TEXT NOT NULL,
                date TEXT NOT NULL,
                bank_code TEXT NOT NULL,
                batch_count TEXT NOT NULL,
                transaction_count TEXT NOT NULL,
                source_file TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS {branch_header} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                control_id TEXT NOT NULL,
                field_id TEXT NOT NULL,
                date TEXT NOT NULL,
                bank_code TEXT NOT NULL,
                branch_code TEXT NOT NULL,
                credit_total INTEGER NOT NULL DEFAULT 0,
                credit_count INTEGER NOT NULL DEFAULT 0,
                debit_total INTEGER NOT NULL DEFAULT 0,
                debit_count INTEGER NOT NULL DEFAULT 0,
                hash_total INTEGER NOT NULL DEFAULT 0,
                status INTEGER NOT NULL DEFAULT 0,
                source_file TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS {transaction} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                transaction_id TEXT NOT NULL,
                destination_bank TEXT NOT NULL,
                destination_branch TEXT NOT NULL,
                destination_account TEXT NOT NULL,
                destination_name TEXT NOT NULL,
                transaction_code TEXT NOT NULL,
                return_code TEXT NOT NULL,
                return_date TEXT NOT NULL,
                amount TEXT NOT NULL,
                currency TEXT NOT NULL,
                originating_bank TEXT NOT NULL,
                originating_branch TEXT NOT NULL,
                originating_account TEXT NOT NULL,
                originating_name TEXT NOT NULL,
                particulars TEXT NOT NULL,
                reference TEXT NOT NULL,
                value_date TEXT NOT NULL,
                security_check TEXT NOT NULL,
                source_file TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_{branch_header}_bank
                ON {branch_header}(bank_code, status);
            CREATE INDEX IF NOT EXISTS idx_{transaction}_orig
                ON {transaction}(originating_bank, originating_branch);
            CREATE INDEX IF NOT EXISTS idx_{transaction}_dest
                ON {transaction}(destination_bank, destination_branch);",
            file_header = tables.file_header,
            branch_header = tables.branch_header,
            transaction = tables.transaction,
        ))?;
    }

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// INGESTION WRITES
// ============================================================================

/// Remove every row of one direction ahead of a fresh ingestion
pub fn clear_direction(conn: &Connection, direction: Direction) -> rusqlite::Result<usize> {
    let tables = Tables::for_direction(direction);
    let mut removed = 0;

    for table in [tables.transaction, tables.branch_header, tables.file_header] {
        removed += conn.execute(&format!("DELETE FROM {}", table), [])?;
    }

    Ok(removed)
}

pub fn insert_file_header(
    conn: &Connection,
    direction: Direction,
    header: &FileHeaderRecord,
    source_file: &str,
) -> rusqlite::Result<i64> {
    let tables = Tables::for_direction(direction);
    conn.execute(
        &format!(
            "INSERT INTO {} (
                control_id, field_id, date, bank_code, batch_count, transaction_count, source_file
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            tables.file_header
        ),
        params![
            header.control_id,
            header.field_id,
            header.date,
            header.bank_code.trim(),
            header.batch_count,
            header.transaction_count,
            source_file,
        ],
    )?;

    Ok(conn.last_insert_rowid())
}

/// New branch headers always start Pending with zero totals
pub fn insert_branch_header(
    conn: &Connection,
    direction: Direction,
    header: &BranchHeaderRecord,
    source_file: &str,
) -> rusqlite::Result<i64> {
    let tables = Tables::for_direction(direction);
    conn.execute(
        &format!(
            "INSERT INTO {} (
                control_id, field_id, date, bank_code, branch_code, status, source_file
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            tables.branch_header
        ),
        params![
            header.control_id,
            header.field_id,
            header.date,
            header.bank_code.trim(),
            header.branch_code.trim(),
            BranchStatus::Pending.as_i64(),
            source_file,
        ],
    )?;

    Ok(conn.last_insert_rowid())
}

pub fn insert_transaction(
    conn: &Connection,
    direction: Direction,
    tx: &TransactionRecord,
    source_file: &str,
) -> rusqlite::Result<()> {
    let tables = Tables::for_direction(direction);
    conn.execute(
        &format!(
            "INSERT INTO {} (
                transaction_id, destination_bank, destination_branch, destination_account,
                destination_name, transaction_code, return_code, return_date, amount, currency,
                originating_bank, originating_branch, originating_account, originating_name,
                particulars, reference, value_date, security_check, source_file
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
            tables.transaction
        ),
        params![
            tx.transaction_id,
            tx.destination_bank.trim(),
            tx.destination_branch.trim(),
            tx.destination_account,
            tx.destination_name,
            tx.transaction_code.trim(),
            tx.return_code,
            tx.return_date,
            tx.amount,
            tx.currency,
            tx.originating_bank.trim(),
            tx.originating_branch.trim(),
            tx.originating_account,
            tx.originating_name,
            tx.particulars,
            tx.reference,
            tx.value_date,
            tx.security_check,
            source_file,
        ],
    )?;

    Ok(())
}

// ============================================================================
// RECONCILIATION READS / UPDATES
// ============================================================================

/// Branch headers for one bank, ascending by id; `status` narrows the set
pub fn list_branches(
    conn: &Connection,
    direction: Direction,
    bank_code: &str,
    status: Option<BranchStatus>,
) -> rusqlite::Result<Vec<BranchHeaderRow>> {
    let tables = Tables::for_direction(direction);
    let mut stmt = conn.prepare(&format!(
        "SELECT id, control_id, field_id, date, bank_code, branch_code,
                credit_total, credit_count, debit_total, debit_count, hash_total,
                status, source_file
         FROM {}
         WHERE bank_code = ?1 AND (?2 IS NULL OR status = ?2)
         ORDER BY id ASC",
        tables.branch_header
    ))?;

    let rows = stmt
        .query_map(params![bank_code, status.map(|s| s.as_i64())], |row| {
            Ok(BranchHeaderRow {
                id: row.get(0)?,
                control_id: row.get(1)?,
                field_id: row.get(2)?,
                date: row.get(3)?,
                bank_code: row.get(4)?,
                branch_code: row.get(5)?,
                totals: BranchTotals {
                    credit_total: row.get(6)?,
                    credit_count: row.get(7)?,
                    debit_total: row.get(8)?,
                    debit_count: row.get(9)?,
                    hash_total: row.get(10)?,
                },
                status: BranchStatus::from_i64(row.get(11)?),
                source_file: row.get(12)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

pub fn get_branch(
    conn: &Connection,
    direction: Direction,
    bank_code: &str,
    branch_code: &str,
) -> rusqlite::Result<Option<BranchHeaderRow>> {
    Ok(list_branches(conn, direction, bank_code, None)?
        .into_iter()
        .find(|b| b.branch_code == branch_code))
}

/// Rows for one branch, in insertion order
pub fn fetch_branch_rows(
    conn: &Connection,
    direction: Direction,
    bank_code: &str,
    branch_code: &str,
) -> rusqlite::Result<Vec<TransactionRow>> {
    let tables = Tables::for_direction(direction);
    let (bank_col, branch_col) = branch_columns(direction);
    let mut stmt = conn.prepare(&format!(
        "SELECT transaction_code, amount, destination_account
         FROM {}
         WHERE {} = ?1 AND {} = ?2
         ORDER BY id ASC",
        tables.transaction, bank_col, branch_col
    ))?;

    let rows = stmt
        .query_map(params![bank_code, branch_code], |row| {
            Ok(TransactionRow {
                code: row.get(0)?,
                amount: row.get(1)?,
                destination_account: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Totals and the status flip land in one statement
pub fn mark_reconciled(
    conn: &Connection,
    direction: Direction,
    branch_id: i64,
    totals: &BranchTotals,
) -> rusqlite::Result<usize> {
    let tables = Tables::for_direction(direction);
    conn.execute(
        &format!(
            "UPDATE {}
             SET credit_total = ?1, credit_count = ?2, debit_total = ?3,
                 debit_count = ?4, hash_total = ?5, status = ?6
             WHERE id = ?7",
            tables.branch_header
        ),
        params![
            totals.credit_total,
            totals.credit_count,
            totals.debit_total,
            totals.debit_count,
            totals.hash_total,
            BranchStatus::Reconciled.as_i64(),
            branch_id,
        ],
    )
}

/// Rewrite one code to another for a bank's rows. Exact match only, so codes
/// that merely share a prefix are left alone. Returns rows touched.
pub fn remap_code(
    conn: &Connection,
    direction: Direction,
    bank_code: &str,
    old_code: &str,
    new_code: &str,
) -> rusqlite::Result<usize> {
    let tables = Tables::for_direction(direction);
    let (bank_col, _) = branch_columns(direction);
    conn.execute(
        &format!(
            "UPDATE {} SET transaction_code = ?1 WHERE transaction_code = ?2 AND {} = ?3",
            tables.transaction, bank_col
        ),
        params![new_code, old_code, bank_code],
    )
}

pub fn count_transactions(conn: &Connection, direction: Direction) -> rusqlite::Result<i64> {
    let tables = Tables::for_direction(direction);
    conn.query_row(
        &format!("SELECT COUNT(*) FROM {}", tables.transaction),
        [],
        |row| row.get(0),
    )
}

/// Bank code of the most recently ingested file for a direction.
///
/// Ingestion clears the direction first, so every stored file header belongs
/// to that file; its first group decides, as in `IngestSummary::bank_code`.
pub fn latest_bank_code(conn: &Connection, direction: Direction) -> rusqlite::Result<Option<String>> {
    let tables = Tables::for_direction(direction);
    conn.query_row(
        &format!(
            "SELECT bank_code FROM {} ORDER BY id ASC LIMIT 1",
            tables.file_header
        ),
        [],
        |row| row.get(0),
    )
    .optional()
}

// ============================================================================
// AUDIT TRAIL
// ============================================================================

/// Event for audit trail: every remap and every reconciled branch
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            event.data.to_string(),
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity, newest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> rusqlite::Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC, id DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            1,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?
                    .with_timezone(&Utc),
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        5,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?,
                actor: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}
