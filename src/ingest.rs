// 📥 Ingestion - clearing file → segmented groups → store
//
// A fresh ingestion replaces every row previously stored for its direction.
// Outward transactions whose destination account is not numeric are kept out
// of the store and handed back for operator review.

use anyhow::{bail, Context, Result};
use rusqlite::Connection;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::codes::CodeTable;
use crate::db::{self, Event};
use crate::parser::{segment, FileHeaderGroup};
use crate::record::{Direction, TransactionRecord};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub source_file: String,
    pub bank_code: String,
    pub branch_code: String,
    pub destination_account: String,
    pub amount: String,
    pub reference: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestSummary {
    pub source_file: String,
    pub fingerprint: String,
    pub direction: Option<Direction>,
    /// Bank of the first file group; the CLI defaults to it afterwards
    pub bank_code: Option<String>,
    pub groups: usize,
    pub branches: usize,
    pub transactions_inserted: usize,
    pub rejections: Vec<Rejection>,
}

impl IngestSummary {
    pub fn summary(&self) -> String {
        format!(
            "{}: {} group(s), {} branch(es), {} transaction(s) inserted, {} rejected",
            self.source_file,
            self.groups,
            self.branches,
            self.transactions_inserted,
            self.rejections.len()
        )
    }
}

/// SHA-256 of the raw file content, hex encoded
pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn is_numeric_account(account: &str) -> bool {
    let account = account.trim();
    !account.is_empty() && account.chars().all(|c| c.is_ascii_digit())
}

pub fn ingest_file(conn: &mut Connection, path: &Path, codes: &CodeTable) -> Result<IngestSummary> {
    let bytes = fs::read(path)
        .with_context(|| format!("Failed to read clearing file: {}", path.display()))?;
    let source = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();

    ingest_bytes(conn, &bytes, &source, codes)
}

pub fn ingest_bytes(
    conn: &mut Connection,
    bytes: &[u8],
    source: &str,
    codes: &CodeTable,
) -> Result<IngestSummary> {
    let fingerprint = fingerprint(bytes);
    let groups = segment(bytes, source, codes);

    let mut summary = IngestSummary {
        source_file: source.to_string(),
        fingerprint,
        direction: None,
        bank_code: None,
        groups: groups.len(),
        branches: 0,
        transactions_inserted: 0,
        rejections: Vec::new(),
    };

    if groups.is_empty() {
        warn!(source, "no file header found, nothing to ingest");
        return Ok(summary);
    }

    let direction = group_direction(&groups)?;
    summary.direction = Some(direction);
    summary.bank_code = Some(groups[0].header.bank_code.trim().to_string());

    let tx = conn.transaction()?;
    let cleared = db::clear_direction(&tx, direction)?;
    if cleared > 0 {
        info!(%direction, rows = cleared, "cleared previous ingestion");
    }

    for group in &groups {
        db::insert_file_header(&tx, direction, &group.header, source)?;

        for branch in &group.branches {
            db::insert_branch_header(&tx, direction, &branch.header, source)?;
            summary.branches += 1;

            for record in &branch.transactions {
                let rejection = validate(
                    record,
                    direction,
                    &branch.header.bank_code,
                    &branch.header.branch_code,
                    source,
                );
                if let Some(rejection) = rejection {
                    warn!(
                        branch = %rejection.branch_code,
                        account = %rejection.destination_account,
                        "rejected transaction: {}",
                        rejection.reason
                    );
                    summary.rejections.push(rejection);
                    continue;
                }

                let (bank, branch_code) = record.branch_key(direction);
                if bank.trim() != branch.header.bank_code.trim()
                    || branch_code.trim() != branch.header.branch_code.trim()
                {
                    warn!(
                        header = %branch.header.branch_code,
                        bank = bank.trim(),
                        branch = branch_code.trim(),
                        "transaction does not belong to its branch header"
                    );
                }

                db::insert_transaction(&tx, direction, record, source)?;
                summary.transactions_inserted += 1;
            }
        }
    }

    db::insert_event(
        &tx,
        &Event::new(
            "file_ingested",
            "file",
            source,
            serde_json::json!({
                "fingerprint": summary.fingerprint,
                "direction": direction.as_str(),
                "branches": summary.branches,
                "transactions": summary.transactions_inserted,
                "rejected": summary.rejections.len(),
            }),
            "ingestor",
        ),
    )?;

    tx.commit()?;
    info!("{}", summary.summary());

    Ok(summary)
}

/// Every group in one file must agree on a recognised direction
fn group_direction(groups: &[FileHeaderGroup]) -> Result<Direction> {
    let mut direction = None;

    for group in groups {
        let Some(found) = group.direction() else {
            bail!(
                "Unrecognised direction field '{}' in file header at offset {}",
                group.header.field_id,
                group.offset
            );
        };

        match direction {
            None => direction = Some(found),
            Some(d) if d != found => bail!(
                "Mixed directions in one file: {} and {} (offset {})",
                d,
                found,
                group.offset
            ),
            Some(_) => {}
        }
    }

    direction.context("No file header groups")
}

fn validate(
    record: &TransactionRecord,
    direction: Direction,
    bank_code: &str,
    branch_code: &str,
    source: &str,
) -> Option<Rejection> {
    if direction != Direction::Outward || is_numeric_account(&record.destination_account) {
        return None;
    }

    Some(Rejection {
        source_file: source.to_string(),
        bank_code: bank_code.trim().to_string(),
        branch_code: branch_code.trim().to_string(),
        destination_account: record.destination_account.trim().to_string(),
        amount: record.amount.clone(),
        reference: record.reference.trim().to_string(),
        reason: "non-numeric destination account".to_string(),
    })
}

/// Write rejected transactions to CSV for operator review
pub fn write_rejections_csv(path: &Path, rejections: &[Rejection]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create rejections file: {}", path.display()))?;

    for rejection in rejections {
        writer.serialize(rejection)?;
    }
    writer.flush()?;

    Ok(())
}
