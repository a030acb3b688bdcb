use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use std::path::PathBuf;
use tracing::{error, info};

use clearing_reconcile::{
    audit_branches, db, ingest_file, outstanding_branches, setup_database, write_rejections_csv,
    AutoApprove, Confirm, ConsoleConfirm, Direction, ReconciliationCoordinator, Settings,
};

/// Fixed-width clearing file ingestion and branch reconciliation
#[derive(Parser, Debug)]
#[command(name = "clearing-reconcile")]
#[command(version, about)]
struct Cli {
    /// Settings file (JSON); defaults apply when it does not exist
    #[arg(long, default_value = "settings.json")]
    settings: PathBuf,

    /// Override the database path from settings
    #[arg(long)]
    db: Option<PathBuf>,

    /// Override the config directory holding the code tables
    #[arg(long)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the clearing tables
    InitDb,

    /// Load a clearing file, replacing earlier rows of the same direction
    Ingest {
        file: PathBuf,

        /// Write rejected transactions to this CSV file
        #[arg(long)]
        rejections: Option<PathBuf>,
    },

    /// Check branches for missing or zero-amount transactions
    Audit {
        /// Bank code; defaults to the bank of the last ingested file
        bank: Option<String>,

        #[arg(long, short)]
        direction: Direction,
    },

    /// Reconcile all pending branches of a bank
    Reconcile {
        /// Bank code; defaults to the bank of the last ingested file
        bank: Option<String>,

        #[arg(long, short)]
        direction: Direction,

        /// Approve code remaps and audit warnings without asking
        #[arg(long)]
        yes: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(e) = run() {
        error!("{e:#}");
        eprintln!("❌ {e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load_or_default(&cli.settings)?;
    if let Some(db) = cli.db {
        settings.db_path = db;
    }
    if let Some(dir) = cli.config_dir {
        settings.config_dir = dir;
    }
    info!(db = %settings.db_path.display(), config = %settings.config_dir.display(), "settings loaded");

    match cli.command {
        Command::InitDb => run_init_db(&settings),
        Command::Ingest { file, rejections } => run_ingest(&settings, file, rejections),
        Command::Audit { bank, direction } => run_audit(&settings, bank, direction),
        Command::Reconcile {
            bank,
            direction,
            yes,
        } => run_reconcile(&settings, bank, direction, yes),
    }
}

fn open_database(settings: &Settings) -> Result<Connection> {
    Connection::open(&settings.db_path)
        .with_context(|| format!("Failed to open database: {}", settings.db_path.display()))
}

fn resolve_bank(conn: &Connection, bank: Option<String>, direction: Direction) -> Result<String> {
    match bank {
        Some(bank) => Ok(bank),
        None => db::latest_bank_code(conn, direction)?
            .with_context(|| format!("No {} file ingested yet; pass a bank code", direction)),
    }
}

fn run_init_db(settings: &Settings) -> Result<()> {
    let conn = open_database(settings)?;
    setup_database(&conn)?;
    println!("✓ Database initialized at {}", settings.db_path.display());
    Ok(())
}

fn run_ingest(settings: &Settings, file: PathBuf, rejections: Option<PathBuf>) -> Result<()> {
    let codes = settings.load_code_table()?;
    let mut conn = open_database(settings)?;
    setup_database(&conn)?;

    println!("📂 Ingesting {}...", file.display());
    let summary = ingest_file(&mut conn, &file, &codes)?;
    println!("✓ {}", summary.summary());

    if !summary.rejections.is_empty() {
        println!("⚠️  {} transaction(s) need review:", summary.rejections.len());
        for r in &summary.rejections {
            println!(
                "   branch {} account '{}' amount {}: {}",
                r.branch_code, r.destination_account, r.amount, r.reason
            );
        }
        if let Some(path) = rejections {
            write_rejections_csv(&path, &summary.rejections)?;
            println!("✓ Rejections written to {}", path.display());
        }
    }

    Ok(())
}

fn run_audit(settings: &Settings, bank: Option<String>, direction: Direction) -> Result<()> {
    let conn = open_database(settings)?;
    let bank = resolve_bank(&conn, bank, direction)?;

    let report = audit_branches(&conn, &bank, direction)?;
    println!("🔍 {}", report.summary());
    for problem in &report.problems {
        println!("   ⚠️  {}", problem);
    }

    if report.passed {
        println!("✅ All branches look consistent");
    }
    Ok(())
}

fn run_reconcile(
    settings: &Settings,
    bank: Option<String>,
    direction: Direction,
    yes: bool,
) -> Result<()> {
    let codes = settings.load_code_table()?;
    let mappings = settings.load_code_mappings()?;
    let mut conn = open_database(settings)?;
    let bank = resolve_bank(&conn, bank, direction)?;

    let mut confirm: Box<dyn Confirm> = if yes || settings.auto_approve {
        Box::new(AutoApprove(true))
    } else {
        Box::new(ConsoleConfirm::new())
    };

    // Pre-flight gate
    let audit = audit_branches(&conn, &bank, direction)?;
    if !audit.passed {
        println!("🔍 {}", audit.summary());
        for problem in &audit.problems {
            println!("   ⚠️  {}", problem);
        }
        if !confirm.confirm("Audit found problems. Continue with reconciliation?") {
            bail!("Reconciliation cancelled after audit");
        }
    }

    println!("⚖️  Reconciling bank {} ({})...", bank, direction);
    let mut coordinator =
        ReconciliationCoordinator::new(settings, &codes, &mappings, confirm.as_mut());

    match coordinator.run(&mut conn, &bank, direction) {
        Ok(report) => {
            for branch in &report.branches {
                let t = &branch.totals;
                println!(
                    "   branch {}: CR {} ({}), DR {} ({}), hash {}",
                    branch.branch_code,
                    format_amount(t.credit_total),
                    t.credit_count,
                    format_amount(t.debit_total),
                    t.debit_count,
                    t.hash_total
                );
            }
            for remap in &report.remaps {
                println!(
                    "   remapped {} -> {} on {} row(s)",
                    remap.old_code, remap.new_code, remap.rows
                );
            }
            println!("✅ {}", report.summary());
            if !report.is_complete() {
                println!("⚠️  Outstanding branches: {}", report.outstanding.join(", "));
            }
            Ok(())
        }
        Err(e) => {
            let outstanding = outstanding_branches(&conn, &bank, direction)?;
            if !outstanding.is_empty() {
                let codes: Vec<&str> = outstanding.iter().map(|b| b.branch_code.as_str()).collect();
                println!("⚠️  Outstanding branches: {}", codes.join(", "));
            }
            Err(e.into())
        }
    }
}

/// Minor units → currency units for display
fn format_amount(minor: i64) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let units = minor.unsigned_abs();
    format!("{}{}.{:02}", sign, units / 100, units % 100)
}
