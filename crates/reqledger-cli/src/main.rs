//! reqledger - warehouse requisition ledger CLI
//!
//! Operator client over the ledger core: submit requisitions, list the
//! current snapshot, update status/assignee/issue, and inspect backups.
//! Every invocation is an independent OS process, so concurrent invocations
//! also exercise the ledger's cross-process locking.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reqledger_core::{
    LedgerConfig, NewRequisition, Reason, RequisitionService, SnapshotFilter, Status,
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// reqledger - warehouse requisition ledger
#[derive(Parser, Debug)]
#[command(name = "reqledger")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a TOML configuration file; defaults to paths under
    /// $REQLEDGER_HOME (or ~/.reqledger)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Submit a new requisition
    Create {
        /// Production room the request comes from
        #[arg(long)]
        room: String,

        /// Work order the material is for
        #[arg(long)]
        work_order: String,

        /// Part number requested
        #[arg(long)]
        part_number: String,

        /// Lot number, if known
        #[arg(long, default_value = "")]
        lot_number: String,

        /// Quantity, at least 1
        #[arg(long)]
        quantity: u32,

        /// Reason (process|extra|scrap|blades|tooling)
        #[arg(long)]
        reason: String,

        /// Dedup token; resubmitting with the same token is a no-op.
        /// Generated when omitted
        #[arg(long)]
        token: Option<String>,
    },

    /// List requisitions with elapsed minutes and traffic light
    #[command(alias = "ls")]
    List {
        /// Bypass the read cache
        #[arg(long)]
        force: bool,

        /// Keep only these rooms
        #[arg(long)]
        room: Vec<String>,

        /// Keep only these statuses
        /// (pending|in-progress|delivered|cancelled|not-found)
        #[arg(long)]
        status: Vec<String>,

        /// Free-text search over work order, part number, lot, reason
        #[arg(long)]
        search: Option<String>,
    },

    /// Update status, assignee, or issue flag of a requisition
    Update {
        /// Requisition id, e.g. REQ-00042
        id: String,

        /// New status (pending|in-progress|delivered|cancelled|not-found)
        #[arg(long)]
        status: String,

        /// Warehouse actor claiming the record
        #[arg(long)]
        assignee: Option<String>,

        /// Raise or clear the issue flag
        #[arg(long)]
        issue: Option<bool>,
    },

    /// List ledger backups, newest first
    Backups,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level)
        .with_context(|| format!("invalid log level `{}`", cli.log_level))?;
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match &cli.config {
        Some(path) => LedgerConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => LedgerConfig::from_default_home().context("resolving default ledger home")?,
    };
    let service = RequisitionService::new(&config);

    match cli.command {
        Commands::Create {
            room,
            work_order,
            part_number,
            lot_number,
            quantity,
            reason,
            token,
        } => {
            let reason: Reason = reason.parse().map_err(anyhow::Error::msg)?;
            let token = token.unwrap_or_else(generate_token);
            let candidate = NewRequisition {
                room,
                work_order,
                part_number,
                lot_number,
                quantity,
                reason,
            };
            let (record, inserted) = service
                .create(&candidate, &token)
                .context("creating requisition")?;
            if inserted {
                println!("{} created (token {token})", record.id);
            } else {
                println!("{} already stored for this token; nothing written", record.id);
            }
        },

        Commands::List {
            force,
            room,
            status,
            search,
        } => {
            let statuses = status
                .iter()
                .map(|s| s.parse::<Status>().map_err(anyhow::Error::msg))
                .collect::<Result<Vec<_>>>()?;
            let snapshot = service.get_all(force).context("loading snapshot")?;
            for warning in &snapshot.warnings {
                eprintln!("warning: {warning}");
            }

            let filter = SnapshotFilter {
                rooms: room,
                statuses,
                search,
            };
            let rows = snapshot.filter(&filter);
            if rows.is_empty() {
                println!("no requisitions");
            }
            for row in &rows {
                let record = &row.record;
                println!(
                    "{:<10} {:<12} {:>5}m  {:<5} {:<12} {:<14} {:<14} qty {:<4} {:<8} {}{}",
                    record.id,
                    record.status.to_string(),
                    row.elapsed_minutes,
                    row.light.to_string(),
                    record.room,
                    record.work_order,
                    record.part_number,
                    record.quantity,
                    record.reason.to_string(),
                    record.assignee,
                    if record.issue { "  [issue]" } else { "" },
                );
            }

            let aggregates = &snapshot.aggregates;
            let by_status = aggregates
                .by_status
                .iter()
                .map(|(status, count)| format!("{status}: {count}"))
                .collect::<Vec<_>>()
                .join(", ");
            println!(
                "{} shown of {} total ({by_status}; {} with issues)",
                rows.len(),
                aggregates.total,
                aggregates.open_issues,
            );
        },

        Commands::Update {
            id,
            status,
            assignee,
            issue,
        } => {
            let status: Status = status.parse().map_err(anyhow::Error::msg)?;
            let record = service
                .update_status(&id, status, assignee, issue)
                .with_context(|| format!("updating {id}"))?;
            match record.frozen_elapsed_minutes {
                Some(minutes) => println!(
                    "{} -> {} (elapsed frozen at {minutes}m)",
                    record.id, record.status
                ),
                None => println!("{} -> {}", record.id, record.status),
            }
        },

        Commands::Backups => {
            let backups = service.store().backups().list().context("listing backups")?;
            if backups.is_empty() {
                println!("no backups");
            }
            for backup in backups {
                println!("{}", backup.path.display());
            }
        },
    }

    Ok(())
}

/// Dedup token for callers that did not bring one: wall-clock micros plus
/// process-local entropy. Uniqueness per submission attempt is all that is
/// required; retries of the *same* attempt must reuse the printed token.
fn generate_token() -> String {
    let micros = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|value| value.as_micros())
        .unwrap_or_default();
    format!("tok-{micros}-{:08x}", rand::random::<u32>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_distinct() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert!(a.starts_with("tok-"));
    }

    #[test]
    fn cli_parses_create_invocation() {
        let cli = Cli::try_parse_from([
            "reqledger",
            "create",
            "--room",
            "INTRODUCER",
            "--work-order",
            "WO-1042",
            "--part-number",
            "PN-7780",
            "--quantity",
            "3",
            "--reason",
            "process",
        ])
        .expect("parse");
        match cli.command {
            Commands::Create {
                room,
                quantity,
                token,
                ..
            } => {
                assert_eq!(room, "INTRODUCER");
                assert_eq!(quantity, 3);
                assert!(token.is_none());
            },
            other => panic!("expected Create, got {other:?}"),
        }
    }

    #[test]
    fn cli_parses_list_filters() {
        let cli = Cli::try_parse_from([
            "reqledger",
            "ls",
            "--force",
            "--status",
            "pending",
            "--status",
            "in-progress",
            "--search",
            "PN-77",
        ])
        .expect("parse");
        match cli.command {
            Commands::List {
                force,
                status,
                search,
                ..
            } => {
                assert!(force);
                assert_eq!(status, vec!["pending", "in-progress"]);
                assert_eq!(search.as_deref(), Some("PN-77"));
            },
            other => panic!("expected List, got {other:?}"),
        }
    }
}
