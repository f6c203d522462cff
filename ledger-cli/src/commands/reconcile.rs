//! Reconcile command - repair and verify the transaction history

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use colored::Colorize;
use uuid::Uuid;

use ledger_core::services::{CheckStatus, ReplayOutcome};
use ledger_core::{LogEvent, StatusChange, Transaction, TransactionStatus};

use super::{get_context, get_logger, log_event, log_failure};
use crate::output;

#[derive(Subcommand)]
pub enum ReconcileCommands {
    /// Run consistency checks across accounts and history
    Check {
        /// Show the records behind each finding
        #[arg(long, short)]
        verbose: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Settle a pending transaction
    Resolve {
        id: Uuid,
        /// New status: success or failed
        status: TransactionStatus,
    },
    /// Write a transfer that moved funds but is missing from history
    Replay {
        /// Transaction JSON as printed by a failed transfer
        record: Option<String>,
        /// Replay every unrecorded transfer found in the event log
        #[arg(long, conflicts_with = "record")]
        from_logs: bool,
    },
}

pub async fn run(command: ReconcileCommands) -> Result<()> {
    let ctx = get_context()?;
    let logger = get_logger();

    match command {
        ReconcileCommands::Check { verbose, json } => {
            let report = ctx.reconciliation_service.check().await?;

            if json {
                return output::json(&report);
            }

            println!("{}", "Reconciliation".bold());
            println!();
            for (name, check) in &report.checks {
                let badge = match check.status {
                    CheckStatus::Pass => "PASS".green(),
                    CheckStatus::Warning => "WARN".yellow(),
                    CheckStatus::Error => "FAIL".red(),
                };
                println!("  [{}] {}: {}", badge, name, check.message);
                if verbose {
                    for detail in check.details.iter().flatten() {
                        println!("         {}", detail.to_string().dimmed());
                    }
                }
            }
            println!();
            println!(
                "  {} passed, {} warnings, {} errors",
                report.summary.passed, report.summary.warnings, report.summary.errors
            );

            if !report.is_healthy() {
                bail!("Ledger is inconsistent");
            }
        }
        ReconcileCommands::Resolve { id, status } => {
            let change = ctx
                .reconciliation_service
                .resolve(id, status)
                .await
                .map_err(|e| log_failure(&logger, "resolve_failed", "reconcile resolve", e))?;
            match change {
                StatusChange::Applied => {
                    log_event(
                        &logger,
                        LogEvent::new("transaction_resolved")
                            .with_command("reconcile resolve")
                            .with_transaction(id),
                    );
                    output::success(&format!("Transaction {} is now {}", id, status));
                }
                StatusChange::Unchanged => output::info(&format!("Transaction {} is already {}", id, status)),
            }
        }
        ReconcileCommands::Replay { record, from_logs } => {
            let records = if from_logs {
                unrecorded_from_logs(&logger)?
            } else {
                let Some(record) = record else {
                    bail!("Pass a transaction JSON record or --from-logs");
                };
                vec![serde_json::from_str::<Transaction>(&record).context("Invalid transaction record")?]
            };

            if records.is_empty() {
                output::info("Nothing to replay.");
                return Ok(());
            }

            for record in &records {
                let outcome = ctx
                    .reconciliation_service
                    .replay(record)
                    .await
                    .map_err(|e| log_failure(&logger, "replay_failed", "reconcile replay", e))?;
                match outcome {
                    ReplayOutcome::Recorded => {
                        log_event(
                            &logger,
                            LogEvent::new("transaction_replayed")
                                .with_command("reconcile replay")
                                .with_transaction(record.id),
                        );
                        output::success(&format!("Recorded {}", record.id));
                    }
                    ReplayOutcome::AlreadyRecorded => println!("Already recorded {}", record.id),
                }
            }
        }
    }

    Ok(())
}

/// Records carried by `transfer_audit_failed` events
fn unrecorded_from_logs(logger: &Option<ledger_core::LoggingService>) -> Result<Vec<Transaction>> {
    let Some(logger) = logger else {
        bail!("Event log is unavailable");
    };
    let mut records = Vec::new();
    for entry in logger.get_audit_failures(1000)? {
        let Some(payload) = entry.error_details else {
            continue;
        };
        match serde_json::from_str::<Transaction>(&payload) {
            Ok(record) => records.push(record),
            Err(e) => output::warning(&format!("Skipping log entry {}: {}", entry.id, e)),
        }
    }
    Ok(records)
}
