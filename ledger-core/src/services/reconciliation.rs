//! Reconciliation service - operator tooling for the transaction log
//!
//! Replays records surfaced by `AuditWriteFailed`, settles pending records
//! and runs consistency checks across accounts and history.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{StatusChange, Transaction, TransactionStatus};
use crate::ports::{AccountStore, TransactionLog};

/// What `replay` did with a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayOutcome {
    Recorded,
    AlreadyRecorded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Warning,
    Error,
}

#[derive(Debug, Serialize)]
pub struct CheckResult {
    pub status: CheckStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<serde_json::Value>>,
}

impl CheckResult {
    fn pass(message: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Pass,
            message: message.into(),
            details: None,
        }
    }

    fn flagged(status: CheckStatus, message: String, details: Vec<serde_json::Value>) -> Self {
        Self {
            status,
            message,
            details: Some(details),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReconciliationReport {
    pub checks: BTreeMap<String, CheckResult>,
    pub summary: ReportSummary,
}

#[derive(Debug, Serialize)]
pub struct ReportSummary {
    pub passed: usize,
    pub warnings: usize,
    pub errors: usize,
}

impl ReconciliationReport {
    pub fn is_healthy(&self) -> bool {
        self.summary.errors == 0
    }
}

pub struct ReconciliationService {
    accounts: Arc<dyn AccountStore>,
    log: Arc<dyn TransactionLog>,
}

impl ReconciliationService {
    pub fn new(accounts: Arc<dyn AccountStore>, log: Arc<dyn TransactionLog>) -> Self {
        Self { accounts, log }
    }

    /// Write a record whose balance mutation already committed.
    ///
    /// Never touches balances. Replaying the same record twice is a no-op;
    /// a different record under an existing id is `DuplicateTransaction`.
    pub async fn replay(&self, record: &Transaction) -> Result<ReplayOutcome> {
        record.validate()?;
        if let Some(existing) = self.log.get_transaction(record.id).await? {
            return if same_delta(&existing, record) {
                Ok(ReplayOutcome::AlreadyRecorded)
            } else {
                Err(Error::DuplicateTransaction(record.id))
            };
        }
        match self.log.append(record).await {
            Ok(_) => Ok(ReplayOutcome::Recorded),
            // Lost a race with another replay of the same record
            Err(Error::DuplicateTransaction(_)) => Ok(ReplayOutcome::AlreadyRecorded),
            Err(e) => Err(e),
        }
    }

    /// Settle a pending record; re-applying the current status is a no-op
    pub async fn resolve(&self, id: Uuid, status: TransactionStatus) -> Result<StatusChange> {
        self.log.update_status(id, status).await
    }

    /// Consistency checks across accounts and history
    pub async fn check(&self) -> Result<ReconciliationReport> {
        let accounts = self.accounts.list_accounts().await?;
        let transactions = self.log.list_all().await?;
        let mut checks = BTreeMap::new();

        let negative: Vec<serde_json::Value> = accounts
            .iter()
            .filter(|a| a.balance < Decimal::ZERO)
            .map(|a| json!({ "account_id": a.id }))
            .collect();
        checks.insert(
            "negative_balances".to_string(),
            if negative.is_empty() {
                CheckResult::pass("No account is overdrawn")
            } else {
                CheckResult::flagged(
                    CheckStatus::Error,
                    format!("{} account(s) have a negative balance", negative.len()),
                    negative,
                )
            },
        );

        let malformed: Vec<serde_json::Value> = transactions
            .iter()
            .filter(|t| t.validate().is_err())
            .map(|t| json!({ "transaction_id": t.id }))
            .collect();
        checks.insert(
            "malformed_transactions".to_string(),
            if malformed.is_empty() {
                CheckResult::pass("All transactions have a positive amount and two distinct accounts")
            } else {
                CheckResult::flagged(
                    CheckStatus::Error,
                    format!("{} transaction(s) break record invariants", malformed.len()),
                    malformed,
                )
            },
        );

        let pending: Vec<serde_json::Value> = transactions
            .iter()
            .filter(|t| t.status == TransactionStatus::Pending)
            .map(|t| json!({ "transaction_id": t.id, "created_at": t.created_at_key() }))
            .collect();
        checks.insert(
            "pending_transactions".to_string(),
            if pending.is_empty() {
                CheckResult::pass("No pending transactions")
            } else {
                CheckResult::flagged(
                    CheckStatus::Warning,
                    format!("{} transaction(s) are waiting to be resolved", pending.len()),
                    pending,
                )
            },
        );

        let known: HashSet<Uuid> = accounts.iter().map(|a| a.id).collect();
        let orphaned: Vec<serde_json::Value> = transactions
            .iter()
            .filter(|t| !known.contains(&t.from_account_id) || !known.contains(&t.to_account_id))
            .map(|t| json!({ "transaction_id": t.id }))
            .collect();
        checks.insert(
            "orphaned_transactions".to_string(),
            if orphaned.is_empty() {
                CheckResult::pass("Every transaction references existing accounts")
            } else {
                CheckResult::flagged(
                    CheckStatus::Warning,
                    format!("{} transaction(s) reference closed or missing accounts", orphaned.len()),
                    orphaned,
                )
            },
        );

        let count = |status: CheckStatus| checks.values().filter(|c| c.status == status).count();
        let summary = ReportSummary {
            passed: count(CheckStatus::Pass),
            warnings: count(CheckStatus::Warning),
            errors: count(CheckStatus::Error),
        };

        Ok(ReconciliationReport { checks, summary })
    }
}

/// Same committed movement, ignoring status and timestamp precision
fn same_delta(a: &Transaction, b: &Transaction) -> bool {
    a.id == b.id
        && a.from_account_id == b.from_account_id
        && a.to_account_id == b.to_account_id
        && a.amount == b.amount
}
