//! Transaction domain model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::result::{Error, Result};

/// Lifecycle state of a transfer record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
}

/// Outcome of a status transition request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusChange {
    Applied,
    Unchanged,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    /// `success` and `failed` can never change once set
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Decide whether moving from `self` to `next` is allowed.
    ///
    /// Re-applying the current status is a no-op. A terminal status only
    /// accepts itself.
    pub fn transition_to(self, next: TransactionStatus) -> Result<StatusChange> {
        if self == next {
            return Ok(StatusChange::Unchanged);
        }
        if self.is_terminal() || next == Self::Pending {
            return Err(Error::InvalidStatusTransition { from: self, to: next });
        }
        Ok(StatusChange::Applied)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            other => Err(Error::validation(format!("unknown transaction status '{}'", other))),
        }
    }
}

/// A record of funds moving from one account to another
///
/// A transaction references both accounts by id only; it is shared history,
/// not owned by either side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub from_account_id: Uuid,
    pub to_account_id: Uuid,
    pub amount: Decimal,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Create a new transaction record with a fresh id
    pub fn new(
        from_account_id: Uuid,
        to_account_id: Uuid,
        amount: Decimal,
        status: TransactionStatus,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            from_account_id,
            to_account_id,
            amount,
            status,
            created_at: Utc::now(),
        }
    }

    /// Record for a transfer whose balance mutation has committed
    pub fn completed(from_account_id: Uuid, to_account_id: Uuid, amount: Decimal) -> Self {
        Self::new(from_account_id, to_account_id, amount, TransactionStatus::Success)
    }

    /// Whether this record involves the account on either side
    pub fn involves(&self, account_id: Uuid) -> bool {
        self.from_account_id == account_id || self.to_account_id == account_id
    }

    /// Timestamp in the fixed-width form used for storage, so that lexical
    /// order equals chronological order
    pub fn created_at_key(&self) -> String {
        timestamp_key(&self.created_at)
    }

    /// Validate record invariants
    pub fn validate(&self) -> Result<()> {
        if self.amount <= Decimal::ZERO {
            return Err(Error::invalid_amount("amount must be positive"));
        }
        if self.from_account_id == self.to_account_id {
            return Err(Error::SelfTransfer);
        }
        Ok(())
    }
}

/// Format a timestamp as fixed-width RFC 3339 with microseconds in UTC
pub fn timestamp_key(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}
