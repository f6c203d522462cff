//! Result and error types for the core library

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::transaction::{Transaction, TransactionStatus};

/// Core library error type
///
/// Validation variants are raised before any balance is touched, so reporting
/// them to the caller has no side effect. `AuditWriteFailed` is the only
/// variant returned after money has moved.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Cannot transfer to the same account")]
    SelfTransfer,

    #[error("Access denied to account {0}")]
    AccessDenied(Uuid),

    #[error("Account not found: {0}")]
    AccountNotFound(Uuid),

    #[error("Currency mismatch: {from} vs {to}")]
    CurrencyMismatch { from: String, to: String },

    #[error("Insufficient funds in account {account_id}")]
    InsufficientFunds { account_id: Uuid },

    /// Funds moved but the history record was not persisted. The record that
    /// should have been written is carried so it can be replayed.
    #[error("Transfer {} completed, but failed to save history: {reason}", .transaction.id)]
    AuditWriteFailed {
        transaction: Box<Transaction>,
        reason: String,
    },

    #[error("Balance of account {account_id} would exceed the supported maximum")]
    BalanceOverflow { account_id: Uuid },

    #[error("Total {currency} balance exceeds the supported range")]
    TotalOverflow { currency: String },

    #[error("Credential hashing failed: {0}")]
    Credential(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(Uuid),

    #[error("Transaction already exists: {0}")]
    DuplicateTransaction(Uuid),

    #[error("Cannot change transaction status from {from} to {to}")]
    InvalidStatusTransition {
        from: TransactionStatus,
        to: TransactionStatus,
    },

    #[error("Account {account_id} still holds {balance}")]
    AccountNotEmpty { account_id: Uuid, balance: Decimal },

    #[error("Account {0} has pending transactions")]
    AccountHasPending(Uuid),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Username already taken: {0}")]
    UsernameTaken(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::StorageUnavailable(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an invalid amount error
    pub fn invalid_amount(msg: impl Into<String>) -> Self {
        Self::InvalidAmount(msg.into())
    }

    /// Whether the whole operation may be retried.
    ///
    /// Only storage failures qualify, and only because the stores guarantee
    /// that a failed atomic unit left nothing committed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }

    /// Stable machine-readable name, used for event logging and JSON output
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidAmount(_) => "invalid_amount",
            Self::SelfTransfer => "self_transfer",
            Self::AccessDenied(_) => "access_denied",
            Self::AccountNotFound(_) => "account_not_found",
            Self::CurrencyMismatch { .. } => "currency_mismatch",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::AuditWriteFailed { .. } => "audit_write_failed",
            Self::BalanceOverflow { .. } => "balance_overflow",
            Self::TotalOverflow { .. } => "total_overflow",
            Self::Credential(_) => "credential",
            Self::StorageUnavailable(_) => "storage_unavailable",
            Self::TransactionNotFound(_) => "transaction_not_found",
            Self::DuplicateTransaction(_) => "duplicate_transaction",
            Self::InvalidStatusTransition { .. } => "invalid_status_transition",
            Self::AccountNotEmpty { .. } => "account_not_empty",
            Self::AccountHasPending(_) => "account_has_pending",
            Self::UserNotFound(_) => "user_not_found",
            Self::UsernameTaken(_) => "username_taken",
            Self::InvalidCredentials => "invalid_credentials",
            Self::Validation(_) => "validation",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
        }
    }
}

impl From<duckdb::Error> for Error {
    fn from(err: duckdb::Error) -> Self {
        Self::StorageUnavailable(err.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::StorageUnavailable(format!("Lock poisoned: {}", err))
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

/// Operation result with optional context (for JSON output)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub context: Option<HashMap<String, serde_json::Value>>,
}

impl<T> OperationResult<T> {
    /// Create a successful result
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            context: None,
        }
    }

    /// Create a failed result
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            context: None,
        }
    }

    /// Create a failed result with context
    pub fn fail_with_context(
        error: impl Into<String>,
        context: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            context: Some(context),
        }
    }
}

impl<T> From<Result<T>> for OperationResult<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => {
                let mut context = HashMap::new();
                context.insert("kind".to_string(), serde_json::Value::from(e.kind()));
                if let Error::AuditWriteFailed { transaction, .. } = &e {
                    if let Ok(record) = serde_json::to_value(transaction.as_ref()) {
                        context.insert("unrecorded_transaction".to_string(), record);
                    }
                }
                Self::fail_with_context(e.to_string(), context)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_result_ok() {
        let result: OperationResult<i32> = OperationResult::ok(42);
        assert!(result.success);
        assert_eq!(result.data, Some(42));
        assert!(result.error.is_none());
    }

    #[test]
    fn test_from_result_carries_error_kind() {
        let err: Result<i32> = Err(Error::SelfTransfer);
        let result: OperationResult<i32> = err.into();
        assert!(!result.success);
        let context = result.context.unwrap();
        assert_eq!(context["kind"], "self_transfer");
    }

    #[test]
    fn test_audit_failure_context_includes_record() {
        let tx = Transaction::completed(Uuid::new_v4(), Uuid::new_v4(), Decimal::new(3000, 2));
        let err: Result<()> = Err(Error::AuditWriteFailed {
            transaction: Box::new(tx.clone()),
            reason: "disk full".to_string(),
        });
        let result: OperationResult<()> = err.into();
        let context = result.context.unwrap();
        assert_eq!(context["kind"], "audit_write_failed");
        assert_eq!(
            context["unrecorded_transaction"]["id"],
            serde_json::Value::from(tx.id.to_string())
        );
    }

    #[test]
    fn test_only_storage_errors_are_retryable() {
        assert!(Error::storage("locked").is_retryable());
        assert!(!Error::InsufficientFunds { account_id: Uuid::new_v4() }.is_retryable());
        assert!(!Error::SelfTransfer.is_retryable());
        assert!(!Error::BalanceOverflow { account_id: Uuid::new_v4() }.is_retryable());
    }
}
