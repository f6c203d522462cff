//! Transaction log port - append-only transfer history

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::result::Result;
use crate::domain::{StatusChange, Transaction, TransactionQuery, TransactionStatus};

/// Durable, append-only history of transfers
#[async_trait]
pub trait TransactionLog: Send + Sync {
    /// Append a record. The id must be unique; a second append with the same
    /// id fails with `DuplicateTransaction`.
    async fn append(&self, tx: &Transaction) -> Result<Uuid>;

    /// Get a record by ID
    async fn get_transaction(&self, id: Uuid) -> Result<Option<Transaction>>;

    /// Records where the account is either side, newest first. Records with
    /// equal timestamps keep a stable order (later appends first).
    async fn list_by_account(&self, account_id: Uuid, query: &TransactionQuery) -> Result<Vec<Transaction>>;

    /// Every record, newest first
    async fn list_all(&self) -> Result<Vec<Transaction>>;

    /// All records currently in `status`, newest first
    async fn list_by_status(&self, status: TransactionStatus) -> Result<Vec<Transaction>>;

    /// Number of pending records touching the account on either side
    async fn count_pending_for_account(&self, account_id: Uuid) -> Result<u64>;

    /// Total number of records
    async fn count(&self) -> Result<u64>;

    /// Reconciliation-only status transition, see
    /// [`TransactionStatus::transition_to`]
    async fn update_status(&self, id: Uuid, status: TransactionStatus) -> Result<StatusChange>;
}
