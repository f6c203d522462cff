//! Account store port - the only place balances change

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::result::Result;
use crate::domain::Account;

/// Balances of both accounts right after an atomic transfer committed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransferBalances {
    pub from_balance: Decimal,
    pub to_balance: Decimal,
}

/// Durable keyed storage of account balances
///
/// Implementations must make every balance-changing method a single atomic
/// unit: no reader may observe a balance that was checked but not yet
/// decremented, or a debit without its matching credit. Callers validate
/// that amounts are positive; the store does not re-check authorization.
///
/// How much runs in parallel is up to the adapter. `DuckDbRepository` runs
/// one operation at a time on a single connection; `InMemoryLedger` only
/// serializes operations that touch the same account.
#[async_trait]
pub trait AccountStore: Send + Sync {
    // === Lifecycle ===

    /// Persist a new account
    async fn create_account(&self, account: &Account) -> Result<()>;

    /// Get account by ID, always reading the durable state
    async fn get_account(&self, id: Uuid) -> Result<Option<Account>>;

    /// Get all accounts owned by a user
    async fn list_accounts_by_user(&self, user_id: Uuid) -> Result<Vec<Account>>;

    /// Get all accounts
    async fn list_accounts(&self) -> Result<Vec<Account>>;

    /// Hard-delete an account. Fails with `AccountNotEmpty` unless the
    /// balance is zero at the moment of deletion.
    async fn delete_account(&self, id: Uuid) -> Result<()>;

    // === Balance mutation ===

    /// Decrease the balance only if it covers `amount`; check and decrement
    /// are one atomic step. Returns the new balance.
    async fn debit_if_sufficient(&self, id: Uuid, amount: Decimal) -> Result<Decimal>;

    /// Increase the balance unconditionally. Returns the new balance.
    async fn credit(&self, id: Uuid, amount: Decimal) -> Result<Decimal>;

    /// Debit `from` and credit `to` as one all-or-nothing unit.
    ///
    /// Errors with `InsufficientFunds` or `AccountNotFound(id)` naming the
    /// missing side; in both cases neither balance changed.
    async fn atomic_transfer(&self, from: Uuid, to: Uuid, amount: Decimal) -> Result<TransferBalances>;
}
