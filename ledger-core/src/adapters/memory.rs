//! In-memory ledger implementation
//!
//! Deterministic store for tests and embedding. Every account row sits behind
//! its own mutex; the account map itself is only locked long enough to
//! resolve rows, so transfers on disjoint accounts never wait on each other.
//! The map lock is never held while acquiring a row lock. A deleted row is
//! emptied under its own lock before it leaves the map.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{Account, StatusChange, Transaction, TransactionQuery, TransactionStatus, User};
use crate::ports::{AccountStore, TransactionLog, TransferBalances, UserRepository};

/// `None` once the account has been deleted
type AccountRow = Arc<Mutex<Option<Account>>>;

/// Log entry plus its append sequence, used to break timestamp ties
struct LoggedTransaction {
    seq: u64,
    tx: Transaction,
}

#[derive(Default)]
struct TransactionTable {
    next_seq: u64,
    rows: Vec<LoggedTransaction>,
    by_id: HashMap<Uuid, usize>,
}

/// In-memory implementation of every port
#[derive(Default)]
pub struct InMemoryLedger {
    accounts: RwLock<HashMap<Uuid, AccountRow>>,
    transactions: Mutex<TransactionTable>,
    users: RwLock<HashMap<Uuid, User>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn row(&self, id: Uuid) -> Result<AccountRow> {
        let accounts = self.accounts.read()?;
        accounts.get(&id).cloned().ok_or(Error::AccountNotFound(id))
    }

    /// Lock both rows in ascending id order, returning guards as (from, to)
    fn lock_pair<'a>(
        from: &'a AccountRow,
        to: &'a AccountRow,
        from_id: Uuid,
        to_id: Uuid,
    ) -> Result<(MutexGuard<'a, Option<Account>>, MutexGuard<'a, Option<Account>>)> {
        if from_id < to_id {
            let from_guard = from.lock()?;
            let to_guard = to.lock()?;
            Ok((from_guard, to_guard))
        } else {
            let to_guard = to.lock()?;
            let from_guard = from.lock()?;
            Ok((from_guard, to_guard))
        }
    }

    fn sorted_newest_first(mut rows: Vec<(u64, Transaction)>) -> Vec<Transaction> {
        rows.sort_by(|(seq_a, a), (seq_b, b)| {
            b.created_at.cmp(&a.created_at).then(seq_b.cmp(seq_a))
        });
        rows.into_iter().map(|(_, tx)| tx).collect()
    }
}

#[async_trait]
impl AccountStore for InMemoryLedger {
    async fn create_account(&self, account: &Account) -> Result<()> {
        let mut accounts = self.accounts.write()?;
        if accounts.contains_key(&account.id) {
            return Err(Error::validation(format!("account {} already exists", account.id)));
        }
        accounts.insert(account.id, Arc::new(Mutex::new(Some(account.clone()))));
        Ok(())
    }

    async fn get_account(&self, id: Uuid) -> Result<Option<Account>> {
        match self.row(id) {
            Ok(row) => Ok(row.lock()?.clone()),
            Err(Error::AccountNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn list_accounts_by_user(&self, user_id: Uuid) -> Result<Vec<Account>> {
        let mut accounts = self.list_accounts().await?;
        accounts.retain(|a| a.user_id == user_id);
        Ok(accounts)
    }

    async fn list_accounts(&self) -> Result<Vec<Account>> {
        let rows: Vec<AccountRow> = self.accounts.read()?.values().cloned().collect();
        let mut accounts = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(account) = row.lock()?.clone() {
                accounts.push(account);
            }
        }
        accounts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(accounts)
    }

    async fn delete_account(&self, id: Uuid) -> Result<()> {
        let row = self.row(id)?;
        {
            let mut slot = row.lock()?;
            let account = slot.as_ref().ok_or(Error::AccountNotFound(id))?;
            if !account.balance.is_zero() {
                return Err(Error::AccountNotEmpty {
                    account_id: id,
                    balance: account.balance,
                });
            }
            *slot = None;
        }
        self.accounts.write()?.remove(&id);
        Ok(())
    }

    async fn debit_if_sufficient(&self, id: Uuid, amount: Decimal) -> Result<Decimal> {
        let row = self.row(id)?;
        let mut slot = row.lock()?;
        let account = slot.as_mut().ok_or(Error::AccountNotFound(id))?;
        account.balance = Account::checked_debit(account.balance, amount)
            .ok_or(Error::InsufficientFunds { account_id: id })?;
        Ok(account.balance)
    }

    async fn credit(&self, id: Uuid, amount: Decimal) -> Result<Decimal> {
        let row = self.row(id)?;
        let mut slot = row.lock()?;
        let account = slot.as_mut().ok_or(Error::AccountNotFound(id))?;
        account.balance = Account::checked_credit(account.balance, amount)
            .ok_or(Error::BalanceOverflow { account_id: id })?;
        Ok(account.balance)
    }

    async fn atomic_transfer(&self, from: Uuid, to: Uuid, amount: Decimal) -> Result<TransferBalances> {
        if from == to {
            return Err(Error::SelfTransfer);
        }
        let from_row = self.row(from)?;
        let to_row = self.row(to)?;

        let (mut from_slot, mut to_slot) = Self::lock_pair(&from_row, &to_row, from, to)?;
        let source = from_slot.as_mut().ok_or(Error::AccountNotFound(from))?;
        let destination = to_slot.as_mut().ok_or(Error::AccountNotFound(to))?;

        // Both results are computed before either row changes
        let from_balance = Account::checked_debit(source.balance, amount)
            .ok_or(Error::InsufficientFunds { account_id: from })?;
        let to_balance = Account::checked_credit(destination.balance, amount)
            .ok_or(Error::BalanceOverflow { account_id: to })?;
        source.balance = from_balance;
        destination.balance = to_balance;

        Ok(TransferBalances {
            from_balance: source.balance,
            to_balance: destination.balance,
        })
    }
}

#[async_trait]
impl TransactionLog for InMemoryLedger {
    async fn append(&self, tx: &Transaction) -> Result<Uuid> {
        tx.validate()?;
        let mut table = self.transactions.lock()?;
        if table.by_id.contains_key(&tx.id) {
            return Err(Error::DuplicateTransaction(tx.id));
        }
        let seq = table.next_seq;
        table.next_seq += 1;
        let index = table.rows.len();
        table.rows.push(LoggedTransaction { seq, tx: tx.clone() });
        table.by_id.insert(tx.id, index);
        Ok(tx.id)
    }

    async fn get_transaction(&self, id: Uuid) -> Result<Option<Transaction>> {
        let table = self.transactions.lock()?;
        Ok(table.by_id.get(&id).map(|&i| table.rows[i].tx.clone()))
    }

    async fn list_by_account(&self, account_id: Uuid, query: &TransactionQuery) -> Result<Vec<Transaction>> {
        let matching: Vec<(u64, Transaction)> = {
            let table = self.transactions.lock()?;
            table
                .rows
                .iter()
                .filter(|row| row.tx.involves(account_id) && query.matches(&row.tx.created_at))
                .map(|row| (row.seq, row.tx.clone()))
                .collect()
        };
        Ok(Self::sorted_newest_first(matching)
            .into_iter()
            .skip(query.page.offset)
            .take(query.page.limit)
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<Transaction>> {
        let rows: Vec<(u64, Transaction)> = {
            let table = self.transactions.lock()?;
            table.rows.iter().map(|row| (row.seq, row.tx.clone())).collect()
        };
        Ok(Self::sorted_newest_first(rows))
    }

    async fn list_by_status(&self, status: TransactionStatus) -> Result<Vec<Transaction>> {
        let matching: Vec<(u64, Transaction)> = {
            let table = self.transactions.lock()?;
            table
                .rows
                .iter()
                .filter(|row| row.tx.status == status)
                .map(|row| (row.seq, row.tx.clone()))
                .collect()
        };
        Ok(Self::sorted_newest_first(matching))
    }

    async fn count_pending_for_account(&self, account_id: Uuid) -> Result<u64> {
        let table = self.transactions.lock()?;
        Ok(table
            .rows
            .iter()
            .filter(|row| row.tx.status == TransactionStatus::Pending && row.tx.involves(account_id))
            .count() as u64)
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.transactions.lock()?.rows.len() as u64)
    }

    async fn update_status(&self, id: Uuid, status: TransactionStatus) -> Result<StatusChange> {
        let mut table = self.transactions.lock()?;
        let index = *table.by_id.get(&id).ok_or(Error::TransactionNotFound(id))?;
        let row = &mut table.rows[index];
        let change = row.tx.status.transition_to(status)?;
        if change == StatusChange::Applied {
            row.tx.status = status;
        }
        Ok(change)
    }
}

#[async_trait]
impl UserRepository for InMemoryLedger {
    async fn create_user(&self, user: &User) -> Result<()> {
        let mut users = self.users.write()?;
        if users.values().any(|u| u.username == user.username) {
            return Err(Error::UsernameTaken(user.username.clone()));
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.read()?.get(&id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self.users.read()?.values().find(|u| u.username == username).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let mut users: Vec<User> = self.users.read()?.values().cloned().collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }
}
