//! DuckDB repository implementation

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use duckdb::{params, Connection};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::transaction::timestamp_key;
use crate::domain::{Account, StatusChange, Transaction, TransactionQuery, TransactionStatus, User};
use crate::ports::{AccountStore, TransactionLog, TransferBalances, UserRepository};
use crate::services::{MigrationResult, MigrationService};

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400, 800ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

const ACCOUNT_COLUMNS: &str = "account_id, user_id, balance::VARCHAR, currency, created_at";

const TRANSACTION_COLUMNS: &str =
    "transaction_id, from_account_id, to_account_id, amount::VARCHAR, status, created_at";

const USER_COLUMNS: &str = "user_id, username, password_hash, created_at";

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows error messages
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS error messages
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
        || lower.contains("could not set lock on file")
}

/// DuckDB repository implementation
///
/// One connection serves every port. Each balance-changing method runs in its
/// own SQL transaction while the connection mutex is held, so a check and the
/// update that depends on it can never interleave with another writer.
///
/// The mutex serializes every operation, reads included, across all accounts.
/// It is held only for the synchronous SQL call inside each async method and
/// never across an `.await`. Transfers between unrelated accounts therefore
/// queue behind each other; `InMemoryLedger` locks per account instead.
pub struct DuckDbRepository {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl DuckDbRepository {
    /// Open (or create) the ledger database
    ///
    /// Includes retry logic with exponential backoff for file locking errors,
    /// which can occur when another `ledger` process holds the file.
    pub fn new(db_path: &Path) -> anyhow::Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                        db_path: db_path.to_path_buf(),
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        // Exponential backoff: 50ms, 100ms, 200ms, 400ms
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        eprintln!(
                            "[ledger] Database busy, retrying in {}ms (attempt {}/{}): {}",
                            delay.as_millis(),
                            attempt + 1,
                            MAX_RETRIES,
                            err_msg
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow!("Failed to open database after {} retries", MAX_RETRIES)))
    }

    /// Attempt to open a database connection (called by new() with retry logic)
    fn try_open_connection(db_path: &Path) -> anyhow::Result<Connection> {
        // Extension autoloading stays off; nothing here needs an extension
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Ok(Connection::open_with_flags(db_path, config)?)
    }

    /// Run database migrations using the MigrationService
    pub fn run_migrations(&self) -> anyhow::Result<MigrationResult> {
        let conn = self.conn.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))?;
        MigrationService::new(&conn).run_pending()
    }

    /// Ensure database schema exists (runs pending migrations)
    pub fn ensure_schema(&self) -> anyhow::Result<()> {
        self.run_migrations()?;
        Ok(())
    }

    /// Path of the database file
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Size of the database file in bytes
    pub fn db_size(&self) -> Result<u64> {
        Ok(std::fs::metadata(&self.db_path)?.len())
    }
}

// === Row mapping ===

type AccountRow = (String, String, String, String, String);
type TransactionRow = (String, String, String, String, String, String);
type UserRow = (String, String, String, String);

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::storage(format!("corrupt id '{}': {}", s, e)))
}

fn parse_decimal(s: &str) -> Result<Decimal> {
    Decimal::from_str(s)
        .map(|d| d.normalize())
        .map_err(|e| Error::storage(format!("corrupt decimal '{}': {}", s, e)))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::storage(format!("corrupt timestamp '{}': {}", s, e)))
}

fn parse_account((id, user_id, balance, currency, created_at): AccountRow) -> Result<Account> {
    Ok(Account {
        id: parse_uuid(&id)?,
        user_id: parse_uuid(&user_id)?,
        balance: parse_decimal(&balance)?,
        currency,
        created_at: parse_timestamp(&created_at)?,
    })
}

fn parse_transaction((id, from, to, amount, status, created_at): TransactionRow) -> Result<Transaction> {
    Ok(Transaction {
        id: parse_uuid(&id)?,
        from_account_id: parse_uuid(&from)?,
        to_account_id: parse_uuid(&to)?,
        amount: parse_decimal(&amount)?,
        status: status.parse()?,
        created_at: parse_timestamp(&created_at)?,
    })
}

fn parse_user((id, username, password_hash, created_at): UserRow) -> Result<User> {
    Ok(User {
        id: parse_uuid(&id)?,
        username,
        password_hash,
        created_at: parse_timestamp(&created_at)?,
    })
}

fn query_accounts(conn: &Connection, sql: &str, params: impl duckdb::Params) -> Result<Vec<Account>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| -> duckdb::Result<AccountRow> {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
    })?;
    let mut accounts = Vec::new();
    for row in rows {
        accounts.push(parse_account(row?)?);
    }
    Ok(accounts)
}

fn query_transactions(
    conn: &Connection,
    sql: &str,
    params: impl duckdb::Params,
) -> Result<Vec<Transaction>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| -> duckdb::Result<TransactionRow> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
        ))
    })?;
    let mut transactions = Vec::new();
    for row in rows {
        transactions.push(parse_transaction(row?)?);
    }
    Ok(transactions)
}

fn query_users(conn: &Connection, sql: &str, params: impl duckdb::Params) -> Result<Vec<User>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| -> duckdb::Result<UserRow> {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
    })?;
    let mut users = Vec::new();
    for row in rows {
        users.push(parse_user(row?)?);
    }
    Ok(users)
}

/// Current balance, or None if the account row does not exist
fn balance_of(conn: &Connection, id: Uuid) -> Result<Option<Decimal>> {
    let mut stmt = conn.prepare("SELECT balance::VARCHAR FROM sys_accounts WHERE account_id = ?")?;
    let mut rows = stmt.query_map(params![id.to_string()], |row| row.get::<_, String>(0))?;
    let next = rows.next();
    match next {
        Some(balance) => Ok(Some(parse_decimal(&balance?)?)),
        None => Ok(None),
    }
}

/// Conditional decrement; returns false when the balance does not cover `amount`
fn debit_row(conn: &Connection, id: Uuid, amount: &str) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE sys_accounts
         SET balance = balance - CAST(? AS DECIMAL(38, 8))
         WHERE account_id = ? AND balance >= CAST(? AS DECIMAL(38, 8))",
        params![amount, id.to_string(), amount],
    )?;
    Ok(changed == 1)
}

/// Unconditional increment; returns false when the row does not exist
fn credit_row(conn: &Connection, id: Uuid, amount: &str) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE sys_accounts
         SET balance = balance + CAST(? AS DECIMAL(38, 8))
         WHERE account_id = ?",
        params![amount, id.to_string()],
    )?;
    Ok(changed == 1)
}

fn require_balance(conn: &Connection, id: Uuid) -> Result<Decimal> {
    balance_of(conn, id)?.ok_or(Error::AccountNotFound(id))
}

#[async_trait]
impl AccountStore for DuckDbRepository {
    async fn create_account(&self, account: &Account) -> Result<()> {
        let conn = self.conn.lock()?;
        conn.execute(
            "INSERT INTO sys_accounts (account_id, user_id, balance, currency, created_at)
             VALUES (?, ?, CAST(? AS DECIMAL(38, 8)), ?, ?)",
            params![
                account.id.to_string(),
                account.user_id.to_string(),
                account.balance.to_string(),
                &account.currency,
                timestamp_key(&account.created_at),
            ],
        )?;
        Ok(())
    }

    async fn get_account(&self, id: Uuid) -> Result<Option<Account>> {
        let conn = self.conn.lock()?;
        let sql = format!("SELECT {} FROM sys_accounts WHERE account_id = ?", ACCOUNT_COLUMNS);
        Ok(query_accounts(&conn, &sql, params![id.to_string()])?.into_iter().next())
    }

    async fn list_accounts_by_user(&self, user_id: Uuid) -> Result<Vec<Account>> {
        let conn = self.conn.lock()?;
        let sql = format!(
            "SELECT {} FROM sys_accounts WHERE user_id = ? ORDER BY created_at, account_id",
            ACCOUNT_COLUMNS
        );
        query_accounts(&conn, &sql, params![user_id.to_string()])
    }

    async fn list_accounts(&self) -> Result<Vec<Account>> {
        let conn = self.conn.lock()?;
        let sql = format!("SELECT {} FROM sys_accounts ORDER BY created_at, account_id", ACCOUNT_COLUMNS);
        query_accounts(&conn, &sql, [])
    }

    async fn delete_account(&self, id: Uuid) -> Result<()> {
        let mut conn = self.conn.lock()?;
        let tx = conn.transaction()?;
        let balance = require_balance(&tx, id)?;
        if !balance.is_zero() {
            return Err(Error::AccountNotEmpty { account_id: id, balance });
        }
        tx.execute("DELETE FROM sys_accounts WHERE account_id = ?", params![id.to_string()])?;
        tx.commit()?;
        Ok(())
    }

    async fn debit_if_sufficient(&self, id: Uuid, amount: Decimal) -> Result<Decimal> {
        let mut conn = self.conn.lock()?;
        let tx = conn.transaction()?;
        require_balance(&tx, id)?;
        if !debit_row(&tx, id, &amount.to_string())? {
            return Err(Error::InsufficientFunds { account_id: id });
        }
        let balance = require_balance(&tx, id)?;
        tx.commit()?;
        Ok(balance)
    }

    async fn credit(&self, id: Uuid, amount: Decimal) -> Result<Decimal> {
        let mut conn = self.conn.lock()?;
        let tx = conn.transaction()?;
        let current = require_balance(&tx, id)?;
        if Account::checked_credit(current, amount).is_none() {
            return Err(Error::BalanceOverflow { account_id: id });
        }
        if !credit_row(&tx, id, &amount.to_string())? {
            return Err(Error::AccountNotFound(id));
        }
        let balance = require_balance(&tx, id)?;
        tx.commit()?;
        Ok(balance)
    }

    async fn atomic_transfer(&self, from: Uuid, to: Uuid, amount: Decimal) -> Result<TransferBalances> {
        if from == to {
            return Err(Error::SelfTransfer);
        }
        let mut conn = self.conn.lock()?;
        let tx = conn.transaction()?;

        // Same outcome order as the in-memory store: funds, then headroom
        let from_balance = require_balance(&tx, from)?;
        let to_balance = require_balance(&tx, to)?;
        if Account::checked_debit(from_balance, amount).is_none() {
            return Err(Error::InsufficientFunds { account_id: from });
        }
        if Account::checked_credit(to_balance, amount).is_none() {
            return Err(Error::BalanceOverflow { account_id: to });
        }

        let amount = amount.to_string();

        // Rows are touched in ascending id order whatever the direction.
        // Returning early drops `tx`, which rolls back the debit if it ran.
        let (first, second) = if from < to { (from, to) } else { (to, from) };
        for id in [first, second] {
            if id == from {
                if !debit_row(&tx, from, &amount)? {
                    return Err(Error::InsufficientFunds { account_id: from });
                }
            } else if !credit_row(&tx, to, &amount)? {
                return Err(Error::AccountNotFound(to));
            }
        }

        let balances = TransferBalances {
            from_balance: require_balance(&tx, from)?,
            to_balance: require_balance(&tx, to)?,
        };
        tx.commit()?;
        Ok(balances)
    }
}

#[async_trait]
impl TransactionLog for DuckDbRepository {
    async fn append(&self, record: &Transaction) -> Result<Uuid> {
        record.validate()?;
        let conn = self.conn.lock()?;
        let exists: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sys_transactions WHERE transaction_id = ?",
            params![record.id.to_string()],
            |row| row.get(0),
        )?;
        if exists > 0 {
            return Err(Error::DuplicateTransaction(record.id));
        }
        conn.execute(
            "INSERT INTO sys_transactions
                (transaction_id, from_account_id, to_account_id, amount, status, created_at)
             VALUES (?, ?, ?, CAST(? AS DECIMAL(38, 8)), ?, ?)",
            params![
                record.id.to_string(),
                record.from_account_id.to_string(),
                record.to_account_id.to_string(),
                record.amount.to_string(),
                record.status.as_str(),
                record.created_at_key(),
            ],
        )?;
        Ok(record.id)
    }

    async fn get_transaction(&self, id: Uuid) -> Result<Option<Transaction>> {
        let conn = self.conn.lock()?;
        let sql = format!(
            "SELECT {} FROM sys_transactions WHERE transaction_id = ?",
            TRANSACTION_COLUMNS
        );
        Ok(query_transactions(&conn, &sql, params![id.to_string()])?.into_iter().next())
    }

    async fn list_by_account(&self, account_id: Uuid, query: &TransactionQuery) -> Result<Vec<Transaction>> {
        let conn = self.conn.lock()?;
        // Open bounds: "" sorts before every stored key and "~" after it
        let since = query.since.map(|ts| timestamp_key(&ts)).unwrap_or_default();
        let until = query
            .until
            .map(|ts| timestamp_key(&ts))
            .unwrap_or_else(|| "~".to_string());
        let sql = format!(
            "SELECT {} FROM sys_transactions
             WHERE (from_account_id = ? OR to_account_id = ?)
               AND created_at >= ?
               AND created_at < ?
             ORDER BY created_at DESC, seq DESC
             LIMIT ? OFFSET ?",
            TRANSACTION_COLUMNS
        );
        let id = account_id.to_string();
        query_transactions(
            &conn,
            &sql,
            params![
                &id,
                &id,
                since,
                until,
                query.page.limit as i64,
                query.page.offset as i64,
            ],
        )
    }

    async fn list_all(&self) -> Result<Vec<Transaction>> {
        let conn = self.conn.lock()?;
        let sql = format!(
            "SELECT {} FROM sys_transactions ORDER BY created_at DESC, seq DESC",
            TRANSACTION_COLUMNS
        );
        query_transactions(&conn, &sql, [])
    }

    async fn list_by_status(&self, status: TransactionStatus) -> Result<Vec<Transaction>> {
        let conn = self.conn.lock()?;
        let sql = format!(
            "SELECT {} FROM sys_transactions WHERE status = ? ORDER BY created_at DESC, seq DESC",
            TRANSACTION_COLUMNS
        );
        query_transactions(&conn, &sql, params![status.as_str()])
    }

    async fn count_pending_for_account(&self, account_id: Uuid) -> Result<u64> {
        let conn = self.conn.lock()?;
        let id = account_id.to_string();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sys_transactions
             WHERE status = 'pending' AND (from_account_id = ? OR to_account_id = ?)",
            params![&id, &id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    async fn count(&self) -> Result<u64> {
        let conn = self.conn.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM sys_transactions", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    async fn update_status(&self, id: Uuid, status: TransactionStatus) -> Result<StatusChange> {
        let mut conn = self.conn.lock()?;
        let tx = conn.transaction()?;
        let current: TransactionStatus = {
            let mut stmt = tx.prepare("SELECT status FROM sys_transactions WHERE transaction_id = ?")?;
            let mut rows = stmt.query_map(params![id.to_string()], |row| row.get::<_, String>(0))?;
            let next = rows.next();
            match next {
                Some(raw) => raw?.parse()?,
                None => return Err(Error::TransactionNotFound(id)),
            }
        };
        let change = current.transition_to(status)?;
        if change == StatusChange::Applied {
            tx.execute(
                "UPDATE sys_transactions SET status = ? WHERE transaction_id = ?",
                params![status.as_str(), id.to_string()],
            )?;
        }
        tx.commit()?;
        Ok(change)
    }
}

#[async_trait]
impl UserRepository for DuckDbRepository {
    async fn create_user(&self, user: &User) -> Result<()> {
        let conn = self.conn.lock()?;
        let taken: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sys_users WHERE username = ?",
            params![&user.username],
            |row| row.get(0),
        )?;
        if taken > 0 {
            return Err(Error::UsernameTaken(user.username.clone()));
        }
        conn.execute(
            "INSERT INTO sys_users (user_id, username, password_hash, created_at) VALUES (?, ?, ?, ?)",
            params![
                user.id.to_string(),
                &user.username,
                &user.password_hash,
                timestamp_key(&user.created_at),
            ],
        )?;
        Ok(())
    }

    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let conn = self.conn.lock()?;
        let sql = format!("SELECT {} FROM sys_users WHERE user_id = ?", USER_COLUMNS);
        Ok(query_users(&conn, &sql, params![id.to_string()])?.into_iter().next())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.conn.lock()?;
        let sql = format!("SELECT {} FROM sys_users WHERE username = ?", USER_COLUMNS);
        Ok(query_users(&conn, &sql, params![username])?.into_iter().next())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn.lock()?;
        let sql = format!("SELECT {} FROM sys_users ORDER BY username", USER_COLUMNS);
        query_users(&conn, &sql, [])
    }
}
