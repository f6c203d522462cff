//! Logging service - structured event logging to DuckDB
//!
//! Events are stored in `logs.duckdb`, next to the ledger database but in a
//! separate file. Events carry ids and error kinds. Balances are never
//! written here, and the only amount is inside the replay payload of an
//! audit failure.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use chrono::Utc;
use duckdb::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::result::Error;
use crate::log_migrations::LOG_MIGRATIONS;
use crate::services::MigrationService;

/// Counter for generating unique IDs within the same millisecond
static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a unique ID based on timestamp + counter
fn generate_id() -> u64 {
    let timestamp = now_ms() as u64;
    // Lower 16 bits: per-millisecond counter
    let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed) & 0xFFFF;
    (timestamp << 16) | counter
}

/// Current unix timestamp in milliseconds
fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn detect_platform() -> &'static str {
    if cfg!(target_os = "macos") {
        "macos"
    } else if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "linux") {
        "linux"
    } else {
        "unknown"
    }
}

/// Which front end produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryPoint {
    Cli,
    Embedded,
}

impl EntryPoint {
    fn as_str(&self) -> &'static str {
        match self {
            EntryPoint::Cli => "cli",
            EntryPoint::Embedded => "embedded",
        }
    }
}

/// A log event to be recorded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
}

impl LogEvent {
    /// Create a new log event with just an event name
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            command: None,
            account_id: None,
            transaction_id: None,
            error_message: None,
            error_details: None,
        }
    }

    /// Set the command context (for CLI events)
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_account(mut self, account_id: Uuid) -> Self {
        self.account_id = Some(account_id.to_string());
        self
    }

    pub fn with_transaction(mut self, transaction_id: Uuid) -> Self {
        self.transaction_id = Some(transaction_id.to_string());
        self
    }

    /// Set error information
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    /// Set error details (replay payload, additional context)
    pub fn with_error_details(mut self, details: impl Into<String>) -> Self {
        self.error_details = Some(details.into());
        self
    }

    /// Event for a failed ledger operation.
    ///
    /// Only the error kind is recorded as the message. For `AuditWriteFailed`
    /// the details hold the unrecorded transaction as JSON, ready for
    /// `ledger reconcile replay`. No other event carries an amount.
    pub fn from_error(event: impl Into<String>, err: &Error) -> Self {
        let mut log_event = Self::new(event).with_error(err.kind());
        match err {
            Error::AuditWriteFailed { transaction, reason } => {
                log_event = log_event.with_transaction(transaction.id);
                if let Ok(payload) = serde_json::to_string(transaction.as_ref()) {
                    log_event = log_event.with_error_details(payload);
                } else {
                    log_event = log_event.with_error_details(reason.clone());
                }
            }
            Error::AccessDenied(id)
            | Error::AccountNotFound(id)
            | Error::AccountHasPending(id) => {
                log_event = log_event.with_account(*id);
            }
            Error::InsufficientFunds { account_id }
            | Error::AccountNotEmpty { account_id, .. }
            | Error::BalanceOverflow { account_id } => {
                log_event = log_event.with_account(*account_id);
            }
            Error::TransactionNotFound(id) | Error::DuplicateTransaction(id) => {
                log_event = log_event.with_transaction(*id);
            }
            _ => {}
        }
        log_event
    }
}

/// A log entry as stored in the database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    pub timestamp: i64,
    pub entry_point: String,
    pub app_version: String,
    pub platform: String,
    pub event: String,
    pub command: Option<String>,
    pub account_id: Option<String>,
    pub transaction_id: Option<String>,
    pub error_message: Option<String>,
    pub error_details: Option<String>,
}

const LOG_COLUMNS: &str = "id, timestamp, entry_point, app_version, platform, event, command, \
                           account_id, transaction_id, error_message, error_details";

/// Service for structured event logging
pub struct LoggingService {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    entry_point: EntryPoint,
    app_version: String,
    platform: &'static str,
}

impl LoggingService {
    /// Open or create `logs.duckdb` in the ledger directory and run any
    /// pending log migrations
    pub fn new(
        ledger_dir: &Path,
        entry_point: EntryPoint,
        app_version: impl Into<String>,
    ) -> Result<Self> {
        let db_path = ledger_dir.join("logs.duckdb");
        let conn = Connection::open(&db_path)?;
        MigrationService::with_migrations(&conn, LOG_MIGRATIONS).run_pending()?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
            entry_point,
            app_version: app_version.into(),
            platform: detect_platform(),
        })
    }

    /// Record an event; entry point, version and platform are filled in
    pub fn log(&self, event: LogEvent) -> Result<()> {
        let conn = self.conn.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))?;

        conn.execute(
            &format!(
                "INSERT INTO sys_logs ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                LOG_COLUMNS
            ),
            duckdb::params![
                generate_id(),
                now_ms(),
                self.entry_point.as_str(),
                &self.app_version,
                self.platform,
                &event.event,
                &event.command,
                &event.account_id,
                &event.transaction_id,
                &event.error_message,
                &event.error_details,
            ],
        )?;

        Ok(())
    }

    /// Log a simple event with just a name
    pub fn log_event(&self, event: &str) -> Result<()> {
        self.log(LogEvent::new(event))
    }

    /// Log a CLI command execution
    pub fn log_command(&self, command: &str) -> Result<()> {
        self.log(LogEvent::new("command_executed").with_command(command))
    }

    /// Log an error
    pub fn log_error(&self, event: &str, message: &str, details: Option<&str>) -> Result<()> {
        let mut log_event = LogEvent::new(event).with_error(message);
        if let Some(d) = details {
            log_event = log_event.with_error_details(d);
        }
        self.log(log_event)
    }

    fn query(&self, filter: &str, limit: usize) -> Result<Vec<LogEntry>> {
        let conn = self.conn.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sys_logs {} ORDER BY timestamp DESC, id DESC LIMIT ?",
            LOG_COLUMNS, filter
        ))?;

        let rows = stmt.query_map([limit as i64], |row| {
            Ok(LogEntry {
                id: row.get(0)?,
                timestamp: row.get(1)?,
                entry_point: row.get(2)?,
                app_version: row.get(3)?,
                platform: row.get(4)?,
                event: row.get(5)?,
                command: row.get(6)?,
                account_id: row.get(7)?,
                transaction_id: row.get(8)?,
                error_message: row.get(9)?,
                error_details: row.get(10)?,
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    /// Most recent entries, newest first
    pub fn get_recent(&self, limit: usize) -> Result<Vec<LogEntry>> {
        self.query("", limit)
    }

    /// Most recent entries that carry an error
    pub fn get_errors(&self, limit: usize) -> Result<Vec<LogEntry>> {
        self.query("WHERE error_message IS NOT NULL", limit)
    }

    /// Unreplayed audit failures are found here by operators
    pub fn get_audit_failures(&self, limit: usize) -> Result<Vec<LogEntry>> {
        self.query("WHERE error_message = 'audit_write_failed'", limit)
    }

    /// Get the total number of log entries
    pub fn count(&self) -> Result<u64> {
        let conn = self.conn.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM sys_logs", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Delete logs older than the specified timestamp (unix ms)
    pub fn delete_before(&self, timestamp_ms: i64) -> Result<u64> {
        let conn = self.conn.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))?;
        let deleted = conn.execute("DELETE FROM sys_logs WHERE timestamp < ?", [timestamp_ms])?;
        Ok(deleted as u64)
    }

    /// Delete every entry
    pub fn clear(&self) -> Result<u64> {
        let conn = self.conn.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))?;
        let deleted = conn.execute("DELETE FROM sys_logs", [])?;
        Ok(deleted as u64)
    }

    /// Get the path to the logs database
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Transaction;
    use rust_decimal::Decimal;
    use tempfile::tempdir;

    #[test]
    fn test_logging_service_creation() {
        let dir = tempdir().unwrap();
        let service = LoggingService::new(dir.path(), EntryPoint::Cli, "1.0.0").unwrap();

        assert!(service.db_path().exists());
    }

    #[test]
    fn test_log_event() {
        let dir = tempdir().unwrap();
        let service = LoggingService::new(dir.path(), EntryPoint::Cli, "1.0.0").unwrap();

        service.log_event("test_event").unwrap();

        let entries = service.get_recent(10).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event, "test_event");
        assert_eq!(entries[0].entry_point, "cli");
        assert_eq!(entries[0].app_version, "1.0.0");
    }

    #[test]
    fn test_rejected_transfer_records_kind_only() {
        let dir = tempdir().unwrap();
        let service = LoggingService::new(dir.path(), EntryPoint::Embedded, "1.0.0").unwrap();
        let account = Uuid::new_v4();

        service
            .log(
                LogEvent::from_error("transfer_rejected", &Error::InsufficientFunds { account_id: account })
                    .with_command("transfer"),
            )
            .unwrap();

        let errors = service.get_errors(10).unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].error_message.as_deref(), Some("insufficient_funds"));
        assert_eq!(errors[0].account_id, Some(account.to_string()));
        assert_eq!(errors[0].entry_point, "embedded");
        assert!(errors[0].error_details.is_none());
    }

    #[test]
    fn test_audit_failure_keeps_replay_payload() {
        let dir = tempdir().unwrap();
        let service = LoggingService::new(dir.path(), EntryPoint::Cli, "1.0.0").unwrap();
        let tx = Transaction::completed(Uuid::new_v4(), Uuid::new_v4(), Decimal::new(1000, 2));
        let err = Error::AuditWriteFailed {
            transaction: Box::new(tx.clone()),
            reason: "disk full".to_string(),
        };

        service.log(LogEvent::from_error("transfer_audit_failed", &err)).unwrap();

        let failures = service.get_audit_failures(10).unwrap();
        assert_eq!(failures.len(), 1);
        let payload: Transaction =
            serde_json::from_str(failures[0].error_details.as_deref().unwrap()).unwrap();
        assert_eq!(payload, tx);
    }

    #[test]
    fn test_count_and_clear() {
        let dir = tempdir().unwrap();
        let service = LoggingService::new(dir.path(), EntryPoint::Cli, "1.0.0").unwrap();

        service.log_event("event1").unwrap();
        service.log_command("status").unwrap();
        service.log_error("failed", "storage_unavailable", None).unwrap();
        assert_eq!(service.count().unwrap(), 3);

        assert_eq!(service.delete_before(now_ms() - 60_000).unwrap(), 0);
        assert_eq!(service.clear().unwrap(), 3);
        assert_eq!(service.count().unwrap(), 0);
    }
}
