//! Ledger Core - a banking ledger with atomic transfers
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core business entities (Account, Transaction, User) and errors
//! - **ports**: Trait definitions for storage (AccountStore, TransactionLog, UserRepository)
//! - **services**: Business logic orchestration (TransferEngine, AccountService, ...)
//! - **adapters**: Concrete implementations (DuckDB, in-memory)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod log_migrations;
pub mod migrations;
pub mod ports;
pub mod services;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use adapters::duckdb::DuckDbRepository;
use config::Config;
use services::*;

// Re-export commonly used types at crate root
pub use domain::result::{Error, OperationResult};
pub use domain::{Account, Page, StatusChange, Transaction, TransactionQuery, TransactionStatus, User};
pub use ports::{AccountStore, TransactionLog, TransferBalances, UserRepository};
pub use services::{EntryPoint, LogEntry, LogEvent, LoggingService};

/// File name of the ledger database inside the ledger directory
pub const DB_FILENAME: &str = "ledger.duckdb";

/// Main context for ledger operations
///
/// Holds the configuration, the database and every service wired to it.
pub struct LedgerContext {
    pub config: Config,
    pub ledger_dir: PathBuf,
    pub repository: Arc<DuckDbRepository>,
    pub transfer_engine: TransferEngine,
    pub account_service: AccountService,
    pub auth_service: AuthService,
    pub history_service: HistoryService,
    pub reconciliation_service: ReconciliationService,
    pub status_service: StatusService,
}

impl LedgerContext {
    /// Open (creating if needed) the ledger stored in `ledger_dir`
    pub fn new(ledger_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(ledger_dir)
            .with_context(|| format!("Failed to create {}", ledger_dir.display()))?;
        let config = Config::load(ledger_dir)?;

        let repository = Arc::new(DuckDbRepository::new(&ledger_dir.join(DB_FILENAME))?);
        repository.ensure_schema()?;

        Ok(Self {
            transfer_engine: TransferEngine::new(repository.clone(), repository.clone()),
            account_service: AccountService::new(repository.clone(), repository.clone()),
            auth_service: AuthService::new(repository.clone()),
            history_service: HistoryService::new(
                repository.clone(),
                repository.clone(),
                config.max_page_size,
            ),
            reconciliation_service: ReconciliationService::new(repository.clone(), repository.clone()),
            status_service: StatusService::new(repository.clone(), repository.clone(), repository.clone()),
            config,
            ledger_dir: ledger_dir.to_path_buf(),
            repository,
        })
    }

    /// Default history query: first page at the configured size
    pub fn default_query(&self) -> TransactionQuery {
        TransactionQuery::page(self.config.page_size, 0)
    }
}
