//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

mod account;
mod auth;
mod history;
pub mod logging;
pub mod migration;
mod reconciliation;
mod status;
pub mod transfer;

pub use account::AccountService;
pub use auth::AuthService;
pub use history::HistoryService;
pub use logging::{EntryPoint, LogEntry, LogEvent, LoggingService};
pub use migration::{MigrationResult, MigrationService};
pub use reconciliation::{
    CheckResult, CheckStatus, ReconciliationReport, ReconciliationService, ReplayOutcome,
    ReportSummary,
};
pub use status::{CurrencyTotal, StatusService, StatusSummary};
pub use transfer::{validate_amount, TransferEngine, MAX_AMOUNT_SCALE};
