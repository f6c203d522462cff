//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The services
//! depend only on these traits, not on concrete implementations.

mod account_store;
mod transaction_log;
mod user_repository;

pub use account_store::{AccountStore, TransferBalances};
pub use transaction_log::TransactionLog;
pub use user_repository::UserRepository;
