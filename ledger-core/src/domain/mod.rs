//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

mod account;
pub mod page;
pub mod result;
pub mod transaction;
mod user;

pub use account::Account;
pub use page::{Page, TransactionQuery};
pub use transaction::{StatusChange, Transaction, TransactionStatus};
pub use user::User;
