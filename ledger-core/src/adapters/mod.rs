//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - DuckDB for durable storage of accounts, transactions and users
//! - In-memory maps for tests and embedding

pub mod duckdb;
pub mod memory;
