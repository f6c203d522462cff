//! Status service - ledger-wide summaries

use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::result::{Error, Result};
use crate::domain::TransactionStatus;
use crate::ports::{AccountStore, TransactionLog, UserRepository};

pub struct StatusService {
    accounts: Arc<dyn AccountStore>,
    log: Arc<dyn TransactionLog>,
    users: Arc<dyn UserRepository>,
}

impl StatusService {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        log: Arc<dyn TransactionLog>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self { accounts, log, users }
    }

    /// Get overall status summary
    pub async fn get_status(&self) -> Result<StatusSummary> {
        let users = self.users.list_users().await?;
        let accounts = self.accounts.list_accounts().await?;
        let total_transactions = self.log.count().await?;
        let pending_transactions = self.log.list_by_status(TransactionStatus::Pending).await?.len() as u64;

        let mut by_currency: BTreeMap<String, CurrencyTotal> = BTreeMap::new();
        for account in &accounts {
            let entry = by_currency
                .entry(account.currency.clone())
                .or_insert_with(|| CurrencyTotal {
                    currency: account.currency.clone(),
                    accounts: 0,
                    total_balance: Decimal::ZERO,
                });
            entry.accounts += 1;
            entry.total_balance = entry
                .total_balance
                .checked_add(account.balance)
                .ok_or_else(|| Error::TotalOverflow {
                    currency: account.currency.clone(),
                })?;
        }

        Ok(StatusSummary {
            total_users: users.len() as u64,
            total_accounts: accounts.len() as u64,
            total_transactions,
            pending_transactions,
            currencies: by_currency.into_values().collect(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct StatusSummary {
    pub total_users: u64,
    pub total_accounts: u64,
    pub total_transactions: u64,
    pub pending_transactions: u64,
    /// Sorted by currency code
    pub currencies: Vec<CurrencyTotal>,
}

#[derive(Debug, Serialize)]
pub struct CurrencyTotal {
    pub currency: String,
    pub accounts: u64,
    pub total_balance: Decimal,
}
