//! Account service - ownership-checked account lifecycle

use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::Account;
use crate::ports::{AccountStore, TransactionLog};
use crate::services::transfer::validate_amount;

/// Thin authorization layer over the account store. Every balance change
/// still goes through the store's own atomic primitives.
pub struct AccountService {
    accounts: Arc<dyn AccountStore>,
    log: Arc<dyn TransactionLog>,
}

impl AccountService {
    pub fn new(accounts: Arc<dyn AccountStore>, log: Arc<dyn TransactionLog>) -> Self {
        Self { accounts, log }
    }

    /// Open a zero-balance account for `owner`
    pub async fn create_account(&self, owner: Uuid, currency: &str) -> Result<Account> {
        let account = Account::new(owner, currency);
        account.validate().map_err(Error::validation)?;
        self.accounts.create_account(&account).await?;
        Ok(account)
    }

    /// Look up an account the requester owns
    pub async fn get_account(&self, id: Uuid, requester: Uuid) -> Result<Account> {
        let account = self
            .accounts
            .get_account(id)
            .await?
            .ok_or(Error::AccountNotFound(id))?;
        if !account.is_owned_by(requester) {
            return Err(Error::AccessDenied(id));
        }
        Ok(account)
    }

    pub async fn list_accounts(&self, requester: Uuid) -> Result<Vec<Account>> {
        self.accounts.list_accounts_by_user(requester).await
    }

    /// Delete an account. Refused while it holds money or is named by a
    /// pending transaction.
    pub async fn close_account(&self, id: Uuid, requester: Uuid) -> Result<()> {
        self.get_account(id, requester).await?;
        if self.log.count_pending_for_account(id).await? > 0 {
            return Err(Error::AccountHasPending(id));
        }
        self.accounts.delete_account(id).await
    }

    /// Add funds to an owned account; returns the new balance
    pub async fn deposit(&self, id: Uuid, requester: Uuid, amount: Decimal) -> Result<Decimal> {
        validate_amount(amount)?;
        self.get_account(id, requester).await?;
        self.accounts.credit(id, amount).await
    }

    /// Take funds out of an owned account; returns the new balance
    pub async fn withdraw(&self, id: Uuid, requester: Uuid, amount: Decimal) -> Result<Decimal> {
        validate_amount(amount)?;
        self.get_account(id, requester).await?;
        self.accounts.debit_if_sufficient(id, amount).await
    }
}
