//! History service - read-only, ownership-checked transaction queries

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{Transaction, TransactionQuery};
use crate::ports::{AccountStore, TransactionLog};

pub struct HistoryService {
    accounts: Arc<dyn AccountStore>,
    log: Arc<dyn TransactionLog>,
    max_page_size: usize,
}

impl HistoryService {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        log: Arc<dyn TransactionLog>,
        max_page_size: usize,
    ) -> Self {
        Self {
            accounts,
            log,
            max_page_size,
        }
    }

    /// Transfers into or out of an account the requester owns, newest first
    pub async fn list_transactions(
        &self,
        account_id: Uuid,
        requester: Uuid,
        query: &TransactionQuery,
    ) -> Result<Vec<Transaction>> {
        query.validate(self.max_page_size)?;
        let account = self
            .accounts
            .get_account(account_id)
            .await?
            .ok_or(Error::AccountNotFound(account_id))?;
        if !account.is_owned_by(requester) {
            return Err(Error::AccessDenied(account_id));
        }
        self.log.list_by_account(account_id, query).await
    }

    /// A single record, visible to the owner of either side. Records whose
    /// accounts have since been closed are visible to nobody here.
    pub async fn get_transaction(&self, id: Uuid, requester: Uuid) -> Result<Transaction> {
        let tx = self
            .log
            .get_transaction(id)
            .await?
            .ok_or(Error::TransactionNotFound(id))?;
        for account_id in [tx.from_account_id, tx.to_account_id] {
            if let Some(account) = self.accounts.get_account(account_id).await? {
                if account.is_owned_by(requester) {
                    return Ok(tx);
                }
            }
        }
        Err(Error::TransactionNotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryLedger;
    use crate::domain::Account;
    use crate::services::TransferEngine;
    use rust_decimal::Decimal;

    struct Fixture {
        store: Arc<InMemoryLedger>,
        history: HistoryService,
        engine: TransferEngine,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryLedger::new());
        Fixture {
            history: HistoryService::new(store.clone(), store.clone(), 100),
            engine: TransferEngine::new(store.clone(), store.clone()),
            store,
        }
    }

    async fn open(store: &InMemoryLedger, owner: Uuid, balance: i64) -> Uuid {
        let account = Account::new(owner, "USD");
        store.create_account(&account).await.unwrap();
        if balance > 0 {
            store.credit(account.id, Decimal::from(balance)).await.unwrap();
        }
        account.id
    }

    #[tokio::test]
    async fn test_both_sides_see_the_transfer() {
        let f = fixture();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let a = open(&f.store, alice, 100).await;
        let b = open(&f.store, bob, 0).await;

        let id = f.engine.transfer(alice, a, b, Decimal::from(5)).await.unwrap();

        let query = TransactionQuery::page(10, 0);
        assert_eq!(f.history.list_transactions(a, alice, &query).await.unwrap()[0].id, id);
        assert_eq!(f.history.list_transactions(b, bob, &query).await.unwrap()[0].id, id);
        assert_eq!(f.history.get_transaction(id, bob).await.unwrap().id, id);
        assert!(matches!(
            f.history.get_transaction(id, Uuid::new_v4()).await,
            Err(Error::TransactionNotFound(_))
        ));
        assert!(matches!(
            f.history.list_transactions(a, bob, &query).await,
            Err(Error::AccessDenied(_))
        ));
    }

    #[tokio::test]
    async fn test_paging_is_stable() {
        let f = fixture();
        let owner = Uuid::new_v4();
        let a = open(&f.store, owner, 100).await;
        let b = open(&f.store, owner, 0).await;

        let mut ids = Vec::new();
        for _ in 0..5 {
            ids.push(f.engine.transfer(owner, a, b, Decimal::ONE).await.unwrap());
        }
        ids.reverse();

        let first = f.history.list_transactions(a, owner, &TransactionQuery::page(2, 0)).await.unwrap();
        let second = f.history.list_transactions(a, owner, &TransactionQuery::page(2, 2)).await.unwrap();
        let third = f.history.list_transactions(a, owner, &TransactionQuery::page(2, 4)).await.unwrap();
        let paged: Vec<Uuid> = first.iter().chain(&second).chain(&third).map(|t| t.id).collect();
        assert_eq!(paged, ids);
    }

    #[tokio::test]
    async fn test_page_size_limit() {
        let f = fixture();
        let owner = Uuid::new_v4();
        let a = open(&f.store, owner, 0).await;
        assert!(matches!(
            f.history.list_transactions(a, owner, &TransactionQuery::page(101, 0)).await,
            Err(Error::Validation(_))
        ));
    }
}
