//! Transfer engine - the only path by which money moves between accounts
//!
//! A transfer is validated completely before the store is touched, executed
//! as one `atomic_transfer`, and only then recorded in the transaction log.
//! Rejected transfers leave no record and no balance change.

use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{Account, Transaction};
use crate::ports::{AccountStore, TransactionLog};

/// Fractional digits the store can hold exactly
pub const MAX_AMOUNT_SCALE: u32 = 8;

/// Reject non-positive amounts, amounts no balance could hold and amounts
/// finer than the store can hold
pub fn validate_amount(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(Error::invalid_amount(format!("{} is not a positive amount", amount)));
    }
    if amount > Account::MAX_BALANCE {
        return Err(Error::invalid_amount(format!(
            "{} exceeds the largest supported balance",
            amount
        )));
    }
    if amount.normalize().scale() > MAX_AMOUNT_SCALE {
        return Err(Error::invalid_amount(format!(
            "at most {} decimal places are supported",
            MAX_AMOUNT_SCALE
        )));
    }
    Ok(())
}

/// Coordinates validation, the atomic balance mutation and the history append
pub struct TransferEngine {
    accounts: Arc<dyn AccountStore>,
    log: Arc<dyn TransactionLog>,
}

impl TransferEngine {
    pub fn new(accounts: Arc<dyn AccountStore>, log: Arc<dyn TransactionLog>) -> Self {
        Self { accounts, log }
    }

    /// Move `amount` from `from` to `to` on behalf of `requester`.
    ///
    /// Returns the id of the recorded transaction. `InsufficientFunds` and
    /// `AccountNotFound` from the store are returned as-is and never retried.
    /// If the balances moved but the record could not be appended, the result
    /// is `AuditWriteFailed` carrying that record; the mutation is not undone
    /// and not attempted again.
    pub async fn transfer(
        &self,
        requester: Uuid,
        from: Uuid,
        to: Uuid,
        amount: Decimal,
    ) -> Result<Uuid> {
        validate_amount(amount)?;
        if from == to {
            return Err(Error::SelfTransfer);
        }

        let source = self.owned_source(requester, from).await?;
        let destination = self
            .accounts
            .get_account(to)
            .await?
            .ok_or(Error::AccountNotFound(to))?;

        if source.currency != destination.currency {
            return Err(Error::CurrencyMismatch {
                from: source.currency,
                to: destination.currency,
            });
        }

        self.accounts.atomic_transfer(from, to, amount).await?;

        // Built after the commit so its timestamp never precedes the mutation
        let record = Transaction::completed(from, to, amount);
        match self.log.append(&record).await {
            Ok(id) => Ok(id),
            Err(e) => Err(Error::AuditWriteFailed {
                reason: e.to_string(),
                transaction: Box::new(record),
            }),
        }
    }

    async fn owned_source(&self, requester: Uuid, from: Uuid) -> Result<Account> {
        let source = self
            .accounts
            .get_account(from)
            .await?
            .ok_or(Error::AccountNotFound(from))?;
        if !source.is_owned_by(requester) {
            return Err(Error::AccessDenied(from));
        }
        Ok(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryLedger;
    use crate::domain::{StatusChange, TransactionQuery, TransactionStatus};
    use async_trait::async_trait;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    struct Fixture {
        store: Arc<InMemoryLedger>,
        engine: TransferEngine,
        owner: Uuid,
    }

    impl Fixture {
        fn new() -> Self {
            let store = Arc::new(InMemoryLedger::new());
            let engine = TransferEngine::new(store.clone(), store.clone());
            Self {
                store,
                engine,
                owner: Uuid::new_v4(),
            }
        }

        async fn account(&self, currency: &str, balance: &str) -> Uuid {
            let account = Account::new(self.owner, currency);
            self.store.create_account(&account).await.unwrap();
            let balance = dec(balance);
            if balance > Decimal::ZERO {
                self.store.credit(account.id, balance).await.unwrap();
            }
            account.id
        }

        async fn balance(&self, id: Uuid) -> Decimal {
            self.store.get_account(id).await.unwrap().unwrap().balance
        }
    }

    #[test]
    fn test_amount_validation() {
        assert!(validate_amount(dec("0.01")).is_ok());
        assert!(validate_amount(dec("0.00000001")).is_ok());
        assert!(validate_amount(dec("1.500000000")).is_ok());
        assert!(matches!(validate_amount(Decimal::ZERO), Err(Error::InvalidAmount(_))));
        assert!(matches!(validate_amount(dec("-5")), Err(Error::InvalidAmount(_))));
        assert!(matches!(validate_amount(dec("0.000000001")), Err(Error::InvalidAmount(_))));
        assert!(validate_amount(Account::MAX_BALANCE).is_ok());
        assert!(matches!(validate_amount(Decimal::MAX), Err(Error::InvalidAmount(_))));
    }

    #[tokio::test]
    async fn test_transfer_moves_funds_and_records_success() {
        let f = Fixture::new();
        let a = f.account("USD", "100.00").await;
        let b = f.account("USD", "0").await;

        let id = f.engine.transfer(f.owner, a, b, dec("30.00")).await.unwrap();

        assert_eq!(f.balance(a).await, dec("70.00"));
        assert_eq!(f.balance(b).await, dec("30.00"));
        let record = f.store.get_transaction(id).await.unwrap().unwrap();
        assert_eq!(record.status, TransactionStatus::Success);
        assert_eq!(record.amount, dec("30.00"));
        assert_eq!((record.from_account_id, record.to_account_id), (a, b));
    }

    #[tokio::test]
    async fn test_currency_mismatch_leaves_no_trace() {
        let f = Fixture::new();
        let usd = f.account("USD", "50").await;
        let eur = f.account("EUR", "0").await;

        let err = f.engine.transfer(f.owner, usd, eur, dec("10")).await.unwrap_err();
        assert!(matches!(err, Error::CurrencyMismatch { ref from, ref to } if from == "USD" && to == "EUR"));
        assert_eq!(f.balance(usd).await, dec("50"));
        assert_eq!(f.balance(eur).await, Decimal::ZERO);
        assert_eq!(f.store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_validation_precedes_lookup() {
        let f = Fixture::new();
        let a = f.account("USD", "10").await;
        let missing = Uuid::new_v4();

        assert!(matches!(
            f.engine.transfer(f.owner, a, missing, Decimal::ZERO).await,
            Err(Error::InvalidAmount(_))
        ));
        assert!(matches!(
            f.engine.transfer(f.owner, a, a, dec("1")).await,
            Err(Error::SelfTransfer)
        ));
        assert!(matches!(
            f.engine.transfer(f.owner, a, missing, dec("1")).await,
            Err(Error::AccountNotFound(id)) if id == missing
        ));
        assert!(matches!(
            f.engine.transfer(f.owner, missing, a, dec("1")).await,
            Err(Error::AccountNotFound(id)) if id == missing
        ));
    }

    #[tokio::test]
    async fn test_only_owner_can_send() {
        let f = Fixture::new();
        let a = f.account("USD", "10").await;
        let b = f.account("USD", "0").await;

        let stranger = Uuid::new_v4();
        assert!(matches!(
            f.engine.transfer(stranger, a, b, dec("1")).await,
            Err(Error::AccessDenied(id)) if id == a
        ));
        assert_eq!(f.balance(a).await, dec("10"));
    }

    #[tokio::test]
    async fn test_destination_overflow_is_rejected_whole() {
        let f = Fixture::new();
        let a = f.account("USD", "1").await;
        let b = f.account("USD", "99999999999999999999.99999999").await;

        let err = f.engine.transfer(f.owner, a, b, dec("1")).await.unwrap_err();
        assert!(matches!(err, Error::BalanceOverflow { account_id } if account_id == b));
        assert!(!err.is_retryable());

        // Nothing moved, nothing was recorded and both rows stay usable
        assert_eq!(f.balance(a).await, dec("1"));
        assert_eq!(f.balance(b).await, Account::MAX_BALANCE);
        assert_eq!(f.store.count().await.unwrap(), 0);
        f.engine.transfer(f.owner, b, a, dec("1")).await.unwrap();
        assert_eq!(f.balance(a).await, dec("2"));
    }

    #[tokio::test]
    async fn test_insufficient_funds_is_terminal() {
        let f = Fixture::new();
        let a = f.account("USD", "10.00").await;
        let b = f.account("USD", "0").await;

        let err = f.engine.transfer(f.owner, a, b, dec("10.01")).await.unwrap_err();
        assert!(matches!(err, Error::InsufficientFunds { account_id } if account_id == a));
        assert!(!err.is_retryable());
        assert_eq!(f.balance(a).await, dec("10.00"));
        assert_eq!(f.store.count().await.unwrap(), 0);
    }

    /// Log that accepts nothing; reads see an empty history
    struct BrokenLog;

    #[async_trait]
    impl TransactionLog for BrokenLog {
        async fn append(&self, _tx: &Transaction) -> Result<Uuid> {
            Err(Error::storage("log volume is read-only"))
        }
        async fn get_transaction(&self, _id: Uuid) -> Result<Option<Transaction>> {
            Ok(None)
        }
        async fn list_by_account(&self, _id: Uuid, _q: &TransactionQuery) -> Result<Vec<Transaction>> {
            Ok(Vec::new())
        }
        async fn list_all(&self) -> Result<Vec<Transaction>> {
            Ok(Vec::new())
        }
        async fn list_by_status(&self, _s: TransactionStatus) -> Result<Vec<Transaction>> {
            Ok(Vec::new())
        }
        async fn count_pending_for_account(&self, _id: Uuid) -> Result<u64> {
            Ok(0)
        }
        async fn count(&self) -> Result<u64> {
            Ok(0)
        }
        async fn update_status(&self, id: Uuid, _s: TransactionStatus) -> Result<StatusChange> {
            Err(Error::TransactionNotFound(id))
        }
    }

    #[tokio::test]
    async fn test_audit_failure_reports_committed_delta() {
        let f = Fixture::new();
        let a = f.account("USD", "40").await;
        let b = f.account("USD", "0").await;
        let engine = TransferEngine::new(f.store.clone(), Arc::new(BrokenLog));

        let err = engine.transfer(f.owner, a, b, dec("15")).await.unwrap_err();
        let (transaction, reason) = match err {
            Error::AuditWriteFailed { transaction, reason } => (transaction, reason),
            other => panic!("expected AuditWriteFailed, got {other:?}"),
        };
        assert!(reason.contains("read-only"));
        assert_eq!(transaction.amount, dec("15"));
        assert_eq!((transaction.from_account_id, transaction.to_account_id), (a, b));
        assert_eq!(transaction.status, TransactionStatus::Success);

        // Money moved exactly once
        assert_eq!(f.balance(a).await, dec("25"));
        assert_eq!(f.balance(b).await, dec("15"));
    }
}
