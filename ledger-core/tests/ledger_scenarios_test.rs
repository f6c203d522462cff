//! End-to-end ledger scenarios
//!
//! These go through `LedgerContext` on a real DuckDB file, the same way the
//! CLI does, plus one scenario where the history store fails after the
//! balances moved.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tempfile::TempDir;
use uuid::Uuid;

use ledger_core::adapters::memory::InMemoryLedger;
use ledger_core::domain::result::Result;
use ledger_core::services::{ReconciliationService, ReplayOutcome, TransferEngine};
use ledger_core::{
    Account, AccountStore, Error, LedgerContext, OperationResult, StatusChange, Transaction,
    TransactionLog, TransactionQuery, TransactionStatus, User,
};

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

struct Fixture {
    _dir: TempDir,
    ctx: LedgerContext,
    alice: User,
    bob: User,
}

async fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let ctx = LedgerContext::new(dir.path()).unwrap();
    let alice = ctx.auth_service.register("alice", "correct horse").await.unwrap();
    let bob = ctx.auth_service.register("bob", "battery staple").await.unwrap();
    Fixture { _dir: dir, ctx, alice, bob }
}

async fn funded(f: &Fixture, owner: &User, currency: &str, amount: &str) -> Account {
    let account = f.ctx.account_service.create_account(owner.id, currency).await.unwrap();
    if dec(amount) > Decimal::ZERO {
        f.ctx
            .account_service
            .deposit(account.id, owner.id, dec(amount))
            .await
            .unwrap();
    }
    account
}

async fn balance(f: &Fixture, id: Uuid) -> Decimal {
    f.ctx.repository.get_account(id).await.unwrap().unwrap().balance
}

#[tokio::test]
async fn test_transfer_between_users_shows_on_both_sides() {
    let f = fixture().await;
    let a = funded(&f, &f.alice, "USD", "100.00").await;
    let b = funded(&f, &f.bob, "USD", "0").await;

    let tx_id = f
        .ctx
        .transfer_engine
        .transfer(f.alice.id, a.id, b.id, dec("30.00"))
        .await
        .unwrap();

    let a_now = f.ctx.account_service.get_account(a.id, f.alice.id).await.unwrap();
    let b_now = f.ctx.account_service.get_account(b.id, f.bob.id).await.unwrap();
    assert_eq!(a_now.balance, dec("70.00"));
    assert_eq!(b_now.balance, dec("30.00"));

    let query = f.ctx.default_query();
    let alice_view = f
        .ctx
        .history_service
        .list_transactions(a.id, f.alice.id, &query)
        .await
        .unwrap();
    let bob_view = f
        .ctx
        .history_service
        .list_transactions(b.id, f.bob.id, &query)
        .await
        .unwrap();
    assert_eq!(alice_view.len(), 1);
    assert_eq!(alice_view, bob_view);
    assert_eq!(alice_view[0].id, tx_id);
    assert_eq!(alice_view[0].amount, dec("30.00"));
    assert_eq!(alice_view[0].status, TransactionStatus::Success);

    // Either party can fetch it; a stranger cannot
    assert!(f.ctx.history_service.get_transaction(tx_id, f.bob.id).await.is_ok());
    assert!(matches!(
        f.ctx.history_service.get_transaction(tx_id, Uuid::new_v4()).await,
        Err(Error::TransactionNotFound(_))
    ));
}

#[tokio::test]
async fn test_rejected_transfers_leave_no_trace() {
    let f = fixture().await;
    let usd = funded(&f, &f.alice, "USD", "25.00").await;
    let eur = funded(&f, &f.bob, "EUR", "5.00").await;
    let usd_bob = funded(&f, &f.bob, "usd", "0").await;
    let engine = &f.ctx.transfer_engine;

    let mismatch = engine.transfer(f.alice.id, usd.id, eur.id, dec("1.00")).await;
    assert!(matches!(mismatch, Err(Error::CurrencyMismatch { .. })));

    let too_much = engine.transfer(f.alice.id, usd.id, usd_bob.id, dec("25.01")).await;
    assert!(matches!(too_much, Err(Error::InsufficientFunds { account_id }) if account_id == usd.id));

    let not_mine = engine.transfer(f.alice.id, usd_bob.id, usd.id, dec("1.00")).await;
    assert!(matches!(not_mine, Err(Error::AccessDenied(_))));

    let to_self = engine.transfer(f.alice.id, usd.id, usd.id, dec("1.00")).await;
    assert!(matches!(to_self, Err(Error::SelfTransfer)));

    for amount in ["0", "-5.00", "0.000000001"] {
        let bad = engine.transfer(f.alice.id, usd.id, usd_bob.id, dec(amount)).await;
        assert!(matches!(bad, Err(Error::InvalidAmount(_))), "amount {}", amount);
    }

    let missing = engine.transfer(f.alice.id, usd.id, Uuid::new_v4(), dec("1.00")).await;
    assert!(matches!(missing, Err(Error::AccountNotFound(_))));

    assert_eq!(balance(&f, usd.id).await, dec("25.00"));
    assert_eq!(balance(&f, eur.id).await, dec("5.00"));
    assert_eq!(balance(&f, usd_bob.id).await, Decimal::ZERO);
    assert_eq!(f.ctx.repository.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_history_pages_newest_first() {
    let f = fixture().await;
    let a = funded(&f, &f.alice, "USD", "100.00").await;
    let b = funded(&f, &f.bob, "USD", "0").await;

    let mut ids = Vec::new();
    for cents in 1..=5 {
        let id = f
            .ctx
            .transfer_engine
            .transfer(f.alice.id, a.id, b.id, Decimal::new(cents, 2))
            .await
            .unwrap();
        ids.push(id);
    }

    let first = f
        .ctx
        .history_service
        .list_transactions(a.id, f.alice.id, &TransactionQuery::page(2, 0))
        .await
        .unwrap();
    let rest = f
        .ctx
        .history_service
        .list_transactions(a.id, f.alice.id, &TransactionQuery::page(10, 2))
        .await
        .unwrap();

    let seen: Vec<Uuid> = first.iter().chain(rest.iter()).map(|t| t.id).collect();
    let expected: Vec<Uuid> = ids.iter().rev().copied().collect();
    assert_eq!(seen, expected);

    let too_big = TransactionQuery::page(f.ctx.config.max_page_size + 1, 0);
    assert!(f
        .ctx
        .history_service
        .list_transactions(a.id, f.alice.id, &too_big)
        .await
        .is_err());
}

#[tokio::test]
async fn test_closing_accounts() {
    let f = fixture().await;
    let a = funded(&f, &f.alice, "USD", "10.00").await;

    assert!(matches!(
        f.ctx.account_service.close_account(a.id, f.alice.id).await,
        Err(Error::AccountNotEmpty { .. })
    ));
    assert!(matches!(
        f.ctx.account_service.close_account(a.id, f.bob.id).await,
        Err(Error::AccessDenied(_))
    ));

    f.ctx.account_service.withdraw(a.id, f.alice.id, dec("10.00")).await.unwrap();
    f.ctx.account_service.close_account(a.id, f.alice.id).await.unwrap();
    assert!(matches!(
        f.ctx.account_service.get_account(a.id, f.alice.id).await,
        Err(Error::AccountNotFound(_))
    ));
}

#[tokio::test]
async fn test_login_rejects_wrong_password() {
    let f = fixture().await;
    let user = f.ctx.auth_service.authenticate("ALICE", "correct horse").await.unwrap();
    assert_eq!(user.id, f.alice.id);
    assert!(matches!(
        f.ctx.auth_service.authenticate("alice", "wrong").await,
        Err(Error::InvalidCredentials)
    ));
    assert!(matches!(
        f.ctx.auth_service.register("Alice", "another password").await,
        Err(Error::UsernameTaken(_))
    ));
}

/// History store whose appends fail while `broken` is set
struct FlakyLog {
    inner: Arc<InMemoryLedger>,
    broken: AtomicBool,
}

#[async_trait]
impl TransactionLog for FlakyLog {
    async fn append(&self, tx: &Transaction) -> Result<Uuid> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(Error::storage("history disk full"));
        }
        self.inner.append(tx).await
    }

    async fn get_transaction(&self, id: Uuid) -> Result<Option<Transaction>> {
        self.inner.get_transaction(id).await
    }

    async fn list_by_account(&self, account_id: Uuid, query: &TransactionQuery) -> Result<Vec<Transaction>> {
        self.inner.list_by_account(account_id, query).await
    }

    async fn list_all(&self) -> Result<Vec<Transaction>> {
        self.inner.list_all().await
    }

    async fn list_by_status(&self, status: TransactionStatus) -> Result<Vec<Transaction>> {
        self.inner.list_by_status(status).await
    }

    async fn count_pending_for_account(&self, account_id: Uuid) -> Result<u64> {
        self.inner.count_pending_for_account(account_id).await
    }

    async fn count(&self) -> Result<u64> {
        self.inner.count().await
    }

    async fn update_status(&self, id: Uuid, status: TransactionStatus) -> Result<StatusChange> {
        self.inner.update_status(id, status).await
    }
}

#[tokio::test]
async fn test_audit_failure_is_surfaced_and_replayable() {
    let store = Arc::new(InMemoryLedger::new());
    let log = Arc::new(FlakyLog {
        inner: store.clone(),
        broken: AtomicBool::new(true),
    });
    let engine = TransferEngine::new(store.clone(), log.clone());
    let reconciliation = ReconciliationService::new(store.clone(), log.clone());

    let owner = Uuid::new_v4();
    let a = Account::new(owner, "USD");
    let b = Account::new(owner, "USD");
    store.create_account(&a).await.unwrap();
    store.create_account(&b).await.unwrap();
    store.credit(a.id, dec("50.00")).await.unwrap();

    let err = engine.transfer(owner, a.id, b.id, dec("20.00")).await.unwrap_err();
    let record = match &err {
        Error::AuditWriteFailed { transaction, .. } => transaction.as_ref().clone(),
        other => panic!("expected an audit failure, got {}", other),
    };
    assert!(!err.is_retryable());

    // Funds moved exactly once, history is empty
    assert_eq!(store.get_account(a.id).await.unwrap().unwrap().balance, dec("30.00"));
    assert_eq!(store.get_account(b.id).await.unwrap().unwrap().balance, dec("20.00"));
    assert_eq!(log.count().await.unwrap(), 0);

    // The JSON envelope carries the record for the operator
    let failed: Result<Uuid> = Err(err);
    let envelope = OperationResult::from(failed);
    let context = envelope.context.unwrap();
    let payload = context["unrecorded_transaction"].clone();
    let from_payload: Transaction = serde_json::from_value(payload).unwrap();
    assert_eq!(from_payload, record);

    log.broken.store(false, Ordering::SeqCst);
    assert_eq!(reconciliation.replay(&from_payload).await.unwrap(), ReplayOutcome::Recorded);
    assert_eq!(reconciliation.replay(&from_payload).await.unwrap(), ReplayOutcome::AlreadyRecorded);

    // Replay never touches balances
    assert_eq!(store.get_account(a.id).await.unwrap().unwrap().balance, dec("30.00"));
    assert_eq!(log.count().await.unwrap(), 1);
    assert!(reconciliation.check().await.unwrap().is_healthy());
}
