//! Transfer engine properties against a seeded database, in memory and
//! as a file shared by several connections

use std::collections::HashSet;
use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use demo_bank::api::AppState;
use demo_bank::domain::{Account, AccountId, Direction, DomainError};
use demo_bank::handlers::{CreateUserCommand, CreateUserHandler, TransferHandler};
use demo_bank::store::{AccountStore, TransactionLog};
use demo_bank::{AppError, OperationContext};

mod common;

const CLIENT1: AccountId = 3;
const CLIENT2: AccountId = 4;
const CLIENT3: AccountId = 5;

fn handler(state: &AppState) -> TransferHandler {
    TransferHandler::new(state.pool.clone(), state.config.max_transfer_amount)
}

async fn balance_of(accounts: &AccountStore, id: AccountId) -> Decimal {
    accounts.find_by_id(id).await.unwrap().unwrap().balance.value()
}

#[tokio::test]
async fn test_example_scenario() {
    let state = common::setup_state().await;
    let accounts = AccountStore::new(state.pool.clone());

    let result = handler(&state)
        .transfer(CLIENT1, "ACC1002", dec!(2500.50), None)
        .await
        .unwrap();

    assert_eq!(result.new_balance.value(), dec!(7499.50));
    assert_eq!(balance_of(&accounts, CLIENT1).await, dec!(7499.50));
    assert_eq!(balance_of(&accounts, CLIENT2).await, dec!(12500.50));
}

#[tokio::test]
async fn test_rejected_scenario_leaves_no_trace() {
    let state = common::setup_state().await;
    let accounts = AccountStore::new(state.pool.clone());
    let log = TransactionLog::new(state.pool.clone());

    let err = handler(&state)
        .transfer(CLIENT1, "ACC1002", dec!(999999999), None)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Domain(DomainError::InvalidAmount(_))));
    assert_eq!(balance_of(&accounts, CLIENT1).await, dec!(10000));
    assert_eq!(balance_of(&accounts, CLIENT2).await, dec!(10000));
    assert_eq!(log.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_conservation_over_mixed_outcomes() {
    let state = common::setup_state().await;
    let accounts = AccountStore::new(state.pool.clone());
    let engine = handler(&state);
    let total_before = accounts.total_balance().await.unwrap();

    let attempts = [
        (CLIENT1, "ACC1002", dec!(100.25)),
        (CLIENT2, "ACC1003", dec!(50000)),
        (CLIENT3, "ACC1003", dec!(1)),
        (CLIENT3, "+79000000001", dec!(999.99)),
        (CLIENT1, "ACC0000", dec!(1)),
        (CLIENT2, "ACC1001", dec!(0.01)),
    ];
    let mut committed = 0;
    for (sender, key, amount) in attempts {
        if engine.transfer(sender, key, amount, None).await.is_ok() {
            committed += 1;
        }
    }

    assert_eq!(committed, 3);
    assert_eq!(accounts.total_balance().await.unwrap(), total_before);
    assert_eq!(
        TransactionLog::new(state.pool.clone()).count().await.unwrap(),
        committed
    );
}

/// 30 x 500.00 against a 10000.00 balance: exactly 20 fit
async fn assert_concurrent_debits_never_overdraw(state: &AppState) {
    let accounts = AccountStore::new(state.pool.clone());
    let engine = Arc::new(handler(state));
    let total_before = accounts.total_balance().await.unwrap();

    let mut tasks = Vec::new();
    for i in 0..30 {
        let engine = Arc::clone(&engine);
        let recipient = format!("ACC{}", 1002 + (i % 9));
        tasks.push(tokio::spawn(async move {
            engine.transfer(CLIENT1, &recipient, dec!(500), None).await
        }));
    }

    let mut committed = 0;
    let mut insufficient = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => committed += 1,
            Err(AppError::Domain(DomainError::InsufficientFunds { .. })) => insufficient += 1,
            Err(other) => panic!("unexpected error: {}", other),
        }
    }

    assert_eq!(committed, 20);
    assert_eq!(insufficient, 10);
    assert_eq!(balance_of(&accounts, CLIENT1).await, Decimal::ZERO);
    assert_eq!(accounts.total_balance().await.unwrap(), total_before);
    assert_eq!(TransactionLog::new(state.pool.clone()).count().await.unwrap(), 20);
}

async fn assert_opposing_transfers_conserve_money(state: &AppState) {
    let accounts = AccountStore::new(state.pool.clone());
    let engine = Arc::new(handler(state));

    let mut tasks = Vec::new();
    for i in 0..20 {
        let engine = Arc::clone(&engine);
        tasks.push(tokio::spawn(async move {
            if i % 2 == 0 {
                engine.transfer(CLIENT1, "ACC1002", dec!(123.45), None).await
            } else {
                engine.transfer(CLIENT2, "ACC1001", dec!(23.45), None).await
            }
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(balance_of(&accounts, CLIENT1).await, dec!(9000));
    assert_eq!(balance_of(&accounts, CLIENT2).await, dec!(11000));
    assert_eq!(
        balance_of(&accounts, CLIENT1).await + balance_of(&accounts, CLIENT2).await,
        dec!(20000)
    );
}

/// Run one create per login concurrently and return the outcomes
async fn create_concurrently(
    state: &AppState,
    logins: Vec<String>,
) -> Vec<Result<Account, AppError>> {
    let context = OperationContext::new();

    let mut tasks = Vec::new();
    for login in logins {
        let handler = CreateUserHandler::new(state.pool.clone(), state.hasher.clone());
        let context = context.clone();
        tasks.push(tokio::spawn(async move {
            let command = CreateUserCommand::new(
                login,
                "secret1".to_string(),
                "Race Condition".to_string(),
                "client".to_string(),
            );
            handler.execute(command, &context).await
        }));
    }

    let mut outcomes = Vec::new();
    for task in tasks {
        outcomes.push(task.await.unwrap());
    }
    outcomes
}

async fn assert_concurrent_creates_admit_one_login(state: &AppState) {
    let logins = vec!["racer".to_string(); 5];

    let mut created = 0;
    for outcome in create_concurrently(state, logins).await {
        match outcome {
            Ok(_) => created += 1,
            Err(AppError::Domain(DomainError::DuplicateLogin(_))) => {}
            Err(other) => panic!("unexpected error: {}", other),
        }
    }

    assert_eq!(created, 1);
    assert_eq!(AccountStore::new(state.pool.clone()).count().await.unwrap(), 13);
}

#[tokio::test]
async fn test_concurrent_debits_never_overdraw() {
    let state = common::setup_state().await;
    assert_concurrent_debits_never_overdraw(&state).await;
}

#[tokio::test]
async fn test_concurrent_opposing_transfers_conserve_money() {
    let state = common::setup_state().await;
    assert_opposing_transfers_conserve_money(&state).await;
}

#[tokio::test]
async fn test_concurrent_creates_admit_one_login() {
    let state = common::setup_state().await;
    assert_concurrent_creates_admit_one_login(&state).await;
}

// Same properties on a database file shared by several pooled connections

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_debits_never_overdraw_across_connections() {
    let (_dir, state) = common::setup_file_state().await;
    assert_concurrent_debits_never_overdraw(&state).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_opposing_transfers_conserve_money_across_connections() {
    let (_dir, state) = common::setup_file_state().await;
    assert_opposing_transfers_conserve_money(&state).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_admit_one_login_across_connections() {
    let (_dir, state) = common::setup_file_state().await;
    assert_concurrent_creates_admit_one_login(&state).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_distinct_creates_all_succeed_across_connections() {
    let (_dir, state) = common::setup_file_state().await;
    let logins = (0..8).map(|i| format!("racer{}", i)).collect();

    let mut numbers = HashSet::new();
    for outcome in create_concurrently(&state, logins).await {
        let account = outcome.unwrap();
        assert!(numbers.insert(account.account_number.unwrap()));
    }

    assert_eq!(numbers.len(), 8);
    assert_eq!(AccountStore::new(state.pool.clone()).count().await.unwrap(), 20);
}

#[tokio::test]
async fn test_history_is_relative_and_newest_first() {
    let state = common::setup_state().await;
    let engine = handler(&state);
    let log = TransactionLog::new(state.pool.clone());

    let first = engine
        .transfer(CLIENT1, "ACC1002", dec!(10), Some("first"))
        .await
        .unwrap();
    let second = engine
        .transfer(CLIENT2, "ACC1001", dec!(3), Some("second"))
        .await
        .unwrap();
    engine
        .transfer(CLIENT2, "ACC1003", dec!(1), None)
        .await
        .unwrap();

    let history = log.history(CLIENT1, 100).await.unwrap();
    assert_eq!(history.len(), 2);

    assert_eq!(history[0].id, second.transaction.id);
    assert_eq!(history[0].direction, Direction::Incoming);
    assert_eq!(history[0].counterparty, "Client 2");
    assert_eq!(history[0].counterparty_account.as_deref(), Some("ACC1002"));
    assert_eq!(history[0].description.as_deref(), Some("second"));

    assert_eq!(history[1].id, first.transaction.id);
    assert_eq!(history[1].direction, Direction::Outgoing);
    assert_eq!(history[1].amount.value(), dec!(10));

    let client2 = log.history(CLIENT2, 100).await.unwrap();
    assert_eq!(client2.len(), 3);
    assert!(client2
        .iter()
        .all(|entry| entry.sender_id == CLIENT2 || entry.receiver_id == CLIENT2));

    assert_eq!(log.history(CLIENT2, 1).await.unwrap().len(), 1);
    assert!(log.history(CLIENT3 + 5, 100).await.unwrap().is_empty());
    assert_eq!(log.count_for(CLIENT3).await.unwrap(), 1);
}
