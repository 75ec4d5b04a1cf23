use std::sync::Arc;
use uuid::Uuid;

use scylladb_cqrs::domain::account::{
    Account, AccountCommand, AccountCommandHandler, AccountCreated, AccountEvent, Deposited, Money,
    OVERDRAFT_CHARGE,
};
use scylladb_cqrs::event_sourcing::{EventSourcingError, EventStore, InMemoryEventLog, Repository};

// ============================================================================
// Account lifecycle against the in-memory event log
// ============================================================================

struct Harness {
    log: Arc<InMemoryEventLog>,
    store: Arc<EventStore<AccountEvent>>,
    repository: Repository<Account>,
    handler: AccountCommandHandler,
}

fn harness() -> Harness {
    let log = Arc::new(InMemoryEventLog::new());
    let store = Arc::new(EventStore::new(log.clone()));
    let repository = Repository::new(store.clone(), Arc::new(Account::default));
    let handler = AccountCommandHandler::new(repository.clone());
    Harness {
        log,
        store,
        repository,
        handler,
    }
}

fn money(s: &str) -> Money {
    s.parse().unwrap()
}

#[tokio::test]
async fn test_open_account_persists_one_created_event() {
    let h = harness();
    let id = Uuid::new_v4();

    let version = h.handler.open(id, "John", "Smith").await.unwrap();
    assert_eq!(version, 1);

    let events = h.store.get_events(id).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].version, 1);
    assert_eq!(events[0].kind, "AccountCreated");

    let account = h.repository.get_by_id(id).await.unwrap();
    assert_eq!(account.expected_version(), 1);
    assert_eq!(account.state().balance(), Money::ZERO);
    assert_eq!(account.state().owner(), ("John", "Smith"));
}

#[tokio::test]
async fn test_deposit_records_resulting_balance() {
    let h = harness();
    let id = Uuid::new_v4();
    h.handler.open(id, "John", "Smith").await.unwrap();

    let version = h.handler.deposit(id, money("100.00")).await.unwrap();
    assert_eq!(version, 2);

    let events = h.store.get_events(id).await.unwrap();
    assert_eq!(events[1].version, 2);
    match &events[1].event_data {
        AccountEvent::Deposited(e) => {
            assert_eq!(e.amount, money("100.00"));
            assert_eq!(e.balance, money("100.00"));
        }
        other => panic!("expected Deposited, got {other:?}"),
    }
}

#[tokio::test]
async fn test_withdraw_from_zero_overdraws_with_service_charge() {
    let h = harness();
    let id = Uuid::new_v4();
    h.handler.open(id, "John", "Smith").await.unwrap();

    let version = h.handler.withdraw(id, money("12.55")).await.unwrap();
    assert_eq!(version, 3);

    let events = h.store.get_events(id).await.unwrap();
    assert_eq!(events.len(), 3);

    let transaction_id = match &events[1].event_data {
        AccountEvent::Withdrew(e) => {
            assert_eq!(events[1].version, 2);
            assert_eq!(e.amount, money("12.55"));
            assert_eq!(e.balance, money("-12.55"));
            e.transaction_id
        }
        other => panic!("expected Withdrew, got {other:?}"),
    };

    match &events[2].event_data {
        AccountEvent::Overdrawn(e) => {
            assert_eq!(events[2].version, 3);
            assert_eq!(e.service_charge, OVERDRAFT_CHARGE);
            assert_eq!(e.service_charge, money("10"));
            assert_eq!(e.balance, money("-22.55"));
            assert_eq!(e.transaction_id, transaction_id);
        }
        other => panic!("expected Overdrawn, got {other:?}"),
    }

    let account = h.repository.get_by_id(id).await.unwrap();
    assert_eq!(account.state().balance(), money("-22.55"));
}

#[tokio::test]
async fn test_withdraw_within_balance_does_not_overdraw() {
    let h = harness();
    let id = Uuid::new_v4();
    h.handler.open(id, "John", "Smith").await.unwrap();
    h.handler.deposit(id, money("100")).await.unwrap();
    h.handler.withdraw(id, money("12.55")).await.unwrap();

    let events = h.store.get_events(id).await.unwrap();
    assert_eq!(events.len(), 3);
    assert!(events
        .iter()
        .all(|e| !matches!(e.event_data, AccountEvent::Overdrawn(_))));

    let account = h.repository.get_by_id(id).await.unwrap();
    assert_eq!(account.state().balance(), money("87.45"));
}

#[tokio::test]
async fn test_concurrent_save_loses_with_event_collision() {
    let h = harness();
    let id = Uuid::new_v4();
    h.handler.open(id, "John", "Smith").await.unwrap();

    let mut first = h.repository.get_by_id(id).await.unwrap();
    let mut second = h.repository.get_by_id(id).await.unwrap();
    assert_eq!(first.expected_version(), 1);
    assert_eq!(second.expected_version(), 1);

    first
        .execute(&AccountCommand::Deposit { amount: money("5") })
        .unwrap();
    second
        .execute(&AccountCommand::Withdraw { amount: money("50") })
        .unwrap();

    assert_eq!(h.repository.save(&mut first).await.unwrap(), 2);

    let err = h.repository.save(&mut second).await.unwrap_err();
    assert!(matches!(
        err,
        EventSourcingError::EventCollision { aggregate_id, expected_version: 1 } if aggregate_id == id
    ));
    assert_eq!(err.status_code(), 409);

    // Nothing of the losing save was persisted
    assert_eq!(h.log.record_count(id).await, 2);
    let account = h.repository.get_by_id(id).await.unwrap();
    assert_eq!(account.state().balance(), money("5"));
}

#[tokio::test]
async fn test_versions_are_contiguous_across_saves() {
    let h = harness();
    let id = Uuid::new_v4();
    h.handler.open(id, "John", "Smith").await.unwrap();
    h.handler.deposit(id, money("1")).await.unwrap();
    h.handler.withdraw(id, money("3")).await.unwrap();
    h.handler.deposit(id, money("20")).await.unwrap();

    let versions: Vec<i64> = h
        .store
        .get_events(id)
        .await
        .unwrap()
        .iter()
        .map(|e| e.version)
        .collect();
    assert_eq!(versions, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_multi_event_append_is_all_or_nothing() {
    let h = harness();
    let id = Uuid::new_v4();
    h.handler.open(id, "John", "Smith").await.unwrap();

    let deposit = |balance: i64| {
        AccountEvent::Deposited(Deposited {
            account_id: id,
            transaction_id: Uuid::new_v4(),
            amount: Money::from_units(1),
            balance: Money::from_units(balance),
            occurred_at: chrono::Utc::now(),
        })
    };

    // Version 2 is free but version 1 is taken, so neither may land
    let err = h
        .store
        .append(id, 0, &[deposit(1), deposit(2)])
        .await
        .unwrap_err();
    assert!(matches!(err, EventSourcingError::EventCollision { .. }));
    assert_eq!(h.log.record_count(id).await, 1);

    let version = h.store.append(id, 1, &[deposit(1), deposit(2)]).await.unwrap();
    assert_eq!(version, 3);
    assert_eq!(h.log.record_count(id).await, 3);
}

#[tokio::test]
async fn test_save_without_changes_is_a_no_op() {
    let h = harness();
    let id = Uuid::new_v4();
    h.handler.open(id, "John", "Smith").await.unwrap();

    let mut account = h.repository.get_by_id(id).await.unwrap();
    assert_eq!(h.repository.save(&mut account).await.unwrap(), 1);
    assert_eq!(h.repository.save(&mut account).await.unwrap(), 1);
    assert_eq!(h.log.record_count(id).await, 1);
}

#[tokio::test]
async fn test_save_twice_commits_once() {
    let h = harness();
    let id = Uuid::new_v4();
    let mut account = h.repository.create(id);
    account
        .execute(&AccountCommand::Open {
            account_id: id,
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
        })
        .unwrap();

    assert_eq!(h.repository.save(&mut account).await.unwrap(), 1);
    assert!(!account.has_uncommitted_changes());
    assert_eq!(h.repository.save(&mut account).await.unwrap(), 1);
    assert_eq!(h.log.record_count(id).await, 1);
}

#[tokio::test]
async fn test_replay_rebuilds_identical_state() {
    let h = harness();
    let id = Uuid::new_v4();
    h.handler.open(id, "John", "Smith").await.unwrap();
    h.handler.deposit(id, money("40")).await.unwrap();
    h.handler.withdraw(id, money("55.10")).await.unwrap();

    let first = h.repository.get_by_id(id).await.unwrap();
    let second = h.repository.get_by_id(id).await.unwrap();
    assert_eq!(first.state(), second.state());
    assert_eq!(first.expected_version(), second.expected_version());
    assert_eq!(first.state().balance(), money("-25.10"));
}

#[tokio::test]
async fn test_unknown_account_is_not_found() {
    let h = harness();
    let id = Uuid::new_v4();

    let err = h.repository.get_by_id(id).await.unwrap_err();
    assert!(matches!(err, EventSourcingError::AggregateNotFound(missing) if missing == id));
    assert_eq!(err.status_code(), 404);

    let err = h.handler.deposit(id, money("1")).await.unwrap_err();
    assert!(matches!(err, EventSourcingError::AggregateNotFound(_)));
}

#[tokio::test]
async fn test_non_positive_amounts_are_rejected_before_any_event() {
    let h = harness();
    let id = Uuid::new_v4();
    h.handler.open(id, "John", "Smith").await.unwrap();

    for amount in [Money::ZERO, money("-5")] {
        let err = h.handler.deposit(id, amount).await.unwrap_err();
        assert!(matches!(err, EventSourcingError::InvalidArgument(_)));
        assert_eq!(err.status_code(), 400);

        let err = h.handler.withdraw(id, amount).await.unwrap_err();
        assert!(matches!(err, EventSourcingError::InvalidArgument(_)));
    }

    assert_eq!(h.log.record_count(id).await, 1);
}

#[tokio::test]
async fn test_opening_an_existing_id_collides() {
    let h = harness();
    let id = Uuid::new_v4();
    h.handler.open(id, "John", "Smith").await.unwrap();

    let err = h.handler.open(id, "Jane", "Doe").await.unwrap_err();
    assert!(matches!(err, EventSourcingError::EventCollision { .. }));

    let events = h.store.get_events(id).await.unwrap();
    assert_eq!(
        events[0].event_data,
        AccountEvent::Created(AccountCreated {
            account_id: id,
            first_name: "John".to_string(),
            last_name: "Smith".to_string(),
        })
    );
}

#[tokio::test]
async fn test_deposit_beyond_the_balance_range_is_rejected() {
    let h = harness();
    let id = Uuid::new_v4();
    h.handler.open(id, "John", "Smith").await.unwrap();
    h.handler.deposit(id, money("0.01")).await.unwrap();

    let err = h
        .handler
        .deposit(id, money("92233720368547758.07"))
        .await
        .unwrap_err();
    assert!(matches!(err, EventSourcingError::InvalidArgument(_)));
    assert_eq!(err.status_code(), 400);

    assert_eq!(h.log.record_count(id).await, 2);
    let account = h.repository.get_by_id(id).await.unwrap();
    assert_eq!(account.state().balance(), money("0.01"));
}
