use std::sync::Arc;
use uuid::Uuid;

use super::core::{Aggregate, AggregateRoot, EventSourcingError};
use super::store::EventStore;

// ============================================================================
// Repository - Load / Save For Any Aggregate
// ============================================================================
//
// get_by_id: history -> zero-state aggregate from the factory -> replay
// save:      uncommitted changes -> append at expected version -> mark committed
//
// Aggregates are never cached: every command cycle starts from the store.
//
// ============================================================================

/// Builds the zero state an aggregate replays its history onto
pub type AggregateFactory<A> = Arc<dyn Fn() -> A + Send + Sync>;

pub struct Repository<A: Aggregate> {
    store: Arc<EventStore<A::Event>>,
    factory: AggregateFactory<A>,
}

impl<A: Aggregate> Clone for Repository<A> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            factory: self.factory.clone(),
        }
    }
}

impl<A: Aggregate> Repository<A> {
    pub fn new(store: Arc<EventStore<A::Event>>, factory: AggregateFactory<A>) -> Self {
        Self { store, factory }
    }

    /// Start a brand new aggregate at version 0
    pub fn create(&self, id: Uuid) -> AggregateRoot<A> {
        AggregateRoot::new(id, (self.factory)())
    }

    /// Persist uncommitted changes, returning the stream version afterwards
    pub async fn save(&self, aggregate: &mut AggregateRoot<A>) -> Result<i64, EventSourcingError> {
        if !aggregate.has_uncommitted_changes() {
            return Ok(aggregate.expected_version());
        }

        let new_version = self
            .store
            .append(
                aggregate.id(),
                aggregate.expected_version(),
                aggregate.uncommitted_changes(),
            )
            .await?;

        aggregate.mark_committed();
        Ok(new_version)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<AggregateRoot<A>, EventSourcingError> {
        let history = self.store.get_events(id).await?;

        let mut aggregate = self.create(id);
        aggregate.load_from_history(history)?;

        tracing::debug!(
            aggregate_id = %id,
            version = aggregate.expected_version(),
            "Aggregate rehydrated"
        );
        Ok(aggregate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::{Account, AccountCommand, Money};
    use crate::event_sourcing::store::InMemoryEventLog;

    fn repository() -> (Arc<InMemoryEventLog>, Repository<Account>) {
        let log = Arc::new(InMemoryEventLog::new());
        let store = Arc::new(EventStore::new(log.clone()));
        (log, Repository::new(store, Arc::new(Account::default)))
    }

    fn open(id: Uuid) -> AccountCommand {
        AccountCommand::Open {
            account_id: id,
            first_name: "John".to_string(),
            last_name: "Smith".to_string(),
        }
    }

    #[tokio::test]
    async fn test_save_then_load_restores_version_and_state() {
        let (_log, repo) = repository();
        let id = Uuid::new_v4();

        let mut account = repo.create(id);
        account.execute(&open(id)).unwrap();
        assert_eq!(repo.save(&mut account).await.unwrap(), 1);
        assert!(!account.has_uncommitted_changes());

        let loaded = repo.get_by_id(id).await.unwrap();
        assert_eq!(loaded.expected_version(), 1);
        assert_eq!(loaded.state().balance(), Money::ZERO);
        assert!(!loaded.has_uncommitted_changes());
    }

    #[tokio::test]
    async fn test_save_without_changes_skips_append() {
        let (log, repo) = repository();
        let id = Uuid::new_v4();

        let mut account = repo.create(id);
        assert_eq!(repo.save(&mut account).await.unwrap(), 0);
        assert_eq!(log.record_count(id).await, 0);
    }

    #[tokio::test]
    async fn test_saving_twice_appends_once() {
        let (log, repo) = repository();
        let id = Uuid::new_v4();

        let mut account = repo.create(id);
        account.execute(&open(id)).unwrap();
        repo.save(&mut account).await.unwrap();
        repo.save(&mut account).await.unwrap();

        assert_eq!(log.record_count(id).await, 1);
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let (_log, repo) = repository();

        assert!(matches!(
            repo.get_by_id(Uuid::new_v4()).await,
            Err(EventSourcingError::AggregateNotFound(_))
        ));
    }
}
