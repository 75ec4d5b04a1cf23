use std::marker::PhantomData;
use std::sync::Arc;
use uuid::Uuid;

use super::event_log::{EventLog, EventLogError};
use crate::event_sourcing::core::{DomainEvent, EventEnvelope, EventRecord, EventSourcingError};
use crate::metrics::Metrics;

// ============================================================================
// Generic Event Store - Repository for Events
// ============================================================================
//
// This is a GENERIC event store that works with ANY event type.
//
// Type Parameter:
// - `E`: The domain event type (must implement DomainEvent trait)
//
// Responsibilities:
// 1. Assign versions expected_version+1..=expected_version+n on append
// 2. Encode events into wire records and decode them back through the
//    event type's kind registry
// 3. Translate backend outcomes into the event sourcing error taxonomy
//
// The backend (`EventLog`) owns atomicity and the conditional write.
//
// ============================================================================

pub struct EventStore<E: DomainEvent> {
    log: Arc<dyn EventLog>,
    metrics: Option<Arc<Metrics>>,
    _phantom: PhantomData<E>,
}

impl<E: DomainEvent> EventStore<E> {
    pub fn new(log: Arc<dyn EventLog>) -> Self {
        Self {
            log,
            metrics: None,
            _phantom: PhantomData,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Append events to the event store
    /// Returns the new version number after appending
    pub async fn append(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        events: &[E],
    ) -> Result<i64, EventSourcingError> {
        if events.is_empty() {
            return Ok(expected_version);
        }

        let mut records = Vec::with_capacity(events.len());
        let mut new_version = expected_version;

        for event in events {
            new_version += 1;
            let record = EventRecord::from_event(aggregate_id, new_version, event).map_err(|e| {
                EventSourcingError::TransactionFailed {
                    aggregate_id,
                    source: e.into(),
                }
            })?;
            records.push(record);
        }

        match self.log.append(&records).await {
            Ok(()) => {
                tracing::info!(
                    aggregate_id = %aggregate_id,
                    backend = self.log.backend_name(),
                    new_version = new_version,
                    event_count = records.len(),
                    "Appended events to event store"
                );

                if let Some(metrics) = &self.metrics {
                    for record in &records {
                        metrics.record_event_appended(&record.kind);
                    }
                }

                Ok(new_version)
            }
            Err(EventLogError::ConditionalCheckFailed { .. }) => {
                tracing::warn!(
                    aggregate_id = %aggregate_id,
                    expected_version = expected_version,
                    "Event collision: stream already advanced"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.append_conflicts.inc();
                }

                Err(EventSourcingError::EventCollision {
                    aggregate_id,
                    expected_version,
                })
            }
            Err(EventLogError::Unavailable(source)) => {
                tracing::error!(
                    aggregate_id = %aggregate_id,
                    error = %source,
                    "Event store transaction failed"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.append_failures.inc();
                }

                Err(EventSourcingError::TransactionFailed { aggregate_id, source })
            }
        }
    }

    /// Load all events for an aggregate, ascending by version
    pub async fn get_events(
        &self,
        aggregate_id: Uuid,
    ) -> Result<Vec<EventEnvelope<E>>, EventSourcingError> {
        let records = self
            .log
            .load(aggregate_id)
            .await
            .map_err(|e| self.hydration_failure(aggregate_id, format!("failed to read event log: {}", e)))?;

        if records.is_empty() {
            return Err(EventSourcingError::AggregateNotFound(aggregate_id));
        }

        let mut events = Vec::with_capacity(records.len());

        for (position, record) in records.iter().enumerate() {
            let expected = position as i64 + 1;
            if record.version != expected {
                return Err(self.hydration_failure(
                    aggregate_id,
                    format!("version gap: expected {} but found {}", expected, record.version),
                ));
            }

            let envelope = record.decode::<E>().map_err(|e| {
                self.hydration_failure(aggregate_id, format!("version {}: {}", record.version, e))
            })?;
            events.push(envelope);
        }

        tracing::debug!(
            aggregate_id = %aggregate_id,
            count = events.len(),
            "Loaded events for aggregate"
        );
        Ok(events)
    }

    fn hydration_failure(&self, aggregate_id: Uuid, reason: String) -> EventSourcingError {
        tracing::error!(aggregate_id = %aggregate_id, reason = %reason, "Hydration failed");
        if let Some(metrics) = &self.metrics {
            metrics.hydration_failures.inc();
        }
        EventSourcingError::Hydration { aggregate_id, reason }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::{AccountCreated, AccountEvent, Deposited, Money};
    use crate::event_sourcing::store::InMemoryEventLog;
    use async_trait::async_trait;
    use chrono::Utc;

    struct UnavailableLog;

    #[async_trait]
    impl EventLog for UnavailableLog {
        async fn append(&self, _records: &[EventRecord]) -> Result<(), EventLogError> {
            Err(EventLogError::Unavailable(anyhow::anyhow!("provisioned throughput exceeded")))
        }

        async fn load(&self, _aggregate_id: Uuid) -> Result<Vec<EventRecord>, EventLogError> {
            Err(EventLogError::Unavailable(anyhow::anyhow!("connection reset")))
        }

        fn backend_name(&self) -> &'static str {
            "unavailable"
        }
    }

    fn created(id: Uuid) -> AccountEvent {
        AccountEvent::Created(AccountCreated {
            account_id: id,
            first_name: "John".to_string(),
            last_name: "Smith".to_string(),
        })
    }

    fn deposited(id: Uuid, cents: i64, balance: i64) -> AccountEvent {
        AccountEvent::Deposited(Deposited {
            account_id: id,
            transaction_id: Uuid::new_v4(),
            amount: Money::from_cents(cents),
            balance: Money::from_cents(balance),
            occurred_at: Utc::now(),
        })
    }

    fn memory_store() -> (Arc<InMemoryEventLog>, EventStore<AccountEvent>) {
        let log = Arc::new(InMemoryEventLog::new());
        let store = EventStore::new(log.clone());
        (log, store)
    }

    #[tokio::test]
    async fn test_versions_are_gapless_across_appends() {
        let (_log, store) = memory_store();
        let id = Uuid::new_v4();

        let v = store.append(id, 0, &[created(id)]).await.unwrap();
        assert_eq!(v, 1);
        let v = store
            .append(id, 1, &[deposited(id, 100, 100), deposited(id, 50, 150)])
            .await
            .unwrap();
        assert_eq!(v, 3);

        let versions: Vec<i64> = store.get_events(id).await.unwrap().iter().map(|e| e.version).collect();
        assert_eq!(versions, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_stale_expected_version_collides_without_partial_write() {
        let (log, store) = memory_store();
        let id = Uuid::new_v4();
        store.append(id, 0, &[created(id), deposited(id, 100, 100)]).await.unwrap();

        let result = store
            .append(id, 1, &[deposited(id, 5, 105), deposited(id, 5, 110)])
            .await;

        assert!(matches!(
            result,
            Err(EventSourcingError::EventCollision { aggregate_id, expected_version: 1 }) if aggregate_id == id
        ));
        assert_eq!(log.record_count(id).await, 2);
    }

    #[tokio::test]
    async fn test_backend_failure_is_transaction_failed() {
        let store: EventStore<AccountEvent> = EventStore::new(Arc::new(UnavailableLog));
        let id = Uuid::new_v4();

        let err = store.append(id, 0, &[created(id)]).await.unwrap_err();

        match err {
            EventSourcingError::TransactionFailed { aggregate_id, source } => {
                assert_eq!(aggregate_id, id);
                assert!(source.to_string().contains("throughput"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_append_is_noop() {
        let (log, store) = memory_store();
        let id = Uuid::new_v4();

        assert_eq!(store.append(id, 4, &[]).await.unwrap(), 4);
        assert_eq!(log.record_count(id).await, 0);
    }

    #[tokio::test]
    async fn test_missing_aggregate_is_not_found() {
        let (_log, store) = memory_store();
        let id = Uuid::new_v4();

        assert!(matches!(
            store.get_events(id).await,
            Err(EventSourcingError::AggregateNotFound(missing)) if missing == id
        ));
    }

    #[tokio::test]
    async fn test_unknown_kind_is_hydration_error_naming_aggregate() {
        let (log, store) = memory_store();
        let id = Uuid::new_v4();
        log.append(&[EventRecord {
            id,
            version: 1,
            kind: "com.aws.cqrs.domain.AccountCreated".to_string(),
            event: "{}".to_string(),
        }])
        .await
        .unwrap();

        let err = store.get_events(id).await.unwrap_err();
        assert!(matches!(err, EventSourcingError::Hydration { aggregate_id, .. } if aggregate_id == id));
        assert!(err.to_string().contains(&id.to_string()));
    }

    #[tokio::test]
    async fn test_malformed_payload_is_hydration_error() {
        let (log, store) = memory_store();
        let id = Uuid::new_v4();
        log.append(&[EventRecord {
            id,
            version: 1,
            kind: "AccountCreated".to_string(),
            event: "not json".to_string(),
        }])
        .await
        .unwrap();

        assert!(matches!(
            store.get_events(id).await,
            Err(EventSourcingError::Hydration { .. })
        ));
    }

    #[tokio::test]
    async fn test_version_gap_is_hydration_error() {
        let (log, store) = memory_store();
        let id = Uuid::new_v4();
        let record = EventRecord::from_event(id, 2, &created(id)).unwrap();
        log.append(&[record]).await.unwrap();

        assert!(matches!(
            store.get_events(id).await,
            Err(EventSourcingError::Hydration { .. })
        ));
    }

    #[tokio::test]
    async fn test_read_failure_is_hydration_error() {
        let store: EventStore<AccountEvent> = EventStore::new(Arc::new(UnavailableLog));

        // An unreadable stream must not pass for a missing aggregate
        let err = store.get_events(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, EventSourcingError::Hydration { .. }));
        assert_eq!(err.status_code(), 500);
    }

    #[tokio::test]
    async fn test_metrics_count_appends_and_conflicts() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let store: EventStore<AccountEvent> =
            EventStore::new(Arc::new(InMemoryEventLog::new())).with_metrics(metrics.clone());
        let id = Uuid::new_v4();

        store.append(id, 0, &[created(id)]).await.unwrap();
        let _ = store.append(id, 0, &[created(id)]).await;

        assert_eq!(metrics.events_appended.with_label_values(&["AccountCreated"]).get(), 1);
        assert_eq!(metrics.append_conflicts.get(), 1);
    }
}
