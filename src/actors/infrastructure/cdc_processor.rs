use actix::prelude::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scylla::client::session::Session;
use scylla_cdc::consumer::{CDCRow, Consumer, ConsumerFactory, OperationType};
use scylla_cdc::log_reader::{CDCLogReader, CDCLogReaderBuilder};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use super::dlq::AddToDlq;
use crate::event_sourcing::core::{DomainEvent, EventRecord};
use crate::event_sourcing::store::EVENT_STORE_TABLE;
use crate::projection::ProjectionBus;
use crate::utils::{retry_on_transient, RetryConfig, RetryResult};

// ============================================================================
// CDC Stream Processor Actor - Uses real ScyllaDB CDC streams
// ============================================================================
//
// Streams inserts on the event_store table into the projection bus:
//
// 1. TRUE STREAMING: No polling, records arrive as they're committed
// 2. GENERATION HANDLING: scylla-cdc follows CDC generation changes
// 3. ORDERED DELIVERY: one aggregate is one partition, so its records sit in
//    a single CDC stream in version order
//
// Each row is dispatched with retry. When a row still fails, its aggregate is
// poisoned for the lifetime of the consumer: the row and every later row of
// that aggregate go to the dead letter queue instead of being applied out of
// order on top of a gap.
//
// ============================================================================

/// Columns of an inserted event_store row, each `None` when unreadable
#[derive(Debug, Default, Clone)]
pub(crate) struct RowColumns {
    pub id: Option<Uuid>,
    pub version: Option<i64>,
    pub kind: Option<String>,
    pub event: Option<String>,
}

/// Whatever could be salvaged from a row that is not a valid record
#[derive(Debug, Clone)]
pub(crate) struct UnreadableRow {
    pub aggregate_id: Option<Uuid>,
    pub version: i64,
    pub kind: String,
    pub event: String,
    pub reason: String,
}

impl RowColumns {
    pub fn into_record(self) -> Result<EventRecord, UnreadableRow> {
        match self {
            RowColumns {
                id: Some(id),
                version: Some(version),
                kind: Some(kind),
                event: Some(event),
            } => Ok(EventRecord { id, version, kind, event }),
            columns => {
                let missing: Vec<&str> = [
                    ("id", columns.id.is_none()),
                    ("version", columns.version.is_none()),
                    ("kind", columns.kind.is_none()),
                    ("event", columns.event.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, absent)| absent.then_some(name))
                .collect();

                Err(UnreadableRow {
                    aggregate_id: columns.id,
                    version: columns.version.unwrap_or(0),
                    kind: columns.kind.unwrap_or_default(),
                    event: columns.event.unwrap_or_default(),
                    reason: format!("Missing or invalid {}", missing.join(", ")),
                })
            }
        }
    }
}

/// Projects CDC rows of one group of streams
pub(crate) struct ProjectionConsumer<E: DomainEvent> {
    bus: Arc<ProjectionBus<E>>,
    dead_letters: Option<Recipient<AddToDlq>>,
    retry_config: RetryConfig,
    poisoned: HashSet<Uuid>,
}

impl<E: DomainEvent> ProjectionConsumer<E> {
    pub fn new(bus: Arc<ProjectionBus<E>>, dead_letters: Option<Recipient<AddToDlq>>, retry_config: RetryConfig) -> Self {
        Self {
            bus,
            dead_letters,
            retry_config,
            poisoned: HashSet::new(),
        }
    }

    /// Read the event_store columns of an inserted row
    fn extract_columns(data: &CDCRow<'_>) -> Option<RowColumns> {
        if !matches!(data.operation, OperationType::RowInsert) {
            tracing::debug!(cdc_operation = %data.operation, "Skipping non-insert CDC operation");
            return None;
        }

        Some(RowColumns {
            id: data.get_value("id").as_ref().and_then(|v| v.as_uuid()),
            version: data.get_value("version").as_ref().and_then(|v| v.as_bigint()),
            kind: data.get_value("kind").as_ref().and_then(|v| v.as_text()).map(|s| s.to_string()),
            event: data.get_value("event").as_ref().and_then(|v| v.as_text()).map(|s| s.to_string()),
        })
    }

    /// Dead-letter a row that could not be rebuilt into a record
    ///
    /// With a readable id the aggregate is poisoned like after a failed
    /// projection, so its later rows are parked behind this one.
    pub async fn park_unreadable(&mut self, row: UnreadableRow) {
        let Some(aggregate_id) = row.aggregate_id else {
            tracing::error!(reason = %row.reason, "Unreadable event_store CDC row without an id, skipping");
            return;
        };

        tracing::error!(
            aggregate_id = %aggregate_id,
            version = row.version,
            reason = %row.reason,
            "Unreadable event_store CDC row, poisoning aggregate and sending to DLQ"
        );
        self.poisoned.insert(aggregate_id);

        let record = EventRecord {
            id: aggregate_id,
            version: row.version,
            kind: row.kind,
            event: row.event,
        };
        self.dead_letter(&record, row.reason, 1, Utc::now()).await;
    }

    pub async fn process_record(&mut self, record: EventRecord) {
        if self.poisoned.contains(&record.id) {
            tracing::warn!(
                aggregate_id = %record.id,
                version = record.version,
                "Aggregate has a dead-lettered record, parking this one behind it"
            );
            self.dead_letter(
                &record,
                "an earlier record of this aggregate is in the dead letter queue".to_string(),
                0,
                Utc::now(),
            )
            .await;
            return;
        }

        let first_failed_at = Utc::now();
        let bus = &self.bus;
        let result = retry_on_transient(self.retry_config.clone(), |attempt| {
            let record = &record;
            async move {
                tracing::debug!(attempt = attempt, aggregate_id = %record.id, version = record.version, "Projecting CDC record");
                bus.dispatch_record(record).await
            }
        })
        .await;

        let (error, attempts) = match result {
            RetryResult::Success(_) => return,
            RetryResult::Failed(e) => (e, self.retry_config.max_attempts as i32),
            RetryResult::PermanentFailure(e) => (e, 1),
        };

        tracing::error!(
            aggregate_id = %record.id,
            version = record.version,
            kind = %record.kind,
            error = %error,
            "Projection failed, poisoning aggregate and sending to DLQ"
        );
        self.poisoned.insert(record.id);
        self.dead_letter(&record, error.to_string(), attempts, first_failed_at).await;
    }

    async fn dead_letter(&self, record: &EventRecord, error_message: String, failure_count: i32, first_failed_at: DateTime<Utc>) {
        let Some(dlq) = &self.dead_letters else {
            tracing::error!(
                aggregate_id = %record.id,
                version = record.version,
                "No dead letter queue configured, dropping record"
            );
            return;
        };

        let message = AddToDlq {
            aggregate_id: record.id,
            version: record.version,
            kind: record.kind.clone(),
            payload: record.event.clone(),
            error_message,
            failure_count,
            first_failed_at,
        };

        match dlq.send(message).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(aggregate_id = %record.id, error = %e, "DLQ rejected record"),
            Err(e) => tracing::error!(aggregate_id = %record.id, error = %e, "DLQ actor unreachable"),
        }
    }
}

#[async_trait]
impl<E: DomainEvent> Consumer for ProjectionConsumer<E> {
    async fn consume_cdc(&mut self, data: CDCRow<'_>) -> anyhow::Result<()> {
        tracing::debug!(
            stream_id = ?data.stream_id,
            operation = %data.operation,
            "Received CDC row"
        );

        let Some(columns) = Self::extract_columns(&data) else {
            return Ok(());
        };

        match columns.into_record() {
            Ok(record) => self.process_record(record).await,
            Err(row) => self.park_unreadable(row).await,
        }
        Ok(())
    }
}

/// Factory for creating consumer instances
/// The scylla-cdc library will create one consumer per VNode group
pub(crate) struct ProjectionConsumerFactory<E: DomainEvent> {
    bus: Arc<ProjectionBus<E>>,
    dead_letters: Option<Recipient<AddToDlq>>,
    retry_config: RetryConfig,
}

#[async_trait]
impl<E: DomainEvent> ConsumerFactory for ProjectionConsumerFactory<E> {
    async fn new_consumer(&self) -> Box<dyn Consumer> {
        tracing::debug!("Creating new ProjectionConsumer instance");
        Box::new(ProjectionConsumer::new(
            self.bus.clone(),
            self.dead_letters.clone(),
            self.retry_config.clone(),
        ))
    }
}

// ============================================================================
// CDC Processor Actor
// ============================================================================

pub struct CdcProcessor<E: DomainEvent> {
    session: Arc<Session>,
    keyspace: String,
    factory: Arc<ProjectionConsumerFactory<E>>,
    reader: Option<CDCLogReader>,
}

impl<E: DomainEvent> CdcProcessor<E> {
    pub fn new(
        session: Arc<Session>,
        keyspace: impl Into<String>,
        bus: Arc<ProjectionBus<E>>,
        dead_letters: Option<Recipient<AddToDlq>>,
    ) -> Self {
        Self {
            session,
            keyspace: keyspace.into(),
            factory: Arc::new(ProjectionConsumerFactory {
                bus,
                dead_letters,
                retry_config: RetryConfig::for_projection(),
            }),
            reader: None,
        }
    }
}

impl<E: DomainEvent> Actor for CdcProcessor<E> {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(keyspace = %self.keyspace, table = EVENT_STORE_TABLE, "Starting CDC streaming for event store");

        let session = self.session.clone();
        let keyspace = self.keyspace.clone();
        let factory: Arc<dyn ConsumerFactory> = self.factory.clone();

        // Reads from "now" and continues until stopped
        let build = async move {
            CDCLogReaderBuilder::new()
                .session(session)
                .keyspace(&keyspace)
                .table_name(EVENT_STORE_TABLE)
                .consumer_factory(factory)
                .build()
                .await
        };

        ctx.spawn(build.into_actor(self).map(|result, act, ctx| match result {
            Ok((reader, handle)) => {
                tracing::info!(keyspace = %act.keyspace, "CDC log reader started");
                act.reader = Some(reader);
                actix::spawn(async move {
                    match handle.await {
                        Ok(()) => tracing::info!("CDC reader completed"),
                        Err(e) => tracing::error!(error = %e, "CDC reader failed"),
                    }
                });
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to create CDC log reader");
                ctx.stop();
            }
        }));
    }

    fn stopping(&mut self, _ctx: &mut Self::Context) -> Running {
        if let Some(mut reader) = self.reader.take() {
            reader.stop();
        }
        Running::Stop
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("CdcProcessor stopped");
    }
}
