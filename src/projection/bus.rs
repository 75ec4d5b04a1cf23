use async_trait::async_trait;
use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::event_sourcing::core::{DomainEvent, EventCodecError, EventEnvelope, EventRecord};
use crate::metrics::Metrics;
use crate::utils::IsTransient;

// ============================================================================
// Projection Bus - Ordered Event Dispatch To Read Models
// ============================================================================
//
// One handler per event kind. Committed records arrive in batches from a
// change feed and are dispatched:
//
// - per aggregate: strictly by ascending version, each handler awaited before
//   the next record of the same aggregate starts
// - across aggregates: concurrently
//
// A failing record stops the rest of ITS aggregate's batch (later versions
// would be applied on top of a missing one) and is reported. Other
// aggregates are unaffected.
//
// ============================================================================

/// Idempotent read-model mutation for one or more event kinds
#[async_trait]
pub trait ProjectionHandler<E: DomainEvent>: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, envelope: &EventEnvelope<E>) -> anyhow::Result<()>;
}

#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    #[error("aggregate {aggregate_id} version {version}: cannot decode record: {source}")]
    Decode {
        aggregate_id: Uuid,
        version: i64,
        #[source]
        source: EventCodecError,
    },

    #[error("aggregate {aggregate_id} version {version}: {handler} failed on {kind}: {source}")]
    Handler {
        aggregate_id: Uuid,
        version: i64,
        kind: String,
        handler: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

/// A handler may succeed on a later attempt, an undecodable record never will
impl IsTransient for ProjectionError {
    fn is_transient(&self) -> bool {
        matches!(self, ProjectionError::Handler { .. })
    }
}

/// One record that could not be projected
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchFailure {
    pub aggregate_id: Uuid,
    pub version: i64,
    pub kind: String,
    pub error: String,
    /// Records of the same aggregate left unprocessed behind this one
    pub skipped: usize,
}

/// Outcome of one batch
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DispatchReport {
    pub handled: usize,
    pub unhandled: usize,
    pub failures: Vec<DispatchFailure>,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub(crate) fn merge(&mut self, other: DispatchReport) {
        self.handled += other.handled;
        self.unhandled += other.unhandled;
        self.failures.extend(other.failures);
    }
}

pub struct ProjectionBus<E: DomainEvent> {
    handlers: HashMap<String, Arc<dyn ProjectionHandler<E>>>,
    metrics: Option<Arc<Metrics>>,
}

impl<E: DomainEvent> Default for ProjectionBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: DomainEvent> ProjectionBus<E> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Register a handler for one kind. The first registration wins.
    pub fn register(&mut self, kind: &str, handler: Arc<dyn ProjectionHandler<E>>) -> bool {
        if self.handlers.contains_key(kind) {
            tracing::warn!(kind = %kind, handler = handler.name(), "Projection handler already registered");
            return false;
        }

        tracing::debug!(kind = %kind, handler = handler.name(), "Registered projection handler");
        self.handlers.insert(kind.to_string(), handler);
        true
    }

    pub fn handles(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    /// Run the handler registered for this event's kind
    ///
    /// Ok(false) when no handler is registered for the kind.
    pub async fn dispatch(&self, envelope: &EventEnvelope<E>) -> Result<bool, ProjectionError> {
        let Some(handler) = self.handlers.get(envelope.kind.as_str()) else {
            self.note_unhandled(envelope.aggregate_id, &envelope.kind);
            return Ok(false);
        };

        let start = Instant::now();
        let result = handler.handle(envelope).await;
        let elapsed = start.elapsed().as_secs_f64();

        if let Some(metrics) = &self.metrics {
            metrics.record_projection(&envelope.kind, elapsed, result.is_ok());
        }

        result.map_err(|source| ProjectionError::Handler {
            aggregate_id: envelope.aggregate_id,
            version: envelope.version,
            kind: envelope.kind.clone(),
            handler: handler.name(),
            source,
        })?;

        tracing::debug!(
            aggregate_id = %envelope.aggregate_id,
            version = envelope.version,
            kind = %envelope.kind,
            handler = handler.name(),
            "Projected event"
        );
        Ok(true)
    }

    /// Decode a wire record and dispatch it
    ///
    /// Kinds without a handler are not decoded.
    pub async fn dispatch_record(&self, record: &EventRecord) -> Result<bool, ProjectionError> {
        if !self.handles(&record.kind) {
            self.note_unhandled(record.id, &record.kind);
            return Ok(false);
        }

        let envelope = record.decode::<E>().map_err(|source| {
            if let Some(metrics) = &self.metrics {
                metrics.record_projection_decode_failure(&record.kind);
            }
            ProjectionError::Decode {
                aggregate_id: record.id,
                version: record.version,
                source,
            }
        })?;

        self.dispatch(&envelope).await
    }

    fn note_unhandled(&self, aggregate_id: Uuid, kind: &str) {
        tracing::debug!(aggregate_id = %aggregate_id, kind = %kind, "No projection handler for kind");
        if let Some(metrics) = &self.metrics {
            metrics.record_projection_unhandled(kind);
        }
    }

    /// Dispatch a change-feed batch: ordered per aggregate, concurrent across
    pub async fn dispatch_batch(&self, records: Vec<EventRecord>) -> DispatchReport {
        let mut by_aggregate: HashMap<Uuid, Vec<EventRecord>> = HashMap::new();
        for record in records {
            by_aggregate.entry(record.id).or_default().push(record);
        }

        let runs = by_aggregate.into_values().map(|mut stream| {
            stream.sort_by_key(|r| r.version);
            self.dispatch_stream(stream)
        });

        let mut report = DispatchReport::default();
        for partial in join_all(runs).await {
            report.merge(partial);
        }
        report
    }

    async fn dispatch_stream(&self, stream: Vec<EventRecord>) -> DispatchReport {
        let mut report = DispatchReport::default();
        let total = stream.len();

        for (position, record) in stream.iter().enumerate() {
            match self.dispatch_record(record).await {
                Ok(true) => report.handled += 1,
                Ok(false) => report.unhandled += 1,
                Err(e) => {
                    let skipped = total - position - 1;
                    tracing::error!(
                        aggregate_id = %record.id,
                        version = record.version,
                        kind = %record.kind,
                        skipped = skipped,
                        error = %e,
                        "Projection failed, abandoning the rest of this aggregate's batch"
                    );
                    report.failures.push(DispatchFailure {
                        aggregate_id: record.id,
                        version: record.version,
                        kind: record.kind.clone(),
                        error: e.to_string(),
                        skipped,
                    });
                    break;
                }
            }
        }

        report
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
