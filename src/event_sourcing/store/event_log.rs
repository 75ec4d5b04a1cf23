use async_trait::async_trait;
use uuid::Uuid;

use crate::event_sourcing::core::EventRecord;

// ============================================================================
// Event Log - Storage Seam Under The Event Store
// ============================================================================
//
// The event store is generic over the events it (de)serializes; the log only
// sees wire records. Every backend must provide:
//
// 1. An atomic "insert if absent" over ALL records of one append, keyed by
//    (id, version). Either every record becomes visible or none does.
// 2. A strongly consistent read of one aggregate's records in ascending
//    version order.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum EventLogError {
    /// A record already exists at one of the target (id, version) keys
    #[error("conditional write rejected for aggregate {aggregate_id}")]
    ConditionalCheckFailed { aggregate_id: Uuid },

    #[error("event log unavailable: {0}")]
    Unavailable(#[source] anyhow::Error),
}

#[async_trait]
pub trait EventLog: Send + Sync {
    /// Persist all records as one unit, all of them for the same aggregate
    async fn append(&self, records: &[EventRecord]) -> Result<(), EventLogError>;

    /// All records of one aggregate, ascending by version
    async fn load(&self, aggregate_id: Uuid) -> Result<Vec<EventRecord>, EventLogError>;

    fn backend_name(&self) -> &'static str;
}
