use async_trait::async_trait;
use scylla::client::session::Session;
use scylla::statement::batch::Batch;
use scylla::statement::unprepared::Statement;
use scylla::statement::{Consistency, SerialConsistency};
use scylla::value::{CqlValue, Row};
use std::sync::Arc;
use uuid::Uuid;

use super::event_log::{EventLog, EventLogError};
use crate::event_sourcing::core::EventRecord;

// ============================================================================
// ScyllaDB Event Log
// ============================================================================
//
// Table layout (one partition per aggregate, clustered by version):
//
//   event_store (id uuid, version bigint, kind text, event text,
//                PRIMARY KEY (id, version))
//
// Appends are a single-partition batch of `INSERT ... IF NOT EXISTS`. Paxos
// applies the batch as a whole: if any row already exists, nothing is written
// and the result row reports `[applied] = false`.
//
// CDC is enabled on the table so committed rows can be streamed to the
// projection pipeline.
//
// ============================================================================

pub const EVENT_STORE_TABLE: &str = "event_store";

pub struct ScyllaEventLog {
    session: Arc<Session>,
}

impl ScyllaEventLog {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// Create the event table (CDC enabled) in the session's keyspace
    pub async fn ensure_schema(&self) -> anyhow::Result<()> {
        self.session
            .query_unpaged(
                "CREATE TABLE IF NOT EXISTS event_store (
                    id uuid,
                    version bigint,
                    kind text,
                    event text,
                    PRIMARY KEY (id, version)
                ) WITH CLUSTERING ORDER BY (version ASC)
                  AND cdc = {'enabled': true}",
                &[],
            )
            .await?;

        tracing::info!(table = EVENT_STORE_TABLE, "Event store table ready");
        Ok(())
    }
}

fn unavailable(e: impl std::error::Error + Send + Sync + 'static) -> EventLogError {
    EventLogError::Unavailable(anyhow::Error::new(e))
}

#[async_trait]
impl EventLog for ScyllaEventLog {
    async fn append(&self, records: &[EventRecord]) -> Result<(), EventLogError> {
        let Some(first) = records.first() else {
            return Ok(());
        };
        let aggregate_id = first.id;

        let mut batch = Batch::default();
        batch.set_serial_consistency(Some(SerialConsistency::Serial));
        batch.set_consistency(Consistency::Quorum);

        let mut values = Vec::with_capacity(records.len());
        for record in records {
            batch.append_statement(
                "INSERT INTO event_store (id, version, kind, event) VALUES (?, ?, ?, ?) IF NOT EXISTS",
            );
            values.push((record.id, record.version, record.kind.clone(), record.event.clone()));
        }

        let result = self.session.batch(&batch, values).await.map_err(unavailable)?;

        // LWT batches always answer with at least one row led by `[applied]`
        let rows_result = result.into_rows_result().map_err(unavailable)?;
        let applied = match rows_result.maybe_first_row::<Row>().map_err(unavailable)? {
            Some(row) => matches!(row.columns.first(), Some(Some(CqlValue::Boolean(true)))),
            None => false,
        };

        if !applied {
            tracing::debug!(
                aggregate_id = %aggregate_id,
                first_version = first.version,
                "Conditional batch not applied"
            );
            return Err(EventLogError::ConditionalCheckFailed { aggregate_id });
        }

        Ok(())
    }

    async fn load(&self, aggregate_id: Uuid) -> Result<Vec<EventRecord>, EventLogError> {
        let mut statement = Statement::new(
            "SELECT id, version, kind, event
             FROM event_store
             WHERE id = ?
             ORDER BY version ASC",
        );
        statement.set_consistency(Consistency::Quorum);

        let result = self
            .session
            .query_unpaged(statement, (aggregate_id,))
            .await
            .map_err(unavailable)?;

        let mut records = Vec::new();

        // A SELECT always returns a rows result, even an empty one
        let rows_result = result.into_rows_result().map_err(unavailable)?;

        for row in rows_result
            .rows::<(Uuid, i64, String, String)>()
            .map_err(unavailable)?
        {
            let (id, version, kind, event) = row.map_err(unavailable)?;
            records.push(EventRecord { id, version, kind, event });
        }

        tracing::debug!(
            aggregate_id = %aggregate_id,
            count = records.len(),
            "Loaded event records"
        );
        Ok(records)
    }

    fn backend_name(&self) -> &'static str {
        "scylla"
    }
}
