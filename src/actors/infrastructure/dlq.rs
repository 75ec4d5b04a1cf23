use actix::prelude::*;
use chrono::{DateTime, Utc};
use scylla::client::session::Session;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::metrics::Metrics;

// ============================================================================
// Dead Letter Queue Actor
// ============================================================================
//
// Holds change-feed records the projection pipeline could not apply:
// - Persistent storage of failed records, one row per (aggregate, version)
// - Queryable for manual intervention and replay
// - Metrics on failure patterns
//
// ============================================================================

pub const DEAD_LETTER_TABLE: &str = "projection_dead_letters";

pub struct DlqActor {
    session: Arc<Session>,
    metrics: Option<Arc<Metrics>>,
}

impl DlqActor {
    pub fn new(session: Arc<Session>, metrics: Option<Arc<Metrics>>) -> Self {
        Self { session, metrics }
    }

    pub async fn ensure_schema(session: &Session) -> anyhow::Result<()> {
        session
            .query_unpaged(
                "CREATE TABLE IF NOT EXISTS projection_dead_letters (
                    aggregate_id uuid,
                    version bigint,
                    kind text,
                    payload text,
                    error_message text,
                    failure_count int,
                    first_failed_at timestamp,
                    last_failed_at timestamp,
                    PRIMARY KEY (aggregate_id, version)
                )",
                &[],
            )
            .await?;

        tracing::info!(table = DEAD_LETTER_TABLE, "Dead letter table ready");
        Ok(())
    }
}

impl Actor for DlqActor {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("DlqActor started - Dead Letter Queue ready");
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("DlqActor stopped");
    }
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Message, Debug, Clone, PartialEq)]
#[rtype(result = "Result<(), String>")]
pub struct AddToDlq {
    pub aggregate_id: Uuid,
    pub version: i64,
    pub kind: String,
    pub payload: String,
    pub error_message: String,
    pub failure_count: i32,
    pub first_failed_at: DateTime<Utc>,
}

#[derive(Message)]
#[rtype(result = "Result<Vec<DlqMessage>, String>")]
pub struct GetDlqMessages {
    pub limit: i32,
}

#[derive(Message)]
#[rtype(result = "Result<DlqStats, String>")]
pub struct GetDlqStats;

#[derive(Debug, Clone)]
pub struct DlqMessage {
    pub aggregate_id: Uuid,
    pub version: i64,
    pub kind: String,
    pub payload: String,
    pub error_message: String,
    pub failure_count: i32,
    pub first_failed_at: DateTime<Utc>,
    pub last_failed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DlqStats {
    pub total_messages: i64,
    pub by_kind: HashMap<String, i64>,
}

impl DlqStats {
    /// Count dead letters per event kind
    pub fn from_kinds<I, S>(kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut stats = Self::default();
        for kind in kinds {
            stats.total_messages += 1;
            *stats.by_kind.entry(kind.into()).or_insert(0) += 1;
        }
        stats
    }
}

// ============================================================================
// Handlers
// ============================================================================

impl Handler<AddToDlq> for DlqActor {
    type Result = ResponseFuture<Result<(), String>>;

    fn handle(&mut self, msg: AddToDlq, _: &mut Self::Context) -> Self::Result {
        let session = self.session.clone();
        let metrics = self.metrics.clone();
        let now = Utc::now();

        tracing::error!(
            aggregate_id = %msg.aggregate_id,
            version = msg.version,
            kind = %msg.kind,
            error = %msg.error_message,
            failure_count = msg.failure_count,
            "Adding projection record to Dead Letter Queue"
        );

        Box::pin(async move {
            session
                .query_unpaged(
                    "INSERT INTO projection_dead_letters (
                        aggregate_id, version, kind, payload,
                        error_message, failure_count, first_failed_at, last_failed_at
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                    (
                        msg.aggregate_id,
                        msg.version,
                        &msg.kind,
                        &msg.payload,
                        &msg.error_message,
                        msg.failure_count,
                        msg.first_failed_at,
                        now,
                    ),
                )
                .await
                .map_err(|e| format!("Failed to insert into DLQ: {}", e))?;

            if let Some(metrics) = metrics {
                metrics.record_dlq_message(&msg.kind);
            }

            tracing::info!(
                aggregate_id = %msg.aggregate_id,
                version = msg.version,
                "Record stored in DLQ"
            );

            Ok(())
        })
    }
}

impl Handler<GetDlqMessages> for DlqActor {
    type Result = ResponseFuture<Result<Vec<DlqMessage>, String>>;

    fn handle(&mut self, msg: GetDlqMessages, _: &mut Self::Context) -> Self::Result {
        let session = self.session.clone();

        Box::pin(async move {
            let result = session
                .query_unpaged(
                    "SELECT aggregate_id, version, kind, payload, error_message,
                            failure_count, first_failed_at, last_failed_at
                     FROM projection_dead_letters
                     LIMIT ?",
                    (msg.limit,),
                )
                .await
                .map_err(|e| format!("Failed to query DLQ: {}", e))?;

            let rows_result = result
                .into_rows_result()
                .map_err(|e| format!("Failed to parse DLQ results: {}", e))?;
            let rows = rows_result
                .rows::<(Uuid, i64, String, String, String, i32, DateTime<Utc>, DateTime<Utc>)>()
                .map_err(|e| format!("Failed to get rows: {}", e))?;

            let mut messages = Vec::new();
            for row in rows {
                let (aggregate_id, version, kind, payload, error_message, failure_count, first_failed_at, last_failed_at) =
                    row.map_err(|e| format!("Failed to parse row: {}", e))?;

                messages.push(DlqMessage {
                    aggregate_id,
                    version,
                    kind,
                    payload,
                    error_message,
                    failure_count,
                    first_failed_at,
                    last_failed_at,
                });
            }

            Ok(messages)
        })
    }
}

impl Handler<GetDlqStats> for DlqActor {
    type Result = ResponseFuture<Result<DlqStats, String>>;

    fn handle(&mut self, _msg: GetDlqStats, _: &mut Self::Context) -> Self::Result {
        let session = self.session.clone();

        Box::pin(async move {
            let result = session
                .query_unpaged("SELECT kind FROM projection_dead_letters", &[])
                .await
                .map_err(|e| format!("Failed to scan DLQ: {}", e))?;

            let rows_result = result
                .into_rows_result()
                .map_err(|e| format!("Failed to parse DLQ results: {}", e))?;

            let kinds = rows_result
                .rows::<(String,)>()
                .map_err(|e| format!("Failed to get rows: {}", e))?
                .map(|row| row.map(|(kind,)| kind))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| format!("Failed to parse row: {}", e))?;

            Ok(DlqStats::from_kinds(kinds))
        })
    }
}
