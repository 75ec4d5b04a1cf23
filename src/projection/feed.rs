use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use uuid::Uuid;

use super::bus::{DispatchReport, ProjectionBus};
use crate::event_sourcing::core::{DomainEvent, EventRecord};

// ============================================================================
// In-Process Change Feed
// ============================================================================
//
// Routes batches committed to the in-memory event log into the projection
// bus. Every aggregate gets its own lane: a task that projects that
// aggregate's batches one after another, in commit order. Lanes run
// independently, so a handler stuck on one aggregate only holds up that
// aggregate.
//
//   log ──> router ──┬──> lane(a) ──> bus
//                    └──> lane(b) ──> bus
//
// Runs until the log (the sender) is dropped, then lets every lane drain.
//
// ============================================================================

/// Totals over the lifetime of one feed
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FeedSummary {
    pub batches: usize,
    /// Aggregates that got a lane
    pub lanes: usize,
    pub handled: usize,
    pub unhandled: usize,
    pub failed: usize,
}

impl FeedSummary {
    fn absorb(&mut self, report: &DispatchReport) {
        self.handled += report.handled;
        self.unhandled += report.unhandled;
        self.failed += report.failures.len();
    }
}

pub async fn run_change_feed<E: DomainEvent>(
    mut changes: mpsc::Receiver<Vec<EventRecord>>,
    bus: Arc<ProjectionBus<E>>,
) -> FeedSummary {
    let mut summary = FeedSummary::default();
    let mut lanes: HashMap<Uuid, mpsc::UnboundedSender<Vec<EventRecord>>> = HashMap::new();
    let mut workers = JoinSet::new();
    tracing::info!("Change feed started");

    while let Some(batch) = changes.recv().await {
        summary.batches += 1;

        for (aggregate_id, records) in split_by_aggregate(batch) {
            let lane = lanes.entry(aggregate_id).or_insert_with(|| {
                let (sender, receiver) = mpsc::unbounded_channel();
                workers.spawn(run_lane(aggregate_id, receiver, bus.clone()));
                sender
            });

            if lane.send(records).is_err() {
                tracing::error!(aggregate_id = %aggregate_id, "Projection lane is gone, batch not projected");
            }
        }
    }

    // Closing the senders lets each lane finish its backlog and return
    summary.lanes = lanes.len();
    drop(lanes);

    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok(report) => summary.absorb(&report),
            Err(e) => tracing::error!(error = %e, "Projection lane panicked"),
        }
    }

    tracing::info!(
        batches = summary.batches,
        lanes = summary.lanes,
        failed = summary.failed,
        "Change feed closed"
    );
    summary
}

async fn run_lane<E: DomainEvent>(
    aggregate_id: Uuid,
    mut batches: mpsc::UnboundedReceiver<Vec<EventRecord>>,
    bus: Arc<ProjectionBus<E>>,
) -> DispatchReport {
    let mut totals = DispatchReport::default();

    while let Some(batch) = batches.recv().await {
        let report = bus.dispatch_batch(batch).await;
        if !report.is_clean() {
            tracing::warn!(
                aggregate_id = %aggregate_id,
                failures = report.failures.len(),
                handled = report.handled,
                "Change feed batch projected with failures"
            );
        }
        totals.merge(report);
    }

    totals
}

/// Group a batch by aggregate, keeping each aggregate's records in order
fn split_by_aggregate(batch: Vec<EventRecord>) -> HashMap<Uuid, Vec<EventRecord>> {
    let mut groups: HashMap<Uuid, Vec<EventRecord>> = HashMap::new();
    for record in batch {
        groups.entry(record.id).or_default().push(record);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::{AccountCreated, AccountEvent, Deposited, Money};
    use crate::event_sourcing::core::EventEnvelope;
    use crate::event_sourcing::store::{EventLog, InMemoryEventLog};
    use crate::projection::ProjectionHandler;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::time::Duration;
    use tokio::sync::Mutex;

    /// Records (id, version); never returns for the stalled aggregate
    struct Recorder {
        stalled: Option<Uuid>,
        seen: Mutex<Vec<(Uuid, i64)>>,
    }

    impl Recorder {
        fn new(stalled: Option<Uuid>) -> Arc<Self> {
            Arc::new(Self {
                stalled,
                seen: Mutex::new(Vec::new()),
            })
        }

        async fn versions_of(&self, id: Uuid) -> Vec<i64> {
            self.seen.lock().await.iter().filter(|(a, _)| *a == id).map(|(_, v)| *v).collect()
        }
    }

    #[async_trait]
    impl ProjectionHandler<AccountEvent> for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        async fn handle(&self, envelope: &EventEnvelope<AccountEvent>) -> anyhow::Result<()> {
            if self.stalled == Some(envelope.aggregate_id) {
                std::future::pending::<()>().await;
            }
            self.seen.lock().await.push((envelope.aggregate_id, envelope.version));
            Ok(())
        }
    }

    fn bus_with(handler: Arc<Recorder>) -> Arc<ProjectionBus<AccountEvent>> {
        let mut bus: ProjectionBus<AccountEvent> = ProjectionBus::new();
        bus.register("AccountCreated", handler.clone());
        bus.register("Deposited", handler);
        Arc::new(bus)
    }

    fn created(id: Uuid) -> EventRecord {
        EventRecord::from_event(
            id,
            1,
            &AccountEvent::Created(AccountCreated {
                account_id: id,
                first_name: "John".to_string(),
                last_name: "Smith".to_string(),
            }),
        )
        .unwrap()
    }

    fn deposited(id: Uuid, version: i64) -> EventRecord {
        EventRecord::from_event(
            id,
            version,
            &AccountEvent::Deposited(Deposited {
                account_id: id,
                transaction_id: Uuid::new_v4(),
                amount: Money::from_units(1),
                balance: Money::from_units(version - 1),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_stalled_aggregate_does_not_hold_up_others() {
        let stalled = Uuid::new_v4();
        let healthy = Uuid::new_v4();
        let handler = Recorder::new(Some(stalled));

        let log = InMemoryEventLog::new();
        let feed = tokio::spawn(run_change_feed(log.subscribe(), bus_with(handler.clone())));

        log.append(&[created(stalled)]).await.unwrap();
        log.append(&[created(healthy)]).await.unwrap();
        log.append(&[deposited(healthy, 2)]).await.unwrap();

        let projected = tokio::time::timeout(Duration::from_secs(2), async {
            while handler.versions_of(healthy).await != vec![1, 2] {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;

        assert!(projected.is_ok(), "healthy aggregate was not projected");
        assert!(handler.versions_of(stalled).await.is_empty());
        feed.abort();
    }

    #[tokio::test]
    async fn test_lanes_keep_commit_order_and_drain_on_close() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let handler = Recorder::new(None);

        let log = InMemoryEventLog::new();
        let feed = tokio::spawn(run_change_feed(log.subscribe(), bus_with(handler.clone())));

        log.append(&[created(a)]).await.unwrap();
        log.append(&[created(b)]).await.unwrap();
        log.append(&[deposited(a, 2), deposited(a, 3)]).await.unwrap();
        log.append(&[deposited(a, 4)]).await.unwrap();
        drop(log);

        let summary = feed.await.unwrap();
        assert_eq!(summary.batches, 4);
        assert_eq!(summary.lanes, 2);
        assert_eq!(summary.handled, 5);
        assert_eq!(summary.failed, 0);

        assert_eq!(handler.versions_of(a).await, vec![1, 2, 3, 4]);
        assert_eq!(handler.versions_of(b).await, vec![1]);
    }
}
