use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use super::event_log::{EventLog, EventLogError};
use crate::event_sourcing::core::EventRecord;

// ============================================================================
// In-Memory Event Log
// ============================================================================
//
// Single-process backend for tests and local runs. One write lock covers the
// whole conditional check + insert, so an append is atomic and linearized
// exactly like a conditional transaction on a real store.
//
// Every committed append is published as one batch to each subscriber, which
// stands in for the storage change stream. Publishing happens under the write
// lock on bounded channels: batches reach subscribers in commit order, none
// is ever dropped, and a subscriber that falls behind slows writers down.
//
// ============================================================================

const CHANGE_FEED_CAPACITY: usize = 1024;

pub struct InMemoryEventLog {
    streams: RwLock<HashMap<Uuid, BTreeMap<i64, EventRecord>>>,
    subscribers: Mutex<Vec<mpsc::Sender<Vec<EventRecord>>>>,
    feed_capacity: usize,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::with_feed_capacity(CHANGE_FEED_CAPACITY)
    }

    /// Bound each subscriber's backlog to `capacity` batches (at least one)
    pub fn with_feed_capacity(capacity: usize) -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
            subscribers: Mutex::new(Vec::new()),
            feed_capacity: capacity.max(1),
        }
    }

    /// Receive every batch committed after this call
    ///
    /// The receiver must keep reading: once its backlog is full, appends wait
    /// for it. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> mpsc::Receiver<Vec<EventRecord>> {
        let (sender, receiver) = mpsc::channel(self.feed_capacity);
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(sender);
        receiver
    }

    pub async fn record_count(&self, aggregate_id: Uuid) -> usize {
        let streams = self.streams.read().await;
        streams.get(&aggregate_id).map(|s| s.len()).unwrap_or(0)
    }

    fn live_subscribers(&self) -> Vec<mpsc::Sender<Vec<EventRecord>>> {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        subscribers.retain(|sender| !sender.is_closed());
        subscribers.clone()
    }
}

impl Default for InMemoryEventLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    async fn append(&self, records: &[EventRecord]) -> Result<(), EventLogError> {
        let Some(first) = records.first() else {
            return Ok(());
        };
        let aggregate_id = first.id;

        if records.iter().any(|r| r.id != aggregate_id) {
            return Err(EventLogError::Unavailable(anyhow::anyhow!(
                "append spans more than one aggregate"
            )));
        }

        let mut streams = self.streams.write().await;
        let stream = streams.entry(aggregate_id).or_default();

        // Check every key before touching anything
        if records.iter().any(|r| stream.contains_key(&r.version)) {
            return Err(EventLogError::ConditionalCheckFailed { aggregate_id });
        }

        for record in records {
            stream.insert(record.version, record.clone());
        }

        // Still under the write lock, so the next append of this aggregate
        // cannot overtake this batch on the feed
        for subscriber in self.live_subscribers() {
            if subscriber.send(records.to_vec()).await.is_err() {
                tracing::debug!(aggregate_id = %aggregate_id, "Change feed subscriber went away");
            }
        }

        Ok(())
    }

    async fn load(&self, aggregate_id: Uuid) -> Result<Vec<EventRecord>, EventLogError> {
        let streams = self.streams.read().await;
        Ok(streams
            .get(&aggregate_id)
            .map(|stream| stream.values().cloned().collect())
            .unwrap_or_default())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
