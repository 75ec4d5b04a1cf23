use uuid::Uuid;

use super::error::EventSourcingError;
use super::event::{DomainEvent, EventEnvelope};

// ============================================================================
// Aggregate Root Pattern - Event Sourcing Core
// ============================================================================
//
// Key Principles:
// 1. State is derived from events (not stored directly)
// 2. Commands are validated before emitting events
// 3. Events represent facts that have already happened
// 4. Replaying the same events always yields the same state
//
// `Aggregate` is the domain side: a closed event enum folded by `match`.
// `AggregateRoot` is the bookkeeping side shared by every aggregate: the
// stream id, the version loaded from history and the uncommitted changes.
//
// ============================================================================

/// Generic Aggregate trait - all event-sourced aggregates implement this
///
/// Type Parameters:
/// - `Event`: The domain event type for this aggregate
/// - `Command`: The command type for this aggregate
/// - `Error`: The error type for business rule violations
pub trait Aggregate: Clone + Sized + Send + Sync {
    type Event: DomainEvent;
    type Command;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fold one event into state. Must either fully apply or leave state untouched.
    fn apply_event(&mut self, event: &Self::Event) -> Result<(), Self::Error>;

    /// Handle command and emit events (business logic)
    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;
}

/// An aggregate instance for one load-mutate-save cycle
pub struct AggregateRoot<A: Aggregate> {
    id: Uuid,
    expected_version: i64,
    uncommitted_changes: Vec<A::Event>,
    state: A,
}

impl<A: Aggregate> AggregateRoot<A> {
    /// Zero-state aggregate at version 0
    pub fn new(id: Uuid, state: A) -> Self {
        Self {
            id,
            expected_version: 0,
            uncommitted_changes: Vec::new(),
            state,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn expected_version(&self) -> i64 {
        self.expected_version
    }

    pub fn uncommitted_changes(&self) -> &[A::Event] {
        &self.uncommitted_changes
    }

    pub fn has_uncommitted_changes(&self) -> bool {
        !self.uncommitted_changes.is_empty()
    }

    pub fn state(&self) -> &A {
        &self.state
    }

    /// Run a command against current state and record the resulting events
    ///
    /// Returns the number of events recorded. A command's events are folded
    /// into a copy of the state first: either all of them are recorded or,
    /// when the command is rejected or any fold fails, none is.
    pub fn execute(&mut self, command: &A::Command) -> Result<usize, EventSourcingError> {
        let events = self
            .state
            .handle_command(command)
            .map_err(|e| EventSourcingError::InvalidArgument(e.to_string()))?;

        let mut next = self.state.clone();
        for event in &events {
            next.apply_event(event).map_err(|e| EventSourcingError::Hydration {
                aggregate_id: self.id,
                reason: format!("failed to apply new {} event: {}", event.kind(), e),
            })?;
        }

        let count = events.len();
        self.state = next;
        self.uncommitted_changes.extend(events);
        Ok(count)
    }

    /// Fold a freshly produced event into state and queue it for the next save
    pub fn apply_new(&mut self, event: A::Event) -> Result<(), EventSourcingError> {
        self.state
            .apply_event(&event)
            .map_err(|e| EventSourcingError::Hydration {
                aggregate_id: self.id,
                reason: format!("failed to apply new {} event: {}", event.kind(), e),
            })?;

        self.uncommitted_changes.push(event);
        Ok(())
    }

    /// Rebuild state from persisted history
    ///
    /// History must continue the current version without gaps. An empty
    /// history leaves the aggregate untouched.
    pub fn load_from_history<I>(&mut self, history: I) -> Result<(), EventSourcingError>
    where
        I: IntoIterator<Item = EventEnvelope<A::Event>>,
    {
        for envelope in history {
            let next_version = self.expected_version + 1;
            if envelope.version != next_version {
                return Err(EventSourcingError::Hydration {
                    aggregate_id: self.id,
                    reason: format!(
                        "expected event version {} but history contains version {}",
                        next_version, envelope.version
                    ),
                });
            }

            self.state
                .apply_event(&envelope.event_data)
                .map_err(|e| EventSourcingError::Hydration {
                    aggregate_id: self.id,
                    reason: format!(
                        "failed to apply {} at version {}: {}",
                        envelope.kind, envelope.version, e
                    ),
                })?;

            self.expected_version = next_version;
        }

        Ok(())
    }

    /// Clear uncommitted changes after they became durable
    ///
    /// The expected version advances past the committed events so the same
    /// instance could keep going; calling it twice is a no-op.
    pub fn mark_committed(&mut self) {
        self.expected_version += self.uncommitted_changes.len() as i64;
        self.uncommitted_changes.clear();
    }
}

impl<A: Aggregate + std::fmt::Debug> std::fmt::Debug for AggregateRoot<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregateRoot")
            .field("id", &self.id)
            .field("expected_version", &self.expected_version)
            .field("uncommitted_changes", &self.uncommitted_changes)
            .field("state", &self.state)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
