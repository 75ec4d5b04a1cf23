// ============================================================================
// Event Sourcing Store - Generic Persistence Layer
// ============================================================================
//
// This module contains GENERIC persistence infrastructure for event sourcing.
// All components work with ANY aggregate/event type.
//
// - `event_log`: storage seam (atomic conditional append, ordered read)
// - `memory` / `scylla`: backends
// - `event_store`: versioning, codec and error mapping over a backend
//
// ============================================================================

pub mod event_log;
pub mod event_store;
pub mod memory;
pub mod scylla;

pub use event_log::{EventLog, EventLogError};
pub use event_store::EventStore;
pub use memory::InMemoryEventLog;
pub use scylla::{ScyllaEventLog, EVENT_STORE_TABLE};
