// ============================================================================
// Infrastructure Actors
// ============================================================================
//
// Actors for the ScyllaDB read side:
// - CDC stream processing into the projection bus
// - Dead letter queue for records that could not be projected
// - Coordination and shutdown
//
// ============================================================================

// Private module declarations
mod cdc_processor;
mod coordinator;
mod dlq;

// Re-export for public API
pub use cdc_processor::CdcProcessor;
pub use coordinator::{CoordinatorActor, Shutdown};
pub use dlq::{AddToDlq, DlqActor, DlqMessage, DlqStats, GetDlqMessages, GetDlqStats, DEAD_LETTER_TABLE};
