// ============================================================================
// Actors Module
// ============================================================================
//
// Actor-based infrastructure for asynchronous, concurrent operations.
//
// Structure:
// - infrastructure/ - Concrete infrastructure actors (CDC, DLQ, Coordinator)
//
// Note: Domain logic (Account) uses CommandHandlers, NOT actors.
//       Actors are reserved for infrastructure concerns only.
//
// ============================================================================

// Private module declarations
mod infrastructure;

// Re-export only what's needed in the public API
pub use infrastructure::{
    AddToDlq, CdcProcessor, CoordinatorActor, DlqActor, DlqMessage, DlqStats, GetDlqMessages, GetDlqStats,
    Shutdown, DEAD_LETTER_TABLE,
};
