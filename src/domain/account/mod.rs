// ============================================================================
// Account Domain - Business Logic for Account Aggregate
// ============================================================================
//
// This module contains ALL Account-specific code:
// - Value objects (Money)
// - Events (AccountCreated, Deposited, Withdrew, Overdrawn)
// - Commands (Open, Deposit, Withdraw)
// - Errors (AccountError enum)
// - Aggregate (Account with business logic)
// - Command Handler (AccountCommandHandler)
// - Read model and its projection (AccountSummary)
//
// ============================================================================

pub mod aggregate;
pub mod command_handler;
pub mod commands;
pub mod errors;
pub mod events;
pub mod projection;
pub mod read_model;
pub mod value_objects;

// Re-export for convenience
pub use aggregate::*;
pub use command_handler::*;
pub use commands::*;
pub use errors::*;
pub use events::*;
pub use projection::*;
pub use read_model::*;
pub use value_objects::*;
