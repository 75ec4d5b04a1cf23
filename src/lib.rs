// ============================================================================
// Event-sourced accounts with CQRS projections over ScyllaDB
// ============================================================================
//
// Write side: aggregates -> repository -> event store -> event log backend
// Read side:  change feed -> projection bus -> read model handlers
//
// ============================================================================

pub mod actors;
pub mod config;
pub mod domain;
pub mod event_sourcing;
pub mod metrics;
pub mod projection;
pub mod utils;
