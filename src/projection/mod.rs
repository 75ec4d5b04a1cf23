// ============================================================================
// Projection Layer - Read Side Of CQRS
// ============================================================================
//
// - `bus`: kind -> handler routing with per-aggregate ordering
// - `feed`: in-process change feed driving the bus
//
// The ScyllaDB change feed lives with the actors (CDC consumer).
//
// ============================================================================

pub mod bus;
pub mod feed;

pub use bus::{DispatchFailure, DispatchReport, ProjectionBus, ProjectionError, ProjectionHandler};
pub use feed::{run_change_feed, FeedSummary};
