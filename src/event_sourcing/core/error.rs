use uuid::Uuid;

use crate::utils::IsTransient;

// ============================================================================
// Event Sourcing Errors
// ============================================================================
//
// One taxonomy for the whole persistence engine. Each variant tells the
// caller what to do next:
//
// - InvalidArgument   -> client error, never retried
// - EventCollision    -> reload the aggregate, recompute, retry
// - TransactionFailed -> infrastructure failure, retry with backoff
// - AggregateNotFound -> client error, never retried
// - Hydration         -> corrupt or incompatible history, fatal
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum EventSourcingError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("aggregate {aggregate_id}: event collision, stream already advanced past version {expected_version}")]
    EventCollision {
        aggregate_id: Uuid,
        expected_version: i64,
    },

    #[error("aggregate {aggregate_id}: transaction failed: {source}")]
    TransactionFailed {
        aggregate_id: Uuid,
        #[source]
        source: anyhow::Error,
    },

    #[error("aggregate {0}: not found")]
    AggregateNotFound(Uuid),

    #[error("aggregate {aggregate_id}: hydration failed: {reason}")]
    Hydration { aggregate_id: Uuid, reason: String },
}

impl EventSourcingError {
    pub fn aggregate_id(&self) -> Option<Uuid> {
        match self {
            EventSourcingError::InvalidArgument(_) => None,
            EventSourcingError::EventCollision { aggregate_id, .. }
            | EventSourcingError::TransactionFailed { aggregate_id, .. }
            | EventSourcingError::Hydration { aggregate_id, .. } => Some(*aggregate_id),
            EventSourcingError::AggregateNotFound(aggregate_id) => Some(*aggregate_id),
        }
    }

    /// Status code for the command layer in front of the engine
    pub fn status_code(&self) -> u16 {
        match self {
            EventSourcingError::InvalidArgument(_) => 400,
            EventSourcingError::EventCollision { .. } => 409,
            EventSourcingError::AggregateNotFound(_) => 404,
            EventSourcingError::TransactionFailed { .. } | EventSourcingError::Hydration { .. } => 500,
        }
    }
}

/// Both variants are resolved by running the whole load-mutate-save cycle again.
impl IsTransient for EventSourcingError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            EventSourcingError::EventCollision { .. } | EventSourcingError::TransactionFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let id = Uuid::new_v4();

        assert_eq!(EventSourcingError::InvalidArgument("x".into()).status_code(), 400);
        assert_eq!(
            EventSourcingError::EventCollision { aggregate_id: id, expected_version: 1 }.status_code(),
            409
        );
        assert_eq!(EventSourcingError::AggregateNotFound(id).status_code(), 404);
        assert_eq!(
            EventSourcingError::Hydration { aggregate_id: id, reason: "bad".into() }.status_code(),
            500
        );
    }

    #[test]
    fn test_transient_classification() {
        let id = Uuid::new_v4();

        assert!(EventSourcingError::TransactionFailed {
            aggregate_id: id,
            source: anyhow::anyhow!("throttled"),
        }
        .is_transient());
        assert!(EventSourcingError::EventCollision { aggregate_id: id, expected_version: 0 }.is_transient());
        assert!(!EventSourcingError::AggregateNotFound(id).is_transient());
        assert!(!EventSourcingError::InvalidArgument("amount".into()).is_transient());
    }

    #[test]
    fn test_messages_name_the_aggregate() {
        let id = Uuid::new_v4();
        let err = EventSourcingError::Hydration {
            aggregate_id: id,
            reason: "unknown event kind: Foo".into(),
        };

        assert!(err.to_string().contains(&id.to_string()));
        assert_eq!(err.aggregate_id(), Some(id));
    }
}
