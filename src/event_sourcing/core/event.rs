use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Event Envelope - Versioned Event As Read Back From The Store
// ============================================================================
//
// Wraps a domain event with the identity the event store assigned to it.
// The version is 1-based and only exists once the event has been appended.
//
// ============================================================================

/// A persisted domain event together with its stream position
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EventEnvelope<E> {
    pub aggregate_id: Uuid,
    pub version: i64,
    pub kind: String,
    pub event_data: E,
}

impl<E: DomainEvent> EventEnvelope<E> {
    pub fn new(aggregate_id: Uuid, version: i64, event_data: E) -> Self {
        Self {
            aggregate_id,
            version,
            kind: event_data.kind().to_string(),
            event_data,
        }
    }
}

// ============================================================================
// Event Record - Persisted Wire Shape
// ============================================================================
//
// { id, version, kind, event } where `event` is the serialized payload of a
// single event variant. (id, version) is the uniqueness key.
//
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EventRecord {
    pub id: Uuid,
    pub version: i64,
    pub kind: String,
    pub event: String,
}

impl EventRecord {
    pub fn from_event<E: DomainEvent>(
        aggregate_id: Uuid,
        version: i64,
        event: &E,
    ) -> Result<Self, EventCodecError> {
        Ok(Self {
            id: aggregate_id,
            version,
            kind: event.kind().to_string(),
            event: event.encode()?,
        })
    }

    /// Decode the payload through the event type's kind registry
    pub fn decode<E: DomainEvent>(&self) -> Result<EventEnvelope<E>, EventCodecError> {
        let event_data = E::decode(&self.kind, &self.event)?;
        Ok(EventEnvelope {
            aggregate_id: self.id,
            version: self.version,
            kind: self.kind.clone(),
            event_data,
        })
    }
}

// ============================================================================
// Domain Event Trait
// ============================================================================

/// Generic Domain Event trait
///
/// The `kind` is a stable wire discriminator owned by the event type, never
/// derived from a Rust type name. `decode` is the inverse registry lookup:
/// it maps a kind back to the variant that owns the payload.
pub trait DomainEvent: Serialize + Clone + std::fmt::Debug + Send + Sync + Sized + 'static {
    fn kind(&self) -> &'static str;

    fn aggregate_id(&self) -> Uuid;

    /// Serialize the payload of this variant only
    fn encode(&self) -> Result<String, EventCodecError>;

    fn decode(kind: &str, payload: &str) -> Result<Self, EventCodecError>;
}

#[derive(Debug, thiserror::Error)]
pub enum EventCodecError {
    #[error("unknown event kind: {0}")]
    UnknownKind(String),

    #[error("malformed payload for event kind {kind}: {source}")]
    Malformed {
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize event payload: {0}")]
    Encode(#[source] serde_json::Error),
}

// ============================================================================
// Event Serialization Helpers
// ============================================================================

pub fn serialize_event<E: Serialize>(event: &E) -> Result<String, EventCodecError> {
    serde_json::to_string(event).map_err(EventCodecError::Encode)
}

pub fn deserialize_event<E: for<'de> Deserialize<'de>>(
    kind: &str,
    json: &str,
) -> Result<E, EventCodecError> {
    serde_json::from_str(json).map_err(|source| EventCodecError::Malformed {
        kind: kind.to_string(),
        source,
    })
}

// ============================================================================
// Tests
// ============================================================================
