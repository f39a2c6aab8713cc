//! Sealed events: metadata + payload + the hash that covers both.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chronicle_core::{CorrelationId, EntityId};

use crate::chain::{ChainError, ContentHash, HashChained};
use crate::event::{EntityEvent, EventPayload};

/// Envelope fields shared by every event of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    identity: EntityId,
    occurred_at: DateTime<Utc>,
    correlation_id: CorrelationId,
    previous_hash: ContentHash,

    /// Assigned by the engine at raise time; not covered by the hash.
    #[serde(default)]
    sequence: u64,
}

impl EventMetadata {
    pub fn new(
        identity: EntityId,
        occurred_at: DateTime<Utc>,
        correlation_id: impl Into<CorrelationId>,
        previous_hash: ContentHash,
    ) -> Self {
        Self {
            identity,
            occurred_at,
            correlation_id: correlation_id.into(),
            previous_hash,
            sequence: 0,
        }
    }

    pub fn identity(&self) -> EntityId {
        self.identity
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    pub fn previous_hash(&self) -> &ContentHash {
        &self.previous_hash
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

/// Everything the content hash covers, in a fixed field order.
#[derive(Serialize)]
struct HashInput<'a, P> {
    identity: &'a EntityId,
    occurred_at: &'a DateTime<Utc>,
    correlation_id: &'a CorrelationId,
    previous_hash: &'a ContentHash,
    event_type: &'a str,
    payload: &'a P,
}

/// A domain payload sealed into the entity's hash chain.
///
/// The stored hash is SHA-256 over the canonical JSON of the metadata (minus
/// the sequence), the event type and the payload. Serialized events keep their
/// stored hash, so any edit made to the stored form is detected when the event
/// is integrated again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainedEvent<P> {
    metadata: EventMetadata,
    payload: P,
    hash: ContentHash,
}

impl<P: EventPayload> ChainedEvent<P> {
    /// Compute the content hash and seal the event.
    pub fn seal(metadata: EventMetadata, payload: P) -> Result<Self, ChainError> {
        let hash = compute_hash(&metadata, &payload)?;
        Ok(Self {
            metadata,
            payload,
            hash,
        })
    }
}

impl<P> ChainedEvent<P> {
    pub fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    pub fn into_payload(self) -> P {
        self.payload
    }
}

fn compute_hash<P: EventPayload>(
    metadata: &EventMetadata,
    payload: &P,
) -> Result<ContentHash, ChainError> {
    let input = HashInput {
        identity: &metadata.identity,
        occurred_at: &metadata.occurred_at,
        correlation_id: &metadata.correlation_id,
        previous_hash: &metadata.previous_hash,
        event_type: payload.event_type(),
        payload,
    };
    let bytes = serde_json::to_vec(&input)?;
    Ok(ContentHash::sha256(&bytes))
}

impl<P: EventPayload> HashChained for ChainedEvent<P> {
    fn content_hash(&self) -> Result<ContentHash, ChainError> {
        compute_hash(&self.metadata, &self.payload)
    }

    fn stored_hash(&self) -> &ContentHash {
        &self.hash
    }

    fn previous_hash(&self) -> &ContentHash {
        &self.metadata.previous_hash
    }
}

impl<P: EventPayload> EntityEvent for ChainedEvent<P> {
    fn identity(&self) -> EntityId {
        self.metadata.identity
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.metadata.occurred_at
    }

    fn correlation_id(&self) -> &CorrelationId {
        &self.metadata.correlation_id
    }

    fn sequence(&self) -> u64 {
        self.metadata.sequence
    }

    fn assign_sequence(&mut self, sequence: u64) {
        self.metadata.sequence = sequence;
    }

    fn is_creation(&self) -> bool {
        self.payload.is_creation()
    }

    fn event_type(&self) -> &'static str {
        self.payload.event_type()
    }
}
