use chrono::{DateTime, Utc};

use chronicle_core::{CorrelationId, EntityId};

use crate::chain::HashChained;

/// An event an entity can integrate.
///
/// Events are:
/// - **immutable** (treat them as facts); only `sequence` is assigned once,
///   by the engine, when the event is raised
/// - **chained** to their predecessor through `HashChained`
/// - designed to be **append-only**
pub trait EntityEvent: HashChained + core::fmt::Debug {
    /// Identity of the entity this event belongs to.
    fn identity(&self) -> EntityId;

    /// When the event occurred (business time).
    fn occurred_at(&self) -> DateTime<Utc>;

    fn correlation_id(&self) -> &CorrelationId;

    /// Per-entity position; zero until assigned.
    fn sequence(&self) -> u64;

    fn assign_sequence(&mut self, sequence: u64);

    /// Creation events establish the entity's identity and creation time.
    fn is_creation(&self) -> bool;

    /// Stable event name/type identifier (e.g. "inventory.item.created").
    fn event_type(&self) -> &'static str;
}

/// Domain payload carried by a `ChainedEvent`.
///
/// Payloads must serialize deterministically: the same value always produces
/// the same JSON, since that JSON feeds the content hash.
pub trait EventPayload: serde::Serialize + Clone + core::fmt::Debug {
    fn event_type(&self) -> &'static str;

    fn is_creation(&self) -> bool {
        false
    }
}
