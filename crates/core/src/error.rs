//! Error taxonomy for event integration and commit.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::id::EntityId;

/// Result type used by the entity engine.
pub type EntityResult<T> = Result<T, EntityError>;

/// Failure raised while constructing, mutating or committing an entity.
///
/// Every variant except `Cancelled` is raised before anything is recorded, so
/// the entity is left exactly as it was before the failed call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EntityError {
    /// A required input was absent.
    #[error("missing argument: {0}")]
    MissingArgument(&'static str),

    /// A collection was supplied but is empty.
    #[error("argument out of range: {0} must not be empty")]
    OutOfRange(&'static str),

    /// A non-creation event targets a different entity.
    #[error(
        "identity associated with event does not match current entity (current: {current}, event: {event})"
    )]
    IdentityMismatch { current: EntityId, event: EntityId },

    /// The event is stale or its data failed hash-chain verification.
    #[error(transparent)]
    InvalidOperation(#[from] InvalidOperation),

    /// The aggregate has no handler for the event's type.
    #[error("no handler implemented for event of type '{event_type}'")]
    NotImplemented { event_type: &'static str },

    /// Commit was aborted by its cancellation signal.
    ///
    /// `committed` events were already moved to the durable queue by the
    /// aborted call; `remaining` are still pending.
    #[error("commit cancelled after {committed} event(s), {remaining} still pending")]
    Cancelled { committed: usize, remaining: usize },
}

impl EntityError {
    pub fn stale(modified_at: DateTime<Utc>, occurred_at: DateTime<Utc>) -> Self {
        Self::InvalidOperation(InvalidOperation::StaleEvent {
            modified_at,
            occurred_at,
        })
    }

    pub fn tampered(reason: TamperReason) -> Self {
        Self::InvalidOperation(InvalidOperation::Tampered(reason))
    }

    /// True for stale and tampered events.
    pub fn is_invalid_operation(&self) -> bool {
        matches!(self, Self::InvalidOperation(_))
    }
}

/// An operation that is invalid given the entity's current state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidOperation {
    #[error(
        "stale event: entity has been modified at {modified_at}, after the event took place at {occurred_at}"
    )]
    StaleEvent {
        modified_at: DateTime<Utc>,
        occurred_at: DateTime<Utc>,
    },

    #[error("tampered data: {0}")]
    Tampered(TamperReason),
}

/// Why an event failed hash-chain verification.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TamperReason {
    #[error("stored hash '{stored}' does not match recomputed hash '{computed}'")]
    HashMismatch { stored: String, computed: String },

    #[error("previous hash '{found}' does not match chain head '{expected}'")]
    BrokenChain { expected: String, found: String },

    #[error("content hash could not be computed: {0}")]
    Unhashable(String),
}
