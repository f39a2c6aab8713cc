//! `chronicle-entity` — the event-integration engine.
//!
//! An [`Entity`] rebuilds an aggregate by replaying a hash-chained event
//! history, validates and applies newly raised events, and hands them out as a
//! [`Changeset`] until they are committed as durable.

pub mod cancel;
pub mod changeset;
pub mod entity;
pub mod replay;
pub mod sink;

#[cfg(test)]
pub(crate) mod fixtures;

pub use cancel::{CancellationSignal, NeverCancel};
pub use changeset::{Changeset, CommitError};
pub use entity::Entity;
pub use replay::{ParseReplayOrderError, ReplayOrder};
pub use sink::{EventSink, InMemoryEventSink, SinkError};
