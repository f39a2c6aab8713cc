//! Entity events and the hash chain that makes their history tamper-evident.

pub mod chain;
pub mod chained;
pub mod event;

pub use chain::{ChainError, ContentHash, HashChained};
pub use chained::{ChainedEvent, EventMetadata};
pub use event::{EntityEvent, EventPayload};
