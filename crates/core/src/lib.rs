//! `chronicle-core` — building blocks shared by every event-sourced entity.
//!
//! This crate contains **pure domain** primitives: identifiers, the error
//! taxonomy raised while integrating events, and the aggregate contract.

pub mod aggregate;
pub mod error;
pub mod id;

pub use aggregate::Aggregate;
pub use error::{EntityError, EntityResult, InvalidOperation, TamperReason};
pub use id::{CorrelationId, EntityId, ParseIdError};
