//! Persistence seam for changesets.
//!
//! The engine never performs IO. An `EventSink` is whatever durable store the
//! caller appends pending events to before they are committed.

use thiserror::Error;

use chronicle_events::EntityEvent;

/// Append-only destination for committed events.
pub trait EventSink<E> {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    /// Append `events` (oldest first) as one batch.
    fn append(&mut self, events: &[&E]) -> Result<(), Self::Error>;
}

/// Rejection raised by `InMemoryEventSink`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// The batch does not continue the stored chain (another writer appended
    /// first, or the batch was built from a stale entity).
    #[error("batch does not continue the stored chain (expected previous hash '{expected}', found '{found}')")]
    BrokenChain { expected: String, found: String },

    /// Sequence numbers must increase within one batch.
    #[error("sequence {found} does not follow sequence {last} in the same batch")]
    SequenceRegression { last: u64, found: u64 },
}

/// In-memory append-only sink.
///
/// Intended for tests/dev. Enforces that every appended event chains onto the
/// last stored one, which doubles as an optimistic concurrency check.
///
/// Sequence numbers belong to the entity instance that raised them, so a
/// rehydrated entity may start again at 1. Only the order inside a batch is
/// checked; across batches the chain is what orders the events.
#[derive(Debug, Clone)]
pub struct InMemoryEventSink<E> {
    events: Vec<E>,
}

impl<E> InMemoryEventSink<E> {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Seed the sink with an already stored history.
    pub fn from_events(events: Vec<E>) -> Self {
        Self { events }
    }

    pub fn events(&self) -> &[E] {
        &self.events
    }

    pub fn into_events(self) -> Vec<E> {
        self.events
    }
}

impl<E> Default for InMemoryEventSink<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EventSink<E> for InMemoryEventSink<E>
where
    E: EntityEvent + Clone,
{
    type Error = SinkError;

    fn append(&mut self, events: &[&E]) -> Result<(), Self::Error> {
        let mut head = self.events.last().map(|e| e.stored_hash().clone()).unwrap_or_default();
        let mut last_sequence = None;

        // Validate the whole batch before storing any of it.
        for event in events {
            if event.previous_hash() != &head {
                return Err(SinkError::BrokenChain {
                    expected: head.to_string(),
                    found: event.previous_hash().to_string(),
                });
            }
            if let Some(last) = last_sequence.filter(|last| event.sequence() <= *last) {
                return Err(SinkError::SequenceRegression {
                    last,
                    found: event.sequence(),
                });
            }
            head = event.stored_hash().clone();
            last_sequence = Some(event.sequence());
        }

        self.events.extend(events.iter().map(|e| (*e).clone()));
        Ok(())
    }
}
