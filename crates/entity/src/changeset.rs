//! Changeset: the pending events of one entity and the commit that makes them
//! durable.

use thiserror::Error;

use chronicle_core::{Aggregate, EntityError, EntityResult};
use chronicle_events::EntityEvent;

use crate::cancel::{CancellationSignal, NeverCancel};
use crate::entity::Entity;
use crate::sink::EventSink;

/// Pending events of an entity, bound to that entity until committed.
///
/// Typical unit of work:
///
/// ```ignore
/// let mut changeset = entity.changeset();
/// store.append(&changeset.events().collect::<Vec<_>>())?;
/// changeset.commit(&NeverCancel)?;
/// ```
///
/// The changeset borrows the entity exclusively, so no event can be raised
/// between taking the snapshot and committing it.
pub struct Changeset<'a, A: Aggregate> {
    entity: &'a mut Entity<A>,
}

/// Failure of `Changeset::commit_with`.
#[derive(Debug, Error)]
pub enum CommitError<E> {
    /// The sink rejected the events; nothing was committed.
    #[error("event sink rejected the changeset: {0}")]
    Sink(E),

    #[error(transparent)]
    Entity(#[from] EntityError),
}

impl<'a, A> Changeset<'a, A>
where
    A: Aggregate,
    A::Event: EntityEvent,
{
    pub(crate) fn new(entity: &'a mut Entity<A>) -> Self {
        Self { entity }
    }

    /// Pending events, oldest first.
    pub fn events(&self) -> impl ExactSizeIterator<Item = &A::Event> {
        self.entity.pending()
    }

    pub fn len(&self) -> usize {
        self.entity.pending().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Move every pending event to the durable queue, oldest first.
    ///
    /// Performs no IO: persist `events()` before calling this. Returns the
    /// number of events committed.
    ///
    /// `signal` is checked before starting and before each event. On
    /// cancellation the events already moved by this call stay durable and the
    /// rest stay pending (`EntityError::Cancelled` reports both counts);
    /// calling `commit` again continues where it stopped.
    pub fn commit(&mut self, signal: &impl CancellationSignal) -> EntityResult<usize> {
        self.entity.commit_pending(signal)
    }

    /// Append the pending events to `sink`, then commit them.
    ///
    /// `signal` is only checked before appending: once the sink holds the
    /// events they are committed in full, so they are never sent twice. A sink
    /// failure leaves every event pending.
    pub fn commit_with<S>(
        &mut self,
        sink: &mut S,
        signal: &impl CancellationSignal,
    ) -> Result<usize, CommitError<S::Error>>
    where
        S: EventSink<A::Event>,
    {
        if signal.is_cancelled() {
            return Err(EntityError::Cancelled {
                committed: 0,
                remaining: self.len(),
            }
            .into());
        }

        let batch: Vec<&A::Event> = self.events().collect();
        if !batch.is_empty() {
            sink.append(&batch).map_err(CommitError::Sink)?;
        }

        Ok(self.commit(&NeverCancel)?)
    }
}
