//! Entity engine: integrates hash-chained events into an aggregate.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use chronicle_core::{
    Aggregate, CorrelationId, EntityError, EntityId, EntityResult, TamperReason,
};
use chronicle_events::{
    ChainedEvent, ContentHash, EntityEvent, EventMetadata, EventPayload, HashChained,
};

use crate::cancel::CancellationSignal;
use crate::changeset::Changeset;
use crate::replay::ReplayOrder;

/// Queue that receives an event once it has been integrated.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Destination {
    /// Newly raised, awaiting commit.
    Pending,
    /// Replayed from storage.
    Durable,
}

impl Destination {
    fn as_str(self) -> &'static str {
        match self {
            Destination::Pending => "pending",
            Destination::Durable => "durable",
        }
    }
}

/// An event-sourced entity: an aggregate plus the bookkeeping needed to
/// integrate its events safely.
///
/// ## Integration pipeline
///
/// Every event, raised or replayed, goes through the same steps:
///
/// 1. **Identity**: non-creation events must carry the entity's identity.
/// 2. **Ordering**: events older than `modified_at` are stale.
/// 3. **Integrity**: the recomputed content hash must equal the stored hash,
///    and the stored previous hash must equal the hash of the event integrated
///    just before it.
/// 4. **Dispatch**: the aggregate must handle the event's type.
/// 5. **Record**: identity/timestamps/chain head are updated, the aggregate
///    applies the event, and the event is queued.
///
/// Nothing is mutated before step 5, so a rejected event leaves the entity
/// exactly as it was.
///
/// ## Ownership
///
/// One entity is mutated by one unit of work at a time. There is no internal
/// locking; `&mut self` is the only synchronization.
pub struct Entity<A: Aggregate> {
    state: A,
    identity: Option<EntityId>,
    created_at: Option<DateTime<Utc>>,
    modified_at: Option<DateTime<Utc>>,
    sequence: u64,
    previous_hash: ContentHash,
    durable: Vec<A::Event>,
    pending: VecDeque<A::Event>,
}

impl<A> Entity<A>
where
    A: Aggregate,
    A::Event: EntityEvent,
{
    fn empty() -> Self {
        Self {
            state: A::default(),
            identity: None,
            created_at: None,
            modified_at: None,
            sequence: 0,
            previous_hash: ContentHash::empty(),
            durable: Vec::new(),
            pending: VecDeque::new(),
        }
    }

    /// Create a new entity from its creation event.
    ///
    /// The event is raised like any other new event: it gets sequence 1 and
    /// stays pending until committed.
    pub fn from_creation(created_event: impl Into<Option<A::Event>>) -> EntityResult<Self> {
        let created_event = created_event
            .into()
            .ok_or(EntityError::MissingArgument("created_event"))?;

        let mut entity = Self::empty();
        entity.receive(created_event)?;
        Ok(entity)
    }

    /// Rehydrate an entity from its stored events, in the default replay order.
    ///
    /// Passing `None` needs the collection type spelled out, since `Option<I>`
    /// converts into both `Option<I>` and `Option<Option<I>>`:
    /// `Entity::<A>::from_history::<Vec<_>>(None)`.
    pub fn from_history<I>(saved_events: impl Into<Option<I>>) -> EntityResult<Self>
    where
        I: IntoIterator<Item = A::Event>,
    {
        Self::from_history_with(saved_events, ReplayOrder::default())
    }

    /// Rehydrate an entity from its stored events.
    ///
    /// Events are integrated as durable: their sequence numbers are kept and
    /// none of them becomes pending.
    ///
    /// With `ReplayOrder::CorrelationGrouped` the sequence counter is left
    /// alone, so the first event raised afterwards gets sequence 1. With
    /// `ReplayOrder::Sequence` numbering is entity-wide and the counter resumes
    /// after the highest stored sequence.
    ///
    /// As with `from_history`, a `None` argument needs a turbofish on `I`.
    pub fn from_history_with<I>(
        saved_events: impl Into<Option<I>>,
        order: ReplayOrder,
    ) -> EntityResult<Self>
    where
        I: IntoIterator<Item = A::Event>,
    {
        let saved_events: Vec<A::Event> = saved_events
            .into()
            .ok_or(EntityError::MissingArgument("saved_events"))?
            .into_iter()
            .collect();

        if saved_events.is_empty() {
            return Err(EntityError::OutOfRange("saved_events"));
        }

        let mut entity = Self::empty();
        for event in order.arrange(saved_events) {
            let sequence = event.sequence();
            entity.integrate(event, Destination::Durable)?;
            if order.resumes_sequence() {
                entity.sequence = entity.sequence.max(sequence);
            }
        }

        debug!(
            aggregate = A::AGGREGATE_TYPE,
            entity_id = %entity.identity(),
            events = entity.durable.len(),
            sequence = entity.sequence,
            ?order,
            "rehydrated entity"
        );

        Ok(entity)
    }

    /// Raise a new event: assign the next sequence number, integrate it and
    /// queue it as pending.
    ///
    /// The sequence counter only advances when integration succeeds.
    pub fn receive(&mut self, event: impl Into<Option<A::Event>>) -> EntityResult<()> {
        let mut event = event.into().ok_or(EntityError::MissingArgument("event"))?;

        let sequence = self.sequence + 1;
        event.assign_sequence(sequence);

        self.integrate(event, Destination::Pending)?;
        self.sequence = sequence;
        Ok(())
    }

    fn integrate(&mut self, event: A::Event, destination: Destination) -> EntityResult<()> {
        let event_identity = event.identity();
        let occurred_at = event.occurred_at();

        if !event.is_creation() && self.identity != Some(event_identity) {
            warn!(
                aggregate = A::AGGREGATE_TYPE,
                current = %self.identity(),
                event = %event_identity,
                event_type = event.event_type(),
                "rejected event for another entity"
            );
            return Err(EntityError::IdentityMismatch {
                current: self.identity(),
                event: event_identity,
            });
        }

        if let Some(modified_at) = self.modified_at.filter(|m| occurred_at < *m) {
            warn!(
                aggregate = A::AGGREGATE_TYPE,
                entity_id = %event_identity,
                %modified_at,
                %occurred_at,
                "rejected stale event"
            );
            return Err(EntityError::stale(modified_at, occurred_at));
        }

        let hash = self.verify(&event)?;

        if !self.state.handles(&event) {
            return Err(EntityError::NotImplemented {
                event_type: event.event_type(),
            });
        }

        if event.is_creation() {
            self.identity = Some(event_identity);
            self.created_at = Some(occurred_at);
        }
        self.modified_at = Some(occurred_at);
        self.previous_hash = hash;
        self.state.apply(&event);

        debug!(
            aggregate = A::AGGREGATE_TYPE,
            entity_id = %event_identity,
            event_type = event.event_type(),
            sequence = event.sequence(),
            destination = destination.as_str(),
            "integrated event"
        );

        match destination {
            Destination::Pending => self.pending.push_back(event),
            Destination::Durable => self.durable.push(event),
        }
        Ok(())
    }

    /// Check the event against its own hash and against the chain head.
    ///
    /// Returns the verified content hash, which becomes the new chain head.
    fn verify(&self, event: &A::Event) -> EntityResult<ContentHash> {
        let computed = event
            .content_hash()
            .map_err(|err| self.tampered(event, TamperReason::Unhashable(err.to_string())))?;

        if &computed != event.stored_hash() {
            return Err(self.tampered(
                event,
                TamperReason::HashMismatch {
                    stored: event.stored_hash().to_string(),
                    computed: computed.to_string(),
                },
            ));
        }

        if event.previous_hash() != &self.previous_hash {
            return Err(self.tampered(
                event,
                TamperReason::BrokenChain {
                    expected: self.previous_hash.to_string(),
                    found: event.previous_hash().to_string(),
                },
            ));
        }

        Ok(computed)
    }

    fn tampered(&self, event: &A::Event, reason: TamperReason) -> EntityError {
        warn!(
            aggregate = A::AGGREGATE_TYPE,
            entity_id = %event.identity(),
            event_type = event.event_type(),
            %reason,
            "event data has been modified"
        );
        EntityError::tampered(reason)
    }

    /// Move every pending event to the durable queue, oldest first.
    ///
    /// The signal is checked before starting and before each event. A
    /// cancellation keeps the events already moved by this call durable.
    pub(crate) fn commit_pending(
        &mut self,
        signal: &impl CancellationSignal,
    ) -> EntityResult<usize> {
        if signal.is_cancelled() {
            return Err(self.cancelled(0));
        }

        let count = self.pending.len();
        for committed in 0..count {
            if signal.is_cancelled() {
                return Err(self.cancelled(committed));
            }
            if let Some(event) = self.pending.pop_front() {
                self.durable.push(event);
            }
        }

        if count > 0 {
            info!(
                aggregate = A::AGGREGATE_TYPE,
                entity_id = %self.identity(),
                committed = count,
                "committed pending events"
            );
        }

        Ok(count)
    }

    fn cancelled(&self, committed: usize) -> EntityError {
        let remaining = self.pending.len();
        warn!(
            aggregate = A::AGGREGATE_TYPE,
            entity_id = %self.identity(),
            committed,
            remaining,
            "commit cancelled"
        );
        EntityError::Cancelled {
            committed,
            remaining,
        }
    }

    /// Changeset over the currently pending events.
    pub fn changeset(&mut self) -> Changeset<'_, A> {
        Changeset::new(self)
    }

    pub fn identity(&self) -> EntityId {
        self.identity.unwrap_or_default()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at.unwrap_or_default()
    }

    /// Timestamp of the most recently integrated event.
    pub fn modified_at(&self) -> DateTime<Utc> {
        self.modified_at.unwrap_or_default()
    }

    /// True while there are pending events.
    pub fn is_modified(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Durable events followed by pending events, each in integration order.
    pub fn events(&self) -> impl Iterator<Item = &A::Event> {
        self.durable.iter().chain(self.pending.iter())
    }

    pub fn durable(&self) -> &[A::Event] {
        &self.durable
    }

    pub fn pending(&self) -> impl ExactSizeIterator<Item = &A::Event> {
        self.pending.iter()
    }

    pub fn state(&self) -> &A {
        &self.state
    }

    /// Last sequence number assigned by this instance (or resumed from
    /// storage under `ReplayOrder::Sequence`).
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Content hash of the last integrated event; the `previous_hash` the next
    /// event must carry.
    pub fn previous_hash(&self) -> &ContentHash {
        &self.previous_hash
    }
}

impl<A, P> Entity<A>
where
    A: Aggregate<Event = ChainedEvent<P>>,
    P: EventPayload,
{
    /// Seal `payload` onto the current chain head and receive it.
    pub fn raise(
        &mut self,
        payload: P,
        occurred_at: DateTime<Utc>,
        correlation_id: impl Into<CorrelationId>,
    ) -> EntityResult<()> {
        let metadata = EventMetadata::new(
            self.identity(),
            occurred_at,
            correlation_id,
            self.previous_hash.clone(),
        );
        let event = ChainedEvent::seal(metadata, payload)
            .map_err(|err| EntityError::tampered(TamperReason::Unhashable(err.to_string())))?;
        self.receive(event)
    }
}

impl<A> core::fmt::Debug for Entity<A>
where
    A: Aggregate + core::fmt::Debug,
    A::Event: core::fmt::Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Entity")
            .field("state", &self.state)
            .field("identity", &self.identity)
            .field("created_at", &self.created_at)
            .field("modified_at", &self.modified_at)
            .field("sequence", &self.sequence)
            .field("previous_hash", &self.previous_hash)
            .field("durable", &self.durable)
            .field("pending", &self.pending)
            .finish()
    }
}
