//! Probe aggregate shared by the unit tests.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use chronicle_core::{Aggregate, EntityId};
use chronicle_events::{
    ChainedEvent, ContentHash, EntityEvent, EventMetadata, EventPayload, HashChained,
};

use crate::entity::Entity;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeEvent {
    Opened,
    Noted { text: String },
    /// Known to the payload set but deliberately not handled by `Probe`.
    Unsupported,
}

impl EventPayload for ProbeEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProbeEvent::Opened => "probe.opened",
            ProbeEvent::Noted { .. } => "probe.noted",
            ProbeEvent::Unsupported => "probe.unsupported",
        }
    }

    fn is_creation(&self) -> bool {
        matches!(self, ProbeEvent::Opened)
    }
}

pub type Event = ChainedEvent<ProbeEvent>;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Probe {
    pub opened: bool,
    pub notes: Vec<String>,
    pub applied: usize,
}

impl Aggregate for Probe {
    type Event = ChainedEvent<ProbeEvent>;

    const AGGREGATE_TYPE: &'static str = "probe";

    fn handles(&self, event: &Self::Event) -> bool {
        !matches!(event.payload(), ProbeEvent::Unsupported)
    }

    fn apply(&mut self, event: &Self::Event) {
        match event.payload() {
            ProbeEvent::Opened => self.opened = true,
            ProbeEvent::Noted { text } => self.notes.push(text.clone()),
            ProbeEvent::Unsupported => {}
        }
        self.applied += 1;
    }
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 8, 6, 0, 0, 0).unwrap()
}

/// `t0` plus `minutes`.
pub fn at(minutes: u32) -> DateTime<Utc> {
    t0() + Duration::minutes(i64::from(minutes))
}

pub fn sealed(
    identity: EntityId,
    occurred_at: DateTime<Utc>,
    correlation_id: &str,
    previous_hash: ContentHash,
    payload: ProbeEvent,
) -> Event {
    ChainedEvent::seal(
        EventMetadata::new(identity, occurred_at, correlation_id, previous_hash),
        payload,
    )
    .unwrap()
}

pub fn opened(identity: EntityId, occurred_at: DateTime<Utc>) -> Event {
    sealed(identity, occurred_at, "Test", ContentHash::empty(), ProbeEvent::Opened)
}

/// Next event for `entity`, chained to its current head.
pub fn next(entity: &Entity<Probe>, occurred_at: DateTime<Utc>, payload: ProbeEvent) -> Event {
    sealed(
        entity.identity(),
        occurred_at,
        "Test",
        entity.previous_hash().clone(),
        payload,
    )
}

pub fn note(text: &str) -> ProbeEvent {
    ProbeEvent::Noted {
        text: text.to_string(),
    }
}

/// A consistent, correctly chained history: creation followed by `notes` notes,
/// one minute apart, with sequences 1..=n as if they had been raised.
pub fn history(identity: EntityId, notes: usize) -> Vec<Event> {
    let mut events = Vec::with_capacity(notes + 1);
    let mut creation = opened(identity, t0());
    creation.assign_sequence(1);
    events.push(creation);

    for i in 0..notes {
        let previous = events[events.len() - 1].stored_hash().clone();
        let minute = u32::try_from(i + 1).unwrap();
        let mut event = sealed(identity, at(minute), "Test", previous, note(&format!("n{i}")));
        event.assign_sequence(u64::try_from(i + 2).unwrap());
        events.push(event);
    }
    events
}
