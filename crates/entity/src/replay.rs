//! Ordering of a stored event set before it is replayed.
//!
//! Stored events come back from storage in no particular order. The hash chain
//! is verified in replay order, so the order chosen here must match the order
//! the events were integrated in when they were written.

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use chronicle_core::CorrelationId;
use chronicle_events::EntityEvent;

/// How a historical event set is ordered for rehydration.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReplayOrder {
    /// Group by correlation id (groups in order of first appearance), then
    /// order each group by timestamp and sequence.
    ///
    /// Matches write order as long as correlated flows never interleave.
    #[default]
    #[serde(alias = "correlation")]
    CorrelationGrouped,

    /// Order the whole set by sequence number, then timestamp.
    ///
    /// Requires entity-wide numbering: entities rehydrated this way resume
    /// their sequence counter, so events they raise keep numbering upwards.
    Sequence,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown replay order '{0}' (expected 'correlation' or 'sequence')")]
pub struct ParseReplayOrderError(String);

impl FromStr for ReplayOrder {
    type Err = ParseReplayOrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "correlation" | "correlation-grouped" => Ok(Self::CorrelationGrouped),
            "sequence" => Ok(Self::Sequence),
            other => Err(ParseReplayOrderError(other.to_string())),
        }
    }
}

impl ReplayOrder {
    /// Whether a rehydrated entity continues numbering after the stored
    /// sequences instead of starting over.
    pub fn resumes_sequence(self) -> bool {
        matches!(self, ReplayOrder::Sequence)
    }

    /// Arrange `events` into the order they will be integrated in.
    ///
    /// Sorting is stable: events that compare equal keep their input order.
    pub fn arrange<E: EntityEvent>(self, events: Vec<E>) -> Vec<E> {
        match self {
            ReplayOrder::CorrelationGrouped => by_correlation(events),
            ReplayOrder::Sequence => {
                let mut events = events;
                events.sort_by(|a, b| {
                    a.sequence()
                        .cmp(&b.sequence())
                        .then_with(|| a.occurred_at().cmp(&b.occurred_at()))
                });
                events
            }
        }
    }
}

fn by_correlation<E: EntityEvent>(events: Vec<E>) -> Vec<E> {
    let total = events.len();
    let mut slots: HashMap<CorrelationId, usize> = HashMap::new();
    let mut groups: Vec<Vec<E>> = Vec::new();

    for event in events {
        let slot = match slots.get(event.correlation_id()) {
            Some(&slot) => slot,
            None => {
                slots.insert(event.correlation_id().clone(), groups.len());
                groups.push(Vec::new());
                groups.len() - 1
            }
        };
        groups[slot].push(event);
    }

    let mut ordered = Vec::with_capacity(total);
    for mut group in groups {
        group.sort_by(|a, b| {
            a.occurred_at()
                .cmp(&b.occurred_at())
                .then_with(|| a.sequence().cmp(&b.sequence()))
        });
        ordered.extend(group);
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{ProbeEvent, at, sealed};
    use chronicle_core::EntityId;
    use chronicle_events::ContentHash;

    fn event(correlation: &str, minute: u32, sequence: u64) -> crate::fixtures::Event {
        let mut event = sealed(
            EntityId::new(),
            at(minute),
            correlation,
            ContentHash::empty(),
            ProbeEvent::Noted {
                text: format!("{correlation}-{minute}-{sequence}"),
            },
        );
        event.assign_sequence(sequence);
        event
    }

    fn keys(events: &[crate::fixtures::Event]) -> Vec<(String, u64)> {
        events
            .iter()
            .map(|e| (e.correlation_id().to_string(), e.sequence()))
            .collect()
    }

    #[test]
    fn correlation_groups_keep_first_appearance_order() {
        let events = vec![
            event("b", 5, 4),
            event("a", 3, 2),
            event("b", 1, 1),
            event("a", 3, 1),
        ];

        let ordered = ReplayOrder::CorrelationGrouped.arrange(events);

        assert_eq!(
            keys(&ordered),
            vec![
                ("b".to_string(), 1),
                ("b".to_string(), 4),
                ("a".to_string(), 1),
                ("a".to_string(), 2),
            ]
        );
    }

    #[test]
    fn sequence_order_ignores_correlation() {
        let events = vec![event("b", 5, 3), event("a", 3, 2), event("b", 1, 1)];

        let ordered = ReplayOrder::Sequence.arrange(events);

        assert_eq!(
            ordered.iter().map(|e| e.sequence()).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn only_sequence_order_resumes_numbering() {
        assert!(ReplayOrder::Sequence.resumes_sequence());
        assert!(!ReplayOrder::CorrelationGrouped.resumes_sequence());
    }

    #[test]
    fn parses_from_config_strings() {
        assert_eq!("correlation".parse::<ReplayOrder>(), Ok(ReplayOrder::CorrelationGrouped));
        assert_eq!(" Sequence ".parse::<ReplayOrder>(), Ok(ReplayOrder::Sequence));
        assert!("random".parse::<ReplayOrder>().is_err());

        let order: ReplayOrder = serde_json::from_str("\"correlation-grouped\"").unwrap();
        assert_eq!(order, ReplayOrder::CorrelationGrouped);
        let order: ReplayOrder = serde_json::from_str("\"correlation\"").unwrap();
        assert_eq!(order, ReplayOrder::CorrelationGrouped);
    }
}
