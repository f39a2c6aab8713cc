//! Aggregate trait: the state an entity rebuilds by replaying its events.

/// Observable state of an event-sourced entity.
///
/// The entity engine owns identity, timestamps, sequencing and the hash chain;
/// an `Aggregate` only evolves its own fields from events that already passed
/// validation.
///
/// ## Dispatch
///
/// `Event` is expected to be a closed set of variants (an enum, or a
/// `ChainedEvent` wrapping one). `apply` matches on it exhaustively, so adding a
/// variant without a handler is a build error rather than a runtime failure.
///
/// `handles` is the escape hatch for intentionally open event sets (for example
/// a catch-all variant carrying events written by a newer schema). Returning
/// `false` makes the engine reject the event with `NotImplemented` before
/// anything is mutated.
pub trait Aggregate: Default {
    type Event;

    /// Stable aggregate type name (used in logs).
    const AGGREGATE_TYPE: &'static str;

    /// Whether this aggregate has a handler for `event`.
    fn handles(&self, event: &Self::Event) -> bool {
        let _ = event;
        true
    }

    /// Evolve in-memory state from a single, already validated event.
    ///
    /// Called exactly once per successful integration. Must not perform IO.
    fn apply(&mut self, event: &Self::Event);
}
