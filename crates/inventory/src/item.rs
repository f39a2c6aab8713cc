use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use chronicle_core::{Aggregate, CorrelationId, EntityError, EntityId};
use chronicle_entity::Entity;
use chronicle_events::{ChainError, ChainedEvent, ContentHash, EventMetadata, EventPayload};

/// Event-sourced inventory item.
pub type InventoryEntity = Entity<InventoryItem>;

/// An inventory payload sealed into the item's hash chain.
pub type InventoryItemEvent = ChainedEvent<InventoryEvent>;

/// Aggregate root: InventoryItem.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InventoryItem {
    name: String,
    stock: i64,
    created: bool,
}

impl InventoryItem {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stock(&self) -> i64 {
        self.stock
    }

    pub fn is_created(&self) -> bool {
        self.created
    }
}

/// Event: ItemCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCreated {
    pub name: String,
}

/// Event: StockAdjusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjusted {
    pub delta: i64,
}

/// Event: ItemRenamed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRenamed {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryEvent {
    ItemCreated(ItemCreated),
    StockAdjusted(StockAdjusted),
    ItemRenamed(ItemRenamed),
}

impl EventPayload for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::ItemCreated(_) => "inventory.item.created",
            InventoryEvent::StockAdjusted(_) => "inventory.item.stock_adjusted",
            InventoryEvent::ItemRenamed(_) => "inventory.item.renamed",
        }
    }

    fn is_creation(&self) -> bool {
        matches!(self, InventoryEvent::ItemCreated(_))
    }
}

impl Aggregate for InventoryItem {
    type Event = InventoryItemEvent;

    const AGGREGATE_TYPE: &'static str = "inventory.item";

    fn apply(&mut self, event: &Self::Event) {
        match event.payload() {
            InventoryEvent::ItemCreated(e) => {
                self.name = e.name.clone();
                self.stock = 0;
                self.created = true;
            }
            InventoryEvent::StockAdjusted(e) => {
                // `decide` rejects overflow; raised payloads skip it.
                self.stock = self.stock.saturating_add(e.delta);
            }
            InventoryEvent::ItemRenamed(e) => {
                self.name = e.name.clone();
            }
        }
    }
}

/// Command: CreateItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateItem {
    pub item_id: EntityId,
    pub name: String,
    pub correlation_id: CorrelationId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AdjustStock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustStock {
    pub delta: i64,
    pub correlation_id: CorrelationId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RenameItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameItem {
    pub name: String,
    pub correlation_id: CorrelationId,
    pub occurred_at: DateTime<Utc>,
}

/// Commands against an existing item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryCommand {
    AdjustStock(AdjustStock),
    RenameItem(RenameItem),
}

impl InventoryCommand {
    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InventoryCommand::AdjustStock(c) => c.occurred_at,
            InventoryCommand::RenameItem(c) => c.occurred_at,
        }
    }

    fn correlation_id(&self) -> &CorrelationId {
        match self {
            InventoryCommand::AdjustStock(c) => &c.correlation_id,
            InventoryCommand::RenameItem(c) => &c.correlation_id,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InventoryError {
    /// A command failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A business invariant would be violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Entity(#[from] EntityError),
}

impl InventoryItem {
    /// Create a new item; its creation event is pending on the returned entity.
    pub fn create(cmd: CreateItem) -> Result<InventoryEntity, InventoryError> {
        if cmd.name.trim().is_empty() {
            return Err(InventoryError::Validation("name cannot be empty".to_string()));
        }

        let event = ChainedEvent::seal(
            EventMetadata::new(
                cmd.item_id,
                cmd.occurred_at,
                cmd.correlation_id,
                ContentHash::empty(),
            ),
            InventoryEvent::ItemCreated(ItemCreated { name: cmd.name }),
        )?;

        Ok(Entity::from_creation(event)?)
    }

    /// Decide which event a command produces, given the current state.
    ///
    /// This must not mutate state. State evolution is done through `apply`.
    pub fn decide(&self, command: &InventoryCommand) -> Result<InventoryEvent, InventoryError> {
        if !self.created {
            return Err(InventoryError::InvariantViolation(
                "item does not exist".to_string(),
            ));
        }

        match command {
            InventoryCommand::AdjustStock(cmd) => self.decide_adjust(cmd),
            InventoryCommand::RenameItem(cmd) => self.decide_rename(cmd),
        }
    }

    fn decide_adjust(&self, cmd: &AdjustStock) -> Result<InventoryEvent, InventoryError> {
        if cmd.delta == 0 {
            return Err(InventoryError::Validation("delta cannot be zero".to_string()));
        }

        let new_stock = self
            .stock
            .checked_add(cmd.delta)
            .ok_or_else(|| InventoryError::InvariantViolation("stock overflow".to_string()))?;
        if new_stock < 0 {
            return Err(InventoryError::InvariantViolation(
                "stock cannot go negative".to_string(),
            ));
        }

        Ok(InventoryEvent::StockAdjusted(StockAdjusted { delta: cmd.delta }))
    }

    fn decide_rename(&self, cmd: &RenameItem) -> Result<InventoryEvent, InventoryError> {
        if cmd.name.trim().is_empty() {
            return Err(InventoryError::Validation("name cannot be empty".to_string()));
        }
        if cmd.name == self.name {
            return Err(InventoryError::Validation("name is unchanged".to_string()));
        }

        Ok(InventoryEvent::ItemRenamed(ItemRenamed {
            name: cmd.name.clone(),
        }))
    }
}

/// Decide and raise: the event produced by `command` is chained onto the item
/// and left pending.
pub fn execute(entity: &mut InventoryEntity, command: &InventoryCommand) -> Result<(), InventoryError> {
    let payload = entity.state().decide(command)?;
    entity.raise(payload, command.occurred_at(), command.correlation_id().clone())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use chronicle_entity::{InMemoryEventSink, NeverCancel};
    use chronicle_events::EntityEvent;
    use proptest::prelude::*;

    fn test_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
    }

    fn create_cmd(name: &str) -> CreateItem {
        CreateItem {
            item_id: EntityId::new(),
            name: name.to_string(),
            correlation_id: CorrelationId::from("receiving"),
            occurred_at: test_time(),
        }
    }

    fn adjust(delta: i64, minutes: i64) -> InventoryCommand {
        InventoryCommand::AdjustStock(AdjustStock {
            delta,
            correlation_id: CorrelationId::from("receiving"),
            occurred_at: test_time() + Duration::minutes(minutes),
        })
    }

    #[test]
    fn create_item_raises_creation_event() {
        let cmd = create_cmd("Widget");
        let item_id = cmd.item_id;

        let entity = InventoryItem::create(cmd).unwrap();

        assert_eq!(entity.identity(), item_id);
        assert_eq!(entity.created_at(), test_time());
        assert_eq!(entity.state().name(), "Widget");
        assert_eq!(entity.state().stock(), 0);
        assert!(entity.is_modified());
        assert_eq!(
            entity.events().map(|e| e.event_type()).collect::<Vec<_>>(),
            vec!["inventory.item.created"]
        );
    }

    #[test]
    fn blank_name_is_rejected() {
        let err = InventoryItem::create(create_cmd("  ")).unwrap_err();
        assert_eq!(err, InventoryError::Validation("name cannot be empty".to_string()));
    }

    #[test]
    fn adjust_stock_updates_state() {
        let mut entity = InventoryItem::create(create_cmd("Widget")).unwrap();

        execute(&mut entity, &adjust(10, 1)).unwrap();
        execute(&mut entity, &adjust(-4, 2)).unwrap();

        assert_eq!(entity.state().stock(), 6);
        assert_eq!(entity.sequence(), 3);
        assert_eq!(entity.modified_at(), test_time() + Duration::minutes(2));
    }

    #[test]
    fn stock_cannot_go_negative() {
        let mut entity = InventoryItem::create(create_cmd("Widget")).unwrap();

        let err = execute(&mut entity, &adjust(-1, 1)).unwrap_err();

        assert_eq!(
            err,
            InventoryError::InvariantViolation("stock cannot go negative".to_string())
        );
        assert_eq!(entity.events().count(), 1);
    }

    #[test]
    fn zero_delta_is_rejected() {
        let mut entity = InventoryItem::create(create_cmd("Widget")).unwrap();

        let err = execute(&mut entity, &adjust(0, 1)).unwrap_err();

        assert_eq!(err, InventoryError::Validation("delta cannot be zero".to_string()));
    }

    #[test]
    fn backdated_command_is_rejected_by_the_engine() {
        let mut entity = InventoryItem::create(create_cmd("Widget")).unwrap();
        execute(&mut entity, &adjust(5, 30)).unwrap();

        let err = execute(&mut entity, &adjust(5, 10)).unwrap_err();

        assert!(matches!(err, InventoryError::Entity(ref e) if e.is_invalid_operation()));
        assert_eq!(entity.state().stock(), 5);
    }

    #[test]
    fn rename_changes_name() {
        let mut entity = InventoryItem::create(create_cmd("Widget")).unwrap();
        let rename = InventoryCommand::RenameItem(RenameItem {
            name: "Gadget".to_string(),
            correlation_id: CorrelationId::from("catalog"),
            occurred_at: test_time() + Duration::minutes(1),
        });

        execute(&mut entity, &rename).unwrap();
        assert_eq!(entity.state().name(), "Gadget");

        let err = execute(&mut entity, &rename).unwrap_err();
        assert_eq!(err, InventoryError::Validation("name is unchanged".to_string()));
    }

    #[test]
    fn committed_item_rehydrates_to_same_state() {
        let mut entity = InventoryItem::create(create_cmd("Widget")).unwrap();
        execute(&mut entity, &adjust(7, 1)).unwrap();
        execute(&mut entity, &adjust(3, 2)).unwrap();

        let mut sink = InMemoryEventSink::new();
        entity
            .changeset()
            .commit_with(&mut sink, &NeverCancel)
            .unwrap();

        let restored = InventoryEntity::from_history(sink.into_events()).unwrap();
        assert_eq!(restored.state(), entity.state());
        assert_eq!(restored.state().stock(), 10);
        assert_eq!(restored.sequence(), 0);
        assert!(!restored.is_modified());
    }

    #[test]
    fn raised_adjustments_saturate_instead_of_overflowing() {
        let mut entity = InventoryItem::create(create_cmd("Widget")).unwrap();
        let huge = InventoryEvent::StockAdjusted(StockAdjusted { delta: i64::MAX });

        entity.raise(huge.clone(), test_time(), "receiving").unwrap();
        entity.raise(huge, test_time(), "receiving").unwrap();

        assert_eq!(entity.state().stock(), i64::MAX);
        let err = execute(&mut entity, &adjust(1, 1)).unwrap_err();
        assert_eq!(err, InventoryError::InvariantViolation("stock overflow".to_string()));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: replaying the committed history yields a stock equal to
        /// the sum of all accepted deltas.
        #[test]
        fn replayed_stock_equals_sum_of_deltas(
            deltas in prop::collection::vec(1i64..1_000, 1..20)
        ) {
            let mut entity = InventoryItem::create(create_cmd("Widget")).unwrap();
            for (i, delta) in deltas.iter().enumerate() {
                execute(&mut entity, &adjust(*delta, i as i64 + 1)).unwrap();
            }

            let mut sink = InMemoryEventSink::new();
            entity.changeset().commit_with(&mut sink, &NeverCancel).unwrap();
            let restored = InventoryEntity::from_history(sink.into_events()).unwrap();

            prop_assert_eq!(restored.state().stock(), deltas.iter().sum::<i64>());
            prop_assert_eq!(restored.events().count(), deltas.len() + 1);
        }
    }
}
