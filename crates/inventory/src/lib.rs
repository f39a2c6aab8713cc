//! Inventory domain module (event-sourced).
//!
//! A reference aggregate built on `chronicle-entity`: business rules decide
//! which payload a command produces, and the engine chains, validates and
//! records it. No IO, no storage.

pub mod item;

pub use item::{
    AdjustStock, CreateItem, InventoryCommand, InventoryEntity, InventoryError, InventoryEvent,
    InventoryItem, InventoryItemEvent, ItemCreated, ItemRenamed, RenameItem, StockAdjusted,
    execute,
};
