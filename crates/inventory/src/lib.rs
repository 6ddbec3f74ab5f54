//! Inventory domain module.
//!
//! Business rules for stocked parts and their reorders, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage):
//! - [`status`]: the derived stock status classifier
//! - [`item`]: inventory items, their validation and the `StockChanged` event
//! - [`order`]: reorder rows, suggested quantities and order reconciliation
//! - [`stats`]: dashboard counters
//! - [`tool`]: the workshop tool list

pub mod item;
pub mod order;
pub mod stats;
pub mod status;
pub mod tool;

pub use item::{InventoryItem, InventoryPatch, NewInventoryItem, StockChanged};
pub use order::{
    ActiveOrder, InventoryListing, Order, OrderEffect, OrderUpsert, ReconcileOrders, UpsertAction,
    suggested_quantity,
};
pub use stats::InventoryStats;
pub use status::{StockStatus, classify};
pub use tool::{Tool, ToolInput, ToolWrite, duplicate_tool};
