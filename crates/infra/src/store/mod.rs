//! Persistence seam.
//!
//! Every multi-record operation is a single trait method so that each
//! implementation can make it atomic: one transaction in Postgres, one write
//! lock in memory. Domain rules are evaluated inside that unit of work; the
//! stores only decide *where* state lives.

mod in_memory;
mod postgres;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use stockflow_core::{DomainError, InventoryItemId, LifecycleItemId, ToolId};
use stockflow_events::{EventHandler, collect_effects};
use stockflow_inventory::{
    ActiveOrder, InventoryItem, InventoryListing, InventoryPatch, InventoryStats,
    NewInventoryItem, Order, OrderEffect, OrderUpsert, ReconcileOrders, StockChanged, Tool,
    ToolInput, ToolWrite, UpsertAction,
};
use stockflow_lifecycle::{
    Installation, Intake, LifecycleDetails, LifecycleItem, LifecycleStatus, NewLifecycleItem,
    Transition,
};
use stockflow_notifications::{NewNotificationRecord, NotificationRecord};

/// Store-level error.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A domain rule rejected the operation (validation, missing record,
    /// uniqueness conflict or a lost race).
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The backing storage failed.
    #[error("persistence error: {0}")]
    Persistence(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Handler type reacting to stock writes.
pub type StockHandler = dyn EventHandler<Ev = StockChanged, Effect = OrderEffect>;

/// The handlers every inventory write runs before committing.
#[derive(Clone)]
pub struct StockHandlers {
    handlers: Vec<Arc<StockHandler>>,
}

impl Default for StockHandlers {
    fn default() -> Self {
        Self {
            handlers: vec![Arc::new(ReconcileOrders)],
        }
    }
}

impl core::fmt::Debug for StockHandlers {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StockHandlers")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl StockHandlers {
    pub fn push(&mut self, handler: Arc<StockHandler>) {
        self.handlers.push(handler);
    }

    pub fn effects(&self, event: &StockChanged) -> Vec<OrderEffect> {
        let handlers: Vec<&StockHandler> = self.handlers.iter().map(|h| h.as_ref()).collect();
        collect_effects(&handlers, event)
    }
}

/// Result of a committed inventory write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemWrite {
    pub item: InventoryItem,
    pub event: StockChanged,
    /// Effects applied in the same unit of work.
    pub effects: Vec<OrderEffect>,
}

#[async_trait]
pub trait InventoryRepository: Send + Sync {
    async fn create_item(&self, new: NewInventoryItem, now: DateTime<Utc>)
    -> StoreResult<ItemWrite>;

    async fn get_item(&self, id: InventoryItemId) -> StoreResult<Option<InventoryItem>>;

    /// Every item with its active order, sorted by material.
    async fn list_items(&self) -> StoreResult<Vec<InventoryListing>>;

    /// Apply a patch and every stock handler effect atomically.
    async fn update_item(
        &self,
        id: InventoryItemId,
        patch: &InventoryPatch,
        now: DateTime<Utc>,
    ) -> StoreResult<ItemWrite>;

    /// Delete the item's order row, then the item.
    async fn delete_item(&self, id: InventoryItemId) -> StoreResult<()>;

    /// Items whose status is not available, in alert order.
    async fn items_needing_attention(&self) -> StoreResult<Vec<InventoryItem>>;

    async fn inventory_stats(&self) -> StoreResult<InventoryStats>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Insert or refresh the order of an item; the item must exist.
    async fn upsert_order(
        &self,
        upsert: OrderUpsert,
        now: DateTime<Utc>,
    ) -> StoreResult<(Order, UpsertAction)>;

    /// Clear `is_ordered`; `None` when the item has no order row.
    async fn deactivate_order(&self, inventory_id: InventoryItemId) -> StoreResult<Option<Order>>;

    /// Remove the order row; `false` when there was none.
    async fn delete_order(&self, inventory_id: InventoryItemId) -> StoreResult<bool>;

    async fn get_order(&self, inventory_id: InventoryItemId) -> StoreResult<Option<Order>>;

    /// Active orders, newest first.
    async fn list_active_orders(&self) -> StoreResult<Vec<ActiveOrder>>;
}

#[async_trait]
pub trait LifecycleRepository: Send + Sync {
    /// Create a received record unless an identical one exists.
    async fn intake(&self, new: NewLifecycleItem, now: DateTime<Utc>) -> StoreResult<Intake>;

    /// Create a defective record with no received counterpart.
    async fn insert_defective(
        &self,
        new: NewLifecycleItem,
        now: DateTime<Utc>,
    ) -> StoreResult<LifecycleItem>;

    async fn get_lifecycle_item(&self, id: LifecycleItemId) -> StoreResult<Option<LifecycleItem>>;

    async fn list_lifecycle(&self, status: LifecycleStatus) -> StoreResult<Vec<LifecycleItem>>;

    /// Received → Installed, guarded on the current status.
    async fn install(
        &self,
        id: LifecycleItemId,
        installation: &Installation,
        now: DateTime<Utc>,
    ) -> StoreResult<Transition>;

    /// Received → Defective, guarded on the current status.
    async fn mark_defective(&self, id: LifecycleItemId, now: DateTime<Utc>)
    -> StoreResult<LifecycleItem>;

    async fn edit_details(
        &self,
        id: LifecycleItemId,
        details: LifecycleDetails,
    ) -> StoreResult<LifecycleItem>;

    /// Replace the primary photo if one is given and append the extras.
    async fn add_photos(
        &self,
        id: LifecycleItemId,
        primary: Option<String>,
        additional: Vec<String>,
    ) -> StoreResult<Transition>;

    /// Delete a record within its collection, returning what was removed.
    async fn delete_lifecycle_item(
        &self,
        status: LifecycleStatus,
        id: LifecycleItemId,
    ) -> StoreResult<Option<LifecycleItem>>;
}

#[async_trait]
pub trait ToolRepository: Send + Sync {
    /// Add a tool unless one with the same name and supplier exists.
    async fn create_tool(&self, input: ToolInput) -> StoreResult<ToolWrite>;

    /// Sorted by name.
    async fn list_tools(&self) -> StoreResult<Vec<Tool>>;

    /// Replace every field; taking another tool's name and supplier is a
    /// conflict.
    async fn update_tool(&self, id: ToolId, input: ToolInput) -> StoreResult<Tool>;

    /// `false` when there was no such tool.
    async fn delete_tool(&self, id: ToolId) -> StoreResult<bool>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn latest_notification_at(&self) -> StoreResult<Option<DateTime<Utc>>>;

    async fn append_notification(
        &self,
        record: NewNotificationRecord,
    ) -> StoreResult<NotificationRecord>;

    /// Newest first.
    async fn list_notifications(&self) -> StoreResult<Vec<NotificationRecord>>;
}

/// Everything the services need from persistence.
pub trait Store:
    InventoryRepository
    + OrderRepository
    + LifecycleRepository
    + ToolRepository
    + NotificationRepository
{
}

impl<T> Store for T where
    T: InventoryRepository
        + OrderRepository
        + LifecycleRepository
        + ToolRepository
        + NotificationRepository
{
}

pub type SharedStore = Arc<dyn Store>;

fn lifecycle_not_found(id: LifecycleItemId) -> StoreError {
    StoreError::Domain(DomainError::not_found("received item", id))
}

fn conflict(msg: impl Into<String>) -> StoreError {
    StoreError::Domain(DomainError::conflict(msg))
}

fn tool_not_found(id: ToolId) -> StoreError {
    StoreError::Domain(DomainError::not_found("tool", id))
}

fn item_not_found(id: InventoryItemId) -> StoreError {
    StoreError::Domain(DomainError::not_found("inventory item", id))
}
