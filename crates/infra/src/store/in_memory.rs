use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use stockflow_core::{InventoryItemId, LifecycleItemId, NotificationId, OrderId, ToolId};
use stockflow_inventory::{
    ActiveOrder, InventoryItem, InventoryListing, InventoryPatch, InventoryStats,
    NewInventoryItem, Order, OrderEffect, OrderUpsert, Tool, ToolInput, ToolWrite, UpsertAction,
    duplicate_tool,
};
use stockflow_lifecycle::{
    Installation, Intake, LifecycleDetails, LifecycleItem, LifecycleStatus, NewLifecycleItem,
    Transition,
};
use stockflow_notifications::{NewNotificationRecord, NotificationRecord, attention_order};

use super::{
    InventoryRepository, ItemWrite, LifecycleRepository, NotificationRepository,
    OrderRepository, StockHandlers, StoreError, StoreResult, ToolRepository, conflict,
    item_not_found, lifecycle_not_found, tool_not_found,
};

#[derive(Debug, Default)]
struct Tables {
    last_id: i64,
    items: BTreeMap<InventoryItemId, InventoryItem>,
    orders: BTreeMap<InventoryItemId, Order>,
    lifecycle: BTreeMap<LifecycleItemId, LifecycleItem>,
    tools: BTreeMap<ToolId, Tool>,
    notifications: Vec<NotificationRecord>,
}

impl Tables {
    /// One sequence shared by every table.
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn apply(&mut self, effects: &[OrderEffect]) {
        for effect in effects {
            match effect {
                OrderEffect::CancelOrder(inventory_id) => {
                    self.orders.remove(inventory_id);
                }
            }
        }
    }
}

/// In-memory store for tests/dev.
///
/// All tables sit behind one lock, so each trait method is a single atomic
/// unit of work. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    handlers: StockHandlers,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handlers(handlers: StockHandlers) -> Self {
        Self {
            tables: RwLock::default(),
            handlers,
        }
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| StoreError::Persistence("store lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| StoreError::Persistence("store lock poisoned".to_string()))
    }
}

#[async_trait]
impl InventoryRepository for InMemoryStore {
    async fn create_item(
        &self,
        new: NewInventoryItem,
        now: DateTime<Utc>,
    ) -> StoreResult<ItemWrite> {
        let new = new.validated()?;
        let mut t = self.write()?;
        let id = InventoryItemId::new(t.next_id());
        let item = new.into_item(id);
        let event = item.stock_changed(now);
        let effects = self.handlers.effects(&event);
        t.apply(&effects);
        t.items.insert(id, item.clone());
        Ok(ItemWrite {
            item,
            event,
            effects,
        })
    }

    async fn get_item(&self, id: InventoryItemId) -> StoreResult<Option<InventoryItem>> {
        Ok(self.read()?.items.get(&id).cloned())
    }

    async fn list_items(&self) -> StoreResult<Vec<InventoryListing>> {
        let t = self.read()?;
        let mut listings: Vec<InventoryListing> = t
            .items
            .values()
            .map(|item| InventoryListing::new(item.clone(), t.orders.get(&item.id).cloned()))
            .collect();
        listings.sort_by(|a, b| {
            a.item
                .material
                .cmp(&b.item.material)
                .then(a.item.id.cmp(&b.item.id))
        });
        Ok(listings)
    }

    async fn update_item(
        &self,
        id: InventoryItemId,
        patch: &InventoryPatch,
        now: DateTime<Utc>,
    ) -> StoreResult<ItemWrite> {
        let mut t = self.write()?;
        let current = t.items.get(&id).ok_or_else(|| item_not_found(id))?;
        let item = current.patched(patch)?;
        let event = item.stock_changed(now);
        let effects = self.handlers.effects(&event);
        t.items.insert(id, item.clone());
        t.apply(&effects);
        Ok(ItemWrite {
            item,
            event,
            effects,
        })
    }

    async fn delete_item(&self, id: InventoryItemId) -> StoreResult<()> {
        let mut t = self.write()?;
        if !t.items.contains_key(&id) {
            return Err(item_not_found(id));
        }
        t.orders.remove(&id);
        t.items.remove(&id);
        Ok(())
    }

    async fn items_needing_attention(&self) -> StoreResult<Vec<InventoryItem>> {
        let t = self.read()?;
        Ok(attention_order(t.items.values().cloned()))
    }

    async fn inventory_stats(&self) -> StoreResult<InventoryStats> {
        Ok(InventoryStats::from_items(self.read()?.items.values()))
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn upsert_order(
        &self,
        upsert: OrderUpsert,
        now: DateTime<Utc>,
    ) -> StoreResult<(Order, UpsertAction)> {
        let upsert = upsert.validated()?;
        let mut t = self.write()?;
        let item = t
            .items
            .get(&upsert.inventory_id)
            .cloned()
            .ok_or_else(|| item_not_found(upsert.inventory_id))?;

        if let Some(existing) = t.orders.get_mut(&upsert.inventory_id) {
            if let Some(q) = upsert.quantity {
                existing.ordered_quantity = q;
            }
            existing.ordered_date = now;
            existing.is_ordered = true;
            return Ok((existing.clone(), UpsertAction::Updated));
        }

        let order = Order {
            id: OrderId::new(t.next_id()),
            inventory_id: item.id,
            ordered_quantity: upsert.initial_quantity(item.stock, item.threshold)?,
            ordered_date: now,
            is_ordered: true,
        };
        t.orders.insert(item.id, order.clone());
        Ok((order, UpsertAction::Created))
    }

    async fn deactivate_order(&self, inventory_id: InventoryItemId) -> StoreResult<Option<Order>> {
        let mut t = self.write()?;
        Ok(t.orders.get_mut(&inventory_id).map(|order| {
            order.is_ordered = false;
            order.clone()
        }))
    }

    async fn delete_order(&self, inventory_id: InventoryItemId) -> StoreResult<bool> {
        Ok(self.write()?.orders.remove(&inventory_id).is_some())
    }

    async fn get_order(&self, inventory_id: InventoryItemId) -> StoreResult<Option<Order>> {
        Ok(self.read()?.orders.get(&inventory_id).cloned())
    }

    async fn list_active_orders(&self) -> StoreResult<Vec<ActiveOrder>> {
        let t = self.read()?;
        let mut active: Vec<ActiveOrder> = t
            .orders
            .values()
            .filter(|o| o.is_ordered)
            .filter_map(|o| {
                t.items
                    .get(&o.inventory_id)
                    .map(|item| ActiveOrder::new(o.clone(), item))
            })
            .collect();
        active.sort_by(|a, b| {
            b.order
                .ordered_date
                .cmp(&a.order.ordered_date)
                .then(b.order.id.cmp(&a.order.id))
        });
        Ok(active)
    }
}

fn lifecycle_sort_key(item: &LifecycleItem) -> (Option<DateTime<Utc>>, chrono::NaiveDate) {
    match item.status {
        LifecycleStatus::Received => (None, item.date),
        LifecycleStatus::Installed => (item.installed_date, item.date),
        LifecycleStatus::Defective => (item.defective_date, item.date),
    }
}

#[async_trait]
impl LifecycleRepository for InMemoryStore {
    async fn intake(&self, new: NewLifecycleItem, now: DateTime<Utc>) -> StoreResult<Intake> {
        let mut t = self.write()?;
        if let Some(existing) = t
            .lifecycle
            .values()
            .find(|item| item.matches_intake(&new.details))
        {
            return Ok(Intake::Existing(existing.clone()));
        }
        let id = LifecycleItemId::new(t.next_id());
        let item = LifecycleItem::create(id, LifecycleStatus::Received, new, now);
        t.lifecycle.insert(id, item.clone());
        Ok(Intake::Created(item))
    }

    async fn insert_defective(
        &self,
        new: NewLifecycleItem,
        now: DateTime<Utc>,
    ) -> StoreResult<LifecycleItem> {
        let mut t = self.write()?;
        let id = LifecycleItemId::new(t.next_id());
        let item = LifecycleItem::create(id, LifecycleStatus::Defective, new, now);
        t.lifecycle.insert(id, item.clone());
        Ok(item)
    }

    async fn get_lifecycle_item(&self, id: LifecycleItemId) -> StoreResult<Option<LifecycleItem>> {
        Ok(self.read()?.lifecycle.get(&id).cloned())
    }

    async fn list_lifecycle(&self, status: LifecycleStatus) -> StoreResult<Vec<LifecycleItem>> {
        let t = self.read()?;
        let mut items: Vec<LifecycleItem> = t
            .lifecycle
            .values()
            .filter(|item| item.status == status)
            .cloned()
            .collect();
        items.sort_by(|a, b| {
            lifecycle_sort_key(b)
                .cmp(&lifecycle_sort_key(a))
                .then(b.id.cmp(&a.id))
        });
        Ok(items)
    }

    async fn install(
        &self,
        id: LifecycleItemId,
        installation: &Installation,
        now: DateTime<Utc>,
    ) -> StoreResult<Transition> {
        let mut t = self.write()?;
        let before = t
            .lifecycle
            .get(&id)
            .filter(|item| item.status == LifecycleStatus::Received)
            .ok_or_else(|| lifecycle_not_found(id))?
            .clone();
        let installed = before.install(installation, now)?;
        t.lifecycle.insert(id, installed.clone());
        Ok(Transition {
            before,
            after: installed,
        })
    }

    async fn mark_defective(
        &self,
        id: LifecycleItemId,
        now: DateTime<Utc>,
    ) -> StoreResult<LifecycleItem> {
        let mut t = self.write()?;
        let current = t
            .lifecycle
            .get(&id)
            .filter(|item| item.status == LifecycleStatus::Received)
            .ok_or_else(|| lifecycle_not_found(id))?;
        let defective = current.mark_defective(now)?;
        t.lifecycle.insert(id, defective.clone());
        Ok(defective)
    }

    async fn edit_details(
        &self,
        id: LifecycleItemId,
        details: LifecycleDetails,
    ) -> StoreResult<LifecycleItem> {
        let mut t = self.write()?;
        let current = t
            .lifecycle
            .get(&id)
            .filter(|item| item.status == LifecycleStatus::Received)
            .ok_or_else(|| lifecycle_not_found(id))?;
        if t
            .lifecycle
            .values()
            .any(|other| other.id != id && other.matches_intake(&details))
        {
            return Err(conflict("an identical received item already exists"));
        }
        let edited = current.edited(details)?;
        t.lifecycle.insert(id, edited.clone());
        Ok(edited)
    }

    async fn add_photos(
        &self,
        id: LifecycleItemId,
        primary: Option<String>,
        additional: Vec<String>,
    ) -> StoreResult<Transition> {
        let mut t = self.write()?;
        let item = t
            .lifecycle
            .get_mut(&id)
            .filter(|item| item.status == LifecycleStatus::Received)
            .ok_or_else(|| lifecycle_not_found(id))?;
        let before = item.clone();
        item.photos = std::mem::take(&mut item.photos)
            .replace_primary(primary)
            .merge_new_uploads(additional);
        Ok(Transition {
            before,
            after: item.clone(),
        })
    }

    async fn delete_lifecycle_item(
        &self,
        status: LifecycleStatus,
        id: LifecycleItemId,
    ) -> StoreResult<Option<LifecycleItem>> {
        let mut t = self.write()?;
        if t.lifecycle.get(&id).is_some_and(|item| item.status == status) {
            Ok(t.lifecycle.remove(&id))
        } else {
            Ok(None)
        }
    }
}

#[async_trait]
impl ToolRepository for InMemoryStore {
    async fn create_tool(&self, input: ToolInput) -> StoreResult<ToolWrite> {
        let input = input.validated()?;
        let mut t = self.write()?;
        if let Some(existing) = t.tools.values().find(|tool| tool.same_identity(&input)) {
            return Ok(ToolWrite::Existing(existing.clone()));
        }
        let id = ToolId::new(t.next_id());
        let tool = input.into_tool(id);
        t.tools.insert(id, tool.clone());
        Ok(ToolWrite::Created(tool))
    }

    async fn list_tools(&self) -> StoreResult<Vec<Tool>> {
        let mut tools: Vec<Tool> = self.read()?.tools.values().cloned().collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(tools)
    }

    async fn update_tool(&self, id: ToolId, input: ToolInput) -> StoreResult<Tool> {
        let input = input.validated()?;
        let mut t = self.write()?;
        if !t.tools.contains_key(&id) {
            return Err(tool_not_found(id));
        }
        if t
            .tools
            .values()
            .any(|other| other.id != id && other.same_identity(&input))
        {
            return Err(duplicate_tool().into());
        }
        let tool = input.into_tool(id);
        t.tools.insert(id, tool.clone());
        Ok(tool)
    }

    async fn delete_tool(&self, id: ToolId) -> StoreResult<bool> {
        Ok(self.write()?.tools.remove(&id).is_some())
    }
}

#[async_trait]
impl NotificationRepository for InMemoryStore {
    async fn latest_notification_at(&self) -> StoreResult<Option<DateTime<Utc>>> {
        Ok(self
            .read()?
            .notifications
            .iter()
            .map(|n| n.notification_date)
            .max())
    }

    async fn append_notification(
        &self,
        record: NewNotificationRecord,
    ) -> StoreResult<NotificationRecord> {
        let mut t = self.write()?;
        let id = NotificationId::new(t.next_id());
        let record = record.into_record(id);
        t.notifications.push(record.clone());
        Ok(record)
    }

    async fn list_notifications(&self) -> StoreResult<Vec<NotificationRecord>> {
        let mut records = self.read()?.notifications.clone();
        records.sort_by(|a, b| {
            b.notification_date
                .cmp(&a.notification_date)
                .then(b.id.cmp(&a.id))
        });
        Ok(records)
    }
}
