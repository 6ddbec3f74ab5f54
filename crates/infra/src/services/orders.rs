use tracing::{info, instrument};

use stockflow_core::{InventoryItemId, SharedClock};
use stockflow_inventory::{
    ActiveOrder, InventoryListing, InventoryPatch, InventoryStats, NewInventoryItem, Order,
    OrderEffect, OrderUpsert, UpsertAction,
};

use super::ServiceResult;
use crate::store::{InventoryRepository, ItemWrite, OrderRepository, SharedStore};

/// Inventory items and their reorders.
#[derive(Clone)]
pub struct InventoryService {
    store: SharedStore,
    clock: SharedClock,
}

impl InventoryService {
    pub fn new(store: SharedStore, clock: SharedClock) -> Self {
        Self { store, clock }
    }

    #[instrument(skip(self, new), err)]
    pub async fn create_item(&self, new: NewInventoryItem) -> ServiceResult<ItemWrite> {
        let write = self.store.create_item(new, self.clock.now()).await?;
        info!(inventory_id = %write.item.id, "inventory item created");
        Ok(write)
    }

    pub async fn list_items(&self) -> ServiceResult<Vec<InventoryListing>> {
        Ok(self.store.list_items().await?)
    }

    /// Apply a partial update; an order whose item is back at or above
    /// threshold is removed in the same unit of work.
    #[instrument(skip(self, patch), fields(inventory_id = %id), err)]
    pub async fn update_item(
        &self,
        id: InventoryItemId,
        patch: InventoryPatch,
    ) -> ServiceResult<ItemWrite> {
        let write = self.store.update_item(id, &patch, self.clock.now()).await?;
        for effect in &write.effects {
            match effect {
                OrderEffect::CancelOrder(inventory_id) => {
                    info!(inventory_id = %inventory_id, "order removed, stock replenished")
                }
            }
        }
        Ok(write)
    }

    #[instrument(skip(self), fields(inventory_id = %id), err)]
    pub async fn delete_item(&self, id: InventoryItemId) -> ServiceResult<()> {
        self.store.delete_item(id).await?;
        info!(inventory_id = %id, "inventory item deleted");
        Ok(())
    }

    pub async fn stats(&self) -> ServiceResult<InventoryStats> {
        Ok(self.store.inventory_stats().await?)
    }

    /// Mark an item as ordered. Without a quantity, a new order uses the
    /// suggested quantity and an existing one keeps its amount.
    #[instrument(skip(self), fields(inventory_id = %inventory_id), err)]
    pub async fn set_order(
        &self,
        inventory_id: InventoryItemId,
        quantity: Option<i64>,
    ) -> ServiceResult<(Order, UpsertAction)> {
        let (order, action) = self
            .store
            .upsert_order(
                OrderUpsert {
                    inventory_id,
                    quantity,
                },
                self.clock.now(),
            )
            .await?;
        info!(
            inventory_id = %inventory_id,
            order_id = %order.id,
            quantity = order.ordered_quantity,
            action = action.as_str(),
            "order saved"
        );
        Ok((order, action))
    }

    /// Clear the ordered flag. No-op when the item has no order row.
    #[instrument(skip(self), fields(inventory_id = %inventory_id), err)]
    pub async fn unset_order(&self, inventory_id: InventoryItemId) -> ServiceResult<Option<Order>> {
        Ok(self.store.deactivate_order(inventory_id).await?)
    }

    #[instrument(skip(self), fields(inventory_id = %inventory_id), err)]
    pub async fn delete_order(&self, inventory_id: InventoryItemId) -> ServiceResult<bool> {
        Ok(self.store.delete_order(inventory_id).await?)
    }

    pub async fn list_active_orders(&self) -> ServiceResult<Vec<ActiveOrder>> {
        Ok(self.store.list_active_orders().await?)
    }
}
