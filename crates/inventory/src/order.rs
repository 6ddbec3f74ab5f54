//! Reorder rows and the rules that keep them consistent with stock levels.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::{DomainError, DomainResult, InventoryItemId, OrderId};
use stockflow_events::EventHandler;

use crate::item::{InventoryItem, StockChanged};
use crate::status::{StockStatus, classify};

/// A reorder row. At most one exists per inventory item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub inventory_id: InventoryItemId,
    pub ordered_quantity: i64,
    pub ordered_date: DateTime<Utc>,
    pub is_ordered: bool,
}

/// Request to mark an item as ordered.
///
/// Without a quantity, a new row falls back to [`suggested_quantity`] and an
/// existing row keeps its current quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderUpsert {
    pub inventory_id: InventoryItemId,
    pub quantity: Option<i64>,
}

impl OrderUpsert {
    pub fn validated(self) -> DomainResult<Self> {
        if let Some(q) = self.quantity {
            check_quantity(q)?;
        }
        Ok(self)
    }

    /// Quantity for a new order row: the explicit amount, else the
    /// suggestion. A suggestion below one is rejected like an explicit
    /// amount would be, so the caller has to name a quantity.
    pub fn initial_quantity(&self, stock: i64, threshold: i64) -> DomainResult<i64> {
        let quantity = self
            .quantity
            .unwrap_or_else(|| suggested_quantity(stock, threshold));
        check_quantity(quantity)?;
        Ok(quantity)
    }
}

fn check_quantity(quantity: i64) -> DomainResult<()> {
    if quantity < 1 {
        return Err(DomainError::validation(
            "ordered_quantity must be at least 1",
        ));
    }
    Ok(())
}

/// Whether an upsert inserted a new row or touched an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertAction {
    Created,
    Updated,
}

impl UpsertAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            UpsertAction::Created => "created",
            UpsertAction::Updated => "updated",
        }
    }
}

/// An active order joined with the item it replenishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveOrder {
    pub order: Order,
    pub material: String,
    pub supplier: String,
    pub category: String,
    pub stock: i64,
    pub threshold: i64,
    pub status: StockStatus,
}

impl ActiveOrder {
    pub fn new(order: Order, item: &InventoryItem) -> Self {
        Self {
            order,
            material: item.material.clone(),
            supplier: item.supplier.clone(),
            category: item.category.clone(),
            stock: item.stock,
            threshold: item.threshold,
            status: item.status(),
        }
    }
}

/// An inventory item as listed, with its active order if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryListing {
    pub item: InventoryItem,
    pub status: StockStatus,
    pub active_order: Option<Order>,
}

impl InventoryListing {
    /// Inactive orders are not shown against the item.
    pub fn new(item: InventoryItem, order: Option<Order>) -> Self {
        Self {
            status: item.status(),
            active_order: order.filter(|o| o.is_ordered),
            item,
        }
    }
}

/// Quantity proposed when an item is ordered without an explicit amount.
///
/// Out of stock: twice the threshold. Otherwise enough to clear the threshold
/// with a margin of ten. Zero or negative when stock is already well above
/// the threshold; [`OrderUpsert::initial_quantity`] refuses those.
pub fn suggested_quantity(stock: i64, threshold: i64) -> i64 {
    match classify(stock, threshold) {
        StockStatus::OutOfStock => threshold.saturating_mul(2),
        _ => threshold.saturating_sub(stock).saturating_add(10),
    }
}

/// Effect requested by [`ReconcileOrders`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderEffect {
    CancelOrder(InventoryItemId),
}

/// Drops the order of an item once its stock is back at or above threshold.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReconcileOrders;

impl EventHandler for ReconcileOrders {
    type Ev = StockChanged;
    type Effect = OrderEffect;

    fn handle(&self, event: &StockChanged) -> Vec<OrderEffect> {
        if event.stock >= event.threshold {
            vec![OrderEffect::CancelOrder(event.inventory_id)]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn changed(stock: i64, threshold: i64) -> StockChanged {
        StockChanged {
            inventory_id: InventoryItemId::new(7),
            stock,
            threshold,
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn suggested_quantity_reference_points() {
        assert_eq!(suggested_quantity(0, 5), 10);
        assert_eq!(suggested_quantity(2, 5), 13);
    }

    #[test]
    fn suggested_quantity_follows_the_formula_above_threshold() {
        assert_eq!(suggested_quantity(0, 0), 0);
        assert_eq!(suggested_quantity(20, 5), -5);
    }

    #[test]
    fn initial_quantity_rejects_an_empty_suggestion() {
        let upsert = OrderUpsert {
            inventory_id: InventoryItemId::new(7),
            quantity: None,
        };
        assert_eq!(upsert.initial_quantity(2, 5), Ok(13));
        assert_eq!(
            upsert.initial_quantity(20, 5),
            Err(DomainError::validation("ordered_quantity must be at least 1"))
        );

        let explicit = OrderUpsert {
            quantity: Some(3),
            ..upsert
        };
        assert_eq!(explicit.initial_quantity(20, 5), Ok(3));
    }

    #[test]
    fn reconcile_cancels_when_replenished() {
        let effects = ReconcileOrders.handle(&changed(5, 5));
        assert_eq!(effects, vec![OrderEffect::CancelOrder(InventoryItemId::new(7))]);
    }

    #[test]
    fn reconcile_keeps_order_while_low() {
        assert!(ReconcileOrders.handle(&changed(4, 5)).is_empty());
        assert!(ReconcileOrders.handle(&changed(0, 5)).is_empty());
    }

    #[test]
    fn upsert_rejects_zero_quantity() {
        let upsert = OrderUpsert {
            inventory_id: InventoryItemId::new(1),
            quantity: Some(0),
        };
        assert!(upsert.validated().is_err());
    }

    #[test]
    fn listing_hides_inactive_order() {
        let item = InventoryItem {
            id: InventoryItemId::new(1),
            material: "Joint".into(),
            supplier: "Somfy".into(),
            category: "Volets".into(),
            stock: 0,
            threshold: 3,
            price: None,
        };
        let order = Order {
            id: OrderId::new(1),
            inventory_id: item.id,
            ordered_quantity: 6,
            ordered_date: Utc::now(),
            is_ordered: false,
        };
        let listing = InventoryListing::new(item, Some(order));
        assert_eq!(listing.status, StockStatus::OutOfStock);
        assert!(listing.active_order.is_none());
    }

    #[test]
    fn upsert_action_wire_names() {
        assert_eq!(serde_json::to_string(&UpsertAction::Created).unwrap(), "\"created\"");
        assert_eq!(UpsertAction::Updated.as_str(), "updated");
    }

    proptest! {
        #[test]
        fn suggested_quantity_is_positive_below_threshold(stock in 0i64..100_000, gap in 1i64..100_000) {
            prop_assert!(suggested_quantity(stock, stock + gap) >= 1);
        }

        #[test]
        fn suggested_quantity_clears_threshold_when_low(stock in 1i64..10_000, gap in 1i64..10_000) {
            let threshold = stock + gap;
            prop_assert!(stock + suggested_quantity(stock, threshold) >= threshold + 10);
        }

        #[test]
        fn reconcile_agrees_with_classifier(stock in 0i64..1_000, threshold in 0i64..1_000) {
            let cancels = !ReconcileOrders.handle(&changed(stock, threshold)).is_empty();
            prop_assert_eq!(cancels, stock >= threshold);
        }
    }
}
