use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockflow_core::{InventoryItemId, NotificationId};
use stockflow_inventory::{InventoryItem, StockStatus};

/// State of one item at the moment an alert was sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSnapshot {
    pub id: InventoryItemId,
    pub material: String,
    pub supplier: String,
    pub category: String,
    pub stock: i64,
    pub threshold: i64,
    pub status: StockStatus,
    pub price: Option<Decimal>,
}

impl From<&InventoryItem> for ItemSnapshot {
    fn from(item: &InventoryItem) -> Self {
        Self {
            id: item.id,
            material: item.material.clone(),
            supplier: item.supplier.clone(),
            category: item.category.clone(),
            stock: item.stock,
            threshold: item.threshold,
            status: item.status(),
            price: item.price,
        }
    }
}

/// A sent alert, as appended to the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: NotificationId,
    pub notification_date: DateTime<Utc>,
    pub items_count: i64,
    pub items: Vec<ItemSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotificationRecord {
    pub notification_date: DateTime<Utc>,
    pub items: Vec<ItemSnapshot>,
}

impl NewNotificationRecord {
    pub fn new(notification_date: DateTime<Utc>, items: &[InventoryItem]) -> Self {
        Self {
            notification_date,
            items: items.iter().map(ItemSnapshot::from).collect(),
        }
    }

    pub fn items_count(&self) -> i64 {
        self.items.len() as i64
    }

    pub fn into_record(self, id: NotificationId) -> NotificationRecord {
        NotificationRecord {
            id,
            notification_date: self.notification_date,
            items_count: self.items_count(),
            items: self.items,
        }
    }
}
