use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockflow_core::{DomainError, DomainResult, InventoryItemId};
use stockflow_events::Event;

use crate::status::{StockStatus, classify};

/// A stocked part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: InventoryItemId,
    pub material: String,
    pub supplier: String,
    pub category: String,
    pub stock: i64,
    pub threshold: i64,
    pub price: Option<Decimal>,
}

impl InventoryItem {
    pub fn status(&self) -> StockStatus {
        classify(self.stock, self.threshold)
    }

    /// Apply a partial update, returning the resulting item.
    ///
    /// The patch must carry at least one field and the result must satisfy the
    /// same rules as a freshly created item.
    pub fn patched(&self, patch: &InventoryPatch) -> DomainResult<InventoryItem> {
        if patch.is_empty() {
            return Err(DomainError::validation("no fields to update"));
        }

        let mut next = self.clone();
        if let Some(material) = &patch.material {
            next.material = material.trim().to_string();
        }
        if let Some(supplier) = &patch.supplier {
            next.supplier = supplier.trim().to_string();
        }
        if let Some(category) = &patch.category {
            next.category = category.trim().to_string();
        }
        if let Some(stock) = patch.stock {
            next.stock = stock;
        }
        if let Some(threshold) = patch.threshold {
            next.threshold = threshold;
        }
        if let Some(price) = patch.price {
            next.price = price;
        }

        validate_fields(
            &next.material,
            &next.supplier,
            &next.category,
            next.stock,
            next.threshold,
            next.price,
        )?;
        Ok(next)
    }

    /// The event raised by any successful write to this item.
    pub fn stock_changed(&self, occurred_at: DateTime<Utc>) -> StockChanged {
        StockChanged {
            inventory_id: self.id,
            stock: self.stock,
            threshold: self.threshold,
            occurred_at,
        }
    }
}

/// Input for creating an inventory item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewInventoryItem {
    pub material: String,
    pub supplier: String,
    pub category: String,
    pub stock: i64,
    pub threshold: i64,
    pub price: Option<Decimal>,
}

impl NewInventoryItem {
    /// Trim text fields and check every invariant.
    pub fn validated(self) -> DomainResult<Self> {
        let item = Self {
            material: self.material.trim().to_string(),
            supplier: self.supplier.trim().to_string(),
            category: self.category.trim().to_string(),
            ..self
        };
        validate_fields(
            &item.material,
            &item.supplier,
            &item.category,
            item.stock,
            item.threshold,
            item.price,
        )?;
        Ok(item)
    }

    pub fn into_item(self, id: InventoryItemId) -> InventoryItem {
        InventoryItem {
            id,
            material: self.material,
            supplier: self.supplier,
            category: self.category,
            stock: self.stock,
            threshold: self.threshold,
            price: self.price,
        }
    }
}

/// Partial update of an inventory item; `None` leaves a field untouched.
///
/// `price` is doubly optional: `Some(None)` clears the price.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventoryPatch {
    pub material: Option<String>,
    pub supplier: Option<String>,
    pub category: Option<String>,
    pub stock: Option<i64>,
    pub threshold: Option<i64>,
    pub price: Option<Option<Decimal>>,
}

impl InventoryPatch {
    pub fn is_empty(&self) -> bool {
        self.material.is_none()
            && self.supplier.is_none()
            && self.category.is_none()
            && self.stock.is_none()
            && self.threshold.is_none()
            && self.price.is_none()
    }
}

fn validate_fields(
    material: &str,
    supplier: &str,
    category: &str,
    stock: i64,
    threshold: i64,
    price: Option<Decimal>,
) -> DomainResult<()> {
    if material.is_empty() {
        return Err(DomainError::validation("material is required"));
    }
    if supplier.is_empty() {
        return Err(DomainError::validation("supplier is required"));
    }
    if category.is_empty() {
        return Err(DomainError::validation("category is required"));
    }
    if stock < 0 {
        return Err(DomainError::validation("stock cannot be negative"));
    }
    if threshold < 0 {
        return Err(DomainError::validation("threshold cannot be negative"));
    }
    if price.is_some_and(|p| p.is_sign_negative()) {
        return Err(DomainError::validation("price cannot be negative"));
    }
    Ok(())
}

/// Event: StockChanged.
///
/// Raised by every committed write to an inventory item, carrying the stock
/// and threshold the item holds after the write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockChanged {
    pub inventory_id: InventoryItemId,
    pub stock: i64,
    pub threshold: i64,
    pub occurred_at: DateTime<Utc>,
}

impl Event for StockChanged {
    fn event_type(&self) -> &'static str {
        "inventory.item.stock_changed"
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}
