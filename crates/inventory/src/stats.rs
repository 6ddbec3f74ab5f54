use serde::Serialize;

use crate::item::InventoryItem;
use crate::status::StockStatus;

/// Dashboard counters, computed with the same classifier as every listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InventoryStats {
    pub total_items: u64,
    pub available_items: u64,
    pub low_stock_items: u64,
    pub out_of_stock_items: u64,
}

impl InventoryStats {
    pub fn from_items<'a>(items: impl IntoIterator<Item = &'a InventoryItem>) -> Self {
        items.into_iter().fold(Self::default(), |mut acc, item| {
            acc.record(item.status());
            acc
        })
    }

    pub fn record(&mut self, status: StockStatus) {
        self.total_items += 1;
        match status {
            StockStatus::Available => self.available_items += 1,
            StockStatus::LowStock => self.low_stock_items += 1,
            StockStatus::OutOfStock => self.out_of_stock_items += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockflow_core::InventoryItemId;

    fn item(id: i64, stock: i64, threshold: i64) -> InventoryItem {
        InventoryItem {
            id: InventoryItemId::new(id),
            material: format!("m{id}"),
            supplier: "s".into(),
            category: "c".into(),
            stock,
            threshold,
            price: None,
        }
    }

    #[test]
    fn counts_each_status_once() {
        let items = [item(1, 0, 5), item(2, 3, 5), item(3, 5, 5), item(4, 0, 0)];
        let stats = InventoryStats::from_items(&items);
        assert_eq!(
            stats,
            InventoryStats {
                total_items: 4,
                available_items: 1,
                low_stock_items: 1,
                out_of_stock_items: 2,
            }
        );
    }
}
