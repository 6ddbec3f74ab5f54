//! Stock status classifier.
//!
//! Status is always derived from `(stock, threshold)`; it is never stored.
//! The French labels are part of the wire contract and must not change.

use serde::{Deserialize, Serialize};

/// Derived availability of an inventory item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StockStatus {
    #[serde(rename = "Rupture")]
    OutOfStock,
    #[serde(rename = "Faible Stock")]
    LowStock,
    #[serde(rename = "Disponible")]
    Available,
}

impl StockStatus {
    pub const fn label(self) -> &'static str {
        match self {
            StockStatus::OutOfStock => "Rupture",
            StockStatus::LowStock => "Faible Stock",
            StockStatus::Available => "Disponible",
        }
    }

    /// Whether this status warrants a reorder / alert.
    pub const fn needs_attention(self) -> bool {
        !matches!(self, StockStatus::Available)
    }
}

impl core::fmt::Display for StockStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

/// Classify an item from its stock level and reorder threshold.
///
/// Negative stock is never admitted by validation; should one reach this
/// function it is treated as out of stock.
pub fn classify(stock: i64, threshold: i64) -> StockStatus {
    if stock <= 0 {
        StockStatus::OutOfStock
    } else if stock < threshold {
        StockStatus::LowStock
    } else {
        StockStatus::Available
    }
}
