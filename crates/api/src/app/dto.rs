use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use stockflow_core::DomainError;
use stockflow_inventory::{
    ActiveOrder, InventoryListing, InventoryPatch, Order, Tool, ToolInput, UpsertAction,
};
use stockflow_lifecycle::{LifecycleFields, LifecycleItem, LifecycleStatus};

pub const DATE_FORMAT: &str = "%d/%m/%Y";

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn format_datetime(at: DateTime<Utc>) -> String {
    format_date(at.date_naive())
}

/// Accepts `YYYY-MM-DD` (form inputs) and `dd/mm/YYYY` (as displayed).
pub fn parse_date(raw: &str) -> Result<NaiveDate, DomainError> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, DATE_FORMAT))
        .map_err(|_| DomainError::validation(format!("invalid date: {raw}")))
}

/// Distinguishes an absent field from an explicit `null`.
fn double_option<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

// -------------------------
// Envelope
// -------------------------

#[derive(Debug, Serialize)]
pub struct Success<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

pub fn ok<T>(data: T) -> axum::Json<Success<T>> {
    axum::Json(Success {
        success: true,
        message: None,
        data: Some(data),
    })
}

pub fn ok_with_message<T>(message: impl Into<String>, data: T) -> axum::Json<Success<T>> {
    axum::Json(Success {
        success: true,
        message: Some(message.into()),
        data: Some(data),
    })
}

pub fn done(message: impl Into<String>) -> axum::Json<Success<()>> {
    axum::Json(Success {
        success: true,
        message: Some(message.into()),
        data: None,
    })
}

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub material: Option<String>,
    pub supplier: Option<String>,
    pub category: Option<String>,
    pub stock: Option<i64>,
    pub threshold: Option<i64>,
    #[serde(default, deserialize_with = "double_option")]
    pub price: Option<Option<Decimal>>,
}

impl From<UpdateItemRequest> for InventoryPatch {
    fn from(req: UpdateItemRequest) -> Self {
        InventoryPatch {
            material: req.material,
            supplier: req.supplier,
            category: req.category,
            stock: req.stock,
            threshold: req.threshold,
            price: req.price,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub inventory_id: i64,
    pub ordered_quantity: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderRequest {
    pub inventory_id: i64,
    pub is_ordered: bool,
    pub ordered_quantity: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ToolRequest {
    pub name: String,
    pub supplier: String,
    pub quantity: i64,
}

impl From<ToolRequest> for ToolInput {
    fn from(req: ToolRequest) -> Self {
        ToolInput {
            name: req.name,
            supplier: req.supplier,
            quantity: req.quantity,
        }
    }
}

/// Received-item details as sent by JSON clients.
#[derive(Debug, Default, Deserialize)]
pub struct LifecycleFieldsRequest {
    pub product: Option<String>,
    pub supplier: Option<String>,
    pub client: Option<String>,
    pub date: Option<String>,
}

impl LifecycleFieldsRequest {
    pub fn into_fields(self) -> Result<LifecycleFields, DomainError> {
        let date = self
            .date
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .map(parse_date)
            .transpose()?;
        Ok(LifecycleFields {
            product: self.product,
            supplier: self.supplier,
            client: self.client,
            date,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct InstallRequest {
    pub id: i64,
    pub client: Option<String>,
    pub quantity: Option<i64>,
    pub photos_paths: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct MarkDefectiveRequest {
    pub id: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct TriggerQuery {
    pub token: Option<String>,
    pub cron_token: Option<String>,
}

impl TriggerQuery {
    pub fn token(self) -> Option<String> {
        self.token.or(self.cron_token)
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct InventoryItemView {
    pub id: i64,
    pub material: String,
    pub supplier: String,
    pub category: String,
    pub stock: i64,
    pub threshold: i64,
    pub price: Option<Decimal>,
    pub status: &'static str,
    pub is_ordered: bool,
    pub ordered_quantity: Option<i64>,
    pub ordered_date: Option<String>,
}

impl From<InventoryListing> for InventoryItemView {
    fn from(listing: InventoryListing) -> Self {
        let InventoryListing {
            item,
            status,
            active_order,
        } = listing;
        Self {
            id: item.id.get(),
            material: item.material,
            supplier: item.supplier,
            category: item.category,
            stock: item.stock,
            threshold: item.threshold,
            price: item.price,
            status: status.label(),
            is_ordered: active_order.is_some(),
            ordered_quantity: active_order.as_ref().map(|o| o.ordered_quantity),
            ordered_date: active_order.as_ref().map(|o| format_datetime(o.ordered_date)),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderView {
    pub id: i64,
    pub inventory_id: i64,
    pub ordered_quantity: i64,
    pub ordered_date: String,
    pub is_ordered: bool,
}

impl From<Order> for OrderView {
    fn from(order: Order) -> Self {
        Self {
            id: order.id.get(),
            inventory_id: order.inventory_id.get(),
            ordered_quantity: order.ordered_quantity,
            ordered_date: format_datetime(order.ordered_date),
            is_ordered: order.is_ordered,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderWriteView {
    pub action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<OrderView>,
}

impl OrderWriteView {
    pub fn upserted(order: Order, action: UpsertAction) -> Self {
        Self {
            action: action.as_str(),
            order: Some(order.into()),
        }
    }

    pub fn unchecked(order: Option<Order>) -> Self {
        Self {
            action: "unchecked",
            order: order.map(Into::into),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ActiveOrderView {
    #[serde(flatten)]
    pub order: OrderView,
    pub material: String,
    pub supplier: String,
    pub category: String,
    pub stock: i64,
    pub threshold: i64,
    pub status: &'static str,
}

impl From<ActiveOrder> for ActiveOrderView {
    fn from(active: ActiveOrder) -> Self {
        Self {
            order: active.order.into(),
            material: active.material,
            supplier: active.supplier,
            category: active.category,
            stock: active.stock,
            threshold: active.threshold,
            status: active.status.label(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReceivedView {
    pub id: i64,
    pub product: String,
    pub supplier: String,
    pub client: String,
    pub date: String,
    pub status: &'static str,
    pub photos_paths: Vec<String>,
}

impl From<LifecycleItem> for ReceivedView {
    fn from(item: LifecycleItem) -> Self {
        Self {
            id: item.id.get(),
            date: format_date(item.date),
            status: LifecycleStatus::Received.label(),
            photos_paths: item.photos_paths(),
            product: item.product,
            supplier: item.supplier,
            client: item.client,
        }
    }
}

/// Installed records carry no status field.
#[derive(Debug, Serialize)]
pub struct InstalledView {
    pub id: i64,
    pub received_id: Option<i64>,
    pub product: String,
    pub supplier: String,
    pub client: String,
    pub quantity: i64,
    pub date: Option<String>,
    pub installed_date: Option<DateTime<Utc>>,
    pub photos_paths: Vec<String>,
}

impl From<LifecycleItem> for InstalledView {
    fn from(item: LifecycleItem) -> Self {
        Self {
            id: item.id.get(),
            received_id: item.received_id.map(|id| id.get()),
            quantity: item.quantity,
            date: item.installed_date.map(format_datetime),
            installed_date: item.installed_date,
            photos_paths: item.photos_paths(),
            product: item.product,
            supplier: item.supplier,
            client: item.client,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DefectiveView {
    pub id: i64,
    pub received_id: Option<i64>,
    pub product: String,
    pub supplier: String,
    pub client: String,
    pub date: String,
    pub defective_date: Option<String>,
    pub status: &'static str,
    pub photos_paths: Vec<String>,
}

impl From<LifecycleItem> for DefectiveView {
    fn from(item: LifecycleItem) -> Self {
        Self {
            id: item.id.get(),
            received_id: item.received_id.map(|id| id.get()),
            date: format_date(item.date),
            defective_date: item.defective_date.map(format_datetime),
            status: LifecycleStatus::Defective.label(),
            photos_paths: item.photos_paths(),
            product: item.product,
            supplier: item.supplier,
            client: item.client,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ToolView {
    pub id: i64,
    pub name: String,
    pub supplier: String,
    pub quantity: i64,
}

impl From<Tool> for ToolView {
    fn from(tool: Tool) -> Self {
        Self {
            id: tool.id.get(),
            name: tool.name,
            supplier: tool.supplier,
            quantity: tool.quantity,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedView {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photos_paths: Option<Vec<String>>,
}
