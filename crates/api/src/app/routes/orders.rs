use std::sync::Arc;

use axum::{
    extract::Extension,
    response::IntoResponse,
    routing::{delete, get},
    Router,
};

use stockflow_core::InventoryItemId;

use crate::app::dto::{self, ActiveOrderView, CreateOrderRequest, OrderWriteView, UpdateOrderRequest};
use crate::app::errors::ApiError;
use crate::app::extract::{Json, Path};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_orders).post(create_order).put(update_order))
        .route("/:inventory_id", delete(delete_order))
}

pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<impl IntoResponse, ApiError> {
    let orders = services.inventory.list_active_orders().await?;
    Ok(dto::ok(
        orders
            .into_iter()
            .map(ActiveOrderView::from)
            .collect::<Vec<_>>(),
    ))
}

pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (order, action) = services
        .inventory
        .set_order(InventoryItemId::new(body.inventory_id), body.ordered_quantity)
        .await?;
    Ok(dto::ok_with_message(
        "Commande enregistrée",
        OrderWriteView::upserted(order, action),
    ))
}

/// Check (`is_ordered: true`) or uncheck an item's order.
pub async fn update_order(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<UpdateOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let inventory_id = InventoryItemId::new(body.inventory_id);
    if body.is_ordered {
        let (order, action) = services
            .inventory
            .set_order(inventory_id, body.ordered_quantity)
            .await?;
        Ok(dto::ok_with_message(
            "Commande enregistrée",
            OrderWriteView::upserted(order, action),
        ))
    } else {
        let order = services.inventory.unset_order(inventory_id).await?;
        Ok(dto::ok_with_message(
            "Commande annulée",
            OrderWriteView::unchecked(order),
        ))
    }
}

pub async fn delete_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(inventory_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    if !services
        .inventory
        .delete_order(InventoryItemId::new(inventory_id))
        .await?
    {
        return Err(ApiError::NotFound(format!(
            "order not found for inventory item {inventory_id}"
        )));
    }
    Ok(dto::done("Commande supprimée"))
}
