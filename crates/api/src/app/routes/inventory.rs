use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Router,
};
use serde_json::json;

use stockflow_core::InventoryItemId;
use stockflow_inventory::NewInventoryItem;

use crate::app::dto::{self, CreatedView, InventoryItemView, UpdateItemRequest};
use crate::app::errors::ApiError;
use crate::app::extract::{Json, Path};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_items).post(create_item))
        .route("/:id", put(update_item).delete(delete_item))
}

pub async fn list_items(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<impl IntoResponse, ApiError> {
    let items = services.inventory.list_items().await?;
    Ok(dto::ok(
        items
            .into_iter()
            .map(InventoryItemView::from)
            .collect::<Vec<_>>(),
    ))
}

pub async fn create_item(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<NewInventoryItem>,
) -> Result<impl IntoResponse, ApiError> {
    let write = services.inventory.create_item(body).await?;
    Ok((
        StatusCode::CREATED,
        dto::ok_with_message(
            "Article ajouté",
            CreatedView {
                id: write.item.id.get(),
                photos_paths: None,
            },
        ),
    ))
}

pub async fn update_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateItemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let write = services
        .inventory
        .update_item(InventoryItemId::new(id), body.into())
        .await?;
    Ok(dto::ok_with_message(
        "Article mis à jour",
        json!({
            "id": write.item.id.get(),
            "stock": write.item.stock,
            "threshold": write.item.threshold,
            "status": write.item.status().label(),
        }),
    ))
}

pub async fn delete_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    services.inventory.delete_item(InventoryItemId::new(id)).await?;
    Ok(dto::done("Article supprimé"))
}

pub async fn stats(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(dto::ok(services.inventory.stats().await?))
}
