use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Router,
};

use stockflow_core::ToolId;
use stockflow_inventory::ToolWrite;

use crate::app::dto::{self, CreatedView, ToolRequest, ToolView};
use crate::app::errors::ApiError;
use crate::app::extract::{Json, Path};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_tools).post(create_tool))
        .route("/:id", put(update_tool).delete(delete_tool))
}

pub async fn list_tools(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<impl IntoResponse, ApiError> {
    let tools = services.tools.list_tools().await?;
    Ok(dto::ok(
        tools.into_iter().map(ToolView::from).collect::<Vec<_>>(),
    ))
}

/// 201 for a new tool; 200 with the existing id when the name and supplier
/// are already listed.
pub async fn create_tool(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<ToolRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (status, message, tool) = match services.tools.create_tool(body.into()).await? {
        ToolWrite::Created(tool) => (StatusCode::CREATED, "Outil ajouté", tool),
        ToolWrite::Existing(tool) => (StatusCode::OK, "Outil similaire déjà existant", tool),
    };
    Ok((
        status,
        dto::ok_with_message(
            message,
            CreatedView {
                id: tool.id.get(),
                photos_paths: None,
            },
        ),
    ))
}

pub async fn update_tool(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<i64>,
    Json(body): Json<ToolRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tool = services
        .tools
        .update_tool(ToolId::new(id), body.into())
        .await?;
    Ok(dto::ok_with_message("Outil mis à jour", ToolView::from(tool)))
}

pub async fn delete_tool(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    services.tools.delete_tool(ToolId::new(id)).await?;
    Ok(dto::done("Outil supprimé"))
}
