use std::sync::Arc;

use axum::{
    extract::Extension,
    response::IntoResponse,
    routing::{delete, get},
    Router,
};

use stockflow_core::LifecycleItemId;
use stockflow_lifecycle::{Installation, LifecycleStatus};

use super::received::delete_in;
use crate::app::dto::{self, InstallRequest, InstalledView};
use crate::app::errors::ApiError;
use crate::app::extract::{Json, Path};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_installed).post(install))
        .route("/:id", delete(delete_installed))
}

pub async fn list_installed(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<impl IntoResponse, ApiError> {
    let items = services.lifecycle.list(LifecycleStatus::Installed).await?;
    Ok(dto::ok(items.into_iter().map(InstalledView::from).collect::<Vec<_>>()))
}

pub async fn install(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<InstallRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let item = services
        .lifecycle
        .mark_installed(
            LifecycleItemId::new(body.id),
            Installation {
                quantity: body.quantity,
                client: body.client,
                photos: body.photos_paths,
            },
        )
        .await?;
    Ok(dto::ok_with_message("Produit installé", InstalledView::from(item)))
}

pub async fn delete_installed(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    delete_in(&services, LifecycleStatus::Installed, id).await?;
    Ok(dto::done("Produit supprimé"))
}
