use std::sync::Arc;

use axum::{
    extract::{Extension, Multipart},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Router,
};

use stockflow_core::LifecycleItemId;
use stockflow_lifecycle::LifecycleStatus;

use super::common::read_lifecycle_upload;
use super::received::delete_in;
use crate::app::dto::{self, DefectiveView, MarkDefectiveRequest};
use crate::app::errors::ApiError;
use crate::app::extract::{Json, Path};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_defective).post(mark_defective))
        .route("/direct", post(add_direct))
        .route("/:id", delete(delete_defective))
}

pub async fn list_defective(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<impl IntoResponse, ApiError> {
    let items = services.lifecycle.list(LifecycleStatus::Defective).await?;
    Ok(dto::ok(items.into_iter().map(DefectiveView::from).collect::<Vec<_>>()))
}

/// Move a received item to the defective collection.
pub async fn mark_defective(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<MarkDefectiveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let item = services
        .lifecycle
        .mark_defective(LifecycleItemId::new(body.id))
        .await?;
    Ok(dto::ok_with_message("Produit marqué défectueux", DefectiveView::from(item)))
}

/// Register a defective item that was never received.
pub async fn add_direct(
    Extension(services): Extension<Arc<AppServices>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let upload = read_lifecycle_upload(&services.lifecycle, multipart).await?;
    let fields = match upload.fields.into_fields() {
        Ok(fields) => fields,
        Err(e) => {
            services.lifecycle.discard_uploads(&upload.photos).await;
            return Err(e.into());
        }
    };
    let item = services
        .lifecycle
        .add_defective_direct(fields, upload.photos)
        .await?;
    Ok((
        StatusCode::CREATED,
        dto::ok_with_message("Produit défectueux ajouté", DefectiveView::from(item)),
    ))
}

pub async fn delete_defective(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    delete_in(&services, LifecycleStatus::Defective, id).await?;
    Ok(dto::done("Produit supprimé"))
}
