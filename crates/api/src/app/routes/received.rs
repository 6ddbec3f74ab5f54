use std::sync::Arc;

use axum::{
    extract::{Extension, Multipart},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use serde_json::json;

use stockflow_core::LifecycleItemId;
use stockflow_lifecycle::{Intake, LifecycleStatus};

use super::common::read_lifecycle_upload;
use crate::app::dto::{self, CreatedView, LifecycleFieldsRequest, ReceivedView};
use crate::app::errors::ApiError;
use crate::app::extract::{Json, Path};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_received).post(intake))
        .route("/:id", put(edit_received).delete(delete_received))
        .route("/:id/photos", post(add_photos))
}

pub async fn list_received(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<impl IntoResponse, ApiError> {
    let items = services.lifecycle.list(LifecycleStatus::Received).await?;
    Ok(dto::ok(items.into_iter().map(ReceivedView::from).collect::<Vec<_>>()))
}

pub async fn intake(
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

    let intake = services.lifecycle.intake(fields, upload.photos).await?;
    let (status, message) = match &intake {
        Intake::Created(_) => (StatusCode::CREATED, "Produit reçu enregistré"),
        Intake::Existing(_) => (StatusCode::OK, "Produit déjà enregistré"),
    };
    let item = intake.item();
    Ok((
        status,
        dto::ok_with_message(
            message,
            CreatedView {
                id: item.id.get(),
                photos_paths: Some(item.photos_paths()),
            },
        ),
    ))
}

pub async fn edit_received(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<i64>,
    Json(body): Json<LifecycleFieldsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let item = services
        .lifecycle
        .edit_details(LifecycleItemId::new(id), body.into_fields()?)
        .await?;
    Ok(dto::ok_with_message("Produit mis à jour", ReceivedView::from(item)))
}

pub async fn add_photos(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let upload = read_lifecycle_upload(&services.lifecycle, multipart).await?;
    if upload.photos.is_empty() {
        return Err(ApiError::validation("no photo uploaded"));
    }
    let photos_paths = services
        .lifecycle
        .add_photos(
            LifecycleItemId::new(id),
            upload.photos.primary,
            upload.photos.additional,
        )
        .await?;
    Ok(dto::ok_with_message(
        "Photos ajoutées",
        json!({ "photos_paths": photos_paths }),
    ))
}

pub async fn delete_received(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    delete_in(&services, LifecycleStatus::Received, id).await?;
    Ok(dto::done("Produit supprimé"))
}

/// Delete a record from one collection; an id living in another collection
/// is reported as missing.
pub(crate) async fn delete_in(
    services: &AppServices,
    status: LifecycleStatus,
    id: i64,
) -> Result<(), ApiError> {
    if services
        .lifecycle
        .delete(status, LifecycleItemId::new(id))
        .await?
    {
        Ok(())
    } else {
        Err(ApiError::NotFound(format!("{} item not found: {id}", status.as_str())))
    }
}
