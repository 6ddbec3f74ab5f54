use axum::extract::Multipart;

use stockflow_infra::LifecycleService;
use stockflow_lifecycle::PhotoSet;

use crate::app::dto::LifecycleFieldsRequest;
use crate::app::errors::ApiError;

/// Multipart form of a lifecycle record: text fields plus `photo` (primary)
/// and `additional_photos` files.
#[derive(Debug, Default)]
pub struct LifecycleUpload {
    pub fields: LifecycleFieldsRequest,
    pub photos: PhotoSet,
}

/// Read the form, storing each file as it arrives. On any failure the files
/// already stored are removed again.
pub async fn read_lifecycle_upload(
    lifecycle: &LifecycleService,
    mut multipart: Multipart,
) -> Result<LifecycleUpload, ApiError> {
    let mut upload = LifecycleUpload::default();

    let result = async {
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "photo" | "additional_photos" | "additional_photos[]" => {
                    let file_name = field.file_name().unwrap_or_default().to_string();
                    let bytes = field.bytes().await?;
                    // Browsers send an empty part for an untouched file input.
                    if bytes.is_empty() {
                        continue;
                    }
                    let reference = lifecycle.store_upload(&file_name, &bytes).await?;
                    if name == "photo" && upload.photos.primary.is_none() {
                        upload.photos.primary = Some(reference);
                    } else {
                        upload.photos.additional.push(reference);
                    }
                }
                "product" => upload.fields.product = Some(field.text().await?),
                "supplier" => upload.fields.supplier = Some(field.text().await?),
                "client" => upload.fields.client = Some(field.text().await?),
                "date" => upload.fields.date = Some(field.text().await?),
                _ => {}
            }
        }
        Ok::<(), ApiError>(())
    }
    .await;

    match result {
        Ok(()) => Ok(upload),
        Err(e) => {
            lifecycle.discard_uploads(&upload.photos).await;
            Err(e)
        }
    }
}
