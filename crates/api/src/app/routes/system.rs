use axum::{extract::Extension, response::IntoResponse};
use serde_json::json;

use stockflow_auth::Session;

use crate::app::dto;
use crate::app::errors::ApiError;

pub async fn health() -> impl IntoResponse {
    dto::ok(json!({ "status": "ok" }))
}

pub async fn whoami(Extension(session): Extension<Session>) -> impl IntoResponse {
    dto::ok(json!({
        "principal_id": session.principal_id().to_string(),
        "roles": session.roles().iter().map(|r| r.as_str()).collect::<Vec<_>>(),
    }))
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound("route not found".into())
}
