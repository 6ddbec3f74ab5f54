use std::sync::Arc;

use axum::{
    extract::Extension,
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use tracing::warn;

use stockflow_auth::Session;

use crate::app::dto::{self, TriggerQuery};
use crate::app::errors::ApiError;
use crate::app::extract::Query;
use crate::app::services::AppServices;
use crate::middleware::require_admin;

/// Session-authenticated routes. The token trigger is mounted separately,
/// outside the session layer.
pub fn router() -> Router {
    Router::new()
        .route("/", get(history))
        .route("/check", post(check))
}

pub async fn history(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&session)?;
    Ok(dto::ok(services.notifier.history().await?))
}

/// Manual run from the admin UI.
pub async fn check(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&session)?;
    run_check(&services).await
}

/// Scheduled-job entry point: `?token=` (or `?cron_token=`) must match the
/// configured secret. Without a token a bearer session is required.
pub async fn trigger(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    Query(query): Query<TriggerQuery>,
) -> Result<impl IntoResponse, ApiError> {
    match query.token() {
        Some(candidate) => {
            let accepted = services
                .trigger_token
                .as_ref()
                .is_some_and(|token| token.matches(&candidate));
            if !accepted {
                warn!("stock check trigger called with an invalid token");
                return Err(ApiError::Forbidden("invalid token".into()));
            }
        }
        None => {
            services.auth_state().authenticate(&headers)?;
        }
    }
    run_check(&services).await
}

async fn run_check(services: &AppServices) -> Result<impl IntoResponse + use<>, ApiError> {
    let result = services.notifier.check_and_notify().await?;
    Ok(dto::ok_with_message(result.message.clone(), result))
}
