//! HTTP application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store, mailer and service construction
//! - `routes/`: HTTP routes + handlers (one file per collection)
//! - `dto.rs`: request/response DTOs and the success envelope
//! - `errors.rs`: the error envelope and status mapping
//! - `extract.rs`: extractors that reject with the error envelope

use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, routing::get, Extension, Router};
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod extract;
pub mod routes;
pub mod services;

/// Photo uploads are sent with the form; the default 2 MiB is too small.
const BODY_LIMIT: usize = 32 * 1024 * 1024;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: Arc<services::AppServices>) -> Router {
    let protected = routes::router().layer(axum::middleware::from_fn_with_state(
        services.auth_state(),
        middleware::auth_middleware,
    ));

    Router::new()
        .route("/health", get(routes::system::health))
        .route(
            "/notifications/trigger",
            get(routes::notifications::trigger),
        )
        .merge(protected)
        .nest_service("/uploads", ServeDir::new(&services.upload_dir))
        .fallback(routes::system::not_found)
        .layer(Extension(services))
        .layer(axum::middleware::map_response(
            middleware::envelope_method_not_allowed,
        ))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
}
