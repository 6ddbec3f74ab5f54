use axum::{routing::get, Router};

pub mod common;
pub mod defective;
pub mod installed;
pub mod inventory;
pub mod notifications;
pub mod orders;
pub mod received;
pub mod system;
pub mod tools;

/// Router for all session-authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/stats", get(inventory::stats))
        .nest("/inventory", inventory::router())
        .nest("/orders", orders::router())
        .nest("/received", received::router())
        .nest("/installed", installed::router())
        .nest("/defective", defective::router())
        .nest("/tools", tools::router())
        .nest("/notifications", notifications::router())
}
