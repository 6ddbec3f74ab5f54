//! HTTP API: routing, request/response mapping and session checks.

pub mod app;
pub mod middleware;
