//! Photo-diary backend: image upload, listing and deletion over HTTP,
//! backed by an object store for payloads and a partitioned metadata
//! store for records.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use axum::Router;
use services::diary_service::DiaryService;

/// Router with all routes mounted and `service` as shared state.
pub fn app(service: DiaryService, max_upload_bytes: usize) -> Router {
    routes::routes::routes(max_upload_bytes).with_state(service)
}
