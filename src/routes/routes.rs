//! Defines routes for the diary API.
//!
//! ## Structure
//! - **Image endpoints** (behind the identity middleware)
//!   - `POST       /api/upload_image` — multipart upload of one image
//!   - `GET        /api/get_images` — list the caller's images
//!   - `GET|DELETE /api/delete_image?name=` — remove one image
//!
//! - **Probes**
//!   - `GET /healthz`, `GET /readyz`

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        image_handlers::{delete_image, get_images, upload_image},
    },
    middleware::auth::identity_middleware,
    services::diary_service::DiaryService,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

/// Build the router for all diary routes.
///
/// `max_upload_bytes` caps the request body accepted by `upload_image`.
pub fn routes(max_upload_bytes: usize) -> Router<DiaryService> {
    let api = Router::new()
        .route(
            "/upload_image",
            post(upload_image).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/get_images", get(get_images))
        .route("/delete_image", get(delete_image).delete(delete_image))
        .layer(middleware::from_fn(identity_middleware));

    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
}
