//! HTTP handlers for the diary image operations.
//! Each handler turns the request into a `DiaryService` call and maps the
//! outcome onto a status code and JSON body.

use crate::{
    errors::AppError,
    middleware::auth::AuthenticatedUser,
    models::image::ImageRecord,
    services::diary_service::{DiaryService, UploadRequest, UploadedFile},
};
use axum::{
    Json,
    extract::{Multipart, Query, State, multipart::MultipartRejection},
};
use serde::Deserialize;
use serde_json::{Value, json};

/// Query params accepted by `delete_image`.
#[derive(Debug, Deserialize)]
pub struct DeleteImageQuery {
    pub name: Option<String>,
}

/// POST `/api/upload_image` — multipart body with a `file` part plus
/// optional `lat`, `lon`, `caption`, `folder` and `location` fields.
pub async fn upload_image(
    user: AuthenticatedUser,
    State(service): State<DiaryService>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Value>, AppError> {
    // A body that is not multipart carries no file part.
    let req = match multipart {
        Ok(multipart) => read_upload_form(multipart).await?,
        Err(_) => UploadRequest::default(),
    };

    let id = service
        .upload(&user.user_id, req)
        .await
        .map_err(|err| AppError::from_diary(err, |e| format!("Pipeline failure: {e}")))?;

    Ok(Json(json!({ "status": "success", "id": id })))
}

/// GET `/api/get_images` — every record stored for the caller.
pub async fn get_images(
    user: AuthenticatedUser,
    State(service): State<DiaryService>,
) -> Result<Json<Vec<ImageRecord>>, AppError> {
    let records = service.list(&user.user_id).await.map_err(|err| {
        tracing::error!("Failed to retrieve images for user {}", user.user_id);
        AppError::from_diary(err, |_| "Metadata query failed".into())
    })?;

    Ok(Json(records))
}

/// GET or DELETE `/api/delete_image?name=<id>` — remove metadata, then blob.
pub async fn delete_image(
    user: AuthenticatedUser,
    State(service): State<DiaryService>,
    Query(q): Query<DeleteImageQuery>,
) -> Result<Json<Value>, AppError> {
    service
        .delete(&user.user_id, q.name.as_deref())
        .await
        .map_err(|err| {
            AppError::from_diary(err, |e| {
                format!("Failed to remove artifacts from storage: {e}")
            })
        })?;

    Ok(Json(json!({ "status": "deleted" })))
}

/// Collect the upload form. The first `file` part that carries a non-empty
/// filename is the file; later duplicates are ignored. Browsers send an
/// empty filename for a file input left blank.
async fn read_upload_form(mut multipart: Multipart) -> Result<UploadRequest, AppError> {
    let mut req = UploadRequest::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let Some(filename) = field
                    .file_name()
                    .filter(|f| !f.is_empty())
                    .map(str::to_string)
                else {
                    continue;
                };
                let data = field.bytes().await.map_err(multipart_error)?;
                if req.file.is_none() {
                    req.file = Some(UploadedFile { filename, data });
                }
            }
            "lat" | "lon" | "caption" | "folder" | "location" => {
                let value = field.text().await.map_err(multipart_error)?;
                let slot = match name.as_str() {
                    "lat" => &mut req.lat,
                    "lon" => &mut req.lon,
                    "caption" => &mut req.caption,
                    "folder" => &mut req.folder,
                    _ => &mut req.location,
                };
                slot.get_or_insert(value);
            }
            _ => {}
        }
    }

    Ok(req)
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> AppError {
    AppError::new(err.status(), err.body_text())
}
