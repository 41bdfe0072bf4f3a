//! src/services/diary_service.rs
//!
//! DiaryService — upload, list and delete of diary images. Each operation
//! is a short sequence of object-store and metadata-store calls; nothing is
//! retried and nothing is rolled back, so a failure midway can leave an
//! orphaned blob behind.

use crate::{
    models::image::ImageRecord,
    services::{
        metadata_store::{MetadataError, MetadataStore},
        object_store::{ObjectStore, ObjectStoreError},
    },
};
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// Container every image blob is written to.
pub const IMAGE_CONTAINER: &str = "raw-images";

/// Failure from either backing store.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    ObjectStore(#[from] ObjectStoreError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

#[derive(Debug, Error)]
pub enum DiaryError {
    #[error("missing user identity")]
    Unauthenticated,
    #[error("{0}")]
    InvalidInput(&'static str),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl From<ObjectStoreError> for DiaryError {
    fn from(err: ObjectStoreError) -> Self {
        Self::Backend(err.into())
    }
}

impl From<MetadataError> for DiaryError {
    fn from(err: MetadataError) -> Self {
        Self::Backend(err.into())
    }
}

pub type DiaryResult<T> = Result<T, DiaryError>;

/// The uploaded file part.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub data: Bytes,
}

/// Everything an upload request may carry besides the caller's identity.
/// Numeric fields are kept as raw form text and parsed leniently.
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    pub file: Option<UploadedFile>,
    pub lat: Option<String>,
    pub lon: Option<String>,
    pub caption: Option<String>,
    pub folder: Option<String>,
    pub location: Option<String>,
}

#[derive(Clone)]
pub struct DiaryService {
    objects: Arc<dyn ObjectStore>,
    metadata: Arc<dyn MetadataStore>,
}

impl DiaryService {
    pub fn new(objects: Arc<dyn ObjectStore>, metadata: Arc<dyn MetadataStore>) -> Self {
        Self { objects, metadata }
    }

    pub fn objects(&self) -> &Arc<dyn ObjectStore> {
        &self.objects
    }

    pub fn metadata(&self) -> &Arc<dyn MetadataStore> {
        &self.metadata
    }

    /// Store the file under a freshly generated key and record its metadata.
    ///
    /// Returns the generated key.
    pub async fn upload(&self, user_id: &str, req: UploadRequest) -> DiaryResult<String> {
        let file = req
            .file
            .ok_or(DiaryError::InvalidInput("Bad Request: No file payload found"))?;

        let key = generate_object_key(&file.filename);

        if !self.objects.container_exists(IMAGE_CONTAINER).await? {
            self.objects.create_container(IMAGE_CONTAINER).await?;
            info!("Created container {}", IMAGE_CONTAINER);
        }

        let url = self.objects.put_blob(IMAGE_CONTAINER, &key, file.data).await?;

        let record = ImageRecord {
            id: key.clone(),
            user_id: user_id.to_string(),
            url,
            caption: req.caption,
            folder: req.folder,
            location: req.location,
            lat: parse_coordinate(req.lat.as_deref()),
            lon: parse_coordinate(req.lon.as_deref()),
        };
        self.metadata.upsert(&record).await?;

        info!("Successfully uploaded {} for user {}", key, user_id);
        Ok(key)
    }

    /// All records in the caller's partition.
    pub async fn list(&self, user_id: &str) -> DiaryResult<Vec<ImageRecord>> {
        Ok(self.metadata.query_partition(user_id).await?)
    }

    /// Remove the metadata document, then the blob if it is still present.
    pub async fn delete(&self, user_id: &str, name: Option<&str>) -> DiaryResult<()> {
        let name = name
            .filter(|n| !n.is_empty())
            .ok_or(DiaryError::InvalidInput("Missing 'name' parameter"))?;

        self.metadata.delete(name, user_id).await?;

        if self.objects.blob_exists(IMAGE_CONTAINER, name).await? {
            self.objects.delete_blob(IMAGE_CONTAINER, name).await?;
        }

        info!("Deleted image {}", name);
        Ok(())
    }
}

/// `<uuid>.<extension>`, where the extension is everything after the last
/// `.` of the original filename, or the whole filename when it has no dot.
pub fn generate_object_key(filename: &str) -> String {
    format!("{}.{}", Uuid::new_v4(), file_extension(filename))
}

pub fn file_extension(filename: &str) -> &str {
    filename.rsplit('.').next().unwrap_or(filename)
}

/// Absent, empty, `"null"` and unparsable values all become `None`.
pub fn parse_coordinate(raw: Option<&str>) -> Option<f64> {
    raw.filter(|v| !v.is_empty() && *v != "null")
        .and_then(|v| v.trim().parse::<f64>().ok())
}
