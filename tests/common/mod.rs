#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response},
};
use bytes::Bytes;
use diary_api::{
    models::image::ImageRecord,
    services::{
        diary_service::DiaryService,
        metadata_store::{MetadataError, MetadataResult, MetadataStore, SqliteMetadataStore},
        object_store::{DiskObjectStore, ObjectStore, ObjectStoreError, ObjectStoreResult},
    },
};
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tower::ServiceExt;

pub const PRINCIPAL_HEADER: &str = "X-MS-CLIENT-PRINCIPAL-ID";
pub const BOUNDARY: &str = "diary-test-boundary";
pub const MAX_UPLOAD_BYTES: usize = 1024 * 1024;

/// Router backed by real disk and SQLite stores inside a temp directory.
pub struct TestContext {
    pub dir: TempDir,
    pub router: Router,
    pub objects: Arc<DiskObjectStore>,
    pub metadata: Arc<SqliteMetadataStore>,
}

impl TestContext {
    pub async fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");

        let db_path = dir.path().join("meta.db");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&format!("sqlite://{}?mode=rwc", db_path.display()))
            .await
            .expect("Failed to open SQLite database");
        let metadata = Arc::new(SqliteMetadataStore::new(Arc::new(pool)));
        metadata.migrate().await.expect("Failed to migrate");

        let objects = Arc::new(DiskObjectStore::new(
            dir.path().join("objects"),
            "http://blobs.test",
        ));

        let service = DiaryService::new(objects.clone(), metadata.clone());
        let router = diary_api::app(service, MAX_UPLOAD_BYTES);

        Self {
            dir,
            router,
            objects,
            metadata,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request")
    }
}

/// Multipart field for [`multipart_body`].
pub enum Part<'a> {
    File { filename: &'a str, data: &'a [u8] },
    Text { name: &'a str, value: &'a str },
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::File { filename, data } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
            Part::Text { name, value } => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}")
                        .as_bytes(),
                );
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn upload_request(user: Option<&str>, parts: &[Part<'_>]) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/upload_image")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(user) = user {
        builder = builder.header(PRINCIPAL_HEADER, user);
    }
    builder
        .body(Body::from(multipart_body(parts)))
        .expect("Failed to build request")
}

pub fn list_request(user: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri("/api/get_images");
    if let Some(user) = user {
        builder = builder.header(PRINCIPAL_HEADER, user);
    }
    builder.body(Body::empty()).expect("Failed to build request")
}

pub fn delete_request(method: &str, user: Option<&str>, name: Option<&str>) -> Request<Body> {
    let uri = match name {
        Some(name) => format!("/api/delete_image?name={name}"),
        None => "/api/delete_image".to_string(),
    };
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(PRINCIPAL_HEADER, user);
    }
    builder.body(Body::empty()).expect("Failed to build request")
}

pub async fn parse_response_body(response: Response<Body>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}

/// Object store that records every call and keeps blobs in memory.
#[derive(Default)]
pub struct RecordingObjectStore {
    pub calls: Mutex<Vec<String>>,
    pub containers: Mutex<Vec<String>>,
    pub blobs: Mutex<Vec<(String, Bytes)>>,
    pub fail_puts: bool,
}

impl RecordingObjectStore {
    pub fn failing_puts() -> Self {
        Self {
            fail_puts: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ObjectStore for RecordingObjectStore {
    async fn container_exists(&self, container: &str) -> ObjectStoreResult<bool> {
        self.record(format!("container_exists:{container}"));
        Ok(self.containers.lock().unwrap().iter().any(|c| c == container))
    }

    async fn create_container(&self, container: &str) -> ObjectStoreResult<()> {
        self.record(format!("create_container:{container}"));
        let mut containers = self.containers.lock().unwrap();
        if !containers.iter().any(|c| c == container) {
            containers.push(container.to_string());
        }
        Ok(())
    }

    async fn put_blob(
        &self,
        container: &str,
        key: &str,
        data: Bytes,
    ) -> ObjectStoreResult<String> {
        self.record(format!("put_blob:{key}"));
        if self.fail_puts {
            return Err(ObjectStoreError::Io(std::io::Error::other(
                "storage unreachable",
            )));
        }
        self.blobs.lock().unwrap().push((key.to_string(), data));
        Ok(format!("mem://{container}/{key}"))
    }

    async fn blob_exists(&self, _container: &str, key: &str) -> ObjectStoreResult<bool> {
        self.record(format!("blob_exists:{key}"));
        Ok(self.blobs.lock().unwrap().iter().any(|(k, _)| k == key))
    }

    async fn delete_blob(&self, _container: &str, key: &str) -> ObjectStoreResult<()> {
        self.record(format!("delete_blob:{key}"));
        self.blobs.lock().unwrap().retain(|(k, _)| k != key);
        Ok(())
    }

    async fn check_health(&self) -> ObjectStoreResult<()> {
        Ok(())
    }
}

/// Metadata store that only records calls; it never holds documents.
/// In failing mode every call is recorded and then errors.
#[derive(Default)]
pub struct RecordingMetadataStore {
    pub calls: Mutex<Vec<String>>,
    pub fail_all: bool,
}

impl RecordingMetadataStore {
    pub fn failing() -> Self {
        Self {
            fail_all: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) -> MetadataResult<()> {
        self.calls.lock().unwrap().push(call);
        if self.fail_all {
            return Err(MetadataError::Sqlx(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataStore for RecordingMetadataStore {
    async fn upsert(&self, record: &ImageRecord) -> MetadataResult<()> {
        self.record(format!("upsert:{}", record.id))
    }

    async fn query_partition(&self, partition: &str) -> MetadataResult<Vec<ImageRecord>> {
        self.record(format!("query:{partition}"))?;
        Ok(Vec::new())
    }

    async fn delete(&self, id: &str, partition: &str) -> MetadataResult<()> {
        self.record(format!("delete:{id}:{partition}"))
    }

    async fn check_health(&self) -> MetadataResult<()> {
        Ok(())
    }
}

/// Router over recording fakes, returned with handles to inspect them.
pub fn recording_router(
    objects: RecordingObjectStore,
) -> (Router, Arc<RecordingObjectStore>, Arc<RecordingMetadataStore>) {
    recording_router_with(objects, RecordingMetadataStore::default())
}

pub fn recording_router_with(
    objects: RecordingObjectStore,
    metadata: RecordingMetadataStore,
) -> (Router, Arc<RecordingObjectStore>, Arc<RecordingMetadataStore>) {
    let objects = Arc::new(objects);
    let metadata = Arc::new(metadata);
    let service = DiaryService::new(objects.clone(), metadata.clone());
    (
        diary_api::app(service, MAX_UPLOAD_BYTES),
        objects,
        metadata,
    )
}

pub async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router
        .clone()
        .oneshot(request)
        .await
        .expect("Failed to send request")
}
