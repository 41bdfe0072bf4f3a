//! src/services/object_store.rs
//!
//! Object storage for image payloads. `ObjectStore` is the seam the diary
//! service talks to; `DiskObjectStore` keeps blobs on local disk, sharded
//! beneath `root/{container}/{shard}/{shard}/{key}`.

use async_trait::async_trait;
use bytes::Bytes;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("container `{0}` not found")]
    ContainerNotFound(String),
    #[error("invalid container name `{0}`")]
    InvalidContainerName(String),
    #[error("invalid object key `{0}`")]
    InvalidObjectKey(String),
    #[error("object store health check failed: {0}")]
    Unhealthy(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type ObjectStoreResult<T> = Result<T, ObjectStoreError>;

/// Key-addressed binary storage grouped into named containers.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn container_exists(&self, container: &str) -> ObjectStoreResult<bool>;

    /// Create a container. Creating one that already exists is not an error.
    async fn create_container(&self, container: &str) -> ObjectStoreResult<()>;

    /// Write `data` under `key`, replacing any existing blob with that key.
    /// Returns the URL the blob can be addressed by.
    async fn put_blob(&self, container: &str, key: &str, data: Bytes)
    -> ObjectStoreResult<String>;

    async fn blob_exists(&self, container: &str, key: &str) -> ObjectStoreResult<bool>;

    async fn delete_blob(&self, container: &str, key: &str) -> ObjectStoreResult<()>;

    async fn check_health(&self) -> ObjectStoreResult<()>;
}

const MAX_OBJECT_KEY_LEN: usize = 1024;

/// Local-disk object store.
#[derive(Clone, Debug)]
pub struct DiskObjectStore {
    /// Directory holding one subdirectory per container.
    root: PathBuf,

    /// Prefix used when resolving blob URLs.
    public_base_url: String,
}

impl DiskObjectStore {
    /// Create a store rooted at `root`, resolving blob URLs against
    /// `public_base_url`.
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Reject keys that could escape the container directory.
    ///
    /// Containers are flat, so `/` is refused along with `..`, backslashes
    /// and control characters.
    fn ensure_key_safe(key: &str) -> ObjectStoreResult<()> {
        let invalid = key.is_empty()
            || key.len() > MAX_OBJECT_KEY_LEN
            || key.contains("..")
            || key
                .bytes()
                .any(|b| b.is_ascii_control() || b == b'/' || b == b'\\');
        if invalid {
            return Err(ObjectStoreError::InvalidObjectKey(key.to_string()));
        }
        Ok(())
    }

    /// Container names: lowercase letters, digits and hyphens, 3 to 63 chars.
    fn ensure_container_name_safe(name: &str) -> ObjectStoreResult<()> {
        let valid = (3..=63).contains(&name.len())
            && name
                .chars()
                .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '-'))
            && !name.starts_with('-')
            && !name.ends_with('-');
        if valid {
            Ok(())
        } else {
            Err(ObjectStoreError::InvalidContainerName(name.to_string()))
        }
    }

    fn container_root(&self, container: &str) -> PathBuf {
        self.root.join(container)
    }

    /// Two-level shard directories for a key.
    ///
    /// Uses MD5(container/key) and returns the first two bytes as lowercase
    /// hex, keeping the file count per directory bounded.
    fn object_shards(container: &str, key: &str) -> (String, String) {
        let digest = md5::compute(format!("{}/{}", container, key));
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    fn relative_object_path(container: &str, key: &str) -> String {
        let (shard_a, shard_b) = Self::object_shards(container, key);
        format!("{}/{}/{}/{}", container, shard_a, shard_b, key)
    }

    fn object_path(&self, container: &str, key: &str) -> PathBuf {
        self.root.join(Self::relative_object_path(container, key))
    }

    /// URL a blob is published under.
    pub fn object_url(&self, container: &str, key: &str) -> String {
        format!(
            "{}/{}",
            self.public_base_url,
            Self::relative_object_path(container, key)
        )
    }

    /// Remove empty shard directories between `start` and `stop`.
    async fn prune_empty_dirs(&self, start: &Path, stop: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => match current.parent() {
                    Some(parent) => current = parent.to_path_buf(),
                    None => break,
                },
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl ObjectStore for DiskObjectStore {
    async fn container_exists(&self, container: &str) -> ObjectStoreResult<bool> {
        Self::ensure_container_name_safe(container)?;
        match fs::metadata(self.container_root(container)).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn create_container(&self, container: &str) -> ObjectStoreResult<()> {
        Self::ensure_container_name_safe(container)?;
        fs::create_dir_all(self.container_root(container)).await?;
        debug!("created container {}", container);
        Ok(())
    }

    /// Writes to a temp file, fsyncs, then renames into place so readers
    /// never observe a partial blob.
    async fn put_blob(
        &self,
        container: &str,
        key: &str,
        data: Bytes,
    ) -> ObjectStoreResult<String> {
        Self::ensure_key_safe(key)?;
        if !self.container_exists(container).await? {
            return Err(ObjectStoreError::ContainerNotFound(container.to_string()));
        }

        let file_path = self.object_path(container, key);
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            ObjectStoreError::Io(io::Error::other("object path missing parent directory"))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));

        if let Err(err) = write_synced(&tmp_path, &data).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(&file_path).await?;
                fs::rename(&tmp_path, &file_path).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(err.into());
            }
        }

        debug!(
            "stored {} bytes at {}",
            data.len(),
            file_path.display()
        );
        Ok(self.object_url(container, key))
    }

    async fn blob_exists(&self, container: &str, key: &str) -> ObjectStoreResult<bool> {
        Self::ensure_key_safe(key)?;
        Self::ensure_container_name_safe(container)?;
        match fs::metadata(self.object_path(container, key)).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn delete_blob(&self, container: &str, key: &str) -> ObjectStoreResult<()> {
        Self::ensure_key_safe(key)?;
        Self::ensure_container_name_safe(container)?;
        let file_path = self.object_path(container, key);
        fs::remove_file(&file_path).await?;
        debug!("removed blob {}", file_path.display());

        if let Some(parent) = file_path.parent() {
            let container_root = self.container_root(container);
            self.prune_empty_dirs(parent, &container_root).await;
        }
        Ok(())
    }

    /// Write, read back, and remove a probe file under the root.
    async fn check_health(&self) -> ObjectStoreResult<()> {
        fs::create_dir_all(&self.root).await?;
        let probe = self.root.join(format!(".readyz-{}", Uuid::new_v4()));
        fs::write(&probe, b"readyz").await?;
        let read_back = fs::read(&probe).await;
        let _ = fs::remove_file(&probe).await;
        if read_back? != b"readyz" {
            return Err(ObjectStoreError::Unhealthy(
                "probe file content mismatch".into(),
            ));
        }
        Ok(())
    }
}

async fn write_synced(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = File::create(path).await?;
    file.write_all(data).await?;
    file.flush().await?;
    file.sync_all().await
}
