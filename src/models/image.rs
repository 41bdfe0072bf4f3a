//! Represents the metadata kept for one uploaded diary image.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Metadata document for a single uploaded image.
///
/// The blob itself lives in the object store under `id`; this record is
/// stored in the metadata store under the `user_id` partition.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
pub struct ImageRecord {
    /// Generated name (`<uuid>.<extension>`), also the object key.
    pub id: String,

    /// Partition key, copied from the trusted identity header.
    pub user_id: String,

    /// Address of the blob as resolved by the object store.
    pub url: String,

    /// Free-text caption.
    pub caption: Option<String>,

    /// Free-text folder/album name.
    pub folder: Option<String>,

    /// Free-text place name.
    pub location: Option<String>,

    pub lat: Option<f64>,
    pub lon: Option<f64>,
}
