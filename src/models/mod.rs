//! Core data models for the diary API.
//!
//! Records map to the metadata table via `sqlx::FromRow` and serialize
//! as the JSON documents returned by `get_images`.

pub mod image;
