//! Storage seams and the diary operations built on them.

pub mod diary_service;
pub mod metadata_store;
pub mod object_store;
