//! Durable artifact storage.
//!
//! This crate provides:
//! - The `ArtifactStore` capability consumed by the job engine
//! - A Cloudflare R2 (S3 API) implementation
//! - Presigned URL generation

pub mod client;
pub mod error;
pub mod store;

pub use client::{R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use store::{artifact_key, content_type_for, ArtifactStore, StoredArtifact};
