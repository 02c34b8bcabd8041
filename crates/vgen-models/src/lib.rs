//! Shared data models for the video generation backend.
//!
//! This crate provides Serde-serializable types for:
//! - Generation jobs and their request options
//! - Job status snapshots returned to pollers
//! - Artifact locations (signed URL or local path)

pub mod job;
pub mod job_status;

// Re-export common types
pub use job::{AspectRatio, Job, JobId, JobOptions, Quality};
pub use job_status::{ArtifactLocation, JobStatus, JobStatusReport, SubmitResponse};
