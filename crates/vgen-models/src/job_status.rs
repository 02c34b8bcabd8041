//! Job status types returned to pollers.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::job::{Job, JobId};

/// Job processing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is registered and waiting for its driving task
    #[default]
    Queued,
    /// Job is being generated
    Processing,
    /// An artifact (real or placeholder) is available
    Completed,
    /// No artifact could be produced at all
    Failed,
}

impl JobStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immediate answer to a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SubmitResponse {
    pub job_id: JobId,
    pub status: JobStatus,
    /// Total time estimate in seconds
    pub estimated_time: u64,
}

/// Snapshot of a job enriched with derived fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobStatusReport {
    pub job_id: JobId,
    pub status: JobStatus,
    pub progress: u8,
    /// Seconds, never negative
    pub estimated_time_remaining: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Freshly signed URL when durable storage is available
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_path: Option<PathBuf>,
    /// True when the artifact is a placeholder
    pub fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobStatusReport {
    /// Build a report from a job snapshot; `artifact_url` is supplied by the caller.
    pub fn from_job(job: &Job, now: DateTime<Utc>, artifact_url: Option<String>) -> Self {
        Self {
            job_id: job.id.clone(),
            status: job.status,
            progress: job.progress,
            estimated_time_remaining: job.estimated_remaining_secs(now),
            current_step: job.current_step.clone(),
            error: job.error.clone(),
            artifact_url,
            local_path: job.artifact_local_path.clone(),
            fallback: job.fallback,
            completed_at: job.completed_at,
        }
    }
}

/// Where a completed artifact can be fetched from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactLocation {
    /// Time-limited signed URL from durable storage
    Url(String),
    /// Local filesystem path
    LocalPath(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobOptions;

    #[test]
    fn test_status_strings() {
        assert_eq!(JobStatus::Queued.as_str(), "queued");
        assert_eq!(JobStatus::Completed.to_string(), "completed");
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
    }

    #[test]
    fn test_status_serde() {
        let json = serde_json::to_string(&JobStatus::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
    }

    #[test]
    fn test_report_from_completed_job() {
        let mut job = Job::new("waves at dusk", JobOptions::default());
        job.record_artifact("/tmp/uploads/x.mp4");
        job.complete();

        let now = job.started_at + chrono::Duration::seconds(10);
        let report = JobStatusReport::from_job(&job, now, None);
        assert_eq!(report.status, JobStatus::Completed);
        assert_eq!(report.progress, 100);
        // standard tier estimate (60 s) minus elapsed
        assert_eq!(report.estimated_time_remaining, 50);
        assert_eq!(report.local_path, Some(PathBuf::from("/tmp/uploads/x.mp4")));
        assert!(report.artifact_url.is_none());
    }

    #[test]
    fn test_artifact_location_serde() {
        let url = ArtifactLocation::Url("https://example.com/a.mp4".into());
        let json = serde_json::to_value(&url).unwrap();
        assert_eq!(json["url"], "https://example.com/a.mp4");
    }
}
