//! Generation job definitions.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::job_status::JobStatus;

/// Unique identifier for a generation job.
///
/// Format: `job_<unix millis>_<8 hex chars>`. The random suffix makes
/// collisions within one process lifetime astronomically unlikely.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new job ID from the current time and a random suffix.
    pub fn new() -> Self {
        let millis = Utc::now().timestamp_millis();
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!("job_{}_{}", millis, &suffix[..8]))
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Requested quality tier.
///
/// The tier only drives the remaining-time estimate shown to pollers;
/// it is an approximation, not a measured value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    Fast,
    #[default]
    Standard,
    High,
}

impl Quality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Fast => "fast",
            Quality::Standard => "standard",
            Quality::High => "high",
        }
    }

    /// Total generation time estimate in seconds.
    pub fn estimated_secs(&self) -> u64 {
        match self {
            Quality::Fast => 30,
            Quality::Standard => 60,
            Quality::High => 120,
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Output aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
        }
    }
}

/// Generation parameters supplied alongside the prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct JobOptions {
    /// Requested clip length in seconds
    #[serde(default = "default_duration_seconds")]
    #[validate(range(min = 1, max = 60))]
    pub duration_seconds: u32,

    /// Quality tier (drives time estimates)
    #[serde(default)]
    pub quality: Quality,

    /// Output aspect ratio
    #[serde(default)]
    pub aspect_ratio: AspectRatio,

    /// Content the provider should avoid
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 2000))]
    pub negative_prompt: Option<String>,

    /// Owning project in the CRUD layer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    /// Owning scene in the CRUD layer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_id: Option<String>,
}

fn default_duration_seconds() -> u32 {
    8
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            duration_seconds: default_duration_seconds(),
            quality: Quality::default(),
            aspect_ratio: AspectRatio::default(),
            negative_prompt: None,
            project_id: None,
            scene_id: None,
        }
    }
}

/// A generation job tracked from submission to a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Current status
    pub status: JobStatus,

    /// Progress (0-100), never decreases
    pub progress: u8,

    /// Original prompt
    pub prompt: String,

    /// Original options
    pub options: JobOptions,

    /// Submission timestamp
    pub started_at: DateTime<Utc>,

    /// Set once, on transition into `completed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Current processing step description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,

    /// Provider long-running operation handle
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,

    /// Generated or placeholder artifact on local disk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_local_path: Option<PathBuf>,

    /// Durable storage key, if the upload succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_remote_key: Option<String>,

    /// Signed URL minted at upload time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_url: Option<String>,

    /// Failure reason, kept even when a placeholder was produced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// True when the artifact is the placeholder
    #[serde(default)]
    pub fallback: bool,
}

impl Job {
    /// Create a new queued job.
    pub fn new(prompt: impl Into<String>, options: JobOptions) -> Self {
        Self {
            id: JobId::new(),
            status: JobStatus::Queued,
            progress: 0,
            prompt: prompt.into(),
            options,
            started_at: Utc::now(),
            completed_at: None,
            current_step: None,
            operation_name: None,
            artifact_local_path: None,
            artifact_remote_key: None,
            artifact_url: None,
            error: None,
            fallback: false,
        }
    }

    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move into `processing` and record the current step.
    pub fn start(&mut self, step: impl Into<String>) {
        self.status = JobStatus::Processing;
        self.current_step = Some(step.into());
    }

    /// Raise progress, never lowering it and never reaching 100 before completion.
    pub fn advance(&mut self, progress: u8) {
        let capped = progress.min(99);
        if capped > self.progress {
            self.progress = capped;
        }
    }

    /// Update the step description.
    pub fn set_step(&mut self, step: impl Into<String>) {
        self.current_step = Some(step.into());
    }

    /// Record the generated artifact location.
    pub fn record_artifact(&mut self, path: impl Into<PathBuf>) {
        self.artifact_local_path = Some(path.into());
    }

    /// Record a successful durable upload.
    pub fn record_upload(&mut self, key: impl Into<String>, url: impl Into<String>) {
        self.artifact_remote_key = Some(key.into());
        self.artifact_url = Some(url.into());
    }

    /// Record a generation failure that will be papered over by a placeholder.
    pub fn record_fallback(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        self.fallback = true;
    }

    /// Mark job as completed.
    pub fn complete(&mut self) {
        self.status = JobStatus::Completed;
        self.progress = 100;
        self.current_step = Some("Complete".into());
        if self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }
    }

    /// Mark job as failed with an error message.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.error = Some(error.into());
        self.current_step = Some("Failed".into());
    }

    /// Seconds elapsed since submission.
    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> u64 {
        (now - self.started_at).num_seconds().max(0) as u64
    }

    /// Remaining time estimate based on the quality tier: the tier estimate
    /// minus elapsed time, floored at zero. Status does not enter into it.
    pub fn estimated_remaining_secs(&self, now: DateTime<Utc>) -> u64 {
        self.options
            .quality
            .estimated_secs()
            .saturating_sub(self.elapsed_secs(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_format() {
        let id = JobId::new();
        let parts: Vec<&str> = id.as_str().split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "job");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 8);
    }

    #[test]
    fn test_job_ids_are_unique() {
        let ids: std::collections::HashSet<_> = (0..1000).map(|_| JobId::new()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_quality_estimates() {
        assert_eq!(Quality::Fast.estimated_secs(), 30);
        assert_eq!(Quality::Standard.estimated_secs(), 60);
        assert_eq!(Quality::High.estimated_secs(), 120);
    }

    #[test]
    fn test_options_defaults_from_empty_json() {
        let options: JobOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, JobOptions::default());
        assert_eq!(options.duration_seconds, 8);
        assert_eq!(options.aspect_ratio.as_str(), "16:9");
    }

    #[test]
    fn test_options_validation() {
        let mut options = JobOptions::default();
        assert!(options.validate().is_ok());

        options.duration_seconds = 0;
        assert!(options.validate().is_err());

        options.duration_seconds = 61;
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_progress_is_monotone_and_capped() {
        let mut job = Job::new("a cat surfing", JobOptions::default());
        job.advance(40);
        job.advance(20);
        assert_eq!(job.progress, 40);

        job.advance(100);
        assert_eq!(job.progress, 99);
        assert_eq!(job.status, JobStatus::Queued);
    }

    #[test]
    fn test_job_state_transitions() {
        let mut job = Job::new("a cat surfing", JobOptions::default());
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.progress, 0);

        job.start("Submitting");
        assert_eq!(job.status, JobStatus::Processing);
        assert!(!job.is_terminal());

        job.complete();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        let first = job.completed_at;
        assert!(first.is_some());

        job.complete();
        assert_eq!(job.completed_at, first);
    }

    #[test]
    fn test_fallback_keeps_error() {
        let mut job = Job::new("a cat surfing", JobOptions::default());
        job.record_fallback("provider exploded");
        job.complete();
        assert!(job.fallback);
        assert_eq!(job.error.as_deref(), Some("provider exploded"));
        assert_eq!(job.progress, 100);
    }

    #[test]
    fn test_remaining_time_estimate() {
        let mut job = Job::new("a cat surfing", JobOptions::default());
        job.started_at = Utc::now() - chrono::Duration::seconds(20);
        let remaining = job.estimated_remaining_secs(Utc::now());
        assert!((39..=40).contains(&remaining));

        job.started_at = Utc::now() - chrono::Duration::seconds(500);
        assert_eq!(job.estimated_remaining_secs(Utc::now()), 0);
    }

    #[test]
    fn test_remaining_time_ignores_terminal_status() {
        let options = JobOptions {
            quality: Quality::High,
            ..JobOptions::default()
        };
        let mut job = Job::new("a cat surfing", options);
        let now = job.started_at + chrono::Duration::seconds(5);
        job.complete();

        assert_eq!(job.estimated_remaining_secs(now), 115);
    }
}
