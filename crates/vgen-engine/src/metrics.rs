//! Job engine metrics.
//!
//! - Submission and outcome counters
//! - Poll attempt counter
//! - End-to-end job duration histogram
//! - Storage failure counter by operation

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Jobs accepted by `submit_job`.
    pub const JOBS_SUBMITTED_TOTAL: &str = "vgen_jobs_submitted_total";

    /// Jobs reaching a terminal state, by outcome.
    pub const JOBS_FINISHED_TOTAL: &str = "vgen_jobs_finished_total";

    /// Provider poll calls, by provider.
    pub const POLL_ATTEMPTS_TOTAL: &str = "vgen_poll_attempts_total";

    /// Seconds from submission to terminal state.
    pub const JOB_DURATION_SECONDS: &str = "vgen_job_duration_seconds";

    /// Non-fatal artifact store failures, by operation.
    pub const STORAGE_FAILURES_TOTAL: &str = "vgen_storage_failures_total";
}

/// How a job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Completed with generated content
    Generated,
    /// Completed with the placeholder artifact
    Fallback,
    /// No artifact at all
    Failed,
}

impl JobOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobOutcome::Generated => "generated",
            JobOutcome::Fallback => "fallback",
            JobOutcome::Failed => "failed",
        }
    }
}

pub fn record_job_submitted(provider: &str) {
    counter!(
        names::JOBS_SUBMITTED_TOTAL,
        "provider" => provider.to_string()
    )
    .increment(1);
}

/// Record a terminal job along with its total duration.
pub fn record_job_finished(outcome: JobOutcome, duration_secs: f64) {
    counter!(
        names::JOBS_FINISHED_TOTAL,
        "outcome" => outcome.as_str()
    )
    .increment(1);

    histogram!(
        names::JOB_DURATION_SECONDS,
        "outcome" => outcome.as_str()
    )
    .record(duration_secs);
}

pub fn record_poll_attempt(provider: &str) {
    counter!(
        names::POLL_ATTEMPTS_TOTAL,
        "provider" => provider.to_string()
    )
    .increment(1);
}

pub fn record_storage_failure(operation: &str) {
    counter!(
        names::STORAGE_FAILURES_TOTAL,
        "operation" => operation.to_string()
    )
    .increment(1);
}
