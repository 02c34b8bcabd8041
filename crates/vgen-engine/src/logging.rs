//! Structured job logging.
//!
//! Every line emitted for a job carries its `job_id` and the operation name
//! so log pipelines can stitch together one job's lifecycle.

use tracing::{error, info, warn, Span};
use vgen_models::JobId;

/// Job logger for structured logging with consistent formatting.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: String,
}

impl JobLogger {
    /// Create a new job logger for a specific job and operation.
    ///
    /// # Arguments
    /// * `job_id` - The job identifier
    /// * `operation` - The operation being performed (e.g. "generate_video")
    pub fn new(job_id: &JobId, operation: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job started: {}", message
        );
    }

    pub fn log_progress(&self, progress: u8, step: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            progress,
            "Job progress: {}", step
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job completed: {}", message
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Span the driving sequence of this job is instrumented with.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            operation = %self.operation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_logger_creation() {
        let job_id = JobId::from_string("job_1700000000000_0a1b2c3d");
        let logger = JobLogger::new(&job_id, "generate_video");

        assert_eq!(logger.job_id(), "job_1700000000000_0a1b2c3d");
        assert_eq!(logger.operation(), "generate_video");
    }
}
