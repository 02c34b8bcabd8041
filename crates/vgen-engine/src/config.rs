//! Engine configuration.

use std::path::PathBuf;
use std::time::Duration;

use vgen_models::JobId;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory receiving one artifact file per job
    pub uploads_dir: PathBuf,
    /// Delay between provider polls
    pub poll_interval: Duration,
    /// Poll bound before a job is treated as timed out
    pub max_poll_attempts: u32,
    /// Validity of signed URLs minted for status queries
    pub signed_url_ttl: Duration,
    /// Storage namespace (key prefix) for uploaded artifacts
    pub storage_namespace: String,
    /// Maximum jobs driven concurrently
    pub max_concurrent_jobs: usize,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// Retries for transient submission failures
    pub submit_retries: u32,
    /// Base delay for submission retry backoff
    pub submit_retry_base_delay: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            uploads_dir: PathBuf::from("uploads"),
            poll_interval: Duration::from_secs(5),
            max_poll_attempts: 120, // 10 minutes at the default interval
            signed_url_ttl: Duration::from_secs(24 * 60 * 60),
            storage_namespace: "videos".to_string(),
            max_concurrent_jobs: 16,
            shutdown_timeout: Duration::from_secs(30),
            submit_retries: 2,
            submit_retry_base_delay: Duration::from_secs(1),
        }
    }
}

impl EngineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            uploads_dir: std::env::var("VGEN_UPLOADS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.uploads_dir),
            poll_interval: Duration::from_secs(
                std::env::var("VGEN_POLL_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
            max_poll_attempts: std::env::var("VGEN_MAX_POLL_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(120),
            signed_url_ttl: Duration::from_secs(
                std::env::var("VGEN_SIGNED_URL_TTL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(24 * 60 * 60),
            ),
            storage_namespace: std::env::var("VGEN_STORAGE_NAMESPACE")
                .unwrap_or(defaults.storage_namespace),
            max_concurrent_jobs: std::env::var("VGEN_MAX_CONCURRENT_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(16),
            shutdown_timeout: Duration::from_secs(
                std::env::var("VGEN_SHUTDOWN_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            submit_retries: std::env::var("VGEN_SUBMIT_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            submit_retry_base_delay: Duration::from_millis(
                std::env::var("VGEN_SUBMIT_RETRY_BASE_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1000),
            ),
        }
    }

    /// Where the artifact for `job_id` is written.
    pub fn artifact_path(&self, job_id: &JobId) -> PathBuf {
        self.uploads_dir.join(format!("{}.mp4", job_id))
    }

    /// Upper bound on time spent polling one job.
    pub fn poll_ceiling(&self) -> Duration {
        self.poll_interval * self.max_poll_attempts
    }
}
