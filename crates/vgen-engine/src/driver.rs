//! Per-job driving sequence.
//!
//! `queued -> processing -> (poll) -> extract -> write -> upload -> completed`,
//! with any failure before the write replaced by the placeholder artifact.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tracing::Instrument;
use vgen_models::JobId;
use vgen_provider::{
    GenerationProvider, GenerationRequest, GenerationResult, OperationHandle, PollOutcome,
    ProviderError, SubmitOutcome,
};
use vgen_storage::ArtifactStore;

use crate::artifact::{extract_video, write_artifact};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::logging::JobLogger;
use crate::metrics::{self, JobOutcome};
use crate::placeholder::placeholder_mp4;
use crate::registry::JobRegistry;
use crate::retry::{retry_async, FailureTracker, RetryConfig};

/// Progress right after the provider accepted a request.
const SUBMITTED_PROGRESS: u8 = 10;
/// Progress once a long-running operation handle is known.
const POLLING_BASE_PROGRESS: u8 = 20;
/// Ceiling while polling.
const POLLING_MAX_PROGRESS: u8 = 90;
/// Progress while the artifact is saved and uploaded.
const SAVING_PROGRESS: u8 = 95;

/// Consecutive transient poll failures logged before suppression.
const MAX_LOGGED_POLL_FAILURES: u32 = 3;

/// Progress for poll attempt `attempt` of `max_attempts`.
pub fn poll_progress(attempt: u32, max_attempts: u32) -> u8 {
    if max_attempts == 0 {
        return POLLING_MAX_PROGRESS;
    }
    let span = u64::from(POLLING_MAX_PROGRESS - POLLING_BASE_PROGRESS);
    let scaled = u64::from(POLLING_BASE_PROGRESS) + span * u64::from(attempt) / u64::from(max_attempts);
    scaled.min(u64::from(POLLING_MAX_PROGRESS)) as u8
}

/// Runs one job from `queued` to a terminal state.
#[derive(Clone)]
pub struct JobDriver {
    config: Arc<EngineConfig>,
    registry: Arc<JobRegistry>,
    provider: Arc<dyn GenerationProvider>,
    store: Option<Arc<dyn ArtifactStore>>,
}

impl JobDriver {
    pub fn new(
        config: Arc<EngineConfig>,
        registry: Arc<JobRegistry>,
        provider: Arc<dyn GenerationProvider>,
        store: Option<Arc<dyn ArtifactStore>>,
    ) -> Self {
        Self {
            config,
            registry,
            provider,
            store,
        }
    }

    /// Drive `job_id` to completion. Never returns an error: every outcome
    /// is recorded on the job itself.
    pub async fn drive(&self, job_id: JobId) {
        let logger = JobLogger::new(&job_id, "generate_video");
        let span = logger.create_span();
        self.run(job_id, logger).instrument(span).await
    }

    async fn run(&self, job_id: JobId, logger: JobLogger) {
        let Some(job) = self.registry.get(&job_id).await else {
            logger.log_warning("job vanished from registry before it was driven");
            return;
        };
        let started_at = job.started_at;

        logger.log_start(&format!("provider={}", self.provider.name()));
        self.registry
            .update(&job_id, |job| {
                job.start("Submitting");
                job.advance(SUBMITTED_PROGRESS);
            })
            .await;

        let request = GenerationRequest::new(job.prompt.clone(), &job.options);
        let path = self.config.artifact_path(&job_id);

        let generated = match self.generate(&job_id, &request, &logger).await {
            Ok(bytes) => write_artifact(&path, &bytes).await,
            Err(e) => Err(e),
        };

        let outcome = match generated {
            Ok(()) => JobOutcome::Generated,
            Err(e) => {
                logger.log_warning(&format!("generation failed, using placeholder: {}", e));
                if let Err(write_err) = write_artifact(&path, &placeholder_mp4()).await {
                    let message = format!("{}; placeholder write failed: {}", e, write_err);
                    logger.log_error(&message);
                    self.registry.update(&job_id, |job| job.fail(message)).await;
                    Self::record_finished(JobOutcome::Failed, started_at);
                    return;
                }
                let message = e.to_string();
                self.registry
                    .update(&job_id, |job| job.record_fallback(message))
                    .await;
                JobOutcome::Fallback
            }
        };

        self.registry
            .update(&job_id, |job| {
                job.record_artifact(path.clone());
                job.set_step("Saving");
                job.advance(SAVING_PROGRESS);
            })
            .await;
        logger.log_progress(SAVING_PROGRESS, "Saving");

        self.upload(&job_id, &path, &logger).await;

        self.registry.update(&job_id, |job| job.complete()).await;
        Self::record_finished(outcome, started_at);
        logger.log_completion(&format!(
            "outcome={} path={}",
            outcome.as_str(),
            path.display()
        ));
    }

    /// Submit, poll if needed and decode the video bytes.
    async fn generate(
        &self,
        job_id: &JobId,
        request: &GenerationRequest,
        logger: &JobLogger,
    ) -> EngineResult<Vec<u8>> {
        let retry = RetryConfig::new("submit_generation")
            .with_max_retries(self.config.submit_retries)
            .with_base_delay(self.config.submit_retry_base_delay);

        let submitted = retry_async(
            &retry,
            || self.provider.submit(request),
            |e: &ProviderError| e.is_retryable(),
        )
        .await?;

        let result = match submitted {
            SubmitOutcome::Completed(result) => result,
            SubmitOutcome::Pending(handle) => {
                let operation = handle.to_string();
                self.registry
                    .update(job_id, |job| {
                        job.operation_name = Some(operation);
                        job.set_step("Generating");
                        job.advance(POLLING_BASE_PROGRESS);
                    })
                    .await;
                logger.log_progress(POLLING_BASE_PROGRESS, "Generating");
                self.poll_until_done(job_id, &handle, logger).await?
            }
        };

        extract_video(&result)
    }

    async fn poll_until_done(
        &self,
        job_id: &JobId,
        handle: &OperationHandle,
        logger: &JobLogger,
    ) -> EngineResult<GenerationResult> {
        let max_attempts = self.config.max_poll_attempts;
        let mut failures = FailureTracker::new(MAX_LOGGED_POLL_FAILURES);

        for attempt in 1..=max_attempts {
            tokio::time::sleep(self.config.poll_interval).await;
            metrics::record_poll_attempt(self.provider.name());

            match self.provider.poll(handle).await {
                Ok(PollOutcome::Running) => {
                    failures.record_success();
                    let progress = poll_progress(attempt, max_attempts);
                    self.registry
                        .update(job_id, |job| job.advance(progress))
                        .await;
                }
                Ok(PollOutcome::Completed(result)) => return Ok(result),
                Ok(PollOutcome::Failed(reason)) => {
                    return Err(ProviderError::operation_failed(reason).into());
                }
                Err(e) if e.is_retryable() => {
                    if failures.record_failure() {
                        logger.log_warning(&format!(
                            "poll attempt {}/{} failed: {}",
                            attempt, max_attempts, e
                        ));
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(EngineError::Timeout {
            attempts: max_attempts,
        })
    }

    /// Best-effort upload; failures leave the job with its local path only.
    async fn upload(&self, job_id: &JobId, path: &Path, logger: &JobLogger) {
        let Some(store) = &self.store else {
            return;
        };

        match store.upload(path, &self.config.storage_namespace).await {
            Ok(stored) => {
                self.registry
                    .update(job_id, |job| job.record_upload(stored.key, stored.signed_url))
                    .await;
            }
            Err(e) => {
                metrics::record_storage_failure("upload");
                logger.log_warning(&format!("upload failed, keeping local artifact: {}", e));
            }
        }
    }

    fn record_finished(outcome: JobOutcome, started_at: chrono::DateTime<Utc>) {
        let elapsed = (Utc::now() - started_at).num_milliseconds().max(0) as f64 / 1000.0;
        metrics::record_job_finished(outcome, elapsed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_progress_bounds() {
        assert_eq!(poll_progress(0, 120), 20);
        assert_eq!(poll_progress(60, 120), 55);
        assert_eq!(poll_progress(120, 120), 90);
        assert_eq!(poll_progress(500, 120), 90);
        assert_eq!(poll_progress(1, 0), 90);
    }

    #[test]
    fn test_poll_progress_monotone() {
        let mut last = 0;
        for attempt in 0..=120 {
            let progress = poll_progress(attempt, 120);
            assert!(progress >= last);
            last = progress;
        }
    }
}
