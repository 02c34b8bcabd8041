//! Job orchestrator.
//!
//! Accepts submissions, registers jobs and hands them to a supervisor task
//! that drives each one on its own tokio task, bounded by a semaphore.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};
use validator::Validate;
use vgen_models::{Job, JobId, JobOptions, SubmitResponse};
use vgen_provider::GenerationProvider;
use vgen_storage::ArtifactStore;

use crate::config::EngineConfig;
use crate::driver::JobDriver;
use crate::error::{EngineError, EngineResult};
use crate::metrics;
use crate::registry::JobRegistry;

/// Longest accepted prompt, in characters.
pub const MAX_PROMPT_CHARS: usize = 4000;

pub struct JobOrchestrator {
    config: Arc<EngineConfig>,
    registry: Arc<JobRegistry>,
    provider: Arc<dyn GenerationProvider>,
    dispatch: Mutex<Option<mpsc::UnboundedSender<JobId>>>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl JobOrchestrator {
    /// Create the orchestrator and spawn its supervisor.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        config: EngineConfig,
        registry: Arc<JobRegistry>,
        provider: Arc<dyn GenerationProvider>,
        store: Option<Arc<dyn ArtifactStore>>,
    ) -> Self {
        let config = Arc::new(config);
        let driver = JobDriver::new(
            Arc::clone(&config),
            Arc::clone(&registry),
            Arc::clone(&provider),
            store,
        );

        let (tx, rx) = mpsc::unbounded_channel();
        let supervisor = tokio::spawn(supervise(
            rx,
            driver,
            Arc::clone(&registry),
            config.max_concurrent_jobs,
        ));

        info!(
            "Job orchestrator started with provider '{}', {} max concurrent jobs, {:?} poll ceiling",
            provider.name(),
            config.max_concurrent_jobs,
            config.poll_ceiling()
        );

        Self {
            config,
            registry,
            provider,
            dispatch: Mutex::new(Some(tx)),
            supervisor: Mutex::new(Some(supervisor)),
        }
    }

    /// Register a job and start generating it in the background.
    pub async fn submit_job(
        &self,
        prompt: &str,
        options: JobOptions,
    ) -> EngineResult<SubmitResponse> {
        self.provider
            .ensure_configured()
            .map_err(|e| {
                if e.is_configuration() {
                    EngineError::configuration(e.to_string())
                } else {
                    EngineError::Provider(e)
                }
            })?;

        validate_request(prompt, &options)?;

        let dispatch = self.dispatch.lock().await;
        let Some(tx) = dispatch.as_ref() else {
            return Err(EngineError::internal("orchestrator is shutting down"));
        };

        let job = Job::new(prompt.trim(), options);
        let response = SubmitResponse {
            job_id: job.id.clone(),
            status: job.status,
            estimated_time: job.options.quality.estimated_secs(),
        };

        self.registry.insert(job).await?;
        if tx.send(response.job_id.clone()).is_err() {
            let reason = "job supervisor is not running";
            self.registry
                .update(&response.job_id, |job| job.fail(reason))
                .await;
            return Err(EngineError::internal(reason));
        }

        metrics::record_job_submitted(self.provider.name());
        info!(job_id = %response.job_id, "Job submitted");
        Ok(response)
    }

    /// Stop accepting jobs and wait for in-flight ones, up to the shutdown timeout.
    pub async fn shutdown(&self) {
        self.dispatch.lock().await.take();

        let Some(handle) = self.supervisor.lock().await.take() else {
            return;
        };

        info!("Waiting for in-flight jobs to complete...");
        match tokio::time::timeout(self.config.shutdown_timeout, handle).await {
            Ok(Ok(())) => info!("Job orchestrator stopped"),
            Ok(Err(e)) => error!("Job supervisor terminated abnormally: {}", e),
            Err(_) => warn!(
                "In-flight jobs still running after {:?}, abandoning them",
                self.config.shutdown_timeout
            ),
        }
    }
}

/// Reject blank or oversized prompts and out-of-range options.
pub fn validate_request(prompt: &str, options: &JobOptions) -> EngineResult<()> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(EngineError::validation("prompt must not be empty"));
    }
    if prompt.chars().count() > MAX_PROMPT_CHARS {
        return Err(EngineError::validation(format!(
            "prompt exceeds {} characters",
            MAX_PROMPT_CHARS
        )));
    }
    options
        .validate()
        .map_err(|e| EngineError::validation(e.to_string()))
}

/// Receives dispatched job ids and drives each one, observing panics.
async fn supervise(
    mut rx: mpsc::UnboundedReceiver<JobId>,
    driver: JobDriver,
    registry: Arc<JobRegistry>,
    max_concurrent_jobs: usize,
) {
    let semaphore = Arc::new(Semaphore::new(max_concurrent_jobs.max(1)));
    let mut tasks: JoinSet<(JobId, Result<(), tokio::task::JoinError>)> = JoinSet::new();

    loop {
        tokio::select! {
            received = rx.recv() => {
                let Some(job_id) = received else {
                    break;
                };
                let semaphore = Arc::clone(&semaphore);
                let driver = driver.clone();
                tasks.spawn(async move {
                    let _permit = semaphore.acquire_owned().await;
                    let id = job_id.clone();
                    let result = tokio::spawn(async move { driver.drive(id).await }).await;
                    (job_id, result)
                });
            }
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                observe(joined, &registry).await;
            }
        }
    }

    debug!("Dispatch channel closed, draining {} job tasks", tasks.len());
    while let Some(joined) = tasks.join_next().await {
        observe(joined, &registry).await;
    }
}

async fn observe(
    joined: Result<(JobId, Result<(), tokio::task::JoinError>), tokio::task::JoinError>,
    registry: &JobRegistry,
) {
    match joined {
        Ok((_, Ok(()))) => {}
        Ok((job_id, Err(e))) => {
            let reason = if e.is_panic() {
                "job task panicked"
            } else {
                "job task was cancelled"
            };
            error!(job_id = %job_id, "{}: {}", reason, e);
            registry
                .update(&job_id, |job| {
                    if !job.is_terminal() {
                        job.fail(reason);
                    }
                })
                .await;
        }
        Err(e) => error!("Job supervisor task failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vgen_models::Quality;

    #[test]
    fn test_validate_request_accepts_defaults() {
        assert!(validate_request("a red fox in snow", &JobOptions::default()).is_ok());
    }

    #[test]
    fn test_validate_request_rejects_blank_prompt() {
        let err = validate_request("   ", &JobOptions::default()).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn test_validate_request_rejects_long_prompt() {
        let prompt = "x".repeat(MAX_PROMPT_CHARS + 1);
        assert!(validate_request(&prompt, &JobOptions::default()).is_err());
    }

    #[test]
    fn test_validate_request_rejects_bad_duration() {
        let options = JobOptions {
            duration_seconds: 0,
            quality: Quality::Fast,
            ..JobOptions::default()
        };
        let err = validate_request("prompt", &options).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }
}
