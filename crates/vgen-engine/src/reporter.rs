//! Status queries over the job registry.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::warn;
use vgen_models::{ArtifactLocation, Job, JobId, JobStatus, JobStatusReport};
use vgen_storage::ArtifactStore;

use crate::error::{EngineError, EngineResult};
use crate::metrics;
use crate::registry::JobRegistry;

/// Read side of the engine.
///
/// Storage problems never fail a query; they only drop the signed URL.
#[derive(Clone)]
pub struct StatusReporter {
    registry: Arc<JobRegistry>,
    store: Option<Arc<dyn ArtifactStore>>,
    signed_url_ttl: Duration,
}

impl StatusReporter {
    pub fn new(
        registry: Arc<JobRegistry>,
        store: Option<Arc<dyn ArtifactStore>>,
        signed_url_ttl: Duration,
    ) -> Self {
        Self {
            registry,
            store,
            signed_url_ttl,
        }
    }

    /// Current status of a job, with a freshly signed artifact URL when available.
    pub async fn get_status(&self, job_id: &JobId) -> EngineResult<JobStatusReport> {
        let job = self.find(job_id).await?;
        let artifact_url = self.fresh_url(&job).await;
        Ok(JobStatusReport::from_job(&job, Utc::now(), artifact_url))
    }

    /// Where the finished artifact can be fetched from.
    pub async fn get_artifact_location(&self, job_id: &JobId) -> EngineResult<ArtifactLocation> {
        let job = self.find(job_id).await?;
        if job.status != JobStatus::Completed {
            return Err(EngineError::not_ready(format!(
                "job {} is {}",
                job_id, job.status
            )));
        }

        if let Some(url) = self.fresh_url(&job).await {
            return Ok(ArtifactLocation::Url(url));
        }

        job.artifact_local_path
            .map(ArtifactLocation::LocalPath)
            .ok_or_else(|| EngineError::internal(format!("job {} has no artifact", job_id)))
    }

    /// All jobs, oldest first. URLs are the ones recorded at upload time.
    pub async fn list_jobs(&self) -> Vec<JobStatusReport> {
        let now = Utc::now();
        self.registry
            .list()
            .await
            .iter()
            .map(|job| JobStatusReport::from_job(job, now, job.artifact_url.clone()))
            .collect()
    }

    async fn find(&self, job_id: &JobId) -> EngineResult<Job> {
        self.registry
            .get(job_id)
            .await
            .ok_or_else(|| EngineError::not_found(job_id))
    }

    async fn fresh_url(&self, job: &Job) -> Option<String> {
        if job.status != JobStatus::Completed {
            return None;
        }
        let store = self.store.as_ref()?;
        let key = job.artifact_remote_key.as_deref()?;

        match store.signed_url(key, self.signed_url_ttl).await {
            Ok(url) => Some(url),
            Err(e) => {
                metrics::record_storage_failure("signed_url");
                warn!(job_id = %job.id, "Failed to mint signed URL: {}", e);
                None
            }
        }
    }
}
