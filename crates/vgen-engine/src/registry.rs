//! In-memory job registry.
//!
//! Shared between the orchestrator (writer, one task per job) and the
//! status reporter (readers). Contents are lost on restart.

use std::collections::HashMap;

use tokio::sync::RwLock;
use vgen_models::{Job, JobId};

use crate::error::{EngineError, EngineResult};

#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new job. Identifiers are never reused.
    pub async fn insert(&self, job: Job) -> EngineResult<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(EngineError::internal(format!(
                "duplicate job id {}",
                job.id
            )));
        }
        jobs.insert(job.id.clone(), job);
        Ok(())
    }

    /// Snapshot of a job.
    pub async fn get(&self, job_id: &JobId) -> Option<Job> {
        self.jobs.read().await.get(job_id).cloned()
    }

    /// Mutate a job in place under the write lock.
    ///
    /// Returns `None` if the job is unknown.
    pub async fn update<F, R>(&self, job_id: &JobId, f: F) -> Option<R>
    where
        F: FnOnce(&mut Job) -> R,
    {
        self.jobs.write().await.get_mut(job_id).map(f)
    }

    /// Snapshot of all jobs, oldest first.
    pub async fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by(|a, b| a.started_at.cmp(&b.started_at).then_with(|| a.id.cmp(&b.id)));
        jobs
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}
