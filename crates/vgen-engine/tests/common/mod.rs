//! Scripted provider and in-memory store for engine tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::json;
use tempfile::TempDir;

use vgen_engine::{EngineConfig, JobOrchestrator, JobRegistry, StatusReporter};
use vgen_models::{JobId, JobStatusReport};
use vgen_provider::{
    GenerationProvider, GenerationRequest, GenerationResult, OperationHandle, PollOutcome,
    ProviderError, ProviderResult, SubmitOutcome,
};
use vgen_storage::{artifact_key, ArtifactStore, StorageError, StorageResult, StoredArtifact};

pub const VIDEO_BYTES: &[u8] = b"\x00\x00\x00\x18ftypmp42generated-video";

pub fn video_result(bytes: &[u8]) -> GenerationResult {
    GenerationResult::new(json!({
        "videos": [{ "bytesBase64Encoded": STANDARD.encode(bytes), "mimeType": "video/mp4" }]
    }))
}

/// Provider answering from queues of canned responses.
///
/// When a queue runs dry the last configured fallback answer is repeated.
pub struct ScriptedProvider {
    configured: bool,
    submits: Mutex<VecDeque<ProviderResult<SubmitOutcome>>>,
    polls: Mutex<VecDeque<ProviderResult<PollOutcome>>>,
    submit_default: fn() -> ProviderResult<SubmitOutcome>,
    poll_default: fn() -> ProviderResult<PollOutcome>,
    pub submit_calls: AtomicU32,
    pub poll_calls: AtomicU32,
}

impl ScriptedProvider {
    fn with_defaults(
        submit_default: fn() -> ProviderResult<SubmitOutcome>,
        poll_default: fn() -> ProviderResult<PollOutcome>,
    ) -> Self {
        Self {
            configured: true,
            submits: Mutex::new(VecDeque::new()),
            polls: Mutex::new(VecDeque::new()),
            submit_default,
            poll_default,
            submit_calls: AtomicU32::new(0),
            poll_calls: AtomicU32::new(0),
        }
    }

    /// Returns the video synchronously from `submit`.
    pub fn immediate() -> Self {
        Self::with_defaults(
            || Ok(SubmitOutcome::Completed(video_result(VIDEO_BYTES))),
            || Ok(PollOutcome::Running),
        )
    }

    /// Accepts the request, then runs `running` polls before completing.
    pub fn eventually(running: usize) -> Self {
        let provider = Self::with_defaults(
            || Ok(SubmitOutcome::Pending(OperationHandle("operations/op-1".into()))),
            || Ok(PollOutcome::Completed(video_result(VIDEO_BYTES))),
        );
        {
            let mut polls = provider.polls.lock().unwrap();
            for _ in 0..running {
                polls.push_back(Ok(PollOutcome::Running));
            }
        }
        provider
    }

    /// Accepts the request and never finishes.
    pub fn never_done() -> Self {
        Self::with_defaults(
            || Ok(SubmitOutcome::Pending(OperationHandle("operations/stuck".into()))),
            || Ok(PollOutcome::Running),
        )
    }

    /// Every submission is rejected with a non-transient error.
    pub fn always_failing() -> Self {
        Self::with_defaults(
            || Err(ProviderError::from_http_status(400, "prompt rejected")),
            || Ok(PollOutcome::Running),
        )
    }

    /// Completes with a result that carries no video.
    pub fn empty_result() -> Self {
        Self::with_defaults(
            || Ok(SubmitOutcome::Completed(GenerationResult::empty())),
            || Ok(PollOutcome::Running),
        )
    }

    /// Accepts the request, then reports an operation failure on the first poll.
    pub fn operation_fails() -> Self {
        Self::with_defaults(
            || Ok(SubmitOutcome::Pending(OperationHandle("operations/bad".into()))),
            || Ok(PollOutcome::Failed("safety filter".into())),
        )
    }

    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::immediate()
        }
    }

    pub fn push_submit(self, outcome: ProviderResult<SubmitOutcome>) -> Self {
        self.submits.lock().unwrap().push_back(outcome);
        self
    }

    pub fn push_poll(self, outcome: ProviderResult<PollOutcome>) -> Self {
        self.polls.lock().unwrap().push_back(outcome);
        self
    }

    pub fn submit_count(&self) -> u32 {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn poll_count(&self) -> u32 {
        self.poll_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn ensure_configured(&self) -> ProviderResult<()> {
        if self.configured {
            Ok(())
        } else {
            Err(ProviderError::not_configured("missing project id"))
        }
    }

    async fn submit(&self, _request: &GenerationRequest) -> ProviderResult<SubmitOutcome> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.submits.lock().unwrap().pop_front();
        next.unwrap_or_else(self.submit_default)
    }

    async fn poll(&self, _operation: &OperationHandle) -> ProviderResult<PollOutcome> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.polls.lock().unwrap().pop_front();
        next.unwrap_or_else(self.poll_default)
    }
}

/// Store that keeps keys in memory and signs deterministic URLs.
#[derive(Default)]
pub struct MemoryStore {
    pub fail_upload: bool,
    pub fail_signing: bool,
    pub keys: Mutex<Vec<String>>,
    pub mints: AtomicU32,
}

impl MemoryStore {
    pub fn failing_upload() -> Self {
        Self {
            fail_upload: true,
            ..Self::default()
        }
    }

    pub fn failing_signing() -> Self {
        Self {
            fail_signing: true,
            ..Self::default()
        }
    }

    pub fn mint_count(&self) -> u32 {
        self.mints.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn upload(&self, path: &Path, namespace: &str) -> StorageResult<StoredArtifact> {
        if self.fail_upload {
            return Err(StorageError::upload_failed("bucket unreachable"));
        }
        let key = artifact_key(path, namespace)?;
        self.keys.lock().unwrap().push(key.clone());
        let signed_url = format!("https://signed.test/{}?ttl=86400", key);
        Ok(StoredArtifact { key, signed_url })
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> StorageResult<String> {
        if self.fail_signing {
            return Err(StorageError::presign_failed("clock skew"));
        }
        self.mints.fetch_add(1, Ordering::SeqCst);
        Ok(format!("https://signed.test/{}?ttl={}", key, ttl.as_secs()))
    }
}

/// Orchestrator, reporter and the temp dir backing the uploads directory.
pub struct Harness {
    pub orchestrator: JobOrchestrator,
    pub reporter: StatusReporter,
    pub registry: Arc<JobRegistry>,
    pub config: EngineConfig,
    pub uploads: TempDir,
}

pub fn fast_config(uploads: &TempDir) -> EngineConfig {
    EngineConfig {
        uploads_dir: uploads.path().to_path_buf(),
        poll_interval: Duration::from_millis(5),
        max_poll_attempts: 20,
        submit_retries: 2,
        submit_retry_base_delay: Duration::from_millis(1),
        shutdown_timeout: Duration::from_secs(5),
        ..EngineConfig::default()
    }
}

pub fn harness(
    provider: Arc<dyn GenerationProvider>,
    store: Option<Arc<dyn ArtifactStore>>,
    configure: impl FnOnce(&mut EngineConfig),
) -> Harness {
    let uploads = tempfile::tempdir().unwrap();
    let mut config = fast_config(&uploads);
    configure(&mut config);

    let registry = Arc::new(JobRegistry::new());
    let reporter = StatusReporter::new(
        Arc::clone(&registry),
        store.clone(),
        config.signed_url_ttl,
    );
    let orchestrator =
        JobOrchestrator::start(config.clone(), Arc::clone(&registry), provider, store);

    Harness {
        orchestrator,
        reporter,
        registry,
        config,
        uploads,
    }
}

/// Poll the reporter until the job is terminal, collecting every report seen.
pub async fn wait_terminal(reporter: &StatusReporter, job_id: &JobId) -> Vec<JobStatusReport> {
    let mut seen = Vec::new();
    for _ in 0..10_000 {
        let report = reporter.get_status(job_id).await.unwrap();
        let terminal = report.status.is_terminal();
        seen.push(report);
        if terminal {
            return seen;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("job {} never reached a terminal state", job_id);
}
