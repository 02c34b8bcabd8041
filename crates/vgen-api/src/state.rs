//! Application state.

use std::sync::Arc;

use tracing::{info, warn};
use vgen_engine::{EngineConfig, JobOrchestrator, JobRegistry, StatusReporter};
use vgen_provider::{GenerationProvider, VertexClient};
use vgen_storage::{ArtifactStore, R2Client};

use crate::config::ApiConfig;

/// Shared application state.
///
/// Owns the job registry and hands it to both the orchestrator (writer)
/// and the reporter (reader).
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub registry: Arc<JobRegistry>,
    pub orchestrator: Arc<JobOrchestrator>,
    pub reporter: StatusReporter,
    pub provider: Arc<dyn GenerationProvider>,
    pub storage: Option<Arc<R2Client>>,
}

impl AppState {
    /// Create new application state from the environment.
    ///
    /// Missing provider credentials do not fail startup; submissions are
    /// rejected until they are configured. Missing R2 settings disable
    /// durable storage.
    pub async fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let provider = Arc::new(VertexClient::from_env().await?);
        if let Err(e) = provider.ensure_configured() {
            warn!("Generation provider is not configured: {}", e);
        }

        let storage = match R2Client::from_env() {
            Ok(client) => {
                info!("R2 storage enabled (bucket {})", client.bucket());
                Some(Arc::new(client))
            }
            Err(e) => {
                warn!("R2 storage disabled, artifacts stay local: {}", e);
                None
            }
        };

        Ok(Self::with_components(
            config,
            EngineConfig::from_env(),
            provider,
            storage,
        ))
    }

    /// Assemble state from explicit components.
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_components(
        config: ApiConfig,
        engine_config: EngineConfig,
        provider: Arc<dyn GenerationProvider>,
        storage: Option<Arc<R2Client>>,
    ) -> Self {
        let store = storage
            .clone()
            .map(|client| client as Arc<dyn ArtifactStore>);

        let registry = Arc::new(JobRegistry::new());
        let reporter = StatusReporter::new(
            Arc::clone(&registry),
            store.clone(),
            engine_config.signed_url_ttl,
        );
        let orchestrator = JobOrchestrator::start(
            engine_config,
            Arc::clone(&registry),
            Arc::clone(&provider),
            store,
        );

        Self {
            config,
            registry,
            orchestrator: Arc::new(orchestrator),
            reporter,
            provider,
            storage,
        }
    }
}
