//! Vertex AI video generation client.
//!
//! Submits `predictLongRunning` requests to a Veo publisher model and polls
//! them through `fetchPredictOperation`. A fresh bearer token is requested
//! from the token provider before every call.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{
    GenerationProvider, GenerationRequest, Operation, OperationHandle, PollOutcome, SubmitOutcome,
};
use crate::token_cache::{AccessTokenProvider, StaticTokenProvider, TokenCache};

// =============================================================================
// Configuration
// =============================================================================

/// Vertex AI client configuration.
#[derive(Debug, Clone)]
pub struct VertexConfig {
    /// GCP project ID; `None` leaves the provider unconfigured
    pub project_id: Option<String>,
    /// Vertex region
    pub location: String,
    /// Publisher model
    pub model: String,
    /// Override for the API root (tests, private endpoints)
    pub base_url: Option<String>,
    /// Request timeout
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
}

impl Default for VertexConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            location: "us-central1".to_string(),
            model: "veo-2.0-generate-001".to_string(),
            base_url: None,
            timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl VertexConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let project_id = std::env::var("GCP_PROJECT_ID")
            .or_else(|_| std::env::var("GOOGLE_CLOUD_PROJECT"))
            .ok()
            .filter(|s| !s.trim().is_empty());

        Self {
            project_id,
            location: std::env::var("VERTEX_LOCATION")
                .unwrap_or_else(|_| "us-central1".to_string()),
            model: std::env::var("VEO_MODEL")
                .unwrap_or_else(|_| "veo-2.0-generate-001".to_string()),
            base_url: std::env::var("VERTEX_BASE_URL").ok(),
            timeout: Duration::from_secs(
                std::env::var("VERTEX_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            connect_timeout: Duration::from_secs(5),
        }
    }

    fn api_root(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}-aiplatform.googleapis.com/v1", self.location),
        }
    }

    fn model_path(&self, project_id: &str) -> String {
        format!(
            "{}/projects/{}/locations/{}/publishers/google/models/{}",
            self.api_root(),
            project_id,
            self.location,
            self.model
        )
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
struct PredictLongRunningRequest<'a> {
    instances: Vec<Instance<'a>>,
    parameters: Parameters<'a>,
}

#[derive(Debug, Serialize)]
struct Instance<'a> {
    prompt: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Parameters<'a> {
    duration_seconds: u32,
    aspect_ratio: &'a str,
    sample_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    negative_prompt: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FetchOperationRequest<'a> {
    operation_name: &'a str,
}

// =============================================================================
// Client
// =============================================================================

/// Vertex AI Veo client.
#[derive(Clone)]
pub struct VertexClient {
    http: Client,
    config: VertexConfig,
    auth: Option<Arc<dyn AccessTokenProvider>>,
}

impl VertexClient {
    /// Create a client with an explicit token provider.
    pub fn new(
        config: VertexConfig,
        auth: Option<Arc<dyn AccessTokenProvider>>,
    ) -> ProviderResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(concat!("vgen-provider/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ProviderError::Network)?;

        Ok(Self { http, config, auth })
    }

    /// Create from environment variables.
    ///
    /// Missing credentials do not fail construction; the client reports
    /// itself unconfigured and submissions are rejected instead.
    pub async fn from_env() -> ProviderResult<Self> {
        let config = VertexConfig::from_env();
        let auth = Self::create_auth_provider().await;
        Self::new(config, auth)
    }

    async fn create_auth_provider() -> Option<Arc<dyn AccessTokenProvider>> {
        if let Ok(token) = std::env::var("VERTEX_ACCESS_TOKEN") {
            info!("Using static Vertex access token from VERTEX_ACCESS_TOKEN");
            return Some(Arc::new(StaticTokenProvider::new(token)));
        }

        let provider: Option<Arc<dyn TokenProvider>> = match CustomServiceAccount::from_env() {
            Ok(Some(sa)) => Some(Arc::new(sa)),
            Ok(None) => match gcp_auth::provider().await {
                Ok(provider) => Some(provider),
                Err(e) => {
                    warn!("No Google credentials available: {}", e);
                    None
                }
            },
            Err(e) => {
                warn!("Failed to load service account: {}", e);
                None
            }
        };

        provider.map(|p| Arc::new(TokenCache::new(p)) as Arc<dyn AccessTokenProvider>)
    }

    pub fn config(&self) -> &VertexConfig {
        &self.config
    }

    fn project_id(&self) -> ProviderResult<&str> {
        self.config
            .project_id
            .as_deref()
            .ok_or_else(|| ProviderError::not_configured("GCP_PROJECT_ID is not set"))
    }

    async fn bearer_token(&self) -> ProviderResult<String> {
        let auth = self
            .auth
            .as_ref()
            .ok_or_else(|| ProviderError::not_configured("no Google credentials available"))?;
        auth.access_token().await
    }

    async fn send_authorized<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
    ) -> ProviderResult<reqwest::Response> {
        let token = self.bearer_token().await?;
        Ok(self
            .http
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await?)
    }

    /// POST to an operation endpoint. A 401 invalidates the cached token and
    /// the request is sent once more with a fresh one.
    async fn post_operation<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
    ) -> ProviderResult<Operation> {
        let mut response = self.send_authorized(url, body).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            if let Some(auth) = &self.auth {
                auth.invalidate().await;
            }
            debug!("Provider rejected auth token, retrying with a fresh one");
            response = self.send_authorized(url, body).await?;
        }

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_http_status(status.as_u16(), error_text));
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            ProviderError::invalid_response(format!("Failed to parse operation: {}", e))
        })
    }
}

#[async_trait]
impl GenerationProvider for VertexClient {
    fn name(&self) -> &'static str {
        "vertex"
    }

    fn ensure_configured(&self) -> ProviderResult<()> {
        self.project_id()?;
        if self.auth.is_none() {
            return Err(ProviderError::not_configured(
                "no Google credentials available",
            ));
        }
        Ok(())
    }

    async fn submit(&self, request: &GenerationRequest) -> ProviderResult<SubmitOutcome> {
        let url = format!(
            "{}:predictLongRunning",
            self.config.model_path(self.project_id()?)
        );

        let body = PredictLongRunningRequest {
            instances: vec![Instance {
                prompt: &request.prompt,
            }],
            parameters: Parameters {
                duration_seconds: request.duration_seconds,
                aspect_ratio: &request.aspect_ratio,
                sample_count: 1,
                negative_prompt: request.negative_prompt.as_deref(),
            },
        };

        debug!(model = %self.config.model, "Submitting generation request");
        self.post_operation(&url, &body).await?.into_submit_outcome()
    }

    async fn poll(&self, operation: &OperationHandle) -> ProviderResult<PollOutcome> {
        let url = format!(
            "{}:fetchPredictOperation",
            self.config.model_path(self.project_id()?)
        );

        let body = FetchOperationRequest {
            operation_name: operation.as_str(),
        };

        let op = self.post_operation(&url, &body).await?;
        Ok(op.into_poll_outcome())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use base64::Engine as _;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use vgen_models::JobOptions;

    const MODEL_PATH: &str =
        "/projects/test-project/locations/us-central1/publishers/google/models/veo-test";

    fn test_config(base_url: &str) -> VertexConfig {
        VertexConfig {
            project_id: Some("test-project".to_string()),
            location: "us-central1".to_string(),
            model: "veo-test".to_string(),
            base_url: Some(base_url.to_string()),
            timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
        }
    }

    fn test_client(base_url: &str) -> VertexClient {
        VertexClient::new(
            test_config(base_url),
            Some(Arc::new(StaticTokenProvider::new("test-token"))),
        )
        .unwrap()
    }

    /// Hands out a new token on every call.
    struct CountingTokens(AtomicU32);

    #[async_trait]
    impl AccessTokenProvider for CountingTokens {
        async fn access_token(&self) -> ProviderResult<String> {
            let n = self.0.fetch_add(1, Ordering::SeqCst);
            Ok(format!("token-{}", n))
        }
    }

    /// Serves `token-<generation>`; each invalidation starts a new generation.
    struct RotatingTokens {
        generation: AtomicU32,
    }

    #[async_trait]
    impl AccessTokenProvider for RotatingTokens {
        async fn access_token(&self) -> ProviderResult<String> {
            Ok(format!("token-{}", self.generation.load(Ordering::SeqCst)))
        }

        async fn invalidate(&self) {
            self.generation.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_default_api_root() {
        let config = VertexConfig {
            project_id: Some("p".into()),
            ..VertexConfig::default()
        };
        assert_eq!(
            config.model_path("p"),
            "https://us-central1-aiplatform.googleapis.com/v1/projects/p/locations/us-central1/publishers/google/models/veo-2.0-generate-001"
        );
    }

    #[test]
    fn test_ensure_configured() {
        let client = VertexClient::new(VertexConfig::default(), None).unwrap();
        let err = client.ensure_configured().unwrap_err();
        assert!(err.is_configuration());

        let client = VertexClient::new(
            VertexConfig {
                project_id: Some("p".into()),
                ..VertexConfig::default()
            },
            None,
        )
        .unwrap();
        assert!(client.ensure_configured().unwrap_err().is_configuration());

        assert!(test_client("http://localhost").ensure_configured().is_ok());
    }

    #[tokio::test]
    async fn test_submit_returns_pending_handle() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{}:predictLongRunning", MODEL_PATH)))
            .and(header("authorization", "Bearer test-token"))
            .and(body_partial_json(json!({
                "instances": [{ "prompt": "a fox in snow" }],
                "parameters": { "durationSeconds": 8, "aspectRatio": "16:9", "sampleCount": 1 }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "projects/test-project/operations/op-1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let request = GenerationRequest::new("a fox in snow", &JobOptions::default());
        let outcome = client.submit(&request).await.unwrap();

        assert_eq!(
            outcome,
            SubmitOutcome::Pending(OperationHandle("projects/test-project/operations/op-1".into()))
        );
    }

    #[tokio::test]
    async fn test_submit_maps_http_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{}:predictLongRunning", MODEL_PATH)))
            .respond_with(ResponseTemplate::new(503).set_body_string("try later"))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let request = GenerationRequest::new("a fox in snow", &JobOptions::default());
        let err = client.submit(&request).await.unwrap_err();

        assert!(matches!(err, ProviderError::ServerError(503, _)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_poll_completed_with_video() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"video");
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{}:fetchPredictOperation", MODEL_PATH)))
            .and(body_partial_json(json!({ "operationName": "op-1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "op-1",
                "done": true,
                "response": { "videos": [{ "bytesBase64Encoded": encoded }] }
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let outcome = client.poll(&OperationHandle("op-1".into())).await.unwrap();

        match outcome {
            PollOutcome::Completed(result) => {
                assert_eq!(result.video_bytes().unwrap().0, b"video");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_poll_requests_token_every_time() {
        let server = MockServer::start().await;
        for n in 0..3 {
            Mock::given(method("POST"))
                .and(path(format!("{}:fetchPredictOperation", MODEL_PATH)))
                .and(header("authorization", format!("Bearer token-{}", n).as_str()))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "name": "op-1",
                    "done": false
                })))
                .expect(1)
                .mount(&server)
                .await;
        }

        let tokens = Arc::new(CountingTokens(AtomicU32::new(0)));
        let client = VertexClient::new(test_config(&server.uri()), Some(tokens.clone())).unwrap();
        let handle = OperationHandle("op-1".into());

        for _ in 0..3 {
            assert_eq!(client.poll(&handle).await.unwrap(), PollOutcome::Running);
        }
        assert_eq!(tokens.0.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_poll_rejects_garbage_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{}:fetchPredictOperation", MODEL_PATH)))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.poll(&OperationHandle("op-1".into())).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_unauthorized_refreshes_token_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{}:fetchPredictOperation", MODEL_PATH)))
            .and(header("authorization", "Bearer token-0"))
            .respond_with(ResponseTemplate::new(401).set_body_string("token expired"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("{}:fetchPredictOperation", MODEL_PATH)))
            .and(header("authorization", "Bearer token-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "op-1",
                "done": false
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tokens = Arc::new(RotatingTokens {
            generation: AtomicU32::new(0),
        });
        let client = VertexClient::new(test_config(&server.uri()), Some(tokens.clone())).unwrap();

        let outcome = client.poll(&OperationHandle("op-1".into())).await.unwrap();

        assert_eq!(outcome, PollOutcome::Running);
        assert_eq!(tokens.generation.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_repeated_unauthorized_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{}:fetchPredictOperation", MODEL_PATH)))
            .respond_with(ResponseTemplate::new(401).set_body_string("denied"))
            .expect(2)
            .mount(&server)
            .await;

        let tokens = Arc::new(RotatingTokens {
            generation: AtomicU32::new(0),
        });
        let client = VertexClient::new(test_config(&server.uri()), Some(tokens.clone())).unwrap();

        let err = client.poll(&OperationHandle("op-1".into())).await.unwrap_err();

        assert!(matches!(err, ProviderError::AuthError(_)));
        assert_eq!(tokens.generation.load(Ordering::SeqCst), 1);
    }
}
