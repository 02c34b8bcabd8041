//! The generation provider capability.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use vgen_models::JobOptions;

use crate::error::{ProviderError, ProviderResult};
use crate::response::GenerationResult;

/// What the engine asks a provider to generate.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub duration_seconds: u32,
    pub aspect_ratio: String,
    pub negative_prompt: Option<String>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, options: &JobOptions) -> Self {
        Self {
            prompt: prompt.into(),
            duration_seconds: options.duration_seconds,
            aspect_ratio: options.aspect_ratio.as_str().to_string(),
            negative_prompt: options.negative_prompt.clone(),
        }
    }
}

/// Handle to a long-running provider operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationHandle(pub String);

impl OperationHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OperationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Answer to a submission.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// The provider finished synchronously.
    Completed(GenerationResult),
    /// The provider accepted the request; poll the handle.
    Pending(OperationHandle),
}

/// Answer to one poll.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Running,
    Completed(GenerationResult),
    /// The provider reported that the operation failed.
    Failed(String),
}

/// External video generation service.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Provider name for logs and metrics.
    fn name(&self) -> &'static str;

    /// Fail with `ProviderError::NotConfigured` if credentials or settings are missing.
    fn ensure_configured(&self) -> ProviderResult<()> {
        Ok(())
    }

    async fn submit(&self, request: &GenerationRequest) -> ProviderResult<SubmitOutcome>;

    async fn poll(&self, operation: &OperationHandle) -> ProviderResult<PollOutcome>;
}

// =============================================================================
// Long-running operation wire type
// =============================================================================

/// Error payload of a failed operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub code: Option<i32>,
    #[serde(default)]
    pub message: Option<String>,
}

impl OperationError {
    pub fn describe(&self) -> String {
        match (&self.message, self.code) {
            (Some(message), Some(code)) => format!("{} (code {})", message, code),
            (Some(message), None) => message.clone(),
            (None, Some(code)) => format!("operation failed with code {}", code),
            (None, None) => "operation failed".to_string(),
        }
    }
}

/// Google-style long-running operation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Operation {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub response: Option<GenerationResult>,
    #[serde(default)]
    pub error: Option<OperationError>,
}

impl Operation {
    /// Interpret the operation returned by a submission.
    pub fn into_submit_outcome(self) -> ProviderResult<SubmitOutcome> {
        if let Some(error) = self.error {
            return Err(ProviderError::operation_failed(error.describe()));
        }

        if self.done {
            return Ok(SubmitOutcome::Completed(
                self.response.unwrap_or_else(GenerationResult::empty),
            ));
        }

        match self.name {
            Some(name) if !name.is_empty() => Ok(SubmitOutcome::Pending(OperationHandle(name))),
            _ => Err(ProviderError::invalid_response(
                "operation is not done and has no name",
            )),
        }
    }

    /// Interpret the operation returned by a poll.
    pub fn into_poll_outcome(self) -> PollOutcome {
        if let Some(error) = self.error {
            return PollOutcome::Failed(error.describe());
        }

        if self.done {
            PollOutcome::Completed(self.response.unwrap_or_else(GenerationResult::empty))
        } else {
            PollOutcome::Running
        }
    }
}
