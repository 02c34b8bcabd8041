//! Engine error types.

use thiserror::Error;

use vgen_provider::ProviderError;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job not ready: {0}")]
    NotReady(String),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Generation timed out after {attempts} poll attempts")]
    Timeout { attempts: u32 },

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(job_id: impl std::fmt::Display) -> Self {
        Self::NotFound(job_id.to_string())
    }

    pub fn not_ready(msg: impl Into<String>) -> Self {
        Self::NotReady(msg.into())
    }

    pub fn extraction(msg: impl Into<String>) -> Self {
        Self::Extraction(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message() {
        let err = EngineError::Timeout { attempts: 120 };
        assert_eq!(err.to_string(), "Generation timed out after 120 poll attempts");
    }

    #[test]
    fn test_provider_error_conversion() {
        let err: EngineError = ProviderError::operation_failed("blocked").into();
        assert!(matches!(err, EngineError::Provider(_)));
        assert!(err.to_string().contains("blocked"));
    }

}
