//! Video generation provider client.
//!
//! This crate provides:
//! - The `GenerationProvider` capability (submit + poll long-running operations)
//! - A Vertex AI (Veo) implementation over REST
//! - Cached Google auth tokens via gcp_auth
//! - Decoding of the known terminal result shapes

pub mod error;
pub mod provider;
pub mod response;
pub mod token_cache;
pub mod vertex;

pub use error::{ProviderError, ProviderResult};
pub use provider::{
    GenerationProvider, GenerationRequest, Operation, OperationError, OperationHandle,
    PollOutcome, SubmitOutcome,
};
pub use response::{EncodedVideo, GenerationResult, Prediction, ResponseShape};
pub use token_cache::{AccessTokenProvider, StaticTokenProvider, TokenCache};
pub use vertex::{VertexClient, VertexConfig};
