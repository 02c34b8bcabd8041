//! Video generation job engine.
//!
//! This crate provides:
//! - The job orchestrator (submission, supervision, driving sequence)
//! - The in-memory job registry
//! - The status reporter
//! - The placeholder artifact used when generation fails

pub mod artifact;
pub mod config;
pub mod driver;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod placeholder;
pub mod registry;
pub mod reporter;
pub mod retry;

pub use config::EngineConfig;
pub use driver::JobDriver;
pub use error::{EngineError, EngineResult};
pub use logging::JobLogger;
pub use orchestrator::JobOrchestrator;
pub use placeholder::{is_valid_mp4, placeholder_mp4};
pub use registry::JobRegistry;
pub use reporter::StatusReporter;
