//! Artifact extraction and persistence.

use std::path::Path;

use tracing::debug;
use vgen_provider::GenerationResult;

use crate::error::{EngineError, EngineResult};

/// Decoded video bytes from a terminal provider result.
pub fn extract_video(result: &GenerationResult) -> EngineResult<Vec<u8>> {
    match result.video_bytes() {
        Some((bytes, shape)) => {
            debug!(shape, size = bytes.len(), "Extracted video from provider result");
            Ok(bytes)
        }
        None => Err(EngineError::extraction(
            "no decodable video content in provider result",
        )),
    }
}

/// Write `bytes` to `path`, creating the parent directory if needed.
pub async fn write_artifact(path: &Path, bytes: &[u8]) -> EngineResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await?;
    Ok(())
}
