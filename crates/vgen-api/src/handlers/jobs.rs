//! Generation job handlers.
//!
//! - `POST /api/jobs` submits a prompt and returns immediately
//! - `GET /api/jobs/:job_id` reports status and progress
//! - `GET /api/jobs/:job_id/artifact` resolves where the video can be fetched
//! - `GET /api/jobs` lists every tracked job

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::info;

use vgen_models::{ArtifactLocation, JobId, JobOptions, JobStatusReport, SubmitResponse};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Job submission body.
#[derive(Debug, Deserialize)]
pub struct SubmitJobRequest {
    pub prompt: String,
    #[serde(default)]
    pub options: JobOptions,
}

/// Submit a generation job.
pub async fn submit_job(
    State(state): State<AppState>,
    body: Result<Json<SubmitJobRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    let Json(request) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let response = state
        .orchestrator
        .submit_job(&request.prompt, request.options)
        .await?;

    info!(
        job_id = %response.job_id,
        estimated_time = response.estimated_time,
        "Accepted generation job"
    );

    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// Get the status of a job.
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobStatusReport>> {
    let report = state
        .reporter
        .get_status(&JobId::from_string(job_id))
        .await?;
    Ok(Json(report))
}

/// Resolve where a finished job's artifact can be fetched.
pub async fn get_job_artifact(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<ArtifactLocation>> {
    let location = state
        .reporter
        .get_artifact_location(&JobId::from_string(job_id))
        .await?;
    Ok(Json(location))
}

/// List all tracked jobs, oldest first.
pub async fn list_jobs(State(state): State<AppState>) -> Json<Vec<JobStatusReport>> {
    Json(state.reporter.list_jobs().await)
}
