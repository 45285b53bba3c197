use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use pxb_core::{JobId, ResourceKind};
use pxb_providers::ResourceProvider;
use pxb_runner::BatchOrchestrator;
use pxb_storage::JobStore;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::tracker::JobTracker;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn JobStore>,
    pub resources: Arc<dyn ResourceProvider>,
    pub orchestrator: Arc<BatchOrchestrator>,
    pub tracker: JobTracker,
}

impl AppState {
    pub fn new(
        store: Arc<dyn JobStore>,
        resources: Arc<dyn ResourceProvider>,
        orchestrator: Arc<BatchOrchestrator>,
    ) -> Self {
        Self {
            store,
            resources,
            orchestrator,
            tracker: JobTracker::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request<E: std::fmt::Display>(e: E) -> Self {
        Self::BadRequest(e.to_string())
    }
    pub fn not_found(msg: &str) -> Self {
        Self::NotFound(msg.to_string())
    }
    pub fn internal<E: std::fmt::Display>(e: E) -> Self {
        let msg = format!("{e:#}");
        warn!(error = %msg, "request failed");
        Self::Internal(msg)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (code, msg) = match self {
            ApiError::BadRequest(m) => (axum::http::StatusCode::BAD_REQUEST, m),
            ApiError::NotFound(m) => (axum::http::StatusCode::NOT_FOUND, m),
            ApiError::Internal(m) => (axum::http::StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (code, Json(json!({ "detail": msg }))).into_response()
    }
}

pub async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "service": "pxb",
        "version": env!("CARGO_PKG_VERSION"),
        "active_jobs": state.tracker.active().await,
    }))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

pub async fn cluster_info(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let ctx = state.resources.cluster_context().await.map_err(ApiError::internal)?;
    Ok(Json(json!(ctx)))
}

pub async fn cluster_resources(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let resources = state.resources.list_resources().await.map_err(ApiError::internal)?;
    let vms = resources.iter().filter(|r| r.kind == ResourceKind::Vm).count();
    Ok(Json(json!({
        "total": resources.len(),
        "vms": vms,
        "containers": resources.len() - vms,
        "resources": resources,
    })))
}

/// Creates the job synchronously and drives the rest of the run in the background.
pub async fn start_batch(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let run = state
        .orchestrator
        .start_run()
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::bad_request("no resources found to analyze"))?;

    let job_id = run.job_id();
    let total = run.inventory().len();
    state.tracker.started(job_id).await;

    let orchestrator = Arc::clone(&state.orchestrator);
    let tracker = state.tracker.clone();
    tokio::spawn(async move {
        if let Err(e) = orchestrator.drive(run).await {
            error!(job_id = %job_id, error = %e, "background batch run failed");
        }
        tracker.finished(job_id).await;
    });

    info!(job_id = %job_id, total, "batch run started");
    Ok(Json(json!({
        "job_id": job_id,
        "status": "running",
        "total_resources": total,
    })))
}

pub async fn list_jobs(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let jobs = state.store.list_jobs().await.map_err(ApiError::internal)?;
    Ok(Json(json!(jobs)))
}

pub async fn get_job(State(state): State<AppState>, Path(job_id): Path<i64>) -> Result<Json<Value>, ApiError> {
    let job_id = JobId(job_id);
    let job = state
        .store
        .get_job(job_id)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("job not found"))?;
    let analyses = state.store.list_analyses(job_id).await.map_err(ApiError::internal)?;
    let reports = state.store.list_reports(job_id).await.map_err(ApiError::internal)?;
    Ok(Json(json!({
        "job": job,
        "analyses": analyses,
        "reports": reports,
    })))
}

pub async fn job_status(State(state): State<AppState>, Path(job_id): Path<i64>) -> Result<Json<Value>, ApiError> {
    let job_id = JobId(job_id);
    let job = state
        .store
        .get_job(job_id)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("job not found"))?;
    let driven_here = state.tracker.is_driving(job_id).await;
    Ok(Json(json!({
        "job_id": job.job_id,
        "status": job.status,
        "total_resources": job.total_resources,
        "processed_resources": job.processed_resources,
        "progress_percentage": job.progress_percent(),
        "started_at": job.started_at,
        "completed_at": job.completed_at,
        "error_message": job.error_message,
        "driven_by_this_process": driven_here,
    })))
}

pub async fn get_resource_analysis(
    State(state): State<AppState>,
    Path((job_id, resource_id)): Path<(i64, String)>,
) -> Result<Json<Value>, ApiError> {
    let record = state
        .store
        .get_analysis(JobId(job_id), &resource_id)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("analysis not found"))?;
    Ok(Json(json!(record)))
}
