use thiserror::Error;

/// Failures that end a run. Once a job exists, the job is marked FAILED with the
/// rendered message before one of these reaches the caller.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("resource provider error: {0:#}")]
    Provider(anyhow::Error),
    #[error("summary generation failed: {0:#}")]
    Summary(anyhow::Error),
    #[error("persistence error: {0:#}")]
    Persistence(anyhow::Error),
    #[error("artifact write error: {0:#}")]
    Write(anyhow::Error),
    #[error("{dropped} analysis task(s) were dropped, limit is {limit}")]
    DroppedLimit { dropped: usize, limit: usize },
}

/// Per-resource failure. Recorded inside the resource's result, never propagated.
#[derive(Debug, Error)]
#[error("Error: {source:#}")]
pub struct ResourceAnalysisError {
    pub resource_id: String,
    pub source: anyhow::Error,
}

impl ResourceAnalysisError {
    pub fn new(resource_id: impl Into<String>, source: anyhow::Error) -> Self {
        Self {
            resource_id: resource_id.into(),
            source,
        }
    }
}
