use async_trait::async_trait;
use pxb_core::{AnalysisRecord, AnalysisResult, BatchJob, InfrastructureReport, JobId};

/// Durable record of job lifecycle and per-resource results.
///
/// Implementations must reject progress that moves backward or passes the job total,
/// and any status change other than RUNNING -> COMPLETED / RUNNING -> FAILED.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Create a RUNNING job with zero processed resources.
    async fn create_job(&self, total_resources: usize) -> anyhow::Result<BatchJob>;
    async fn update_progress(&self, job_id: JobId, processed: usize) -> anyhow::Result<()>;
    async fn complete_job(&self, job_id: JobId, processed: usize) -> anyhow::Result<()>;
    async fn fail_job(&self, job_id: JobId, processed: usize, message: &str) -> anyhow::Result<()>;

    /// Insert or replace the row for this resource within the job.
    async fn save_analysis(&self, job_id: JobId, result: &AnalysisResult) -> anyhow::Result<()>;
    async fn save_report(&self, job_id: JobId, report_type: &str, content: &str) -> anyhow::Result<()>;

    async fn get_job(&self, job_id: JobId) -> anyhow::Result<Option<BatchJob>>;
    /// Newest first.
    async fn list_jobs(&self) -> anyhow::Result<Vec<BatchJob>>;
    async fn list_analyses(&self, job_id: JobId) -> anyhow::Result<Vec<AnalysisRecord>>;
    async fn get_analysis(&self, job_id: JobId, resource_id: &str) -> anyhow::Result<Option<AnalysisRecord>>;
    async fn list_reports(&self, job_id: JobId) -> anyhow::Result<Vec<InfrastructureReport>>;

    /// Mark every RUNNING job FAILED with `reason`. Used to reconcile jobs left behind
    /// by a process that was terminated mid-run.
    async fn abandon_running(&self, reason: &str) -> anyhow::Result<Vec<JobId>>;
}
