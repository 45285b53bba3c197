use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use pxb_core::{
    progress_is_valid, AnalysisRecord, AnalysisResult, BatchJob, InfrastructureReport, JobId, JobStatus,
};

use crate::traits::JobStore;

/// In-memory job store for tests and dry runs. Not durable.
#[derive(Default)]
pub struct InMemoryJobStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: i64,
    jobs: Vec<BatchJob>,
    analyses: Vec<AnalysisRecord>,
    reports: Vec<InfrastructureReport>,
}

impl Inner {
    fn job_mut(&mut self, job_id: JobId) -> Result<&mut BatchJob> {
        self.jobs
            .iter_mut()
            .find(|j| j.job_id == job_id)
            .ok_or_else(|| anyhow!("job {job_id} not found"))
    }

    fn finish(&mut self, job_id: JobId, processed: usize, status: JobStatus, message: Option<&str>) -> Result<()> {
        let job = self.job_mut(job_id)?;
        if !job.status.can_transition_to(status) {
            bail!("job {job_id} cannot move from {} to {}", job.status.as_str(), status.as_str());
        }
        if !progress_is_valid(job.processed_resources, processed, job.total_resources) {
            bail!(
                "job {job_id}: invalid progress {processed} (current {}, total {})",
                job.processed_resources,
                job.total_resources
            );
        }
        job.processed_resources = processed;
        job.status = status;
        job.completed_at = Some(Utc::now());
        job.error_message = message.map(str::to_string);
        Ok(())
    }
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| anyhow!("in-memory job store lock poisoned"))
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create_job(&self, total_resources: usize) -> Result<BatchJob> {
        let mut inner = self.lock()?;
        inner.next_id += 1;
        let job = BatchJob {
            job_id: JobId(inner.next_id),
            started_at: Utc::now(),
            completed_at: None,
            status: JobStatus::Running,
            total_resources,
            processed_resources: 0,
            error_message: None,
        };
        inner.jobs.push(job.clone());
        Ok(job)
    }

    async fn update_progress(&self, job_id: JobId, processed: usize) -> Result<()> {
        let mut inner = self.lock()?;
        let job = inner.job_mut(job_id)?;
        if job.status != JobStatus::Running {
            bail!("job {job_id} is not running");
        }
        if !progress_is_valid(job.processed_resources, processed, job.total_resources) {
            bail!(
                "job {job_id}: invalid progress {processed} (current {}, total {})",
                job.processed_resources,
                job.total_resources
            );
        }
        job.processed_resources = processed;
        Ok(())
    }

    async fn complete_job(&self, job_id: JobId, processed: usize) -> Result<()> {
        self.lock()?.finish(job_id, processed, JobStatus::Completed, None)
    }

    async fn fail_job(&self, job_id: JobId, processed: usize, message: &str) -> Result<()> {
        self.lock()?.finish(job_id, processed, JobStatus::Failed, Some(message))
    }

    async fn save_analysis(&self, job_id: JobId, result: &AnalysisResult) -> Result<()> {
        let mut inner = self.lock()?;
        inner.job_mut(job_id)?;
        let record = AnalysisRecord {
            job_id,
            result: result.clone(),
            analyzed_at: Utc::now(),
        };
        match inner
            .analyses
            .iter_mut()
            .find(|a| a.job_id == job_id && a.result.resource_id() == result.resource_id())
        {
            Some(existing) => *existing = record,
            None => inner.analyses.push(record),
        }
        Ok(())
    }

    async fn save_report(&self, job_id: JobId, report_type: &str, content: &str) -> Result<()> {
        let mut inner = self.lock()?;
        inner.job_mut(job_id)?;
        inner.reports.push(InfrastructureReport {
            job_id,
            report_type: report_type.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn get_job(&self, job_id: JobId) -> Result<Option<BatchJob>> {
        let inner = self.lock()?;
        Ok(inner.jobs.iter().find(|j| j.job_id == job_id).cloned())
    }

    async fn list_jobs(&self) -> Result<Vec<BatchJob>> {
        let inner = self.lock()?;
        let mut jobs = inner.jobs.clone();
        jobs.sort_by(|a, b| b.started_at.cmp(&a.started_at).then(b.job_id.cmp(&a.job_id)));
        Ok(jobs)
    }

    async fn list_analyses(&self, job_id: JobId) -> Result<Vec<AnalysisRecord>> {
        let inner = self.lock()?;
        Ok(inner.analyses.iter().filter(|a| a.job_id == job_id).cloned().collect())
    }

    async fn get_analysis(&self, job_id: JobId, resource_id: &str) -> Result<Option<AnalysisRecord>> {
        let inner = self.lock()?;
        Ok(inner
            .analyses
            .iter()
            .find(|a| a.job_id == job_id && a.result.resource_id() == resource_id)
            .cloned())
    }

    async fn list_reports(&self, job_id: JobId) -> Result<Vec<InfrastructureReport>> {
        let inner = self.lock()?;
        Ok(inner.reports.iter().filter(|r| r.job_id == job_id).cloned().collect())
    }

    async fn abandon_running(&self, reason: &str) -> Result<Vec<JobId>> {
        let mut inner = self.lock()?;
        let now = Utc::now();
        let mut abandoned = vec![];
        for job in inner.jobs.iter_mut().filter(|j| j.status == JobStatus::Running) {
            job.status = JobStatus::Failed;
            job.completed_at = Some(now);
            job.error_message = Some(reason.to_string());
            abandoned.push(job.job_id);
        }
        Ok(abandoned)
    }
}
