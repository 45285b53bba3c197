use std::sync::Arc;

use anyhow::anyhow;
use pxb_artifacts::ArtifactWriter;
use pxb_core::{
    plan_groups, AnalysisResult, BatchError, BatchJob, ClusterContext, JobId, ResourceDescriptor, RunOutcome,
    DEFAULT_BATCH_SIZE, SUMMARY_REPORT,
};
use pxb_providers::{AnalysisProvider, ResourceProvider};
use pxb_storage::JobStore;
use tracing::{error, info, warn};

use crate::analyzer::{ArtifactToggles, ResourceAnalyzer};
use crate::fanout::settle_all;

#[derive(Clone, Debug)]
pub struct BatchSettings {
    /// Resources analyzed concurrently per group; also the concurrency cap.
    pub batch_size: usize,
    pub toggles: ArtifactToggles,
    pub max_dropped_results: Option<usize>,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            toggles: ArtifactToggles::default(),
            max_dropped_results: None,
        }
    }
}

/// A job that has been created and is waiting to be driven.
pub struct PreparedRun {
    job: BatchJob,
    inventory: Vec<ResourceDescriptor>,
    context: Arc<ClusterContext>,
}

impl PreparedRun {
    pub fn job(&self) -> &BatchJob {
        &self.job
    }

    pub fn job_id(&self) -> JobId {
        self.job.job_id
    }

    pub fn inventory(&self) -> &[ResourceDescriptor] {
        &self.inventory
    }
}

/// Drives one full-inventory analysis: grouped fan-out, persistence, summary, output tree.
///
/// Progress and status of a job are written only from the task driving it. If the process
/// stops mid-run the job stays RUNNING until `JobStore::abandon_running` reconciles it.
pub struct BatchOrchestrator {
    resources: Arc<dyn ResourceProvider>,
    analyzer: ResourceAnalyzer,
    store: Arc<dyn JobStore>,
    writer: Arc<dyn ArtifactWriter>,
    settings: BatchSettings,
}

impl BatchOrchestrator {
    pub fn new(
        resources: Arc<dyn ResourceProvider>,
        analysis: Arc<dyn AnalysisProvider>,
        store: Arc<dyn JobStore>,
        writer: Arc<dyn ArtifactWriter>,
        settings: BatchSettings,
    ) -> Self {
        Self {
            resources,
            analyzer: ResourceAnalyzer::new(analysis, settings.toggles),
            store,
            writer,
            settings,
        }
    }

    pub fn settings(&self) -> &BatchSettings {
        &self.settings
    }

    pub async fn run_full_analysis(&self) -> Result<RunOutcome, BatchError> {
        match self.start_run().await? {
            Some(run) => self.drive(run).await.map(RunOutcome::Completed),
            None => Ok(RunOutcome::NoWork),
        }
    }

    /// Fetch cluster context and inventory, then create the job. Returns `None` when
    /// there is nothing to analyze; no job is created in that case.
    pub async fn start_run(&self) -> Result<Option<PreparedRun>, BatchError> {
        let context = self.resources.cluster_context().await.map_err(BatchError::Provider)?;
        let inventory = self.resources.list_resources().await.map_err(BatchError::Provider)?;
        if inventory.is_empty() {
            info!("inventory is empty, nothing to analyze");
            return Ok(None);
        }

        let job = self
            .store
            .create_job(inventory.len())
            .await
            .map_err(BatchError::Persistence)?;
        info!(job_id = %job.job_id, resources = inventory.len(), batch_size = self.settings.batch_size, "batch job created");
        Ok(Some(PreparedRun {
            job,
            inventory,
            context: Arc::new(context),
        }))
    }

    /// Run a prepared job to a terminal state. On error the job is marked FAILED
    /// before the error is returned.
    pub async fn drive(&self, run: PreparedRun) -> Result<JobId, BatchError> {
        let job_id = run.job_id();
        let mut processed = 0usize;
        match self.execute(&run, &mut processed).await {
            Ok(()) => {
                info!(job_id = %job_id, processed, total = run.inventory.len(), "batch job completed");
                Ok(job_id)
            }
            Err(err) => {
                let message = err.to_string();
                error!(job_id = %job_id, error = %message, "batch job failed");
                if let Err(e) = self.store.fail_job(job_id, processed, &message).await {
                    error!(job_id = %job_id, error = %format!("{e:#}"), "could not record job failure");
                }
                Err(err)
            }
        }
    }

    /// Analyze one resource. Never fails: provider errors become an error-flagged result.
    pub async fn analyze_resource(
        &self,
        resource: &ResourceDescriptor,
        context: Option<&ClusterContext>,
    ) -> AnalysisResult {
        self.analyzer.analyze(resource, context).await
    }

    async fn execute(&self, run: &PreparedRun, processed: &mut usize) -> Result<(), BatchError> {
        let job_id = run.job_id();
        let groups = plan_groups(run.inventory.len(), self.settings.batch_size);
        let mut results: Vec<AnalysisResult> = Vec::with_capacity(run.inventory.len());
        let mut dropped_total = 0usize;

        for (n, range) in groups.iter().enumerate() {
            info!(job_id = %job_id, group = n + 1, groups = groups.len(), size = range.len(), "analyzing group");

            let tasks: Vec<_> = range
                .clone()
                .map(|idx| {
                    let analyzer = self.analyzer.clone();
                    let resource = run.inventory[idx].clone();
                    let context = Arc::clone(&run.context);
                    (idx, async move { analyzer.analyze(&resource, Some(context.as_ref())).await })
                })
                .collect();
            let mut settled = settle_all(tasks).await;

            for dropped in &settled.dropped {
                error!(
                    job_id = %job_id,
                    resource_id = %run.inventory[dropped.key].id,
                    reason = %dropped.reason,
                    "analysis task dropped, result not recorded"
                );
            }
            dropped_total += settled.dropped.len();

            // completion order is arbitrary; persist in inventory order
            settled.values.sort_by_key(|(idx, _)| *idx);
            for (_, result) in &settled.values {
                self.store
                    .save_analysis(job_id, result)
                    .await
                    .map_err(BatchError::Persistence)?;
            }
            *processed += settled.values.len();
            self.store
                .update_progress(job_id, *processed)
                .await
                .map_err(BatchError::Persistence)?;
            results.extend(settled.values.into_iter().map(|(_, r)| r));

            if let Some(limit) = self.settings.max_dropped_results {
                if dropped_total > limit {
                    return Err(BatchError::DroppedLimit {
                        dropped: dropped_total,
                        limit,
                    });
                }
            }
        }

        if dropped_total > 0 {
            warn!(
                job_id = %job_id,
                dropped = dropped_total,
                processed = *processed,
                total = run.inventory.len(),
                "run finished with dropped analysis tasks"
            );
        }

        info!(job_id = %job_id, "generating infrastructure summary");
        let summary = self
            .analyzer
            .provider()
            .summarize(&results, &run.context)
            .await
            .map_err(BatchError::Summary)?;
        self.store
            .save_report(job_id, SUMMARY_REPORT, &summary)
            .await
            .map_err(BatchError::Persistence)?;

        let writer = Arc::clone(&self.writer);
        let report = tokio::task::spawn_blocking(move || writer.write_job(job_id, &results, &summary))
            .await
            .map_err(|e| BatchError::Write(anyhow!("artifact writer task failed: {e}")))?
            .map_err(BatchError::Write)?;
        info!(job_id = %job_id, dir = %report.job_dir.display(), "artifacts written");

        self.store
            .complete_job(job_id, *processed)
            .await
            .map_err(BatchError::Persistence)?;
        Ok(())
    }
}
